//! ProcessSandbox behaviour through the public API.
//!
//! Tests that need a real interpreter probe for it first and return early
//! with a message when it is missing.

use serde_json::json;
use sheetbox::exec::{LaunchOutcome, LaunchRequest, ProcessLauncher};
use sheetbox::{
    ExecutionStatus, Outcome, ProcessSandbox, ResultPipeline, SandboxConfig, Table, ViolationKind,
};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SpyLauncher {
    launches: Arc<AtomicUsize>,
}

impl ProcessLauncher for SpyLauncher {
    fn name(&self) -> &str {
        "spy"
    }

    fn launch(&self, _request: &LaunchRequest<'_>) -> sheetbox::Result<LaunchOutcome> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(LaunchOutcome {
            exit_code: Some(0),
            ..LaunchOutcome::default()
        })
    }
}

fn spy_sandbox(dir: &Path) -> (ProcessSandbox, Arc<AtomicUsize>) {
    let launches = Arc::new(AtomicUsize::new(0));
    let config = SandboxConfig {
        scratch_dir: dir.to_path_buf(),
        ..SandboxConfig::default()
    };
    let sandbox = ProcessSandbox::with_launcher(
        config,
        Box::new(SpyLauncher {
            launches: launches.clone(),
        }),
    )
    .unwrap();
    (sandbox, launches)
}

fn run_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("run-"))
        .collect()
}

fn has_python() -> bool {
    let ok = Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !ok {
        eprintln!("skipping: python3 not available");
    }
    ok
}

fn has_pandas() -> bool {
    let ok = Command::new("python3")
        .args(["-c", "import pandas"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !ok {
        eprintln!("skipping: python3 with pandas not available");
    }
    ok
}

fn python_sandbox(dir: &Path, configure: impl FnOnce(&mut SandboxConfig)) -> ProcessSandbox {
    let mut config = SandboxConfig {
        scratch_dir: dir.to_path_buf(),
        baseline_imports: Vec::new(),
        ..SandboxConfig::default()
    };
    configure(&mut config);
    ProcessSandbox::new(config).unwrap()
}

fn sample_table() -> Table {
    Table::new(
        vec!["region".into(), "sales".into()],
        vec![
            vec![json!("Norte"), json!(100)],
            vec![json!("Sur"), json!(200)],
            vec![json!("Este"), json!(300)],
        ],
    )
    .unwrap()
}

#[test]
fn denied_import_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let (sandbox, launches) = spy_sandbox(dir.path());

    for code in ["import os\nos.system('ls')", "import socket", "from subprocess import run"] {
        let result = sandbox.execute(code);
        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert!(result.stdout.is_empty());
        assert!(result.violations.iter().any(|v| v.kind == ViolationKind::ForbiddenImport));
    }
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[test]
fn exec_call_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let (sandbox, launches) = spy_sandbox(dir.path());

    let result = sandbox.execute("exec('print(1)')");
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert!(matches!(ResultPipeline::interpret_result(&result), Outcome::Rejected(_)));
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[test]
fn allowed_code_spawns_exactly_once_and_leaves_no_script() {
    let dir = tempfile::tempdir().unwrap();
    let (sandbox, launches) = spy_sandbox(dir.path());

    let result = sandbox.execute("import json\nprint(json.dumps([1, 2]))");
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert!(run_leftovers(dir.path()).is_empty());
}

#[test]
fn clear_is_a_no_op_when_nothing_is_injected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sandbox, _) = spy_sandbox(dir.path());
    sandbox.clear();
    sandbox.clear();
    assert!(sandbox.injected().is_none());
}

#[test]
fn dropping_the_sandbox_removes_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let blob = {
        let (mut sandbox, _) = spy_sandbox(dir.path());
        sandbox.inject(&sample_table()).unwrap().serialized_blob_path
    };
    assert!(!blob.exists());
}

#[test]
fn runtime_error_is_reported_as_failure() {
    if !has_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = python_sandbox(dir.path(), |_| {});

    let result = sandbox.execute("print('partial')\nx = 1 / 0");
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_ne!(result.exit_code, Some(0));
    match ResultPipeline::interpret_result(&result) {
        Outcome::RuntimeFailure(stderr) => assert!(stderr.contains("ZeroDivisionError")),
        other => panic!("expected runtime failure, got {:?}", other),
    }
    assert!(run_leftovers(dir.path()).is_empty());
}

#[test]
fn json_output_is_structured() {
    if !has_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = python_sandbox(dir.path(), |_| {});

    let result = sandbox.execute("import json\nprint(json.dumps({'answer': 6 * 7}))");
    assert_eq!(
        ResultPipeline::interpret_result(&result),
        Outcome::Structured(json!({"answer": 42}))
    );
}

#[test]
fn busy_loop_times_out() {
    if !has_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // CPU limit above the wall clock so the timeout, not SIGXCPU, ends the run
    let sandbox = python_sandbox(dir.path(), |config| {
        config.cpu_time_seconds = 30;
        config.timeout_seconds = 2;
    });

    let started = Instant::now();
    let result = sandbox.execute("print('never seen', flush=True)\nwhile True: pass");
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(result.stdout.is_empty());
    assert_eq!(result.stderr, "timeout after 2 seconds");
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert!(run_leftovers(dir.path()).is_empty());
}

#[test]
fn injected_shape_reaches_the_script() {
    if !has_pandas() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut sandbox = python_sandbox(dir.path(), |config| {
        config.baseline_imports = vec!["import pandas as pd".to_string()];
        // numpy's thread pools reserve more address space than the default allows
        config.memory_bytes = 4 * 1024 * 1024 * 1024;
        config.cpu_time_seconds = 20;
        config.timeout_seconds = 30;
    });
    sandbox.inject(&sample_table()).unwrap();

    let result = sandbox.execute("import pandas as pd\nprint(df.shape)");
    assert_eq!(result.stderr, "");
    assert_eq!(ResultPipeline::interpret_result(&result), Outcome::Text("(3, 2)".into()));

    let round_trip = sandbox.execute(
        "import json\nprint(json.dumps({'rows': int(df.shape[0]), 'cols': int(df.shape[1]), 'total': int(df['sales'].sum())}))",
    );
    assert_eq!(
        ResultPipeline::interpret_result(&round_trip),
        Outcome::Structured(json!({"rows": 3, "cols": 2, "total": 600}))
    );
}

#[test]
fn missing_interpreter_is_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = python_sandbox(dir.path(), |config| {
        config.interpreter = "/nonexistent/sheetbox-python3".into();
    });

    let result = sandbox.execute("x = 1");
    assert_eq!(result.status, ExecutionStatus::SpawnFailed);
    assert!(matches!(ResultPipeline::interpret_result(&result), Outcome::InternalError(_)));
    assert!(run_leftovers(dir.path()).is_empty());
}

#[test]
fn concurrent_runs_do_not_collide() {
    if !has_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Arc::new(python_sandbox(dir.path(), |config| {
        config.timeout_seconds = 30;
    }));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let sandbox = Arc::clone(&sandbox);
            std::thread::spawn(move || {
                let result = sandbox.execute(&format!("print({})", worker));
                (worker, result)
            })
        })
        .collect();

    let mut run_ids = Vec::new();
    for handle in handles {
        let (worker, result) = handle.join().unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed, "worker {}: {}", worker, result.stderr);
        assert_eq!(result.stdout.trim(), worker.to_string());
        run_ids.push(result.run_id);
    }
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 8);
    assert!(run_leftovers(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn switched_identity_runs_user_code() {
    if !nix::unistd::geteuid().is_root() {
        eprintln!("skipping: switching identity requires root");
        return;
    }
    let Ok(Some(nobody)) = nix::unistd::User::from_name("nobody") else {
        eprintln!("skipping: no 'nobody' account on this host");
        return;
    };
    if !has_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = python_sandbox(dir.path(), |config| {
        config.run_as_identity = Some("nobody".to_string());
    });
    assert!(sandbox.identity().identity().is_some());

    let result = sandbox.execute("print(1)");
    assert_eq!(result.stderr, "");
    assert_eq!(ResultPipeline::interpret_result(&result), Outcome::Text("1".into()));

    let whoami = sandbox.execute("import os\nprint(os.getuid(), os.getgid())");
    assert_eq!(
        whoami.stdout.trim(),
        format!("{} {}", nobody.uid.as_raw(), nobody.gid.as_raw())
    );
    assert!(run_leftovers(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn switched_identity_reads_the_injected_dataset() {
    if !nix::unistd::geteuid().is_root() {
        eprintln!("skipping: switching identity requires root");
        return;
    }
    if !matches!(nix::unistd::User::from_name("nobody"), Ok(Some(_))) {
        eprintln!("skipping: no 'nobody' account on this host");
        return;
    }
    if !has_pandas() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut sandbox = python_sandbox(dir.path(), |config| {
        config.run_as_identity = Some("nobody".to_string());
        config.memory_bytes = 4 * 1024 * 1024 * 1024;
        config.cpu_time_seconds = 20;
        config.timeout_seconds = 30;
    });
    sandbox.inject(&sample_table()).unwrap();

    let result = sandbox.execute("print(df.shape)");
    assert_eq!(result.stderr, "");
    assert_eq!(ResultPipeline::interpret_result(&result), Outcome::Text("(3, 2)".into()));
}
