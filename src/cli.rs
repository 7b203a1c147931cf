use crate::config::types::SandboxConfig;
use crate::dataset::Table;
use crate::exec::ProcessSandbox;
use crate::security::CodeValidator;
use crate::verdict::ResultPipeline;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Statically validate a script without running it
    Validate {
        /// Script file, or `-` for stdin
        #[arg(long)]
        code: String,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and run a script in the sandbox
    Run {
        /// Script file, or `-` for stdin
        #[arg(long)]
        code: String,
        /// Split-orientation JSON table bound to `df`
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Wall-clock timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
        /// Sandbox config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove stale scratch files left by crashed runs
    Sweep {
        /// Sandbox config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let success = match cli.command {
        Commands::Validate { code, json } => validate(&code, json)?,
        Commands::Run {
            code,
            dataset,
            timeout,
            config,
            json,
        } => run_code(&code, dataset.as_deref(), timeout, config.as_deref(), json)?,
        Commands::Sweep { config } => sweep(config.as_deref())?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn validate(code_arg: &str, json: bool) -> Result<bool> {
    let code = read_code(code_arg)?;
    let verdict = CodeValidator::new()?.validate(&code);

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.allowed() {
        println!("allowed");
    } else {
        for violation in verdict.violations() {
            println!("{}", violation);
        }
    }
    Ok(verdict.allowed())
}

fn run_code(
    code_arg: &str,
    dataset: Option<&Path>,
    timeout: Option<u64>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<bool> {
    let code = read_code(code_arg)?;
    let mut sandbox = ProcessSandbox::new(load_config(config_path)?)?;

    if let Some(path) = dataset {
        let table = Table::from_json_file(path)?;
        let injected = sandbox.inject(&table)?;
        log::info!(
            "Loaded dataset {} ({} rows x {} columns)",
            path.display(),
            injected.row_count,
            injected.column_count
        );
    }

    let result = match timeout {
        Some(secs) => sandbox.execute_with_timeout(&code, Duration::from_secs(secs)),
        None => sandbox.execute(&code),
    };
    let outcome = ResultPipeline::interpret_result(&result);

    if json {
        let report = serde_json::json!({
            "run_id": result.run_id,
            "status": result.status,
            "exit_code": result.exit_code,
            "signal": result.signal,
            "duration_ms": result.duration.as_millis() as u64,
            "outcome": outcome,
            "violations": result.violations,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if outcome.is_success() {
        println!("{}", outcome);
    } else {
        eprintln!("{}", outcome);
    }

    Ok(outcome.is_success())
}

fn sweep(config_path: Option<&Path>) -> Result<bool> {
    let sandbox = ProcessSandbox::new(load_config(config_path)?)?;
    // Construction already swept once; report what a second pass sees
    let report = sandbox.sweep_stale();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.failures.is_empty())
}

fn load_config(path: Option<&Path>) -> Result<SandboxConfig> {
    let mut config = match path {
        Some(path) => SandboxConfig::load_from_file(path)?,
        None => SandboxConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn read_code(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read code from stdin")?;
        return Ok(code);
    }
    std::fs::read_to_string(arg).with_context(|| format!("Failed to read code file {}", arg))
}
