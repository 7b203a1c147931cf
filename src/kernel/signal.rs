//! Process-group termination on timeout.

use serde::Serialize;
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL
pub const TERMINATION_GRACE: Duration = Duration::from_millis(200);

/// What the terminator did, for logs and audit.
#[derive(Clone, Debug, Default, Serialize)]
pub struct KillReport {
    pub term_sent: bool,
    pub kill_sent: bool,
    pub waited_ms: u64,
    pub notes: Vec<String>,
}

/// SIGTERM the group led by `leader`, wait `grace`, then SIGKILL it. Falls
/// back to signalling the leader alone if the group cannot be signalled.
#[cfg(unix)]
pub fn terminate_group(leader: u32, grace: Duration) -> KillReport {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;
    use std::time::Instant;

    let mut report = KillReport::default();
    let start = Instant::now();
    let pid = Pid::from_raw(leader as i32);

    for (signal, pause) in [(Signal::SIGTERM, grace), (Signal::SIGKILL, Duration::ZERO)] {
        let sent = match killpg(pid, signal) {
            Ok(()) => true,
            Err(group_err) => {
                let fallback = kill(pid, signal);
                report
                    .notes
                    .push(format!("group {} failed ({}), signalled leader only", signal, group_err));
                fallback.is_ok()
            }
        };
        match signal {
            Signal::SIGTERM => report.term_sent = sent,
            _ => report.kill_sent = sent,
        }
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    report.waited_ms = start.elapsed().as_millis() as u64;
    report
}
