//! Execution control
//!
//! The sandbox itself, the launcher seam it spawns through, and the
//! default subprocess launcher.

pub mod launcher;
pub mod sandbox;
pub mod types;

pub use launcher::SubprocessLauncher;
pub use sandbox::ProcessSandbox;
pub use types::{LaunchOutcome, LaunchRequest, ProcessLauncher};
