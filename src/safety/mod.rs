//! Safety and cleanup
//!
//! Run-scoped scratch files that are removed on every exit path, and the
//! sweep that bounds leftovers from crashed runs.

pub mod cleanup;
pub mod workspace;

pub use cleanup::{sweep_stale, SweepReport};
pub use workspace::{ensure_scratch_dir, read_capture, Capture, RunWorkspace, RUN_PREFIX};
