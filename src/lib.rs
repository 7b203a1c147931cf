//! sheetbox: validated, resource-bounded execution of generated
//! data-analysis scripts
//!
//! A language model turns a question about a table into a Python script.
//! This crate decides whether that script may run and, if so, runs it under
//! CPU, memory and wall-clock limits with the table bound to `df`.
//!
//! # Architecture
//!
//! ## Static validation ([`security`])
//! - [`security::lexical`]: line-oriented import, call and pattern scans
//! - [`security::structural`]: syntax-tree scan (authoritative)
//! - [`security::policy`]: fixed allow/deny sets
//! - [`security::validator`]: `CodeValidator`, merging all stages
//!
//! ## Dataset injection ([`dataset`])
//! - [`dataset::injector`]: one serialized blob per sandbox, loaded by the prelude
//!
//! ## Execution control ([`exec`])
//! - [`exec::sandbox`]: `ProcessSandbox`, the validate/compose/spawn/wait pipeline
//! - [`exec::launcher`]: subprocess launcher with process-group kill on timeout
//!
//! ## Process primitives ([`kernel`])
//! - [`kernel::limits`]: `ResourceLimiter` (rlimits on Unix, no-op elsewhere)
//! - [`kernel::credentials`]: optional run-as identity
//! - [`kernel::signal`]: SIGTERM/SIGKILL escalation
//!
//! ## Results ([`verdict`])
//! - [`verdict::outcome`]: stdout/stderr to structured outcome
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::workspace`]: per-run scratch files removed on every exit path
//! - [`safety::cleanup`]: sweep of stale scratch files
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: security events, optional JSON-lines audit log
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: config, results and the error type
//! - [`config::loader`]: JSON file and `SHEETBOX_*` environment loading
//! - [`config::validator`]: startup validation
//!
//! # Limits of the isolation
//!
//! Validation is cooperative and the rlimits and identity switch are best
//! effort. There are no namespaces, seccomp filters or containers: run the
//! host inside real OS isolation if the scripts are hostile.

pub mod config;
pub mod dataset;
pub mod exec;
pub mod kernel;
pub mod observability;
pub mod safety;
pub mod security;
pub mod verdict;

pub mod cli;

pub use config::types::{ExecutionResult, ExecutionStatus, Result, SandboxConfig, SandboxError};
pub use dataset::{Dataset, InjectedDataset, Table};
pub use exec::ProcessSandbox;
pub use security::{CodeValidator, ValidationVerdict, Violation, ViolationKind};
pub use verdict::{Outcome, ResultPipeline};
