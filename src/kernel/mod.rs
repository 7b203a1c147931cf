//! Thin wrappers around Unix process primitives.
//!
//! `unsafe` is confined to the pre-exec hook in `limits`.

pub mod credentials;
pub mod limits;
pub mod signal;

pub use credentials::{resolve_identity, IdentityResolution, RunAsIdentity};
pub use limits::{platform_limiter, NoopLimiter, ResourceLimiter, RlimitLimiter};
