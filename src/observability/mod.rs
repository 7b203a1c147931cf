//! Observability
//!
//! Structured security events for rejected code, timeouts and kills.

pub mod audit;

pub use audit::{AuditSink, SecurityEvent, SecurityEventType, SecuritySeverity};
