//! Static security validation
//!
//! Lexical pre-filters and a syntax-tree scan over generated code. The
//! syntax-tree scan is authoritative; the lexical stages are a fast net
//! that also works on code that does not parse.

pub mod lexical;
pub mod policy;
pub mod structural;
pub mod validator;
pub mod verdict;

pub use validator::CodeValidator;
pub use verdict::{ScanStage, ValidationVerdict, Violation, ViolationKind};
