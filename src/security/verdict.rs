//! Verdict types produced by static validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a violation forbids
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    ForbiddenImport,
    ForbiddenFunctionCall,
    ForbiddenAttributeAccess,
    SyntaxError,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::ForbiddenImport => "ForbiddenImport",
            ViolationKind::ForbiddenFunctionCall => "ForbiddenFunctionCall",
            ViolationKind::ForbiddenAttributeAccess => "ForbiddenAttributeAccess",
            ViolationKind::SyntaxError => "SyntaxError",
        };
        f.write_str(name)
    }
}

/// Validation stage that reported a violation, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    ImportScan,
    CallScan,
    PatternScan,
    StructuralScan,
}

/// One reason the code was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub stage: ScanStage,
    pub detail: String,
    /// 1-based source line, when the stage can tell
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(kind: ViolationKind, stage: ScanStage, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            detail: detail.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Two reports of the same finding, possibly from different stages.
    pub(crate) fn same_finding(&self, other: &Violation) -> bool {
        self.kind == other.kind && self.detail == other.detail && self.line == other.line
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

/// Allow/deny outcome of static validation.
///
/// `allowed` is derived from `violations` at construction and cannot
/// disagree with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    allowed: bool,
    violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            allowed: violations.is_empty(),
            violations,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// One-line message used as the rejection stderr.
    pub fn summary(&self) -> String {
        summarize(&self.violations)
    }
}

/// Render violations the way a rejected execution reports them.
pub fn summarize(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "code accepted".to_string();
    }
    let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    format!("code rejected by security policy: {}", parts.join("; "))
}
