//! CodeValidator: every stage runs, findings are merged in stage order.

use crate::config::types::Result;
use crate::security::lexical::LexicalScanner;
use crate::security::structural::scan_structure;
use crate::security::verdict::{ValidationVerdict, Violation};
use log::{debug, info};

/// Static analyzer for generated scripts. Never executes the code it reads.
#[derive(Debug, Clone)]
pub struct CodeValidator {
    lexical: LexicalScanner,
}

impl CodeValidator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lexical: LexicalScanner::new()?,
        })
    }

    /// Deterministic: the same input always yields the same verdict.
    pub fn validate(&self, code: &str) -> ValidationVerdict {
        let stages = [
            self.lexical.scan_imports(code),
            self.lexical.scan_calls(code),
            self.lexical.scan_patterns(code),
            scan_structure(code),
        ];

        let mut violations: Vec<Violation> = Vec::new();
        for found in stages {
            for violation in found {
                // The same finding from a later stage is folded into the earlier report
                if !violations.iter().any(|seen| seen.same_finding(&violation)) {
                    violations.push(violation);
                }
            }
        }

        let verdict = ValidationVerdict::from_violations(violations);
        if verdict.allowed() {
            debug!("Code accepted ({} bytes)", code.len());
        } else {
            info!(
                "Code rejected with {} violation(s): {}",
                verdict.violations().len(),
                verdict.summary()
            );
        }
        verdict
    }
}
