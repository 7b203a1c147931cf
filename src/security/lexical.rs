//! Line-oriented pre-filter.
//!
//! Tolerates source that does not parse; the structural scan is the
//! authoritative check.

use crate::config::types::{Result, SandboxError};
use crate::security::policy::{self, FORBIDDEN_BUILTINS, SPAWNING_METHODS};
use crate::security::verdict::{ScanStage, Violation, ViolationKind};
use regex::Regex;

/// An import found by the lexical scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRef {
    /// Module path as written (`os.path`, `.helpers`)
    pub module: String,
    pub line: usize,
}

/// Compiled patterns for the three lexical stages.
#[derive(Debug, Clone)]
pub struct LexicalScanner {
    import_stmt: Regex,
    from_stmt: Regex,
    forbidden_call: Regex,
    dunder: Regex,
}

impl LexicalScanner {
    pub fn new() -> Result<Self> {
        let names: Vec<String> = FORBIDDEN_BUILTINS.iter().map(|n| regex::escape(n)).collect();
        Ok(Self {
            import_stmt: compile(r"^\s*import\s+(.+)$")?,
            from_stmt: compile(r"^\s*from\s+([\w.]+)\s+import\b")?,
            forbidden_call: compile(&format!(r"\b({})\(", names.join("|")))?,
            dunder: compile(r"__.*__")?,
        })
    }

    /// Collect `import X` / `from X import ...` module paths, one entry per
    /// listed module.
    pub fn extract_imports(&self, code: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();

        for (index, line) in code.lines().enumerate() {
            let line_no = index + 1;

            if let Some(caps) = self.from_stmt.captures(line) {
                imports.push(ImportRef {
                    module: caps[1].to_string(),
                    line: line_no,
                });
                continue;
            }

            if let Some(caps) = self.import_stmt.captures(line) {
                // `import a, b as c; x = 1  # note`
                let clause = caps[1].split(|c: char| c == ';' || c == '#').next().unwrap_or("");
                for item in clause.split(',') {
                    let module = item
                        .trim()
                        .trim_matches(|c: char| c == '(' || c == ')')
                        .split_whitespace()
                        .next()
                        .unwrap_or("");
                    if !module.is_empty() {
                        imports.push(ImportRef {
                            module: module.to_string(),
                            line: line_no,
                        });
                    }
                }
            }
        }

        imports
    }

    /// Stages 1 and 2: extraction plus import policy.
    pub fn scan_imports(&self, code: &str) -> Vec<Violation> {
        self.extract_imports(code)
            .into_iter()
            .filter_map(|import| {
                policy::import_refusal(&import.module).map(|detail| {
                    Violation::new(ViolationKind::ForbiddenImport, ScanStage::ImportScan, detail)
                        .at_line(import.line)
                })
            })
            .collect()
    }

    /// Stage 3: `name(` for every forbidden builtin.
    pub fn scan_calls(&self, code: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (index, line) in code.lines().enumerate() {
            for caps in self.forbidden_call.captures_iter(line) {
                violations.push(
                    Violation::new(
                        ViolationKind::ForbiddenFunctionCall,
                        ScanStage::CallScan,
                        format!("call to forbidden builtin '{}'", &caps[1]),
                    )
                    .at_line(index + 1),
                );
            }
        }
        violations
    }

    /// Stage 4: dunder names and process-spawning method calls.
    pub fn scan_patterns(&self, code: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (index, line) in code.lines().enumerate() {
            let line_no = index + 1;

            if let Some(found) = self.dunder.find(line) {
                violations.push(
                    Violation::new(
                        ViolationKind::ForbiddenAttributeAccess,
                        ScanStage::PatternScan,
                        format!("dunder name usage '{}'", found.as_str()),
                    )
                    .at_line(line_no),
                );
            }

            for method in SPAWNING_METHODS {
                if line.contains(method) {
                    violations.push(
                        Violation::new(
                            ViolationKind::ForbiddenFunctionCall,
                            ScanStage::PatternScan,
                            format!("process-spawning call '{}'", method),
                        )
                        .at_line(line_no),
                    );
                }
            }
        }
        violations
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SandboxError::Config(format!("invalid scan pattern: {}", e)))
}
