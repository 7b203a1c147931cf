//! Syntax-tree scan over the parsed Python source.

use crate::security::policy;
use crate::security::verdict::{ScanStage, Violation, ViolationKind};
use rustpython_ast::Visitor;
use rustpython_parser::{ast, Parse};

const SOURCE_NAME: &str = "<generated>";

/// Parse `code` and walk every node. A parse failure is reported as a
/// single `SyntaxError` violation.
pub fn scan_structure(code: &str) -> Vec<Violation> {
    let suite = match ast::Suite::parse(code, SOURCE_NAME) {
        Ok(suite) => suite,
        Err(err) => {
            let offset = usize::from(err.offset);
            return vec![Violation::new(
                ViolationKind::SyntaxError,
                ScanStage::StructuralScan,
                format!("code does not parse: {}", err.error),
            )
            .at_line(line_at(code, offset))];
        }
    };

    let mut walker = TreeWalker {
        source: code,
        violations: Vec::new(),
    };
    for stmt in suite {
        walker.visit_stmt(stmt);
    }
    walker.violations
}

/// 1-based line containing byte `offset`.
fn line_at(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

struct TreeWalker<'a> {
    source: &'a str,
    violations: Vec<Violation>,
}

impl TreeWalker<'_> {
    fn report(&mut self, kind: ViolationKind, detail: String, offset: usize) {
        let line = line_at(self.source, offset);
        self.violations
            .push(Violation::new(kind, ScanStage::StructuralScan, detail).at_line(line));
    }

    fn check_import(&mut self, module: &str, offset: usize) {
        if let Some(detail) = policy::import_refusal(module) {
            self.report(ViolationKind::ForbiddenImport, detail, offset);
        }
    }
}

impl Visitor for TreeWalker<'_> {
    fn visit_expr_call(&mut self, node: ast::ExprCall) {
        if let ast::Expr::Name(name) = node.func.as_ref() {
            let callee = name.id.as_str();
            if policy::is_forbidden_builtin(callee) {
                self.report(
                    ViolationKind::ForbiddenFunctionCall,
                    format!("call to forbidden builtin '{}'", callee),
                    usize::from(node.range.start()),
                );
            }
        }
        self.generic_visit_expr_call(node);
    }

    fn visit_expr_attribute(&mut self, node: ast::ExprAttribute) {
        let attr = node.attr.as_str();
        if attr.starts_with('_') {
            self.report(
                ViolationKind::ForbiddenAttributeAccess,
                format!("access to private attribute '{}'", attr),
                usize::from(node.range.start()),
            );
        }
        self.generic_visit_expr_attribute(node);
    }

    fn visit_stmt_import(&mut self, node: ast::StmtImport) {
        let offset = usize::from(node.range.start());
        for alias in &node.names {
            self.check_import(alias.name.as_str(), offset);
        }
    }

    fn visit_stmt_import_from(&mut self, node: ast::StmtImportFrom) {
        let offset = usize::from(node.range.start());
        let level = node.level.map(|l| l.to_u32()).unwrap_or(0) as usize;
        let module = node.module.as_ref().map(|m| m.as_str()).unwrap_or("");
        let written = format!("{}{}", ".".repeat(level), module);
        self.check_import(&written, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<ViolationKind> {
        scan_structure(code).into_iter().map(|v| v.kind).collect()
    }

    #[test]
    fn clean_analysis_code_passes() {
        let code = "import pandas as pd\nresult = df.groupby('a').sum()\nprint(result.to_json())\n";
        assert!(scan_structure(code).is_empty());
    }

    #[test]
    fn private_attribute_is_flagged() {
        let violations = scan_structure("x = 1\ny = df.__dict__\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ForbiddenAttributeAccess);
        assert_eq!(violations[0].line, Some(2));
        assert!(violations[0].detail.contains("__dict__"));
    }

    #[test]
    fn spaced_forbidden_call_is_flagged() {
        assert_eq!(kinds("eval ('1+1')"), vec![ViolationKind::ForbiddenFunctionCall]);
    }

    #[test]
    fn method_with_builtin_name_is_not_a_bare_call() {
        assert!(kinds("x = df.eval('a + b')").is_empty());
    }

    #[test]
    fn imports_hidden_from_line_scan_are_caught() {
        let violations = scan_structure("x = 1; import os");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].detail, "module 'os' is denied");
    }

    #[test]
    fn relative_import_is_refused() {
        assert_eq!(kinds("from . import helpers"), vec![ViolationKind::ForbiddenImport]);
    }

    #[test]
    fn parse_failure_is_a_syntax_violation() {
        let violations = scan_structure("x = 1\ndef broken(:\n    pass\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::SyntaxError);
        assert_eq!(violations[0].line, Some(2));
    }

    #[test]
    fn line_at_counts_newlines_before_offset() {
        assert_eq!(line_at("a\nb\nc", 0), 1);
        assert_eq!(line_at("a\nb\nc", 2), 2);
        assert_eq!(line_at("a\nb\nc", 99), 3);
    }
}
