//! Static validation scenarios, end to end through the public API.

use sheetbox::security::ScanStage;
use sheetbox::{CodeValidator, ViolationKind};

fn validator() -> CodeValidator {
    CodeValidator::new().expect("validator patterns compile")
}

#[test]
fn process_control_import_is_rejected() {
    let verdict = validator().validate("import os\nos.system('ls')");

    assert!(!verdict.allowed());
    let import = verdict
        .violations()
        .iter()
        .find(|v| v.kind == ViolationKind::ForbiddenImport)
        .expect("ForbiddenImport reported");
    assert!(import.detail.contains("'os'"));
    assert_eq!(import.line, Some(1));
}

#[test]
fn exec_call_is_rejected() {
    let verdict = validator().validate("exec('print(1)')");
    assert!(!verdict.allowed());
    assert!(verdict.has_kind(ViolationKind::ForbiddenFunctionCall));
}

#[test]
fn dunder_attribute_is_caught_by_structural_scan() {
    let verdict = validator().validate("import pandas as pd\nprint(df.__dict__)");

    assert!(!verdict.allowed());
    assert!(!verdict.has_kind(ViolationKind::ForbiddenImport));
    assert!(verdict
        .violations()
        .iter()
        .any(|v| v.kind == ViolationKind::ForbiddenAttributeAccess && v.stage == ScanStage::StructuralScan));
}

#[test]
fn private_attribute_without_dunder_is_rejected() {
    let verdict = validator().validate("x = df._mgr");
    assert_eq!(verdict.violations().len(), 1);
    assert_eq!(verdict.violations()[0].kind, ViolationKind::ForbiddenAttributeAccess);
}

#[test]
fn typical_analysis_script_is_allowed() {
    let code = r#"
import pandas as pd
import numpy as np
from datetime import datetime
from collections import Counter
import json, math

totals = df.groupby("region")["sales"].sum()
top = totals.sort_values(ascending=False).head(3)
print(json.dumps({"top": top.to_dict(), "mean": float(np.mean(df["sales"]))}))
"#;
    let verdict = validator().validate(code);
    assert!(verdict.allowed(), "{}", verdict.summary());
}

#[test]
fn unlisted_module_is_rejected() {
    let verdict = validator().validate("import scipy.stats\n");
    assert!(verdict.violations()[0].detail.contains("not in the allowed set"));
}

#[test]
fn every_import_in_a_list_is_checked() {
    let verdict = validator().validate("import json, socket");
    assert!(!verdict.allowed());
    assert!(verdict.violations().iter().any(|v| v.detail.contains("'socket'")));
}

#[test]
fn syntax_error_is_a_violation() {
    let verdict = validator().validate("print(df.shape\n");
    assert!(verdict.has_kind(ViolationKind::SyntaxError));
}

#[test]
fn unparseable_code_still_gets_lexical_findings() {
    let verdict = validator().validate("import subprocess\ndef broken(:\n");
    assert!(verdict.has_kind(ViolationKind::SyntaxError));
    assert!(verdict.has_kind(ViolationKind::ForbiddenImport));
}

#[test]
fn all_problems_are_reported_together() {
    let verdict = validator().validate("import os\nimport pickle\neval('1')\ndf.__class__");
    let kinds: Vec<ViolationKind> = verdict.violations().iter().map(|v| v.kind).collect();
    assert!(kinds.contains(&ViolationKind::ForbiddenImport));
    assert!(kinds.contains(&ViolationKind::ForbiddenFunctionCall));
    assert!(kinds.contains(&ViolationKind::ForbiddenAttributeAccess));
    assert!(verdict.violations().iter().filter(|v| v.kind == ViolationKind::ForbiddenImport).count() >= 2);
}

#[test]
fn validation_is_deterministic() {
    let code = "import os\nfrom sys import argv\ngetattr(df, 'x')\nos.popen('id')";
    let first = validator().validate(code);
    for _ in 0..5 {
        assert_eq!(validator().validate(code), first);
    }
}

#[test]
fn verdict_serializes_for_the_cli() {
    let verdict = validator().validate("import os");
    let value = serde_json::to_value(&verdict).unwrap();
    assert_eq!(value["allowed"], false);
    assert_eq!(value["violations"][0]["kind"], "ForbiddenImport");
    assert_eq!(value["violations"][0]["stage"], "import_scan");
}
