//! Fixed import and builtin policy.

/// Modules generated analysis code may import.
pub static ALLOWED_MODULES: &[&str] = &[
    "pandas",
    "numpy",
    "datetime",
    "json",
    "math",
    "statistics",
    "collections",
    "re",
    "itertools",
    "functools",
    "operator",
    "pd",
    "np",
];

/// Modules refused outright, even if also allow-listed.
pub static DENIED_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "shutil",
    "glob",
    "socket",
    "urllib",
    "requests",
    "http",
    "ftplib",
    "smtplib",
    "telnetlib",
    "pickle",
    "marshal",
    "shelve",
    "sqlite3",
    "mysql",
    "psycopg2",
    "exec",
    "eval",
    "compile",
    "__import__",
    "open",
    "file",
    "input",
    "raw_input",
    "importlib",
    "pkgutil",
    "imp",
];

/// Builtins that execute code, open files, read input or reflect on scope.
pub static FORBIDDEN_BUILTINS: &[&str] = &[
    "exec",
    "eval",
    "compile",
    "__import__",
    "open",
    "file",
    "input",
    "raw_input",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "globals",
    "locals",
    "vars",
    "dir",
];

/// Method names whose call on any object is treated as process spawning.
pub static SPAWNING_METHODS: &[&str] = &[".system(", ".popen(", ".call("];

/// Top-level package of a dotted module path.
pub fn top_level(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

/// Why importing `module` is refused, or `None` if it is allowed.
///
/// Deny-set membership is checked before the allow-set.
pub fn import_refusal(module: &str) -> Option<String> {
    if module.starts_with('.') {
        return Some(format!("relative import '{}' is not allowed", module));
    }

    let name = top_level(module);
    if DENIED_MODULES.contains(&name) {
        Some(format!("module '{}' is denied", name))
    } else if !ALLOWED_MODULES.contains(&name) {
        Some(format!("module '{}' is not in the allowed set", name))
    } else {
        None
    }
}

pub fn is_forbidden_builtin(name: &str) -> bool {
    FORBIDDEN_BUILTINS.contains(&name)
}
