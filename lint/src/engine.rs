use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use slice_index_core::{Definition, Finding};
use tracing::warn;

use crate::checks::{
    ArchitectureComment, DoubleGlob, ExcessBlankLines, FixedMinorVersion, LargeComment,
    MissingCopyright, UnsortedContent,
};
use crate::{Check, CheckInput, LintConfig};

/// Code of the warning recorded when a check itself fails.
pub const CHECK_FAILED_CODE: &str = "check-failed";

thread_local! {
    /// Set while a check runs on this thread; its panics are reported as
    /// findings only.
    static CONTAINING: Cell<bool> = const { Cell::new(false) };
}

static QUIET_PANIC_HOOK: Once = Once::new();

/// Wraps the process panic hook once so panics raised inside a check do not
/// reach stderr. Panics anywhere else go to the previous hook.
fn install_quiet_panic_hook() {
    QUIET_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CONTAINING.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Runs `f`, turning a panic into `Err` without printing it.
fn contain<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    install_quiet_panic_hook();
    CONTAINING.with(|flag| flag.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CONTAINING.with(|flag| flag.set(false));
    outcome
}

/// Ordered registry of checks.
///
/// Checks run in registration order and never short-circuit each other.
pub struct LintEngine {
    checks: Vec<Box<dyn Check>>,
}

impl LintEngine {
    /// Creates an engine with no checks.
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Creates an engine with the built-in checks in their stable order.
    pub fn with_defaults(config: &LintConfig) -> Self {
        let mut engine = Self::new();
        engine
            .register(DoubleGlob)
            .register(ArchitectureComment)
            .register(LargeComment::new(config.large_comment_lines))
            .register(FixedMinorVersion)
            .register(MissingCopyright)
            .register(UnsortedContent)
            .register(ExcessBlankLines::new(config.max_blank_lines));
        engine
    }

    /// Appends a check to the end of the registry.
    pub fn register(&mut self, check: impl Check + 'static) -> &mut Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Codes of the registered checks, in order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.code()).collect()
    }

    /// Runs every check against one definition.
    ///
    /// Definitions that failed to parse are not linted; they already carry
    /// their `parse-error` warning.
    pub fn lint(&self, definition: &Definition) -> Vec<Finding> {
        let Some(parsed) = &definition.parsed else {
            return Vec::new();
        };
        let input = CheckInput {
            definition: parsed,
            raw: &definition.raw,
        };

        let mut findings = Vec::new();
        for check in &self.checks {
            let outcome = contain(|| check.run(&input));
            match outcome {
                Ok(Ok(found)) => findings.extend(found),
                Ok(Err(err)) => {
                    warn!(
                        check = check.code(),
                        package = %definition.package,
                        branch = %definition.branch,
                        error = %err,
                        "lint check failed"
                    );
                    findings.push(check_failed(check.code(), &err.to_string()));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        check = check.code(),
                        package = %definition.package,
                        branch = %definition.branch,
                        "lint check panicked: {message}"
                    );
                    findings.push(check_failed(check.code(), &format!("panicked: {message}")));
                }
            }
        }
        findings
    }

    /// Lints a definition and appends the findings to it.
    pub fn apply(&self, definition: &mut Definition) {
        let findings = self.lint(definition);
        definition.findings.extend(findings);
    }
}

impl Default for LintEngine {
    fn default() -> Self {
        Self::with_defaults(&LintConfig::default())
    }
}

fn check_failed(code: &str, detail: &str) -> Finding {
    Finding::warning(CHECK_FAILED_CODE).with_text(format!("{code}: {detail}"))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
