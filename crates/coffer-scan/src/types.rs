//! Diagnostic types for the enforcement scan.

use std::path::PathBuf;

use serde::Serialize;

/// The one rule this scanner enforces.
pub const RULE: &str = "missing-enforcement";

/// Source position of a flagged entry point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    /// Path relative to the scanned root.
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Location {
    #[must_use]
    pub fn from_span(file: PathBuf, span: proc_macro2::Span) -> Self {
        let start = span.start();
        Self {
            file,
            line: start.line,
            column: start.column + 1,
        }
    }
}

/// One unenforced data-access entry point.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule: &'static str,

    /// Entry-point identity: `crate::module::function`.
    pub entry_point: String,

    pub location: Location,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: [{}] {} — {}",
            self.location.file.display(),
            self.location.line,
            self.location.column,
            self.rule,
            self.entry_point,
            self.message
        )
    }
}

/// Result of scanning a workspace.
#[derive(Debug, Default, Serialize)]
pub struct ScanResult {
    pub violations: Vec<Violation>,
    pub files_checked: usize,
    pub entry_points_checked: usize,
}

impl ScanResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Any violation fails the build; there is no warn-and-continue mode.
    #[must_use]
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn print_report(&self) {
        for violation in &self.violations {
            eprintln!("{violation}");
        }
        eprintln!(
            "\n{} violation(s); {} entry point(s) across {} file(s)",
            self.violations.len(),
            self.entry_points_checked,
            self.files_checked
        );
    }
}
