//! Workspace discovery and the scan loop.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::rule::{self, FileCtx};
use crate::types::ScanResult;

/// Failure of the scan itself (distinct from a violation).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file that does not parse cannot be verified; skipping it
    /// would silently exempt its entry points, so this is fatal.
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Walks a workspace and checks every data-access entry point for an
/// attached permission requirement.
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Scans `crates/*/src` (or `src/` for a single-crate layout) under
    /// the root.
    pub fn scan(&self) -> Result<ScanResult, ScanError> {
        info!(root = %self.root.display(), "starting enforcement scan");

        let files = self.discover_files()?;
        info!("found {} files to scan", files.len());

        let mut result = ScanResult::new();
        for path in &files {
            debug!(file = %path.display(), "scanning");
            let content = std::fs::read_to_string(path)?;
            let ast = syn::parse_file(&content).map_err(|err| ScanError::Parse {
                path: path.clone(),
                message: err.to_string(),
            })?;

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let ctx = FileCtx::new(relative, &content);
            let (violations, entry_points) = rule::check_file(&ctx, &ast);

            result.violations.extend(violations);
            result.entry_points_checked += entry_points;
            result.files_checked += 1;
        }

        result.violations.sort_by(|a, b| a.location.cmp(&b.location));

        info!(
            violations = result.violations.len(),
            entry_points = result.entry_points_checked,
            files = result.files_checked,
            "enforcement scan complete"
        );
        Ok(result)
    }

    fn discover_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = self.glob_files(&format!("{}/crates/*/src/**/*.rs", self.root.display()))?;
        if files.is_empty() {
            files = self.glob_files(&format!("{}/src/**/*.rs", self.root.display()))?;
        }
        files.sort();
        Ok(files)
    }

    fn glob_files(&self, pattern: &str) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();
        for entry in glob::glob(pattern)? {
            let path = entry.map_err(|err| ScanError::Io(err.into_error()))?;
            if !is_excluded(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn is_excluded(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == "target")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (relative, content) in files {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, content).expect("write fixture");
        }
        dir
    }

    fn scan(dir: &tempfile::TempDir) -> ScanResult {
        Scanner::new(dir.path().to_path_buf())
            .scan()
            .expect("scan succeeds")
    }

    #[test]
    fn unenforced_entry_point_fails_the_scan() {
        let dir = workspace(&[(
            "crates/payments/src/lib.rs",
            "pub fn move_funds(principal: &PrincipalContext, amount: u64) {}\n",
        )]);

        let result = scan(&dir);
        assert!(result.has_violations());
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].entry_point, "payments::move_funds");
        assert_eq!(result.entry_points_checked, 1);
    }

    #[test]
    fn adding_the_requirement_makes_the_scan_pass() {
        let dir = workspace(&[(
            "crates/payments/src/lib.rs",
            "const MOVE_FUNDS: PermissionRequirement = PermissionRequirement::tenant(\"funds.move\", &[Role::Owner]);\n\
             pub fn move_funds(principal: &PrincipalContext, amount: u64) -> Result<(), AccessError> {\n\
                 GUARD.require(principal, &MOVE_FUNDS, Some(owner))?;\n\
                 Ok(())\n\
             }\n",
        )]);

        let result = scan(&dir);
        assert!(!result.has_violations());
        assert_eq!(result.entry_points_checked, 1);
    }

    #[test]
    fn scans_every_member_crate() {
        let dir = workspace(&[
            (
                "crates/a/src/lib.rs",
                "pub fn one(p: &PrincipalContext) {}\n",
            ),
            (
                "crates/b/src/ops.rs",
                "pub fn two(p: &PrincipalContext) {}\n",
            ),
        ]);

        let result = scan(&dir);
        assert_eq!(result.violations.len(), 2);
        assert_eq!(result.files_checked, 2);
    }

    #[test]
    fn single_crate_layout_falls_back_to_src() {
        let dir = workspace(&[(
            "src/lib.rs",
            "pub fn lone(p: &PrincipalContext) {}\n",
        )]);

        let result = scan(&dir);
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn clean_workspace_passes() {
        let dir = workspace(&[(
            "crates/a/src/lib.rs",
            "pub fn ping() -> u8 { 0 }\nfn private(p: &PrincipalContext) {}\n",
        )]);

        let result = scan(&dir);
        assert!(!result.has_violations());
        assert_eq!(result.entry_points_checked, 0);
    }

    #[test]
    fn parse_failure_is_fatal_not_skipped() {
        let dir = workspace(&[(
            "crates/a/src/lib.rs",
            "pub fn broken(p: &PrincipalContext { // missing paren\n",
        )]);

        let err = Scanner::new(dir.path().to_path_buf())
            .scan()
            .expect_err("must fail");
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn target_directories_are_excluded() {
        let dir = workspace(&[
            (
                "crates/a/src/lib.rs",
                "pub fn ok() {}\n",
            ),
            (
                "crates/a/target/debug/build/gen.rs",
                "pub fn generated(p: &PrincipalContext) {}\n",
            ),
        ]);

        let result = scan(&dir);
        assert!(!result.has_violations());
    }

    #[test]
    fn json_report_is_machine_readable() {
        let dir = workspace(&[(
            "crates/payments/src/lib.rs",
            "pub fn move_funds(principal: &PrincipalContext) {}\n",
        )]);

        let result = scan(&dir);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["violations"][0]["rule"], "missing-enforcement");
        assert_eq!(
            json["violations"][0]["entry_point"],
            "payments::move_funds"
        );
    }
}
