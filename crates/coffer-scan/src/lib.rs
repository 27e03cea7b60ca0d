//! # coffer-scan: Build-time enforcement scanner
//!
//! The build-time half of Coffer's permission enforcement. The runtime
//! guard can only deny what it is asked about; this scanner makes sure it
//! is always asked. It walks the workspace's sources, finds every
//! data-access entry point (any `pub fn` taking a `PrincipalContext`), and
//! fails the build if one carries no permission requirement — turning a
//! forgotten check from a runtime security incident into a broken build.
//!
//! Run as a CI step:
//!
//! ```text
//! coffer-scan check .            # human-readable report, exit 1 on violations
//! coffer-scan check . --format json   # machine-readable list for CI
//! ```
//!
//! There is deliberately no warn-and-continue mode; the scanner's whole
//! value is that omissions cannot land silently. For the rare entry point
//! that must not be guarded (e.g. the claims resolver itself), an
//! allowance comment with a mandatory reason suppresses the diagnostic —
//! see [`rule`](crate::rule) docs.
//!
//! The scanner is build-time only and is not linked into any runtime
//! binary.

pub mod rule;
pub mod scanner;
pub mod types;

pub use scanner::{ScanError, Scanner};
pub use types::{Location, RULE, ScanResult, Violation};
