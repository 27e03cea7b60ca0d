//! # coffer-rbac: Tenant-scoped permission enforcement
//!
//! The runtime half of Coffer's enforcement layer. A caller can never read
//! or write another tenant's financial data: every data-access operation
//! declares a [`PermissionRequirement`] and passes through
//! [`AccessGuard::check`] before touching state. The build-time half — the
//! enforcement scanner — verifies that no operation forgets to.
//!
//! ## Flow
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  Request with verified token claims             │
//! └──────────────────┬─────────────────────────────┘
//!                    ▼
//! ┌────────────────────────────────────────────────┐
//! │  PrincipalContext::from_claims                 │
//! │  fail-fast: business-scoped actor without a    │
//! │  tenant claim never constructs                 │
//! └──────────────────┬─────────────────────────────┘
//!                    ▼
//! ┌────────────────────────────────────────────────┐
//! │  AccessGuard::check(principal, requirement,    │
//! │                     target owner)              │
//! │  1. tenant boundary (outranks all roles)       │
//! │  2. role-set match (AnyOf / AllOf)             │
//! └──────────────────┬─────────────────────────────┘
//!                    ▼
//!            Allow → operation runs
//!            Deny  → typed error, audited, nothing started
//! ```
//!
//! ## Roles
//!
//! | Role            | Scope    | Typical grant                    |
//! |-----------------|----------|----------------------------------|
//! | Owner           | tenant   | the business owner               |
//! | Admin           | tenant   | user and card management         |
//! | Manager         | tenant   | allocation-level spend control   |
//! | Employee        | tenant   | own cards and transactions       |
//! | Bookkeeper      | tenant   | read-only accounting             |
//! | GlobalAdmin     | platform | operator, full cross-tenant      |
//! | CustomerService | platform | support remediation              |
//! | GlobalViewer    | platform | monitoring, analytics            |
//!
//! Every decision is audited: denials at WARN with subject, tenant,
//! target, and reason; grants at DEBUG.

pub mod guard;
pub mod principal;
pub mod requirement;
pub mod roles;

pub use guard::{AccessError, AccessGuard, Decision, DenyReason};
pub use principal::{ClaimError, PrincipalContext, TokenClaims, UserType};
pub use requirement::{PermissionRequirement, RolePolicy, ScopeRule};
pub use roles::Role;
