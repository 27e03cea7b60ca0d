//! The missing-enforcement rule.
//!
//! An *entry point* is any `pub fn` — free or inherent — that takes a
//! `PrincipalContext` parameter: the signature convention every
//! data-access operation in the workspace follows. An entry point is
//! *enforced* when its body consults the access guard (a `require` or
//! `check` call) and therefore carries a `PermissionRequirement`.
//!
//! An entry point that is not enforced fails the scan, unless the line
//! above it carries an allowance with a stated reason:
//!
//! ```text
//! // coffer-scan: allow(missing-enforcement) reason="claims resolver, pre-auth"
//! ```
//!
//! Test code (`#[cfg(test)]` modules, `#[test]` functions) is ignored.

use std::path::{Path, PathBuf};

use syn::visit::Visit;
use syn::{
    Attribute, Block, Expr, ImplItemFn, ItemFn, ItemImpl, ItemMod, Signature, Type, Visibility,
};

use crate::types::{Location, RULE, Violation};

/// Per-file context handed to the rule.
pub(crate) struct FileCtx<'a> {
    pub content: &'a str,
    pub relative_path: &'a Path,
    pub module_path: Vec<String>,
}

impl<'a> FileCtx<'a> {
    pub(crate) fn new(relative_path: &'a Path, content: &'a str) -> Self {
        Self {
            content,
            relative_path,
            module_path: module_path_for(relative_path),
        }
    }
}

/// Scans one parsed file. Returns the violations and the number of entry
/// points inspected.
pub(crate) fn check_file(ctx: &FileCtx<'_>, ast: &syn::File) -> (Vec<Violation>, usize) {
    let mut visitor = Visitor {
        ctx,
        scope: ctx.module_path.clone(),
        violations: Vec::new(),
        entry_points: 0,
    };
    visitor.visit_file(ast);
    (visitor.violations, visitor.entry_points)
}

struct Visitor<'a> {
    ctx: &'a FileCtx<'a>,
    scope: Vec<String>,
    violations: Vec<Violation>,
    entry_points: usize,
}

impl Visitor<'_> {
    fn inspect(&mut self, sig: &Signature, vis: &Visibility, attrs: &[Attribute], block: &Block) {
        if !matches!(vis, Visibility::Public(_)) || has_test_attr(attrs) {
            return;
        }
        if !takes_principal(sig) {
            return;
        }
        self.entry_points += 1;

        if block_enforces(block) {
            return;
        }

        let span = sig.ident.span();
        let message = match allowance_for(self.ctx.content, span.start().line) {
            Allowance::Allowed => return,
            Allowance::MissingReason => "allowance comment is missing a reason".to_string(),
            Allowance::None => {
                "takes PrincipalContext but never consults the access guard; \
                 attach a PermissionRequirement and call require() before touching state"
                    .to_string()
            }
        };

        let mut entry_point = self.scope.join("::");
        entry_point.push_str("::");
        entry_point.push_str(&sig.ident.to_string());

        self.violations.push(Violation {
            rule: RULE,
            entry_point,
            location: Location::from_span(self.ctx.relative_path.to_path_buf(), span),
            message,
        });
    }
}

impl<'ast> Visit<'ast> for Visitor<'_> {
    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        if has_cfg_test(&node.attrs) {
            return; // test modules are not runtime entry points
        }
        self.scope.push(node.ident.to_string());
        syn::visit::visit_item_mod(self, node);
        self.scope.pop();
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        let type_name = impl_type_name(node);
        if let Some(name) = &type_name {
            self.scope.push(name.clone());
        }
        syn::visit::visit_item_impl(self, node);
        if type_name.is_some() {
            self.scope.pop();
        }
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.inspect(&node.sig, &node.vis, &node.attrs, &node.block);
        syn::visit::visit_item_fn(self, node);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.inspect(&node.sig, &node.vis, &node.attrs, &node.block);
        syn::visit::visit_impl_item_fn(self, node);
    }
}

/// Whether any parameter is `PrincipalContext`, by value or reference.
fn takes_principal(sig: &Signature) -> bool {
    sig.inputs.iter().any(|input| match input {
        syn::FnArg::Typed(pat) => type_is_principal(&pat.ty),
        syn::FnArg::Receiver(_) => false,
    })
}

fn type_is_principal(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) => type_is_principal(&reference.elem),
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "PrincipalContext"),
        _ => false,
    }
}

/// Whether the body contains a guard call: a `.require(…)` / `.check(…)`
/// method call, or a qualified `AccessGuard::require` / `AccessGuard::check`
/// path call.
fn block_enforces(block: &Block) -> bool {
    struct GuardCallFinder {
        found: bool,
    }

    impl<'ast> Visit<'ast> for GuardCallFinder {
        fn visit_expr(&mut self, node: &'ast Expr) {
            if self.found {
                return;
            }
            match node {
                Expr::MethodCall(call)
                    if call.method == "require" || call.method == "check" =>
                {
                    self.found = true;
                    return;
                }
                Expr::Call(call) => {
                    if let Expr::Path(path) = call.func.as_ref() {
                        let segments: Vec<String> = path
                            .path
                            .segments
                            .iter()
                            .map(|segment| segment.ident.to_string())
                            .collect();
                        if segments.len() >= 2
                            && segments[segments.len() - 2] == "AccessGuard"
                            && matches!(segments[segments.len() - 1].as_str(), "require" | "check")
                        {
                            self.found = true;
                            return;
                        }
                    }
                }
                _ => {}
            }
            syn::visit::visit_expr(self, node);
        }
    }

    let mut finder = GuardCallFinder { found: false };
    finder.visit_block(block);
    finder.found
}

fn impl_type_name(node: &ItemImpl) -> Option<String> {
    match node.self_ty.as_ref() {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

fn has_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && matches!(&attr.meta, syn::Meta::List(list) if list.tokens.to_string().contains("test"))
    })
}

fn has_test_attr(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "test")
    })
}

enum Allowance {
    None,
    Allowed,
    MissingReason,
}

/// Looks for an allowance comment on the line above the item, skipping
/// attribute and doc-comment lines in between.
fn allowance_for(content: &str, item_line: usize) -> Allowance {
    const MARKER: &str = "coffer-scan: allow(missing-enforcement)";

    let lines: Vec<&str> = content.lines().collect();
    // item_line is 1-indexed; start from the line directly above.
    let mut index = item_line.saturating_sub(1);
    while index > 0 {
        let line = lines[index - 1].trim_start();
        if line.starts_with("#[") || line.starts_with("#![") || line.starts_with("///") {
            index -= 1;
            continue;
        }
        if line.starts_with("//") && line.contains(MARKER) {
            let has_reason = line
                .split_once("reason=\"")
                .and_then(|(_, rest)| rest.split_once('"'))
                .is_some_and(|(reason, _)| !reason.trim().is_empty());
            return if has_reason {
                Allowance::Allowed
            } else {
                Allowance::MissingReason
            };
        }
        return Allowance::None;
    }
    Allowance::None
}

/// Derives the leading module path from a workspace-relative file path:
/// `crates/coffer/src/ops.rs` → `["coffer", "ops"]`.
fn module_path_for(relative: &Path) -> Vec<String> {
    let components: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    let mut path = Vec::new();

    let src_index = components.iter().position(|component| component == "src");
    if let Some(index) = src_index {
        if index > 0 {
            path.push(components[index - 1].replace('-', "_"));
        }
        for component in &components[index + 1..] {
            if let Some(stem) = component.strip_suffix(".rs") {
                if stem != "lib" && stem != "main" && stem != "mod" {
                    path.push(stem.to_string());
                }
            } else {
                path.push(component.clone());
            }
        }
    }

    if path.is_empty() {
        path.push("crate".to_string());
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_code(code: &str) -> (Vec<Violation>, usize) {
        let ast = syn::parse_file(code).expect("fixture parses");
        let ctx = FileCtx::new(Path::new("crates/demo/src/ops.rs"), code);
        check_file(&ctx, &ast)
    }

    #[test]
    fn unenforced_entry_point_is_flagged() {
        let (violations, entry_points) = check_code(
            "pub fn read_account(principal: &PrincipalContext) -> u32 { 1 }",
        );
        assert_eq!(entry_points, 1);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, RULE);
        assert_eq!(violations[0].entry_point, "demo::ops::read_account");
    }

    #[test]
    fn guard_method_call_satisfies_the_rule() {
        let (violations, entry_points) = check_code(
            "pub fn read_account(principal: &PrincipalContext) -> Result<(), E> {\n\
                 guard.require(principal, &READ_ACCOUNT, Some(owner))?;\n\
                 Ok(())\n\
             }",
        );
        assert_eq!(entry_points, 1);
        assert!(violations.is_empty());
    }

    #[test]
    fn qualified_guard_call_satisfies_the_rule() {
        let (violations, _) = check_code(
            "pub fn read_account(principal: PrincipalContext) {\n\
                 let _ = coffer_rbac::AccessGuard::check(&guard, &principal, &REQ, None);\n\
             }",
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn by_value_and_reference_parameters_both_count() {
        let (violations, entry_points) = check_code(
            "pub fn a(p: PrincipalContext) {}\n\
             pub fn b(p: &PrincipalContext) {}\n\
             pub fn c(p: &coffer_rbac::PrincipalContext) {}",
        );
        assert_eq!(entry_points, 3);
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn private_functions_are_not_entry_points() {
        let (violations, entry_points) =
            check_code("fn helper(principal: &PrincipalContext) {}");
        assert_eq!(entry_points, 0);
        assert!(violations.is_empty());
    }

    #[test]
    fn functions_without_principal_are_ignored() {
        let (violations, entry_points) = check_code("pub fn ping() -> &'static str { \"pong\" }");
        assert_eq!(entry_points, 0);
        assert!(violations.is_empty());
    }

    #[test]
    fn impl_methods_are_entry_points() {
        let (violations, entry_points) = check_code(
            "pub struct AccountService;\n\
             impl AccountService {\n\
                 pub fn read(&self, principal: &PrincipalContext) -> u32 { 1 }\n\
             }",
        );
        assert_eq!(entry_points, 1);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entry_point, "demo::ops::AccountService::read");
    }

    #[test]
    fn test_code_is_ignored() {
        let (violations, entry_points) = check_code(
            "#[cfg(test)]\n\
             mod tests {\n\
                 pub fn fixture(principal: &PrincipalContext) {}\n\
             }\n\
             #[test]\n\
             pub fn probe(principal: &PrincipalContext) {}",
        );
        assert_eq!(entry_points, 0);
        assert!(violations.is_empty());
    }

    #[test]
    fn allowance_with_reason_suppresses() {
        let (violations, entry_points) = check_code(
            "// coffer-scan: allow(missing-enforcement) reason=\"claims resolver, runs pre-auth\"\n\
             pub fn resolve(principal: &PrincipalContext) {}",
        );
        assert_eq!(entry_points, 1);
        assert!(violations.is_empty());
    }

    #[test]
    fn allowance_skips_attribute_lines() {
        let (violations, _) = check_code(
            "// coffer-scan: allow(missing-enforcement) reason=\"audit shim\"\n\
             #[must_use]\n\
             pub fn resolve(principal: &PrincipalContext) -> bool { true }",
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn allowance_without_reason_still_fails() {
        let (violations, _) = check_code(
            "// coffer-scan: allow(missing-enforcement)\n\
             pub fn resolve(principal: &PrincipalContext) {}",
        );
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("reason"));
    }

    #[test]
    fn nested_modules_extend_the_entry_point_path() {
        let (violations, _) = check_code(
            "pub mod cards {\n\
                 pub fn issue(principal: &PrincipalContext) {}\n\
             }",
        );
        assert_eq!(violations[0].entry_point, "demo::ops::cards::issue");
    }

    #[test]
    fn module_paths_from_file_layout() {
        assert_eq!(
            module_path_for(Path::new("crates/coffer/src/lib.rs")),
            vec!["coffer"]
        );
        assert_eq!(
            module_path_for(Path::new("crates/coffer-rbac/src/guard.rs")),
            vec!["coffer_rbac", "guard"]
        );
        assert_eq!(
            module_path_for(Path::new("crates/coffer/src/ops/mod.rs")),
            vec!["coffer", "ops"]
        );
    }
}

