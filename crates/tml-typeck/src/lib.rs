//! Type checking for the TML compiler.
//!
//! Two passes over the AST:
//!
//! 1. **Registration** ([`register`]): structs, enums, classes, behaviors,
//!    impl blocks, type aliases, and function signatures land in the
//!    [`env::TypeEnv`]. Derives synthesize method signatures here.
//! 2. **Body checking** ([`check`]): every body is walked; each expression
//!    node gets a type and each call site a [`methods::MethodResolution`],
//!    recorded in side tables keyed by node id.
//!
//! The result feeds the monomorphizer and IR generator in `tml-codegen`.

pub mod builtins;
pub mod check;
pub mod derive;
pub mod env;
pub mod error;
pub mod methods;
pub mod register;
pub mod traits;
pub mod ty;

use tml_ast as ast;
use tml_common::DiagnosticBag;

pub use check::{Checker, TypedAst};
pub use env::{ParamScope, TypeEnv};
pub use error::TypeError;
pub use methods::{DispatchKind, MethodResolution};
pub use ty::{ArraySize, Type, TypeId, TypeInterner};

/// The outcome of checking a set of modules.
pub struct CheckResult {
    pub env: TypeEnv,
    pub typed: TypedAst,
    pub diagnostics: DiagnosticBag,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Check a whole compilation: register every module's declarations, then
/// check every body.
pub fn check_modules(modules: &[ast::Module]) -> CheckResult {
    let mut env = TypeEnv::new();
    let mut typed = TypedAst::default();
    let mut bag = DiagnosticBag::new();

    for module in modules {
        register::register_module(&mut env, module, &mut bag);
    }

    for module in modules {
        check_module_bodies(&mut env, &mut typed, &mut bag, module);
    }

    CheckResult {
        env,
        typed,
        diagnostics: bag,
    }
}

fn check_module_bodies(
    env: &mut TypeEnv,
    typed: &mut TypedAst,
    bag: &mut DiagnosticBag,
    module: &ast::Module,
) {
    let empty = ParamScope::default();

    for func in &module.functions {
        let mut checker = Checker::new(env, typed, bag);
        checker.check_function(func, None, None, &[], &empty);
    }

    for class in &module.classes {
        let scope = ParamScope::from_decl(&class.type_params);
        let this_ty = env.interner.intern(ty::Type::Class {
            name: class.name.clone(),
        });
        for method in &class.methods {
            let this = method.this.map(|_| this_ty);
            let mut checker = Checker::new(env, typed, bag);
            checker.check_function(method, this, Some(&class.name), &[], &scope);
        }
    }

    for block in &module.impls {
        let scope = ParamScope::from_decl(&block.type_params);
        let this_ty = match env.resolve_type_expr(&block.target, &scope) {
            Ok(id) => id,
            Err(err) => {
                bag.push(err.into_diagnostic());
                continue;
            }
        };
        let bounds: Vec<(String, Vec<String>)> = block
            .where_clauses
            .iter()
            .map(|w| (w.param.clone(), w.bounds.clone()))
            .collect();
        for method in &block.methods {
            let this = method.this.map(|_| this_ty);
            let mut checker = Checker::new(env, typed, bag);
            checker.check_function(method, this, None, &bounds, &scope);
        }
    }
}
