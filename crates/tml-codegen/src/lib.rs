//! Monomorphization and LLVM IR generation for the TML compiler.
//!
//! The pipeline enters through [`generate`]: typed AST in, deterministic
//! text-form IR out. Generic instantiations are produced on demand by the
//! [`mono::MonoQueue`] worklist, keyed by the [`mangle`] scheme so every
//! translation unit computes identical symbols for identical
//! instantiations.

pub mod gen;
pub mod ir;
pub mod layout;
pub mod mangle;
pub mod mono;

use tml_ast as ast;
use tml_common::DiagnosticBag;
use tml_typeck::{TypeEnv, TypedAst};

pub use gen::{GenOptions, IrGen};

/// The outcome of IR generation.
pub struct GenResult {
    /// The emitted module text.
    pub ir: String,
    /// Codegen diagnostics (`C###`). Errors abort before the backend runs.
    pub diagnostics: DiagnosticBag,
}

/// Generate IR for a checked program.
pub fn generate(
    env: &mut TypeEnv,
    typed: &TypedAst,
    modules: &[ast::Module],
    module_name: &str,
    options: GenOptions,
) -> GenResult {
    let mut generator = IrGen::new(env, typed, options);
    let ir = generator.emit_program(modules, module_name);
    GenResult {
        ir,
        diagnostics: generator.errors,
    }
}
