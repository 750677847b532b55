//! Symbol mangling.
//!
//! Mangling is deterministic and stable: two translation units computing the
//! name of the same instantiation must produce byte-equal strings, because
//! library instantiations deduplicate across units by symbol name alone.
//!
//! Scheme:
//! - primitives keep their surface name: `I32`, `F64`, `Str`
//! - `Ptr[X]` -> `ptr_X`, `MutPtr[X]` -> `mutptr_X`
//! - `ref X` -> `ref_X`, `mut ref X` -> `mutref_X`
//! - `A[B]` -> `A__B`; nesting flattens left to right: `Outer[Inner[I32]]`
//!   -> `Outer__Inner__I32`
//! - `[X; 16]` -> `arr16_X`, `[X]` -> `slice_X`
//! - tuples: `tup2_A_B`; functions: `fnptr2_A_B_R`
//! - const generic arguments append like type arguments: `List__I32__16`
//!
//! Top-level instantiation symbols are `Type__Args_method` for methods and
//! `func__Args` for free functions. Local (suite) instantiations carry the
//! `tml_<suite>_` prefix; library instantiations stay unprefixed so they are
//! stable across compilation units.

use tml_typeck::{ArraySize, Type, TypeEnv, TypeId};

/// Mangle one type.
pub fn mangle_type(env: &TypeEnv, ty: TypeId) -> String {
    match env.interner.get(ty) {
        Type::Prim(kind) => kind.name().to_string(),
        Type::Generic(name) => name.clone(),
        Type::Named { name, args, .. } => {
            let mut out = name.clone();
            for arg in args {
                out.push_str("__");
                out.push_str(&mangle_type(env, *arg));
            }
            out
        }
        Type::Ref { is_mut, inner } => {
            let prefix = if *is_mut { "mutref_" } else { "ref_" };
            format!("{prefix}{}", mangle_type(env, *inner))
        }
        Type::Ptr { is_mut, inner } => {
            let prefix = if *is_mut { "mutptr_" } else { "ptr_" };
            format!("{prefix}{}", mangle_type(env, *inner))
        }
        Type::Array { element, size } => match size {
            ArraySize::Const(n) => format!("arr{n}_{}", mangle_type(env, *element)),
            ArraySize::Param(p) => format!("arr{p}_{}", mangle_type(env, *element)),
        },
        Type::Slice { element } => format!("slice_{}", mangle_type(env, *element)),
        Type::Tuple(elems) => {
            let mut out = format!("tup{}", elems.len());
            for elem in elems {
                out.push('_');
                out.push_str(&mangle_type(env, *elem));
            }
            out
        }
        Type::Func {
            params,
            return_type,
        }
        | Type::Closure {
            params,
            return_type,
        } => {
            let mut out = format!("fnptr{}", params.len());
            for param in params {
                out.push('_');
                out.push_str(&mangle_type(env, *param));
            }
            out.push('_');
            out.push_str(&mangle_type(env, *return_type));
            out
        }
        Type::Class { name } => name.clone(),
        Type::DynBehavior { behavior, args } => {
            let mut out = format!("dyn_{behavior}");
            for arg in args {
                out.push_str("__");
                out.push_str(&mangle_type(env, *arg));
            }
            out
        }
    }
}

/// Mangle a generic type instantiation: base name plus type and const
/// arguments (`List__I32__16`).
pub fn mangle_instantiation(env: &TypeEnv, base: &str, args: &[TypeId], consts: &[u64]) -> String {
    let mut out = base.to_string();
    for arg in args {
        out.push_str("__");
        out.push_str(&mangle_type(env, *arg));
    }
    for value in consts {
        out.push_str("__");
        out.push_str(&value.to_string());
    }
    out
}

/// The symbol for an instantiated method: `Type__Args_method`.
pub fn method_symbol(env: &TypeEnv, type_name: &str, type_args: &[TypeId], method: &str) -> String {
    let mut out = mangle_instantiation(env, type_name, type_args, &[]);
    out.push('_');
    out.push_str(method);
    out
}

/// The symbol for an instantiated free function: `func__Args` (or plain
/// `func` when not generic).
pub fn function_symbol(env: &TypeEnv, func: &str, type_args: &[TypeId]) -> String {
    mangle_instantiation(env, func, type_args, &[])
}

/// Apply the suite prefix for local symbols. Library symbols must stay
/// unprefixed so all compilation units agree on them; the decision comes
/// from the `is_library` flag on the TypeEnv entry, never from the name.
pub fn apply_prefix(symbol: &str, suite: &str, is_library: bool) -> String {
    if is_library || suite.is_empty() {
        symbol.to_string()
    } else {
        format!("tml_{suite}_{symbol}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tml_ast::PrimKind;

    #[test]
    fn primitives_keep_surface_names() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        assert_eq!(mangle_type(&env, i32_ty), "I32");
        let str_ty = env.interner.str();
        assert_eq!(mangle_type(&env, str_ty), "Str");
    }

    #[test]
    fn nested_generics_flatten() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        let inner = env.interner.named("Inner", vec![i32_ty]);
        let outer = env.interner.named("Outer", vec![inner]);
        insta::assert_snapshot!(mangle_type(&env, outer), @"Outer__Inner__I32");
    }

    #[test]
    fn pointers_and_refs_take_prefixes() {
        let mut env = TypeEnv::new();
        let i8_ty = env.interner.prim(PrimKind::I8);
        let ptr = env.interner.intern(Type::Ptr {
            is_mut: false,
            inner: i8_ty,
        });
        assert_eq!(mangle_type(&env, ptr), "ptr_I8");
        let mutptr = env.interner.intern(Type::Ptr {
            is_mut: true,
            inner: i8_ty,
        });
        assert_eq!(mangle_type(&env, mutptr), "mutptr_I8");
    }

    #[test]
    fn const_args_join_the_key() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        assert_eq!(
            mangle_instantiation(&env, "List", &[i32_ty], &[16]),
            "List__I32__16"
        );
    }

    #[test]
    fn method_and_function_symbols() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        assert_eq!(method_symbol(&env, "Pair", &[i32_ty, i32_ty], "swap"), "Pair__I32__I32_swap");
        assert_eq!(function_symbol(&env, "max_of", &[i32_ty]), "max_of__I32");
    }

    #[test]
    fn mangling_is_deterministic_across_interners() {
        // The same structural type computed in two environments mangles
        // identically.
        let mut env_a = TypeEnv::new();
        let mut env_b = TypeEnv::new();
        let a = {
            let i64_ty = env_a.interner.prim(PrimKind::I64);
            env_a.interner.named("List", vec![i64_ty])
        };
        let b = {
            // Intern extra types first so the ids differ between interners.
            let _noise = env_b.interner.named("Noise", vec![]);
            let i64_ty = env_b.interner.prim(PrimKind::I64);
            env_b.interner.named("List", vec![i64_ty])
        };
        assert_eq!(mangle_type(&env_a, a), mangle_type(&env_b, b));
    }

    #[test]
    fn suite_prefix_applies_to_local_symbols_only() {
        assert_eq!(apply_prefix("List__I32_push", "app", false), "tml_app_List__I32_push");
        assert_eq!(apply_prefix("List__I32_push", "app", true), "List__I32_push");
    }
}
