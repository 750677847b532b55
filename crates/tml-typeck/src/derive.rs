//! Derive synthesis.
//!
//! Derives are expanded at registration time: each derive contributes method
//! signatures under `Type::method` so that body checking and codegen resolve
//! them like ordinary impl methods. The IR generator emits the corresponding
//! bodies for monomorphized instantiations.

use tml_ast::{Derive, PrimKind};
use tml_common::Span;

use crate::env::{FuncSig, TypeEnv};
use crate::ty::TypeId;

/// Whether a derived method is an instance method or a static constructor.
pub fn derive_is_static(method: &str) -> bool {
    matches!(method, "default" | "from_str" | "deserialize")
}

/// Synthesize the method signatures for one derive on `type_name`.
///
/// `self_ty` is the declared type applied to its own parameters, so derived
/// signatures on generic types mention the type's `Generic` placeholders and
/// substitute cleanly at instantiation.
pub fn synthesize(env: &mut TypeEnv, type_name: &str, self_ty: TypeId, derive: Derive, span: Span) {
    let mut add = |env: &mut TypeEnv, method: &str, params: Vec<TypeId>, ret: TypeId| {
        let key = format!("{type_name}::{method}");
        env.derived_methods.insert(
            key,
            FuncSig {
                name: method.to_string(),
                params,
                return_type: ret,
                type_params: Vec::new(),
                const_params: Vec::new(),
                is_async: false,
                span,
            },
        );
    };

    match derive {
        Derive::Debug => {
            let str_ty = env.interner.str();
            add(env, "debug_string", vec![], str_ty);
        }
        Derive::Display => {
            let str_ty = env.interner.str();
            add(env, "to_string", vec![], str_ty);
        }
        Derive::PartialEq => {
            let bool_ty = env.interner.bool();
            add(env, "eq", vec![self_ty], bool_ty);
            add(env, "ne", vec![self_ty], bool_ty);
        }
        Derive::Hash => {
            let u64_ty = env.interner.prim(PrimKind::U64);
            add(env, "hash", vec![], u64_ty);
        }
        Derive::Duplicate => {
            add(env, "duplicate", vec![], self_ty);
        }
        Derive::Default => {
            add(env, "default", vec![], self_ty);
        }
        Derive::PartialOrd => {
            let ord = env.interner.named("Ordering", vec![]);
            let maybe_ord = env.interner.maybe(ord);
            add(env, "partial_cmp", vec![self_ty], maybe_ord);
        }
        Derive::Ord => {
            let ord = env.interner.named("Ordering", vec![]);
            add(env, "cmp", vec![self_ty], ord);
        }
        Derive::FromStr => {
            let str_ty = env.interner.str();
            let maybe_self = env.interner.maybe(self_ty);
            add(env, "from_str", vec![str_ty], maybe_self);
        }
        Derive::Serialize => {
            let str_ty = env.interner.str();
            add(env, "serialize", vec![], str_ty);
        }
        Derive::Deserialize => {
            let str_ty = env.interner.str();
            let maybe_self = env.interner.maybe(self_ty);
            add(env, "deserialize", vec![str_ty], maybe_self);
        }
        // Reflect contributes no methods; it unlocks the reflection
        // intrinsics for the type.
        Derive::Reflect => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_eq_synthesizes_eq_and_ne() {
        let mut env = TypeEnv::new();
        let self_ty = env.interner.named("Point", vec![]);
        synthesize(&mut env, "Point", self_ty, Derive::PartialEq, Span::dummy());
        let eq = env.derived_methods.get("Point::eq").expect("eq synthesized");
        assert_eq!(eq.params, vec![self_ty]);
        assert!(env.derived_methods.contains_key("Point::ne"));
    }

    #[test]
    fn static_derives_are_flagged() {
        assert!(derive_is_static("default"));
        assert!(derive_is_static("from_str"));
        assert!(!derive_is_static("to_string"));
    }
}
