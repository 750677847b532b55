//! Behavior satisfaction and where-clause checking.
//!
//! A `where T: B1 + B2` clause is satisfied at an instantiation site when,
//! for the concrete type bound to `T`, an `impl B_i for T` is registered for
//! every bound. Behaviors may require other behaviors; a direct impl of a
//! behavior implies the implementor also registered impls for its required
//! list (validated at registration), so satisfaction checks the direct index
//! plus the required closure.

use rustc_hash::FxHashMap;

use tml_common::Span;

use crate::env::TypeEnv;
use crate::error::TypeError;
use crate::ty::{Type, TypeId};

/// The name under which a type's impls are indexed: the base name of a Named
/// type, the primitive name, or the class name.
pub fn impl_lookup_name(env: &TypeEnv, ty: TypeId) -> Option<String> {
    match env.interner.get(ty) {
        Type::Prim(kind) => Some(kind.name().to_string()),
        Type::Named { name, .. } => Some(name.clone()),
        Type::Class { name } => Some(name.clone()),
        _ => None,
    }
}

/// Whether `ty` satisfies `behavior`, directly or through a behavior that
/// requires it.
pub fn satisfies(env: &TypeEnv, ty: TypeId, behavior: &str) -> bool {
    let Some(name) = impl_lookup_name(env, ty) else {
        return false;
    };
    if env.type_implements(&name, behavior) {
        return true;
    }
    // An impl of a behavior whose `required` list names `behavior` counts:
    // the implementor was validated to carry the whole requirement chain.
    for ((impl_ty, impl_behavior), _) in &env.impl_index {
        if impl_ty == &name {
            if let Some(def) = env.behaviors.get(impl_behavior) {
                if requires_transitively(env, def.name.as_str(), behavior, 0) {
                    return true;
                }
            }
        }
    }
    false
}

fn requires_transitively(env: &TypeEnv, from: &str, target: &str, depth: usize) -> bool {
    if depth > 16 {
        return false;
    }
    let Some(def) = env.behaviors.get(from) else {
        return false;
    };
    def.required.iter().any(|r| {
        r == target || requires_transitively(env, r, target, depth + 1)
    })
}

/// Check a substitution against a set of where clauses. Returns one error
/// per unsatisfied bound.
pub fn check_where_clauses(
    env: &TypeEnv,
    where_clauses: &[(String, Vec<String>)],
    subst: &FxHashMap<String, TypeId>,
    span: Span,
) -> Vec<TypeError> {
    let mut errors = Vec::new();
    for (param, bounds) in where_clauses {
        let Some(&concrete) = subst.get(param) else {
            // An unbound parameter means inference already failed; that is
            // reported separately.
            continue;
        };
        for bound in bounds {
            if !satisfies(env, concrete, bound) {
                errors.push(TypeError::BoundUnsatisfied {
                    ty: env.interner.display(concrete),
                    behavior: bound.clone(),
                    span,
                });
            }
        }
    }
    errors
}

/// Build the substitution map for a behavior method resolved through a dyn
/// receiver or a generic bound: the behavior's own type parameters map to
/// the dyn/bound arguments, and `Self`/`This` map to the receiver.
pub fn behavior_substitution(
    env: &TypeEnv,
    behavior: &str,
    behavior_args: &[TypeId],
    receiver: TypeId,
) -> FxHashMap<String, TypeId> {
    let mut subst = FxHashMap::default();
    if let Some(def) = env.behaviors.get(behavior) {
        for (param, arg) in def.type_params.iter().zip(behavior_args) {
            subst.insert(param.clone(), *arg);
        }
    }
    subst.insert("Self".to_string(), receiver);
    subst.insert("This".to_string(), receiver);
    subst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{BehaviorDef, ImplDef};

    fn register_behavior(env: &mut TypeEnv, name: &str, required: Vec<String>) {
        env.behaviors.insert(
            name.to_string(),
            BehaviorDef {
                name: name.to_string(),
                type_params: vec![],
                required,
                methods: vec![],
                span: Span::dummy(),
            },
        );
    }

    fn register_empty_impl(env: &mut TypeEnv, ty: &str, behavior: &str) {
        env.add_impl(ImplDef {
            target_name: ty.to_string(),
            target_args: vec![],
            type_params: vec![],
            where_clauses: vec![],
            behavior: Some((behavior.to_string(), vec![])),
            methods: vec![],
            is_library: false,
            span: Span::dummy(),
        });
    }

    #[test]
    fn direct_impl_satisfies() {
        let mut env = TypeEnv::new();
        register_behavior(&mut env, "Printable", vec![]);
        register_empty_impl(&mut env, "Point", "Printable");
        let point = env.interner.named("Point", vec![]);
        assert!(satisfies(&env, point, "Printable"));
        assert!(!satisfies(&env, point, "Hashable"));
    }

    #[test]
    fn unsatisfied_bound_reports_error() {
        let mut env = TypeEnv::new();
        register_behavior(&mut env, "Comparable", vec![]);
        let str_ty = env.interner.str();
        let mut subst = FxHashMap::default();
        subst.insert("T".to_string(), str_ty);
        let errors = check_where_clauses(
            &env,
            &[("T".to_string(), vec!["Comparable".to_string()])],
            &subst,
            Span::dummy(),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "T060");
    }

    #[test]
    fn behavior_substitution_maps_self() {
        let mut env = TypeEnv::new();
        env.behaviors.insert(
            "Container".into(),
            BehaviorDef {
                name: "Container".into(),
                type_params: vec!["Item".into()],
                required: vec![],
                methods: vec![],
                span: Span::dummy(),
            },
        );
        let i32_ty = env.interner.prim(tml_ast::PrimKind::I32);
        let recv = env.interner.named("Bag", vec![]);
        let subst = behavior_substitution(&env, "Container", &[i32_ty], recv);
        assert_eq!(subst.get("Item"), Some(&i32_ty));
        assert_eq!(subst.get("Self"), Some(&recv));
        assert_eq!(subst.get("This"), Some(&recv));
    }
}
