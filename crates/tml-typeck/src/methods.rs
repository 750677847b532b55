//! Method resolution.
//!
//! The resolution order here is the contract the IR generator relies on; the
//! two must agree exactly, so the emitter re-reads the recorded
//! [`MethodResolution`] rather than re-deriving anything.
//!
//! Order, for an instance call `recv.m(args)`:
//!
//! 1. primitive static receivers (`I32::default()`) -- see
//!    [`resolve_static_method`]
//! 2. class-name receivers (statics on the class and its ancestors) -- also
//!    [`resolve_static_method`]
//! 3. evaluate the receiver type, expand aliases, unwrap references
//! 4. `ReceiverType::method` against impl blocks and derived methods
//! 5. class instance receivers walk the base chain
//! 6. dyn-behavior receivers use the behavior's signature
//! 7. generic parameters constrained by a `where` bound use the bound's
//!    signature
//! 8. primitive builtin tables (including pointer methods)
//! 9. `Maybe`/`Outcome`/`List`/array/slice/`Ordering`/`StringBuilder`/flags
//!    tables
//! 10. closure/function receivers: `call`/`call_mut`/`call_once`
//! 11. a struct field of function type called as a method
//!
//! Auto-deref: when the receiver is a smart pointer and the method is not
//! found on the outer type, the lookup retries on the single inner type
//! argument.

use rustc_hash::FxHashMap;

use tml_ast::{PrimKind, Visibility};
use tml_common::Span;

use crate::builtins;
use crate::env::{MethodDef, TypeEnv};
use crate::error::TypeError;
use crate::traits;
use crate::ty::{Type, TypeId};

/// How a resolved call site dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchKind {
    /// A static method (no receiver value).
    Static,
    /// An instance method on a concrete impl or class.
    Instance,
    /// An instance method reached through smart-pointer auto-deref.
    AutoDeref,
    /// Dynamic dispatch through a behavior v-table.
    Dyn,
    /// A generic parameter's `where` bound supplied the signature.
    Bound,
    /// A builtin table method (primitive, Maybe, List, ...).
    Builtin,
    /// A `@flags` enum builtin.
    Flags,
    /// A pointer builtin (`read`/`write`/`is_null`/`offset`).
    Pointer,
    /// `call`/`call_mut`/`call_once` on a closure or function value.
    ClosureCall,
    /// A struct field of function type invoked as a method; carries the
    /// field index.
    FieldFuncPtr(usize),
}

/// The outcome of method resolution, recorded per call site in the typed AST.
#[derive(Debug, Clone)]
pub struct MethodResolution {
    /// The qualified target, e.g. `List::push` or `Shape::area`.
    pub target: String,
    pub kind: DispatchKind,
    /// Substituted parameter types, receiver excluded.
    pub params: Vec<TypeId>,
    /// Substituted result type.
    pub return_type: TypeId,
    /// The generic substitution applied, for the monomorphizer.
    pub substitution: FxHashMap<String, TypeId>,
    /// The receiver type the lookup succeeded on (after deref/alias steps).
    pub receiver: TypeId,
    /// Declared visibility, when the target is a class member.
    pub visibility: Option<Visibility>,
}

/// Resolve a static call `TypeName::method(args)` (steps 1-2, plus statics
/// on structs, enums, `List`, and `@flags` enums).
pub fn resolve_static_method(
    env: &mut TypeEnv,
    type_name: &str,
    explicit_type_args: &[TypeId],
    method: &str,
    arg_tys: &[TypeId],
    span: Span,
) -> Result<MethodResolution, TypeError> {
    // Step 1: primitive static receivers.
    if let Some(kind) = PrimKind::from_name(type_name) {
        if let Some(sig) = builtins::primitive_static_method(&mut env.interner, kind, method) {
            let receiver = env.interner.prim(kind);
            return Ok(builtin_resolution(
                env,
                format!("{type_name}::{method}"),
                DispatchKind::Builtin,
                sig,
                arg_tys,
                receiver,
            ));
        }
        return Err(TypeError::UnknownMethod {
            ty: type_name.to_string(),
            method: method.to_string(),
            span,
        });
    }

    // Step 2: class-name receivers dispatch statics on the class chain.
    if env.classes.contains_key(type_name) {
        let mut current = Some(type_name.to_string());
        while let Some(class_name) = current {
            let class = env.classes.get(&class_name).cloned();
            let Some(class) = class else { break };
            if let Some(m) = class.methods.iter().find(|m| m.sig.name == method) {
                if m.this.is_none() {
                    let class_ty = env.interner.intern(Type::Class {
                        name: class_name.clone(),
                    });
                    return finish_user_method(
                        env,
                        format!("{class_name}::{method}"),
                        DispatchKind::Static,
                        m.clone(),
                        &FxHashMap::default(),
                        explicit_type_args,
                        arg_tys,
                        class_ty,
                        span,
                    );
                }
            }
            current = class.base.clone();
        }
        return Err(TypeError::UnknownMethodOnClass {
            class: type_name.to_string(),
            method: method.to_string(),
            span,
        });
    }

    // `List[T]::new` and friends.
    if type_name == "List" {
        let elem = explicit_type_args.first().copied().unwrap_or_else(|| {
            env.interner.intern(Type::Generic("T".into()))
        });
        if let Some(sig) = builtins::list_static_method(&mut env.interner, elem, method) {
            let receiver = env.interner.named("List", vec![elem]);
            return Ok(builtin_resolution(
                env,
                format!("List::{method}"),
                DispatchKind::Builtin,
                sig,
                arg_tys,
                receiver,
            ));
        }
    }

    // `StringBuilder::new`.
    if type_name == "StringBuilder" && method == "new" {
        if let Some(sig) = builtins::string_builder_method(&mut env.interner, method) {
            let receiver = env.interner.named("StringBuilder", vec![]);
            return Ok(builtin_resolution(
                env,
                "StringBuilder::new".to_string(),
                DispatchKind::Builtin,
                sig,
                arg_tys,
                receiver,
            ));
        }
    }

    // `@flags` enum statics.
    if let Some(enum_def) = env.enums.get(type_name).cloned() {
        if let Some(width) = enum_def.flags {
            if let Some(sig) =
                builtins::flags_static_method(&mut env.interner, type_name, width, method)
            {
                let receiver = env.interner.named(type_name, vec![]);
                return Ok(builtin_resolution(
                    env,
                    format!("{type_name}::{method}"),
                    DispatchKind::Flags,
                    sig,
                    arg_tys,
                    receiver,
                ));
            }
        }
    }

    // Static impl methods and derived statics on structs/enums.
    let receiver = receiver_for_name(env, type_name, explicit_type_args);
    let receiver_subst = receiver_substitution(env, type_name, receiver);
    if let Some((qualified, m)) = find_impl_method(env, type_name, method) {
        if m.this.is_none() {
            return finish_user_method(
                env,
                qualified,
                DispatchKind::Static,
                m,
                &receiver_subst,
                explicit_type_args,
                arg_tys,
                receiver,
                span,
            );
        }
    }
    if let Some(sig) = env.derived_methods.get(&format!("{type_name}::{method}")).cloned() {
        let mut resolution = builtin_resolution(
            env,
            format!("{type_name}::{method}"),
            DispatchKind::Builtin,
            builtins::BuiltinSig {
                params: sig.params,
                return_type: sig.return_type,
                type_params: Vec::new(),
            },
            arg_tys,
            receiver,
        );
        apply_substitution(env, &mut resolution, &receiver_subst);
        return Ok(resolution);
    }

    Err(TypeError::UnknownMethod {
        ty: type_name.to_string(),
        method: method.to_string(),
        span,
    })
}

/// Resolve an instance method call (steps 3-11).
pub fn resolve_method(
    env: &mut TypeEnv,
    receiver_ty: TypeId,
    method: &str,
    arg_tys: &[TypeId],
    explicit_type_args: &[TypeId],
    bounds_in_scope: &[(String, Vec<String>)],
    span: Span,
) -> Result<MethodResolution, TypeError> {
    // Step 3: aliases, then references, for the purpose of lookup.
    let expanded = env.expand_alias(receiver_ty);
    let receiver = env.interner.deref_all(expanded);

    match resolve_on_type(env, receiver, method, arg_tys, explicit_type_args, bounds_in_scope, span)
    {
        Ok(resolution) => Ok(resolution),
        Err(primary) => {
            // Auto-deref retry on the smart-pointer family.
            if let Some(inner) = env.auto_deref_inner(receiver) {
                if let Ok(mut resolution) = resolve_on_type(
                    env,
                    inner,
                    method,
                    arg_tys,
                    explicit_type_args,
                    bounds_in_scope,
                    span,
                ) {
                    resolution.kind = DispatchKind::AutoDeref;
                    return Ok(resolution);
                }
            }
            Err(primary)
        }
    }
}

fn resolve_on_type(
    env: &mut TypeEnv,
    receiver: TypeId,
    method: &str,
    arg_tys: &[TypeId],
    explicit_type_args: &[TypeId],
    bounds_in_scope: &[(String, Vec<String>)],
    span: Span,
) -> Result<MethodResolution, TypeError> {
    let receiver_node = env.interner.get(receiver).clone();

    match receiver_node {
        // Step 8 (pointers carry their own arity/type codes).
        Type::Ptr { is_mut, inner } => {
            resolve_pointer_method(env, is_mut, inner, method, arg_tys, receiver, span)
        }

        // Step 6.
        Type::DynBehavior {
            ref behavior,
            ref args,
        } => {
            let def = env.behaviors.get(behavior).cloned().ok_or_else(|| {
                TypeError::UnknownType {
                    name: behavior.clone(),
                    span,
                }
            })?;
            let Some(m) = def.method(method).cloned() else {
                return Err(TypeError::UnknownMethodOnDyn {
                    behavior: behavior.clone(),
                    method: method.to_string(),
                    span,
                });
            };
            let subst = traits::behavior_substitution(env, behavior, args, receiver);
            let params = m
                .sig
                .params
                .iter()
                .map(|p| env.interner.substitute(*p, &subst, &FxHashMap::default()))
                .collect();
            let return_type =
                env.interner
                    .substitute(m.sig.return_type, &subst, &FxHashMap::default());
            Ok(MethodResolution {
                target: format!("{behavior}::{method}"),
                kind: DispatchKind::Dyn,
                params,
                return_type,
                substitution: subst,
                receiver,
                visibility: None,
            })
        }

        // Step 7.
        Type::Generic(ref param) => {
            for (bound_param, bounds) in bounds_in_scope {
                if bound_param != param {
                    continue;
                }
                for behavior in bounds {
                    let Some(def) = env.behaviors.get(behavior).cloned() else {
                        continue;
                    };
                    if let Some(m) = def.method(method).cloned() {
                        let subst = traits::behavior_substitution(env, behavior, &[], receiver);
                        let params = m
                            .sig
                            .params
                            .iter()
                            .map(|p| env.interner.substitute(*p, &subst, &FxHashMap::default()))
                            .collect();
                        let return_type = env.interner.substitute(
                            m.sig.return_type,
                            &subst,
                            &FxHashMap::default(),
                        );
                        return Ok(MethodResolution {
                            target: format!("{behavior}::{method}"),
                            kind: DispatchKind::Bound,
                            params,
                            return_type,
                            substitution: subst,
                            receiver,
                            visibility: None,
                        });
                    }
                }
            }
            Err(TypeError::UnknownMethod {
                ty: env.interner.display(receiver),
                method: method.to_string(),
                span,
            })
        }

        // Step 5.
        Type::Class { ref name } => {
            let mut current = Some(name.clone());
            while let Some(class_name) = current {
                let Some(class) = env.classes.get(&class_name).cloned() else {
                    break;
                };
                if let Some(m) = class.methods.iter().find(|m| m.sig.name == method) {
                    if m.this.is_some() {
                        let mut resolution = finish_user_method(
                            env,
                            format!("{class_name}::{method}"),
                            DispatchKind::Instance,
                            m.clone(),
                            &FxHashMap::default(),
                            explicit_type_args,
                            arg_tys,
                            receiver,
                            span,
                        )?;
                        resolution.visibility = Some(m.visibility);
                        return Ok(resolution);
                    }
                }
                current = class.base.clone();
            }
            Err(TypeError::UnknownMethodOnClass {
                class: name.clone(),
                method: method.to_string(),
                span,
            })
        }

        // Steps 4, 8, 9.
        Type::Prim(kind) => {
            // User impls on primitives take precedence over no table entry,
            // but the builtin tables are authoritative for their names.
            if let Some(sig) = builtins::primitive_method(&mut env.interner, kind, method) {
                return Ok(builtin_resolution(
                    env,
                    format!("{}::{method}", kind.name()),
                    DispatchKind::Builtin,
                    sig,
                    arg_tys,
                    receiver,
                ));
            }
            if let Some((qualified, m)) = find_impl_method(env, kind.name(), method) {
                let receiver_subst = FxHashMap::default();
                return finish_user_method(
                    env,
                    qualified,
                    DispatchKind::Instance,
                    m,
                    &receiver_subst,
                    explicit_type_args,
                    arg_tys,
                    receiver,
                    span,
                );
            }
            Err(TypeError::UnknownMethod {
                ty: kind.name().to_string(),
                method: method.to_string(),
                span,
            })
        }

        Type::Named { ref name, ref args, .. } => {
            resolve_on_named(env, receiver, name, args, method, arg_tys, explicit_type_args, span)
        }

        Type::Array { element, ref size } => {
            if let Some(sig) =
                builtins::array_method(&mut env.interner, element, size, method)
            {
                return Ok(builtin_resolution(
                    env,
                    format!("array::{method}"),
                    DispatchKind::Builtin,
                    sig,
                    arg_tys,
                    receiver,
                ));
            }
            Err(TypeError::UnknownMethod {
                ty: env.interner.display(receiver),
                method: method.to_string(),
                span,
            })
        }

        Type::Slice { element } => {
            if let Some(sig) = builtins::slice_method(&mut env.interner, element, method) {
                return Ok(builtin_resolution(
                    env,
                    format!("slice::{method}"),
                    DispatchKind::Builtin,
                    sig,
                    arg_tys,
                    receiver,
                ));
            }
            Err(TypeError::UnknownMethod {
                ty: env.interner.display(receiver),
                method: method.to_string(),
                span,
            })
        }

        // Step 10.
        Type::Closure {
            ref params,
            return_type,
        }
        | Type::Func {
            ref params,
            return_type,
        } => {
            if matches!(method, "call" | "call_mut" | "call_once") {
                return Ok(MethodResolution {
                    target: method.to_string(),
                    kind: DispatchKind::ClosureCall,
                    params: params.clone(),
                    return_type,
                    substitution: FxHashMap::default(),
                    receiver,
                    visibility: None,
                });
            }
            Err(TypeError::UnknownMethod {
                ty: env.interner.display(receiver),
                method: method.to_string(),
                span,
            })
        }

        _ => Err(TypeError::UnknownMethod {
            ty: env.interner.display(receiver),
            method: method.to_string(),
            span,
        }),
    }
}

fn resolve_on_named(
    env: &mut TypeEnv,
    receiver: TypeId,
    name: &str,
    args: &[TypeId],
    method: &str,
    arg_tys: &[TypeId],
    explicit_type_args: &[TypeId],
    span: Span,
) -> Result<MethodResolution, TypeError> {
    // Step 4: user impls win over the builtin container tables so library
    // code can extend its own types.
    if let Some((qualified, m)) = find_impl_method(env, name, method) {
        if m.this.is_some() {
            let receiver_subst = receiver_substitution(env, name, receiver);
            return finish_user_method(
                env,
                qualified,
                DispatchKind::Instance,
                m,
                &receiver_subst,
                explicit_type_args,
                arg_tys,
                receiver,
                span,
            );
        }
    }

    // Derived methods.
    if let Some(sig) = env.derived_methods.get(&format!("{name}::{method}")).cloned() {
        let receiver_subst = receiver_substitution(env, name, receiver);
        let mut resolution = builtin_resolution(
            env,
            format!("{name}::{method}"),
            DispatchKind::Builtin,
            builtins::BuiltinSig {
                params: sig.params,
                return_type: sig.return_type,
                type_params: Vec::new(),
            },
            arg_tys,
            receiver,
        );
        apply_substitution(env, &mut resolution, &receiver_subst);
        return Ok(resolution);
    }

    // Step 9: the fixed container tables.
    let table_sig = match (name, args) {
        ("Maybe", [inner]) => builtins::maybe_method(&mut env.interner, *inner, method),
        ("Outcome", [ok, err]) => {
            builtins::outcome_method(&mut env.interner, *ok, *err, method)
        }
        ("List", [elem]) => builtins::list_method(&mut env.interner, *elem, method),
        ("Ordering", []) => builtins::ordering_method(&mut env.interner, method),
        ("StringBuilder", []) => builtins::string_builder_method(&mut env.interner, method),
        _ => None,
    };
    if let Some(sig) = table_sig {
        return Ok(builtin_resolution(
            env,
            format!("{name}::{method}"),
            DispatchKind::Builtin,
            sig,
            arg_tys,
            receiver,
        ));
    }

    // `@flags` enum instance methods.
    if let Some(enum_def) = env.enums.get(name).cloned() {
        if let Some(width) = enum_def.flags {
            if let Some(sig) = builtins::flags_method(&mut env.interner, name, width, method) {
                return Ok(builtin_resolution(
                    env,
                    format!("{name}::{method}"),
                    DispatchKind::Flags,
                    sig,
                    arg_tys,
                    receiver,
                ));
            }
        }
    }

    // Step 11: a struct field of function type used as a callable.
    if let Some(struct_def) = env.structs.get(name).cloned() {
        if let Some(index) = struct_def.field_index(method) {
            let field_ty = struct_def.fields[index].1;
            let receiver_subst = receiver_substitution(env, name, receiver);
            let field_ty =
                env.interner
                    .substitute(field_ty, &receiver_subst, &FxHashMap::default());
            if let Type::Func {
                params,
                return_type,
            } = env.interner.get(field_ty).clone()
            {
                return Ok(MethodResolution {
                    target: format!("{name}.{method}"),
                    kind: DispatchKind::FieldFuncPtr(index),
                    params,
                    return_type,
                    substitution: receiver_subst,
                    receiver,
                    visibility: None,
                });
            }
        }
    }

    Err(TypeError::UnknownMethod {
        ty: env.interner.display(receiver),
        method: method.to_string(),
        span,
    })
}

fn resolve_pointer_method(
    env: &mut TypeEnv,
    is_mut: bool,
    inner: TypeId,
    method: &str,
    arg_tys: &[TypeId],
    receiver: TypeId,
    span: Span,
) -> Result<MethodResolution, TypeError> {
    let make = |env: &mut TypeEnv, params: Vec<TypeId>, ret: TypeId| MethodResolution {
        target: format!("ptr::{method}"),
        kind: DispatchKind::Pointer,
        params,
        return_type: ret,
        substitution: FxHashMap::default(),
        receiver,
        visibility: None,
    };
    match method {
        "read" => {
            if !arg_tys.is_empty() {
                return Err(TypeError::PointerReadArity { span });
            }
            Ok(make(env, vec![], inner))
        }
        "write" => {
            if arg_tys.len() != 1 {
                return Err(TypeError::PointerWriteArity { span });
            }
            if arg_tys[0] != inner {
                return Err(TypeError::Mismatch {
                    expected: env.interner.display(inner),
                    found: env.interner.display(arg_tys[0]),
                    context: "pointer write".into(),
                    span,
                });
            }
            let unit = env.interner.unit();
            Ok(make(env, vec![inner], unit))
        }
        "is_null" => {
            if !arg_tys.is_empty() {
                return Err(TypeError::PointerIsNullArity { span });
            }
            let bool_ty = env.interner.bool();
            Ok(make(env, vec![], bool_ty))
        }
        "offset" => {
            if arg_tys.len() != 1 {
                return Err(TypeError::PointerOffsetArity { span });
            }
            let is_int = env
                .interner
                .as_prim(arg_tys[0])
                .map(PrimKind::is_integer)
                .unwrap_or(false);
            if !is_int {
                return Err(TypeError::Mismatch {
                    expected: "an integer".into(),
                    found: env.interner.display(arg_tys[0]),
                    context: "pointer offset".into(),
                    span,
                });
            }
            let self_ty = env.interner.intern(Type::Ptr { is_mut, inner });
            Ok(make(env, vec![arg_tys[0]], self_ty))
        }
        _ => Err(TypeError::UnknownPointerMethod {
            method: method.to_string(),
            span,
        }),
    }
}

/// Locate `method` among the impl blocks registered for `type_name`.
fn find_impl_method(env: &TypeEnv, type_name: &str, method: &str) -> Option<(String, MethodDef)> {
    let indices = env.impls_by_type.get(type_name)?;
    for &idx in indices {
        let block = &env.impls[idx];
        if let Some(m) = block.method(method) {
            return Some((format!("{type_name}::{method}"), m.clone()));
        }
    }
    None
}

/// Build the substitution mapping a declaration's own type parameters to the
/// receiver's concrete arguments (`T -> I32` for a `List[I32]` receiver).
fn receiver_substitution(env: &TypeEnv, type_name: &str, receiver: TypeId) -> FxHashMap<String, TypeId> {
    let mut subst = FxHashMap::default();
    let receiver_args = match env.interner.get(receiver) {
        Type::Named { args, .. } => args.clone(),
        _ => Vec::new(),
    };
    let params: Option<Vec<String>> = env
        .structs
        .get(type_name)
        .map(|d| d.type_params.clone())
        .or_else(|| env.enums.get(type_name).map(|d| d.type_params.clone()))
        .or_else(|| {
            env.impls_by_type
                .get(type_name)
                .and_then(|idxs| idxs.first())
                .map(|&i| env.impls[i].type_params.clone())
        });
    if let Some(params) = params {
        for (param, arg) in params.iter().zip(receiver_args) {
            subst.insert(param.clone(), arg);
        }
    }
    subst.insert("Self".to_string(), receiver);
    subst.insert("This".to_string(), receiver);
    subst
}

fn receiver_for_name(env: &mut TypeEnv, type_name: &str, explicit_type_args: &[TypeId]) -> TypeId {
    let declared_params: Vec<String> = env
        .structs
        .get(type_name)
        .map(|d| d.type_params.clone())
        .or_else(|| env.enums.get(type_name).map(|d| d.type_params.clone()))
        .unwrap_or_default();
    let args: Vec<TypeId> = if !explicit_type_args.is_empty() {
        explicit_type_args.to_vec()
    } else {
        declared_params
            .iter()
            .map(|p| env.interner.intern(Type::Generic(p.clone())))
            .collect()
    };
    env.interner.named(type_name, args)
}

/// Finish resolving a user-declared method: merge receiver substitution,
/// turbofish, and argument inference; then substitute the signature and
/// check the enclosing where clauses.
#[allow(clippy::too_many_arguments)]
fn finish_user_method(
    env: &mut TypeEnv,
    target: String,
    kind: DispatchKind,
    m: MethodDef,
    receiver_subst: &FxHashMap<String, TypeId>,
    explicit_type_args: &[TypeId],
    arg_tys: &[TypeId],
    receiver: TypeId,
    span: Span,
) -> Result<MethodResolution, TypeError> {
    if m.sig.params.len() != arg_tys.len() {
        return Err(TypeError::ArityMismatch {
            name: target,
            expected: m.sig.params.len(),
            found: arg_tys.len(),
            span,
        });
    }

    let mut subst = receiver_subst.clone();
    subst.insert("Self".to_string(), receiver);
    subst.insert("This".to_string(), receiver);

    // Explicit turbofish overrides inference, positionally over the
    // method's own type parameters.
    for (param, arg) in m.sig.type_params.iter().zip(explicit_type_args) {
        subst.insert(param.clone(), *arg);
    }

    // Remaining parameters are inferred by structurally matching arguments.
    for (param_ty, arg_ty) in m.sig.params.iter().zip(arg_tys) {
        let mut inferred = FxHashMap::default();
        env.interner.infer_type_args(*param_ty, *arg_ty, &mut inferred);
        for (name, ty) in inferred {
            if m.sig.type_params.contains(&name) || receiver_subst.contains_key(&name) {
                subst.entry(name).or_insert(ty);
            }
        }
    }

    let params = m
        .sig
        .params
        .iter()
        .map(|p| env.interner.substitute(*p, &subst, &FxHashMap::default()))
        .collect();
    let return_type = env
        .interner
        .substitute(m.sig.return_type, &subst, &FxHashMap::default());

    // Where clauses of the method itself.
    let clauses: Vec<(String, Vec<String>)> = m
        .func
        .where_clauses
        .iter()
        .map(|w| (w.param.clone(), w.bounds.clone()))
        .collect();
    if let Some(err) = traits::check_where_clauses(env, &clauses, &subst, span).into_iter().next() {
        return Err(err);
    }

    Ok(MethodResolution {
        target,
        kind,
        params,
        return_type,
        substitution: subst,
        receiver,
        visibility: Some(m.visibility),
    })
}

/// Finish a builtin-table resolution: infer the signature's open type
/// parameters from arguments and substitute.
fn builtin_resolution(
    env: &mut TypeEnv,
    target: String,
    kind: DispatchKind,
    sig: builtins::BuiltinSig,
    arg_tys: &[TypeId],
    receiver: TypeId,
) -> MethodResolution {
    let mut subst = FxHashMap::default();
    if !sig.type_params.is_empty() {
        for (param_ty, arg_ty) in sig.params.iter().zip(arg_tys) {
            let mut inferred = FxHashMap::default();
            env.interner.infer_type_args(*param_ty, *arg_ty, &mut inferred);
            for (name, ty) in inferred {
                if sig.type_params.contains(&name) {
                    subst.entry(name).or_insert(ty);
                }
            }
        }
    }
    let params = sig
        .params
        .iter()
        .map(|p| env.interner.substitute(*p, &subst, &FxHashMap::default()))
        .collect();
    let return_type = env
        .interner
        .substitute(sig.return_type, &subst, &FxHashMap::default());
    MethodResolution {
        target,
        kind,
        params,
        return_type,
        substitution: subst,
        receiver,
        visibility: None,
    }
}

fn apply_substitution(
    env: &mut TypeEnv,
    resolution: &mut MethodResolution,
    subst: &FxHashMap<String, TypeId>,
) {
    resolution.params = resolution
        .params
        .iter()
        .map(|p| env.interner.substitute(*p, subst, &FxHashMap::default()))
        .collect();
    resolution.return_type =
        env.interner
            .substitute(resolution.return_type, subst, &FxHashMap::default());
    for (k, v) in subst {
        resolution.substitution.entry(k.clone()).or_insert(*v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_static_default() {
        let mut env = TypeEnv::new();
        let resolution =
            resolve_static_method(&mut env, "I32", &[], "default", &[], Span::dummy())
                .expect("resolves");
        assert!(env.interner.is_prim(resolution.return_type, PrimKind::I32));
        assert_eq!(resolution.target, "I32::default");
    }

    #[test]
    fn list_push_resolves_through_table() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        let list = env.interner.named("List", vec![i32_ty]);
        let resolution = resolve_method(
            &mut env,
            list,
            "push",
            &[i32_ty],
            &[],
            &[],
            Span::dummy(),
        )
        .expect("resolves");
        assert_eq!(resolution.kind, DispatchKind::Builtin);
        assert_eq!(resolution.params, vec![i32_ty]);
    }

    #[test]
    fn method_lookup_unwraps_references() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        let list = env.interner.named("List", vec![i32_ty]);
        let list_ref = env.interner.intern(Type::Ref {
            is_mut: true,
            inner: list,
        });
        let resolution =
            resolve_method(&mut env, list_ref, "len", &[], &[], &[], Span::dummy())
                .expect("resolves");
        assert!(env.interner.is_prim(resolution.return_type, PrimKind::I64));
    }

    #[test]
    fn auto_deref_reaches_inner_type() {
        let mut env = TypeEnv::new();
        let str_ty = env.interner.str();
        let arc = env.interner.named("Arc", vec![str_ty]);
        let resolution =
            resolve_method(&mut env, arc, "len", &[], &[], &[], Span::dummy())
                .expect("resolves via deref");
        assert_eq!(resolution.kind, DispatchKind::AutoDeref);
    }

    #[test]
    fn pointer_write_wrong_arity_is_t081() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        let ptr = env.interner.intern(Type::Ptr {
            is_mut: true,
            inner: i32_ty,
        });
        let err = resolve_method(&mut env, ptr, "write", &[], &[], &[], Span::dummy())
            .expect_err("arity error");
        assert_eq!(err.code(), "T081");
    }

    #[test]
    fn unknown_pointer_method_is_t084() {
        let mut env = TypeEnv::new();
        let i32_ty = env.interner.prim(PrimKind::I32);
        let ptr = env.interner.intern(Type::Ptr {
            is_mut: false,
            inner: i32_ty,
        });
        let err = resolve_method(&mut env, ptr, "frobnicate", &[], &[], &[], Span::dummy())
            .expect_err("unknown");
        assert_eq!(err.code(), "T084");
    }

    #[test]
    fn generic_bound_supplies_signature() {
        let mut env = TypeEnv::new();
        let str_ty = env.interner.str();
        env.behaviors.insert(
            "Printable".into(),
            crate::env::BehaviorDef {
                name: "Printable".into(),
                type_params: vec![],
                required: vec![],
                methods: vec![crate::env::BehaviorMethod {
                    this: Some(tml_ast::ThisKind::Ref),
                    sig: crate::env::FuncSig {
                        name: "print_to".into(),
                        params: vec![],
                        return_type: str_ty,
                        type_params: vec![],
                        const_params: vec![],
                        is_async: false,
                        span: Span::dummy(),
                    },
                    default: None,
                }],
                span: Span::dummy(),
            },
        );
        let t = env.interner.intern(Type::Generic("T".into()));
        let bounds = vec![("T".to_string(), vec!["Printable".to_string()])];
        let resolution =
            resolve_method(&mut env, t, "print_to", &[], &[], &bounds, Span::dummy())
                .expect("bound method resolves");
        assert_eq!(resolution.kind, DispatchKind::Bound);
        assert_eq!(resolution.target, "Printable::print_to");
    }
}
