//! Type lowering and layout.
//!
//! Maps semantic types to LLVM-level types and computes sizes, alignments,
//! and payload offsets. The sum-type representation is fixed:
//! `{ i32 tag, [N x i8] payload }` where N is the maximum variant payload
//! size -- `Outcome` uses tag 0 for `Ok` and 1 for `Err`, `Maybe` uses 0 for
//! `Just` and 1 for `Nothing`. `@flags` enums are bare integers of their
//! underlying width.

use rustc_hash::FxHashMap;

use tml_ast::PrimKind;
use tml_typeck::{ArraySize, Type, TypeEnv, TypeId};

use crate::mangle;

/// The LLVM type for a primitive.
pub fn ll_prim(kind: PrimKind) -> &'static str {
    match kind {
        PrimKind::I8 | PrimKind::U8 => "i8",
        PrimKind::I16 | PrimKind::U16 => "i16",
        PrimKind::I32 | PrimKind::U32 => "i32",
        PrimKind::I64 | PrimKind::U64 => "i64",
        PrimKind::I128 | PrimKind::U128 => "i128",
        PrimKind::F32 => "float",
        PrimKind::F64 => "double",
        PrimKind::Bool => "i1",
        PrimKind::Char => "i32",
        PrimKind::Str => "ptr",
        PrimKind::Unit | PrimKind::Never => "void",
    }
}

/// Builtin container types lowered to opaque runtime pointers.
fn is_opaque_runtime(name: &str) -> bool {
    matches!(
        name,
        "List"
            | "StringBuilder"
            | "Future"
            | "Context"
            | "Waker"
            | "Arc"
            | "Box"
            | "Heap"
            | "Rc"
            | "Shared"
            | "MutexGuard"
            | "RwLockReadGuard"
            | "RwLockWriteGuard"
            | "Ref"
            | "RefMut"
            | "Range"
    )
}

/// The LLVM-level type string for a semantic type.
pub fn ll_type(env: &TypeEnv, ty: TypeId) -> String {
    match env.interner.get(ty) {
        Type::Prim(kind) => ll_prim(*kind).to_string(),
        Type::Generic(_) => "ptr".to_string(),
        Type::Named { name, args, .. } => {
            if let Some(def) = env.enums.get(name) {
                if let Some(width) = def.flags {
                    return ll_prim(width).to_string();
                }
                return format!("%enum.{}", mangle::mangle_instantiation(env, name, args, &[]));
            }
            if env.structs.contains_key(name) {
                return format!("%struct.{}", mangle::mangle_instantiation(env, name, args, &[]));
            }
            // Builtin sums share the enum representation.
            if matches!(name.as_str(), "Maybe" | "Outcome" | "Ordering" | "Poll") {
                return format!("%enum.{}", mangle::mangle_instantiation(env, name, args, &[]));
            }
            if is_opaque_runtime(name) {
                return "ptr".to_string();
            }
            // Unknown named types (type parameters resolved late, foreign
            // types) travel as pointers.
            "ptr".to_string()
        }
        Type::Ref { .. } | Type::Ptr { .. } => "ptr".to_string(),
        Type::Array { element, size } => {
            let count = match size {
                ArraySize::Const(n) => *n,
                ArraySize::Param(_) => 0,
            };
            format!("[{} x {}]", count, ll_type(env, *element))
        }
        // A slice value is a (ptr, len) pair.
        Type::Slice { .. } => "{ ptr, i64 }".to_string(),
        Type::Tuple(elems) => {
            if elems.is_empty() {
                return "void".to_string();
            }
            let inner: Vec<String> = elems.iter().map(|e| ll_type(env, *e)).collect();
            format!("{{ {} }}", inner.join(", "))
        }
        Type::Func { .. } => "ptr".to_string(),
        // A closure value is a fat pair: raw function pointer + environment.
        Type::Closure { .. } => "{ ptr, ptr }".to_string(),
        Type::Class { .. } => "ptr".to_string(),
        // dyn values are fat: data pointer + vtable pointer.
        Type::DynBehavior { .. } => "{ ptr, ptr }".to_string(),
    }
}

/// Natural size in bytes.
pub fn size_of(env: &TypeEnv, ty: TypeId) -> u64 {
    match env.interner.get(ty) {
        Type::Prim(kind) => prim_size(*kind),
        Type::Generic(_) => 8,
        Type::Named { name, args, .. } => {
            if let Some(def) = env.enums.get(name).cloned() {
                if let Some(width) = def.flags {
                    return prim_size(width);
                }
                return enum_size(env, name, args);
            }
            if env.structs.contains_key(name) {
                return struct_size(env, name, args);
            }
            if matches!(name.as_str(), "Maybe" | "Outcome" | "Ordering" | "Poll") {
                return enum_size(env, name, args);
            }
            8
        }
        Type::Ref { .. } | Type::Ptr { .. } | Type::Func { .. } | Type::Class { .. } => 8,
        Type::Array { element, size } => {
            let count = match size {
                ArraySize::Const(n) => *n,
                ArraySize::Param(_) => 0,
            };
            count * size_of(env, *element)
        }
        Type::Slice { .. } | Type::Closure { .. } | Type::DynBehavior { .. } => 16,
        Type::Tuple(elems) => {
            let mut offset = 0u64;
            let mut max_align = 1u64;
            for elem in elems {
                let align = align_of(env, *elem);
                max_align = max_align.max(align);
                offset = align_up(offset, align) + size_of(env, *elem);
            }
            align_up(offset, max_align)
        }
    }
}

/// Natural alignment in bytes.
pub fn align_of(env: &TypeEnv, ty: TypeId) -> u64 {
    match env.interner.get(ty) {
        Type::Prim(kind) => prim_size(*kind).clamp(1, 16),
        Type::Array { element, .. } => align_of(env, *element),
        Type::Tuple(elems) => elems.iter().map(|e| align_of(env, *e)).max().unwrap_or(1),
        Type::Named { name, args, .. } => {
            if let Some(def) = env.enums.get(name) {
                if let Some(width) = def.flags {
                    return prim_size(width);
                }
            }
            if env.structs.contains_key(name) {
                let fields = instantiated_fields(env, name, args);
                return fields
                    .iter()
                    .map(|(_, t)| align_of(env, *t))
                    .max()
                    .unwrap_or(1);
            }
            8
        }
        _ => 8,
    }
}

fn prim_size(kind: PrimKind) -> u64 {
    match kind {
        PrimKind::I8 | PrimKind::U8 | PrimKind::Bool => 1,
        PrimKind::I16 | PrimKind::U16 => 2,
        PrimKind::I32 | PrimKind::U32 | PrimKind::F32 | PrimKind::Char => 4,
        PrimKind::I64 | PrimKind::U64 | PrimKind::F64 | PrimKind::Str => 8,
        PrimKind::I128 | PrimKind::U128 => 16,
        PrimKind::Unit | PrimKind::Never => 0,
    }
}

pub fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

/// A struct's fields with the instantiation's arguments substituted in.
pub fn instantiated_fields(env: &TypeEnv, name: &str, args: &[TypeId]) -> Vec<(String, TypeId)> {
    let Some(def) = env.structs.get(name).cloned() else {
        return Vec::new();
    };
    let mut subst = FxHashMap::default();
    for (param, arg) in def.type_params.iter().zip(args) {
        subst.insert(param.clone(), *arg);
    }
    // Interner writes need a mutable env; layout is called on a shared env,
    // so substitution happens through a scratch clone of the id when the
    // field is generic. Fields of concrete structs pass through untouched.
    def.fields
        .iter()
        .map(|(field_name, field_ty)| {
            (field_name.clone(), substitute_shared(env, *field_ty, &subst))
        })
        .collect()
}

/// Substitution without interner writes: returns the original id when the
/// type is already concrete, and otherwise resolves the parameter directly.
/// Composite generic fields are pre-interned by the generator before layout
/// queries, so the shallow cases here suffice.
fn substitute_shared(env: &TypeEnv, ty: TypeId, subst: &FxHashMap<String, TypeId>) -> TypeId {
    match env.interner.get(ty) {
        Type::Generic(name) => subst.get(name).copied().unwrap_or(ty),
        Type::Named { name, args, .. } if args.is_empty() => {
            subst.get(name).copied().unwrap_or(ty)
        }
        _ => ty,
    }
}

fn struct_size(env: &TypeEnv, name: &str, args: &[TypeId]) -> u64 {
    let fields = instantiated_fields(env, name, args);
    let mut offset = 0u64;
    let mut max_align = 1u64;
    for (_, field_ty) in &fields {
        let align = align_of(env, *field_ty);
        max_align = max_align.max(align);
        offset = align_up(offset, align) + size_of(env, *field_ty);
    }
    align_up(offset, max_align)
}

/// The payload types of every variant of an enum instantiation, in variant
/// order. Builtin sums (`Maybe`, `Outcome`, `Ordering`, `Poll`) have fixed
/// shapes.
pub fn enum_variants(env: &TypeEnv, name: &str, args: &[TypeId]) -> Vec<(String, Vec<TypeId>)> {
    match name {
        "Maybe" => vec![
            ("Just".to_string(), vec![args[0]]),
            ("Nothing".to_string(), vec![]),
        ],
        "Outcome" => vec![
            ("Ok".to_string(), vec![args[0]]),
            ("Err".to_string(), vec![args[1]]),
        ],
        "Ordering" => vec![
            ("Less".to_string(), vec![]),
            ("Equal".to_string(), vec![]),
            ("Greater".to_string(), vec![]),
        ],
        "Poll" => vec![
            ("Ready".to_string(), vec![args[0]]),
            ("Pending".to_string(), vec![]),
        ],
        _ => {
            let Some(def) = env.enums.get(name).cloned() else {
                return Vec::new();
            };
            let mut subst = FxHashMap::default();
            for (param, arg) in def.type_params.iter().zip(args) {
                subst.insert(param.clone(), *arg);
            }
            def.variants
                .iter()
                .map(|v| {
                    let payload = v
                        .payload
                        .iter()
                        .map(|p| substitute_shared(env, *p, &subst))
                        .collect();
                    (v.name.clone(), payload)
                })
                .collect()
        }
    }
}

/// Byte offsets of each payload element within the variant's payload area.
pub fn variant_payload_offsets(env: &TypeEnv, payload: &[TypeId]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(payload.len());
    let mut offset = 0u64;
    for ty in payload {
        let align = align_of(env, *ty);
        offset = align_up(offset, align);
        offsets.push(offset);
        offset += size_of(env, *ty);
    }
    offsets
}

/// The payload area size: the maximum across variants.
pub fn enum_payload_size(env: &TypeEnv, name: &str, args: &[TypeId]) -> u64 {
    enum_variants(env, name, args)
        .iter()
        .map(|(_, payload)| {
            let offsets = variant_payload_offsets(env, payload);
            match (offsets.last(), payload.last()) {
                (Some(last_offset), Some(last_ty)) => last_offset + size_of(env, *last_ty),
                _ => 0,
            }
        })
        .max()
        .unwrap_or(0)
}

fn enum_size(env: &TypeEnv, name: &str, args: &[TypeId]) -> u64 {
    // { i32 tag, [N x i8] payload }, padded to 8 when a payload exists.
    let payload = enum_payload_size(env, name, args);
    if payload == 0 {
        4
    } else {
        align_up(4 + payload, 8)
    }
}

/// The tag value of a variant. Builtin sums use their fixed tags; user
/// enums use registered discriminants.
pub fn variant_tag(env: &TypeEnv, enum_name: &str, variant: &str) -> Option<i128> {
    match (enum_name, variant) {
        ("Maybe", "Just") | ("Outcome", "Ok") | ("Ordering", "Less") | ("Poll", "Ready") => Some(0),
        ("Maybe", "Nothing")
        | ("Outcome", "Err")
        | ("Ordering", "Equal")
        | ("Poll", "Pending") => Some(1),
        ("Ordering", "Greater") => Some(2),
        _ => {
            let def = env.enums.get(enum_name)?;
            def.variant(variant).map(|(_, v)| v.discriminant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_lowering() {
        assert_eq!(ll_prim(PrimKind::I64), "i64");
        assert_eq!(ll_prim(PrimKind::Bool), "i1");
        assert_eq!(ll_prim(PrimKind::Str), "ptr");
        assert_eq!(ll_prim(PrimKind::Char), "i32");
    }

    #[test]
    fn outcome_tags_are_fixed() {
        let env = TypeEnv::new();
        assert_eq!(variant_tag(&env, "Outcome", "Ok"), Some(0));
        assert_eq!(variant_tag(&env, "Outcome", "Err"), Some(1));
        assert_eq!(variant_tag(&env, "Maybe", "Just"), Some(0));
        assert_eq!(variant_tag(&env, "Maybe", "Nothing"), Some(1));
    }

    #[test]
    fn maybe_i64_layout() {
        let mut env = TypeEnv::new();
        let i64_ty = env.interner.prim(PrimKind::I64);
        let payload = enum_payload_size(&env, "Maybe", &[i64_ty]);
        assert_eq!(payload, 8);
        let maybe = env.interner.maybe(i64_ty);
        assert_eq!(size_of(&env, maybe), 16);
        assert_eq!(ll_type(&env, maybe), "%enum.Maybe__I64");
    }

    #[test]
    fn payload_offsets_respect_alignment() {
        let mut env = TypeEnv::new();
        let i8_ty = env.interner.prim(PrimKind::I8);
        let i64_ty = env.interner.prim(PrimKind::I64);
        let offsets = variant_payload_offsets(&env, &[i8_ty, i64_ty]);
        assert_eq!(offsets, vec![0, 8]);
    }

    #[test]
    fn align_up_rounds() {
        assert_eq!(align_up(5, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(0, 4), 0);
    }
}
