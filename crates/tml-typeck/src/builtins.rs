//! Fixed builtin method tables.
//!
//! Each primitive kind, plus `Maybe`, `Outcome`, `List`, arrays, slices,
//! `Ordering` and `StringBuilder`, carries a closed table of methods the
//! checker consults before any user-defined impl. The tables here produce
//! result signatures only; lowering happens in the IR generator, which keys
//! off the same method names.
//!
//! Conventions:
//! - arithmetic on numerics returns Self, comparison returns Bool
//! - `cmp` returns `Ordering`, `partial_cmp` returns `Maybe[Ordering]`
//! - `to_string` / `debug_string` return `Str`
//! - bitwise on integers returns Self
//! - `checked_*` return `Maybe[Self]`, `saturating_*` / `wrapping_*` return Self

use tml_ast::PrimKind;

use crate::ty::{ArraySize, Type, TypeId, TypeInterner};

/// A builtin method signature: parameter types (receiver excluded) and the
/// result type. Signatures may mention `Generic` placeholders (`U` for
/// `Maybe::map`); the checker infers those from arguments.
#[derive(Debug, Clone)]
pub struct BuiltinSig {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    /// Type parameters open in this signature, to be inferred at the site.
    pub type_params: Vec<String>,
}

impl BuiltinSig {
    fn new(params: Vec<TypeId>, return_type: TypeId) -> Self {
        BuiltinSig {
            params,
            return_type,
            type_params: Vec::new(),
        }
    }

    fn generic(params: Vec<TypeId>, return_type: TypeId, type_params: Vec<&str>) -> Self {
        BuiltinSig {
            params,
            return_type,
            type_params: type_params.into_iter().map(String::from).collect(),
        }
    }
}

fn ordering(interner: &mut TypeInterner) -> TypeId {
    interner.named("Ordering", vec![])
}

/// Instance methods on a primitive receiver.
pub fn primitive_method(
    interner: &mut TypeInterner,
    kind: PrimKind,
    method: &str,
) -> Option<BuiltinSig> {
    let self_ty = interner.prim(kind);
    let bool_ty = interner.bool();
    let str_ty = interner.str();

    // Methods shared by every primitive.
    match method {
        "to_string" | "debug_string" => return Some(BuiltinSig::new(vec![], str_ty)),
        "eq" | "ne" => return Some(BuiltinSig::new(vec![self_ty], bool_ty)),
        _ => {}
    }

    let is_numeric = kind.is_integer() || kind.is_float();
    if is_numeric {
        match method {
            "add" | "sub" | "mul" | "div" | "rem" | "min" | "max" => {
                return Some(BuiltinSig::new(vec![self_ty], self_ty));
            }
            "neg" | "abs" => return Some(BuiltinSig::new(vec![], self_ty)),
            "lt" | "le" | "gt" | "ge" => return Some(BuiltinSig::new(vec![self_ty], bool_ty)),
            "cmp" => {
                let ord = ordering(interner);
                return Some(BuiltinSig::new(vec![self_ty], ord));
            }
            "partial_cmp" => {
                let ord = ordering(interner);
                let maybe_ord = interner.maybe(ord);
                return Some(BuiltinSig::new(vec![self_ty], maybe_ord));
            }
            _ => {}
        }
    }

    if kind.is_integer() {
        let u32_ty = interner.prim(PrimKind::U32);
        match method {
            "bitand" | "bitor" | "bitxor" => {
                return Some(BuiltinSig::new(vec![self_ty], self_ty));
            }
            "bitnot" => return Some(BuiltinSig::new(vec![], self_ty)),
            "shl" | "shr" | "rotate_left" | "rotate_right" | "pow" => {
                return Some(BuiltinSig::new(vec![u32_ty], self_ty));
            }
            "checked_add" | "checked_sub" | "checked_mul" | "checked_div" => {
                let maybe_self = interner.maybe(self_ty);
                return Some(BuiltinSig::new(vec![self_ty], maybe_self));
            }
            "saturating_add" | "saturating_sub" | "saturating_mul" | "wrapping_add"
            | "wrapping_sub" | "wrapping_mul" => {
                return Some(BuiltinSig::new(vec![self_ty], self_ty));
            }
            "leading_zeros" | "trailing_zeros" | "count_ones" => {
                return Some(BuiltinSig::new(vec![], u32_ty));
            }
            "swap_bytes" | "reverse_bits" => return Some(BuiltinSig::new(vec![], self_ty)),
            "is_power_of_two" => return Some(BuiltinSig::new(vec![], bool_ty)),
            _ => {}
        }
    }

    if kind.is_float() {
        match method {
            "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc" => {
                return Some(BuiltinSig::new(vec![], self_ty));
            }
            "pow" => return Some(BuiltinSig::new(vec![self_ty], self_ty)),
            "is_nan" | "is_infinite" | "is_finite" => {
                return Some(BuiltinSig::new(vec![], bool_ty));
            }
            _ => {}
        }
    }

    if kind == PrimKind::Bool {
        match method {
            "not" => return Some(BuiltinSig::new(vec![], bool_ty)),
            "bitand" | "bitor" | "bitxor" => {
                return Some(BuiltinSig::new(vec![bool_ty], bool_ty));
            }
            _ => {}
        }
    }

    if kind == PrimKind::Char {
        let u32_ty = interner.prim(PrimKind::U32);
        match method {
            "to_u32" => return Some(BuiltinSig::new(vec![], u32_ty)),
            "is_alphabetic" | "is_numeric" | "is_whitespace" => {
                return Some(BuiltinSig::new(vec![], bool_ty));
            }
            _ => {}
        }
    }

    if kind == PrimKind::Str {
        let i64_ty = interner.prim(PrimKind::I64);
        match method {
            "len" => return Some(BuiltinSig::new(vec![], i64_ty)),
            "is_empty" => return Some(BuiltinSig::new(vec![], bool_ty)),
            "concat" => return Some(BuiltinSig::new(vec![str_ty], str_ty)),
            "contains" | "starts_with" | "ends_with" => {
                return Some(BuiltinSig::new(vec![str_ty], bool_ty));
            }
            "substring" => return Some(BuiltinSig::new(vec![i64_ty, i64_ty], str_ty)),
            "trim" | "to_upper" | "to_lower" => return Some(BuiltinSig::new(vec![], str_ty)),
            "split" => {
                let list_str = interner.named("List", vec![str_ty]);
                return Some(BuiltinSig::new(vec![str_ty], list_str));
            }
            "char_at" => {
                let char_ty = interner.prim(PrimKind::Char);
                let maybe_char = interner.maybe(char_ty);
                return Some(BuiltinSig::new(vec![i64_ty], maybe_char));
            }
            "cmp" => {
                let ord = ordering(interner);
                return Some(BuiltinSig::new(vec![str_ty], ord));
            }
            _ => {}
        }
    }

    None
}

/// Static methods on a primitive used as a receiver (`I32::default()`).
pub fn primitive_static_method(
    interner: &mut TypeInterner,
    kind: PrimKind,
    method: &str,
) -> Option<BuiltinSig> {
    let self_ty = interner.prim(kind);
    match method {
        "default" => Some(BuiltinSig::new(vec![], self_ty)),
        "min_value" | "max_value" if kind.is_integer() => {
            Some(BuiltinSig::new(vec![], self_ty))
        }
        "from_str" if kind.is_integer() || kind.is_float() => {
            let str_ty = interner.str();
            let maybe_self = interner.maybe(self_ty);
            Some(BuiltinSig::new(vec![str_ty], maybe_self))
        }
        _ => None,
    }
}

/// Methods on `Maybe[T]`.
pub fn maybe_method(
    interner: &mut TypeInterner,
    inner: TypeId,
    method: &str,
) -> Option<BuiltinSig> {
    let bool_ty = interner.bool();
    let str_ty = interner.str();
    match method {
        "unwrap" => Some(BuiltinSig::new(vec![], inner)),
        "expect" => Some(BuiltinSig::new(vec![str_ty], inner)),
        "unwrap_or" => Some(BuiltinSig::new(vec![inner], inner)),
        "is_just" | "is_nothing" => Some(BuiltinSig::new(vec![], bool_ty)),
        "map" => {
            let u = interner.intern(Type::Generic("U".into()));
            let func = interner.intern(Type::Func {
                params: vec![inner],
                return_type: u,
            });
            let maybe_u = interner.maybe(u);
            Some(BuiltinSig::generic(vec![func], maybe_u, vec!["U"]))
        }
        "and_then" => {
            let u = interner.intern(Type::Generic("U".into()));
            let maybe_u = interner.maybe(u);
            let func = interner.intern(Type::Func {
                params: vec![inner],
                return_type: maybe_u,
            });
            Some(BuiltinSig::generic(vec![func], maybe_u, vec!["U"]))
        }
        "ok_or" => {
            let e = interner.intern(Type::Generic("E".into()));
            let outcome = interner.outcome(inner, e);
            Some(BuiltinSig::generic(vec![e], outcome, vec!["E"]))
        }
        _ => None,
    }
}

/// Methods on `Outcome[T, E]`.
pub fn outcome_method(
    interner: &mut TypeInterner,
    ok: TypeId,
    err: TypeId,
    method: &str,
) -> Option<BuiltinSig> {
    let bool_ty = interner.bool();
    let str_ty = interner.str();
    match method {
        "unwrap" => Some(BuiltinSig::new(vec![], ok)),
        "unwrap_err" => Some(BuiltinSig::new(vec![], err)),
        "expect" => Some(BuiltinSig::new(vec![str_ty], ok)),
        "unwrap_or" => Some(BuiltinSig::new(vec![ok], ok)),
        "is_ok" | "is_err" => Some(BuiltinSig::new(vec![], bool_ty)),
        "ok" => {
            let maybe_ok = interner.maybe(ok);
            Some(BuiltinSig::new(vec![], maybe_ok))
        }
        "err" => {
            let maybe_err = interner.maybe(err);
            Some(BuiltinSig::new(vec![], maybe_err))
        }
        "map" => {
            let u = interner.intern(Type::Generic("U".into()));
            let func = interner.intern(Type::Func {
                params: vec![ok],
                return_type: u,
            });
            let outcome_u = interner.outcome(u, err);
            Some(BuiltinSig::generic(vec![func], outcome_u, vec!["U"]))
        }
        "map_err" => {
            let f = interner.intern(Type::Generic("F".into()));
            let func = interner.intern(Type::Func {
                params: vec![err],
                return_type: f,
            });
            let outcome_f = interner.outcome(ok, f);
            Some(BuiltinSig::generic(vec![func], outcome_f, vec!["F"]))
        }
        _ => None,
    }
}

/// Methods on `List[T]`.
pub fn list_method(
    interner: &mut TypeInterner,
    elem: TypeId,
    method: &str,
) -> Option<BuiltinSig> {
    let i64_ty = interner.prim(PrimKind::I64);
    let bool_ty = interner.bool();
    let unit_ty = interner.unit();
    match method {
        "push" => Some(BuiltinSig::new(vec![elem], unit_ty)),
        "pop" => {
            let maybe_elem = interner.maybe(elem);
            Some(BuiltinSig::new(vec![], maybe_elem))
        }
        "get" => Some(BuiltinSig::new(vec![i64_ty], elem)),
        "set" => Some(BuiltinSig::new(vec![i64_ty, elem], unit_ty)),
        "len" => Some(BuiltinSig::new(vec![], i64_ty)),
        "is_empty" => Some(BuiltinSig::new(vec![], bool_ty)),
        "clear" => Some(BuiltinSig::new(vec![], unit_ty)),
        "contains" => Some(BuiltinSig::new(vec![elem], bool_ty)),
        "first" | "last" => {
            let maybe_elem = interner.maybe(elem);
            Some(BuiltinSig::new(vec![], maybe_elem))
        }
        _ => None,
    }
}

/// Static methods on `List[T]`.
pub fn list_static_method(
    interner: &mut TypeInterner,
    elem: TypeId,
    method: &str,
) -> Option<BuiltinSig> {
    let list_ty = interner.named("List", vec![elem]);
    let i64_ty = interner.prim(PrimKind::I64);
    match method {
        "new" => Some(BuiltinSig::new(vec![], list_ty)),
        "with_capacity" => Some(BuiltinSig::new(vec![i64_ty], list_ty)),
        _ => None,
    }
}

/// Methods on `[T; N]` arrays.
pub fn array_method(
    interner: &mut TypeInterner,
    elem: TypeId,
    size: &ArraySize,
    method: &str,
) -> Option<BuiltinSig> {
    let i64_ty = interner.prim(PrimKind::I64);
    let unit_ty = interner.unit();
    match method {
        "len" => Some(BuiltinSig::new(vec![], i64_ty)),
        "get" => Some(BuiltinSig::new(vec![i64_ty], elem)),
        "set" => Some(BuiltinSig::new(vec![i64_ty, elem], unit_ty)),
        "as_ptr" => {
            let ptr = interner.intern(Type::Ptr {
                is_mut: false,
                inner: elem,
            });
            Some(BuiltinSig::new(vec![], ptr))
        }
        "as_mut_ptr" => {
            let ptr = interner.intern(Type::Ptr {
                is_mut: true,
                inner: elem,
            });
            Some(BuiltinSig::new(vec![], ptr))
        }
        "as_slice" => {
            let _ = size;
            let slice = interner.intern(Type::Slice { element: elem });
            Some(BuiltinSig::new(vec![], slice))
        }
        _ => None,
    }
}

/// Methods on `[T]` slices.
pub fn slice_method(
    interner: &mut TypeInterner,
    elem: TypeId,
    method: &str,
) -> Option<BuiltinSig> {
    let i64_ty = interner.prim(PrimKind::I64);
    let bool_ty = interner.bool();
    let unit_ty = interner.unit();
    match method {
        "len" => Some(BuiltinSig::new(vec![], i64_ty)),
        "is_empty" => Some(BuiltinSig::new(vec![], bool_ty)),
        "get" => Some(BuiltinSig::new(vec![i64_ty], elem)),
        "set" => Some(BuiltinSig::new(vec![i64_ty, elem], unit_ty)),
        "swap" => Some(BuiltinSig::new(vec![i64_ty, i64_ty], unit_ty)),
        _ => None,
    }
}

/// Methods on `Ordering`.
pub fn ordering_method(interner: &mut TypeInterner, method: &str) -> Option<BuiltinSig> {
    let bool_ty = interner.bool();
    let str_ty = interner.str();
    let ord = ordering(interner);
    match method {
        "is_lt" | "is_le" | "is_gt" | "is_ge" | "is_eq" | "is_ne" => {
            Some(BuiltinSig::new(vec![], bool_ty))
        }
        "reverse" => Some(BuiltinSig::new(vec![], ord)),
        "then" => Some(BuiltinSig::new(vec![ord], ord)),
        "to_string" => Some(BuiltinSig::new(vec![], str_ty)),
        _ => None,
    }
}

/// Methods on `StringBuilder`.
pub fn string_builder_method(
    interner: &mut TypeInterner,
    method: &str,
) -> Option<BuiltinSig> {
    let str_ty = interner.str();
    let unit_ty = interner.unit();
    let i64_ty = interner.prim(PrimKind::I64);
    match method {
        "new" => {
            let sb = interner.named("StringBuilder", vec![]);
            Some(BuiltinSig::new(vec![], sb))
        }
        "append" => Some(BuiltinSig::new(vec![str_ty], unit_ty)),
        "append_char" => {
            let char_ty = interner.prim(PrimKind::Char);
            Some(BuiltinSig::new(vec![char_ty], unit_ty))
        }
        "len" => Some(BuiltinSig::new(vec![], i64_ty)),
        "build" => Some(BuiltinSig::new(vec![], str_ty)),
        _ => None,
    }
}

/// Methods synthesized on every `@flags` enum.
pub fn flags_method(
    interner: &mut TypeInterner,
    enum_name: &str,
    width: PrimKind,
    method: &str,
) -> Option<BuiltinSig> {
    let self_ty = interner.named(enum_name, vec![]);
    let width_ty = interner.prim(width);
    let bool_ty = interner.bool();
    match method {
        "bits" => Some(BuiltinSig::new(vec![], width_ty)),
        "has" => Some(BuiltinSig::new(vec![self_ty], bool_ty)),
        "add" | "remove" | "toggle" => Some(BuiltinSig::new(vec![self_ty], self_ty)),
        "is_empty" => Some(BuiltinSig::new(vec![], bool_ty)),
        _ => None,
    }
}

/// Static methods on a `@flags` enum.
pub fn flags_static_method(
    interner: &mut TypeInterner,
    enum_name: &str,
    width: PrimKind,
    method: &str,
) -> Option<BuiltinSig> {
    let self_ty = interner.named(enum_name, vec![]);
    let width_ty = interner.prim(width);
    match method {
        "from_bits" => {
            let maybe_self = interner.maybe(self_ty);
            Some(BuiltinSig::new(vec![width_ty], maybe_self))
        }
        "empty" | "all" => Some(BuiltinSig::new(vec![], self_ty)),
        _ => None,
    }
}

/// Compiler intrinsics recognized by bare name (any module prefix is
/// stripped by the caller). The checker plants these signatures; lowering
/// happens in the IR generator.
///
/// `type_args` carries the turbofish (`size_of[T]`); `arg_tys` drives the
/// polymorphic arithmetic group.
pub fn intrinsic_signature(
    interner: &mut TypeInterner,
    name: &str,
    type_args: &[TypeId],
    arg_tys: &[TypeId],
) -> Option<BuiltinSig> {
    let unit = interner.unit();
    let bool_ty = interner.bool();
    let i64_ty = interner.prim(PrimKind::I64);
    let u64_ty = interner.prim(PrimKind::U64);
    let u8_ty = interner.prim(PrimKind::U8);
    let str_ty = interner.str();
    let first_arg = arg_tys.first().copied();
    let second_arg = arg_tys.get(1).copied();
    let turbo = type_args.first().copied();

    let sig = match name {
        // I/O builtins accept any printable value.
        "print" | "println" => {
            let t = first_arg.unwrap_or(str_ty);
            BuiltinSig::new(vec![t], unit)
        }

        // Arithmetic and bitwise groups operate on the operand type.
        "llvm_add" | "llvm_sub" | "llvm_mul" | "llvm_div" | "llvm_rem" | "llvm_and"
        | "llvm_or" | "llvm_xor" | "llvm_shl" | "llvm_shr" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t, t], t)
        }
        "llvm_neg" | "llvm_not" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], t)
        }
        "llvm_eq" | "llvm_ne" | "llvm_lt" | "llvm_le" | "llvm_gt" | "llvm_ge" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t, t], bool_ty)
        }

        // Memory.
        "ptr_read" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            BuiltinSig::new(vec![ptr], inner)
        }
        "ptr_write" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            BuiltinSig::new(vec![ptr, inner], unit)
        }
        "ptr_offset" => {
            let ptr = first_arg?;
            BuiltinSig::new(vec![ptr, i64_ty], ptr)
        }
        "ptr_copy" | "copy" | "copy_nonoverlapping" => {
            let ptr = first_arg?;
            BuiltinSig::new(vec![ptr, ptr, i64_ty], unit)
        }
        "write_bytes" => {
            let ptr = first_arg?;
            BuiltinSig::new(vec![ptr, u8_ty, i64_ty], unit)
        }
        "store_byte" => {
            let ptr = first_arg?;
            BuiltinSig::new(vec![ptr, u8_ty], unit)
        }

        // Atomics: the trailing ordering argument types as whatever enum the
        // caller passes; only its position is fixed.
        "atomic_load" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            BuiltinSig::new(vec![ptr, second_arg.unwrap_or(i64_ty)], inner)
        }
        "atomic_store" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            BuiltinSig::new(vec![ptr, inner, arg_tys.get(2).copied().unwrap_or(i64_ty)], unit)
        }
        "atomic_cas" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            let outcome = interner.outcome(inner, inner);
            BuiltinSig::new(
                vec![ptr, inner, inner, arg_tys.get(3).copied().unwrap_or(i64_ty)],
                outcome,
            )
        }
        "atomic_exchange" | "atomic_add" | "atomic_sub" | "atomic_and" | "atomic_or"
        | "atomic_xor" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr)?;
            BuiltinSig::new(vec![ptr, inner, arg_tys.get(2).copied().unwrap_or(i64_ty)], inner)
        }
        "fence" | "compiler_fence" => {
            BuiltinSig::new(vec![first_arg.unwrap_or(i64_ty)], unit)
        }

        // Type information.
        "size_of" | "align_of" => BuiltinSig::new(vec![], i64_ty),
        "type_id" => BuiltinSig::new(vec![], u64_ty),
        "type_name" => BuiltinSig::new(vec![], str_ty),
        "transmute" => {
            let t = turbo?;
            BuiltinSig::new(vec![first_arg.unwrap_or(t)], t)
        }

        // Hints.
        "unreachable" => BuiltinSig::new(vec![], interner.never()),
        "assume" => BuiltinSig::new(vec![bool_ty], unit),
        "likely" | "unlikely" => BuiltinSig::new(vec![bool_ty], bool_ty),
        "black_box" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], t)
        }

        // Bit operations.
        "ctlz" | "cttz" | "ctpop" | "bswap" | "bitreverse" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], t)
        }

        // Checked / saturating arithmetic.
        "checked_add" | "checked_sub" | "checked_mul" | "checked_div" => {
            let t = first_arg?;
            let maybe_t = interner.maybe(t);
            BuiltinSig::new(vec![t, t], maybe_t)
        }
        "saturating_add" | "saturating_sub" | "saturating_mul" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t, t], t)
        }

        // Math.
        "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc"
        | "fabs" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], t)
        }
        "pow" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t, t], t)
        }
        "fma" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t, t, t], t)
        }

        // Slices and arrays.
        "slice_get" => {
            let s = first_arg?;
            let elem = slice_element(interner, s)?;
            BuiltinSig::new(vec![s, i64_ty], elem)
        }
        "slice_get_mut" | "slice_offset" => {
            let s = first_arg?;
            let elem = slice_element(interner, s)?;
            let ptr = interner.intern(Type::Ptr {
                is_mut: true,
                inner: elem,
            });
            BuiltinSig::new(vec![s, i64_ty], ptr)
        }
        "slice_set" => {
            let s = first_arg?;
            let elem = slice_element(interner, s)?;
            BuiltinSig::new(vec![s, i64_ty, elem], unit)
        }
        "slice_swap" => {
            let s = first_arg?;
            BuiltinSig::new(vec![s, i64_ty, i64_ty], unit)
        }
        "array_as_ptr" | "array_as_mut_ptr" => {
            let a = first_arg?;
            let elem = array_element(interner, a)?;
            let ptr = interner.intern(Type::Ptr {
                is_mut: name.ends_with("mut_ptr"),
                inner: elem,
            });
            BuiltinSig::new(vec![a], ptr)
        }
        "array_offset_ptr" | "array_offset_mut_ptr" => {
            let a = first_arg?;
            let elem = array_element(interner, a)?;
            let ptr = interner.intern(Type::Ptr {
                is_mut: name.contains("mut"),
                inner: elem,
            });
            BuiltinSig::new(vec![a, i64_ty], ptr)
        }

        // Reflection (requires the Reflect derive on T).
        "field_count" | "variant_count" => BuiltinSig::new(vec![], i64_ty),
        "field_name" => BuiltinSig::new(vec![i64_ty], str_ty),
        "field_type_id" => BuiltinSig::new(vec![i64_ty], u64_ty),
        "field_offset" => BuiltinSig::new(vec![i64_ty], i64_ty),

        // SIMD: lane-level operations on vector values.
        "simd_load" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr).unwrap_or(ptr);
            BuiltinSig::new(vec![ptr], inner)
        }
        "simd_store" => {
            let ptr = first_arg?;
            let inner = pointee(interner, ptr).unwrap_or(ptr);
            BuiltinSig::new(vec![ptr, inner], unit)
        }
        "simd_extract" => {
            let v = first_arg?;
            let i32_ty = interner.prim(PrimKind::I32);
            let f32_ty = interner.prim(PrimKind::F32);
            BuiltinSig::new(vec![v, i32_ty], f32_ty)
        }
        "simd_insert" => {
            let v = first_arg?;
            let i32_ty = interner.prim(PrimKind::I32);
            let f32_ty = interner.prim(PrimKind::F32);
            BuiltinSig::new(vec![v, i32_ty, f32_ty], v)
        }
        "simd_splat" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], t)
        }

        // Lifecycle.
        "drop" => {
            let t = first_arg?;
            BuiltinSig::new(vec![t], unit)
        }

        _ => return None,
    };
    Some(sig)
}

fn pointee(interner: &TypeInterner, ty: TypeId) -> Option<TypeId> {
    match interner.get(ty) {
        Type::Ptr { inner, .. } | Type::Ref { inner, .. } => Some(*inner),
        _ => None,
    }
}

fn slice_element(interner: &TypeInterner, ty: TypeId) -> Option<TypeId> {
    match interner.get(ty) {
        Type::Slice { element } => Some(*element),
        Type::Array { element, .. } => Some(*element),
        _ => None,
    }
}

fn array_element(interner: &TypeInterner, ty: TypeId) -> Option<TypeId> {
    match interner.get(ty) {
        Type::Array { element, .. } => Some(*element),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_returns_self_comparison_returns_bool() {
        let mut interner = TypeInterner::new();
        let add = primitive_method(&mut interner, PrimKind::I32, "add").expect("add exists");
        assert!(interner.is_prim(add.return_type, PrimKind::I32));
        let lt = primitive_method(&mut interner, PrimKind::I32, "lt").expect("lt exists");
        assert!(interner.is_prim(lt.return_type, PrimKind::Bool));
    }

    #[test]
    fn cmp_returns_ordering_partial_cmp_returns_maybe_ordering() {
        let mut interner = TypeInterner::new();
        let cmp = primitive_method(&mut interner, PrimKind::F64, "cmp").expect("cmp exists");
        assert_eq!(interner.display(cmp.return_type), "Ordering");
        let pc =
            primitive_method(&mut interner, PrimKind::F64, "partial_cmp").expect("partial_cmp");
        assert_eq!(interner.display(pc.return_type), "Maybe[Ordering]");
    }

    #[test]
    fn checked_ops_return_maybe_self() {
        let mut interner = TypeInterner::new();
        let sig = primitive_method(&mut interner, PrimKind::U8, "checked_add").expect("exists");
        assert_eq!(interner.display(sig.return_type), "Maybe[U8]");
    }

    #[test]
    fn bitwise_is_integer_only() {
        let mut interner = TypeInterner::new();
        assert!(primitive_method(&mut interner, PrimKind::I64, "bitand").is_some());
        assert!(primitive_method(&mut interner, PrimKind::F64, "bitand").is_none());
    }

    #[test]
    fn list_get_returns_element() {
        let mut interner = TypeInterner::new();
        let str_ty = interner.str();
        let sig = list_method(&mut interner, str_ty, "get").expect("get exists");
        assert_eq!(sig.return_type, str_ty);
    }

    #[test]
    fn flags_methods_use_underlying_width() {
        let mut interner = TypeInterner::new();
        let bits = flags_method(&mut interner, "Perm", PrimKind::U8, "bits").expect("bits");
        assert!(interner.is_prim(bits.return_type, PrimKind::U8));
        let has = flags_method(&mut interner, "Perm", PrimKind::U8, "has").expect("has");
        assert!(interner.is_prim(has.return_type, PrimKind::Bool));
    }
}
