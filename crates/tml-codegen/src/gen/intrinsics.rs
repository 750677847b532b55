//! Intrinsic lowering.
//!
//! A closed set of function names lowers directly to fixed IR sequences.
//! Sizes and alignments of aggregates come from the GEP-null trick
//! (`getelementptr T, ptr null, i32 1` then `ptrtoint`); primitives use the
//! layout table. Atomic operations take a trailing ordering argument;
//! `atomic_cas` produces `Outcome[T, T]` with `Ok` on success.
//!
//! Every intrinsic call site also records a coverage hit when the coverage
//! hook is enabled (the caller emits it before dispatching here).

use tml_ast as ast;
use tml_ast::ExprKind;
use tml_typeck::{MethodResolution, Type, TypeId};

use crate::layout;
use crate::mangle;

use super::{IrGen, Val};

impl IrGen<'_> {
    pub fn emit_intrinsic(
        &mut self,
        expr: &ast::Expr,
        resolution: &MethodResolution,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let name = resolution.target.as_str().to_string();
        let ret_ll = layout::ll_type(self.env, ret_ty);
        let turbo = resolution
            .substitution
            .get("T")
            .copied()
            .map(|t| self.apply_subst(t));

        match name.as_str() {
            // ── I/O ──────────────────────────────────────────────────
            "print" | "println" => {
                let arg = args[0].clone();
                let arg_ll = arg.ty.clone();
                match arg_ll.as_str() {
                    "ptr" => {
                        self.f
                            .emit(&format!("call void @print_str(ptr {})", arg.reg));
                    }
                    "i1" => {
                        self.module
                            .declare("str_from_bool", "declare ptr @str_from_bool(i1)");
                        let s = self.f.fresh_reg();
                        self.f
                            .emit(&format!("{s} = call ptr @str_from_bool(i1 {})", arg.reg));
                        self.f.emit(&format!("call void @print_str(ptr {s})"));
                    }
                    "float" | "double" => {
                        self.module
                            .declare("str_from_f64", "declare ptr @str_from_f64(double)");
                        let wide = self.coerce(arg, "double");
                        let s = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{s} = call ptr @str_from_f64(double {})",
                            wide.reg
                        ));
                        self.f.emit(&format!("call void @print_str(ptr {s})"));
                    }
                    _ => {
                        let src = call_args(expr).first().map(|a| self.node_type(a.id));
                        let wide = self.coerce_from(arg, src, "i64");
                        self.f
                            .emit(&format!("call void @print_i64(i64 {})", wide.reg));
                    }
                }
                if name == "println" {
                    let newline = self.module.intern_string("\n");
                    self.f
                        .emit(&format!("call void @print_str(ptr {newline})"));
                }
                Val::unit()
            }

            // ── arithmetic ───────────────────────────────────────────
            "llvm_add" | "llvm_sub" | "llvm_mul" | "llvm_div" | "llvm_rem" => {
                let ll = args[0].ty.clone();
                let is_float = ll == "float" || ll == "double";
                let instr = match (name.as_str(), is_float) {
                    ("llvm_add", false) => "add",
                    ("llvm_add", true) => "fadd",
                    ("llvm_sub", false) => "sub",
                    ("llvm_sub", true) => "fsub",
                    ("llvm_mul", false) => "mul",
                    ("llvm_mul", true) => "fmul",
                    ("llvm_div", false) => "sdiv",
                    ("llvm_div", true) => "fdiv",
                    (_, false) => "srem",
                    (_, true) => "frem",
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = {instr} {ll} {}, {}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, ll)
            }
            "llvm_neg" => {
                let ll = args[0].ty.clone();
                let reg = self.f.fresh_reg();
                if ll == "float" || ll == "double" {
                    self.f.emit(&format!("{reg} = fneg {ll} {}", args[0].reg));
                } else {
                    self.f
                        .emit(&format!("{reg} = sub {ll} 0, {}", args[0].reg));
                }
                Val::new(reg, ll)
            }

            // ── bitwise ──────────────────────────────────────────────
            "llvm_and" | "llvm_or" | "llvm_xor" | "llvm_shl" | "llvm_shr" => {
                let ll = args[0].ty.clone();
                let instr = match name.as_str() {
                    "llvm_and" => "and",
                    "llvm_or" => "or",
                    "llvm_xor" => "xor",
                    "llvm_shl" => "shl",
                    _ => "ashr",
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = {instr} {ll} {}, {}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, ll)
            }
            "llvm_not" => {
                let ll = args[0].ty.clone();
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = xor {ll} {}, -1", args[0].reg));
                Val::new(reg, ll)
            }

            // ── compare ──────────────────────────────────────────────
            "llvm_eq" | "llvm_ne" | "llvm_lt" | "llvm_le" | "llvm_gt" | "llvm_ge" => {
                let ll = args[0].ty.clone();
                let is_float = ll == "float" || ll == "double";
                let (instr, pred) = if is_float {
                    (
                        "fcmp",
                        match name.as_str() {
                            "llvm_eq" => "oeq",
                            "llvm_ne" => "one",
                            "llvm_lt" => "olt",
                            "llvm_le" => "ole",
                            "llvm_gt" => "ogt",
                            _ => "oge",
                        },
                    )
                } else {
                    (
                        "icmp",
                        match name.as_str() {
                            "llvm_eq" => "eq",
                            "llvm_ne" => "ne",
                            "llvm_lt" => "slt",
                            "llvm_le" => "sle",
                            "llvm_gt" => "sgt",
                            _ => "sge",
                        },
                    )
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = {instr} {pred} {ll} {}, {}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, "i1")
            }

            // ── memory ───────────────────────────────────────────────
            "ptr_read" => {
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = load {ret_ll}, ptr {}", args[0].reg));
                Val::new(reg, ret_ll)
            }
            "ptr_write" => {
                self.f.emit(&format!(
                    "store {} {}, ptr {}",
                    args[1].ty, args[1].reg, args[0].reg
                ));
                Val::unit()
            }
            "ptr_offset" => {
                let elem_ll = turbo
                    .map(|t| layout::ll_type(self.env, t))
                    .unwrap_or_else(|| "i8".to_string());
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = getelementptr inbounds {elem_ll}, ptr {}, i64 {}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, "ptr")
            }
            "ptr_copy" | "copy" => {
                self.f.emit(&format!(
                    "call void @llvm.memmove.p0.p0.i64(ptr {}, ptr {}, i64 {}, i1 false)",
                    args[0].reg, args[1].reg, args[2].reg
                ));
                Val::unit()
            }
            "copy_nonoverlapping" => {
                self.f.emit(&format!(
                    "call void @llvm.memcpy.p0.p0.i64(ptr {}, ptr {}, i64 {}, i1 false)",
                    args[0].reg, args[1].reg, args[2].reg
                ));
                Val::unit()
            }
            "write_bytes" => {
                self.f.emit(&format!(
                    "call void @llvm.memset.p0.i64(ptr {}, i8 {}, i64 {}, i1 false)",
                    args[0].reg, args[1].reg, args[2].reg
                ));
                Val::unit()
            }
            "store_byte" => {
                self.f.emit(&format!(
                    "store i8 {}, ptr {}",
                    args[1].reg, args[0].reg
                ));
                Val::unit()
            }

            // ── atomics ──────────────────────────────────────────────
            "atomic_load" => {
                let ordering = self.atomic_ordering(expr, 1);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = load atomic {ret_ll}, ptr {} {ordering}, align {}",
                    args[0].reg,
                    atomic_align(&ret_ll)
                ));
                Val::new(reg, ret_ll)
            }
            "atomic_store" => {
                let ordering = self.atomic_ordering(expr, 2);
                self.f.emit(&format!(
                    "store atomic {} {}, ptr {} {ordering}, align {}",
                    args[1].ty,
                    args[1].reg,
                    args[0].reg,
                    atomic_align(&args[1].ty)
                ));
                Val::unit()
            }
            "atomic_cas" => {
                // compare_exchange: Outcome[T, T], Ok carries the read value
                // on success, Err the observed value on failure.
                let ordering = self.atomic_ordering(expr, 3);
                let ll = args[1].ty.clone();
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = cmpxchg ptr {}, {ll} {}, {ll} {} {ordering} {ordering}",
                    args[0].reg, args[1].reg, args[2].reg
                ));
                let observed = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{observed} = extractvalue {{ {ll}, i1 }} {pair}, 0"
                ));
                let success = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{success} = extractvalue {{ {ll}, i1 }} {pair}, 1"
                ));
                let failed = self.f.fresh_reg();
                self.f
                    .emit(&format!("{failed} = xor i1 {success}, true"));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {failed} to i32"));
                let value_ty = self.value_type_of_ll(&ll);
                self.build_enum_value_dyn(
                    ret_ty,
                    &tag,
                    &[(Val::new(observed, ll), value_ty)],
                )
            }
            "atomic_exchange" | "atomic_add" | "atomic_sub" | "atomic_and" | "atomic_or"
            | "atomic_xor" => {
                let ordering = self.atomic_ordering(expr, 2);
                let op = match name.as_str() {
                    "atomic_exchange" => "xchg",
                    "atomic_add" => "add",
                    "atomic_sub" => "sub",
                    "atomic_and" => "and",
                    "atomic_or" => "or",
                    _ => "xor",
                };
                let ll = args[1].ty.clone();
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = atomicrmw {op} ptr {}, {ll} {} {ordering}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, ll)
            }
            "fence" => {
                let ordering = self.atomic_ordering(expr, 0);
                self.f.emit(&format!("fence {ordering}"));
                Val::unit()
            }
            "compiler_fence" => {
                let ordering = self.atomic_ordering(expr, 0);
                self.f
                    .emit(&format!("fence syncscope(\"singlethread\") {ordering}"));
                Val::unit()
            }

            // ── type information ─────────────────────────────────────
            "size_of" | "align_of" => {
                let Some(target) = turbo else {
                    self.codegen_error("C003", format!("{name} requires a type argument"), expr.span);
                    return Val::unit();
                };
                self.emit_size_query(target, name == "align_of")
            }
            "type_id" => {
                let Some(target) = turbo else {
                    return Val::new("0", "i64");
                };
                // A stable hash of the mangled name.
                let mangled = mangle::mangle_type(self.env, target);
                let id = fnv1a(&mangled);
                Val::new(id.to_string(), "i64")
            }
            "type_name" => {
                let Some(target) = turbo else {
                    return Val::unit();
                };
                let display = self.env.interner.display(target);
                let global = self.module.intern_string(&display);
                Val::new(global, "ptr")
            }
            "transmute" => {
                // Same-size reinterpretation through a stack slot.
                let src = &args[0];
                let src_ty = self.value_type_of_ll(&src.ty);
                let src_size = layout::size_of(self.env, src_ty);
                let dst_size = layout::size_of(self.env, ret_ty);
                if src_size != dst_size && src_size != 0 && dst_size != 0 {
                    self.codegen_error(
                        "C021",
                        format!("transmute between types of different sizes ({src_size} vs {dst_size})"),
                        expr.span,
                    );
                }
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {}", src.ty));
                self.f
                    .emit(&format!("store {} {}, ptr {slot}", src.ty, src.reg));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = load {ret_ll}, ptr {slot}"));
                Val::new(reg, ret_ll)
            }

            // ── hints ────────────────────────────────────────────────
            "unreachable" => {
                self.f.emit_term("unreachable");
                Val::unit()
            }
            "assume" => {
                self.f
                    .emit(&format!("call void @llvm.assume(i1 {})", args[0].reg));
                Val::unit()
            }
            "likely" | "unlikely" => {
                let expected = if name == "likely" { "true" } else { "false" };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i1 @llvm.expect.i1(i1 {}, i1 {expected})",
                    args[0].reg
                ));
                Val::new(reg, "i1")
            }
            "black_box" => {
                // An empty asm sideeffect pins the value.
                let slot = self.spill(&args[0]);
                self.f.emit(&format!(
                    "call void asm sideeffect \"\", \"r,~{{memory}}\"(ptr {slot})"
                ));
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = load {}, ptr {slot}", args[0].ty));
                Val::new(reg, args[0].ty.clone())
            }

            // ── bit operations ───────────────────────────────────────
            "ctlz" | "cttz" => {
                let ll = args[0].ty.clone();
                let intrinsic = format!("llvm.{name}.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, i1)"),
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, i1 false)",
                    args[0].reg
                ));
                Val::new(reg, ll)
            }
            "ctpop" | "bswap" | "bitreverse" => {
                let ll = args[0].ty.clone();
                let intrinsic = format!("llvm.{name}.{ll}");
                self.module
                    .declare(&intrinsic, &format!("declare {ll} @{intrinsic}({ll})"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {})",
                    args[0].reg
                ));
                Val::new(reg, ll)
            }

            // ── checked / saturating ─────────────────────────────────
            "checked_add" | "checked_sub" | "checked_mul" => {
                let op = &name[8..11];
                let ll = args[0].ty.clone();
                let intrinsic = format!("llvm.s{op}.with.overflow.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {{ {ll}, i1 }} @{intrinsic}({ll}, {ll})"),
                );
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = call {{ {ll}, i1 }} @{intrinsic}({ll} {}, {ll} {})",
                    args[0].reg, args[1].reg
                ));
                let value = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{value} = extractvalue {{ {ll}, i1 }} {pair}, 0"
                ));
                let overflow = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{overflow} = extractvalue {{ {ll}, i1 }} {pair}, 1"
                ));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {overflow} to i32"));
                let value_ty = self.value_type_of_ll(&ll);
                self.build_enum_value_dyn(ret_ty, &tag, &[(Val::new(value, ll), value_ty)])
            }
            "checked_div" => {
                let ll = args[0].ty.clone();
                let zero = self.f.fresh_reg();
                self.f
                    .emit(&format!("{zero} = icmp eq {ll} {}, 0", args[1].reg));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {zero} to i32"));
                let safe = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{safe} = select i1 {zero}, {ll} 1, {ll} {}",
                    args[1].reg
                ));
                let div = self.f.fresh_reg();
                self.f
                    .emit(&format!("{div} = sdiv {ll} {}, {safe}", args[0].reg));
                let value_ty = self.value_type_of_ll(&ll);
                self.build_enum_value_dyn(ret_ty, &tag, &[(Val::new(div, ll), value_ty)])
            }
            "saturating_add" | "saturating_sub" => {
                let op = &name[11..14];
                let ll = args[0].ty.clone();
                let intrinsic = format!("llvm.s{op}.sat.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, {ll})"),
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {})",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, ll)
            }
            "saturating_mul" => {
                let ll = args[0].ty.clone();
                let intrinsic = format!("llvm.smul.with.overflow.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {{ {ll}, i1 }} @{intrinsic}({ll}, {ll})"),
                );
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = call {{ {ll}, i1 }} @{intrinsic}({ll} {}, {ll} {})",
                    args[0].reg, args[1].reg
                ));
                let value = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{value} = extractvalue {{ {ll}, i1 }} {pair}, 0"
                ));
                let overflow = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{overflow} = extractvalue {{ {ll}, i1 }} {pair}, 1"
                ));
                let bits = int_bits(&ll).unwrap_or(64);
                let cap: i128 = (1i128 << (bits - 1)) - 1;
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {overflow}, {ll} {cap}, {ll} {value}"
                ));
                Val::new(reg, ll)
            }

            // ── math ─────────────────────────────────────────────────
            "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc"
            | "fabs" => {
                let ll = args[0].ty.clone();
                let suffix = if ll == "float" { "f32" } else { "f64" };
                let intrinsic = format!("llvm.{name}.{suffix}");
                self.module
                    .declare(&intrinsic, &format!("declare {ll} @{intrinsic}({ll})"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {})",
                    args[0].reg
                ));
                Val::new(reg, ll)
            }
            "pow" => {
                let ll = args[0].ty.clone();
                let suffix = if ll == "float" { "f32" } else { "f64" };
                let intrinsic = format!("llvm.pow.{suffix}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, {ll})"),
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {})",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, ll)
            }
            "fma" => {
                let ll = args[0].ty.clone();
                let suffix = if ll == "float" { "f32" } else { "f64" };
                let intrinsic = format!("llvm.fma.{suffix}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, {ll}, {ll})"),
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {}, {ll} {})",
                    args[0].reg, args[1].reg, args[2].reg
                ));
                Val::new(reg, ll)
            }

            // ── slices / arrays ──────────────────────────────────────
            "slice_get" | "slice_get_mut" | "slice_set" | "slice_offset" | "slice_swap" => {
                self.emit_slice_intrinsic(&name, expr, args, ret_ty)
            }
            "array_as_ptr" | "array_as_mut_ptr" | "array_offset_ptr" | "array_offset_mut_ptr" => {
                // The array argument was spilled to a slot by evaluation;
                // its address is the element pointer base.
                let slot = self.spill(&args[0]);
                let ll = args[0].ty.clone();
                let offset = args
                    .get(1)
                    .map(|a| a.reg.clone())
                    .unwrap_or_else(|| "0".to_string());
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 {offset}"
                ));
                Val::new(reg, "ptr")
            }

            // ── reflection ───────────────────────────────────────────
            "field_count" | "variant_count" | "field_name" | "field_type_id"
            | "field_offset" => self.emit_reflection(&name, expr, resolution, args, turbo),

            // ── SIMD ─────────────────────────────────────────────────
            "simd_load" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = load <4 x float>, ptr {}",
                    args[0].reg
                ));
                Val::new(reg, "<4 x float>")
            }
            "simd_store" => {
                self.f.emit(&format!(
                    "store <4 x float> {}, ptr {}",
                    args[1].reg, args[0].reg
                ));
                Val::unit()
            }
            "simd_extract" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = extractelement <4 x float> {}, i32 {}",
                    args[0].reg, args[1].reg
                ));
                Val::new(reg, "float")
            }
            "simd_insert" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = insertelement <4 x float> {}, float {}, i32 {}",
                    args[0].reg, args[2].reg, args[1].reg
                ));
                Val::new(reg, "<4 x float>")
            }
            "simd_splat" => {
                let scalar = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{scalar} = insertelement <4 x float> poison, float {}, i32 0",
                    args[0].reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = shufflevector <4 x float> {scalar}, <4 x float> poison, <4 x i32> zeroinitializer"
                ));
                Val::new(reg, "<4 x float>")
            }

            // ── lifecycle ────────────────────────────────────────────
            "drop" => {
                // Run the argument type's drop impl now, if it has one.
                if let Some(arg_expr) = call_args(expr).first() {
                    let arg_ty = self.node_type(arg_expr.id);
                    if let Type::Named { name, args: targs, .. } =
                        self.env.interner.get(arg_ty).clone()
                    {
                        let has_drop = self
                            .env
                            .impls_by_type
                            .get(&name)
                            .map(|idxs| idxs.iter().any(|&i| self.env.impls[i].method("drop").is_some()))
                            .unwrap_or(false);
                        if has_drop {
                            let is_library = self
                                .env
                                .impls_by_type
                                .get(&name)
                                .and_then(|idxs| idxs.first())
                                .map(|&i| self.env.impls[i].is_library)
                                .unwrap_or(false);
                            let symbol = self.enqueue_method(
                                &name,
                                &targs,
                                "drop",
                                rustc_hash::FxHashMap::default(),
                                is_library,
                            );
                            let slot = self.spill(&args[0]);
                            self.f
                                .emit(&format!("call void @{symbol}(ptr {slot})"));
                        }
                    }
                }
                Val::unit()
            }

            _ => {
                self.codegen_error(
                    "C006",
                    format!("unsupported intrinsic '{name}'"),
                    expr.span,
                );
                Val::unit()
            }
        }
    }

    /// Sizes via the GEP-null trick for aggregates, the fixed table for
    /// primitives.
    fn emit_size_query(&mut self, target: TypeId, want_align: bool) -> Val {
        let ll = layout::ll_type(self.env, target);
        let is_aggregate = ll.starts_with('%') || ll.starts_with('{') || ll.starts_with('[');
        if is_aggregate && !want_align {
            self.ensure_type_defined(target);
            let gep = self.f.fresh_reg();
            self.f.emit(&format!(
                "{gep} = getelementptr {ll}, ptr null, i32 1"
            ));
            let reg = self.f.fresh_reg();
            self.f.emit(&format!("{reg} = ptrtoint ptr {gep} to i64"));
            return Val::new(reg, "i64");
        }
        let value = if want_align {
            layout::align_of(self.env, target)
        } else {
            layout::size_of(self.env, target)
        };
        Val::new(value.to_string(), "i64")
    }

    fn emit_slice_intrinsic(
        &mut self,
        name: &str,
        _expr: &ast::Expr,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        // The slice value is { ptr, len }; extract the data pointer.
        let data = self.f.fresh_reg();
        self.f.emit(&format!(
            "{data} = extractvalue {} {}, 0",
            args[0].ty, args[0].reg
        ));
        match name {
            "slice_get" => {
                let ll = layout::ll_type(self.env, ret_ty);
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {ll}, ptr {data}, i64 {}",
                    args[1].reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = load {ll}, ptr {elem_ptr}"));
                Val::new(reg, ll)
            }
            "slice_get_mut" | "slice_offset" => {
                let elem_ll = match self.env.interner.get(ret_ty).clone() {
                    Type::Ptr { inner, .. } => layout::ll_type(self.env, inner),
                    _ => "i8".to_string(),
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    args[1].reg
                ));
                Val::new(reg, "ptr")
            }
            "slice_set" => {
                let elem_ll = args[2].ty.clone();
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    args[1].reg
                ));
                self.f.emit(&format!(
                    "store {elem_ll} {}, ptr {elem_ptr}",
                    args[2].reg
                ));
                Val::unit()
            }
            _ => {
                // slice_swap
                let elem_ll = "i64".to_string();
                let pa = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pa} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    args[1].reg
                ));
                let pb = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pb} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    args[2].reg
                ));
                let va = self.f.fresh_reg();
                self.f.emit(&format!("{va} = load {elem_ll}, ptr {pa}"));
                let vb = self.f.fresh_reg();
                self.f.emit(&format!("{vb} = load {elem_ll}, ptr {pb}"));
                self.f.emit(&format!("store {elem_ll} {vb}, ptr {pa}"));
                self.f.emit(&format!("store {elem_ll} {va}, ptr {pb}"));
                Val::unit()
            }
        }
    }

    /// Reflection intrinsics fold to constants from the registry; the target
    /// type must carry the Reflect derive.
    fn emit_reflection(
        &mut self,
        name: &str,
        expr: &ast::Expr,
        _resolution: &MethodResolution,
        args: Vec<Val>,
        turbo: Option<TypeId>,
    ) -> Val {
        let Some(target) = turbo else {
            self.codegen_error("C003", format!("{name} requires a type argument"), expr.span);
            return Val::new("0", "i64");
        };
        let (type_name, type_args) = match self.env.interner.get(target).clone() {
            Type::Named { name, args, .. } => (name, args),
            _ => {
                self.codegen_error("C035", "reflection requires a named type", expr.span);
                return Val::new("0", "i64");
            }
        };
        let reflective = self
            .env
            .structs
            .get(&type_name)
            .map(|d| d.derives.contains(&tml_ast::Derive::Reflect))
            .or_else(|| {
                self.env
                    .enums
                    .get(&type_name)
                    .map(|d| d.derives.contains(&tml_ast::Derive::Reflect))
            })
            .unwrap_or(false);
        if !reflective {
            self.codegen_error(
                "C035",
                format!("type {type_name} does not derive Reflect"),
                expr.span,
            );
        }

        match name {
            "field_count" => {
                let count = self
                    .env
                    .structs
                    .get(&type_name)
                    .map(|d| d.fields.len())
                    .unwrap_or(0);
                Val::new(count.to_string(), "i64")
            }
            "variant_count" => {
                let count = self
                    .env
                    .enums
                    .get(&type_name)
                    .map(|d| d.variants.len())
                    .unwrap_or(0);
                Val::new(count.to_string(), "i64")
            }
            "field_name" => {
                // A constant index folds to the interned name.
                let index: usize = args
                    .first()
                    .and_then(|a| a.reg.parse().ok())
                    .unwrap_or(0);
                let field = self
                    .env
                    .structs
                    .get(&type_name)
                    .and_then(|d| d.fields.get(index).map(|(n, _)| n.clone()))
                    .unwrap_or_default();
                let global = self.module.intern_string(&field);
                Val::new(global, "ptr")
            }
            "field_type_id" => {
                let index: usize = args
                    .first()
                    .and_then(|a| a.reg.parse().ok())
                    .unwrap_or(0);
                let id = self
                    .env
                    .structs
                    .get(&type_name)
                    .and_then(|d| d.fields.get(index).map(|(_, t)| *t))
                    .map(|t| fnv1a(&mangle::mangle_type(self.env, t)))
                    .unwrap_or(0);
                Val::new(id.to_string(), "i64")
            }
            _ => {
                // field_offset
                let index: usize = args
                    .first()
                    .and_then(|a| a.reg.parse().ok())
                    .unwrap_or(0);
                let fields = layout::instantiated_fields(self.env, &type_name, &type_args);
                let mut offset = 0u64;
                for (i, (_, field_ty)) in fields.iter().enumerate() {
                    let align = layout::align_of(self.env, *field_ty);
                    offset = layout::align_up(offset, align);
                    if i == index {
                        break;
                    }
                    offset += layout::size_of(self.env, *field_ty);
                }
                Val::new(offset.to_string(), "i64")
            }
        }
    }

    /// Read an atomic ordering from the call's argument expression. Written
    /// as `Ordering::SeqCst`-style paths or bare identifiers; anything else
    /// is `C017`.
    fn atomic_ordering(&mut self, expr: &ast::Expr, arg_index: usize) -> String {
        let args = call_args(expr);
        let Some(arg) = args.get(arg_index) else {
            return "seq_cst".to_string();
        };
        let name = match &arg.kind {
            ExprKind::Path(segments) => segments.last().cloned(),
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::StrLit(name) => Some(name.clone()),
            _ => None,
        };
        match name.as_deref() {
            Some("Relaxed") => "monotonic".to_string(),
            Some("Acquire") => "acquire".to_string(),
            Some("Release") => "release".to_string(),
            Some("AcqRel") => "acq_rel".to_string(),
            Some("SeqCst") | None => "seq_cst".to_string(),
            Some(other) => {
                self.codegen_error(
                    "C017",
                    format!("invalid atomic ordering '{other}'"),
                    arg.span,
                );
                "seq_cst".to_string()
            }
        }
    }

    /// Recover a semantic type for an LLVM scalar type string.
    fn value_type_of_ll(&mut self, ll: &str) -> TypeId {
        use tml_ast::PrimKind;
        let kind = match ll {
            "i1" => PrimKind::Bool,
            "i8" => PrimKind::I8,
            "i16" => PrimKind::I16,
            "i32" => PrimKind::I32,
            "i128" => PrimKind::I128,
            "float" => PrimKind::F32,
            "double" => PrimKind::F64,
            _ => PrimKind::I64,
        };
        self.env.interner.prim(kind)
    }
}

/// The argument expressions of a `Call` node.
fn call_args(expr: &ast::Expr) -> &[ast::Expr] {
    match &expr.kind {
        ExprKind::Call { args, .. } => args,
        ExprKind::MethodCall { args, .. } => args,
        _ => &[],
    }
}

fn int_bits(ll: &str) -> Option<u32> {
    match ll {
        "i8" => Some(8),
        "i16" => Some(16),
        "i32" => Some(32),
        "i64" => Some(64),
        "i128" => Some(128),
        _ => None,
    }
}

/// FNV-1a over a symbol string; used for stable type ids.
fn fnv1a(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in input.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
