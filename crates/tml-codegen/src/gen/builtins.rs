//! Builtin method lowering.
//!
//! Every method the checker resolved through a fixed table lowers here to a
//! short IR sequence or a runtime call. User-type methods synthesized by
//! derives are emitted as real function bodies on demand (the queue's
//! `Derived` requests).

use rustc_hash::FxHashMap;

use tml_ast as ast;
use tml_ast::{BinOp, PrimKind};
use tml_typeck::{DispatchKind, MethodResolution, Type, TypeId};

use crate::layout;
use crate::mangle;
use crate::mono::{MonoItem, MonoRequest};

use super::{IrGen, Val};

impl IrGen<'_> {
    /// Lower a builtin/flags/pointer resolution.
    pub fn emit_builtin_call(
        &mut self,
        expr: &ast::Expr,
        resolution: &MethodResolution,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        // Bare targets are compiler intrinsics.
        let Some((owner, method)) = resolution.target.split_once("::") else {
            return self.emit_intrinsic(expr, resolution, args, ret_ty);
        };
        let owner = owner.to_string();
        let method = method.to_string();

        match resolution.kind {
            DispatchKind::Pointer => {
                return self.emit_pointer_method(&method, receiver, args, ret_ty, expr)
            }
            DispatchKind::Flags => {
                return self.emit_flags_method(&owner, &method, receiver, args, ret_ty)
            }
            _ => {}
        }

        match owner.as_str() {
            "List" => self.emit_list_method(&method, receiver, args, ret_ty),
            "Maybe" => self.emit_maybe_method(&method, receiver, args, ret_ty),
            "Outcome" => self.emit_outcome_method(&method, receiver, args, ret_ty),
            "Ordering" => self.emit_ordering_method(&method, receiver, args, ret_ty),
            "StringBuilder" => self.emit_string_builder_method(&method, receiver, args, ret_ty),
            "array" => self.emit_array_method(&method, receiver, args, ret_ty),
            "slice" => self.emit_slice_method(&method, receiver, args, ret_ty),
            _ => {
                if let Some(kind) = PrimKind::from_name(&owner) {
                    return self.emit_primitive_method(kind, &method, receiver, args, ret_ty);
                }
                // A derive-synthesized method on a user type.
                if self.env.structs.contains_key(&owner) || self.env.enums.contains_key(&owner) {
                    return self.emit_derived_call(&owner, &method, resolution, receiver, args, ret_ty);
                }
                self.codegen_error(
                    "C015",
                    format!("no lowering for '{}'", resolution.target),
                    expr.span,
                );
                Val::unit()
            }
        }
    }

    fn load_receiver(&mut self, receiver: &Option<(String, TypeId)>) -> Val {
        match receiver {
            Some((ptr, ty)) => {
                let ty = self.apply_subst(*ty);
                let deref = self.env.interner.deref_all(ty);
                let ll = layout::ll_type(self.env, deref);
                if ll == "void" {
                    return Val::unit();
                }
                // Reference receivers hold the pointee's address.
                let mut slot = ptr.clone();
                if matches!(self.env.interner.get(ty), Type::Ref { .. }) {
                    let loaded = self.f.fresh_reg();
                    self.f.emit(&format!("{loaded} = load ptr, ptr {slot}"));
                    slot = loaded;
                }
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
                Val::new(loaded, ll)
            }
            None => Val::unit(),
        }
    }

    fn receiver_slot(&mut self, receiver: &Option<(String, TypeId)>) -> String {
        match receiver {
            Some((ptr, ty)) => {
                if matches!(self.env.interner.get(*ty), Type::Ref { .. }) {
                    let loaded = self.f.fresh_reg();
                    self.f.emit(&format!("{loaded} = load ptr, ptr {ptr}"));
                    loaded
                } else {
                    ptr.clone()
                }
            }
            None => "null".to_string(),
        }
    }

    // ── pointers ─────────────────────────────────────────────────────

    fn emit_pointer_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
        _expr: &ast::Expr,
    ) -> Val {
        let ptr_val = self.load_receiver(&receiver);
        match method {
            "read" => {
                let ll = layout::ll_type(self.env, ret_ty);
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {ll}, ptr {}", ptr_val.reg));
                Val::new(loaded, ll)
            }
            "write" => {
                let value = &args[0];
                self.f.emit(&format!(
                    "store {} {}, ptr {}",
                    value.ty, value.reg, ptr_val.reg
                ));
                Val::unit()
            }
            "is_null" => {
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = icmp eq ptr {}, null", ptr_val.reg));
                Val::new(reg, "i1")
            }
            "offset" => {
                let elem_ll = match self.env.interner.get(ret_ty).clone() {
                    Type::Ptr { inner, .. } => layout::ll_type(self.env, inner),
                    _ => "i8".to_string(),
                };
                let idx = self.coerce(args[0].clone(), "i64");
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = getelementptr inbounds {elem_ll}, ptr {}, i64 {}",
                    ptr_val.reg, idx.reg
                ));
                Val::new(reg, "ptr")
            }
            _ => Val::unit(),
        }
    }

    // ── flags enums ──────────────────────────────────────────────────

    fn emit_flags_method(
        &mut self,
        owner: &str,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let width = self
            .env
            .enums
            .get(owner)
            .and_then(|d| d.flags)
            .unwrap_or(PrimKind::U32);
        let ll = layout::ll_prim(width).to_string();
        match method {
            "bits" => self.load_receiver(&receiver),
            "has" => {
                let value = self.load_receiver(&receiver);
                let masked = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{masked} = and {ll} {}, {}",
                    value.reg, args[0].reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = icmp ne {ll} {masked}, 0"));
                Val::new(reg, "i1")
            }
            "add" => {
                let value = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = or {ll} {}, {}", value.reg, args[0].reg));
                Val::new(reg, ll)
            }
            "remove" => {
                let value = self.load_receiver(&receiver);
                let inverted = self.f.fresh_reg();
                self.f
                    .emit(&format!("{inverted} = xor {ll} {}, -1", args[0].reg));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = and {ll} {}, {inverted}",
                    value.reg
                ));
                Val::new(reg, ll)
            }
            "toggle" => {
                let value = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = xor {ll} {}, {}",
                    value.reg, args[0].reg
                ));
                Val::new(reg, ll)
            }
            "is_empty" => {
                let value = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = icmp eq {ll} {}, 0", value.reg));
                Val::new(reg, "i1")
            }
            "empty" => Val::new("0", ll),
            "all" => {
                let mask: i128 = self
                    .env
                    .enums
                    .get(owner)
                    .map(|d| d.variants.iter().map(|v| v.discriminant).fold(0, |a, b| a | b))
                    .unwrap_or(0);
                Val::new(mask.to_string(), ll)
            }
            "from_bits" => {
                // Valid when no unknown bits are set: wrap in Maybe.
                let mask: i128 = self
                    .env
                    .enums
                    .get(owner)
                    .map(|d| d.variants.iter().map(|v| v.discriminant).fold(0, |a, b| a | b))
                    .unwrap_or(0);
                let inverted = self.f.fresh_reg();
                self.f
                    .emit(&format!("{inverted} = xor {ll} {mask}, -1"));
                let unknown = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{unknown} = and {ll} {}, {inverted}",
                    args[0].reg
                ));
                let invalid = self.f.fresh_reg();
                self.f
                    .emit(&format!("{invalid} = icmp ne {ll} {unknown}, 0"));
                let tag = self.f.fresh_reg();
                self.f
                    .emit(&format!("{tag} = zext i1 {invalid} to i32"));
                let flags_ty = self.env.interner.named(owner, vec![]);
                self.build_enum_value_dyn(ret_ty, &tag, &[(args[0].clone(), flags_ty)])
            }
            _ => Val::unit(),
        }
    }

    // ── List ─────────────────────────────────────────────────────────

    fn emit_list_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        match method {
            "new" | "with_capacity" => {
                let capacity = args
                    .first()
                    .map(|a| a.reg.clone())
                    .unwrap_or_else(|| "0".to_string());
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @list_new(i64 {capacity})"));
                Val::new(reg, "ptr")
            }
            "push" => {
                let list = self.load_receiver(&receiver);
                let slot = self.to_list_slot(args[0].clone());
                self.f.emit(&format!(
                    "call void @list_push(ptr {}, ptr {slot})",
                    list.reg
                ));
                Val::unit()
            }
            "len" => {
                let list = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call i64 @list_len(ptr {})", list.reg));
                Val::new(reg, "i64")
            }
            "is_empty" => {
                let list = self.load_receiver(&receiver);
                let len = self.f.fresh_reg();
                self.f
                    .emit(&format!("{len} = call i64 @list_len(ptr {})", list.reg));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = icmp eq i64 {len}, 0"));
                Val::new(reg, "i1")
            }
            "get" => {
                let list = self.load_receiver(&receiver);
                let idx = self.coerce(args[0].clone(), "i64");
                let raw = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{raw} = call ptr @list_get(ptr {}, i64 {})",
                    list.reg, idx.reg
                ));
                self.from_list_slot(raw, ret_ty)
            }
            "set" => {
                let list = self.load_receiver(&receiver);
                let idx = self.coerce(args[0].clone(), "i64");
                let slot = self.to_list_slot(args[1].clone());
                self.f.emit(&format!(
                    "call void @list_set(ptr {}, i64 {}, ptr {slot})",
                    list.reg, idx.reg
                ));
                Val::unit()
            }
            "pop" | "first" | "last" => {
                let list = self.load_receiver(&receiver);
                let len = self.f.fresh_reg();
                self.f
                    .emit(&format!("{len} = call i64 @list_len(ptr {})", list.reg));
                let empty = self.f.fresh_reg();
                self.f.emit(&format!("{empty} = icmp eq i64 {len}, 0"));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {empty} to i32"));
                let elem_ty = match self.env.interner.get(ret_ty).clone() {
                    Type::Named { args, .. } if !args.is_empty() => args[0],
                    _ => self.env.interner.unit(),
                };
                let raw = self.f.fresh_reg();
                match method {
                    "pop" => self.f.emit(&format!(
                        "{raw} = call ptr @list_pop(ptr {})",
                        list.reg
                    )),
                    "first" => self.f.emit(&format!(
                        "{raw} = call ptr @list_get(ptr {}, i64 0)",
                        list.reg
                    )),
                    _ => {
                        let last_idx = self.f.fresh_reg();
                        self.f.emit(&format!("{last_idx} = sub i64 {len}, 1"));
                        self.f.emit(&format!(
                            "{raw} = call ptr @list_get(ptr {}, i64 {last_idx})",
                            list.reg
                        ));
                    }
                }
                let elem = self.from_list_slot(raw, elem_ty);
                self.build_enum_value_dyn(ret_ty, &tag, &[(elem, elem_ty)])
            }
            "clear" => {
                let list = self.load_receiver(&receiver);
                self.module
                    .declare("list_clear", "declare void @list_clear(ptr)");
                self.f
                    .emit(&format!("call void @list_clear(ptr {})", list.reg));
                Val::unit()
            }
            "contains" => {
                let list = self.load_receiver(&receiver);
                let slot = self.to_list_slot(args[0].clone());
                self.module
                    .declare("list_contains", "declare i1 @list_contains(ptr, ptr)");
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i1 @list_contains(ptr {}, ptr {slot})",
                    list.reg
                ));
                Val::new(reg, "i1")
            }
            _ => Val::unit(),
        }
    }

    // ── Maybe / Outcome ──────────────────────────────────────────────

    /// Extract the tag from a sum value held in a slot.
    fn sum_tag(&mut self, slot: &str, ll: &str) -> String {
        let tag_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{tag_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 0"
        ));
        let tag = self.f.fresh_reg();
        self.f.emit(&format!("{tag} = load i32, ptr {tag_ptr}"));
        tag
    }

    /// Load a payload element at a byte offset from a sum value's slot.
    fn sum_payload(&mut self, slot: &str, ll: &str, offset: u64, payload_ty: TypeId) -> Val {
        let payload_ll = layout::ll_type(self.env, payload_ty);
        if payload_ll == "void" {
            return Val::unit();
        }
        let base = self.f.fresh_reg();
        self.f.emit(&format!(
            "{base} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 1"
        ));
        let elem_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{elem_ptr} = getelementptr inbounds i8, ptr {base}, i64 {offset}"
        ));
        let loaded = self.f.fresh_reg();
        self.f
            .emit(&format!("{loaded} = load {payload_ll}, ptr {elem_ptr}"));
        Val::new(loaded, payload_ll)
    }

    /// Panic when `tag` != `expected_tag`.
    fn tag_guard(&mut self, tag: &str, expected_tag: i32, message: &str) {
        let ok_label = self.f.fresh_label("unwrap.ok");
        let fail_label = self.f.fresh_label("unwrap.fail");
        let pred = self.f.fresh_reg();
        self.f
            .emit(&format!("{pred} = icmp eq i32 {tag}, {expected_tag}"));
        self.f.emit_term(&format!(
            "br i1 {pred}, label %{ok_label}, label %{fail_label}"
        ));
        self.f.label(&fail_label);
        let msg = self.module.intern_string(message);
        self.f.emit(&format!("call void @panic(ptr {msg})"));
        self.f.emit_term("unreachable");
        self.f.label(&ok_label);
    }

    fn emit_maybe_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let (ptr, orig_ty) = receiver.clone().expect("maybe methods take a receiver");
        let slot = self.receiver_slot(&Some((ptr, orig_ty)));
        let recv_ty = {
            let t = self.apply_subst(orig_ty);
            self.env.interner.deref_all(t)
        };
        let inner_ty = match self.env.interner.get(recv_ty).clone() {
            Type::Named { args, .. } if !args.is_empty() => args[0],
            _ => self.env.interner.unit(),
        };
        let ll = layout::ll_type(self.env, recv_ty);
        match method {
            "unwrap" | "expect" => {
                let tag = self.sum_tag(&slot, &ll);
                self.tag_guard(&tag, 0, "called unwrap on Nothing");
                self.sum_payload(&slot, &ll, 0, inner_ty)
            }
            "unwrap_or" => {
                let tag = self.sum_tag(&slot, &ll);
                let payload = self.sum_payload(&slot, &ll, 0, inner_ty);
                let is_just = self.f.fresh_reg();
                self.f.emit(&format!("{is_just} = icmp eq i32 {tag}, 0"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {is_just}, {} {}, {} {}",
                    payload.ty, payload.reg, args[0].ty, args[0].reg
                ));
                Val::new(reg, payload.ty)
            }
            "is_just" | "is_nothing" => {
                let tag = self.sum_tag(&slot, &ll);
                let expected = if method == "is_just" { 0 } else { 1 };
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = icmp eq i32 {tag}, {expected}"));
                Val::new(reg, "i1")
            }
            "map" | "and_then" => {
                // Just(x): run the closure; Nothing passes through.
                let tag = self.sum_tag(&slot, &ll);
                let ret_ll = layout::ll_type(self.env, ret_ty);
                self.ensure_type_defined(ret_ty);
                let result_slot = self.f.fresh_reg();
                self.f.emit(&format!("{result_slot} = alloca {ret_ll}"));

                let just_label = self.f.fresh_label("maybe.just");
                let nothing_label = self.f.fresh_label("maybe.nothing");
                let end_label = self.f.fresh_label("maybe.end");
                let pred = self.f.fresh_reg();
                self.f.emit(&format!("{pred} = icmp eq i32 {tag}, 0"));
                self.f.emit_term(&format!(
                    "br i1 {pred}, label %{just_label}, label %{nothing_label}"
                ));

                self.f.label(&just_label);
                let payload = self.sum_payload(&slot, &ll, 0, inner_ty);
                let mapped_ty = match self.env.interner.get(ret_ty).clone() {
                    Type::Named { args, .. } if !args.is_empty() => args[0],
                    _ => inner_ty,
                };
                let mapped_ll = layout::ll_type(self.env, mapped_ty);
                let call_ret_ll = if method == "map" {
                    mapped_ll.clone()
                } else {
                    ret_ll.clone()
                };
                let mapped = self.emit_closure_invoke(args[0].clone(), vec![payload], &call_ret_ll);
                if method == "map" {
                    let wrapped =
                        self.build_enum_value(ret_ty, 0, &[(mapped, mapped_ty)]);
                    self.f.emit(&format!(
                        "store {ret_ll} {}, ptr {result_slot}",
                        wrapped.reg
                    ));
                } else {
                    self.f.emit(&format!(
                        "store {ret_ll} {}, ptr {result_slot}",
                        mapped.reg
                    ));
                }
                self.f.emit_term(&format!("br label %{end_label}"));

                self.f.label(&nothing_label);
                let nothing = self.build_enum_value(ret_ty, 1, &[]);
                self.f.emit(&format!(
                    "store {ret_ll} {}, ptr {result_slot}",
                    nothing.reg
                ));
                self.f.emit_term(&format!("br label %{end_label}"));

                self.f.label(&end_label);
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {ret_ll}, ptr {result_slot}"));
                Val::new(loaded, ret_ll)
            }
            "ok_or" => {
                let tag = self.sum_tag(&slot, &ll);
                let err_ty = match self.env.interner.get(ret_ty).clone() {
                    Type::Named { args, .. } if args.len() == 2 => args[1],
                    _ => self.env.interner.unit(),
                };
                let ret_ll = layout::ll_type(self.env, ret_ty);
                self.ensure_type_defined(ret_ty);
                let result_slot = self.f.fresh_reg();
                self.f.emit(&format!("{result_slot} = alloca {ret_ll}"));

                let just_label = self.f.fresh_label("okor.just");
                let nothing_label = self.f.fresh_label("okor.nothing");
                let end_label = self.f.fresh_label("okor.end");
                let pred = self.f.fresh_reg();
                self.f.emit(&format!("{pred} = icmp eq i32 {tag}, 0"));
                self.f.emit_term(&format!(
                    "br i1 {pred}, label %{just_label}, label %{nothing_label}"
                ));

                self.f.label(&just_label);
                let payload = self.sum_payload(&slot, &ll, 0, inner_ty);
                let ok = self.build_enum_value(ret_ty, 0, &[(payload, inner_ty)]);
                self.f
                    .emit(&format!("store {ret_ll} {}, ptr {result_slot}", ok.reg));
                self.f.emit_term(&format!("br label %{end_label}"));

                self.f.label(&nothing_label);
                let err = self.build_enum_value(ret_ty, 1, &[(args[0].clone(), err_ty)]);
                self.f
                    .emit(&format!("store {ret_ll} {}, ptr {result_slot}", err.reg));
                self.f.emit_term(&format!("br label %{end_label}"));

                self.f.label(&end_label);
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {ret_ll}, ptr {result_slot}"));
                Val::new(loaded, ret_ll)
            }
            _ => Val::unit(),
        }
    }

    fn emit_outcome_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let (ptr, orig_ty) = receiver.clone().expect("outcome methods take a receiver");
        let slot = self.receiver_slot(&Some((ptr, orig_ty)));
        let recv_ty = {
            let t = self.apply_subst(orig_ty);
            self.env.interner.deref_all(t)
        };
        let (ok_ty, err_ty) = match self.env.interner.get(recv_ty).clone() {
            Type::Named { args, .. } if args.len() == 2 => (args[0], args[1]),
            _ => {
                let unit = self.env.interner.unit();
                (unit, unit)
            }
        };
        let ll = layout::ll_type(self.env, recv_ty);
        match method {
            "unwrap" | "expect" => {
                let tag = self.sum_tag(&slot, &ll);
                self.tag_guard(&tag, 0, "called unwrap on Err");
                self.sum_payload(&slot, &ll, 0, ok_ty)
            }
            "unwrap_err" => {
                let tag = self.sum_tag(&slot, &ll);
                self.tag_guard(&tag, 1, "called unwrap_err on Ok");
                self.sum_payload(&slot, &ll, 0, err_ty)
            }
            "unwrap_or" => {
                let tag = self.sum_tag(&slot, &ll);
                let payload = self.sum_payload(&slot, &ll, 0, ok_ty);
                let is_ok = self.f.fresh_reg();
                self.f.emit(&format!("{is_ok} = icmp eq i32 {tag}, 0"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {is_ok}, {} {}, {} {}",
                    payload.ty, payload.reg, args[0].ty, args[0].reg
                ));
                Val::new(reg, payload.ty)
            }
            "is_ok" | "is_err" => {
                let tag = self.sum_tag(&slot, &ll);
                let expected = if method == "is_ok" { 0 } else { 1 };
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = icmp eq i32 {tag}, {expected}"));
                Val::new(reg, "i1")
            }
            "ok" | "err" => {
                let tag = self.sum_tag(&slot, &ll);
                let (payload_ty, want_tag) = if method == "ok" {
                    (ok_ty, 0)
                } else {
                    (err_ty, 1)
                };
                let payload = self.sum_payload(&slot, &ll, 0, payload_ty);
                let matches = self.f.fresh_reg();
                self.f
                    .emit(&format!("{matches} = icmp eq i32 {tag}, {want_tag}"));
                let inverted = self.f.fresh_reg();
                self.f
                    .emit(&format!("{inverted} = xor i1 {matches}, true"));
                let maybe_tag = self.f.fresh_reg();
                self.f
                    .emit(&format!("{maybe_tag} = zext i1 {inverted} to i32"));
                self.build_enum_value_dyn(ret_ty, &maybe_tag, &[(payload, payload_ty)])
            }
            "map" | "map_err" => {
                let tag = self.sum_tag(&slot, &ll);
                let ret_ll = layout::ll_type(self.env, ret_ty);
                self.ensure_type_defined(ret_ty);
                let result_slot = self.f.fresh_reg();
                self.f.emit(&format!("{result_slot} = alloca {ret_ll}"));

                let hit_tag: i32 = if method == "map" { 0 } else { 1 };
                let hit_label = self.f.fresh_label("outcome.hit");
                let pass_label = self.f.fresh_label("outcome.pass");
                let end_label = self.f.fresh_label("outcome.end");
                let pred = self.f.fresh_reg();
                self.f
                    .emit(&format!("{pred} = icmp eq i32 {tag}, {hit_tag}"));
                self.f.emit_term(&format!(
                    "br i1 {pred}, label %{hit_label}, label %{pass_label}"
                ));

                // The transformed side.
                self.f.label(&hit_label);
                let in_ty = if method == "map" { ok_ty } else { err_ty };
                let payload = self.sum_payload(&slot, &ll, 0, in_ty);
                let out_args = match self.env.interner.get(ret_ty).clone() {
                    Type::Named { args, .. } if args.len() == 2 => args,
                    _ => vec![ok_ty, err_ty],
                };
                let out_ty = if method == "map" { out_args[0] } else { out_args[1] };
                let out_ll = layout::ll_type(self.env, out_ty);
                let mapped = self.emit_closure_invoke(args[0].clone(), vec![payload], &out_ll);
                let wrapped =
                    self.build_enum_value(ret_ty, hit_tag as i128, &[(mapped, out_ty)]);
                self.f.emit(&format!(
                    "store {ret_ll} {}, ptr {result_slot}",
                    wrapped.reg
                ));
                self.f.emit_term(&format!("br label %{end_label}"));

                // The untouched side carries its payload over.
                self.f.label(&pass_label);
                let pass_tag: i32 = 1 - hit_tag;
                let pass_ty = if method == "map" { err_ty } else { ok_ty };
                let pass_payload = self.sum_payload(&slot, &ll, 0, pass_ty);
                let pass_wrapped = self.build_enum_value(
                    ret_ty,
                    pass_tag as i128,
                    &[(pass_payload, pass_ty)],
                );
                self.f.emit(&format!(
                    "store {ret_ll} {}, ptr {result_slot}",
                    pass_wrapped.reg
                ));
                self.f.emit_term(&format!("br label %{end_label}"));

                self.f.label(&end_label);
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {ret_ll}, ptr {result_slot}"));
                Val::new(loaded, ret_ll)
            }
            _ => Val::unit(),
        }
    }

    // ── Ordering / StringBuilder / arrays / slices ───────────────────

    fn emit_ordering_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        _ret_ty: TypeId,
    ) -> Val {
        let (ptr, orig_ty) = receiver.clone().expect("ordering methods take a receiver");
        let slot = self.receiver_slot(&Some((ptr, orig_ty)));
        let ord_ty = self.env.interner.named("Ordering", vec![]);
        self.ensure_type_defined(ord_ty);
        let ll = layout::ll_type(self.env, ord_ty);
        let tag = self.sum_tag(&slot, &ll);
        match method {
            "is_lt" | "is_le" | "is_gt" | "is_ge" | "is_eq" | "is_ne" => {
                let (pred, rhs) = match method {
                    "is_lt" => ("eq", 0),
                    "is_eq" => ("eq", 1),
                    "is_gt" => ("eq", 2),
                    "is_le" => ("ne", 2),
                    "is_ge" => ("ne", 0),
                    _ => ("ne", 1),
                };
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = icmp {pred} i32 {tag}, {rhs}"));
                Val::new(reg, "i1")
            }
            "reverse" => {
                let reversed = self.f.fresh_reg();
                self.f.emit(&format!("{reversed} = sub i32 2, {tag}"));
                self.build_enum_value_dyn(ord_ty, &reversed, &[])
            }
            "then" => {
                // Equal defers to the argument, otherwise keep self.
                let is_equal = self.f.fresh_reg();
                self.f.emit(&format!("{is_equal} = icmp eq i32 {tag}, 1"));
                let other_slot = self.spill(&args[0]);
                let other_tag = self.sum_tag(&other_slot, &ll);
                let chosen = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{chosen} = select i1 {is_equal}, i32 {other_tag}, i32 {tag}"
                ));
                self.build_enum_value_dyn(ord_ty, &chosen, &[])
            }
            "to_string" => {
                let less = self.module.intern_string("Less");
                let equal = self.module.intern_string("Equal");
                let greater = self.module.intern_string("Greater");
                let is_less = self.f.fresh_reg();
                self.f.emit(&format!("{is_less} = icmp eq i32 {tag}, 0"));
                let is_equal = self.f.fresh_reg();
                self.f.emit(&format!("{is_equal} = icmp eq i32 {tag}, 1"));
                let ge_str = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{ge_str} = select i1 {is_equal}, ptr {equal}, ptr {greater}"
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {is_less}, ptr {less}, ptr {ge_str}"
                ));
                Val::new(reg, "ptr")
            }
            _ => Val::unit(),
        }
    }

    fn emit_string_builder_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        _ret_ty: TypeId,
    ) -> Val {
        self.module.declare("sb_new", "declare ptr @sb_new()");
        self.module
            .declare("sb_append", "declare void @sb_append(ptr, ptr)");
        self.module
            .declare("sb_append_char", "declare void @sb_append_char(ptr, i32)");
        self.module.declare("sb_len", "declare i64 @sb_len(ptr)");
        self.module.declare("sb_build", "declare ptr @sb_build(ptr)");
        match method {
            "new" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = call ptr @sb_new()"));
                Val::new(reg, "ptr")
            }
            "append" => {
                let sb = self.load_receiver(&receiver);
                self.f.emit(&format!(
                    "call void @sb_append(ptr {}, ptr {})",
                    sb.reg, args[0].reg
                ));
                Val::unit()
            }
            "append_char" => {
                let sb = self.load_receiver(&receiver);
                self.f.emit(&format!(
                    "call void @sb_append_char(ptr {}, i32 {})",
                    sb.reg, args[0].reg
                ));
                Val::unit()
            }
            "len" => {
                let sb = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call i64 @sb_len(ptr {})", sb.reg));
                Val::new(reg, "i64")
            }
            "build" => {
                let sb = self.load_receiver(&receiver);
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @sb_build(ptr {})", sb.reg));
                Val::new(reg, "ptr")
            }
            _ => Val::unit(),
        }
    }

    fn emit_array_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let (ptr, orig_ty) = receiver.clone().expect("array methods take a receiver");
        let slot = self.receiver_slot(&Some((ptr, orig_ty)));
        let recv_ty = {
            let t = self.apply_subst(orig_ty);
            self.env.interner.deref_all(t)
        };
        let (elem_ty, count) = match self.env.interner.get(recv_ty).clone() {
            Type::Array { element, size } => (
                element,
                match size {
                    tml_typeck::ArraySize::Const(n) => n,
                    tml_typeck::ArraySize::Param(_) => 0,
                },
            ),
            _ => (self.env.interner.unit(), 0),
        };
        let ll = layout::ll_type(self.env, recv_ty);
        match method {
            "len" => Val::new(count.to_string(), "i64"),
            "get" => {
                let idx = self.coerce(args[0].clone(), "i64");
                let elem_ll = layout::ll_type(self.env, elem_ty);
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 {}",
                    idx.reg
                ));
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {elem_ll}, ptr {elem_ptr}"));
                Val::new(loaded, elem_ll)
            }
            "set" => {
                let idx = self.coerce(args[0].clone(), "i64");
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 {}",
                    idx.reg
                ));
                self.f.emit(&format!(
                    "store {} {}, ptr {elem_ptr}",
                    args[1].ty, args[1].reg
                ));
                Val::unit()
            }
            "as_ptr" | "as_mut_ptr" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 0"
                ));
                Val::new(reg, "ptr")
            }
            "as_slice" => {
                let data = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{data} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 0"
                ));
                let slice_ll = layout::ll_type(self.env, ret_ty);
                let with_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{with_ptr} = insertvalue {slice_ll} poison, ptr {data}, 0"
                ));
                let full = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{full} = insertvalue {slice_ll} {with_ptr}, i64 {count}, 1"
                ));
                Val::new(full, slice_ll)
            }
            _ => Val::unit(),
        }
    }

    fn emit_slice_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        _ret_ty: TypeId,
    ) -> Val {
        let (ptr, orig_ty) = receiver.clone().expect("slice methods take a receiver");
        let slot = self.receiver_slot(&Some((ptr, orig_ty)));
        let recv_ty = {
            let t = self.apply_subst(orig_ty);
            self.env.interner.deref_all(t)
        };
        let elem_ty = match self.env.interner.get(recv_ty).clone() {
            Type::Slice { element } => element,
            _ => self.env.interner.unit(),
        };
        let ll = layout::ll_type(self.env, recv_ty);
        let load_parts = |gen: &mut Self, slot: &str| -> (String, String) {
            let data_ptr = gen.f.fresh_reg();
            gen.f.emit(&format!(
                "{data_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 0"
            ));
            let data = gen.f.fresh_reg();
            gen.f.emit(&format!("{data} = load ptr, ptr {data_ptr}"));
            let len_ptr = gen.f.fresh_reg();
            gen.f.emit(&format!(
                "{len_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 1"
            ));
            let len = gen.f.fresh_reg();
            gen.f.emit(&format!("{len} = load i64, ptr {len_ptr}"));
            (data, len)
        };
        match method {
            "len" => {
                let (_, len) = load_parts(self, &slot);
                Val::new(len, "i64")
            }
            "is_empty" => {
                let (_, len) = load_parts(self, &slot);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = icmp eq i64 {len}, 0"));
                Val::new(reg, "i1")
            }
            "get" => {
                let (data, _) = load_parts(self, &slot);
                let elem_ll = layout::ll_type(self.env, elem_ty);
                let idx = self.coerce(args[0].clone(), "i64");
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    idx.reg
                ));
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {elem_ll}, ptr {elem_ptr}"));
                Val::new(loaded, elem_ll)
            }
            "set" => {
                let (data, _) = load_parts(self, &slot);
                let elem_ll = layout::ll_type(self.env, elem_ty);
                let idx = self.coerce(args[0].clone(), "i64");
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    idx.reg
                ));
                self.f.emit(&format!(
                    "store {elem_ll} {}, ptr {elem_ptr}",
                    args[1].reg
                ));
                Val::unit()
            }
            "swap" => {
                let (data, _) = load_parts(self, &slot);
                let elem_ll = layout::ll_type(self.env, elem_ty);
                let a = self.coerce(args[0].clone(), "i64");
                let b = self.coerce(args[1].clone(), "i64");
                let pa = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pa} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    a.reg
                ));
                let pb = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pb} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                    b.reg
                ));
                let va = self.f.fresh_reg();
                self.f.emit(&format!("{va} = load {elem_ll}, ptr {pa}"));
                let vb = self.f.fresh_reg();
                self.f.emit(&format!("{vb} = load {elem_ll}, ptr {pb}"));
                self.f.emit(&format!("store {elem_ll} {vb}, ptr {pa}"));
                self.f.emit(&format!("store {elem_ll} {va}, ptr {pb}"));
                Val::unit()
            }
            _ => Val::unit(),
        }
    }

    // ── primitives ───────────────────────────────────────────────────

    fn emit_primitive_method(
        &mut self,
        kind: PrimKind,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let ll = layout::ll_prim(kind).to_string();
        let bits = kind.bit_width().unwrap_or(64);
        let signed = kind.is_signed();

        // Statics first: no receiver value.
        match method {
            "default" => return Val::new(if kind.is_float() { "0.0" } else { "0" }, ll),
            "min_value" => {
                let v: i128 = if signed { -(1i128 << (bits - 1)) } else { 0 };
                return Val::new(v.to_string(), ll);
            }
            "max_value" => {
                let v: i128 = if signed {
                    (1i128 << (bits - 1)) - 1
                } else if bits >= 128 {
                    i128::MAX
                } else {
                    (1i128 << bits) - 1
                };
                return Val::new(v.to_string(), ll);
            }
            "from_str" => {
                self.module
                    .declare("str_parse_i64", "declare { i64, i1 } @str_parse_i64(ptr)");
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = call {{ i64, i1 }} @str_parse_i64(ptr {})",
                    args[0].reg
                ));
                let value = self.f.fresh_reg();
                self.f
                    .emit(&format!("{value} = extractvalue {{ i64, i1 }} {pair}, 0"));
                let failed = self.f.fresh_reg();
                self.f
                    .emit(&format!("{failed} = extractvalue {{ i64, i1 }} {pair}, 1"));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {failed} to i32"));
                let narrow = self.coerce(Val::new(value, "i64"), &ll);
                let self_ty = self.env.interner.prim(kind);
                return self.build_enum_value_dyn(ret_ty, &tag, &[(narrow, self_ty)]);
            }
            _ => {}
        }

        if kind == PrimKind::Str {
            return self.emit_str_method(method, receiver, args, ret_ty);
        }

        let recv = self.load_receiver(&receiver);

        match method {
            "add" | "sub" | "mul" | "div" | "rem" => {
                let op = match method {
                    "add" => BinOp::Add,
                    "sub" => BinOp::Sub,
                    "mul" => BinOp::Mul,
                    "div" => BinOp::Div,
                    _ => BinOp::Rem,
                };
                let self_ty = self.env.interner.prim(kind);
                self.emit_binop_values(op, recv, args[0].clone(), self_ty)
            }
            "eq" | "ne" | "lt" | "le" | "gt" | "ge" => {
                let op = match method {
                    "eq" => BinOp::Eq,
                    "ne" => BinOp::Ne,
                    "lt" => BinOp::Lt,
                    "le" => BinOp::Le,
                    "gt" => BinOp::Gt,
                    _ => BinOp::Ge,
                };
                let self_ty = self.env.interner.prim(kind);
                self.emit_binop_values(op, recv, args[0].clone(), self_ty)
            }
            "bitand" | "bitor" | "bitxor" | "shl" | "shr" => {
                let op = match method {
                    "bitand" => BinOp::BitAnd,
                    "bitor" => BinOp::BitOr,
                    "bitxor" => BinOp::BitXor,
                    "shl" => BinOp::Shl,
                    _ => BinOp::Shr,
                };
                // Shift amounts are U32 by signature.
                let u32_ty = self.env.interner.prim(PrimKind::U32);
                let rhs = self.coerce_from(args[0].clone(), Some(u32_ty), &ll);
                let self_ty = self.env.interner.prim(kind);
                self.emit_binop_values(op, recv, rhs, self_ty)
            }
            "bitnot" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = xor {ll} {}, -1", recv.reg));
                Val::new(reg, ll)
            }
            "not" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = xor i1 {}, true", recv.reg));
                Val::new(reg, "i1")
            }
            "neg" => {
                let reg = self.f.fresh_reg();
                if kind.is_float() {
                    self.f.emit(&format!("{reg} = fneg {ll} {}", recv.reg));
                } else {
                    self.f.emit(&format!("{reg} = sub {ll} 0, {}", recv.reg));
                }
                Val::new(reg, ll)
            }
            "abs" => {
                if kind.is_float() {
                    let intrinsic = format!("llvm.fabs.{}", float_suffix(&ll));
                    self.module.declare(
                        &intrinsic,
                        &format!("declare {ll} @{intrinsic}({ll})"),
                    );
                    let reg = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{reg} = call {ll} @{intrinsic}({ll} {})",
                        recv.reg
                    ));
                    return Val::new(reg, ll);
                }
                let negated = self.f.fresh_reg();
                self.f
                    .emit(&format!("{negated} = sub {ll} 0, {}", recv.reg));
                let is_neg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{is_neg} = icmp slt {ll} {}, 0", recv.reg));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {is_neg}, {ll} {negated}, {ll} {}",
                    recv.reg
                ));
                Val::new(reg, ll)
            }
            "min" | "max" => {
                let pred = if kind.is_float() {
                    if method == "min" { "fcmp olt" } else { "fcmp ogt" }
                } else if signed {
                    if method == "min" { "icmp slt" } else { "icmp sgt" }
                } else if method == "min" {
                    "icmp ult"
                } else {
                    "icmp ugt"
                };
                let cmp = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{cmp} = {pred} {ll} {}, {}",
                    recv.reg, args[0].reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = select i1 {cmp}, {ll} {}, {ll} {}",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, ll)
            }
            "cmp" | "partial_cmp" => {
                let (lt_pred, eq_pred) = if kind.is_float() {
                    ("fcmp olt", "fcmp oeq")
                } else if signed {
                    ("icmp slt", "icmp eq")
                } else {
                    ("icmp ult", "icmp eq")
                };
                let lt = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{lt} = {lt_pred} {ll} {}, {}",
                    recv.reg, args[0].reg
                ));
                let eq = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{eq} = {eq_pred} {ll} {}, {}",
                    recv.reg, args[0].reg
                ));
                let ge_tag = self.f.fresh_reg();
                self.f
                    .emit(&format!("{ge_tag} = select i1 {eq}, i32 1, i32 2"));
                let tag = self.f.fresh_reg();
                self.f
                    .emit(&format!("{tag} = select i1 {lt}, i32 0, i32 {ge_tag}"));
                let ord_ty = self.env.interner.named("Ordering", vec![]);
                let ordering = self.build_enum_value_dyn(ord_ty, &tag, &[]);
                if method == "cmp" {
                    return ordering;
                }
                self.build_enum_value(ret_ty, 0, &[(ordering, ord_ty)])
            }
            "checked_add" | "checked_sub" | "checked_mul" => {
                let op = &method[8..11];
                let prefix = if signed { "s" } else { "u" };
                let intrinsic = format!("llvm.{prefix}{op}.with.overflow.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {{ {ll}, i1 }} @{intrinsic}({ll}, {ll})"),
                );
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = call {{ {ll}, i1 }} @{intrinsic}({ll} {}, {ll} {})",
                    recv.reg, args[0].reg
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
                let self_ty = self.env.interner.prim(kind);
                self.build_enum_value_dyn(ret_ty, &tag, &[(Val::new(value, ll.clone()), self_ty)])
            }
            "checked_div" => {
                let zero = self.f.fresh_reg();
                self.f
                    .emit(&format!("{zero} = icmp eq {ll} {}, 0", args[0].reg));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {zero} to i32"));
                // Divide by 1 on the zero path to keep the instruction
                // well-defined; the tag marks the result invalid.
                let safe = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{safe} = select i1 {zero}, {ll} 1, {ll} {}",
                    args[0].reg
                ));
                let div = self.f.fresh_reg();
                let op = if signed { "sdiv" } else { "udiv" };
                self.f
                    .emit(&format!("{div} = {op} {ll} {}, {safe}", recv.reg));
                let self_ty = self.env.interner.prim(kind);
                self.build_enum_value_dyn(ret_ty, &tag, &[(Val::new(div, ll.clone()), self_ty)])
            }
            "saturating_add" | "saturating_sub" | "saturating_mul" => {
                let op = &method[11..14];
                if op == "mul" {
                    // No saturating-multiply intrinsic; clamp via overflow.
                    let prefix = if signed { "s" } else { "u" };
                    let intrinsic = format!("llvm.{prefix}mul.with.overflow.{ll}");
                    self.module.declare(
                        &intrinsic,
                        &format!("declare {{ {ll}, i1 }} @{intrinsic}({ll}, {ll})"),
                    );
                    let pair = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{pair} = call {{ {ll}, i1 }} @{intrinsic}({ll} {}, {ll} {})",
                        recv.reg, args[0].reg
                    ));
                    let value = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{value} = extractvalue {{ {ll}, i1 }} {pair}, 0"
                    ));
                    let overflow = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{overflow} = extractvalue {{ {ll}, i1 }} {pair}, 1"
                    ));
                    let cap: i128 = if signed {
                        (1i128 << (bits - 1)) - 1
                    } else if bits >= 128 {
                        i128::MAX
                    } else {
                        (1i128 << bits) - 1
                    };
                    let reg = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{reg} = select i1 {overflow}, {ll} {cap}, {ll} {value}"
                    ));
                    return Val::new(reg, ll);
                }
                let prefix = if signed { "s" } else { "u" };
                let intrinsic = format!("llvm.{prefix}{op}.sat.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, {ll})"),
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {})",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, ll)
            }
            "wrapping_add" | "wrapping_sub" | "wrapping_mul" => {
                let instr = match &method[9..12] {
                    "add" => "add",
                    "sub" => "sub",
                    _ => "mul",
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = {instr} {ll} {}, {}",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, ll)
            }
            "leading_zeros" | "trailing_zeros" | "count_ones" => {
                let (intrinsic_base, takes_flag) = match method {
                    "leading_zeros" => ("ctlz", true),
                    "trailing_zeros" => ("cttz", true),
                    _ => ("ctpop", false),
                };
                let intrinsic = format!("llvm.{intrinsic_base}.{ll}");
                let decl = if takes_flag {
                    format!("declare {ll} @{intrinsic}({ll}, i1)")
                } else {
                    format!("declare {ll} @{intrinsic}({ll})")
                };
                self.module.declare(&intrinsic, &decl);
                let wide = self.f.fresh_reg();
                if takes_flag {
                    self.f.emit(&format!(
                        "{wide} = call {ll} @{intrinsic}({ll} {}, i1 false)",
                        recv.reg
                    ));
                } else {
                    self.f.emit(&format!(
                        "{wide} = call {ll} @{intrinsic}({ll} {})",
                        recv.reg
                    ));
                }
                self.coerce(Val::new(wide, ll), "i32")
            }
            "swap_bytes" | "reverse_bits" => {
                let base = if method == "swap_bytes" {
                    "bswap"
                } else {
                    "bitreverse"
                };
                let intrinsic = format!("llvm.{base}.{ll}");
                self.module
                    .declare(&intrinsic, &format!("declare {ll} @{intrinsic}({ll})"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {})",
                    recv.reg
                ));
                Val::new(reg, ll)
            }
            "rotate_left" | "rotate_right" => {
                let base = if method == "rotate_left" { "fshl" } else { "fshr" };
                let intrinsic = format!("llvm.{base}.{ll}");
                self.module.declare(
                    &intrinsic,
                    &format!("declare {ll} @{intrinsic}({ll}, {ll}, {ll})"),
                );
                let u32_ty = self.env.interner.prim(PrimKind::U32);
                let amount = self.coerce_from(args[0].clone(), Some(u32_ty), &ll);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {}, {ll} {})",
                    recv.reg, recv.reg, amount.reg
                ));
                Val::new(reg, ll)
            }
            "is_power_of_two" => {
                let pop = format!("llvm.ctpop.{ll}");
                self.module
                    .declare(&pop, &format!("declare {ll} @{pop}({ll})"));
                let count = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{count} = call {ll} @{pop}({ll} {})",
                    recv.reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = icmp eq {ll} {count}, 1"));
                Val::new(reg, "i1")
            }
            "pow" => {
                if kind.is_float() {
                    let intrinsic = format!("llvm.pow.{}", float_suffix(&ll));
                    self.module.declare(
                        &intrinsic,
                        &format!("declare {ll} @{intrinsic}({ll}, {ll})"),
                    );
                    let reg = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{reg} = call {ll} @{intrinsic}({ll} {}, {ll} {})",
                        recv.reg, args[0].reg
                    ));
                    return Val::new(reg, ll);
                }
                self.module
                    .declare("int_pow", "declare i64 @int_pow(i64, i32)");
                let self_ty = self.env.interner.prim(kind);
                let wide = self.coerce_from(recv, Some(self_ty), "i64");
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i64 @int_pow(i64 {}, i32 {})",
                    wide.reg, args[0].reg
                ));
                self.coerce(Val::new(reg, "i64"), &ll)
            }
            "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc" => {
                let intrinsic = format!("llvm.{method}.{}", float_suffix(&ll));
                self.module
                    .declare(&intrinsic, &format!("declare {ll} @{intrinsic}({ll})"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call {ll} @{intrinsic}({ll} {})",
                    recv.reg
                ));
                Val::new(reg, ll)
            }
            "is_nan" => {
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = fcmp uno {ll} {}, 0.0", recv.reg));
                Val::new(reg, "i1")
            }
            "is_infinite" | "is_finite" => {
                let intrinsic = format!("llvm.fabs.{}", float_suffix(&ll));
                self.module
                    .declare(&intrinsic, &format!("declare {ll} @{intrinsic}({ll})"));
                let magnitude = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{magnitude} = call {ll} @{intrinsic}({ll} {})",
                    recv.reg
                ));
                let pred = if method == "is_infinite" { "oeq" } else { "one" };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = fcmp {pred} {ll} {magnitude}, 0x7FF0000000000000"
                ));
                Val::new(reg, "i1")
            }
            "to_string" | "debug_string" => {
                let helper = if kind.is_float() {
                    self.module
                        .declare("str_from_f64", "declare ptr @str_from_f64(double)");
                    let wide = self.coerce(recv, "double");
                    format!("call ptr @str_from_f64(double {})", wide.reg)
                } else if kind == PrimKind::Bool {
                    self.module
                        .declare("str_from_bool", "declare ptr @str_from_bool(i1)");
                    format!("call ptr @str_from_bool(i1 {})", recv.reg)
                } else if kind == PrimKind::Char {
                    self.module
                        .declare("str_from_char", "declare ptr @str_from_char(i32)");
                    format!("call ptr @str_from_char(i32 {})", recv.reg)
                } else {
                    self.module
                        .declare("str_from_i64", "declare ptr @str_from_i64(i64)");
                    let self_ty = self.env.interner.prim(kind);
                    let wide = self.coerce_from(recv, Some(self_ty), "i64");
                    format!("call ptr @str_from_i64(i64 {})", wide.reg)
                };
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = {helper}"));
                Val::new(reg, "ptr")
            }
            "to_u32" => self.coerce(recv, "i32"),
            "is_alphabetic" | "is_numeric" | "is_whitespace" => {
                let helper = format!("char_{method}");
                self.module
                    .declare(&helper, &format!("declare i1 @{helper}(i32)"));
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call i1 @{helper}(i32 {})", recv.reg));
                Val::new(reg, "i1")
            }
            _ => Val::unit(),
        }
    }

    fn emit_str_method(
        &mut self,
        method: &str,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let recv = self.load_receiver(&receiver);
        match method {
            "len" => {
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call i64 @strlen(ptr {})", recv.reg));
                Val::new(reg, "i64")
            }
            "is_empty" => {
                let len = self.f.fresh_reg();
                self.f
                    .emit(&format!("{len} = call i64 @strlen(ptr {})", recv.reg));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = icmp eq i64 {len}, 0"));
                Val::new(reg, "i1")
            }
            "concat" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call ptr @str_concat_opt(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, "ptr")
            }
            "eq" => {
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i1 @str_eq(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, "i1")
            }
            "ne" => {
                let eq = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{eq} = call i1 @str_eq(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = xor i1 {eq}, true"));
                Val::new(reg, "i1")
            }
            "contains" | "starts_with" | "ends_with" => {
                let helper = format!("str_{method}");
                self.module
                    .declare(&helper, &format!("declare i1 @{helper}(ptr, ptr)"));
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i1 @{helper}(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, "i1")
            }
            "substring" => {
                self.module.declare(
                    "str_substring",
                    "declare ptr @str_substring(ptr, i64, i64)",
                );
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call ptr @str_substring(ptr {}, i64 {}, i64 {})",
                    recv.reg, args[0].reg, args[1].reg
                ));
                Val::new(reg, "ptr")
            }
            "trim" | "to_upper" | "to_lower" => {
                let helper = format!("str_{method}");
                self.module
                    .declare(&helper, &format!("declare ptr @{helper}(ptr)"));
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @{helper}(ptr {})", recv.reg));
                Val::new(reg, "ptr")
            }
            "split" => {
                self.module
                    .declare("str_split", "declare ptr @str_split(ptr, ptr)");
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call ptr @str_split(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                Val::new(reg, "ptr")
            }
            "char_at" => {
                self.module.declare(
                    "str_char_at",
                    "declare { i32, i1 } @str_char_at(ptr, i64)",
                );
                let pair = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pair} = call {{ i32, i1 }} @str_char_at(ptr {}, i64 {})",
                    recv.reg, args[0].reg
                ));
                let value = self.f.fresh_reg();
                self.f
                    .emit(&format!("{value} = extractvalue {{ i32, i1 }} {pair}, 0"));
                let missing = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{missing} = extractvalue {{ i32, i1 }} {pair}, 1"
                ));
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = zext i1 {missing} to i32"));
                let char_ty = self.env.interner.prim(PrimKind::Char);
                self.build_enum_value_dyn(ret_ty, &tag, &[(Val::new(value, "i32"), char_ty)])
            }
            "cmp" => {
                self.module
                    .declare("str_cmp", "declare i32 @str_cmp(ptr, ptr)");
                let raw = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{raw} = call i32 @str_cmp(ptr {}, ptr {})",
                    recv.reg, args[0].reg
                ));
                // -1/0/1 maps to tags 0/1/2.
                let tag = self.f.fresh_reg();
                self.f.emit(&format!("{tag} = add i32 {raw}, 1"));
                let ord_ty = self.env.interner.named("Ordering", vec![]);
                self.build_enum_value_dyn(ord_ty, &tag, &[])
            }
            "to_string" | "debug_string" => recv,
            _ => Val::unit(),
        }
    }

    // ── dynamic-tag enum construction ────────────────────────────────

    /// Like `build_enum_value`, with a runtime tag register.
    pub fn build_enum_value_dyn(
        &mut self,
        ty: TypeId,
        tag_reg: &str,
        payload: &[(Val, TypeId)],
    ) -> Val {
        self.ensure_type_defined(ty);
        let ll = layout::ll_type(self.env, ty);
        let slot = self.f.fresh_reg();
        self.f.emit(&format!("{slot} = alloca {ll}"));
        let tag_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{tag_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 0"
        ));
        self.f.emit(&format!("store i32 {tag_reg}, ptr {tag_ptr}"));
        if !payload.is_empty() {
            let tys: Vec<TypeId> = payload.iter().map(|(_, t)| *t).collect();
            let offsets = layout::variant_payload_offsets(self.env, &tys);
            let base = self.f.fresh_reg();
            self.f.emit(&format!(
                "{base} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 1"
            ));
            for ((val, _), offset) in payload.iter().zip(&offsets) {
                if val.is_unit() {
                    continue;
                }
                let elem_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{elem_ptr} = getelementptr inbounds i8, ptr {base}, i64 {offset}"
                ));
                self.f
                    .emit(&format!("store {} {}, ptr {elem_ptr}", val.ty, val.reg));
            }
        }
        let loaded = self.f.fresh_reg();
        self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
        Val::new(loaded, ll)
    }

    // ── derived methods ──────────────────────────────────────────────

    /// Call a derive-synthesized method, enqueuing its body.
    fn emit_derived_call(
        &mut self,
        owner: &str,
        method: &str,
        resolution: &MethodResolution,
        receiver: Option<(String, TypeId)>,
        args: Vec<Val>,
        ret_ty: TypeId,
    ) -> Val {
        let receiver_ty = self.apply_subst(resolution.receiver);
        let type_args = match self.env.interner.get(receiver_ty).clone() {
            Type::Named { args, .. } => args,
            _ => Vec::new(),
        };
        let is_library = self
            .env
            .structs
            .get(owner)
            .map(|d| d.is_library)
            .or_else(|| self.env.enums.get(owner).map(|d| d.is_library))
            .unwrap_or(false);
        let symbol = mangle::method_symbol(self.env, owner, &type_args, method);
        self.queue.enqueue(MonoItem {
            symbol: symbol.clone(),
            request: MonoRequest::Derived {
                type_name: owner.to_string(),
                type_args: type_args.clone(),
                method: method.to_string(),
            },
            is_library,
        });
        let symbol = mangle::apply_prefix(&symbol, &self.options.suite, is_library);

        let ret_ll = layout::ll_type(self.env, ret_ty);
        let mut call_args = Vec::new();
        if let Some((ptr, ty)) = &receiver {
            let slot = self.receiver_slot(&Some((ptr.clone(), *ty)));
            call_args.push(format!("ptr {slot}"));
        }
        for arg in &args {
            if !arg.is_unit() {
                call_args.push(format!("{} {}", arg.ty, arg.reg));
            }
        }
        let arg_list = call_args.join(", ");
        if ret_ll == "void" {
            self.f.emit(&format!("call void @{symbol}({arg_list})"));
            return Val::unit();
        }
        let reg = self.f.fresh_reg();
        self.f
            .emit(&format!("{reg} = call {ret_ll} @{symbol}({arg_list})"));
        Val::new(reg, ret_ll)
    }

    /// Emit the body of a derive-synthesized method.
    pub fn emit_derived_method(
        &mut self,
        symbol: &str,
        type_name: &str,
        type_args: &[TypeId],
        method: &str,
    ) {
        let self_ty = self.env.interner.named(type_name, type_args.to_vec());
        self.ensure_type_defined(self_ty);
        let self_ll = layout::ll_type(self.env, self_ty);

        self.f = crate::ir::FuncBuilder::new();
        self.locals = vec![FxHashMap::default()];
        self.drop_scopes = vec![Vec::new()];

        match method {
            "eq" | "ne" => {
                self.f.raw(&format!(
                    "define linkonce_odr i1 @{symbol}(ptr %arg.this, {self_ll} %arg.other) {{"
                ));
                self.f.label("entry");
                let other_slot = self.f.fresh_reg();
                self.f.emit(&format!("{other_slot} = alloca {self_ll}"));
                self.f.emit(&format!(
                    "store {self_ll} %arg.other, ptr {other_slot}"
                ));
                let eq = self.emit_structural_eq(type_name, type_args, "%arg.this", &other_slot);
                if method == "ne" {
                    let inverted = self.f.fresh_reg();
                    self.f.emit(&format!("{inverted} = xor i1 {eq}, true"));
                    self.f.emit_term(&format!("ret i1 {inverted}"));
                } else {
                    self.f.emit_term(&format!("ret i1 {eq}"));
                }
            }
            "duplicate" => {
                self.f.raw(&format!(
                    "define linkonce_odr {self_ll} @{symbol}(ptr %arg.this) {{"
                ));
                self.f.label("entry");
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {self_ll}, ptr %arg.this"));
                self.f.emit_term(&format!("ret {self_ll} {loaded}"));
            }
            "default" => {
                self.f
                    .raw(&format!("define linkonce_odr {self_ll} @{symbol}() {{"));
                self.f.label("entry");
                self.f
                    .emit_term(&format!("ret {self_ll} zeroinitializer"));
            }
            "hash" => {
                self.module
                    .declare("hash_bytes", "declare i64 @hash_bytes(ptr, i64)");
                self.f.raw(&format!(
                    "define linkonce_odr i64 @{symbol}(ptr %arg.this) {{"
                ));
                self.f.label("entry");
                let size = layout::size_of(self.env, self_ty);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call i64 @hash_bytes(ptr %arg.this, i64 {size})"
                ));
                self.f.emit_term(&format!("ret i64 {reg}"));
            }
            "to_string" | "debug_string" => {
                self.f.raw(&format!(
                    "define linkonce_odr ptr @{symbol}(ptr %arg.this) {{"
                ));
                self.f.label("entry");
                let result = self.emit_derived_display(type_name, type_args, method);
                self.f.emit_term(&format!("ret ptr {result}"));
            }
            "serialize" => {
                self.f.raw(&format!(
                    "define linkonce_odr ptr @{symbol}(ptr %arg.this) {{"
                ));
                self.f.label("entry");
                let result = self.emit_derived_serialize(type_name, type_args);
                self.f.emit_term(&format!("ret ptr {result}"));
            }
            "cmp" | "partial_cmp" => {
                self.emit_derived_cmp(symbol, type_name, type_args, method == "partial_cmp");
            }
            "from_str" | "deserialize" => {
                // Reconstruction from text is runtime-assisted; absent a
                // registered decoder the result is Nothing.
                let maybe_ty = self.env.interner.maybe(self_ty);
                self.ensure_type_defined(maybe_ty);
                let maybe_ll = layout::ll_type(self.env, maybe_ty);
                self.f.raw(&format!(
                    "define linkonce_odr {maybe_ll} @{symbol}(ptr %arg.input) {{"
                ));
                self.f.label("entry");
                let nothing = self.build_enum_value(maybe_ty, 1, &[]);
                self.f
                    .emit_term(&format!("ret {maybe_ll} {}", nothing.reg));
            }
            _ => return,
        }

        self.f.raw("}");
        let body = std::mem::take(&mut self.f).into_body();
        self.module.add_function(body);
    }

    /// Concatenate two string registers through the runtime.
    fn concat(&mut self, acc: String, piece: String) -> String {
        let reg = self.f.fresh_reg();
        self.f.emit(&format!(
            "{reg} = call ptr @str_concat_opt(ptr {acc}, ptr {piece})"
        ));
        reg
    }

    /// A Str-valued rendering of the field at `index`, loaded from `this`.
    /// Nested types with a rendering derive recurse through their own
    /// synthesized body; anything else falls back to its type name.
    fn field_display(
        &mut self,
        self_ll: &str,
        this_ptr: &str,
        index: usize,
        field_ty: TypeId,
        method: &str,
    ) -> String {
        let field_ll = layout::ll_type(self.env, field_ty);
        let field_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{field_ptr} = getelementptr inbounds {self_ll}, ptr {this_ptr}, i32 0, i32 {index}"
        ));

        match self.env.interner.get(field_ty).clone() {
            Type::Prim(PrimKind::Str) => {
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load ptr, ptr {field_ptr}"));
                loaded
            }
            Type::Prim(kind) if kind.is_float() => {
                self.module
                    .declare("str_from_f64", "declare ptr @str_from_f64(double)");
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {field_ll}, ptr {field_ptr}"));
                let wide = self.coerce(Val::new(loaded, field_ll), "double");
                let reg = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{reg} = call ptr @str_from_f64(double {})",
                    wide.reg
                ));
                reg
            }
            Type::Prim(PrimKind::Bool) => {
                self.module
                    .declare("str_from_bool", "declare ptr @str_from_bool(i1)");
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load i1, ptr {field_ptr}"));
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @str_from_bool(i1 {loaded})"));
                reg
            }
            Type::Prim(PrimKind::Char) => {
                self.module
                    .declare("str_from_char", "declare ptr @str_from_char(i32)");
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load i32, ptr {field_ptr}"));
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @str_from_char(i32 {loaded})"));
                reg
            }
            Type::Prim(kind) if kind.is_integer() => {
                self.module
                    .declare("str_from_i64", "declare ptr @str_from_i64(i64)");
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {field_ll}, ptr {field_ptr}"));
                let wide = self.coerce_from(Val::new(loaded, field_ll), Some(field_ty), "i64");
                let reg = self.f.fresh_reg();
                self.f
                    .emit(&format!("{reg} = call ptr @str_from_i64(i64 {})", wide.reg));
                reg
            }
            Type::Named { name, args, .. } => {
                let rendered = self.nested_derive_call(&name, &args, method, &field_ptr);
                match rendered {
                    Some(reg) => reg,
                    None => {
                        let display = self.env.interner.display(field_ty);
                        self.module.intern_string(&display)
                    }
                }
            }
            _ => {
                let display = self.env.interner.display(field_ty);
                self.module.intern_string(&display)
            }
        }
    }

    /// Call a nested type's derive-synthesized renderer, when it has one.
    fn nested_derive_call(
        &mut self,
        name: &str,
        args: &[TypeId],
        method: &str,
        field_ptr: &str,
    ) -> Option<String> {
        let derives = self
            .env
            .structs
            .get(name)
            .map(|d| d.derives.clone())
            .or_else(|| self.env.enums.get(name).map(|d| d.derives.clone()))?;
        let wanted = match method {
            "to_string" => tml_ast::Derive::Display,
            "debug_string" => tml_ast::Derive::Debug,
            _ => tml_ast::Derive::Serialize,
        };
        if !derives.contains(&wanted) {
            return None;
        }
        let is_library = self
            .env
            .structs
            .get(name)
            .map(|d| d.is_library)
            .or_else(|| self.env.enums.get(name).map(|d| d.is_library))
            .unwrap_or(false);
        let nested = mangle::method_symbol(self.env, name, args, method);
        self.queue.enqueue(MonoItem {
            symbol: nested.clone(),
            request: MonoRequest::Derived {
                type_name: name.to_string(),
                type_args: args.to_vec(),
                method: method.to_string(),
            },
            is_library,
        });
        let nested = mangle::apply_prefix(&nested, &self.options.suite, is_library);
        let reg = self.f.fresh_reg();
        self.f
            .emit(&format!("{reg} = call ptr @{nested}(ptr {field_ptr})"));
        Some(reg)
    }

    /// Select the matched variant's name from the tag: a chain of selects,
    /// one per variant past the first.
    fn variant_name_by_tag(
        &mut self,
        variants: &[(String, Vec<TypeId>)],
        enum_name: &str,
        tag: &str,
        qualify: bool,
    ) -> String {
        let mut names = variants.iter().map(|(n, _)| {
            if qualify {
                format!("{enum_name}::{n}")
            } else {
                n.clone()
            }
        });
        let first = names.next().unwrap_or_else(|| enum_name.to_string());
        let mut chosen = self.module.intern_string(&first);
        let tags: Vec<i128> = variants
            .iter()
            .map(|(n, _)| {
                layout::variant_tag(self.env, enum_name, n).unwrap_or_default()
            })
            .collect();
        for (index, name) in names.enumerate() {
            let global = self.module.intern_string(&name);
            let matches = self.f.fresh_reg();
            self.f.emit(&format!(
                "{matches} = icmp eq i32 {tag}, {}",
                tags[index + 1]
            ));
            let next = self.f.fresh_reg();
            self.f.emit(&format!(
                "{next} = select i1 {matches}, ptr {global}, ptr {chosen}"
            ));
            chosen = next;
        }
        chosen
    }

    /// The `to_string`/`debug_string` body: `Name(f1, f2)` for structs,
    /// `Name::Variant` for enums.
    fn emit_derived_display(
        &mut self,
        type_name: &str,
        type_args: &[TypeId],
        method: &str,
    ) -> String {
        let self_ty = self.env.interner.named(type_name, type_args.to_vec());
        let self_ll = layout::ll_type(self.env, self_ty);

        if let Some(def) = self.env.enums.get(type_name) {
            // Bitflag enums are bare integers; render the type name.
            if def.flags.is_some() {
                return self.module.intern_string(type_name);
            }
            let variants = layout::enum_variants(self.env, type_name, type_args);
            let tag = self.sum_tag("%arg.this", &self_ll);
            return self.variant_name_by_tag(&variants, type_name, &tag, true);
        }

        let fields = layout::instantiated_fields(self.env, type_name, type_args);
        let comma = self.module.intern_string(", ");
        let open = self.module.intern_string(&format!("{type_name}("));
        let close = self.module.intern_string(")");
        let mut acc = open;
        let mut first = true;
        for (index, (_, field_ty)) in fields.iter().enumerate() {
            let field_ll = layout::ll_type(self.env, *field_ty);
            if field_ll == "void" {
                continue;
            }
            if !first {
                acc = self.concat(acc, comma.clone());
            }
            first = false;
            let piece = self.field_display(&self_ll, "%arg.this", index, *field_ty, method);
            acc = self.concat(acc, piece);
        }
        self.concat(acc, close)
    }

    /// The `serialize` body: `{"field":value,...}` for structs,
    /// `{"type":"Name","variant":"V"}` for enums. String fields render
    /// quoted; other fields render through their display conversion.
    fn emit_derived_serialize(&mut self, type_name: &str, type_args: &[TypeId]) -> String {
        let self_ty = self.env.interner.named(type_name, type_args.to_vec());
        let self_ll = layout::ll_type(self.env, self_ty);
        let quote = self.module.intern_string("\"");

        if let Some(def) = self.env.enums.get(type_name) {
            if def.flags.is_some() {
                let text = format!("{{\"type\":\"{type_name}\"}}");
                return self.module.intern_string(&text);
            }
            let variants = layout::enum_variants(self.env, type_name, type_args);
            let tag = self.sum_tag("%arg.this", &self_ll);
            let variant = self.variant_name_by_tag(&variants, type_name, &tag, false);
            let head = self
                .module
                .intern_string(&format!("{{\"type\":\"{type_name}\",\"variant\":\""));
            let tail = self.module.intern_string("\"}");
            let acc = self.concat(head, variant);
            return self.concat(acc, tail);
        }

        let fields = layout::instantiated_fields(self.env, type_name, type_args);
        let open = self.module.intern_string("{");
        let close = self.module.intern_string("}");
        let mut acc = open;
        let mut first = true;
        for (index, (field_name, field_ty)) in fields.iter().enumerate() {
            let field_ll = layout::ll_type(self.env, *field_ty);
            if field_ll == "void" {
                continue;
            }
            let prefix = if first {
                format!("\"{field_name}\":")
            } else {
                format!(",\"{field_name}\":")
            };
            first = false;
            let prefix = self.module.intern_string(&prefix);
            acc = self.concat(acc, prefix);
            let quoted = self
                .env
                .interner
                .is_prim(*field_ty, PrimKind::Str);
            if quoted {
                acc = self.concat(acc, quote.clone());
            }
            let piece = self.field_display(&self_ll, "%arg.this", index, *field_ty, "serialize");
            acc = self.concat(acc, piece);
            if quoted {
                acc = self.concat(acc, quote.clone());
            }
        }
        self.concat(acc, close)
    }

    /// Field-wise equality: primitives compare directly, strings through the
    /// runtime, enums by tag and payload bytes.
    fn emit_structural_eq(
        &mut self,
        type_name: &str,
        type_args: &[TypeId],
        this_ptr: &str,
        other_ptr: &str,
    ) -> String {
        let self_ty = self.env.interner.named(type_name, type_args.to_vec());
        let self_ll = layout::ll_type(self.env, self_ty);

        if self.env.enums.contains_key(type_name) {
            // Tag equality plus payload byte equality.
            self.module
                .declare("memcmp", "declare i32 @memcmp(ptr, ptr, i64)");
            let size = layout::size_of(self.env, self_ty);
            let raw = self.f.fresh_reg();
            self.f.emit(&format!(
                "{raw} = call i32 @memcmp(ptr {this_ptr}, ptr {other_ptr}, i64 {size})"
            ));
            let reg = self.f.fresh_reg();
            self.f.emit(&format!("{reg} = icmp eq i32 {raw}, 0"));
            return reg;
        }

        let fields = layout::instantiated_fields(self.env, type_name, type_args);
        let mut acc = "true".to_string();
        for (index, (_, field_ty)) in fields.iter().enumerate() {
            let field_ll = layout::ll_type(self.env, *field_ty);
            if field_ll == "void" {
                continue;
            }
            let a_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{a_ptr} = getelementptr inbounds {self_ll}, ptr {this_ptr}, i32 0, i32 {index}"
            ));
            let b_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{b_ptr} = getelementptr inbounds {self_ll}, ptr {other_ptr}, i32 0, i32 {index}"
            ));
            let a = self.f.fresh_reg();
            self.f.emit(&format!("{a} = load {field_ll}, ptr {a_ptr}"));
            let b = self.f.fresh_reg();
            self.f.emit(&format!("{b} = load {field_ll}, ptr {b_ptr}"));

            let field_eq = match self.env.interner.get(*field_ty).clone() {
                Type::Prim(PrimKind::Str) => {
                    let reg = self.f.fresh_reg();
                    self.f
                        .emit(&format!("{reg} = call i1 @str_eq(ptr {a}, ptr {b})"));
                    reg
                }
                Type::Prim(kind) if kind.is_float() => {
                    let reg = self.f.fresh_reg();
                    self.f
                        .emit(&format!("{reg} = fcmp oeq {field_ll} {a}, {b}"));
                    reg
                }
                Type::Prim(_) => {
                    let reg = self.f.fresh_reg();
                    self.f
                        .emit(&format!("{reg} = icmp eq {field_ll} {a}, {b}"));
                    reg
                }
                Type::Named { name, args, .. } => {
                    // Nested types compare through their own derived eq.
                    let nested = mangle::method_symbol(self.env, &name, &args, "eq");
                    let is_library = self
                        .env
                        .structs
                        .get(&name)
                        .map(|d| d.is_library)
                        .unwrap_or(false);
                    self.queue.enqueue(MonoItem {
                        symbol: nested.clone(),
                        request: MonoRequest::Derived {
                            type_name: name.clone(),
                            type_args: args.clone(),
                            method: "eq".to_string(),
                        },
                        is_library,
                    });
                    let nested =
                        mangle::apply_prefix(&nested, &self.options.suite, is_library);
                    let reg = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{reg} = call i1 @{nested}(ptr {a_ptr}, {field_ll} {b})"
                    ));
                    reg
                }
                _ => "true".to_string(),
            };

            if acc == "true" {
                acc = field_eq;
            } else {
                let combined = self.f.fresh_reg();
                self.f
                    .emit(&format!("{combined} = and i1 {acc}, {field_eq}"));
                acc = combined;
            }
        }
        acc
    }

    /// Lexicographic field comparison producing an `Ordering` (or
    /// `Maybe[Ordering]` for partial_cmp).
    fn emit_derived_cmp(
        &mut self,
        symbol: &str,
        type_name: &str,
        type_args: &[TypeId],
        partial: bool,
    ) {
        let self_ty = self.env.interner.named(type_name, type_args.to_vec());
        let self_ll = layout::ll_type(self.env, self_ty);
        let ord_ty = self.env.interner.named("Ordering", vec![]);
        self.ensure_type_defined(ord_ty);
        let ret_ty = if partial {
            let m = self.env.interner.maybe(ord_ty);
            self.ensure_type_defined(m);
            m
        } else {
            ord_ty
        };
        let ret_ll = layout::ll_type(self.env, ret_ty);

        self.f.raw(&format!(
            "define linkonce_odr {ret_ll} @{symbol}(ptr %arg.this, {self_ll} %arg.other) {{"
        ));
        self.f.label("entry");
        let other_slot = self.f.fresh_reg();
        self.f.emit(&format!("{other_slot} = alloca {self_ll}"));
        self.f
            .emit(&format!("store {self_ll} %arg.other, ptr {other_slot}"));

        // Walk fields; the first unequal one decides.
        let fields = layout::instantiated_fields(self.env, type_name, type_args);
        let tag_slot = self.f.fresh_reg();
        self.f.emit(&format!("{tag_slot} = alloca i32"));
        self.f.emit(&format!("store i32 1, ptr {tag_slot}"));
        let done_label = self.f.fresh_label("cmp.done");

        for (index, (_, field_ty)) in fields.iter().enumerate() {
            let kind = self.env.interner.as_prim(*field_ty);
            let Some(kind) = kind else { continue };
            if !kind.is_integer() && !kind.is_float() {
                continue;
            }
            let field_ll = layout::ll_type(self.env, *field_ty);
            let a_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{a_ptr} = getelementptr inbounds {self_ll}, ptr %arg.this, i32 0, i32 {index}"
            ));
            let b_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{b_ptr} = getelementptr inbounds {self_ll}, ptr {other_slot}, i32 0, i32 {index}"
            ));
            let a = self.f.fresh_reg();
            self.f.emit(&format!("{a} = load {field_ll}, ptr {a_ptr}"));
            let b = self.f.fresh_reg();
            self.f.emit(&format!("{b} = load {field_ll}, ptr {b_ptr}"));
            let (lt_pred, eq_pred) = if kind.is_float() {
                ("fcmp olt", "fcmp oeq")
            } else if kind.is_signed() {
                ("icmp slt", "icmp eq")
            } else {
                ("icmp ult", "icmp eq")
            };
            let lt = self.f.fresh_reg();
            self.f
                .emit(&format!("{lt} = {lt_pred} {field_ll} {a}, {b}"));
            let eq = self.f.fresh_reg();
            self.f
                .emit(&format!("{eq} = {eq_pred} {field_ll} {a}, {b}"));
            let ge_tag = self.f.fresh_reg();
            self.f
                .emit(&format!("{ge_tag} = select i1 {eq}, i32 1, i32 2"));
            let tag = self.f.fresh_reg();
            self.f
                .emit(&format!("{tag} = select i1 {lt}, i32 0, i32 {ge_tag}"));
            self.f.emit(&format!("store i32 {tag}, ptr {tag_slot}"));

            let next_label = self.f.fresh_label("cmp.next");
            self.f.emit_term(&format!(
                "br i1 {eq}, label %{next_label}, label %{done_label}"
            ));
            self.f.label(&next_label);
        }
        self.f.emit_term(&format!("br label %{done_label}"));

        self.f.label(&done_label);
        let tag = self.f.fresh_reg();
        self.f.emit(&format!("{tag} = load i32, ptr {tag_slot}"));
        let ordering = self.build_enum_value_dyn(ord_ty, &tag, &[]);
        if partial {
            let wrapped = self.build_enum_value(ret_ty, 0, &[(ordering, ord_ty)]);
            self.f
                .emit_term(&format!("ret {ret_ll} {}", wrapped.reg));
        } else {
            self.f
                .emit_term(&format!("ret {ret_ll} {}", ordering.reg));
        }
    }
}

fn float_suffix(ll: &str) -> &'static str {
    if ll == "float" {
        "f32"
    } else {
        "f64"
    }
}
