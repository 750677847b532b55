//! Expression lowering.
//!
//! Binary operators dispatch on operand type; string concatenation chains
//! fold at compile time when every operand is a literal, fuse into a single
//! allocation for 2-4 mixed operands, and fall back to `str_concat_opt`
//! otherwise. Method calls go through the checker's recorded resolution --
//! the emitter never re-derives dispatch. Closure calls split into a thin
//! path (null environment: raw function pointer) and a fat path
//! (environment passed first), merged with a phi.

use rustc_hash::{FxHashMap, FxHashSet};

use tml_ast as ast;
use tml_ast::{BinOp, ExprKind, PrimKind, UnOp};
use tml_typeck::{DispatchKind, MethodResolution, Type, TypeId};

use crate::layout;
use crate::mangle;

use super::{IrGen, Val};

impl IrGen<'_> {
    pub fn emit_expr(&mut self, expr: &ast::Expr) -> Val {
        match &expr.kind {
            ExprKind::IntLit(value) => {
                let ty = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, ty);
                let ll = if ll == "void" { "i32".to_string() } else { ll };
                Val::new(value.to_string(), ll)
            }
            ExprKind::FloatLit(value) => {
                let ty = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, ty);
                let ll = if ll == "float" { ll } else { "double".to_string() };
                // Hexadecimal constants sidestep decimal-exactness rules.
                // Float-typed literals round through f32 first.
                let bits = if ll == "float" {
                    ((*value as f32) as f64).to_bits()
                } else {
                    value.to_bits()
                };
                Val::new(format!("0x{bits:016X}"), ll)
            }
            ExprKind::BoolLit(value) => Val::new(if *value { "true" } else { "false" }, "i1"),
            ExprKind::CharLit(value) => Val::new((*value as u32).to_string(), "i32"),
            ExprKind::StrLit(value) => {
                let global = self.module.intern_string(value);
                Val::new(global, "ptr")
            }
            ExprKind::UnitLit => Val::unit(),

            ExprKind::Ident(name) => self.emit_ident(name, expr),
            ExprKind::Path(segments) => self.emit_path(segments, expr),

            ExprKind::Call {
                callee,
                type_args: _,
                args,
            } => self.emit_call(expr, callee, args),

            ExprKind::MethodCall {
                receiver,
                method,
                args,
                ..
            } => self.emit_method_call(expr, receiver, method, args),

            ExprKind::FieldAccess { receiver, field } => {
                match self.lvalue_ptr(expr) {
                    Some((ptr, ty)) => {
                        let ll = layout::ll_type(self.env, ty);
                        if ll == "void" {
                            return Val::unit();
                        }
                        let loaded = self.f.fresh_reg();
                        self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                        Val::new(loaded, ll)
                    }
                    None => {
                        // Rvalue receiver: spill, then project.
                        let receiver_ty = self.node_type(receiver.id);
                        let val = self.emit_expr(receiver);
                        let slot = self.spill(&val);
                        self.project_field(&slot, receiver_ty, field, expr)
                    }
                }
            }

            ExprKind::Index { .. } => match self.lvalue_ptr(expr) {
                Some((ptr, ty)) => {
                    let ll = layout::ll_type(self.env, ty);
                    let loaded = self.f.fresh_reg();
                    self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                    Val::new(loaded, ll)
                }
                None => Val::unit(),
            },

            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(expr, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => self.emit_unary(*op, operand),

            ExprKind::Cast { expr: inner, .. } => {
                let target = self.node_type(expr.id);
                self.emit_cast(inner, target)
            }

            ExprKind::Reference { expr: inner, .. } => match self.lvalue_ptr(inner) {
                Some((ptr, _)) => Val::new(ptr, "ptr"),
                None => {
                    let val = self.emit_expr(inner);
                    let slot = self.spill(&val);
                    Val::new(slot, "ptr")
                }
            },

            ExprKind::Deref(inner) => {
                let target = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, target);
                let ptr = self.emit_expr(inner);
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {}", ptr.reg));
                Val::new(loaded, ll)
            }

            ExprKind::StructLit { name, fields, .. } => {
                self.emit_struct_lit(expr, name, fields)
            }

            ExprKind::TupleLit(elems) => {
                let ty = self.node_type(expr.id);
                self.ensure_type_defined(ty);
                let ll = layout::ll_type(self.env, ty);
                if ll == "void" {
                    for elem in elems {
                        self.emit_expr(elem);
                    }
                    return Val::unit();
                }
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {ll}"));
                for (index, elem) in elems.iter().enumerate() {
                    let val = self.emit_expr(elem);
                    if val.is_unit() {
                        continue;
                    }
                    let field_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{field_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 {index}"
                    ));
                    self.f
                        .emit(&format!("store {} {}, ptr {field_ptr}", val.ty, val.reg));
                }
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
                Val::new(loaded, ll)
            }

            ExprKind::ArrayLit(elems) => {
                let ty = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, ty);
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {ll}"));
                for (index, elem) in elems.iter().enumerate() {
                    let val = self.emit_expr(elem);
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 {index}"
                    ));
                    self.f
                        .emit(&format!("store {} {}, ptr {elem_ptr}", val.ty, val.reg));
                }
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
                Val::new(loaded, ll)
            }

            ExprKind::ArrayRepeat { elem, count: _ } => {
                let ty = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, ty);
                let count = match self.env.interner.get(ty) {
                    Type::Array {
                        size: tml_typeck::ArraySize::Const(n),
                        ..
                    } => *n,
                    _ => 0,
                };
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {ll}"));
                let val = self.emit_expr(elem);
                for index in 0..count {
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {slot}, i64 0, i64 {index}"
                    ));
                    self.f
                        .emit(&format!("store {} {}, ptr {elem_ptr}", val.ty, val.reg));
                }
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
                Val::new(loaded, ll)
            }

            ExprKind::Closure {
                params,
                body,
                ..
            } => self.emit_closure(expr, params, body),

            // Bare range values only appear as `for` iteration sources.
            ExprKind::Range { .. } => Val::unit(),

            ExprKind::If {
                cond,
                then_block,
                else_block,
            } => self.emit_if(cond, then_block, else_block.as_deref()),

            ExprKind::IfLet {
                pattern,
                value,
                then_block,
                else_block,
            } => self.emit_if_let(pattern, value, then_block, else_block.as_deref()),

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let ty = self.node_type(expr.id);
                self.emit_ternary(cond, then_expr, else_expr, ty)
            }

            ExprKind::When { scrutinee, arms } => self.emit_when(expr, scrutinee, arms),

            ExprKind::Block(block) => self.emit_block(block).unwrap_or_else(Val::unit),

            // Single-shot async: the awaited Poll is Ready; extract the
            // payload.
            ExprKind::Await(inner) => {
                let poll_val = self.emit_expr(inner);
                let result_ty = self.node_type(expr.id);
                let ll = layout::ll_type(self.env, result_ty);
                if ll == "void" {
                    return Val::unit();
                }
                let slot = self.spill(&poll_val);
                let payload_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{payload_ptr} = getelementptr inbounds {}, ptr {slot}, i32 0, i32 1",
                    poll_val.ty
                ));
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {ll}, ptr {payload_ptr}"));
                Val::new(loaded, ll)
            }
        }
    }

    // ── names ────────────────────────────────────────────────────────

    fn emit_ident(&mut self, name: &str, expr: &ast::Expr) -> Val {
        if let Some(info) = self.lookup_local(name) {
            let ll = layout::ll_type(self.env, info.ty);
            if ll == "void" {
                return Val::unit();
            }
            let loaded = self.f.fresh_reg();
            self.f
                .emit(&format!("{loaded} = load {ll}, ptr {}", info.ptr));
            return Val::new(loaded, ll);
        }
        // A function referenced as a value.
        if let Some(def) = self.env.functions.get(name) {
            let is_library = def.is_library;
            let symbol = mangle::apply_prefix(name, &self.options.suite, is_library);
            return Val::new(format!("@{symbol}"), "ptr");
        }
        self.codegen_error("C015", format!("unknown identifier '{name}'"), expr.span);
        Val::unit()
    }

    fn emit_path(&mut self, segments: &[String], expr: &ast::Expr) -> Val {
        if segments.len() == 2 {
            let (head, tail) = (&segments[0], &segments[1]);
            // `@flags` variants are bare integer constants.
            if let Some(def) = self.env.enums.get(head).cloned() {
                if let Some(width) = def.flags {
                    if let Some((_, variant)) = def.variant(tail) {
                        let ll = layout::ll_prim(width);
                        return Val::new(variant.discriminant.to_string(), ll);
                    }
                }
            }
            // Unit enum variant (user or builtin): tag-only value.
            let ty = self.node_type(expr.id);
            if let Type::Named { name, .. } = self.env.interner.get(ty).clone() {
                if let Some(tag) = layout::variant_tag(self.env, &name, tail) {
                    return self.build_enum_value(ty, tag, &[]);
                }
            }
            // Class static field.
            if let Some(class) = self.env.classes.get(head).cloned() {
                if let Some(field) = class.static_field(tail) {
                    let field_ty = field.ty;
                    let global = self.static_field_global(head, tail, field_ty);
                    let ll = layout::ll_type(self.env, field_ty);
                    let loaded = self.f.fresh_reg();
                    self.f
                        .emit(&format!("{loaded} = load {ll}, ptr {global}"));
                    return Val::new(loaded, ll);
                }
            }
        }
        self.codegen_error(
            "C015",
            format!("unresolved path '{}'", segments.join("::")),
            expr.span,
        );
        Val::unit()
    }

    /// A named global backing a class static field, defined on first use.
    fn static_field_global(&mut self, class: &str, field: &str, ty: TypeId) -> String {
        let name = format!("@static.{class}.{field}");
        let ll = layout::ll_type(self.env, ty);
        if !self.statics_defined.contains(&name) {
            self.statics_defined.insert(name.clone());
            self.module
                .add_global(&format!("{name} = linkonce_odr global {ll} zeroinitializer"));
        }
        name
    }

    /// Construct an enum value in a slot: store the tag and payload values.
    pub fn build_enum_value(&mut self, ty: TypeId, tag: i128, payload: &[(Val, TypeId)]) -> Val {
        self.ensure_type_defined(ty);
        let ll = layout::ll_type(self.env, ty);
        let slot = self.f.fresh_reg();
        self.f.emit(&format!("{slot} = alloca {ll}"));
        let tag_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{tag_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 0"
        ));
        self.f.emit(&format!("store i32 {tag}, ptr {tag_ptr}"));
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

    // ── calls ────────────────────────────────────────────────────────

    fn emit_call(&mut self, expr: &ast::Expr, callee: &ast::Expr, args: &[ast::Expr]) -> Val {
        // Enum variant constructor?
        if let ExprKind::Path(segments) = &callee.kind {
            if segments.len() == 2 {
                let ty = self.node_type(expr.id);
                if let Type::Named { name, args: targs, .. } = self.env.interner.get(ty).clone() {
                    if let Some(tag) = layout::variant_tag(self.env, &name, &segments[1]) {
                        let variants = layout::enum_variants(self.env, &name, &targs);
                        let payload_tys = variants
                            .iter()
                            .find(|(n, _)| n == &segments[1])
                            .map(|(_, p)| p.clone())
                            .unwrap_or_default();
                        let mut payload = Vec::with_capacity(args.len());
                        for (arg, pty) in args.iter().zip(payload_tys) {
                            let val = self.emit_expr(arg);
                            let ll = layout::ll_type(self.env, pty);
                            let src = self.node_type(arg.id);
                            let val = self.coerce_from(val, Some(src), &ll);
                            payload.push((val, pty));
                        }
                        return self.build_enum_value(ty, tag, &payload);
                    }
                }
            }
        }

        // Resolved static call (free function or `Type::method`).
        if let Some(resolution) = self.typed.resolutions.get(&expr.id).cloned() {
            return self.emit_resolved_call(expr, &resolution, None, args);
        }

        // Indirect call through a function or closure value.
        let callee_ty = self.node_type(callee.id);
        let callee_val = self.emit_expr(callee);
        let (param_tys, ret_ty) = match self.env.interner.get(callee_ty).clone() {
            Type::Func {
                params,
                return_type,
            }
            | Type::Closure {
                params,
                return_type,
            } => (params, return_type),
            _ => {
                self.codegen_error("C015", "call target is not callable", expr.span);
                return Val::unit();
            }
        };
        let mut arg_vals = Vec::with_capacity(args.len());
        for (arg, pty) in args.iter().zip(&param_tys) {
            let val = self.emit_expr(arg);
            let ll = layout::ll_type(self.env, *pty);
            arg_vals.push(self.coerce(val, &ll));
        }
        let ret_ll = layout::ll_type(self.env, ret_ty);

        if callee_val.ty == "ptr" {
            // A raw function pointer.
            let call_args: Vec<String> = arg_vals
                .iter()
                .map(|v| format!("{} {}", v.ty, v.reg))
                .collect();
            return self.emit_call_instr(&ret_ll, &callee_val.reg.clone(), &call_args);
        }
        // A closure fat value.
        self.emit_closure_invoke(callee_val, arg_vals, &ret_ll)
    }

    /// Thin/fat closure invocation: exactly one of the two paths runs,
    /// selected by a null test on the environment pointer.
    pub fn emit_closure_invoke(&mut self, closure: Val, args: Vec<Val>, ret_ll: &str) -> Val {
        let fn_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{fn_ptr} = extractvalue {} {}, 0",
            closure.ty, closure.reg
        ));
        let env_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{env_ptr} = extractvalue {} {}, 1",
            closure.ty, closure.reg
        ));
        let is_thin = self.f.fresh_reg();
        self.f
            .emit(&format!("{is_thin} = icmp eq ptr {env_ptr}, null"));

        let label_thin = self.f.fresh_label("closure.thin");
        let label_fat = self.f.fresh_label("closure.fat");
        let label_end = self.f.fresh_label("closure.end");
        self.f.emit_term(&format!(
            "br i1 {is_thin}, label %{label_thin}, label %{label_fat}"
        ));

        let plain_args: Vec<String> = args
            .iter()
            .filter(|v| !v.is_unit())
            .map(|v| format!("{} {}", v.ty, v.reg))
            .collect();

        self.f.label(&label_thin);
        let thin_result = self.emit_call_instr(ret_ll, fn_ptr.as_str(), &plain_args);
        let thin_block = self.f.current_block.clone();
        self.f.emit_term(&format!("br label %{label_end}"));

        self.f.label(&label_fat);
        let mut fat_args = vec![format!("ptr {env_ptr}")];
        fat_args.extend(plain_args.iter().cloned());
        let fat_result = self.emit_call_instr(ret_ll, fn_ptr.as_str(), &fat_args);
        let fat_block = self.f.current_block.clone();
        self.f.emit_term(&format!("br label %{label_end}"));

        self.f.label(&label_end);
        if ret_ll == "void" {
            return Val::unit();
        }
        let result = self.f.fresh_reg();
        self.f.emit(&format!(
            "{result} = phi {ret_ll} [ {}, %{thin_block} ], [ {}, %{fat_block} ]",
            thin_result.reg, fat_result.reg
        ));
        Val::new(result, ret_ll)
    }

    fn emit_call_instr(&mut self, ret_ll: &str, target: &str, args: &[String]) -> Val {
        let arg_list = args.join(", ");
        if ret_ll == "void" {
            self.f
                .emit(&format!("call void {target}({arg_list})"));
            return Val::unit();
        }
        let result = self.f.fresh_reg();
        self.f
            .emit(&format!("{result} = call {ret_ll} {target}({arg_list})"));
        Val::new(result, ret_ll)
    }

    // ── method calls ─────────────────────────────────────────────────

    fn emit_method_call(
        &mut self,
        expr: &ast::Expr,
        receiver: &ast::Expr,
        method: &str,
        args: &[ast::Expr],
    ) -> Val {
        let Some(resolution) = self.typed.resolutions.get(&expr.id).cloned() else {
            self.codegen_error(
                "C015",
                format!("no resolution for method '{method}'"),
                expr.span,
            );
            return Val::unit();
        };

        // Static dispatch has no receiver value to evaluate.
        let is_static_receiver = matches!(&receiver.kind, ExprKind::Ident(name)
            if self.lookup_local(name).is_none() && self.env.functions.get(name.as_str()).is_none());
        let receiver_handle = if is_static_receiver {
            None
        } else {
            // Keep the receiver's own storage when it is an lvalue so
            // methods can mutate fields through it.
            match self.lvalue_ptr(receiver) {
                Some((ptr, ty)) => Some((ptr, ty)),
                None => {
                    let ty = self.node_type(receiver.id);
                    let val = self.emit_expr(receiver);
                    let slot = self.spill(&val);
                    Some((slot, ty))
                }
            }
        };

        self.emit_resolved_call(expr, &resolution, receiver_handle, args)
    }

    /// Emit a call through a checker resolution (free call, static method,
    /// or instance method -- `receiver` carries the receiver slot for the
    /// instance forms).
    fn emit_resolved_call(
        &mut self,
        expr: &ast::Expr,
        resolution: &MethodResolution,
        receiver: Option<(String, TypeId)>,
        args: &[ast::Expr],
    ) -> Val {
        // Evaluate arguments left to right against the substituted params.
        let mut arg_vals = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let val = self.emit_expr(arg);
            let val = match resolution.params.get(index) {
                Some(pty) => {
                    let pty = self.apply_subst(*pty);
                    let ll = layout::ll_type(self.env, pty);
                    if ll == "void" {
                        val
                    } else {
                        let src = self.node_type(arg.id);
                        self.coerce_from(val, Some(src), &ll)
                    }
                }
                None => val,
            };
            arg_vals.push(val);
        }

        let ret_ty = self.apply_subst(resolution.return_type);
        self.ensure_type_defined(ret_ty);
        let ret_ll = layout::ll_type(self.env, ret_ty);

        match &resolution.kind {
            DispatchKind::Builtin | DispatchKind::Flags | DispatchKind::Pointer => {
                self.coverage_hook(&resolution.target);
                self.emit_builtin_call(expr, resolution, receiver, arg_vals, ret_ty)
            }
            DispatchKind::ClosureCall => {
                let (ptr, ty) = receiver.expect("closure call has a receiver");
                let ll = layout::ll_type(self.env, ty);
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                if ll == "ptr" {
                    // A raw function value.
                    let call_args: Vec<String> = arg_vals
                        .iter()
                        .filter(|v| !v.is_unit())
                        .map(|v| format!("{} {}", v.ty, v.reg))
                        .collect();
                    return self.emit_call_instr(&ret_ll, &loaded, &call_args);
                }
                self.emit_closure_invoke(Val::new(loaded, ll), arg_vals, &ret_ll)
            }
            DispatchKind::FieldFuncPtr(index) => {
                let (ptr, ty) = receiver.expect("field call has a receiver");
                let ll = layout::ll_type(self.env, ty);
                let field_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{field_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                ));
                let fn_ptr = self.f.fresh_reg();
                self.f.emit(&format!("{fn_ptr} = load ptr, ptr {field_ptr}"));
                let call_args: Vec<String> = arg_vals
                    .iter()
                    .filter(|v| !v.is_unit())
                    .map(|v| format!("{} {}", v.ty, v.reg))
                    .collect();
                self.emit_call_instr(&ret_ll, &fn_ptr, &call_args)
            }
            DispatchKind::Dyn => {
                self.emit_dyn_call(resolution, receiver, arg_vals, &ret_ll)
            }
            _ => {
                // Static / Instance / AutoDeref / Bound: a direct call to a
                // (possibly monomorphized) symbol.
                let symbol = self.resolve_call_symbol(resolution);
                let Some(symbol) = symbol else {
                    self.codegen_error(
                        "C015",
                        format!("no emitted target for '{}'", resolution.target),
                        expr.span,
                    );
                    return Val::unit();
                };
                let mut call_args = Vec::new();
                if let Some((ptr, ty)) = &receiver {
                    // Auto-deref receivers unwrap to the resolved inner type.
                    let ptr = if resolution.kind == DispatchKind::AutoDeref {
                        let inner = self.apply_subst(resolution.receiver);
                        self.deref_smart_pointer(ptr, *ty, inner)
                    } else {
                        ptr.clone()
                    };
                    call_args.push(format!("ptr {ptr}"));
                }
                call_args.extend(
                    arg_vals
                        .iter()
                        .filter(|v| !v.is_unit())
                        .map(|v| format!("{} {}", v.ty, v.reg)),
                );
                self.emit_call_instr(&ret_ll, &format!("@{symbol}"), &call_args)
            }
        }
    }

    /// Map a Static/Instance/Bound resolution to its emitted symbol,
    /// enqueuing the instantiation.
    fn resolve_call_symbol(&mut self, resolution: &MethodResolution) -> Option<String> {
        // Free functions have a bare target name.
        if !resolution.target.contains("::") {
            let def = self.env.functions.get(&resolution.target)?.clone();
            if def.sig.type_params.is_empty() {
                return Some(mangle::apply_prefix(
                    &resolution.target,
                    &self.options.suite,
                    def.is_library,
                ));
            }
            let mut subst = FxHashMap::default();
            let mut type_args = Vec::new();
            for param in &def.sig.type_params {
                let arg = resolution
                    .substitution
                    .get(param)
                    .copied()
                    .map(|t| self.apply_subst(t))
                    .unwrap_or_else(|| self.env.interner.unit());
                subst.insert(param.clone(), arg);
                type_args.push(arg);
            }
            return Some(self.enqueue_function(
                &resolution.target,
                &type_args,
                subst,
                def.is_library,
            ));
        }

        let (owner, method) = resolution.target.split_once("::")?;

        // Bound dispatch re-resolves against the concrete receiver's impl.
        let (owner, receiver_ty) = if resolution.kind == DispatchKind::Bound {
            let concrete = self.apply_subst(resolution.receiver);
            let name = match self.env.interner.get(concrete).clone() {
                Type::Named { name, .. } => name,
                Type::Prim(kind) => kind.name().to_string(),
                Type::Class { name } => name,
                _ => owner.to_string(),
            };
            (name, concrete)
        } else {
            (owner.to_string(), self.apply_subst(resolution.receiver))
        };

        let type_args = match self.env.interner.get(receiver_ty).clone() {
            Type::Named { args, .. } => args,
            _ => Vec::new(),
        };
        let is_library = self
            .env
            .impls_by_type
            .get(&owner)
            .and_then(|idxs| idxs.first())
            .map(|&i| self.env.impls[i].is_library)
            .or_else(|| self.env.classes.get(&owner).map(|c| c.is_library))
            .unwrap_or(false);

        // Concretize the recorded substitution under the active one.
        let mut subst = FxHashMap::default();
        for (name, ty) in &resolution.substitution {
            subst.insert(name.clone(), self.apply_subst(*ty));
        }

        Some(self.enqueue_method(&owner, &type_args, method, subst, is_library))
    }

    /// Dynamic dispatch: load the target out of the dyn value's vtable.
    fn emit_dyn_call(
        &mut self,
        resolution: &MethodResolution,
        receiver: Option<(String, TypeId)>,
        arg_vals: Vec<Val>,
        ret_ll: &str,
    ) -> Val {
        let Some((ptr, ty)) = receiver else {
            return Val::unit();
        };
        let (behavior, method) = resolution
            .target
            .split_once("::")
            .unwrap_or((resolution.target.as_str(), ""));
        let method_index = self
            .env
            .behaviors
            .get(behavior)
            .and_then(|def| def.methods.iter().position(|m| m.sig.name == method))
            .unwrap_or(0);

        let ll = layout::ll_type(self.env, ty);
        let fat = self.f.fresh_reg();
        self.f.emit(&format!("{fat} = load {ll}, ptr {ptr}"));
        let data = self.f.fresh_reg();
        self.f.emit(&format!("{data} = extractvalue {ll} {fat}, 0"));
        let vtable = self.f.fresh_reg();
        self.f
            .emit(&format!("{vtable} = extractvalue {ll} {fat}, 1"));
        let slot_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{slot_ptr} = getelementptr inbounds ptr, ptr {vtable}, i64 {method_index}"
        ));
        let fn_ptr = self.f.fresh_reg();
        self.f.emit(&format!("{fn_ptr} = load ptr, ptr {slot_ptr}"));

        let mut call_args = vec![format!("ptr {data}")];
        call_args.extend(
            arg_vals
                .iter()
                .filter(|v| !v.is_unit())
                .map(|v| format!("{} {}", v.ty, v.reg)),
        );
        self.emit_call_instr(ret_ll, &fn_ptr, &call_args)
    }

    /// Unwrap one smart-pointer layer: `Box`/`Heap` point at the value
    /// directly; `Arc`/`Rc`/`Shared` point at `{ strong, weak, data }`.
    pub fn deref_smart_pointer(&mut self, ptr: &str, outer: TypeId, _inner: TypeId) -> String {
        let outer_name = match self.env.interner.get(outer) {
            Type::Named { name, .. } => name.clone(),
            _ => return ptr.to_string(),
        };
        let raw = self.f.fresh_reg();
        self.f.emit(&format!("{raw} = load ptr, ptr {ptr}"));
        match outer_name.as_str() {
            "Arc" | "Rc" | "Shared" => {
                let data = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{data} = getelementptr inbounds {{ i64, i64, i8 }}, ptr {raw}, i32 0, i32 2"
                ));
                data
            }
            _ => raw,
        }
    }

    // ── fields and lvalues ───────────────────────────────────────────

    /// A pointer to the storage of an lvalue expression, with the value's
    /// type. Returns None for rvalues.
    pub fn lvalue_ptr(&mut self, expr: &ast::Expr) -> Option<(String, TypeId)> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let info = self.lookup_local(name)?;
                Some((info.ptr, self.apply_subst(info.ty)))
            }
            ExprKind::FieldAccess { receiver, field } => {
                let (base_ptr, base_ty) = self.lvalue_ptr(receiver)?;
                self.field_ptr(&base_ptr, base_ty, field, expr)
            }
            ExprKind::Index { receiver, index } => {
                let (base_ptr, base_ty) = self.lvalue_ptr(receiver)?;
                let elem_ty = self.node_type(expr.id);
                let idx = self.emit_expr(index);
                let idx_src = self.node_type(index.id);
                let idx = self.coerce_from(idx, Some(idx_src), "i64");
                match self.env.interner.get(base_ty).clone() {
                    Type::Array { .. } => {
                        let ll = layout::ll_type(self.env, base_ty);
                        let elem_ptr = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{elem_ptr} = getelementptr inbounds {ll}, ptr {base_ptr}, i64 0, i64 {}",
                            idx.reg
                        ));
                        Some((elem_ptr, elem_ty))
                    }
                    Type::Slice { element } => {
                        let ll = layout::ll_type(self.env, base_ty);
                        let data_ptr_ptr = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{data_ptr_ptr} = getelementptr inbounds {ll}, ptr {base_ptr}, i32 0, i32 0"
                        ));
                        let data = self.f.fresh_reg();
                        self.f
                            .emit(&format!("{data} = load ptr, ptr {data_ptr_ptr}"));
                        let elem_ll = layout::ll_type(self.env, element);
                        let elem_ptr = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{elem_ptr} = getelementptr inbounds {elem_ll}, ptr {data}, i64 {}",
                            idx.reg
                        ));
                        Some((elem_ptr, elem_ty))
                    }
                    // Lists index through the runtime; not an lvalue slot.
                    _ => None,
                }
            }
            ExprKind::Deref(inner) => {
                let target_ty = self.node_type(expr.id);
                let ptr_val = self.emit_expr(inner);
                Some((ptr_val.reg, target_ty))
            }
            _ => None,
        }
    }

    /// A pointer to `base.field`, transiting smart-pointer layers.
    fn field_ptr(
        &mut self,
        base_ptr: &str,
        base_ty: TypeId,
        field: &str,
        _expr: &ast::Expr,
    ) -> Option<(String, TypeId)> {
        let mut ptr = base_ptr.to_string();
        let mut ty = {
            let expanded = self.env.expand_alias(base_ty);
            self.env.interner.deref_all(expanded)
        };
        // Reference-typed bases hold a pointer; load it first.
        if matches!(self.env.interner.get(base_ty), Type::Ref { .. }) {
            let loaded = self.f.fresh_reg();
            self.f.emit(&format!("{loaded} = load ptr, ptr {ptr}"));
            ptr = loaded;
        }
        loop {
            match self.env.interner.get(ty).clone() {
                Type::Named { name, args, .. } => {
                    if self.env.structs.contains_key(&name) {
                        let fields = layout::instantiated_fields(self.env, &name, &args);
                        let index = fields.iter().position(|(n, _)| n == field)?;
                        self.ensure_type_defined(ty);
                        let ll = layout::ll_type(self.env, ty);
                        let field_ptr = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{field_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                        ));
                        let field_ty = self.apply_subst(fields[index].1);
                        return Some((field_ptr, field_ty));
                    }
                    // Auto-deref: load the inner pointer and continue the
                    // chain on the pointee.
                    if let Some(inner) = self.env.auto_deref_inner(ty) {
                        ptr = self.deref_smart_pointer(&ptr, ty, inner);
                        ty = self.env.interner.deref_all(inner);
                        continue;
                    }
                    return None;
                }
                Type::Class { name } => {
                    let class = self.env.classes.get(&name)?.clone();
                    let (index, field_def) = class.field(field)?;
                    // Class values are pointers to the object.
                    let obj = self.f.fresh_reg();
                    self.f.emit(&format!("{obj} = load ptr, ptr {ptr}"));
                    let ll = self.class_ir_type(&name);
                    let field_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{field_ptr} = getelementptr inbounds {ll}, ptr {obj}, i32 0, i32 {index}"
                    ));
                    return Some((field_ptr, field_def.ty));
                }
                Type::Tuple(elems) => {
                    let index: usize = field.parse().ok()?;
                    let ll = layout::ll_type(self.env, ty);
                    let field_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{field_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                    ));
                    return Some((field_ptr, *elems.get(index)?));
                }
                _ => return None,
            }
        }
    }

    fn project_field(&mut self, slot: &str, receiver_ty: TypeId, field: &str, expr: &ast::Expr) -> Val {
        match self.field_ptr(slot, receiver_ty, field, expr) {
            Some((ptr, ty)) => {
                let ll = layout::ll_type(self.env, ty);
                if ll == "void" {
                    return Val::unit();
                }
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                Val::new(loaded, ll)
            }
            None => {
                self.codegen_error(
                    "C015",
                    format!("cannot project field '{field}'"),
                    expr.span,
                );
                Val::unit()
            }
        }
    }

    fn class_ir_type(&mut self, name: &str) -> String {
        let ir_name = format!("%class.{name}");
        if !self.module.has_type(&ir_name) {
            let class = self.env.classes.get(name).cloned();
            if let Some(class) = class {
                let mut parts = Vec::new();
                for field in class.fields.iter().filter(|f| !f.is_static) {
                    self.ensure_type_defined(field.ty);
                    parts.push(layout::ll_type(self.env, field.ty));
                }
                let def = if parts.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", parts.join(", "))
                };
                self.module.define_type(&ir_name, &def);
            }
        }
        ir_name
    }

    // ── assignment ───────────────────────────────────────────────────

    /// Assignment is polymorphic over the target form: locals, fields,
    /// statics, indices, derefs, and property setters.
    pub fn emit_assign(&mut self, target: &ast::Expr, op: Option<BinOp>, value: &ast::Expr) {
        // Property setter: `obj.x = v` calls `set_x` when the class
        // registers one.
        if let ExprKind::FieldAccess { receiver, field } = &target.kind {
            let receiver_ty = self.node_type(receiver.id);
            if let Type::Class { name } = self.env.interner.get(receiver_ty).clone() {
                let setter = format!("set_{field}");
                let has_setter = self
                    .env
                    .classes
                    .get(&name)
                    .map(|c| c.method(&setter).is_some())
                    .unwrap_or(false);
                if has_setter && op.is_none() {
                    let val = self.emit_expr(value);
                    if let Some((ptr, _)) = self.lvalue_ptr(receiver) {
                        let symbol = self.enqueue_method(
                            &name,
                            &[],
                            &setter,
                            FxHashMap::default(),
                            self.env.classes.get(&name).map(|c| c.is_library).unwrap_or(false),
                        );
                        self.f.emit(&format!(
                            "call void @{symbol}(ptr {ptr}, {} {})",
                            val.ty, val.reg
                        ));
                    }
                    return;
                }
            }
        }

        // Static class field: `Class::field = v`.
        if let ExprKind::Path(segments) = &target.kind {
            if segments.len() == 2 {
                let (class_name, field_name) = (segments[0].clone(), segments[1].clone());
                let field_ty = self
                    .env
                    .classes
                    .get(&class_name)
                    .and_then(|c| c.static_field(&field_name).map(|f| f.ty));
                if let Some(field_ty) = field_ty {
                    let global = self.static_field_global(&class_name, &field_name, field_ty);
                    let ll = layout::ll_type(self.env, field_ty);
                    let val = self.emit_expr(value);
                    let src = self.node_type(value.id);
                    let val = self.coerce_from(val, Some(src), &ll);
                    self.f
                        .emit(&format!("store {ll} {}, ptr {global}", val.reg));
                    return;
                }
            }
        }

        // List index store goes through the runtime.
        if let ExprKind::Index { receiver, index } = &target.kind {
            let receiver_ty = self.node_type(receiver.id);
            let deref = self.env.interner.deref_all(receiver_ty);
            if let Type::Named { name, .. } = self.env.interner.get(deref).clone() {
                if name == "List" {
                    let list = self.emit_expr(receiver);
                    let idx = self.emit_expr(index);
                    let idx_src = self.node_type(index.id);
                    let idx = self.coerce_from(idx, Some(idx_src), "i64");
                    let val = self.emit_expr(value);
                    let slot = self.to_list_slot(val);
                    self.f.emit(&format!(
                        "call void @list_set(ptr {}, i64 {}, ptr {slot})",
                        list.reg, idx.reg
                    ));
                    return;
                }
            }
        }

        let Some((ptr, ty)) = self.lvalue_ptr(target) else {
            self.codegen_error("C015", "assignment target is not an lvalue", target.span);
            self.emit_expr(value);
            return;
        };
        let ll = layout::ll_type(self.env, ty);
        let value_val = self.emit_expr(value);
        let value_src = self.node_type(value.id);
        let value_val = self.coerce_from(value_val, Some(value_src), &ll);

        // Compound assignment loads, operates, stores.
        let final_val = match op {
            Some(op) => {
                let current = self.f.fresh_reg();
                self.f.emit(&format!("{current} = load {ll}, ptr {ptr}"));
                self.emit_binop_values(op, Val::new(current, ll.clone()), value_val, ty)
            }
            None => value_val,
        };
        self.f
            .emit(&format!("store {ll} {}, ptr {ptr}", final_val.reg));
    }

    // ── operators ────────────────────────────────────────────────────

    fn emit_unary(&mut self, op: UnOp, operand: &ast::Expr) -> Val {
        let val = self.emit_expr(operand);
        match op {
            UnOp::Neg => {
                let reg = self.f.fresh_reg();
                if val.ty == "double" || val.ty == "float" {
                    self.f
                        .emit(&format!("{reg} = fneg {} {}", val.ty, val.reg));
                } else {
                    self.f
                        .emit(&format!("{reg} = sub {} 0, {}", val.ty, val.reg));
                }
                Val::new(reg, val.ty)
            }
            UnOp::Not => {
                let b = self.to_bool(val);
                let reg = self.f.fresh_reg();
                self.f.emit(&format!("{reg} = xor i1 {b}, true"));
                Val::new(reg, "i1")
            }
        }
    }

    fn emit_binary(&mut self, expr: &ast::Expr, op: BinOp, lhs: &ast::Expr, rhs: &ast::Expr) -> Val {
        // Short-circuit and/or: conditional branches with a phi at the merge.
        if op.is_short_circuit() {
            return self.emit_short_circuit(op, lhs, rhs);
        }

        let lhs_ty = self.node_type(lhs.id);

        // String concatenation chains get the three-tier optimization.
        if op == BinOp::Add && self.env.interner.is_prim(lhs_ty, PrimKind::Str) {
            return self.emit_string_concat(expr);
        }

        let lhs_val = self.emit_expr(lhs);
        let rhs_val = self.emit_expr(rhs);
        let rhs_src = self.node_type(rhs.id);
        let rhs_val = self.coerce_from(rhs_val, Some(rhs_src), &lhs_val.ty.clone());
        self.emit_binop_values(op, lhs_val, rhs_val, lhs_ty)
    }

    /// Lower a binary operator over already-evaluated operands.
    pub fn emit_binop_values(&mut self, op: BinOp, lhs: Val, rhs: Val, operand_ty: TypeId) -> Val {
        let kind = self.env.interner.as_prim(operand_ty);
        let is_float = matches!(kind, Some(k) if k.is_float());
        let is_signed = kind.map(|k| k.is_signed()).unwrap_or(true);
        let ll = lhs.ty.clone();

        if op.is_comparison() {
            // Strings compare through the runtime.
            if matches!(kind, Some(PrimKind::Str)) {
                let eq = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{eq} = call i1 @str_eq(ptr {}, ptr {})",
                    lhs.reg, rhs.reg
                ));
                if op == BinOp::Ne {
                    let inverted = self.f.fresh_reg();
                    self.f.emit(&format!("{inverted} = xor i1 {eq}, true"));
                    return Val::new(inverted, "i1");
                }
                return Val::new(eq, "i1");
            }
            let pred = if is_float {
                match op {
                    BinOp::Eq => "oeq",
                    BinOp::Ne => "one",
                    BinOp::Lt => "olt",
                    BinOp::Le => "ole",
                    BinOp::Gt => "ogt",
                    _ => "oge",
                }
            } else if is_signed {
                match op {
                    BinOp::Eq => "eq",
                    BinOp::Ne => "ne",
                    BinOp::Lt => "slt",
                    BinOp::Le => "sle",
                    BinOp::Gt => "sgt",
                    _ => "sge",
                }
            } else {
                match op {
                    BinOp::Eq => "eq",
                    BinOp::Ne => "ne",
                    BinOp::Lt => "ult",
                    BinOp::Le => "ule",
                    BinOp::Gt => "ugt",
                    _ => "uge",
                }
            };
            let instr = if is_float { "fcmp" } else { "icmp" };
            let reg = self.f.fresh_reg();
            self.f.emit(&format!(
                "{reg} = {instr} {pred} {ll} {}, {}",
                lhs.reg, rhs.reg
            ));
            return Val::new(reg, "i1");
        }

        let instr = if is_float {
            match op {
                BinOp::Add => "fadd",
                BinOp::Sub => "fsub",
                BinOp::Mul => "fmul",
                BinOp::Div => "fdiv",
                BinOp::Rem => "frem",
                _ => "fadd",
            }
        } else {
            match op {
                BinOp::Add => "add",
                BinOp::Sub => "sub",
                BinOp::Mul => "mul",
                BinOp::Div => {
                    if is_signed {
                        "sdiv"
                    } else {
                        "udiv"
                    }
                }
                BinOp::Rem => {
                    if is_signed {
                        "srem"
                    } else {
                        "urem"
                    }
                }
                BinOp::BitAnd => "and",
                BinOp::BitOr => "or",
                BinOp::BitXor => "xor",
                BinOp::Shl => "shl",
                BinOp::Shr => {
                    if is_signed {
                        "ashr"
                    } else {
                        "lshr"
                    }
                }
                _ => "add",
            }
        };
        let reg = self.f.fresh_reg();
        self.f
            .emit(&format!("{reg} = {instr} {ll} {}, {}", lhs.reg, rhs.reg));
        Val::new(reg, ll)
    }

    fn emit_short_circuit(&mut self, op: BinOp, lhs: &ast::Expr, rhs: &ast::Expr) -> Val {
        let lhs_val = self.emit_expr(lhs);
        let lhs_reg = self.to_bool(lhs_val);
        let lhs_block = self.f.current_block.clone();

        let label_rhs = self.f.fresh_label("sc.rhs");
        let label_end = self.f.fresh_label("sc.end");
        match op {
            BinOp::And => self.f.emit_term(&format!(
                "br i1 {lhs_reg}, label %{label_rhs}, label %{label_end}"
            )),
            _ => self.f.emit_term(&format!(
                "br i1 {lhs_reg}, label %{label_end}, label %{label_rhs}"
            )),
        }

        self.f.label(&label_rhs);
        let rhs_val = self.emit_expr(rhs);
        let rhs_reg = self.to_bool(rhs_val);
        let rhs_block = self.f.current_block.clone();
        self.f.emit_term(&format!("br label %{label_end}"));

        self.f.label(&label_end);
        let short_value = if op == BinOp::And { "false" } else { "true" };
        let result = self.f.fresh_reg();
        self.f.emit(&format!(
            "{result} = phi i1 [ {short_value}, %{lhs_block} ], [ {rhs_reg}, %{rhs_block} ]"
        ));
        Val::new(result, "i1")
    }

    // ── string concatenation ─────────────────────────────────────────

    /// The three-tier concat strategy:
    /// (a) all literals -> fold now into one interned global;
    /// (b) 2-4 mixed operands -> one allocation, memcpy each piece;
    /// (c) otherwise -> left-associative `str_concat_opt` calls.
    fn emit_string_concat(&mut self, expr: &ast::Expr) -> Val {
        let mut operands = Vec::new();
        flatten_concat(expr, &mut operands);

        let all_literal = operands
            .iter()
            .all(|o| matches!(&o.kind, ExprKind::StrLit(_)));
        if all_literal {
            let mut folded = String::new();
            for operand in &operands {
                if let ExprKind::StrLit(s) = &operand.kind {
                    folded.push_str(s);
                }
            }
            let global = self.module.intern_string(&folded);
            return Val::new(global, "ptr");
        }

        if operands.len() <= 4 {
            return self.emit_fused_concat(&operands);
        }

        // Left-associative runtime concatenation.
        let mut acc = self.emit_expr(operands[0]);
        for operand in &operands[1..] {
            let rhs = self.emit_expr(operand);
            let reg = self.f.fresh_reg();
            self.f.emit(&format!(
                "{reg} = call ptr @str_concat_opt(ptr {}, ptr {})",
                acc.reg, rhs.reg
            ));
            acc = Val::new(reg, "ptr");
        }
        acc
    }

    /// One malloc sized to the operand lengths, one memcpy per piece, and a
    /// null terminator.
    fn emit_fused_concat(&mut self, operands: &[&ast::Expr]) -> Val {
        let mut pieces: Vec<(String, String)> = Vec::with_capacity(operands.len());
        for operand in operands {
            let val = self.emit_expr(operand);
            let len = self.f.fresh_reg();
            self.f
                .emit(&format!("{len} = call i64 @strlen(ptr {})", val.reg));
            pieces.push((val.reg, len));
        }

        // total = sum(lengths) + 1
        let mut total = "1".to_string();
        for (_, len) in &pieces {
            let next = self.f.fresh_reg();
            self.f.emit(&format!("{next} = add i64 {total}, {len}"));
            total = next;
        }
        let buf = self.f.fresh_reg();
        self.f
            .emit(&format!("{buf} = call ptr @malloc(i64 {total})"));

        let mut offset = "0".to_string();
        for (src, len) in &pieces {
            let dst = self.f.fresh_reg();
            self.f.emit(&format!(
                "{dst} = getelementptr inbounds i8, ptr {buf}, i64 {offset}"
            ));
            self.f.emit(&format!(
                "call void @llvm.memcpy.p0.p0.i64(ptr {dst}, ptr {src}, i64 {len}, i1 false)"
            ));
            let next = self.f.fresh_reg();
            self.f.emit(&format!("{next} = add i64 {offset}, {len}"));
            offset = next;
        }
        let terminator = self.f.fresh_reg();
        self.f.emit(&format!(
            "{terminator} = getelementptr inbounds i8, ptr {buf}, i64 {offset}"
        ));
        self.f.emit(&format!("store i8 0, ptr {terminator}"));
        Val::new(buf, "ptr")
    }

    // ── struct literals ──────────────────────────────────────────────

    fn emit_struct_lit(
        &mut self,
        expr: &ast::Expr,
        name: &str,
        fields: &[(String, ast::Expr)],
    ) -> Val {
        let ty = self.node_type(expr.id);
        self.ensure_type_defined(ty);
        let args = match self.env.interner.get(ty).clone() {
            Type::Named { args, .. } => args,
            _ => Vec::new(),
        };
        let ll = layout::ll_type(self.env, ty);
        let declared = layout::instantiated_fields(self.env, name, &args);

        let slot = self.f.fresh_reg();
        self.f.emit(&format!("{slot} = alloca {ll}"));
        for (field_name, value) in fields {
            let Some(index) = declared.iter().position(|(n, _)| n == field_name) else {
                continue;
            };
            let val = self.emit_expr(value);
            let field_ll = layout::ll_type(self.env, declared[index].1);
            if field_ll == "void" {
                continue;
            }
            let src = self.node_type(value.id);
            let val = self.coerce_from(val, Some(src), &field_ll);
            let field_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{field_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 {index}"
            ));
            self.f
                .emit(&format!("store {field_ll} {}, ptr {field_ptr}", val.reg));
        }
        let loaded = self.f.fresh_reg();
        self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
        Val::new(loaded, ll)
    }

    // ── casts ────────────────────────────────────────────────────────

    fn emit_cast(&mut self, inner: &ast::Expr, target: TypeId) -> Val {
        // `x as dyn Behavior` builds a fat pointer with the vtable.
        if let Type::DynBehavior { behavior, .. } = self.env.interner.get(target).clone() {
            let source_ty = self.node_type(inner.id);
            return self.emit_dyn_coercion(inner, &behavior, source_ty, target);
        }

        let val = self.emit_expr(inner);
        let source_ty = self.node_type(inner.id);
        let target_ll = layout::ll_type(self.env, target);
        if val.ty == target_ll {
            return val;
        }
        let from_kind = self.env.interner.as_prim(source_ty);
        let to_kind = self.env.interner.as_prim(target);
        let reg = self.f.fresh_reg();
        match (from_kind, to_kind) {
            (Some(f), Some(t)) if f.is_integer() && t.is_float() => {
                let op = if f.is_signed() { "sitofp" } else { "uitofp" };
                self.f.emit(&format!(
                    "{reg} = {op} {} {} to {target_ll}",
                    val.ty, val.reg
                ));
                Val::new(reg, target_ll)
            }
            (Some(f), Some(t)) if f.is_float() && t.is_integer() => {
                let op = if t.is_signed() { "fptosi" } else { "fptoui" };
                self.f.emit(&format!(
                    "{reg} = {op} {} {} to {target_ll}",
                    val.ty, val.reg
                ));
                Val::new(reg, target_ll)
            }
            (Some(f), Some(t)) if f.is_integer() && t.is_integer() => {
                self.coerce_from(val, Some(source_ty), &target_ll)
            }
            _ => {
                // Pointer-compatible or same-size reinterpretation.
                self.coerce_from(val, Some(source_ty), &target_ll)
            }
        }
    }

    /// Materialize a `dyn Behavior` fat value: heap-spilled data pointer
    /// plus the implementing type's vtable global.
    fn emit_dyn_coercion(
        &mut self,
        inner: &ast::Expr,
        behavior: &str,
        source_ty: TypeId,
        target: TypeId,
    ) -> Val {
        let type_name = match self.env.interner.get(source_ty).clone() {
            Type::Named { name, .. } => name,
            Type::Class { name } => name,
            Type::Prim(kind) => kind.name().to_string(),
            _ => {
                self.codegen_error("C015", "cannot coerce to dyn", inner.span);
                return Val::unit();
            }
        };
        let vtable = self.vtable_global(&type_name, source_ty, behavior);

        // The data pointer must outlive the fat value; copy to the heap.
        let val = self.emit_expr(inner);
        let size = layout::size_of(self.env, source_ty).max(1);
        let data = self.f.fresh_reg();
        self.f.emit(&format!("{data} = call ptr @malloc(i64 {size})"));
        if !val.is_unit() {
            self.f
                .emit(&format!("store {} {}, ptr {data}", val.ty, val.reg));
        }

        let ll = layout::ll_type(self.env, target);
        let with_data = self.f.fresh_reg();
        self.f.emit(&format!(
            "{with_data} = insertvalue {ll} poison, ptr {data}, 0"
        ));
        let fat = self.f.fresh_reg();
        self.f.emit(&format!(
            "{fat} = insertvalue {ll} {with_data}, ptr {vtable}, 1"
        ));
        Val::new(fat, ll)
    }

    /// The vtable global for `(type, behavior)`: one function pointer per
    /// behavior method, in declaration order. Defined on first use.
    fn vtable_global(&mut self, type_name: &str, source_ty: TypeId, behavior: &str) -> String {
        let name = format!("@vtable.{type_name}.{behavior}");
        if self.statics_defined.contains(&name) {
            return name;
        }
        self.statics_defined.insert(name.clone());

        let methods: Vec<String> = self
            .env
            .behaviors
            .get(behavior)
            .map(|def| def.methods.iter().map(|m| m.sig.name.clone()).collect())
            .unwrap_or_default();
        let type_args = match self.env.interner.get(source_ty).clone() {
            Type::Named { args, .. } => args,
            _ => Vec::new(),
        };
        let is_library = self
            .env
            .impls_by_type
            .get(type_name)
            .and_then(|idxs| idxs.first())
            .map(|&i| self.env.impls[i].is_library)
            .unwrap_or(false);

        let mut entries = Vec::with_capacity(methods.len());
        for method in &methods {
            let symbol = self.enqueue_method(
                type_name,
                &type_args,
                method,
                FxHashMap::default(),
                is_library,
            );
            entries.push(format!("ptr @{symbol}"));
        }
        let def = format!(
            "{name} = linkonce_odr constant [{} x ptr] [{}]",
            entries.len(),
            entries.join(", ")
        );
        self.module.add_global(&def);
        name
    }

    // ── closures ─────────────────────────────────────────────────────

    /// Lower a closure literal: hoist the body into its own function, build
    /// the capture environment, and produce the `{ fn, env }` fat pair.
    fn emit_closure(
        &mut self,
        expr: &ast::Expr,
        params: &[(String, Option<ast::TypeExpr>)],
        body: &ast::Expr,
    ) -> Val {
        let closure_ty = self.node_type(expr.id);
        let (param_tys, ret_ty) = match self.env.interner.get(closure_ty).clone() {
            Type::Closure {
                params,
                return_type,
            }
            | Type::Func {
                params,
                return_type,
            } => (params, return_type),
            _ => (Vec::new(), self.env.interner.unit()),
        };

        // Captures: free identifiers that name enclosing locals.
        let mut used = FxHashSet::default();
        collect_idents(body, &mut used);
        let param_names: FxHashSet<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        let mut captures: Vec<(String, super::VarInfo)> = Vec::new();
        for name in &used {
            if param_names.contains(name.as_str()) {
                continue;
            }
            if let Some(info) = self.lookup_local(name) {
                captures.push((name.clone(), info));
            }
        }
        captures.sort_by(|a, b| a.0.cmp(&b.0));

        self.closure_counter += 1;
        let symbol = format!("{}.closure{}", self.current_symbol, self.closure_counter);
        let ret_ll = layout::ll_type(self.env, ret_ty);

        // Hoist: build the closure function with a saved builder.
        let saved_f = std::mem::take(&mut self.f);
        let saved_locals = std::mem::take(&mut self.locals);
        let saved_loops = std::mem::take(&mut self.loop_stack);
        let saved_drops = std::mem::take(&mut self.drop_scopes);

        self.f = crate::ir::FuncBuilder::new();
        self.locals = vec![FxHashMap::default()];
        self.drop_scopes = vec![Vec::new()];

        // Closures inherit their parent's linkage: a closure inside a
        // linkonce instantiation must merge across groups the same way.
        let linkage = self.current_linkage;
        let mut header = format!("define {linkage}{ret_ll} @\"{symbol}\"(");
        let mut parts = Vec::new();
        if !captures.is_empty() {
            parts.push("ptr %env".to_string());
        }
        for ((name, _), pty) in params.iter().zip(&param_tys) {
            let ll = layout::ll_type(self.env, *pty);
            if ll != "void" {
                parts.push(format!("{ll} %arg.{name}"));
            }
        }
        header.push_str(&parts.join(", "));
        header.push_str(") {");
        self.f.raw(&header);
        self.f.label("entry");

        // The environment holds one pointer per captured slot.
        for (index, (name, info)) in captures.iter().enumerate() {
            let slot_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{slot_ptr} = getelementptr inbounds ptr, ptr %env, i64 {index}"
            ));
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = load ptr, ptr {slot_ptr}"));
            self.declare_local(name, slot, info.ty);
        }
        for ((name, _), pty) in params.iter().zip(&param_tys) {
            let ll = layout::ll_type(self.env, *pty);
            if ll == "void" {
                continue;
            }
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = alloca {ll}"));
            self.f.emit(&format!("store {ll} %arg.{name}, ptr {slot}"));
            self.declare_local(name, slot, *pty);
        }

        let saved_ret = self.return_type;
        self.return_type = ret_ty;
        let result = self.emit_expr(body);
        if !self.f.terminated {
            if ret_ll == "void" {
                self.f.emit_term("ret void");
            } else {
                let src = self.node_type(body.id);
                let coerced = self.coerce_from(result, Some(src), &ret_ll);
                self.f.emit_term(&format!("ret {ret_ll} {}", coerced.reg));
            }
        }
        self.f.raw("}");
        self.return_type = saved_ret;

        let body_text = std::mem::take(&mut self.f).into_body();
        self.module.add_function(body_text);

        // Restore the enclosing function state.
        self.f = saved_f;
        self.locals = saved_locals;
        self.loop_stack = saved_loops;
        self.drop_scopes = saved_drops;

        // Environment: null for thin closures.
        let env_reg = if captures.is_empty() {
            "null".to_string()
        } else {
            let size = captures.len() * 8;
            let env = self.f.fresh_reg();
            self.f.emit(&format!("{env} = call ptr @malloc(i64 {size})"));
            for (index, (_, info)) in captures.iter().enumerate() {
                let slot_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{slot_ptr} = getelementptr inbounds ptr, ptr {env}, i64 {index}"
                ));
                self.f
                    .emit(&format!("store ptr {}, ptr {slot_ptr}", info.ptr));
            }
            env
        };

        let ll = "{ ptr, ptr }";
        let with_fn = self.f.fresh_reg();
        self.f.emit(&format!(
            "{with_fn} = insertvalue {ll} poison, ptr @\"{symbol}\", 0"
        ));
        let fat = self.f.fresh_reg();
        self.f.emit(&format!(
            "{fat} = insertvalue {ll} {with_fn}, ptr {env_reg}, 1"
        ));
        Val::new(fat, ll)
    }
}

/// Flatten a left-associative `+` chain over strings into its operands.
fn flatten_concat<'e>(expr: &'e ast::Expr, out: &mut Vec<&'e ast::Expr>) {
    if let ExprKind::Binary {
        op: BinOp::Add,
        lhs,
        rhs,
    } = &expr.kind
    {
        flatten_concat(lhs, out);
        flatten_concat(rhs, out);
        return;
    }
    out.push(expr);
}

/// Collect identifier names referenced in an expression tree.
fn collect_idents(expr: &ast::Expr, out: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Ident(name) => {
            out.insert(name.clone());
        }
        ExprKind::Call { callee, args, .. } => {
            collect_idents(callee, out);
            for arg in args {
                collect_idents(arg, out);
            }
        }
        ExprKind::MethodCall { receiver, args, .. } => {
            collect_idents(receiver, out);
            for arg in args {
                collect_idents(arg, out);
            }
        }
        ExprKind::FieldAccess { receiver, .. } => collect_idents(receiver, out),
        ExprKind::Index { receiver, index } => {
            collect_idents(receiver, out);
            collect_idents(index, out);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_idents(lhs, out);
            collect_idents(rhs, out);
        }
        ExprKind::Unary { operand, .. } => collect_idents(operand, out),
        ExprKind::Cast { expr, .. } => collect_idents(expr, out),
        ExprKind::Reference { expr, .. } | ExprKind::Deref(expr) | ExprKind::Await(expr) => {
            collect_idents(expr, out)
        }
        ExprKind::StructLit { fields, .. } => {
            for (_, value) in fields {
                collect_idents(value, out);
            }
        }
        ExprKind::TupleLit(elems) | ExprKind::ArrayLit(elems) => {
            for elem in elems {
                collect_idents(elem, out);
            }
        }
        ExprKind::ArrayRepeat { elem, count } => {
            collect_idents(elem, out);
            collect_idents(count, out);
        }
        ExprKind::Closure { body, .. } => collect_idents(body, out),
        ExprKind::Range { start, end, .. } => {
            collect_idents(start, out);
            collect_idents(end, out);
        }
        ExprKind::If {
            cond,
            then_block,
            else_block,
        } => {
            collect_idents(cond, out);
            collect_idents_block(then_block, out);
            if let Some(e) = else_block {
                collect_idents(e, out);
            }
        }
        ExprKind::IfLet {
            value,
            then_block,
            else_block,
            ..
        } => {
            collect_idents(value, out);
            collect_idents_block(then_block, out);
            if let Some(e) = else_block {
                collect_idents(e, out);
            }
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            collect_idents(cond, out);
            collect_idents(then_expr, out);
            collect_idents(else_expr, out);
        }
        ExprKind::When { scrutinee, arms } => {
            collect_idents(scrutinee, out);
            for arm in arms {
                if let Some(guard) = &arm.guard {
                    collect_idents(guard, out);
                }
                collect_idents(&arm.body, out);
            }
        }
        ExprKind::Block(block) => collect_idents_block(block, out),
        _ => {}
    }
}

fn collect_idents_block(block: &ast::Block, out: &mut FxHashSet<String>) {
    for stmt in &block.stmts {
        match stmt {
            ast::Stmt::Let { value, .. } => collect_idents(value, out),
            ast::Stmt::Expr(e) => collect_idents(e, out),
            ast::Stmt::Assign { target, value, .. } => {
                collect_idents(target, out);
                collect_idents(value, out);
            }
            ast::Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    collect_idents(v, out);
                }
            }
            ast::Stmt::While { cond, body, .. } => {
                collect_idents(cond, out);
                collect_idents_block(body, out);
            }
            ast::Stmt::Loop { body, .. } => collect_idents_block(body, out),
            ast::Stmt::For { iter, body, .. } => {
                collect_idents(iter, out);
                collect_idents_block(body, out);
            }
            ast::Stmt::Throw { value, .. } => collect_idents(value, out),
            _ => {}
        }
    }
    if let Some(trailing) = &block.trailing {
        collect_idents(trailing, out);
    }
}
