//! Control-flow lowering.
//!
//! | Construct  | Pattern                                        |
//! |------------|------------------------------------------------|
//! | `if`       | br + phi when both branches carry values       |
//! | `ternary`  | stack slot, always value-producing             |
//! | `if let`   | pattern predicate + branch                     |
//! | `when`     | per-arm test blocks, one body block per arm    |
//! | `while`    | cond/body/end with stacksave per iteration     |
//! | `for`      | range, `len`/`get` collection, or iterator     |
//! | `return`   | coercion, drops, async Poll wrapping           |
//!
//! Phi nodes read the *actual* predecessor block (`f.current_block`), not
//! the label originally branched to; nested control flow may have moved the
//! fall-through edge.

use tml_ast as ast;
use tml_ast::{ExprKind, Pattern};
use tml_typeck::{Type, TypeId};

use crate::layout;

use super::{IrGen, Val};

impl IrGen<'_> {
    /// Emit a block; returns the trailing value, if any.
    pub fn emit_block(&mut self, block: &ast::Block) -> Option<Val> {
        self.push_scope();
        for stmt in &block.stmts {
            if self.f.terminated {
                break;
            }
            self.emit_stmt(stmt);
        }
        let result = match &block.trailing {
            Some(expr) if !self.f.terminated => Some(self.emit_expr(expr)),
            _ => None,
        };
        self.pop_scope();
        result
    }

    pub fn emit_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::Let {
                name, ty, value, ..
            } => {
                // The annotated type wins; the value coerces into it.
                let ty = ty
                    .as_ref()
                    .and_then(|t| {
                        let scope = tml_typeck::ParamScope::default();
                        self.env.resolve_type_expr(t, &scope).ok()
                    })
                    .map(|t| self.apply_subst(t))
                    .unwrap_or_else(|| self.node_type(value.id));
                self.ensure_type_defined(ty);
                let val = self.emit_expr(value);
                let ll = layout::ll_type(self.env, ty);
                if ll == "void" {
                    // Unit bindings occupy no storage.
                    let slot = "null".to_string();
                    self.declare_local(name, slot, ty);
                    return;
                }
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {ll}"));
                let src = self.node_type(value.id);
                let val = self.coerce_from(val, Some(src), &ll);
                self.f
                    .emit(&format!("store {ll} {}, ptr {slot}", val.reg));
                self.declare_local(name, slot, ty);
            }
            ast::Stmt::Expr(expr) => {
                self.emit_expr(expr);
            }
            ast::Stmt::Assign { target, op, value, .. } => {
                self.emit_assign(target, *op, value);
            }
            ast::Stmt::Return { value, .. } => {
                let val = value.as_ref().map(|v| (self.emit_expr(v), v.id));
                self.emit_scope_drops_all();
                match val {
                    Some((v, id)) if !v.is_unit() => {
                        let src = self.node_type(id);
                        let coerced = self.coerce_to_return(v, Some(src));
                        self.emit_wrapped_return(Some(coerced));
                    }
                    _ => self.emit_wrapped_return(None),
                }
            }
            ast::Stmt::Break { .. } => {
                if let Some(frame) = self.loop_stack.last().cloned() {
                    // Only the loop body's scope suffix drops here; outer
                    // scopes drop where they close.
                    self.emit_scope_drops_from(frame.drop_depth);
                    if let Some(save) = &frame.stack_save {
                        self.f
                            .emit(&format!("call void @llvm.stackrestore(ptr {save})"));
                    }
                    self.f
                        .emit_term(&format!("br label %{}", frame.break_label));
                }
            }
            ast::Stmt::Continue { .. } => {
                if let Some(frame) = self.loop_stack.last().cloned() {
                    self.emit_scope_drops_from(frame.drop_depth);
                    if let Some(save) = &frame.stack_save {
                        self.f
                            .emit(&format!("call void @llvm.stackrestore(ptr {save})"));
                    }
                    self.f
                        .emit_term(&format!("br label %{}", frame.continue_label));
                }
            }
            ast::Stmt::While { cond, body, .. } => self.emit_while(cond, body),
            ast::Stmt::Loop { body, .. } => self.emit_loop(body),
            ast::Stmt::For {
                pattern,
                iter,
                body,
                ..
            } => self.emit_for(pattern, iter, body),
            ast::Stmt::Throw { value, .. } => self.emit_throw(value),
        }
    }

    // ── if / ternary ─────────────────────────────────────────────────

    pub fn emit_if(
        &mut self,
        cond: &ast::Expr,
        then_block: &ast::Block,
        else_block: Option<&ast::Expr>,
    ) -> Val {
        let cond_val = self.emit_expr(cond);
        let cond_reg = self.to_bool(cond_val);

        let label_then = self.f.fresh_label("if.then");
        let label_else = self.f.fresh_label("if.else");
        let label_end = self.f.fresh_label("if.end");

        if else_block.is_some() {
            self.f.emit_term(&format!(
                "br i1 {cond_reg}, label %{label_then}, label %{label_else}"
            ));
        } else {
            self.f.emit_term(&format!(
                "br i1 {cond_reg}, label %{label_then}, label %{label_end}"
            ));
        }

        self.f.label(&label_then);
        let then_val = self.emit_block(then_block);
        let then_terminated = self.f.terminated;
        let then_end_block = self.f.current_block.clone();
        if !then_terminated {
            self.f.emit_term(&format!("br label %{label_end}"));
        }

        let mut else_val = None;
        let mut else_terminated = false;
        let mut else_end_block = label_else.clone();
        if let Some(else_expr) = else_block {
            self.f.label(&label_else);
            else_val = Some(self.emit_expr(else_expr));
            else_terminated = self.f.terminated;
            else_end_block = self.f.current_block.clone();
            if !else_terminated {
                self.f.emit_term(&format!("br label %{label_end}"));
            }
        }

        // All paths already terminated: no join block at all.
        if then_terminated && (else_block.is_none() || else_terminated) && else_block.is_some() {
            self.f.terminated = true;
            return Val::unit();
        }

        self.f.label(&label_end);

        // A phi joins the two values only when both branches produced one
        // and neither terminated.
        if let (Some(t), Some(e)) = (&then_val, &else_val) {
            if !t.is_unit() && !e.is_unit() && !then_terminated && !else_terminated {
                let else_src = else_block.map(|expr| self.node_type(expr.id));
                let e = self.coerce_from(e.clone(), else_src, &t.ty.clone());
                let result = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{result} = phi {} [ {}, %{} ], [ {}, %{} ]",
                    t.ty, t.reg, then_end_block, e.reg, else_end_block
                ));
                return Val::new(result, t.ty.clone());
            }
        }
        Val::unit()
    }

    /// Ternary always produces a value; a stack slot uniformizes the types.
    pub fn emit_ternary(
        &mut self,
        cond: &ast::Expr,
        then_expr: &ast::Expr,
        else_expr: &ast::Expr,
        result_ty: TypeId,
    ) -> Val {
        let cond_val = self.emit_expr(cond);
        let cond_reg = self.to_bool(cond_val);

        let ll = layout::ll_type(self.env, result_ty);
        let slot = self.f.fresh_reg();
        if ll != "void" {
            self.f.emit(&format!("{slot} = alloca {ll}"));
        }

        let label_true = self.f.fresh_label("ternary.true");
        let label_false = self.f.fresh_label("ternary.false");
        let label_end = self.f.fresh_label("ternary.end");
        self.f.emit_term(&format!(
            "br i1 {cond_reg}, label %{label_true}, label %{label_false}"
        ));

        self.f.label(&label_true);
        let t = self.emit_expr(then_expr);
        if !self.f.terminated && ll != "void" {
            let src = self.node_type(then_expr.id);
            let t = self.coerce_from(t, Some(src), &ll);
            self.f.emit(&format!("store {ll} {}, ptr {slot}", t.reg));
        }
        self.f.emit_term(&format!("br label %{label_end}"));

        self.f.label(&label_false);
        let e = self.emit_expr(else_expr);
        if !self.f.terminated && ll != "void" {
            let src = self.node_type(else_expr.id);
            let e = self.coerce_from(e, Some(src), &ll);
            self.f.emit(&format!("store {ll} {}, ptr {slot}", e.reg));
        }
        self.f.emit_term(&format!("br label %{label_end}"));

        self.f.label(&label_end);
        if ll == "void" {
            return Val::unit();
        }
        let result = self.f.fresh_reg();
        self.f.emit(&format!("{result} = load {ll}, ptr {slot}"));
        Val::new(result, ll)
    }

    pub fn emit_if_let(
        &mut self,
        pattern: &Pattern,
        value: &ast::Expr,
        then_block: &ast::Block,
        else_block: Option<&ast::Expr>,
    ) -> Val {
        let value_ty = self.node_type(value.id);
        self.ensure_type_defined(value_ty);
        let scrutinee = self.emit_expr(value);
        let slot = self.spill(&scrutinee);

        let pred = self.emit_pattern_test(pattern, &slot, value_ty);

        let label_then = self.f.fresh_label("iflet.then");
        let label_else = self.f.fresh_label("iflet.else");
        let label_end = self.f.fresh_label("iflet.end");
        let else_target = if else_block.is_some() {
            &label_else
        } else {
            &label_end
        };
        self.f.emit_term(&format!(
            "br i1 {pred}, label %{label_then}, label %{else_target}"
        ));

        self.f.label(&label_then);
        self.push_scope();
        self.emit_pattern_bindings(pattern, &slot, value_ty);
        let then_val = self.emit_block(then_block);
        self.pop_scope();
        let then_terminated = self.f.terminated;
        let then_end = self.f.current_block.clone();
        if !then_terminated {
            self.f.emit_term(&format!("br label %{label_end}"));
        }

        let mut else_val = None;
        let mut else_terminated = false;
        let mut else_end = label_else.clone();
        if let Some(else_expr) = else_block {
            self.f.label(&label_else);
            else_val = Some(self.emit_expr(else_expr));
            else_terminated = self.f.terminated;
            else_end = self.f.current_block.clone();
            if !else_terminated {
                self.f.emit_term(&format!("br label %{label_end}"));
            }
        }

        self.f.label(&label_end);
        if let (Some(t), Some(e)) = (&then_val, &else_val) {
            if !t.is_unit() && !e.is_unit() && !then_terminated && !else_terminated {
                let else_src = else_block.map(|expr| self.node_type(expr.id));
                let e = self.coerce_from(e.clone(), else_src, &t.ty.clone());
                let result = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{result} = phi {} [ {}, %{} ], [ {}, %{} ]",
                    t.ty, t.reg, then_end, e.reg, else_end
                ));
                return Val::new(result, t.ty.clone());
            }
        }
        Val::unit()
    }

    // ── when ─────────────────────────────────────────────────────────

    /// Lower a `when`: the scrutinee lands in a stack slot once, each arm
    /// gets a predicate block and exactly one body block, and the join
    /// block receives one store per non-terminating arm.
    pub fn emit_when(&mut self, expr: &ast::Expr, scrutinee: &ast::Expr, arms: &[ast::WhenArm]) -> Val {
        if arms.is_empty() {
            self.emit_expr(scrutinee);
            return Val::unit();
        }
        let scrutinee_ty = self.node_type(scrutinee.id);
        self.ensure_type_defined(scrutinee_ty);
        let value = self.emit_expr(scrutinee);
        let slot = self.spill(&value);

        let result_ty = self.node_type(expr.id);
        let result_ll = layout::ll_type(self.env, result_ty);
        let result_slot = if result_ll != "void" {
            let r = self.f.fresh_reg();
            self.f.emit(&format!("{r} = alloca {result_ll}"));
            Some(r)
        } else {
            None
        };

        let label_end = self.f.fresh_label("when.end");
        let mut arm_labels = Vec::with_capacity(arms.len());
        for _ in arms {
            arm_labels.push((
                self.f.fresh_label("when.test"),
                self.f.fresh_label("when.arm"),
            ));
        }
        let label_nomatch = self.f.fresh_label("when.nomatch");

        self.f
            .emit_term(&format!("br label %{}", arm_labels[0].0));

        for (i, arm) in arms.iter().enumerate() {
            let (test_label, body_label) = arm_labels[i].clone();
            let next_test = arm_labels
                .get(i + 1)
                .map(|(t, _)| t.clone())
                .unwrap_or_else(|| label_nomatch.clone());

            self.f.label(&test_label);
            let pred = self.emit_pattern_test(&arm.pattern, &slot, scrutinee_ty);
            // Guards run after the pattern matches, with bindings visible.
            if let Some(guard) = &arm.guard {
                let guard_label = self.f.fresh_label("when.guard");
                self.f.emit_term(&format!(
                    "br i1 {pred}, label %{guard_label}, label %{next_test}"
                ));
                self.f.label(&guard_label);
                self.push_scope();
                self.emit_pattern_bindings(&arm.pattern, &slot, scrutinee_ty);
                let guard_val = self.emit_expr(guard);
                let guard_reg = self.to_bool(guard_val);
                self.pop_scope();
                self.f.emit_term(&format!(
                    "br i1 {guard_reg}, label %{body_label}, label %{next_test}"
                ));
            } else {
                self.f.emit_term(&format!(
                    "br i1 {pred}, label %{body_label}, label %{next_test}"
                ));
            }

            self.f.label(&body_label);
            self.push_scope();
            self.emit_pattern_bindings(&arm.pattern, &slot, scrutinee_ty);
            let body_val = self.emit_expr(&arm.body);
            self.pop_scope();
            if !self.f.terminated {
                if let Some(result) = &result_slot {
                    if !body_val.is_unit() {
                        let src = self.node_type(arm.body.id);
                        let coerced = self.coerce_from(body_val, Some(src), &result_ll);
                        self.f.emit(&format!(
                            "store {result_ll} {}, ptr {result}",
                            coerced.reg
                        ));
                    }
                }
                self.f.emit_term(&format!("br label %{label_end}"));
            }
        }

        // No arm matched: undefined scrutinee state is a checker bug; trap.
        self.f.label(&label_nomatch);
        self.f.emit_term("unreachable");

        self.f.label(&label_end);
        match result_slot {
            Some(result) => {
                let loaded = self.f.fresh_reg();
                self.f
                    .emit(&format!("{loaded} = load {result_ll}, ptr {result}"));
                Val::new(loaded, result_ll)
            }
            None => Val::unit(),
        }
    }

    // ── loops ────────────────────────────────────────────────────────

    fn emit_while(&mut self, cond: &ast::Expr, body: &ast::Block) {
        let label_cond = self.f.fresh_label("while.cond");
        let label_body = self.f.fresh_label("while.body");
        let label_end = self.f.fresh_label("while.end");

        self.f.emit_term(&format!("br label %{label_cond}"));
        self.f.label(&label_cond);
        let cond_val = self.emit_expr(cond);
        let cond_reg = self.to_bool(cond_val);
        self.f.emit_term(&format!(
            "br i1 {cond_reg}, label %{label_body}, label %{label_end}"
        ));

        self.f.label(&label_body);
        // Intra-iteration allocas are reclaimed via stacksave/stackrestore.
        let stack = self.f.fresh_reg();
        self.f.emit(&format!("{stack} = call ptr @llvm.stacksave()"));
        self.loop_stack.push(super::LoopFrame {
            continue_label: label_cond.clone(),
            break_label: label_end.clone(),
            drop_depth: self.drop_scopes.len(),
            stack_save: Some(stack.clone()),
        });
        self.emit_block(body);
        self.loop_stack.pop();
        if !self.f.terminated {
            self.f
                .emit(&format!("call void @llvm.stackrestore(ptr {stack})"));
            self.f.emit_term(&format!("br label %{label_cond}"));
        }

        self.f.label(&label_end);
    }

    fn emit_loop(&mut self, body: &ast::Block) {
        let label_body = self.f.fresh_label("loop.body");
        let label_end = self.f.fresh_label("loop.end");

        self.f.emit_term(&format!("br label %{label_body}"));
        self.f.label(&label_body);
        let stack = self.f.fresh_reg();
        self.f.emit(&format!("{stack} = call ptr @llvm.stacksave()"));
        self.loop_stack.push(super::LoopFrame {
            continue_label: label_body.clone(),
            break_label: label_end.clone(),
            drop_depth: self.drop_scopes.len(),
            stack_save: Some(stack.clone()),
        });
        self.emit_block(body);
        self.loop_stack.pop();
        if !self.f.terminated {
            self.f
                .emit(&format!("call void @llvm.stackrestore(ptr {stack})"));
            self.f.emit_term(&format!("br label %{label_body}"));
        }
        self.f.label(&label_end);
    }

    fn emit_for(&mut self, pattern: &Pattern, iter: &ast::Expr, body: &ast::Block) {
        if let ExprKind::Range {
            start,
            end,
            inclusive,
        } = &iter.kind
        {
            self.emit_for_range(pattern, start, end, *inclusive, body);
            return;
        }

        let iter_ty = self.node_type(iter.id);
        let deref = self.env.interner.deref_all(iter_ty);
        match self.env.interner.get(deref).clone() {
            Type::Named { name, args, .. } if name == "List" && args.len() == 1 => {
                self.emit_for_collection(pattern, iter, args[0], body);
            }
            Type::Array { element, .. } | Type::Slice { element } => {
                self.emit_for_collection(pattern, iter, element, body);
            }
            _ => self.emit_for_iterator(pattern, iter, body),
        }
    }

    /// `for i in a to b` / `a through b`: exclusive vs inclusive end.
    fn emit_for_range(
        &mut self,
        pattern: &Pattern,
        start: &ast::Expr,
        end: &ast::Expr,
        inclusive: bool,
        body: &ast::Block,
    ) {
        let start_val = self.emit_expr(start);
        let end_val = self.emit_expr(end);
        let ll = start_val.ty.clone();
        let end_src = self.node_type(end.id);
        let end_val = self.coerce_from(end_val, Some(end_src), &ll);

        let slot = self.f.fresh_reg();
        self.f.emit(&format!("{slot} = alloca {ll}"));
        self.f
            .emit(&format!("store {ll} {}, ptr {slot}", start_val.reg));

        let label_cond = self.f.fresh_label("for.cond");
        let label_body = self.f.fresh_label("for.body");
        let label_inc = self.f.fresh_label("for.inc");
        let label_end = self.f.fresh_label("for.end");

        self.f.emit_term(&format!("br label %{label_cond}"));
        self.f.label(&label_cond);
        let current = self.f.fresh_reg();
        self.f.emit(&format!("{current} = load {ll}, ptr {slot}"));
        let pred = self.f.fresh_reg();
        let cmp = if inclusive { "sle" } else { "slt" };
        self.f.emit(&format!(
            "{pred} = icmp {cmp} {ll} {current}, {}",
            end_val.reg
        ));
        self.f.emit_term(&format!(
            "br i1 {pred}, label %{label_body}, label %{label_end}"
        ));

        self.f.label(&label_body);
        let stack = self.f.fresh_reg();
        self.f.emit(&format!("{stack} = call ptr @llvm.stacksave()"));
        let drop_depth = self.drop_scopes.len();
        self.push_scope();
        if let Pattern::Binding { name, .. } = pattern {
            let start_ty = self.node_type_of_val(&ll);
            self.declare_local(name, slot.clone(), start_ty);
        }
        self.loop_stack.push(super::LoopFrame {
            continue_label: label_inc.clone(),
            break_label: label_end.clone(),
            drop_depth,
            stack_save: Some(stack.clone()),
        });
        self.emit_block(body);
        self.loop_stack.pop();
        self.pop_scope();
        if !self.f.terminated {
            self.f
                .emit(&format!("call void @llvm.stackrestore(ptr {stack})"));
            self.f.emit_term(&format!("br label %{label_inc}"));
        }

        self.f.label(&label_inc);
        let loaded = self.f.fresh_reg();
        self.f.emit(&format!("{loaded} = load {ll}, ptr {slot}"));
        let next = self.f.fresh_reg();
        self.f.emit(&format!("{next} = add {ll} {loaded}, 1"));
        self.f.emit(&format!("store {ll} {next}, ptr {slot}"));
        self.f.emit_term(&format!("br label %{label_cond}"));

        self.f.label(&label_end);
    }

    /// Collection iteration via `len`/`get` on the collection.
    fn emit_for_collection(
        &mut self,
        pattern: &Pattern,
        iter: &ast::Expr,
        element: TypeId,
        body: &ast::Block,
    ) {
        let collection = self.emit_expr(iter);

        let len = self.f.fresh_reg();
        self.f
            .emit(&format!("{len} = call i64 @list_len(ptr {})", collection.reg));

        let idx = self.f.fresh_reg();
        self.f.emit(&format!("{idx} = alloca i64"));
        self.f.emit(&format!("store i64 0, ptr {idx}"));

        let label_cond = self.f.fresh_label("for.cond");
        let label_body = self.f.fresh_label("for.body");
        let label_inc = self.f.fresh_label("for.inc");
        let label_end = self.f.fresh_label("for.end");

        self.f.emit_term(&format!("br label %{label_cond}"));
        self.f.label(&label_cond);
        let i = self.f.fresh_reg();
        self.f.emit(&format!("{i} = load i64, ptr {idx}"));
        let pred = self.f.fresh_reg();
        self.f.emit(&format!("{pred} = icmp slt i64 {i}, {len}"));
        self.f.emit_term(&format!(
            "br i1 {pred}, label %{label_body}, label %{label_end}"
        ));

        self.f.label(&label_body);
        let stack = self.f.fresh_reg();
        self.f.emit(&format!("{stack} = call ptr @llvm.stacksave()"));
        let drop_depth = self.drop_scopes.len();
        self.push_scope();
        let i2 = self.f.fresh_reg();
        self.f.emit(&format!("{i2} = load i64, ptr {idx}"));
        let raw = self.f.fresh_reg();
        self.f.emit(&format!(
            "{raw} = call ptr @list_get(ptr {}, i64 {i2})",
            collection.reg
        ));
        let elem_val = self.from_list_slot(raw, element);
        let elem_ll = elem_val.ty.clone();
        if let Pattern::Binding { name, .. } = pattern {
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = alloca {elem_ll}"));
            self.f
                .emit(&format!("store {elem_ll} {}, ptr {slot}", elem_val.reg));
            self.declare_local(name, slot, element);
        }
        self.loop_stack.push(super::LoopFrame {
            continue_label: label_inc.clone(),
            break_label: label_end.clone(),
            drop_depth,
            stack_save: Some(stack.clone()),
        });
        self.emit_block(body);
        self.loop_stack.pop();
        self.pop_scope();
        if !self.f.terminated {
            self.f
                .emit(&format!("call void @llvm.stackrestore(ptr {stack})"));
            self.f.emit_term(&format!("br label %{label_inc}"));
        }

        self.f.label(&label_inc);
        let i3 = self.f.fresh_reg();
        self.f.emit(&format!("{i3} = load i64, ptr {idx}"));
        let next = self.f.fresh_reg();
        self.f.emit(&format!("{next} = add i64 {i3}, 1"));
        self.f.emit(&format!("store i64 {next}, ptr {idx}"));
        self.f.emit_term(&format!("br label %{label_cond}"));

        self.f.label(&label_end);
    }

    /// User iterators: loop on `next()` until `Nothing`.
    fn emit_for_iterator(&mut self, pattern: &Pattern, iter: &ast::Expr, body: &ast::Block) {
        let iter_ty = self.node_type(iter.id);
        let iter_val = self.emit_expr(iter);
        let iter_slot = self.spill(&iter_val);

        // Resolve the `next` target through the same path calls take.
        let (type_name, type_args) = match self.env.interner.get(iter_ty).clone() {
            Type::Named { name, args, .. } => (name, args),
            _ => return,
        };
        let is_library = self
            .env
            .impls_by_type
            .get(&type_name)
            .and_then(|idxs| idxs.first())
            .map(|&i| self.env.impls[i].is_library)
            .unwrap_or(false);
        let mut subst = rustc_hash::FxHashMap::default();
        if let Some(idxs) = self.env.impls_by_type.get(&type_name) {
            if let Some(&i) = idxs.first() {
                for (param, arg) in self.env.impls[i].type_params.clone().iter().zip(&type_args) {
                    subst.insert(param.clone(), *arg);
                }
            }
        }
        let next_symbol = self.enqueue_method(&type_name, &type_args, "next", subst, is_library);

        // Element type: Maybe[Item] from the impl's `next` signature.
        let item_ty = self
            .typed
            .pattern_bindings
            .get(&iter.id)
            .and_then(|b| b.first().map(|(_, t)| *t))
            .map(|t| self.apply_subst(t))
            .unwrap_or_else(|| self.env.interner.unit());
        let maybe_ty = self.env.interner.maybe(item_ty);
        self.ensure_type_defined(maybe_ty);
        let maybe_ll = layout::ll_type(self.env, maybe_ty);

        let label_cond = self.f.fresh_label("for.cond");
        let label_body = self.f.fresh_label("for.body");
        let label_end = self.f.fresh_label("for.end");

        self.f.emit_term(&format!("br label %{label_cond}"));
        self.f.label(&label_cond);
        let next_val = self.f.fresh_reg();
        self.f.emit(&format!(
            "{next_val} = call {maybe_ll} @{next_symbol}(ptr {iter_slot})"
        ));
        let maybe_slot = self.f.fresh_reg();
        self.f.emit(&format!("{maybe_slot} = alloca {maybe_ll}"));
        self.f
            .emit(&format!("store {maybe_ll} {next_val}, ptr {maybe_slot}"));
        let tag_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{tag_ptr} = getelementptr inbounds {maybe_ll}, ptr {maybe_slot}, i32 0, i32 0"
        ));
        let tag = self.f.fresh_reg();
        self.f.emit(&format!("{tag} = load i32, ptr {tag_ptr}"));
        let pred = self.f.fresh_reg();
        self.f.emit(&format!("{pred} = icmp eq i32 {tag}, 0"));
        self.f.emit_term(&format!(
            "br i1 {pred}, label %{label_body}, label %{label_end}"
        ));

        self.f.label(&label_body);
        let drop_depth = self.drop_scopes.len();
        self.push_scope();
        if let Pattern::Binding { name, .. } = pattern {
            let payload_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{payload_ptr} = getelementptr inbounds {maybe_ll}, ptr {maybe_slot}, i32 0, i32 1"
            ));
            let item_ll = layout::ll_type(self.env, item_ty);
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = alloca {item_ll}"));
            let item = self.f.fresh_reg();
            self.f
                .emit(&format!("{item} = load {item_ll}, ptr {payload_ptr}"));
            self.f
                .emit(&format!("store {item_ll} {item}, ptr {slot}"));
            self.declare_local(name, slot, item_ty);
        }
        self.loop_stack.push(super::LoopFrame {
            continue_label: label_cond.clone(),
            break_label: label_end.clone(),
            drop_depth,
            stack_save: None,
        });
        self.emit_block(body);
        self.loop_stack.pop();
        self.pop_scope();
        if !self.f.terminated {
            self.f.emit_term(&format!("br label %{label_cond}"));
        }

        self.f.label(&label_end);
    }

    // ── throw / return ───────────────────────────────────────────────

    /// `throw e`: the payload exposes `message` at field 0; panic with it.
    fn emit_throw(&mut self, value: &ast::Expr) {
        let ty = self.node_type(value.id);
        let val = self.emit_expr(value);
        let slot = self.spill(&val);
        let ll = layout::ll_type(self.env, ty);
        let msg_ptr = self.f.fresh_reg();
        self.f.emit(&format!(
            "{msg_ptr} = getelementptr inbounds {ll}, ptr {slot}, i32 0, i32 0"
        ));
        let msg = self.f.fresh_reg();
        self.f.emit(&format!("{msg} = load ptr, ptr {msg_ptr}"));
        self.f.emit(&format!("call void @panic(ptr {msg})"));
        self.f.emit_term("unreachable");
    }

    /// Coerce a value to the function's declared return type. `source` is
    /// the value's semantic type, for signed-vs-unsigned widening.
    pub fn coerce_to_return(&mut self, val: Val, source: Option<TypeId>) -> Val {
        let ret_ll = layout::ll_type(self.env, self.return_type);
        if ret_ll == "void" {
            return Val::unit();
        }
        self.coerce_from(val, source, &ret_ll)
    }

    /// Emit `ret`, wrapping in `Poll::Ready` for async functions.
    pub fn emit_wrapped_return(&mut self, value: Option<Val>) {
        if self.is_async {
            let poll = self
                .env
                .interner
                .named("Poll", vec![self.return_type]);
            self.ensure_type_defined(poll);
            let poll_ll = layout::ll_type(self.env, poll);
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = alloca {poll_ll}"));
            let tag_ptr = self.f.fresh_reg();
            self.f.emit(&format!(
                "{tag_ptr} = getelementptr inbounds {poll_ll}, ptr {slot}, i32 0, i32 0"
            ));
            self.f.emit(&format!("store i32 0, ptr {tag_ptr}"));
            if let Some(v) = value {
                let payload_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{payload_ptr} = getelementptr inbounds {poll_ll}, ptr {slot}, i32 0, i32 1"
                ));
                self.f
                    .emit(&format!("store {} {}, ptr {payload_ptr}", v.ty, v.reg));
            }
            let loaded = self.f.fresh_reg();
            self.f
                .emit(&format!("{loaded} = load {poll_ll}, ptr {slot}"));
            self.f.emit_term(&format!("ret {poll_ll} {loaded}"));
            return;
        }
        match value {
            Some(v) => self.f.emit_term(&format!("ret {} {}", v.ty, v.reg)),
            None => {
                let ret_ll = layout::ll_type(self.env, self.return_type);
                if ret_ll == "void" {
                    self.f.emit_term("ret void");
                } else {
                    // A value-returning function whose body fell off the end
                    // returns the zero value.
                    self.f.emit_term(&format!("ret {ret_ll} zeroinitializer"));
                }
            }
        }
    }

    // ── patterns ─────────────────────────────────────────────────────

    /// The i1 predicate for a pattern against the value at `ptr`.
    pub fn emit_pattern_test(&mut self, pattern: &Pattern, ptr: &str, ty: TypeId) -> String {
        match pattern {
            Pattern::Wildcard { .. } | Pattern::Binding { .. } => "true".to_string(),
            Pattern::IntLit { value, .. } => {
                let ll = layout::ll_type(self.env, ty);
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                let pred = self.f.fresh_reg();
                self.f
                    .emit(&format!("{pred} = icmp eq {ll} {loaded}, {value}"));
                pred
            }
            Pattern::BoolLit { value, .. } => {
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load i1, ptr {ptr}"));
                let expected = if *value { "true" } else { "false" };
                let pred = self.f.fresh_reg();
                self.f
                    .emit(&format!("{pred} = icmp eq i1 {loaded}, {expected}"));
                pred
            }
            Pattern::CharLit { value, .. } => {
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load i32, ptr {ptr}"));
                let pred = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pred} = icmp eq i32 {loaded}, {}",
                    *value as u32
                ));
                pred
            }
            Pattern::StrLit { value, .. } => {
                let global = self.module.intern_string(value);
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load ptr, ptr {ptr}"));
                let pred = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{pred} = call i1 @str_eq(ptr {loaded}, ptr {global})"
                ));
                pred
            }
            // Combined bounds check: lo <= x < hi (or <= hi inclusive).
            Pattern::Range {
                lo, hi, inclusive, ..
            } => {
                let ll = layout::ll_type(self.env, ty);
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                let ge = self.f.fresh_reg();
                self.f
                    .emit(&format!("{ge} = icmp sge {ll} {loaded}, {lo}"));
                let cmp = if *inclusive { "sle" } else { "slt" };
                let lt = self.f.fresh_reg();
                self.f
                    .emit(&format!("{lt} = icmp {cmp} {ll} {loaded}, {hi}"));
                let pred = self.f.fresh_reg();
                self.f.emit(&format!("{pred} = and i1 {ge}, {lt}"));
                pred
            }
            // Or-patterns combine sub-predicates.
            Pattern::Or { alternatives, .. } => {
                let mut acc: Option<String> = None;
                for alternative in alternatives {
                    let p = self.emit_pattern_test(alternative, ptr, ty);
                    acc = Some(match acc {
                        None => p,
                        Some(prev) => {
                            let combined = self.f.fresh_reg();
                            self.f.emit(&format!("{combined} = or i1 {prev}, {p}"));
                            combined
                        }
                    });
                }
                acc.unwrap_or_else(|| "false".to_string())
            }
            Pattern::EnumVariant {
                variant, payload, ..
            } => {
                let (enum_name, args) = match self.env.interner.get(ty).clone() {
                    Type::Named { name, args, .. } => (name, args),
                    _ => return "false".to_string(),
                };
                let Some(tag) = layout::variant_tag(self.env, &enum_name, variant) else {
                    return "false".to_string();
                };
                let ll = layout::ll_type(self.env, ty);
                let tag_ptr = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{tag_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 0"
                ));
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load i32, ptr {tag_ptr}"));
                let mut pred = {
                    let p = self.f.fresh_reg();
                    self.f.emit(&format!("{p} = icmp eq i32 {loaded}, {tag}"));
                    p
                };
                // Nested payload predicates refine the tag check.
                if !payload.is_empty() {
                    let variants = layout::enum_variants(self.env, &enum_name, &args);
                    if let Some((_, payload_tys)) =
                        variants.iter().find(|(n, _)| n == variant)
                    {
                        let offsets = layout::variant_payload_offsets(self.env, payload_tys);
                        let payload_base = self.f.fresh_reg();
                        self.f.emit(&format!(
                            "{payload_base} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 1"
                        ));
                        for ((sub, sub_ty), offset) in
                            payload.iter().zip(payload_tys).zip(&offsets)
                        {
                            if matches!(sub, Pattern::Wildcard { .. } | Pattern::Binding { .. }) {
                                continue;
                            }
                            let elem_ptr = self.f.fresh_reg();
                            self.f.emit(&format!(
                                "{elem_ptr} = getelementptr inbounds i8, ptr {payload_base}, i64 {offset}"
                            ));
                            let sub_pred = self.emit_pattern_test(sub, &elem_ptr, *sub_ty);
                            let combined = self.f.fresh_reg();
                            self.f
                                .emit(&format!("{combined} = and i1 {pred}, {sub_pred}"));
                            pred = combined;
                        }
                    }
                }
                pred
            }
            Pattern::Struct { fields, .. } => {
                let mut pred = "true".to_string();
                let (name, args) = match self.env.interner.get(ty).clone() {
                    Type::Named { name, args, .. } => (name, args),
                    _ => return "false".to_string(),
                };
                let ll = layout::ll_type(self.env, ty);
                let struct_fields = layout::instantiated_fields(self.env, &name, &args);
                for (field_name, sub) in fields {
                    if matches!(sub, Pattern::Wildcard { .. } | Pattern::Binding { .. }) {
                        continue;
                    }
                    let Some(index) =
                        struct_fields.iter().position(|(n, _)| n == field_name)
                    else {
                        continue;
                    };
                    let field_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{field_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                    ));
                    let sub_pred =
                        self.emit_pattern_test(sub, &field_ptr, struct_fields[index].1);
                    if pred == "true" {
                        pred = sub_pred;
                    } else {
                        let combined = self.f.fresh_reg();
                        self.f
                            .emit(&format!("{combined} = and i1 {pred}, {sub_pred}"));
                        pred = combined;
                    }
                }
                pred
            }
            Pattern::Tuple { elements, .. } => {
                let elems = match self.env.interner.get(ty).clone() {
                    Type::Tuple(elems) => elems,
                    _ => return "false".to_string(),
                };
                let ll = layout::ll_type(self.env, ty);
                let mut pred = "true".to_string();
                for (index, (sub, elem_ty)) in elements.iter().zip(elems).enumerate() {
                    if matches!(sub, Pattern::Wildcard { .. } | Pattern::Binding { .. }) {
                        continue;
                    }
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                    ));
                    let sub_pred = self.emit_pattern_test(sub, &elem_ptr, elem_ty);
                    if pred == "true" {
                        pred = sub_pred;
                    } else {
                        let combined = self.f.fresh_reg();
                        self.f
                            .emit(&format!("{combined} = and i1 {pred}, {sub_pred}"));
                        pred = combined;
                    }
                }
                pred
            }
            Pattern::Array { elements, .. } => {
                let element = match self.env.interner.get(ty).clone() {
                    Type::Array { element, .. } => element,
                    Type::Slice { element } => element,
                    _ => return "false".to_string(),
                };
                let ll = layout::ll_type(self.env, ty);
                let mut pred = "true".to_string();
                for (index, sub) in elements.iter().enumerate() {
                    if matches!(sub, Pattern::Wildcard { .. } | Pattern::Binding { .. }) {
                        continue;
                    }
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i64 0, i64 {index}"
                    ));
                    let sub_pred = self.emit_pattern_test(sub, &elem_ptr, element);
                    if pred == "true" {
                        pred = sub_pred;
                    } else {
                        let combined = self.f.fresh_reg();
                        self.f
                            .emit(&format!("{combined} = and i1 {pred}, {sub_pred}"));
                        pred = combined;
                    }
                }
                pred
            }
        }
    }

    /// Bind the names a pattern introduces, GEP-ing into the matched value.
    pub fn emit_pattern_bindings(&mut self, pattern: &Pattern, ptr: &str, ty: TypeId) {
        match pattern {
            Pattern::Binding { name, .. } => {
                let ll = layout::ll_type(self.env, ty);
                if ll == "void" {
                    self.declare_local(name, "null".to_string(), ty);
                    return;
                }
                let slot = self.f.fresh_reg();
                self.f.emit(&format!("{slot} = alloca {ll}"));
                let loaded = self.f.fresh_reg();
                self.f.emit(&format!("{loaded} = load {ll}, ptr {ptr}"));
                self.f.emit(&format!("store {ll} {loaded}, ptr {slot}"));
                self.declare_local(name, slot, ty);
            }
            Pattern::EnumVariant {
                variant, payload, ..
            } => {
                if payload.is_empty() {
                    return;
                }
                let (enum_name, args) = match self.env.interner.get(ty).clone() {
                    Type::Named { name, args, .. } => (name, args),
                    _ => return,
                };
                let variants = layout::enum_variants(self.env, &enum_name, &args);
                let Some((_, payload_tys)) = variants.iter().find(|(n, _)| n == variant) else {
                    return;
                };
                let offsets = layout::variant_payload_offsets(self.env, payload_tys);
                let ll = layout::ll_type(self.env, ty);
                let payload_base = self.f.fresh_reg();
                self.f.emit(&format!(
                    "{payload_base} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 1"
                ));
                for ((sub, sub_ty), offset) in payload.iter().zip(payload_tys).zip(&offsets) {
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds i8, ptr {payload_base}, i64 {offset}"
                    ));
                    self.emit_pattern_bindings(sub, &elem_ptr, *sub_ty);
                }
            }
            Pattern::Struct { fields, .. } => {
                let (name, args) = match self.env.interner.get(ty).clone() {
                    Type::Named { name, args, .. } => (name, args),
                    _ => return,
                };
                let ll = layout::ll_type(self.env, ty);
                let struct_fields = layout::instantiated_fields(self.env, &name, &args);
                for (field_name, sub) in fields {
                    let Some(index) =
                        struct_fields.iter().position(|(n, _)| n == field_name)
                    else {
                        continue;
                    };
                    let field_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{field_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                    ));
                    self.emit_pattern_bindings(sub, &field_ptr, struct_fields[index].1);
                }
            }
            Pattern::Tuple { elements, .. } => {
                let elems = match self.env.interner.get(ty).clone() {
                    Type::Tuple(elems) => elems,
                    _ => return,
                };
                let ll = layout::ll_type(self.env, ty);
                for (index, (sub, elem_ty)) in elements.iter().zip(elems).enumerate() {
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i32 0, i32 {index}"
                    ));
                    self.emit_pattern_bindings(sub, &elem_ptr, elem_ty);
                }
            }
            Pattern::Array {
                elements,
                rest_at,
                rest_binding,
                ..
            } => {
                let (element, count) = match self.env.interner.get(ty).clone() {
                    Type::Array { element, size } => (
                        element,
                        match size {
                            tml_typeck::ArraySize::Const(n) => n,
                            tml_typeck::ArraySize::Param(_) => 0,
                        },
                    ),
                    Type::Slice { element } => (element, 0),
                    _ => return,
                };
                let ll = layout::ll_type(self.env, ty);
                for (index, sub) in elements.iter().enumerate() {
                    let elem_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{elem_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i64 0, i64 {index}"
                    ));
                    self.emit_pattern_bindings(sub, &elem_ptr, element);
                }
                // The rest binding is a slice over the remaining elements.
                if let (Some(rest), Some(at)) = (rest_binding, rest_at) {
                    let rest_ptr = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{rest_ptr} = getelementptr inbounds {ll}, ptr {ptr}, i64 0, i64 {at}"
                    ));
                    let slice_ty = self
                        .env
                        .interner
                        .intern(Type::Slice { element });
                    let slice_ll = layout::ll_type(self.env, slice_ty);
                    let slot = self.f.fresh_reg();
                    self.f.emit(&format!("{slot} = alloca {slice_ll}"));
                    let p0 = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{p0} = getelementptr inbounds {slice_ll}, ptr {slot}, i32 0, i32 0"
                    ));
                    self.f.emit(&format!("store ptr {rest_ptr}, ptr {p0}"));
                    let p1 = self.f.fresh_reg();
                    self.f.emit(&format!(
                        "{p1} = getelementptr inbounds {slice_ll}, ptr {slot}, i32 0, i32 1"
                    ));
                    let rest_len = count.saturating_sub(*at as u64);
                    self.f.emit(&format!("store i64 {rest_len}, ptr {p1}"));
                    self.declare_local(rest, slot, slice_ty);
                }
            }
            // All alternatives bind the same names; bind through the first.
            Pattern::Or { alternatives, .. } => {
                if let Some(first) = alternatives.first() {
                    self.emit_pattern_bindings(first, ptr, ty);
                }
            }
            _ => {}
        }
    }

    // ── small helpers ────────────────────────────────────────────────

    /// Spill a value into a fresh stack slot; returns the slot pointer.
    pub fn spill(&mut self, val: &Val) -> String {
        if val.is_unit() {
            return "null".to_string();
        }
        let slot = self.f.fresh_reg();
        self.f.emit(&format!("{slot} = alloca {}", val.ty));
        self.f
            .emit(&format!("store {} {}, ptr {slot}", val.ty, val.reg));
        slot
    }

    /// Convert a value to i1 for branching.
    pub fn to_bool(&mut self, val: Val) -> String {
        if val.ty == "i1" {
            return val.reg;
        }
        let reg = self.f.fresh_reg();
        self.f
            .emit(&format!("{reg} = icmp ne {} {}, 0", val.ty, val.reg));
        reg
    }

    /// Width coercion with the default signed widening. Use [`coerce_from`]
    /// wherever the semantic source type is at hand; the LLVM type string
    /// alone cannot distinguish `I8` from `U8`.
    ///
    /// [`coerce_from`]: IrGen::coerce_from
    pub fn coerce(&mut self, val: Val, target_ll: &str) -> Val {
        self.coerce_from(val, None, target_ll)
    }

    /// Integer width coercion: truncate to narrower targets; widen with
    /// `zext` when the source's semantic type is unsigned (or `Bool`/`Char`),
    /// else `sext`.
    pub fn coerce_from(&mut self, val: Val, source: Option<TypeId>, target_ll: &str) -> Val {
        if val.ty == target_ll || target_ll == "void" || val.is_unit() {
            return val;
        }
        let (from_bits, to_bits) = (int_bits(&val.ty), int_bits(target_ll));
        if let (Some(from), Some(to)) = (from_bits, to_bits) {
            let reg = self.f.fresh_reg();
            if from < to {
                let op = if self.widens_unsigned(source) {
                    "zext"
                } else {
                    "sext"
                };
                self.f.emit(&format!(
                    "{reg} = {op} {} {} to {target_ll}",
                    val.ty, val.reg
                ));
            } else {
                self.f.emit(&format!(
                    "{reg} = trunc {} {} to {target_ll}",
                    val.ty, val.reg
                ));
            }
            return Val::new(reg, target_ll);
        }
        if val.ty == "float" && target_ll == "double" {
            let reg = self.f.fresh_reg();
            self.f
                .emit(&format!("{reg} = fpext float {} to double", val.reg));
            return Val::new(reg, "double");
        }
        if val.ty == "double" && target_ll == "float" {
            let reg = self.f.fresh_reg();
            self.f
                .emit(&format!("{reg} = fptrunc double {} to float", val.reg));
            return Val::new(reg, "float");
        }
        // Same-size reinterpretations and pointer-typed values pass through.
        Val::new(val.reg, target_ll)
    }

    /// Whether a widening from `source` must zero-extend.
    fn widens_unsigned(&mut self, source: Option<TypeId>) -> bool {
        use tml_ast::PrimKind;
        let Some(source) = source else { return false };
        let source = self.apply_subst(source);
        let source = self.env.interner.deref_all(source);
        match self.env.interner.as_prim(source) {
            Some(kind) => {
                (kind.is_integer() && !kind.is_signed())
                    || kind == PrimKind::Bool
                    || kind == PrimKind::Char
            }
            None => false,
        }
    }

    /// Unpack a runtime list slot (a pointer-sized cell) to the element type.
    pub fn from_list_slot(&mut self, raw: String, element: TypeId) -> Val {
        let ll = layout::ll_type(self.env, element);
        match ll.as_str() {
            "ptr" => Val::new(raw, "ptr"),
            "double" => {
                let bits = self.f.fresh_reg();
                self.f
                    .emit(&format!("{bits} = ptrtoint ptr {raw} to i64"));
                let val = self.f.fresh_reg();
                self.f
                    .emit(&format!("{val} = bitcast i64 {bits} to double"));
                Val::new(val, "double")
            }
            _ => {
                let as_int = self.f.fresh_reg();
                self.f
                    .emit(&format!("{as_int} = ptrtoint ptr {raw} to i64"));
                let coerced = self.coerce(Val::new(as_int, "i64"), &ll);
                coerced
            }
        }
    }

    /// Pack a value into a runtime list slot.
    pub fn to_list_slot(&mut self, val: Val) -> String {
        let ll = val.ty.clone();
        match ll.as_str() {
            "ptr" => val.reg,
            "double" => {
                let bits = self.f.fresh_reg();
                self.f
                    .emit(&format!("{bits} = bitcast double {} to i64", val.reg));
                let p = self.f.fresh_reg();
                self.f
                    .emit(&format!("{p} = inttoptr i64 {bits} to ptr"));
                p
            }
            _ => {
                let widened = self.coerce(val, "i64");
                let p = self.f.fresh_reg();
                self.f
                    .emit(&format!("{p} = inttoptr i64 {} to ptr", widened.reg));
                p
            }
        }
    }

    /// Recover a semantic integer type for a loop induction variable from
    /// its LLVM type.
    fn node_type_of_val(&mut self, ll: &str) -> TypeId {
        use tml_ast::PrimKind;
        let kind = match ll {
            "i8" => PrimKind::I8,
            "i16" => PrimKind::I16,
            "i32" => PrimKind::I32,
            "i128" => PrimKind::I128,
            _ => PrimKind::I64,
        };
        self.env.interner.prim(kind)
    }
}

fn int_bits(ll: &str) -> Option<u32> {
    match ll {
        "i1" => Some(1),
        "i8" => Some(8),
        "i16" => Some(16),
        "i32" => Some(32),
        "i64" => Some(64),
        "i128" => Some(128),
        _ => None,
    }
}
