//! Body checking: the checker's second pass.
//!
//! Walks every function, class method, and impl method body, inferring a
//! type for each expression node and recording call-site resolutions. The
//! result is a [`TypedAst`]: side tables keyed by [`NodeId`] that the
//! monomorphizer and IR generator consume.
//!
//! Errors accumulate; a failed sub-expression infers the recovery type
//! `Never` so checking can continue without cascading noise.

use rustc_hash::FxHashMap;

use tml_ast as ast;
use tml_ast::{BinOp, ExprKind, NodeId, Pattern, PrimKind, UnOp, Visibility};
use tml_common::{DiagnosticBag, Span};

use crate::env::{ParamScope, TypeEnv};
use crate::error::TypeError;
use crate::methods::{self, DispatchKind, MethodResolution};
use crate::traits;
use crate::ty::{ArraySize, Type, TypeId};

/// Side tables produced by checking.
#[derive(Debug, Default)]
pub struct TypedAst {
    /// The inferred type of every expression node.
    pub expr_types: FxHashMap<NodeId, TypeId>,
    /// Call-site resolutions, keyed by the `Call`/`MethodCall` expression id.
    pub resolutions: FxHashMap<NodeId, MethodResolution>,
    /// Pattern bindings, keyed by the owning expression id: the `when` arm's
    /// body for arm patterns, the `if let`'s own id, the `for` loop's iter
    /// expression id.
    pub pattern_bindings: FxHashMap<NodeId, Vec<(String, TypeId)>>,
}

impl TypedAst {
    pub fn type_of(&self, id: NodeId) -> Option<TypeId> {
        self.expr_types.get(&id).copied()
    }
}

#[derive(Debug, Clone)]
struct LocalInfo {
    ty: TypeId,
    mutable: bool,
}

/// The body checker for one function at a time.
pub struct Checker<'a> {
    pub env: &'a mut TypeEnv,
    pub typed: &'a mut TypedAst,
    pub bag: &'a mut DiagnosticBag,
    scopes: Vec<FxHashMap<String, LocalInfo>>,
    /// Where-clause bounds in scope (function + enclosing impl).
    bounds: Vec<(String, Vec<String>)>,
    param_scope: ParamScope,
    return_type: TypeId,
    is_async: bool,
    /// The class whose method body is being checked, for visibility.
    current_class: Option<String>,
    this_ty: Option<TypeId>,
    loop_depth: u32,
}

impl<'a> Checker<'a> {
    pub fn new(env: &'a mut TypeEnv, typed: &'a mut TypedAst, bag: &'a mut DiagnosticBag) -> Self {
        let unit = env.interner.unit();
        Checker {
            env,
            typed,
            bag,
            scopes: vec![FxHashMap::default()],
            bounds: Vec::new(),
            param_scope: ParamScope::default(),
            return_type: unit,
            is_async: false,
            current_class: None,
            this_ty: None,
            loop_depth: 0,
        }
    }

    fn error(&mut self, err: TypeError) {
        self.bag.push(err.into_diagnostic());
    }

    fn recovery(&mut self) -> TypeId {
        self.env.interner.never()
    }

    // ── scopes ───────────────────────────────────────────────────────

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: TypeId, mutable: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), LocalInfo { ty, mutable });
        }
    }

    fn lookup(&self, name: &str) -> Option<&LocalInfo> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    // ── entry points ─────────────────────────────────────────────────

    /// Check one function body against its registered signature.
    /// `outer_scope` carries the enclosing impl's or class's type parameters.
    pub fn check_function(
        &mut self,
        func: &ast::Function,
        this_ty: Option<TypeId>,
        owner_class: Option<&str>,
        extra_bounds: &[(String, Vec<String>)],
        outer_scope: &ParamScope,
    ) {
        let Some(body) = &func.body else { return };

        self.scopes = vec![FxHashMap::default()];
        self.param_scope = outer_scope.extended(&func.type_params);
        self.bounds = extra_bounds.to_vec();
        for clause in &func.where_clauses {
            self.bounds
                .push((clause.param.clone(), clause.bounds.clone()));
        }
        // Inline bounds (`T: Behavior` in the parameter list) count too.
        for tp in &func.type_params {
            if let ast::TypeParam::Type { name, bounds } = tp {
                if !bounds.is_empty() {
                    self.bounds.push((name.clone(), bounds.clone()));
                }
            }
        }
        self.is_async = func.is_async;
        self.current_class = owner_class.map(String::from);
        self.this_ty = this_ty;

        if let Some(this) = this_ty {
            self.declare("this", this, func.this == Some(ast::ThisKind::MutRef));
        }
        let mut param_tys = Vec::new();
        for param in &func.params {
            match self.env.resolve_type_expr(&param.ty, &self.param_scope.clone()) {
                Ok(ty) => param_tys.push((param.name.clone(), ty)),
                Err(err) => {
                    self.error(err);
                    let never = self.recovery();
                    param_tys.push((param.name.clone(), never));
                }
            }
        }
        for (name, ty) in param_tys {
            self.declare(&name, ty, false);
        }

        self.return_type = match &func.return_type {
            Some(ty) => match self.env.resolve_type_expr(ty, &self.param_scope.clone()) {
                Ok(id) => id,
                Err(err) => {
                    self.error(err);
                    self.recovery()
                }
            },
            None => self.env.interner.unit(),
        };

        let body_ty = self.check_block(body);
        // A trailing expression is an implicit return.
        if body.trailing.is_some() {
            self.require_assignable(body_ty, self.return_type, "return value", body.span);
        }
    }

    // ── blocks and statements ────────────────────────────────────────

    fn check_block(&mut self, block: &ast::Block) -> TypeId {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        let ty = match &block.trailing {
            Some(expr) => self.infer_expr(expr),
            None => self.env.interner.unit(),
        };
        self.pop_scope();
        ty
    }

    fn check_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::Let {
                name,
                mutable,
                ty,
                value,
                span,
            } => {
                let annotated = ty.as_ref().and_then(|t| {
                    match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                        Ok(id) => Some(id),
                        Err(err) => {
                            self.error(err);
                            None
                        }
                    }
                });
                let value_ty = self.infer_expr_with(value, annotated);
                let bound_ty = match annotated {
                    Some(expected) => {
                        self.require_assignable(value_ty, expected, "let binding", *span);
                        expected
                    }
                    None => value_ty,
                };
                self.declare(name, bound_ty, *mutable);
            }
            ast::Stmt::Expr(expr) => {
                self.infer_expr(expr);
            }
            ast::Stmt::Assign {
                target,
                op: _,
                value,
                span,
            } => {
                let target_ty = self.infer_assign_target(target);
                let value_ty = self.infer_expr_with(value, Some(target_ty));
                self.require_assignable(value_ty, target_ty, "assignment", *span);
            }
            ast::Stmt::Return { value, span } => {
                let found = match value {
                    Some(expr) => self.infer_expr_with(expr, Some(self.return_type)),
                    None => self.env.interner.unit(),
                };
                self.require_assignable(found, self.return_type, "return value", *span);
            }
            ast::Stmt::Break { span } | ast::Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    self.error(TypeError::Mismatch {
                        expected: "a loop context".into(),
                        found: "top level".into(),
                        context: "break/continue".into(),
                        span: *span,
                    });
                }
            }
            ast::Stmt::While { cond, body, .. } => {
                let cond_ty = self.infer_expr(cond);
                self.require_bool(cond_ty, cond.span);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            ast::Stmt::Loop { body, .. } => {
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            ast::Stmt::For {
                pattern,
                iter,
                body,
                span,
            } => {
                let elem_ty = self.for_element_type(iter, *span);
                let mut bindings = Vec::new();
                self.check_pattern(pattern, elem_ty, &mut bindings);
                self.typed.pattern_bindings.insert(iter.id, bindings.clone());
                self.loop_depth += 1;
                self.push_scope();
                for (name, ty) in &bindings {
                    self.declare(name, *ty, false);
                }
                self.check_block(body);
                self.pop_scope();
                self.loop_depth -= 1;
            }
            ast::Stmt::Throw { value, .. } => {
                self.infer_expr(value);
            }
        }
    }

    /// The element type produced by a `for` iteration source: a range, a
    /// collection with `len`/`get`, or an `Iterator` behavior implementor.
    fn for_element_type(&mut self, iter: &ast::Expr, span: Span) -> TypeId {
        if let ExprKind::Range { start, end, .. } = &iter.kind {
            let start_ty = self.infer_expr(start);
            let end_ty = self.infer_expr(end);
            self.require_assignable(end_ty, start_ty, "range bounds", span);
            self.typed.expr_types.insert(iter.id, start_ty);
            return start_ty;
        }
        let iter_ty = self.infer_expr(iter);
        let iter_ty = self.env.expand_alias(iter_ty);
        let deref = self.env.interner.deref_all(iter_ty);
        match self.env.interner.get(deref).clone() {
            Type::Named { name, args, .. } if name == "List" && args.len() == 1 => args[0],
            Type::Array { element, .. } | Type::Slice { element } => element,
            _ => {
                // Arbitrary iterators: `next()` must resolve and return
                // `Maybe[Item]`.
                match methods::resolve_method(self.env, deref, "next", &[], &[], &self.bounds, span)
                {
                    Ok(resolution) => {
                        let ret = resolution.return_type;
                        match self.env.interner.get(ret).clone() {
                            Type::Named { name, args, .. }
                                if name == "Maybe" && args.len() == 1 =>
                            {
                                args[0]
                            }
                            _ => {
                                self.error(TypeError::Mismatch {
                                    expected: "Maybe[Item] from next()".into(),
                                    found: self.env.interner.display(ret),
                                    context: "for iteration".into(),
                                    span,
                                });
                                self.recovery()
                            }
                        }
                    }
                    Err(err) => {
                        self.error(err);
                        self.recovery()
                    }
                }
            }
        }
    }

    /// Infer the type of an assignment target and validate mutability.
    fn infer_assign_target(&mut self, target: &ast::Expr) -> TypeId {
        match &target.kind {
            ExprKind::Ident(name) => {
                if let Some(info) = self.lookup(name).cloned() {
                    if !info.mutable {
                        self.error(TypeError::Mismatch {
                            expected: "a mutable binding".into(),
                            found: format!("immutable '{name}'"),
                            context: "assignment".into(),
                            span: target.span,
                        });
                    }
                    self.typed.expr_types.insert(target.id, info.ty);
                    return info.ty;
                }
                self.error(TypeError::UnboundVariable {
                    name: name.clone(),
                    span: target.span,
                });
                self.recovery()
            }
            // Field stores, index stores, deref stores: the target type is
            // just the expression type; codegen picks the store form.
            _ => self.infer_expr(target),
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn infer_expr(&mut self, expr: &ast::Expr) -> TypeId {
        self.infer_expr_with(expr, None)
    }

    /// Infer with an optional expected type, used to give literals and
    /// empty constructors (`Maybe::Nothing`) their contextual type.
    pub fn infer_expr_with(&mut self, expr: &ast::Expr, expected: Option<TypeId>) -> TypeId {
        let ty = self.infer_expr_inner(expr, expected);
        self.typed.expr_types.insert(expr.id, ty);
        ty
    }

    fn infer_expr_inner(&mut self, expr: &ast::Expr, expected: Option<TypeId>) -> TypeId {
        match &expr.kind {
            ExprKind::IntLit(_) => {
                if let Some(exp) = expected {
                    if let Some(kind) = self.env.interner.as_prim(exp) {
                        if kind.is_integer() || kind.is_float() {
                            return exp;
                        }
                    }
                }
                self.env.interner.prim(PrimKind::I32)
            }
            ExprKind::FloatLit(_) => {
                if let Some(exp) = expected {
                    if self.env.interner.is_prim(exp, PrimKind::F32) {
                        return exp;
                    }
                }
                self.env.interner.prim(PrimKind::F64)
            }
            ExprKind::BoolLit(_) => self.env.interner.bool(),
            ExprKind::CharLit(_) => self.env.interner.prim(PrimKind::Char),
            ExprKind::StrLit(_) => self.env.interner.str(),
            ExprKind::UnitLit => self.env.interner.unit(),

            ExprKind::Ident(name) => self.infer_ident(name, expr.span),
            ExprKind::Path(segments) => self.infer_path(segments, expected, expr.span),

            ExprKind::Call {
                callee,
                type_args,
                args,
            } => self.infer_call(expr, callee, type_args, args, expected),

            ExprKind::MethodCall {
                receiver,
                method,
                type_args,
                args,
            } => self.infer_method_call(expr, receiver, method, type_args, args),

            ExprKind::FieldAccess { receiver, field } => {
                let receiver_ty = self.infer_expr(receiver);
                self.field_type(receiver_ty, field, expr.span)
            }

            ExprKind::Index { receiver, index } => {
                let receiver_ty = self.infer_expr(receiver);
                let index_ty = self.infer_expr(index);
                let is_int = self
                    .env
                    .interner
                    .as_prim(index_ty)
                    .map(PrimKind::is_integer)
                    .unwrap_or(false);
                if !is_int {
                    self.error(TypeError::Mismatch {
                        expected: "an integer index".into(),
                        found: self.env.interner.display(index_ty),
                        context: "indexing".into(),
                        span: index.span,
                    });
                }
                let deref = self.env.interner.deref_all(receiver_ty);
                match self.env.interner.get(deref).clone() {
                    Type::Array { element, .. } | Type::Slice { element } => element,
                    Type::Named { name, args, .. } if name == "List" && args.len() == 1 => args[0],
                    _ => {
                        self.error(TypeError::Mismatch {
                            expected: "an indexable type".into(),
                            found: self.env.interner.display(receiver_ty),
                            context: "indexing".into(),
                            span: expr.span,
                        });
                        self.recovery()
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, expr.span),

            ExprKind::Unary { op, operand } => {
                let ty = self.infer_expr_with(operand, expected);
                match op {
                    UnOp::Neg => {
                        let ok = self
                            .env
                            .interner
                            .as_prim(ty)
                            .map(|k| k.is_integer() || k.is_float())
                            .unwrap_or(false);
                        if !ok {
                            self.error(TypeError::Mismatch {
                                expected: "a numeric type".into(),
                                found: self.env.interner.display(ty),
                                context: "negation".into(),
                                span: expr.span,
                            });
                        }
                        ty
                    }
                    UnOp::Not => {
                        self.require_bool(ty, operand.span);
                        self.env.interner.bool()
                    }
                }
            }

            ExprKind::Cast { expr: inner, ty } => {
                self.infer_expr(inner);
                match self.env.resolve_type_expr(ty, &self.param_scope.clone()) {
                    Ok(id) => id,
                    Err(err) => {
                        self.error(err);
                        self.recovery()
                    }
                }
            }

            ExprKind::Reference { is_mut, expr: inner } => {
                let inner_ty = self.infer_expr(inner);
                self.env.interner.intern(Type::Ref {
                    is_mut: *is_mut,
                    inner: inner_ty,
                })
            }

            ExprKind::Deref(inner) => {
                let inner_ty = self.infer_expr(inner);
                match self.env.interner.get(inner_ty).clone() {
                    Type::Ref { inner, .. } | Type::Ptr { inner, .. } => inner,
                    _ => {
                        self.error(TypeError::Mismatch {
                            expected: "a reference or pointer".into(),
                            found: self.env.interner.display(inner_ty),
                            context: "dereference".into(),
                            span: expr.span,
                        });
                        self.recovery()
                    }
                }
            }

            ExprKind::StructLit {
                name,
                type_args,
                fields,
            } => self.infer_struct_lit(name, type_args, fields, expected, expr.span),

            ExprKind::TupleLit(elems) => {
                let tys: Vec<TypeId> = elems.iter().map(|e| self.infer_expr(e)).collect();
                self.env.interner.intern(Type::Tuple(tys))
            }

            ExprKind::ArrayLit(elems) => {
                let mut elem_ty = None;
                for elem in elems {
                    let ty = self.infer_expr_with(elem, elem_ty);
                    match elem_ty {
                        None => elem_ty = Some(ty),
                        Some(first) => {
                            self.require_assignable(ty, first, "array literal", elem.span);
                        }
                    }
                }
                let element = elem_ty.unwrap_or_else(|| self.recovery());
                self.env.interner.intern(Type::Array {
                    element,
                    size: ArraySize::Const(elems.len() as u64),
                })
            }

            ExprKind::ArrayRepeat { elem, count } => {
                let element = self.infer_expr(elem);
                let size = match &count.kind {
                    ExprKind::IntLit(v) if *v >= 0 => ArraySize::Const(*v as u64),
                    ExprKind::Ident(name) if self.param_scope.has_const_param(name) => {
                        ArraySize::Param(name.clone())
                    }
                    _ => {
                        self.error(TypeError::BadConstExpr { span: count.span });
                        ArraySize::Const(0)
                    }
                };
                self.infer_expr(count);
                self.env.interner.intern(Type::Array { element, size })
            }

            ExprKind::Closure {
                params,
                return_type,
                body,
            } => self.infer_closure(params, return_type.as_ref(), body, expected),

            ExprKind::Range { start, end, .. } => {
                let start_ty = self.infer_expr(start);
                let end_ty = self.infer_expr(end);
                self.require_assignable(end_ty, start_ty, "range bounds", expr.span);
                self.env.interner.named("Range", vec![start_ty])
            }

            ExprKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond_ty = self.infer_expr(cond);
                self.require_bool(cond_ty, cond.span);
                let then_ty = self.check_block(then_block);
                match else_block {
                    Some(else_expr) => {
                        let else_ty = self.infer_expr_with(else_expr, Some(then_ty));
                        self.join_branches(then_ty, else_ty)
                    }
                    None => self.env.interner.unit(),
                }
            }

            ExprKind::IfLet {
                pattern,
                value,
                then_block,
                else_block,
            } => {
                let value_ty = self.infer_expr(value);
                let mut bindings = Vec::new();
                self.check_pattern(pattern, value_ty, &mut bindings);
                self.typed.pattern_bindings.insert(expr.id, bindings.clone());
                self.push_scope();
                for (name, ty) in &bindings {
                    self.declare(name, *ty, false);
                }
                let then_ty = self.check_block(then_block);
                self.pop_scope();
                match else_block {
                    Some(else_expr) => {
                        let else_ty = self.infer_expr_with(else_expr, Some(then_ty));
                        self.join_branches(then_ty, else_ty)
                    }
                    None => self.env.interner.unit(),
                }
            }

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond_ty = self.infer_expr(cond);
                self.require_bool(cond_ty, cond.span);
                let then_ty = self.infer_expr_with(then_expr, expected);
                let else_ty = self.infer_expr_with(else_expr, Some(then_ty));
                self.require_assignable(else_ty, then_ty, "ternary branches", expr.span);
                then_ty
            }

            ExprKind::When { scrutinee, arms } => {
                let scrutinee_ty = self.infer_expr(scrutinee);
                let mut result: Option<TypeId> = None;
                for arm in arms {
                    let mut bindings = Vec::new();
                    self.check_pattern(&arm.pattern, scrutinee_ty, &mut bindings);
                    self.typed
                        .pattern_bindings
                        .insert(arm.body.id, bindings.clone());
                    self.push_scope();
                    for (name, ty) in &bindings {
                        self.declare(name, *ty, false);
                    }
                    if let Some(guard) = &arm.guard {
                        let guard_ty = self.infer_expr(guard);
                        self.require_bool(guard_ty, guard.span);
                    }
                    let body_ty = self.infer_expr_with(&arm.body, result);
                    self.pop_scope();
                    result = Some(match result {
                        None => body_ty,
                        Some(prev) => self.join_branches(prev, body_ty),
                    });
                }
                result.unwrap_or_else(|| self.env.interner.unit())
            }

            ExprKind::Block(block) => self.check_block(block),

            ExprKind::Await(inner) => {
                let inner_ty = self.infer_expr(inner);
                if !self.is_async {
                    self.error(TypeError::Mismatch {
                        expected: "an async function".into(),
                        found: "a sync context".into(),
                        context: "await".into(),
                        span: expr.span,
                    });
                }
                match self.env.interner.get(inner_ty).clone() {
                    Type::Named { name, args, .. } if name == "Future" && args.len() == 1 => {
                        args[0]
                    }
                    _ => inner_ty,
                }
            }
        }
    }

    fn infer_ident(&mut self, name: &str, span: Span) -> TypeId {
        if let Some(info) = self.lookup(name) {
            return info.ty;
        }
        if name == "this" {
            if let Some(this) = self.this_ty {
                return this;
            }
        }
        // A free function referenced as a value.
        if let Some(def) = self.env.functions.get(name) {
            let params = def.sig.params.clone();
            let return_type = def.sig.return_type;
            return self.env.interner.intern(Type::Func {
                params,
                return_type,
            });
        }
        self.error(TypeError::UnboundVariable {
            name: name.to_string(),
            span,
        });
        self.recovery()
    }

    /// `A::B` in value position: a unit enum variant, an `Ordering` constant,
    /// or a class static field.
    fn infer_path(&mut self, segments: &[String], expected: Option<TypeId>, span: Span) -> TypeId {
        if segments.len() == 2 {
            let (head, tail) = (&segments[0], &segments[1]);

            if let Some(enum_def) = self.env.enums.get(head).cloned() {
                if let Some((_, variant)) = enum_def.variant(tail) {
                    if !variant.payload.is_empty() {
                        self.error(TypeError::ArityMismatch {
                            name: format!("{head}::{tail}"),
                            expected: variant.payload.len(),
                            found: 0,
                            span,
                        });
                    }
                    return self.enum_type_from_context(head, &enum_def.type_params, expected);
                }
                self.error(TypeError::UnknownVariant {
                    enum_name: head.clone(),
                    variant: tail.clone(),
                    span,
                });
                return self.recovery();
            }

            // Builtin sums in unit-variant position.
            match (head.as_str(), tail.as_str()) {
                ("Maybe", "Nothing") => {
                    if let Some(exp) = expected {
                        if let Type::Named { name, .. } = self.env.interner.get(exp) {
                            if name == "Maybe" {
                                return exp;
                            }
                        }
                    }
                    let never = self.env.interner.never();
                    return self.env.interner.maybe(never);
                }
                ("Ordering", "Less") | ("Ordering", "Equal") | ("Ordering", "Greater") => {
                    return self.env.interner.named("Ordering", vec![]);
                }
                _ => {}
            }

            if let Some(class) = self.env.classes.get(head).cloned() {
                if let Some(field) = class.static_field(tail) {
                    self.check_visibility(field.visibility, head, tail, span);
                    return field.ty;
                }
            }
        }
        self.error(TypeError::UnboundVariable {
            name: segments.join("::"),
            span,
        });
        self.recovery()
    }

    /// The enum type for a variant reference, preferring the expected type's
    /// arguments when the enum is generic.
    fn enum_type_from_context(
        &mut self,
        enum_name: &str,
        type_params: &[String],
        expected: Option<TypeId>,
    ) -> TypeId {
        if let Some(exp) = expected {
            if let Type::Named { name, .. } = self.env.interner.get(exp) {
                if name == enum_name {
                    return exp;
                }
            }
        }
        let args: Vec<TypeId> = type_params
            .iter()
            .map(|p| self.env.interner.intern(Type::Generic(p.clone())))
            .collect();
        self.env.interner.named(enum_name, args)
    }

    fn infer_call(
        &mut self,
        expr: &ast::Expr,
        callee: &ast::Expr,
        type_args: &[ast::TypeExpr],
        args: &[ast::Expr],
        expected: Option<TypeId>,
    ) -> TypeId {
        let explicit: Vec<TypeId> = type_args
            .iter()
            .filter_map(
                |t| match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        self.error(err);
                        None
                    }
                },
            )
            .collect();

        match &callee.kind {
            // Free function call.
            ExprKind::Ident(name) if self.lookup(name).is_none() => {
                if let Some(def) = self.env.functions.get(name).cloned() {
                    return self.check_free_call(expr, name, &def, &explicit, args);
                }
                // Compiler intrinsics resolve by bare name; the generator
                // lowers them to fixed IR sequences.
                let arg_tys: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();
                if let Some(sig) = crate::builtins::intrinsic_signature(
                    &mut self.env.interner,
                    name,
                    &explicit,
                    &arg_tys,
                ) {
                    let mut subst = FxHashMap::default();
                    if let Some(&t) = explicit.first() {
                        subst.insert("T".to_string(), t);
                    }
                    let unit = self.env.interner.unit();
                    self.typed.resolutions.insert(
                        expr.id,
                        MethodResolution {
                            target: name.clone(),
                            kind: DispatchKind::Builtin,
                            params: sig.params,
                            return_type: sig.return_type,
                            substitution: subst,
                            receiver: unit,
                            visibility: None,
                        },
                    );
                    return sig.return_type;
                }
                self.error(TypeError::UnboundVariable {
                    name: name.clone(),
                    span: callee.span,
                });
                self.recovery()
            }

            // `Type::method(args)` or `Enum::Variant(payload)`.
            ExprKind::Path(segments) if segments.len() == 2 => {
                let (head, tail) = (segments[0].clone(), segments[1].clone());
                if let Some(enum_def) = self.env.enums.get(&head).cloned() {
                    if let Some((_, variant)) = enum_def.variant(&tail) {
                        let variant = variant.clone();
                        return self.check_variant_ctor(
                            &head, &enum_def.type_params, &variant.payload, args, expected,
                            expr.span,
                        );
                    }
                }
                // Builtin sum constructors.
                match (head.as_str(), tail.as_str()) {
                    ("Maybe", "Just") if args.len() == 1 => {
                        let inner = self.infer_expr(&args[0]);
                        return self.env.interner.maybe(inner);
                    }
                    ("Outcome", "Ok") if args.len() == 1 => {
                        let ok = self.infer_expr(&args[0]);
                        let err = self.expected_outcome_err(expected);
                        return self.env.interner.outcome(ok, err);
                    }
                    ("Outcome", "Err") if args.len() == 1 => {
                        let err = self.infer_expr(&args[0]);
                        let ok = self.expected_outcome_ok(expected);
                        return self.env.interner.outcome(ok, err);
                    }
                    _ => {}
                }
                let arg_tys: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();
                match methods::resolve_static_method(
                    self.env, &head, &explicit, &tail, &arg_tys, expr.span,
                ) {
                    Ok(resolution) => {
                        self.check_call_args(&resolution, args, &arg_tys);
                        let ret = resolution.return_type;
                        self.typed.resolutions.insert(expr.id, resolution);
                        ret
                    }
                    Err(err) => {
                        self.error(err);
                        self.recovery()
                    }
                }
            }

            // Indirect call through a function-typed value.
            _ => {
                let callee_ty = self.infer_expr(callee);
                match self.env.interner.get(callee_ty).clone() {
                    Type::Func {
                        params,
                        return_type,
                    }
                    | Type::Closure {
                        params,
                        return_type,
                    } => {
                        if params.len() != args.len() {
                            self.error(TypeError::ArityMismatch {
                                name: "call".into(),
                                expected: params.len(),
                                found: args.len(),
                                span: expr.span,
                            });
                        }
                        for (arg, param) in args.iter().zip(&params) {
                            let arg_ty = self.infer_expr_with(arg, Some(*param));
                            self.require_assignable(arg_ty, *param, "argument", arg.span);
                        }
                        return_type
                    }
                    _ => {
                        self.error(TypeError::NotCallable {
                            found: self.env.interner.display(callee_ty),
                            span: callee.span,
                        });
                        for arg in args {
                            self.infer_expr(arg);
                        }
                        self.recovery()
                    }
                }
            }
        }
    }

    fn expected_outcome_err(&mut self, expected: Option<TypeId>) -> TypeId {
        if let Some(exp) = expected {
            if let Type::Named { name, args, .. } = self.env.interner.get(exp).clone() {
                if name == "Outcome" && args.len() == 2 {
                    return args[1];
                }
            }
        }
        self.env.interner.never()
    }

    fn expected_outcome_ok(&mut self, expected: Option<TypeId>) -> TypeId {
        if let Some(exp) = expected {
            if let Type::Named { name, args, .. } = self.env.interner.get(exp).clone() {
                if name == "Outcome" && args.len() == 2 {
                    return args[0];
                }
            }
        }
        self.env.interner.never()
    }

    fn check_variant_ctor(
        &mut self,
        enum_name: &str,
        type_params: &[String],
        payload: &[TypeId],
        args: &[ast::Expr],
        expected: Option<TypeId>,
        span: Span,
    ) -> TypeId {
        if payload.len() != args.len() {
            self.error(TypeError::ArityMismatch {
                name: enum_name.to_string(),
                expected: payload.len(),
                found: args.len(),
                span,
            });
        }
        // Infer the enum's type arguments from the payload values.
        let mut subst: FxHashMap<String, TypeId> = FxHashMap::default();
        if let Some(exp) = expected {
            if let Type::Named { name, args: exp_args, .. } = self.env.interner.get(exp).clone() {
                if name == enum_name {
                    for (param, arg) in type_params.iter().zip(exp_args) {
                        subst.insert(param.clone(), arg);
                    }
                }
            }
        }
        for (payload_ty, arg) in payload.iter().zip(args) {
            let expected_arg = {
                let applied =
                    self.env
                        .interner
                        .substitute(*payload_ty, &subst, &FxHashMap::default());
                if self.env.interner.contains_generic(applied) {
                    None
                } else {
                    Some(applied)
                }
            };
            let arg_ty = self.infer_expr_with(arg, expected_arg);
            let mut inferred = FxHashMap::default();
            self.env
                .interner
                .infer_type_args(*payload_ty, arg_ty, &mut inferred);
            for (name, ty) in inferred {
                if type_params.contains(&name) {
                    subst.entry(name).or_insert(ty);
                }
            }
            if let Some(exp) = expected_arg {
                self.require_assignable(arg_ty, exp, "variant payload", arg.span);
            }
        }
        let final_args: Vec<TypeId> = type_params
            .iter()
            .map(|p| {
                subst
                    .get(p)
                    .copied()
                    .unwrap_or_else(|| self.env.interner.intern(Type::Generic(p.clone())))
            })
            .collect();
        self.env.interner.named(enum_name, final_args)
    }

    fn check_free_call(
        &mut self,
        expr: &ast::Expr,
        name: &str,
        def: &crate::env::FuncDef,
        explicit: &[TypeId],
        args: &[ast::Expr],
    ) -> TypeId {
        if def.sig.params.len() != args.len() {
            self.error(TypeError::ArityMismatch {
                name: name.to_string(),
                expected: def.sig.params.len(),
                found: args.len(),
                span: expr.span,
            });
        }

        let mut subst: FxHashMap<String, TypeId> = FxHashMap::default();
        for (param, arg) in def.sig.type_params.iter().zip(explicit) {
            subst.insert(param.clone(), *arg);
        }

        let mut arg_tys = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let expected_param = def.sig.params.get(i).map(|p| {
                self.env
                    .interner
                    .substitute(*p, &subst, &FxHashMap::default())
            });
            let expected_param = expected_param.filter(|p| !self.env.interner.contains_generic(*p));
            let arg_ty = self.infer_expr_with(arg, expected_param);
            arg_tys.push(arg_ty);
            if let Some(param_ty) = def.sig.params.get(i) {
                let mut inferred = FxHashMap::default();
                self.env
                    .interner
                    .infer_type_args(*param_ty, arg_ty, &mut inferred);
                for (n, t) in inferred {
                    if def.sig.type_params.contains(&n) {
                        subst.entry(n).or_insert(t);
                    }
                }
            }
        }

        // Behavior satisfaction for the function's bounds.
        let mut clauses: Vec<(String, Vec<String>)> = def
            .func
            .where_clauses
            .iter()
            .map(|w| (w.param.clone(), w.bounds.clone()))
            .collect();
        for tp in &def.func.type_params {
            if let ast::TypeParam::Type { name, bounds } = tp {
                if !bounds.is_empty() {
                    clauses.push((name.clone(), bounds.clone()));
                }
            }
        }
        for err in traits::check_where_clauses(self.env, &clauses, &subst, expr.span) {
            self.error(err);
        }

        // Validate argument types against the substituted parameters.
        for ((param_ty, arg_ty), arg) in def.sig.params.iter().zip(&arg_tys).zip(args) {
            let concrete = self
                .env
                .interner
                .substitute(*param_ty, &subst, &FxHashMap::default());
            if !self.env.interner.contains_generic(concrete) {
                self.require_assignable(*arg_ty, concrete, "argument", arg.span);
            }
        }

        let return_type =
            self.env
                .interner
                .substitute(def.sig.return_type, &subst, &FxHashMap::default());

        let params = def
            .sig
            .params
            .iter()
            .map(|p| {
                self.env
                    .interner
                    .substitute(*p, &subst, &FxHashMap::default())
            })
            .collect();
        let unit = self.env.interner.unit();
        self.typed.resolutions.insert(
            expr.id,
            MethodResolution {
                target: name.to_string(),
                kind: DispatchKind::Static,
                params,
                return_type,
                substitution: subst,
                receiver: unit,
                visibility: None,
            },
        );
        return_type
    }

    fn infer_method_call(
        &mut self,
        expr: &ast::Expr,
        receiver: &ast::Expr,
        method: &str,
        type_args: &[ast::TypeExpr],
        args: &[ast::Expr],
    ) -> TypeId {
        let explicit: Vec<TypeId> = type_args
            .iter()
            .filter_map(
                |t| match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        self.error(err);
                        None
                    }
                },
            )
            .collect();

        // Static receivers: a bare type name that is not a local variable.
        if let ExprKind::Ident(name) = &receiver.kind {
            let is_local = self.lookup(name).is_some();
            let is_type_name = PrimKind::from_name(name).is_some()
                || self.env.classes.contains_key(name)
                || self.env.structs.contains_key(name)
                || self.env.enums.contains_key(name)
                || name == "List"
                || name == "StringBuilder";
            if !is_local && is_type_name {
                let arg_tys: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();
                match methods::resolve_static_method(
                    self.env, name, &explicit, method, &arg_tys, expr.span,
                ) {
                    Ok(resolution) => {
                        self.check_call_args(&resolution, args, &arg_tys);
                        let receiver_ty = resolution.receiver;
                        self.typed.expr_types.insert(receiver.id, receiver_ty);
                        let ret = resolution.return_type;
                        self.typed.resolutions.insert(expr.id, resolution);
                        return ret;
                    }
                    Err(err) => {
                        self.error(err);
                        let recovery = self.recovery();
                        self.typed.expr_types.insert(receiver.id, recovery);
                        return recovery;
                    }
                }
            }
        }

        let receiver_ty = self.infer_expr(receiver);
        let arg_tys: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();
        let bounds = self.bounds.clone();
        match methods::resolve_method(
            self.env,
            receiver_ty,
            method,
            &arg_tys,
            &explicit,
            &bounds,
            expr.span,
        ) {
            Ok(resolution) => {
                if let Some(vis) = resolution.visibility {
                    self.check_member_visibility(vis, &resolution.target, expr.span);
                }
                self.check_call_args(&resolution, args, &arg_tys);
                let ret = resolution.return_type;
                self.typed.resolutions.insert(expr.id, resolution);
                ret
            }
            Err(err) => {
                self.error(err);
                self.recovery()
            }
        }
    }

    /// Validate already-inferred argument types against a resolution's
    /// substituted parameters.
    fn check_call_args(
        &mut self,
        resolution: &MethodResolution,
        args: &[ast::Expr],
        arg_tys: &[TypeId],
    ) {
        if resolution.params.len() != arg_tys.len() {
            // Builtin tables validate arity through their own codes; user
            // methods were already checked. Nothing further to do here.
            return;
        }
        for ((param, arg_ty), arg) in resolution.params.iter().zip(arg_tys).zip(args) {
            if self.env.interner.contains_generic(*param) {
                continue;
            }
            self.require_assignable(*arg_ty, *param, "argument", arg.span);
        }
    }

    fn infer_struct_lit(
        &mut self,
        name: &str,
        type_args: &[ast::TypeExpr],
        fields: &[(String, ast::Expr)],
        expected: Option<TypeId>,
        span: Span,
    ) -> TypeId {
        let Some(def) = self.env.structs.get(name).cloned() else {
            self.error(TypeError::UnknownType {
                name: name.to_string(),
                span,
            });
            for (_, value) in fields {
                self.infer_expr(value);
            }
            return self.recovery();
        };

        let explicit: Vec<TypeId> = type_args
            .iter()
            .filter_map(
                |t| match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        self.error(err);
                        None
                    }
                },
            )
            .collect();

        let mut subst: FxHashMap<String, TypeId> = FxHashMap::default();
        for (param, arg) in def.type_params.iter().zip(&explicit) {
            subst.insert(param.clone(), *arg);
        }
        if let Some(exp) = expected {
            if let Type::Named { name: n, args, .. } = self.env.interner.get(exp).clone() {
                if n == *name {
                    for (param, arg) in def.type_params.iter().zip(args) {
                        subst.entry(param.clone()).or_insert(arg);
                    }
                }
            }
        }

        if fields.len() != def.fields.len() {
            self.error(TypeError::ArityMismatch {
                name: name.to_string(),
                expected: def.fields.len(),
                found: fields.len(),
                span,
            });
        }

        for (field_name, value) in fields {
            let Some(index) = def.field_index(field_name) else {
                self.error(TypeError::UnknownField {
                    ty: name.to_string(),
                    field: field_name.clone(),
                    span: value.span,
                });
                self.infer_expr(value);
                continue;
            };
            let declared = def.fields[index].1;
            let applied = self
                .env
                .interner
                .substitute(declared, &subst, &FxHashMap::default());
            let expected_field = if self.env.interner.contains_generic(applied) {
                None
            } else {
                Some(applied)
            };
            let value_ty = self.infer_expr_with(value, expected_field);
            let mut inferred = FxHashMap::default();
            self.env
                .interner
                .infer_type_args(declared, value_ty, &mut inferred);
            for (n, t) in inferred {
                if def.type_params.contains(&n) {
                    subst.entry(n).or_insert(t);
                }
            }
            if let Some(exp) = expected_field {
                self.require_assignable(value_ty, exp, "struct field", value.span);
            }
        }

        let args: Vec<TypeId> = def
            .type_params
            .iter()
            .map(|p| {
                subst
                    .get(p)
                    .copied()
                    .unwrap_or_else(|| self.env.interner.intern(Type::Generic(p.clone())))
            })
            .collect();
        self.env.interner.named(name, args)
    }

    fn infer_closure(
        &mut self,
        params: &[(String, Option<ast::TypeExpr>)],
        return_type: Option<&ast::TypeExpr>,
        body: &ast::Expr,
        expected: Option<TypeId>,
    ) -> TypeId {
        // Parameter types come from annotations, else from the expected
        // function type.
        let expected_params: Vec<Option<TypeId>> = match expected.map(|e| self.env.interner.get(e).clone())
        {
            Some(Type::Func { params: ps, .. }) | Some(Type::Closure { params: ps, .. }) => {
                ps.iter().map(|p| Some(*p)).collect()
            }
            _ => vec![None; params.len()],
        };

        self.push_scope();
        let mut param_tys = Vec::with_capacity(params.len());
        for (i, (name, annotation)) in params.iter().enumerate() {
            let ty = match annotation {
                Some(t) => match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                    Ok(id) => id,
                    Err(err) => {
                        self.error(err);
                        self.recovery()
                    }
                },
                None => match expected_params.get(i).copied().flatten() {
                    Some(id) => id,
                    None => {
                        self.error(TypeError::InferenceFailure { span: body.span });
                        self.recovery()
                    }
                },
            };
            self.declare(name, ty, false);
            param_tys.push(ty);
        }

        let declared_ret = return_type.and_then(|t| {
            match self.env.resolve_type_expr(t, &self.param_scope.clone()) {
                Ok(id) => Some(id),
                Err(err) => {
                    self.error(err);
                    None
                }
            }
        });
        let body_ty = self.infer_expr_with(body, declared_ret);
        self.pop_scope();

        let ret = declared_ret.unwrap_or(body_ty);
        self.env.interner.intern(Type::Closure {
            params: param_tys,
            return_type: ret,
        })
    }

    fn infer_binary(
        &mut self,
        op: BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        span: Span,
    ) -> TypeId {
        if op.is_short_circuit() {
            let lhs_ty = self.infer_expr(lhs);
            let rhs_ty = self.infer_expr(rhs);
            self.require_bool(lhs_ty, lhs.span);
            self.require_bool(rhs_ty, rhs.span);
            return self.env.interner.bool();
        }

        let lhs_ty = self.infer_expr(lhs);
        let rhs_ty = self.infer_expr_with(rhs, Some(lhs_ty));

        if op.is_comparison() {
            self.require_assignable(rhs_ty, lhs_ty, "comparison operands", span);
            return self.env.interner.bool();
        }

        // String concatenation.
        if op == BinOp::Add && self.env.interner.is_prim(lhs_ty, PrimKind::Str) {
            self.require_assignable(rhs_ty, lhs_ty, "string concatenation", span);
            return lhs_ty;
        }

        let lhs_kind = self.env.interner.as_prim(lhs_ty);
        let ok = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => lhs_kind
                .map(|k| k.is_integer() || k.is_float())
                .unwrap_or(false),
            _ if op.is_bitwise() => lhs_kind.map(PrimKind::is_integer).unwrap_or(false),
            _ => false,
        };
        if !ok {
            self.error(TypeError::Mismatch {
                expected: "a numeric operand".into(),
                found: self.env.interner.display(lhs_ty),
                context: format!("{op:?}"),
                span,
            });
            return self.recovery();
        }
        self.require_assignable(rhs_ty, lhs_ty, "binary operands", span);
        lhs_ty
    }

    /// The type of `receiver.field`, transiting auto-deref chains.
    fn field_type(&mut self, receiver_ty: TypeId, field: &str, span: Span) -> TypeId {
        let expanded = self.env.expand_alias(receiver_ty);
        let mut current = self.env.interner.deref_all(expanded);

        // A field chain may transit any number of smart-pointer layers.
        loop {
            match self.env.interner.get(current).clone() {
                Type::Named { name, args, .. } => {
                    if let Some(def) = self.env.structs.get(&name).cloned() {
                        if let Some(index) = def.field_index(field) {
                            let mut subst = FxHashMap::default();
                            for (param, arg) in def.type_params.iter().zip(args) {
                                subst.insert(param.clone(), arg);
                            }
                            return self.env.interner.substitute(
                                def.fields[index].1,
                                &subst,
                                &FxHashMap::default(),
                            );
                        }
                    }
                    if let Some(inner) = self.env.auto_deref_inner(current) {
                        current = self.env.interner.deref_all(inner);
                        continue;
                    }
                    break;
                }
                Type::Class { name } => {
                    let mut class_name = Some(name);
                    while let Some(cn) = class_name {
                        let Some(class) = self.env.classes.get(&cn).cloned() else {
                            break;
                        };
                        if let Some((_, f)) = class.field(field) {
                            self.check_visibility(f.visibility, &cn, field, span);
                            return f.ty;
                        }
                        class_name = class.base;
                    }
                    break;
                }
                Type::Tuple(elems) => {
                    if let Ok(index) = field.parse::<usize>() {
                        if let Some(ty) = elems.get(index) {
                            return *ty;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }

        self.error(TypeError::UnknownField {
            ty: self.env.interner.display(receiver_ty),
            field: field.to_string(),
            span,
        });
        self.recovery()
    }

    // ── patterns ─────────────────────────────────────────────────────

    /// Check a pattern against the scrutinee type, accumulating bindings.
    pub fn check_pattern(
        &mut self,
        pattern: &Pattern,
        scrutinee: TypeId,
        bindings: &mut Vec<(String, TypeId)>,
    ) {
        let scrutinee = {
            let expanded = self.env.expand_alias(scrutinee);
            self.env.interner.deref_all(expanded)
        };
        match pattern {
            Pattern::Wildcard { .. } => {}
            Pattern::Binding { name, .. } => bindings.push((name.clone(), scrutinee)),
            Pattern::IntLit { span, .. } => {
                let ok = self
                    .env
                    .interner
                    .as_prim(scrutinee)
                    .map(PrimKind::is_integer)
                    .unwrap_or(false);
                if !ok {
                    self.pattern_mismatch("an integer", scrutinee, *span);
                }
            }
            Pattern::BoolLit { span, .. } => {
                if !self.env.interner.is_prim(scrutinee, PrimKind::Bool) {
                    self.pattern_mismatch("Bool", scrutinee, *span);
                }
            }
            Pattern::CharLit { span, .. } => {
                if !self.env.interner.is_prim(scrutinee, PrimKind::Char) {
                    self.pattern_mismatch("Char", scrutinee, *span);
                }
            }
            Pattern::StrLit { span, .. } => {
                if !self.env.interner.is_prim(scrutinee, PrimKind::Str) {
                    self.pattern_mismatch("Str", scrutinee, *span);
                }
            }
            Pattern::Range { span, .. } => {
                let ok = self
                    .env
                    .interner
                    .as_prim(scrutinee)
                    .map(|k| k.is_integer() || k == PrimKind::Char)
                    .unwrap_or(false);
                if !ok {
                    self.pattern_mismatch("an integer or Char", scrutinee, *span);
                }
            }
            Pattern::EnumVariant {
                enum_name,
                variant,
                payload,
                span,
            } => self.check_enum_pattern(enum_name.as_deref(), variant, payload, scrutinee, bindings, *span),
            Pattern::Struct {
                name,
                fields,
                has_rest,
                span,
            } => {
                let Some(def) = self.env.structs.get(name).cloned() else {
                    self.error(TypeError::UnknownType {
                        name: name.clone(),
                        span: *span,
                    });
                    return;
                };
                let subst = match self.env.interner.get(scrutinee).clone() {
                    Type::Named { name: n, args, .. } if n == *name => {
                        let mut subst = FxHashMap::default();
                        for (param, arg) in def.type_params.iter().zip(args) {
                            subst.insert(param.clone(), arg);
                        }
                        subst
                    }
                    _ => {
                        self.pattern_mismatch(name, scrutinee, *span);
                        return;
                    }
                };
                if !*has_rest && fields.len() != def.fields.len() {
                    self.error(TypeError::ArityMismatch {
                        name: name.clone(),
                        expected: def.fields.len(),
                        found: fields.len(),
                        span: *span,
                    });
                }
                for (field_name, sub) in fields {
                    let Some(index) = def.field_index(field_name) else {
                        self.error(TypeError::UnknownField {
                            ty: name.clone(),
                            field: field_name.clone(),
                            span: *span,
                        });
                        continue;
                    };
                    let field_ty = self.env.interner.substitute(
                        def.fields[index].1,
                        &subst,
                        &FxHashMap::default(),
                    );
                    self.check_pattern(sub, field_ty, bindings);
                }
            }
            Pattern::Tuple { elements, span } => {
                match self.env.interner.get(scrutinee).clone() {
                    Type::Tuple(elems) if elems.len() == elements.len() => {
                        for (sub, ty) in elements.iter().zip(elems) {
                            self.check_pattern(sub, ty, bindings);
                        }
                    }
                    _ => self.pattern_mismatch("a tuple", scrutinee, *span),
                }
            }
            Pattern::Array {
                elements,
                rest_binding,
                span,
                ..
            } => match self.env.interner.get(scrutinee).clone() {
                Type::Array { element, .. } | Type::Slice { element } => {
                    for sub in elements {
                        self.check_pattern(sub, element, bindings);
                    }
                    if let Some(rest) = rest_binding {
                        let slice = self.env.interner.intern(Type::Slice { element });
                        bindings.push((rest.clone(), slice));
                    }
                }
                _ => self.pattern_mismatch("an array", scrutinee, *span),
            },
            Pattern::Or { alternatives, span } => {
                let mut first_names: Option<Vec<String>> = None;
                for alternative in alternatives {
                    let mut alt_bindings = Vec::new();
                    self.check_pattern(alternative, scrutinee, &mut alt_bindings);
                    let names: Vec<String> =
                        alt_bindings.iter().map(|(n, _)| n.clone()).collect();
                    if let Some(expected) = &first_names {
                        if &names != expected {
                            let expected = format!("bindings {expected:?}");
                            self.error(TypeError::Mismatch {
                                expected,
                                found: format!("bindings {names:?}"),
                                context: "or-pattern".into(),
                                span: *span,
                            });
                        }
                    } else {
                        first_names = Some(names);
                        bindings.extend(alt_bindings);
                    }
                }
            }
        }
    }

    fn check_enum_pattern(
        &mut self,
        enum_name: Option<&str>,
        variant: &str,
        payload: &[Pattern],
        scrutinee: TypeId,
        bindings: &mut Vec<(String, TypeId)>,
        span: Span,
    ) {
        let (scrutinee_name, scrutinee_args) = match self.env.interner.get(scrutinee).clone() {
            Type::Named { name, args, .. } => (name, args),
            _ => {
                self.pattern_mismatch("an enum", scrutinee, span);
                return;
            }
        };
        if let Some(expected_name) = enum_name {
            if expected_name != scrutinee_name {
                self.pattern_mismatch(expected_name, scrutinee, span);
                return;
            }
        }

        // Builtin sums first, then registered enums.
        let payload_types: Vec<TypeId> = match (scrutinee_name.as_str(), variant) {
            ("Maybe", "Just") => vec![scrutinee_args[0]],
            ("Maybe", "Nothing") => vec![],
            ("Outcome", "Ok") => vec![scrutinee_args[0]],
            ("Outcome", "Err") => vec![scrutinee_args[1]],
            ("Ordering", "Less") | ("Ordering", "Equal") | ("Ordering", "Greater") => vec![],
            ("Poll", "Ready") => vec![scrutinee_args[0]],
            ("Poll", "Pending") => vec![],
            _ => {
                let Some(def) = self.env.enums.get(&scrutinee_name).cloned() else {
                    self.pattern_mismatch("an enum", scrutinee, span);
                    return;
                };
                let Some((_, variant_def)) = def.variant(variant) else {
                    self.error(TypeError::UnknownVariant {
                        enum_name: scrutinee_name.clone(),
                        variant: variant.to_string(),
                        span,
                    });
                    return;
                };
                let mut subst = FxHashMap::default();
                for (param, arg) in def.type_params.iter().zip(&scrutinee_args) {
                    subst.insert(param.clone(), *arg);
                }
                let payload = variant_def.payload.clone();
                payload
                    .iter()
                    .map(|p| {
                        self.env
                            .interner
                            .substitute(*p, &subst, &FxHashMap::default())
                    })
                    .collect()
            }
        };

        if payload_types.len() != payload.len() {
            self.error(TypeError::ArityMismatch {
                name: format!("{scrutinee_name}::{variant}"),
                expected: payload_types.len(),
                found: payload.len(),
                span,
            });
            return;
        }
        for (sub, ty) in payload.iter().zip(payload_types) {
            self.check_pattern(sub, ty, bindings);
        }
    }

    fn pattern_mismatch(&mut self, expected: &str, scrutinee: TypeId, span: Span) {
        self.error(TypeError::Mismatch {
            expected: expected.to_string(),
            found: self.env.interner.display(scrutinee),
            context: "pattern".into(),
            span,
        });
    }

    // ── helpers ──────────────────────────────────────────────────────

    fn join_branches(&mut self, a: TypeId, b: TypeId) -> TypeId {
        let never = self.env.interner.never();
        if a == never {
            return b;
        }
        if b == never {
            return a;
        }
        if a != b {
            return self.env.interner.unit();
        }
        a
    }

    fn require_bool(&mut self, ty: TypeId, span: Span) {
        if !self.env.interner.is_prim(ty, PrimKind::Bool) && !self.is_recovery(ty) {
            self.error(TypeError::Mismatch {
                expected: "Bool".into(),
                found: self.env.interner.display(ty),
                context: "condition".into(),
                span,
            });
        }
    }

    fn is_recovery(&self, ty: TypeId) -> bool {
        matches!(self.env.interner.get(ty), Type::Prim(PrimKind::Never))
    }

    fn require_assignable(&mut self, found: TypeId, expected: TypeId, context: &str, span: Span) {
        if found == expected || self.is_recovery(found) || self.is_recovery(expected) {
            return;
        }
        // Generic placeholders unify with anything; bounds were checked at
        // resolution time.
        if self.env.interner.contains_generic(expected)
            || self.env.interner.contains_generic(found)
        {
            return;
        }
        // Integer widths coerce at codegen (sign-extend / truncate); the
        // checker accepts integer-to-integer assignment.
        let found_kind = self.env.interner.as_prim(found);
        let expected_kind = self.env.interner.as_prim(expected);
        if let (Some(f), Some(e)) = (found_kind, expected_kind) {
            if f.is_integer() && e.is_integer() {
                return;
            }
            if f.is_float() && e.is_float() {
                return;
            }
        }
        self.error(TypeError::Mismatch {
            expected: self.env.interner.display(expected),
            found: self.env.interner.display(found),
            context: context.to_string(),
            span,
        });
    }

    fn check_visibility(&mut self, vis: Visibility, owner: &str, member: &str, span: Span) {
        let accessible = match vis {
            Visibility::Public | Visibility::Internal => true,
            Visibility::Private => self.current_class.as_deref() == Some(owner),
            Visibility::Protected => match &self.current_class {
                Some(current) => self.class_is_or_derives(current, owner),
                None => false,
            },
        };
        if !accessible {
            self.error(TypeError::VisibilityViolation {
                member: format!("{owner}::{member}"),
                required: format!("{vis:?}").to_lowercase(),
                span,
            });
        }
    }

    fn check_member_visibility(&mut self, vis: Visibility, target: &str, span: Span) {
        if vis == Visibility::Public || vis == Visibility::Internal {
            return;
        }
        let Some((owner, member)) = target.split_once("::") else {
            return;
        };
        self.check_visibility(vis, owner, member, span);
    }

    fn class_is_or_derives(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self
                .env
                .classes
                .get(&name)
                .and_then(|c| c.base.clone());
        }
        false
    }
}
