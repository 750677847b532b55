//! Convenience construction of AST nodes.
//!
//! The front end allocates node ids while building trees; each helper here
//! returns a fully-formed node with a fresh id. Spans default to dummies;
//! callers that have real positions set them on the returned nodes.

use crate::decl::{Function, Param, ThisKind, TypeParam, Visibility, WhereClause};
use crate::expr::{BinOp, Block, Expr, ExprKind, Stmt, WhenArm};
use crate::pattern::Pattern;
use crate::types::TypeExpr;
use crate::NodeId;
use std::cell::Cell;
use tml_common::Span;

/// Builds expression trees with fresh node ids.
///
/// Uses interior mutability so construction nests naturally
/// (`b.call(b.ident("f"), vec![b.int(1)])`).
#[derive(Debug, Default)]
pub struct Builder {
    next: Cell<u32>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> NodeId {
        let id = NodeId(self.next.get());
        self.next.set(id.0 + 1);
        id
    }

    pub fn expr(&self, kind: ExprKind) -> Expr {
        Expr::new(self.next_id(), Span::dummy(), kind)
    }

    // ── literals ─────────────────────────────────────────────────────

    pub fn int(&self, value: i128) -> Expr {
        self.expr(ExprKind::IntLit(value))
    }

    pub fn float(&self, value: f64) -> Expr {
        self.expr(ExprKind::FloatLit(value))
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.expr(ExprKind::BoolLit(value))
    }

    pub fn string(&self, value: impl Into<String>) -> Expr {
        self.expr(ExprKind::StrLit(value.into()))
    }

    pub fn unit(&self) -> Expr {
        self.expr(ExprKind::UnitLit)
    }

    // ── names and access ─────────────────────────────────────────────

    pub fn ident(&self, name: impl Into<String>) -> Expr {
        self.expr(ExprKind::Ident(name.into()))
    }

    pub fn path(&self, segments: &[&str]) -> Expr {
        self.expr(ExprKind::Path(
            segments.iter().map(|s| s.to_string()).collect(),
        ))
    }

    pub fn field(&self, receiver: Expr, name: impl Into<String>) -> Expr {
        self.expr(ExprKind::FieldAccess {
            receiver: Box::new(receiver),
            field: name.into(),
        })
    }

    pub fn index(&self, receiver: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Index {
            receiver: Box::new(receiver),
            index: Box::new(index),
        })
    }

    // ── calls ────────────────────────────────────────────────────────

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            type_args: Vec::new(),
            args,
        })
    }

    pub fn call_generic(&self, callee: Expr, type_args: Vec<TypeExpr>, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            type_args,
            args,
        })
    }

    pub fn method(&self, receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: name.into(),
            type_args: Vec::new(),
            args,
        })
    }

    pub fn method_generic(
        &self,
        receiver: Expr,
        name: impl Into<String>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    ) -> Expr {
        self.expr(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: name.into(),
            type_args,
            args,
        })
    }

    // ── operators ────────────────────────────────────────────────────

    pub fn binary(&self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn add(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinOp::Add, lhs, rhs)
    }

    // ── control flow ─────────────────────────────────────────────────

    pub fn block(&self, stmts: Vec<Stmt>, trailing: Option<Expr>) -> Block {
        Block::new(stmts, trailing, Span::dummy())
    }

    pub fn block_expr(&self, stmts: Vec<Stmt>, trailing: Option<Expr>) -> Expr {
        let block = self.block(stmts, trailing);
        self.expr(ExprKind::Block(block))
    }

    pub fn if_expr(&self, cond: Expr, then_block: Block, else_block: Option<Expr>) -> Expr {
        self.expr(ExprKind::If {
            cond: Box::new(cond),
            then_block,
            else_block: else_block.map(Box::new),
        })
    }

    pub fn when(&self, scrutinee: Expr, arms: Vec<WhenArm>) -> Expr {
        self.expr(ExprKind::When {
            scrutinee: Box::new(scrutinee),
            arms,
        })
    }

    pub fn arm(&self, pattern: Pattern, body: Expr) -> WhenArm {
        WhenArm {
            pattern,
            guard: None,
            body,
            span: Span::dummy(),
        }
    }

    pub fn range(&self, start: Expr, end: Expr, inclusive: bool) -> Expr {
        self.expr(ExprKind::Range {
            start: Box::new(start),
            end: Box::new(end),
            inclusive,
        })
    }

    // ── statements ───────────────────────────────────────────────────

    pub fn let_stmt(&self, name: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Let {
            name: name.into(),
            mutable: false,
            ty: None,
            value,
            span: Span::dummy(),
        }
    }

    pub fn let_mut(&self, name: impl Into<String>, ty: Option<TypeExpr>, value: Expr) -> Stmt {
        Stmt::Let {
            name: name.into(),
            mutable: true,
            ty,
            value,
            span: Span::dummy(),
        }
    }

    pub fn let_typed(&self, name: impl Into<String>, ty: TypeExpr, value: Expr) -> Stmt {
        Stmt::Let {
            name: name.into(),
            mutable: false,
            ty: Some(ty),
            value,
            span: Span::dummy(),
        }
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        Stmt::Return {
            value,
            span: Span::dummy(),
        }
    }

    pub fn for_stmt(&self, pattern: Pattern, iter: Expr, body: Block) -> Stmt {
        Stmt::For {
            pattern,
            iter,
            body,
            span: Span::dummy(),
        }
    }

    // ── patterns ─────────────────────────────────────────────────────

    pub fn bind(&self, name: impl Into<String>) -> Pattern {
        Pattern::Binding {
            name: name.into(),
            mutable: false,
            span: Span::dummy(),
        }
    }

    pub fn wildcard(&self) -> Pattern {
        Pattern::Wildcard { span: Span::dummy() }
    }

    pub fn variant_pat(
        &self,
        enum_name: Option<&str>,
        variant: impl Into<String>,
        payload: Vec<Pattern>,
    ) -> Pattern {
        Pattern::EnumVariant {
            enum_name: enum_name.map(String::from),
            variant: variant.into(),
            payload,
            span: Span::dummy(),
        }
    }

    // ── declarations ─────────────────────────────────────────────────

    /// A plain function with no generics.
    pub fn func(
        &self,
        name: impl Into<String>,
        params: Vec<(&str, TypeExpr)>,
        return_type: Option<TypeExpr>,
        body: Block,
    ) -> Function {
        Function {
            name: name.into(),
            visibility: Visibility::Public,
            type_params: Vec::new(),
            where_clauses: Vec::new(),
            this: None,
            params: params
                .into_iter()
                .map(|(n, ty)| Param {
                    name: n.to_string(),
                    ty,
                    span: Span::dummy(),
                })
                .collect(),
            return_type,
            is_async: false,
            body: Some(body),
            span: Span::dummy(),
        }
    }

    /// A generic function with bounds.
    pub fn generic_func(
        &self,
        name: impl Into<String>,
        type_params: Vec<TypeParam>,
        where_clauses: Vec<WhereClause>,
        params: Vec<(&str, TypeExpr)>,
        return_type: Option<TypeExpr>,
        body: Block,
    ) -> Function {
        let mut f = self.func(name, params, return_type, body);
        f.type_params = type_params;
        f.where_clauses = where_clauses;
        f
    }

    /// An instance method (`ref this`).
    pub fn method_decl(
        &self,
        name: impl Into<String>,
        this: ThisKind,
        params: Vec<(&str, TypeExpr)>,
        return_type: Option<TypeExpr>,
        body: Block,
    ) -> Function {
        let mut f = self.func(name, params, return_type, body);
        f.this = Some(this);
        f
    }
}
