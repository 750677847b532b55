//! Expressions, statements, and blocks.
//!
//! Control flow is expression-oriented: `if`, `when` and blocks may produce
//! values (their trailing expression). Loops are statements and always
//! produce `Unit`.

use serde::Serialize;

use crate::pattern::Pattern;
use crate::types::TypeExpr;
use crate::NodeId;
use tml_common::Span;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// An expression node: identity, location, and payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(id: NodeId, span: Span, kind: ExprKind) -> Expr {
        Expr { id, span, kind }
    }
}

/// The expression payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    /// Integer literal. Wide enough for U128; the checker narrows by context.
    IntLit(i128),
    FloatLit(f64),
    BoolLit(bool),
    CharLit(char),
    StrLit(String),
    UnitLit,

    /// An unqualified identifier.
    Ident(String),
    /// A qualified path `A::B` or `A::B::C`.
    Path(Vec<String>),

    /// `callee(args)` with optional turbofish `callee[T1, T2](args)`.
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `receiver.method(args)` with optional turbofish.
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `receiver.field`.
    FieldAccess { receiver: Box<Expr>, field: String },
    /// `receiver[index]`.
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },

    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// `expr as Type`.
    Cast { expr: Box<Expr>, ty: TypeExpr },
    /// `ref x` / `mut ref x`.
    Reference { is_mut: bool, expr: Box<Expr> },
    /// `*x`.
    Deref(Box<Expr>),

    /// `Name { field: value, .. }` with optional turbofish.
    StructLit {
        name: String,
        type_args: Vec<TypeExpr>,
        fields: Vec<(String, Expr)>,
    },
    TupleLit(Vec<Expr>),
    ArrayLit(Vec<Expr>),
    /// `[elem; count]`.
    ArrayRepeat {
        elem: Box<Expr>,
        count: Box<Expr>,
    },

    /// `func(params) -> ret { body }` closure literal.
    Closure {
        params: Vec<(String, Option<TypeExpr>)>,
        return_type: Option<TypeExpr>,
        body: Box<Expr>,
    },

    /// `start to end` (exclusive) / `start through end` (inclusive).
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },

    If {
        cond: Box<Expr>,
        then_block: Block,
        else_block: Option<Box<Expr>>,
    },
    IfLet {
        pattern: Pattern,
        value: Box<Expr>,
        then_block: Block,
        else_block: Option<Box<Expr>>,
    },
    /// `cond ? a : b`.
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    When {
        scrutinee: Box<Expr>,
        arms: Vec<WhenArm>,
    },
    Block(Block),

    /// `expr.await` inside an async function.
    Await(Box<Expr>),
}

/// One arm of a `when` expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhenArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

/// A block: statements plus an optional trailing value expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub trailing: Option<Box<Expr>>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, trailing: Option<Expr>, span: Span) -> Block {
        Block {
            stmts,
            trailing: trailing.map(Box::new),
            span,
        }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// `let [mut] name[: ty] = value`.
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
        span: Span,
    },
    /// An expression evaluated for effect.
    Expr(Expr),
    /// `target = value` and compound forms (`target op= value`).
    Assign {
        target: Expr,
        op: Option<BinOp>,
        value: Expr,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    Loop {
        body: Block,
        span: Span,
    },
    /// `for pattern in iter { body }`.
    For {
        pattern: Pattern,
        iter: Expr,
        body: Block,
        span: Span,
    },
    /// `throw expr` -- panics with the Error-like record's message.
    Throw {
        value: Expr,
        span: Span,
    },
}
