//! Syntactic type expressions.
//!
//! These are what the parser writes down for annotations; the checker
//! resolves them to interned semantic types. They deliberately mirror the
//! surface syntax, not the semantic `Type` (e.g. type arguments are
//! unresolved names here).

use serde::Serialize;

use crate::expr::Expr;
use tml_common::Span;

/// The primitive kinds of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Str,
    Unit,
    Never,
}

impl PrimKind {
    /// The surface name, e.g. `I32`.
    pub fn name(self) -> &'static str {
        match self {
            PrimKind::I8 => "I8",
            PrimKind::I16 => "I16",
            PrimKind::I32 => "I32",
            PrimKind::I64 => "I64",
            PrimKind::I128 => "I128",
            PrimKind::U8 => "U8",
            PrimKind::U16 => "U16",
            PrimKind::U32 => "U32",
            PrimKind::U64 => "U64",
            PrimKind::U128 => "U128",
            PrimKind::F32 => "F32",
            PrimKind::F64 => "F64",
            PrimKind::Bool => "Bool",
            PrimKind::Char => "Char",
            PrimKind::Str => "Str",
            PrimKind::Unit => "Unit",
            PrimKind::Never => "Never",
        }
    }

    /// Parse a surface name back to a primitive kind.
    pub fn from_name(name: &str) -> Option<PrimKind> {
        Some(match name {
            "I8" => PrimKind::I8,
            "I16" => PrimKind::I16,
            "I32" => PrimKind::I32,
            "I64" => PrimKind::I64,
            "I128" => PrimKind::I128,
            "U8" => PrimKind::U8,
            "U16" => PrimKind::U16,
            "U32" => PrimKind::U32,
            "U64" => PrimKind::U64,
            "U128" => PrimKind::U128,
            "F32" => PrimKind::F32,
            "F64" => PrimKind::F64,
            "Bool" => PrimKind::Bool,
            "Char" => PrimKind::Char,
            "Str" => PrimKind::Str,
            "Unit" => PrimKind::Unit,
            "Never" => PrimKind::Never,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimKind::I8
                | PrimKind::I16
                | PrimKind::I32
                | PrimKind::I64
                | PrimKind::I128
                | PrimKind::U8
                | PrimKind::U16
                | PrimKind::U32
                | PrimKind::U64
                | PrimKind::U128
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimKind::I8 | PrimKind::I16 | PrimKind::I32 | PrimKind::I64 | PrimKind::I128
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimKind::F32 | PrimKind::F64)
    }

    /// Bit width for integer kinds; None otherwise.
    pub fn bit_width(self) -> Option<u32> {
        Some(match self {
            PrimKind::I8 | PrimKind::U8 => 8,
            PrimKind::I16 | PrimKind::U16 => 16,
            PrimKind::I32 | PrimKind::U32 => 32,
            PrimKind::I64 | PrimKind::U64 => 64,
            PrimKind::I128 | PrimKind::U128 => 128,
            _ => return None,
        })
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeExpr {
    /// A named type with optional module qualifier and type arguments:
    /// `List[I32]`, `collections::Map[Str, I64]`, or a bare type parameter `T`.
    Named {
        module: Vec<String>,
        name: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `ref T` / `mut ref T`.
    Ref { is_mut: bool, inner: Box<TypeExpr> },
    /// `Ptr[T]` / `MutPtr[T]`.
    Ptr { is_mut: bool, inner: Box<TypeExpr> },
    /// `[T; N]` where N is a const expression.
    Array {
        element: Box<TypeExpr>,
        size: Box<Expr>,
    },
    /// `[T]`.
    Slice { element: Box<TypeExpr> },
    /// `(A, B, C)`.
    Tuple { elements: Vec<TypeExpr> },
    /// `func(A, B) -> C`.
    Func {
        params: Vec<TypeExpr>,
        return_type: Box<TypeExpr>,
    },
    /// `dyn Behavior[Args]`.
    Dyn {
        behavior: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `Unit` written as `()`.
    Unit,
}

impl TypeExpr {
    /// Convenience constructor for an unqualified named type.
    pub fn named(name: impl Into<String>) -> TypeExpr {
        TypeExpr::Named {
            module: Vec::new(),
            name: name.into(),
            args: Vec::new(),
            span: Span::dummy(),
        }
    }

    /// Convenience constructor for a generic application `name[args]`.
    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Named {
            module: Vec::new(),
            name: name.into(),
            args,
            span: Span::dummy(),
        }
    }

    pub fn prim(kind: PrimKind) -> TypeExpr {
        TypeExpr::named(kind.name())
    }
}
