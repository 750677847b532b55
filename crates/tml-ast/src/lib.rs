//! The TML abstract syntax tree.
//!
//! This crate is the contract between the front end (delivered as the `parse`
//! plugin capability) and the compiler core: the checker consumes these nodes
//! and annotates them through side tables keyed by [`NodeId`], the
//! monomorphizer and IR generator walk them with those tables in hand.
//!
//! Nothing here owns type information. Types live in `tml-typeck`'s interner;
//! the AST only carries *syntactic* type expressions ([`TypeExpr`]).
//!
//! ## Node identity
//!
//! Every expression carries a [`NodeId`] unique within its compilation. The
//! front end allocates ids from a [`NodeIdGen`]; tests construct trees through
//! the same generator.

pub mod build;
pub mod decl;
pub mod expr;
pub mod pattern;
pub mod types;

pub use build::Builder;

pub use decl::{
    BehaviorDecl, ClassDecl, ClassField, Decl, Derive, EnumDecl, EnumVariant, Field, FlagsAttr,
    Function, ImplBlock, Import, Module, Param, StructDecl, ThisKind, TypeAliasDecl, TypeParam,
    Visibility, WhereClause,
};
pub use expr::{BinOp, Block, Expr, ExprKind, Stmt, UnOp, WhenArm};
pub use pattern::Pattern;
pub use types::{PrimKind, TypeExpr};

use serde::Serialize;

/// Identity of an expression node, unique within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Allocator for [`NodeId`]s. One per compilation; shared by the front end
/// and by any pass that synthesizes expressions.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_sequential_and_unique() {
        let mut ids = NodeIdGen::new();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert_eq!(b, NodeId(1));
    }

    /// The `parse` command dumps modules as JSON; the whole tree must stay
    /// serializable.
    #[test]
    fn modules_serialize_to_json() {
        let b = Builder::new();
        let mut module = Module::new(vec!["demo".into()]);
        let body = b.block(vec![b.let_stmt("x", b.int(1))], None);
        module.functions.push(b.func("main", vec![], None, body));

        let dump = serde_json::to_string(&module).expect("serializable");
        assert!(dump.contains("\"main\""));
        assert!(dump.contains("IntLit"));
    }
}
