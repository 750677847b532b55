//! Declarations: modules, structs, enums, classes, behaviors, impls,
//! functions, type aliases, imports.

use serde::Serialize;

use crate::expr::Block;
use crate::types::{PrimKind, TypeExpr};
use tml_common::Span;

/// Member visibility. `Internal` is module-visible; cross-module access
/// requires `Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Private,
    Protected,
    Internal,
    Public,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Internal
    }
}

/// The derivable behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Derive {
    Reflect,
    PartialEq,
    Duplicate,
    Hash,
    Default,
    PartialOrd,
    Ord,
    Debug,
    Display,
    Serialize,
    Deserialize,
    FromStr,
}

impl Derive {
    pub fn from_name(name: &str) -> Option<Derive> {
        Some(match name {
            "Reflect" => Derive::Reflect,
            "PartialEq" => Derive::PartialEq,
            "Duplicate" => Derive::Duplicate,
            "Hash" => Derive::Hash,
            "Default" => Derive::Default,
            "PartialOrd" => Derive::PartialOrd,
            "Ord" => Derive::Ord,
            "Debug" => Derive::Debug,
            "Display" => Derive::Display,
            "Serialize" => Derive::Serialize,
            "Deserialize" => Derive::Deserialize,
            "FromStr" => Derive::FromStr,
            _ => return None,
        })
    }
}

/// A type parameter on a declaration: either a type (`T: Bound1 + Bound2`)
/// or a const (`const N: Usize`).
#[derive(Debug, Clone, Serialize)]
pub enum TypeParam {
    Type { name: String, bounds: Vec<String> },
    Const { name: String, ty: TypeExpr },
}

impl TypeParam {
    pub fn name(&self) -> &str {
        match self {
            TypeParam::Type { name, .. } | TypeParam::Const { name, .. } => name,
        }
    }
}

/// A where-clause bound: `where T: B1 + B2`.
#[derive(Debug, Clone, Serialize)]
pub struct WhereClause {
    pub param: String,
    pub bounds: Vec<String>,
}

/// `@flags(U8)` metadata on an enum.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlagsAttr {
    pub width: PrimKind,
    pub span: Span,
}

/// A named, typed struct or enum-payload field.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `struct Name[T, const N: Usize] { ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<Field>,
    pub derives: Vec<Derive>,
    pub span: Span,
}

/// One enum variant: a name plus ordered payload types.
#[derive(Debug, Clone, Serialize)]
pub struct EnumVariant {
    pub name: String,
    pub payload: Vec<TypeExpr>,
    /// Explicit discriminant, if written (`Read = 4`). Only meaningful on
    /// unit variants; on `@flags` enums it must be an integer literal.
    pub discriminant: Option<i128>,
    pub span: Span,
}

/// `enum Name[T] { ... }`, optionally `@flags(U8)`.
#[derive(Debug, Clone, Serialize)]
pub struct EnumDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub variants: Vec<EnumVariant>,
    pub derives: Vec<Derive>,
    pub flags: Option<FlagsAttr>,
    pub span: Span,
}

/// A class field with member visibility. Static fields lower to named
/// globals; instance fields occupy the object layout.
#[derive(Debug, Clone, Serialize)]
pub struct ClassField {
    pub visibility: Visibility,
    pub name: String,
    pub ty: TypeExpr,
    pub is_static: bool,
    pub span: Span,
}

/// `class Name : Base { fields; methods }`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub base: Option<String>,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<ClassField>,
    pub methods: Vec<Function>,
    pub span: Span,
}

/// How a method receives `this`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThisKind {
    /// `this` by value.
    Value,
    /// `ref this`.
    Ref,
    /// `mut ref this`.
    MutRef,
}

/// A function parameter.
#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// A free function, class method, impl method, or behavior method signature.
/// Behavior methods may omit the body.
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: String,
    pub visibility: Visibility,
    pub type_params: Vec<TypeParam>,
    pub where_clauses: Vec<WhereClause>,
    /// `Some` for instance methods; `None` for free and static functions.
    pub this: Option<ThisKind>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub is_async: bool,
    pub body: Option<Block>,
    pub span: Span,
}

/// `impl[T] Target[T] { ... }` or `impl Behavior for Target { ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct ImplBlock {
    /// The implementing type, e.g. `List[T]`.
    pub target: TypeExpr,
    /// `Some((behavior, args))` for behavior impls.
    pub behavior: Option<(String, Vec<TypeExpr>)>,
    pub type_params: Vec<TypeParam>,
    pub where_clauses: Vec<WhereClause>,
    pub methods: Vec<Function>,
    pub span: Span,
}

/// `behavior Name[T]: Required1 + Required2 { signatures }`.
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// Behaviors an implementor must also implement.
    pub required: Vec<String>,
    pub methods: Vec<Function>,
    pub span: Span,
}

/// `type Name[T] = Target`.
#[derive(Debug, Clone, Serialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub target: TypeExpr,
    pub span: Span,
}

/// `import a.b.c [as alias]`.
#[derive(Debug, Clone, Serialize)]
pub struct Import {
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub span: Span,
}

/// Any top-level declaration.
#[derive(Debug, Clone, Serialize)]
pub enum Decl {
    Struct(StructDecl),
    Enum(EnumDecl),
    Class(ClassDecl),
    Behavior(BehaviorDecl),
    Impl(ImplBlock),
    Function(Function),
    TypeAlias(TypeAliasDecl),
    Import(Import),
}

/// A module: a dotted path plus declarations, pre-sorted by kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Module {
    /// Dotted module path, e.g. `["collections", "list"]`. Empty for the
    /// entry module.
    pub path: Vec<String>,
    pub imports: Vec<Import>,
    pub structs: Vec<StructDecl>,
    pub enums: Vec<EnumDecl>,
    pub classes: Vec<ClassDecl>,
    pub behaviors: Vec<BehaviorDecl>,
    pub impls: Vec<ImplBlock>,
    pub functions: Vec<Function>,
    pub type_aliases: Vec<TypeAliasDecl>,
    /// True when this module comes from an imported library rather than the
    /// current compilation suite. Controls symbol prefixing during
    /// monomorphization.
    pub is_library: bool,
}

impl Module {
    pub fn new(path: Vec<String>) -> Module {
        Module {
            path,
            ..Module::default()
        }
    }

    /// The dotted path as a display string; empty path renders as `main`.
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            "main".to_string()
        } else {
            self.path.join(".")
        }
    }

    /// Add a declaration into the right bucket.
    pub fn push_decl(&mut self, decl: Decl) {
        match decl {
            Decl::Struct(d) => self.structs.push(d),
            Decl::Enum(d) => self.enums.push(d),
            Decl::Class(d) => self.classes.push(d),
            Decl::Behavior(d) => self.behaviors.push(d),
            Decl::Impl(d) => self.impls.push(d),
            Decl::Function(d) => self.functions.push(d),
            Decl::TypeAlias(d) => self.type_aliases.push(d),
            Decl::Import(d) => self.imports.push(d),
        }
    }
}
