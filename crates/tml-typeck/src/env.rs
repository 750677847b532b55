//! The type environment: registries for every declared entity.
//!
//! The `TypeEnv` exclusively owns all type, declaration, impl, and behavior
//! objects for a compilation. It is populated during the registration pass
//! (one module at a time), then read -- never structurally changed -- during
//! body checking, monomorphization, and IR generation. The one exception is
//! the interner, which stays append-only throughout.

use rustc_hash::FxHashMap;

use tml_ast as ast;
use tml_ast::{Derive, PrimKind, ThisKind, TypeExpr, Visibility};
use tml_common::Span;

use crate::error::TypeError;
use crate::ty::{ArraySize, Type, TypeId, TypeInterner};

/// Names the language reserves; redeclaring any of them is `T038`.
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    "I8", "I16", "I32", "I64", "I128", "U8", "U16", "U32", "U64", "U128", "F32", "F64", "Bool",
    "Char", "Str", "Unit", "Never", "StringBuilder", "Future", "Context", "Waker",
];

/// The smart-pointer family that participates in auto-deref. Each wraps a
/// single inner type parameter.
pub const AUTO_DEREF_TYPES: &[&str] = &[
    "Arc",
    "Box",
    "Heap",
    "Rc",
    "Shared",
    "MutexGuard",
    "RwLockReadGuard",
    "RwLockWriteGuard",
    "Ref",
    "RefMut",
];

/// A resolved function signature.
#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    pub type_params: Vec<String>,
    pub const_params: Vec<(String, PrimKind)>,
    pub is_async: bool,
    pub span: Span,
}

/// A registered free function: resolved signature plus the body AST.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub sig: FuncSig,
    pub func: ast::Function,
    /// Library items keep unprefixed symbols across compilation units;
    /// local items get the suite prefix.
    pub is_library: bool,
}

/// A registered struct.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub module_path: Vec<String>,
    pub type_params: Vec<String>,
    pub const_params: Vec<(String, PrimKind)>,
    /// Ordered fields. Generic fields reference `Type::Generic` nodes.
    pub fields: Vec<(String, TypeId)>,
    pub derives: Vec<Derive>,
    pub is_library: bool,
    pub span: Span,
}

impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }
}

/// One registered enum variant.
#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: String,
    pub payload: Vec<TypeId>,
    /// The runtime tag. Sequential for ordinary enums; powers of two for
    /// `@flags` enums.
    pub discriminant: i128,
}

/// A registered enum.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub module_path: Vec<String>,
    pub type_params: Vec<String>,
    pub const_params: Vec<(String, PrimKind)>,
    pub variants: Vec<VariantDef>,
    pub derives: Vec<Derive>,
    /// `Some(width)` for `@flags(width)` enums.
    pub flags: Option<PrimKind>,
    pub is_library: bool,
    pub span: Span,
}

impl EnumDef {
    pub fn variant(&self, name: &str) -> Option<(usize, &VariantDef)> {
        self.variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.name == name)
    }
}

/// A registered class field.
#[derive(Debug, Clone)]
pub struct ClassFieldDef {
    pub visibility: Visibility,
    pub name: String,
    pub ty: TypeId,
    pub is_static: bool,
}

/// A method attached to a class or impl block.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub this: Option<ThisKind>,
    pub visibility: Visibility,
    pub sig: FuncSig,
    pub func: ast::Function,
}

/// A registered class.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub module_path: Vec<String>,
    pub base: Option<String>,
    pub type_params: Vec<String>,
    pub fields: Vec<ClassFieldDef>,
    pub methods: Vec<MethodDef>,
    pub is_library: bool,
    pub span: Span,
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.sig.name == name)
    }

    pub fn field(&self, name: &str) -> Option<(usize, &ClassFieldDef)> {
        self.fields
            .iter()
            .filter(|f| !f.is_static)
            .enumerate()
            .find(|(_, f)| f.name == name)
    }

    pub fn static_field(&self, name: &str) -> Option<&ClassFieldDef> {
        self.fields.iter().find(|f| f.is_static && f.name == name)
    }
}

/// A behavior method: signature plus optional default body.
#[derive(Debug, Clone)]
pub struct BehaviorMethod {
    pub this: Option<ThisKind>,
    pub sig: FuncSig,
    pub default: Option<ast::Function>,
}

/// A registered behavior (trait).
#[derive(Debug, Clone)]
pub struct BehaviorDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub required: Vec<String>,
    pub methods: Vec<BehaviorMethod>,
    pub span: Span,
}

impl BehaviorDef {
    pub fn method(&self, name: &str) -> Option<&BehaviorMethod> {
        self.methods.iter().find(|m| m.sig.name == name)
    }
}

/// A registered impl block.
#[derive(Debug, Clone)]
pub struct ImplDef {
    /// The implementing type's base name (`List` for `impl[T] List[T]`).
    pub target_name: String,
    /// The target's type arguments as written (usually generic placeholders).
    pub target_args: Vec<TypeId>,
    pub type_params: Vec<String>,
    pub where_clauses: Vec<(String, Vec<String>)>,
    /// `Some((behavior, args))` when this implements a behavior.
    pub behavior: Option<(String, Vec<TypeId>)>,
    pub methods: Vec<MethodDef>,
    pub is_library: bool,
    pub span: Span,
}

impl ImplDef {
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.sig.name == name)
    }
}

/// A registered type alias.
#[derive(Debug, Clone)]
pub struct AliasDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub target: TypeId,
    pub span: Span,
}

/// Scope of type/const parameters while resolving type expressions.
#[derive(Debug, Default, Clone)]
pub struct ParamScope {
    pub type_params: Vec<String>,
    pub const_params: Vec<(String, PrimKind)>,
}

impl ParamScope {
    pub fn from_decl(params: &[ast::TypeParam]) -> ParamScope {
        let mut scope = ParamScope::default();
        for p in params {
            match p {
                ast::TypeParam::Type { name, .. } => scope.type_params.push(name.clone()),
                ast::TypeParam::Const { name, ty } => {
                    let kind = match ty {
                        TypeExpr::Named { name, .. } => {
                            PrimKind::from_name(name).unwrap_or(PrimKind::U64)
                        }
                        _ => PrimKind::U64,
                    };
                    scope.const_params.push((name.clone(), kind));
                }
            }
        }
        scope
    }

    pub fn extended(&self, params: &[ast::TypeParam]) -> ParamScope {
        let mut scope = self.clone();
        let inner = ParamScope::from_decl(params);
        scope.type_params.extend(inner.type_params);
        scope.const_params.extend(inner.const_params);
        scope
    }

    pub fn has_type_param(&self, name: &str) -> bool {
        self.type_params.iter().any(|p| p == name)
    }

    pub fn has_const_param(&self, name: &str) -> bool {
        self.const_params.iter().any(|(p, _)| p == name)
    }
}

/// The type environment for one compilation.
pub struct TypeEnv {
    pub interner: TypeInterner,
    pub structs: FxHashMap<String, StructDef>,
    pub enums: FxHashMap<String, EnumDef>,
    pub classes: FxHashMap<String, ClassDef>,
    pub behaviors: FxHashMap<String, BehaviorDef>,
    pub impls: Vec<ImplDef>,
    /// Impl blocks grouped by implementing type name.
    pub impls_by_type: FxHashMap<String, Vec<usize>>,
    /// `(type name, behavior name)` -> impl index.
    pub impl_index: FxHashMap<(String, String), usize>,
    pub functions: FxHashMap<String, FuncDef>,
    pub type_aliases: FxHashMap<String, AliasDef>,
    /// Methods synthesized by derives, keyed by `Type::method`.
    pub derived_methods: FxHashMap<String, FuncSig>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv {
            interner: TypeInterner::new(),
            structs: FxHashMap::default(),
            enums: FxHashMap::default(),
            classes: FxHashMap::default(),
            behaviors: FxHashMap::default(),
            impls: Vec::new(),
            impls_by_type: FxHashMap::default(),
            impl_index: FxHashMap::default(),
            functions: FxHashMap::default(),
            type_aliases: FxHashMap::default(),
            derived_methods: FxHashMap::default(),
        }
    }

    /// Whether the name is reserved for a built-in type.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_TYPE_NAMES.contains(&name)
    }

    /// Whether the name is already taken by any registered declaration.
    pub fn is_declared(&self, name: &str) -> bool {
        self.structs.contains_key(name)
            || self.enums.contains_key(name)
            || self.classes.contains_key(name)
            || self.behaviors.contains_key(name)
            || self.type_aliases.contains_key(name)
    }

    pub fn add_impl(&mut self, def: ImplDef) -> usize {
        let idx = self.impls.len();
        self.impls_by_type
            .entry(def.target_name.clone())
            .or_default()
            .push(idx);
        if let Some((behavior, _)) = &def.behavior {
            self.impl_index
                .insert((def.target_name.clone(), behavior.clone()), idx);
        }
        self.impls.push(def);
        idx
    }

    /// Whether `impl Behavior for TypeName` is registered, directly or via
    /// the behavior's own required list.
    pub fn type_implements(&self, type_name: &str, behavior: &str) -> bool {
        self.impl_index.contains_key(&(type_name.to_string(), behavior.to_string()))
    }

    /// Resolve a syntactic type expression to an interned type.
    pub fn resolve_type_expr(
        &mut self,
        expr: &TypeExpr,
        scope: &ParamScope,
    ) -> Result<TypeId, TypeError> {
        match expr {
            TypeExpr::Unit => Ok(self.interner.unit()),
            TypeExpr::Named {
                module,
                name,
                args,
                span,
            } => self.resolve_named(module, name, args, *span, scope),
            TypeExpr::Ref { is_mut, inner } => {
                let inner = self.resolve_type_expr(inner, scope)?;
                Ok(self.interner.intern(Type::Ref {
                    is_mut: *is_mut,
                    inner,
                }))
            }
            TypeExpr::Ptr { is_mut, inner } => {
                let inner = self.resolve_type_expr(inner, scope)?;
                Ok(self.interner.intern(Type::Ptr {
                    is_mut: *is_mut,
                    inner,
                }))
            }
            TypeExpr::Array { element, size } => {
                let element = self.resolve_type_expr(element, scope)?;
                let size = self.eval_array_size(size, scope)?;
                Ok(self.interner.intern(Type::Array { element, size }))
            }
            TypeExpr::Slice { element } => {
                let element = self.resolve_type_expr(element, scope)?;
                Ok(self.interner.intern(Type::Slice { element }))
            }
            TypeExpr::Tuple { elements } => {
                let elems = elements
                    .iter()
                    .map(|e| self.resolve_type_expr(e, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.interner.intern(Type::Tuple(elems)))
            }
            TypeExpr::Func {
                params,
                return_type,
            } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_type_expr(p, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let return_type = self.resolve_type_expr(return_type, scope)?;
                Ok(self.interner.intern(Type::Func {
                    params,
                    return_type,
                }))
            }
            TypeExpr::Dyn {
                behavior,
                args,
                span,
            } => {
                if !self.behaviors.contains_key(behavior) {
                    return Err(TypeError::UnknownType {
                        name: behavior.clone(),
                        span: *span,
                    });
                }
                let args = args
                    .iter()
                    .map(|a| self.resolve_type_expr(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.interner.intern(Type::DynBehavior {
                    behavior: behavior.clone(),
                    args,
                }))
            }
        }
    }

    fn resolve_named(
        &mut self,
        module: &[String],
        name: &str,
        args: &[TypeExpr],
        span: Span,
        scope: &ParamScope,
    ) -> Result<TypeId, TypeError> {
        // Primitives and in-scope type parameters shadow nothing: the
        // registration pass rejects redeclaration of reserved names.
        if module.is_empty() && args.is_empty() {
            if let Some(kind) = PrimKind::from_name(name) {
                return Ok(self.interner.prim(kind));
            }
            if scope.has_type_param(name) {
                return Ok(self.interner.intern(Type::Generic(name.to_string())));
            }
        }

        // Ptr/MutPtr written in applied form.
        if module.is_empty() && args.len() == 1 && (name == "Ptr" || name == "MutPtr") {
            let inner = self.resolve_type_expr(&args[0], scope)?;
            return Ok(self.interner.intern(Type::Ptr {
                is_mut: name == "MutPtr",
                inner,
            }));
        }

        // Type aliases expand here.
        if let Some(alias) = self.type_aliases.get(name).cloned() {
            if alias.type_params.len() != args.len() {
                return Err(TypeError::WrongTypeArgCount {
                    name: name.to_string(),
                    expected: alias.type_params.len(),
                    found: args.len(),
                    span,
                });
            }
            let mut subst = FxHashMap::default();
            for (param, arg) in alias.type_params.iter().zip(args) {
                let arg = self.resolve_type_expr(arg, scope)?;
                subst.insert(param.clone(), arg);
            }
            return Ok(self
                .interner
                .substitute(alias.target, &subst, &FxHashMap::default()));
        }

        let resolved_args = args
            .iter()
            .map(|a| self.resolve_type_expr(a, scope))
            .collect::<Result<Vec<_>, _>>()?;

        if module.is_empty() && resolved_args.is_empty() && self.classes.contains_key(name) {
            return Ok(self.interner.intern(Type::Class {
                name: name.to_string(),
            }));
        }

        // Known declarations validate their arity; unknown names are legal in
        // signatures only when they refer to builtin generic containers
        // (List, Maybe, Outcome, the smart-pointer family, ...), which the
        // checker treats as Named types with fixed method tables.
        if let Some(def) = self.structs.get(name) {
            let expected = def.type_params.len() + def.const_params.len();
            if expected != resolved_args.len() {
                return Err(TypeError::WrongTypeArgCount {
                    name: name.to_string(),
                    expected,
                    found: resolved_args.len(),
                    span,
                });
            }
        } else if let Some(def) = self.enums.get(name) {
            let expected = def.type_params.len() + def.const_params.len();
            if expected != resolved_args.len() {
                return Err(TypeError::WrongTypeArgCount {
                    name: name.to_string(),
                    expected,
                    found: resolved_args.len(),
                    span,
                });
            }
        }

        Ok(self.interner.intern(Type::Named {
            name: name.to_string(),
            module_path: module.to_vec(),
            args: resolved_args,
        }))
    }

    fn eval_array_size(
        &mut self,
        size: &ast::Expr,
        scope: &ParamScope,
    ) -> Result<ArraySize, TypeError> {
        match &size.kind {
            ast::ExprKind::IntLit(v) if *v >= 0 => Ok(ArraySize::Const(*v as u64)),
            ast::ExprKind::Ident(name) if scope.has_const_param(name) => {
                Ok(ArraySize::Param(name.clone()))
            }
            _ => Err(TypeError::BadConstExpr { span: size.span }),
        }
    }

    /// Expand a type alias at the semantic level (used before method lookup).
    pub fn expand_alias(&mut self, id: TypeId) -> TypeId {
        if let Type::Named { name, args, .. } = self.interner.get(id).clone() {
            if let Some(alias) = self.type_aliases.get(&name).cloned() {
                if alias.type_params.len() == args.len() {
                    let mut subst = FxHashMap::default();
                    for (param, arg) in alias.type_params.iter().zip(args) {
                        subst.insert(param.clone(), arg);
                    }
                    let expanded =
                        self.interner
                            .substitute(alias.target, &subst, &FxHashMap::default());
                    return self.expand_alias(expanded);
                }
            }
        }
        id
    }

    /// The single inner type argument of a smart-pointer type, if `id` is one.
    pub fn auto_deref_inner(&self, id: TypeId) -> Option<TypeId> {
        match self.interner.get(id) {
            Type::Named { name, args, .. }
                if AUTO_DEREF_TYPES.contains(&name.as_str()) && args.len() == 1 =>
            {
                Some(args[0])
            }
            _ => None,
        }
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_cover_all_primitives() {
        for kind in ["I8", "U128", "F64", "Str", "Unit", "Never"] {
            assert!(TypeEnv::is_reserved(kind));
        }
        assert!(TypeEnv::is_reserved("Future"));
        assert!(!TypeEnv::is_reserved("List"));
    }

    #[test]
    fn resolve_ptr_written_applied() {
        let mut env = TypeEnv::new();
        let expr = TypeExpr::generic("Ptr", vec![TypeExpr::prim(PrimKind::I32)]);
        let id = env
            .resolve_type_expr(&expr, &ParamScope::default())
            .expect("resolves");
        match env.interner.get(id) {
            Type::Ptr { is_mut, inner } => {
                assert!(!is_mut);
                assert!(env.interner.is_prim(*inner, PrimKind::I32));
            }
            other => panic!("expected Ptr, got {other:?}"),
        }
    }

    #[test]
    fn alias_expansion_substitutes_args() {
        let mut env = TypeEnv::new();
        let t = env.interner.intern(Type::Generic("T".into()));
        let target = env.interner.named("List", vec![t]);
        env.type_aliases.insert(
            "Vec".into(),
            AliasDef {
                name: "Vec".into(),
                type_params: vec!["T".into()],
                target,
                span: Span::dummy(),
            },
        );
        let expr = TypeExpr::generic("Vec", vec![TypeExpr::prim(PrimKind::Bool)]);
        let id = env
            .resolve_type_expr(&expr, &ParamScope::default())
            .expect("resolves");
        assert_eq!(env.interner.display(id), "List[Bool]");
    }

    #[test]
    fn auto_deref_unwraps_one_layer() {
        let mut env = TypeEnv::new();
        let i64_id = env.interner.prim(PrimKind::I64);
        let arc = env.interner.named("Arc", vec![i64_id]);
        assert_eq!(env.auto_deref_inner(arc), Some(i64_id));
        assert_eq!(env.auto_deref_inner(i64_id), None);
    }
}
