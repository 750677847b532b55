//! Declaration registration: the checker's first pass.
//!
//! Walks a module and registers structs, enums, classes, behaviors, impl
//! blocks, type aliases, and function signatures -- without touching any
//! body. Bodies are checked in the second pass once every signature is
//! known, so forward references inside one module need no ordering.

use rustc_hash::FxHashMap;

use tml_ast as ast;
use tml_ast::{PrimKind, TypeExpr};
use tml_common::DiagnosticBag;

use crate::derive;
use crate::env::{
    BehaviorDef, BehaviorMethod, ClassDef, ClassFieldDef, EnumDef, FuncDef, FuncSig, ImplDef,
    MethodDef, ParamScope, StructDef, TypeEnv, VariantDef,
};
use crate::error::TypeError;
use crate::ty::{Type, TypeId};

/// Register every declaration of `module` into `env`.
pub fn register_module(env: &mut TypeEnv, module: &ast::Module, bag: &mut DiagnosticBag) {
    // Types first: structs, enums, classes, behaviors, aliases. Signatures
    // reference these freely.
    for decl in &module.structs {
        register_struct(env, module, decl, bag);
    }
    for decl in &module.enums {
        register_enum(env, module, decl, bag);
    }
    for decl in &module.type_aliases {
        register_alias(env, decl, bag);
    }
    for decl in &module.behaviors {
        register_behavior(env, decl, bag);
    }
    for decl in &module.classes {
        register_class(env, module, decl, bag);
    }
    // Then callable signatures.
    for func in &module.functions {
        register_function(env, module, func, bag);
    }
    for block in &module.impls {
        register_impl(env, module, block, bag);
    }
}

fn check_name_free(env: &TypeEnv, name: &str, span: tml_common::Span, bag: &mut DiagnosticBag) -> bool {
    if TypeEnv::is_reserved(name) {
        bag.push(
            TypeError::ReservedName {
                name: name.to_string(),
                span,
            }
            .into_diagnostic(),
        );
        return false;
    }
    if env.is_declared(name) {
        bag.push(
            TypeError::DuplicateDecl {
                name: name.to_string(),
                span,
            }
            .into_diagnostic(),
        );
        return false;
    }
    true
}

/// The declared type applied to its own parameters (`List[T]` for
/// `struct List[T]`), used as the Self type of derived signatures.
fn self_type(env: &mut TypeEnv, name: &str, scope: &ParamScope) -> TypeId {
    let args: Vec<TypeId> = scope
        .type_params
        .iter()
        .map(|p| env.interner.intern(Type::Generic(p.clone())))
        .collect();
    env.interner.named(name, args)
}

fn register_struct(
    env: &mut TypeEnv,
    module: &ast::Module,
    decl: &ast::StructDecl,
    bag: &mut DiagnosticBag,
) {
    if !check_name_free(env, &decl.name, decl.span, bag) {
        return;
    }
    let scope = ParamScope::from_decl(&decl.type_params);
    let mut fields = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        match env.resolve_type_expr(&field.ty, &scope) {
            Ok(ty) => fields.push((field.name.clone(), ty)),
            Err(err) => bag.push(err.into_diagnostic()),
        }
    }
    let def = StructDef {
        name: decl.name.clone(),
        module_path: module.path.clone(),
        type_params: scope.type_params.clone(),
        const_params: scope.const_params.clone(),
        fields,
        derives: decl.derives.clone(),
        is_library: module.is_library,
        span: decl.span,
    };
    env.structs.insert(decl.name.clone(), def);

    let self_ty = self_type(env, &decl.name, &scope);
    for d in &decl.derives {
        derive::synthesize(env, &decl.name, self_ty, *d, decl.span);
    }
}

fn register_enum(
    env: &mut TypeEnv,
    module: &ast::Module,
    decl: &ast::EnumDecl,
    bag: &mut DiagnosticBag,
) {
    if !check_name_free(env, &decl.name, decl.span, bag) {
        return;
    }
    let scope = ParamScope::from_decl(&decl.type_params);

    let mut flags_width = None;
    if let Some(flags) = &decl.flags {
        flags_width = validate_flags(decl, flags, bag);
    }

    let mut variants = Vec::with_capacity(decl.variants.len());
    let mut next_flag_bit: u32 = 0;
    for (index, variant) in decl.variants.iter().enumerate() {
        let mut payload = Vec::with_capacity(variant.payload.len());
        for ty in &variant.payload {
            match env.resolve_type_expr(ty, &scope) {
                Ok(id) => payload.push(id),
                Err(err) => bag.push(err.into_diagnostic()),
            }
        }
        // Ordinary enums tag sequentially; flags enums auto-assign powers
        // of two, with explicit integer discriminants taking precedence.
        let discriminant = if flags_width.is_some() {
            match variant.discriminant {
                Some(v) => v,
                None => {
                    let v = 1i128 << next_flag_bit;
                    v
                }
            }
        } else {
            variant.discriminant.unwrap_or(index as i128)
        };
        if flags_width.is_some() && variant.discriminant.is_none() {
            next_flag_bit += 1;
        }
        variants.push(VariantDef {
            name: variant.name.clone(),
            payload,
            discriminant,
        });
    }

    let def = EnumDef {
        name: decl.name.clone(),
        module_path: module.path.clone(),
        type_params: scope.type_params.clone(),
        const_params: scope.const_params.clone(),
        variants,
        derives: decl.derives.clone(),
        flags: flags_width,
        is_library: module.is_library,
        span: decl.span,
    };
    env.enums.insert(decl.name.clone(), def);

    let self_ty = self_type(env, &decl.name, &scope);
    for d in &decl.derives {
        derive::synthesize(env, &decl.name, self_ty, *d, decl.span);
    }
}

/// Validate the `@flags` rules. Returns the underlying width when valid.
fn validate_flags(
    decl: &ast::EnumDecl,
    flags: &ast::FlagsAttr,
    bag: &mut DiagnosticBag,
) -> Option<PrimKind> {
    let mut ok = true;
    if !decl.type_params.is_empty() {
        bag.push(TypeError::FlagsGenericParams { span: decl.span }.into_diagnostic());
        ok = false;
    }
    for variant in &decl.variants {
        if !variant.payload.is_empty() {
            bag.push(
                TypeError::FlagsNonUnitVariant {
                    variant: variant.name.clone(),
                    span: variant.span,
                }
                .into_diagnostic(),
            );
            ok = false;
        }
        if let Some(d) = variant.discriminant {
            if d < 0 {
                bag.push(
                    TypeError::FlagsBadDiscriminant {
                        variant: variant.name.clone(),
                        span: variant.span,
                    }
                    .into_diagnostic(),
                );
                ok = false;
            }
        }
    }
    let width = flags.width.bit_width().unwrap_or(0);
    if decl.variants.len() > width as usize {
        bag.push(
            TypeError::FlagsTooManyVariants {
                count: decl.variants.len(),
                width,
                span: decl.span,
            }
            .into_diagnostic(),
        );
        ok = false;
    }
    if ok {
        Some(flags.width)
    } else {
        None
    }
}

fn register_alias(env: &mut TypeEnv, decl: &ast::TypeAliasDecl, bag: &mut DiagnosticBag) {
    if !check_name_free(env, &decl.name, decl.span, bag) {
        return;
    }
    let scope = ParamScope::from_decl(&decl.type_params);
    match env.resolve_type_expr(&decl.target, &scope) {
        Ok(target) => {
            env.type_aliases.insert(
                decl.name.clone(),
                crate::env::AliasDef {
                    name: decl.name.clone(),
                    type_params: scope.type_params,
                    target,
                    span: decl.span,
                },
            );
        }
        Err(err) => bag.push(err.into_diagnostic()),
    }
}

fn register_behavior(env: &mut TypeEnv, decl: &ast::BehaviorDecl, bag: &mut DiagnosticBag) {
    if !check_name_free(env, &decl.name, decl.span, bag) {
        return;
    }
    let scope = ParamScope::from_decl(&decl.type_params);
    let mut methods = Vec::with_capacity(decl.methods.len());
    for method in &decl.methods {
        let method_scope = scope.extended(&method.type_params);
        if let Some(sig) = resolve_signature(env, method, &method_scope, bag) {
            methods.push(BehaviorMethod {
                this: method.this,
                sig,
                default: method.body.is_some().then(|| method.clone()),
            });
        }
    }
    env.behaviors.insert(
        decl.name.clone(),
        BehaviorDef {
            name: decl.name.clone(),
            type_params: scope.type_params,
            required: decl.required.clone(),
            methods,
            span: decl.span,
        },
    );
}

fn register_class(
    env: &mut TypeEnv,
    module: &ast::Module,
    decl: &ast::ClassDecl,
    bag: &mut DiagnosticBag,
) {
    if !check_name_free(env, &decl.name, decl.span, bag) {
        return;
    }
    let scope = ParamScope::from_decl(&decl.type_params);
    let mut fields = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        match env.resolve_type_expr(&field.ty, &scope) {
            Ok(ty) => fields.push(ClassFieldDef {
                visibility: field.visibility,
                name: field.name.clone(),
                ty,
                is_static: field.is_static,
            }),
            Err(err) => bag.push(err.into_diagnostic()),
        }
    }
    let mut methods = Vec::with_capacity(decl.methods.len());
    for method in &decl.methods {
        let method_scope = scope.extended(&method.type_params);
        if let Some(sig) = resolve_signature(env, method, &method_scope, bag) {
            methods.push(MethodDef {
                this: method.this,
                visibility: method.visibility,
                sig,
                func: method.clone(),
            });
        }
    }
    env.classes.insert(
        decl.name.clone(),
        ClassDef {
            name: decl.name.clone(),
            module_path: module.path.clone(),
            base: decl.base.clone(),
            type_params: scope.type_params,
            fields,
            methods,
            is_library: module.is_library,
            span: decl.span,
        },
    );
}

fn register_function(
    env: &mut TypeEnv,
    module: &ast::Module,
    func: &ast::Function,
    bag: &mut DiagnosticBag,
) {
    if env.functions.contains_key(&func.name) {
        bag.push(
            TypeError::DuplicateDecl {
                name: func.name.clone(),
                span: func.span,
            }
            .into_diagnostic(),
        );
        return;
    }
    let scope = ParamScope::from_decl(&func.type_params);
    if let Some(sig) = resolve_signature(env, func, &scope, bag) {
        env.functions.insert(
            func.name.clone(),
            FuncDef {
                sig,
                func: func.clone(),
                is_library: module.is_library,
            },
        );
    }
}

fn register_impl(
    env: &mut TypeEnv,
    module: &ast::Module,
    block: &ast::ImplBlock,
    bag: &mut DiagnosticBag,
) {
    let scope = ParamScope::from_decl(&block.type_params);

    let (target_name, target_args) = match &block.target {
        TypeExpr::Named { name, args, .. } => {
            let resolved = args
                .iter()
                .filter_map(|a| match env.resolve_type_expr(a, &scope) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        bag.push(err.into_diagnostic());
                        None
                    }
                })
                .collect();
            (name.clone(), resolved)
        }
        other => {
            bag.push(
                TypeError::UnknownType {
                    name: format!("{other:?}"),
                    span: block.span,
                }
                .into_diagnostic(),
            );
            return;
        }
    };

    let behavior = match &block.behavior {
        Some((name, args)) => {
            if !env.behaviors.contains_key(name) {
                bag.push(
                    TypeError::UnknownType {
                        name: name.clone(),
                        span: block.span,
                    }
                    .into_diagnostic(),
                );
                return;
            }
            let resolved = args
                .iter()
                .filter_map(|a| match env.resolve_type_expr(a, &scope) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        bag.push(err.into_diagnostic());
                        None
                    }
                })
                .collect();
            Some((name.clone(), resolved))
        }
        None => None,
    };

    let mut methods = Vec::with_capacity(block.methods.len());
    for method in &block.methods {
        let method_scope = scope.extended(&method.type_params);
        if let Some(sig) = resolve_signature(env, method, &method_scope, bag) {
            methods.push(MethodDef {
                this: method.this,
                visibility: method.visibility,
                sig,
                func: method.clone(),
            });
        }
    }

    // A behavior impl must provide every method the behavior declares,
    // unless the behavior carries a default body for it.
    if let Some((behavior_name, _)) = &behavior {
        let behavior_def = env.behaviors.get(behavior_name).cloned();
        if let Some(def) = behavior_def {
            for required in &def.methods {
                let provided = methods.iter().any(|m| m.sig.name == required.sig.name);
                if !provided && required.default.is_none() {
                    bag.push(
                        TypeError::MissingImplMethod {
                            behavior: behavior_name.clone(),
                            method: required.sig.name.clone(),
                            ty: target_name.clone(),
                            span: block.span,
                        }
                        .into_diagnostic(),
                    );
                }
            }
        }
    }

    let where_clauses = block
        .where_clauses
        .iter()
        .map(|w| (w.param.clone(), w.bounds.clone()))
        .collect();

    env.add_impl(ImplDef {
        target_name,
        target_args,
        type_params: scope.type_params,
        where_clauses,
        behavior,
        methods,
        is_library: module.is_library,
        span: block.span,
    });
}

/// Resolve an AST function to a [`FuncSig`]. `Self`/`This` in signatures is
/// left to the method-resolution substitution map.
fn resolve_signature(
    env: &mut TypeEnv,
    func: &ast::Function,
    scope: &ParamScope,
    bag: &mut DiagnosticBag,
) -> Option<FuncSig> {
    let mut params = Vec::with_capacity(func.params.len());
    let mut ok = true;
    for param in &func.params {
        match env.resolve_type_expr(&param.ty, scope) {
            Ok(ty) => params.push(ty),
            Err(err) => {
                bag.push(err.into_diagnostic());
                ok = false;
            }
        }
    }
    let return_type = match &func.return_type {
        Some(ty) => match env.resolve_type_expr(ty, scope) {
            Ok(id) => id,
            Err(err) => {
                bag.push(err.into_diagnostic());
                ok = false;
                env.interner.unit()
            }
        },
        None => env.interner.unit(),
    };
    if !ok {
        return None;
    }
    Some(FuncSig {
        name: func.name.clone(),
        params,
        return_type,
        type_params: scope.type_params.clone(),
        const_params: scope.const_params.clone(),
        is_async: func.is_async,
        span: func.span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tml_common::Span;

    fn struct_decl(name: &str) -> ast::StructDecl {
        ast::StructDecl {
            name: name.into(),
            type_params: vec![],
            fields: vec![],
            derives: vec![],
            span: Span::dummy(),
        }
    }

    #[test]
    fn reserved_name_is_t038() {
        let mut env = TypeEnv::new();
        let mut bag = DiagnosticBag::new();
        let mut module = ast::Module::new(vec![]);
        module.structs.push(struct_decl("I32"));
        register_module(&mut env, &module, &mut bag);
        assert_eq!(bag.diagnostics()[0].code, "T038");
        assert!(!env.structs.contains_key("I32"));
    }

    #[test]
    fn flags_u8_with_nine_variants_is_t083() {
        let mut env = TypeEnv::new();
        let mut bag = DiagnosticBag::new();
        let mut module = ast::Module::new(vec![]);
        let variants = (0..9)
            .map(|i| ast::EnumVariant {
                name: format!("V{i}"),
                payload: vec![],
                discriminant: None,
                span: Span::dummy(),
            })
            .collect();
        module.enums.push(ast::EnumDecl {
            name: "Perm".into(),
            type_params: vec![],
            variants,
            derives: vec![],
            flags: Some(ast::FlagsAttr {
                width: PrimKind::U8,
                span: Span::dummy(),
            }),
            span: Span::dummy(),
        });
        register_module(&mut env, &module, &mut bag);
        assert!(bag.diagnostics().iter().any(|d| d.code == "T083"));
    }

    #[test]
    fn flags_discriminants_auto_assign_powers_of_two() {
        let mut env = TypeEnv::new();
        let mut bag = DiagnosticBag::new();
        let mut module = ast::Module::new(vec![]);
        let variants = ["Read", "Write", "Exec"]
            .iter()
            .map(|n| ast::EnumVariant {
                name: (*n).into(),
                payload: vec![],
                discriminant: None,
                span: Span::dummy(),
            })
            .collect();
        module.enums.push(ast::EnumDecl {
            name: "Perm".into(),
            type_params: vec![],
            variants,
            derives: vec![],
            flags: Some(ast::FlagsAttr {
                width: PrimKind::U8,
                span: Span::dummy(),
            }),
            span: Span::dummy(),
        });
        register_module(&mut env, &module, &mut bag);
        assert!(!bag.has_errors());
        let def = env.enums.get("Perm").expect("registered");
        let tags: Vec<i128> = def.variants.iter().map(|v| v.discriminant).collect();
        assert_eq!(tags, vec![1, 2, 4]);
    }

    #[test]
    fn duplicate_struct_is_t039() {
        let mut env = TypeEnv::new();
        let mut bag = DiagnosticBag::new();
        let mut module = ast::Module::new(vec![]);
        module.structs.push(struct_decl("Point"));
        module.structs.push(struct_decl("Point"));
        register_module(&mut env, &module, &mut bag);
        assert!(bag.diagnostics().iter().any(|d| d.code == "T039"));
    }
}
