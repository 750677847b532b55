//! End-to-end emission tests: constructed AST -> checked -> IR text.

use tml_ast as ast;
use tml_ast::{Builder, PrimKind, TypeExpr};
use tml_codegen::{generate, GenOptions};
use tml_typeck::check_modules;

fn emit(module: ast::Module) -> String {
    emit_with(module, GenOptions::default())
}

fn emit_with(module: ast::Module, options: GenOptions) -> String {
    let mut result = check_modules(std::slice::from_ref(&module));
    assert!(
        !result.has_errors(),
        "check errors: {:?}",
        result.diagnostics.diagnostics()
    );
    let gen = generate(&mut result.env, &result.typed, &[module], "test", options);
    assert!(
        !gen.diagnostics.has_errors(),
        "codegen errors: {:?}",
        gen.diagnostics.diagnostics()
    );
    gen.ir
}

/// An all-literal concat chain folds into one interned global and no
/// runtime concatenation call.
#[test]
fn literal_concat_chain_folds_to_one_global() {
    let b = Builder::new();
    let chain = {
        let ab = b.add(b.string("a"), b.string("b"));
        let abc = b.add(ab, b.string("c"));
        b.add(abc, b.string("d"))
    };
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(vec![b.let_stmt("s", chain)], None),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("c\"abcd\\00\""), "folded global missing:\n{ir}");
    assert!(
        !ir.contains("call ptr @str_concat_opt"),
        "unexpected runtime concat:\n{ir}"
    );
}

/// Interning is by byte content: a folded "ab" and a written "ab" share
/// one global.
#[test]
fn folded_and_written_literals_share_a_global() {
    let b = Builder::new();
    let folded = b.add(b.string("a"), b.string("b"));
    let written = b.string("ab");
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![b.let_stmt("x", folded), b.let_stmt("y", written)],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert_eq!(
        ir.matches("c\"ab\\00\"").count(),
        1,
        "expected a single interned global:\n{ir}"
    );
}

/// The generic-List program lowers to runtime list calls.
#[test]
fn generic_list_program_lowers_to_runtime_calls() {
    let b = Builder::new();
    let new_call = b.method_generic(
        b.ident("List"),
        "new",
        vec![TypeExpr::prim(PrimKind::I32)],
        vec![],
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_mut("xs", None, new_call),
                b.expr_stmt(b.method(b.ident("xs"), "push", vec![b.int(1)])),
                b.expr_stmt(b.method(b.ident("xs"), "push", vec![b.int(2)])),
                b.let_stmt("n", b.method(b.ident("xs"), "len", vec![])),
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("call ptr @list_new"));
    assert_eq!(ir.matches("call void @list_push").count(), 2);
    assert!(ir.contains("call i64 @list_len"));
}

/// `when` over an Outcome: tag extraction from field 0, one body block per
/// arm, and payload binding GEPs.
#[test]
fn outcome_when_extracts_tag_and_payload() {
    let b = Builder::new();
    let outcome_ty = TypeExpr::generic(
        "Outcome",
        vec![TypeExpr::prim(PrimKind::I32), TypeExpr::prim(PrimKind::Str)],
    );
    let fetch = b.func(
        "fetch",
        vec![],
        Some(outcome_ty),
        b.block(
            vec![b.ret(Some(b.call(b.path(&["Outcome", "Ok"]), vec![b.int(42)])))],
            None,
        ),
    );
    let when = b.when(
        b.call(b.ident("fetch"), vec![]),
        vec![
            b.arm(b.variant_pat(None, "Ok", vec![b.bind("v")]), b.ident("v")),
            b.arm(b.variant_pat(None, "Err", vec![b.bind("e")]), b.int(0)),
        ],
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(vec![b.let_stmt("r", when)], None),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(fetch);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("%enum.Outcome__I32__Str = type { i32,"));
    // Tag compare against Ok (0) and Err (1).
    assert!(ir.contains("icmp eq i32"));
    assert!(ir.contains("when.arm"));
    assert!(ir.contains("when.end"));
}

/// `for i in 0 to 10` uses an exclusive bound; `through` is inclusive.
#[test]
fn range_loops_use_exclusive_and_inclusive_compares() {
    let b = Builder::new();
    let exclusive_body = b.block(vec![], None);
    let inclusive_body = b.block(vec![], None);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.for_stmt(
                    b.bind("i"),
                    b.range(b.int(0), b.int(10), false),
                    exclusive_body,
                ),
                b.for_stmt(
                    b.bind("j"),
                    b.range(b.int(0), b.int(10), true),
                    inclusive_body,
                ),
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("icmp slt i32"), "exclusive bound missing:\n{ir}");
    assert!(ir.contains("icmp sle i32"), "inclusive bound missing:\n{ir}");
    // Iteration frames are reclaimed.
    assert!(ir.contains("call ptr @llvm.stacksave()"));
    assert!(ir.contains("call void @llvm.stackrestore(ptr"));
}

/// A wider integer value stored into an I8 binding truncates via `trunc`.
#[test]
fn wider_int_truncates_into_i8() {
    let b = Builder::new();
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("y", b.int(300)),
                b.let_typed("x", TypeExpr::prim(PrimKind::I8), b.ident("y")),
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(
        ir.contains("trunc i32") && ir.contains("to i8"),
        "expected i32->i8 trunc:\n{ir}"
    );
}

/// Bitflag enums lower to bare integers: `bits` is the identity, `add` is
/// `or`, `has` masks and compares.
#[test]
fn bitflags_lower_to_integer_ops() {
    let b = Builder::new();
    let mut module = ast::Module::new(vec![]);
    module.enums.push(ast::EnumDecl {
        name: "Perm".into(),
        type_params: vec![],
        variants: ["Read", "Write", "Exec"]
            .iter()
            .map(|n| ast::EnumVariant {
                name: (*n).into(),
                payload: vec![],
                discriminant: None,
                span: tml_common::Span::dummy(),
            })
            .collect(),
        derives: vec![],
        flags: Some(ast::FlagsAttr {
            width: PrimKind::U8,
            span: tml_common::Span::dummy(),
        }),
        span: tml_common::Span::dummy(),
    });

    let combined = b.method(
        b.path(&["Perm", "Read"]),
        "add",
        vec![b.path(&["Perm", "Write"])],
    );
    let has = b.method(combined, "has", vec![b.path(&["Perm", "Read"])]);
    let bits = b.method(b.path(&["Perm", "Exec"]), "bits", vec![]);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![b.let_stmt("ok", has), b.let_stmt("raw", bits)],
            None,
        ),
    );
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("or i8"), "flags add missing:\n{ir}");
    assert!(ir.contains("and i8"), "flags has mask missing:\n{ir}");
    assert!(ir.contains("icmp ne i8"), "flags has test missing:\n{ir}");
    // Exec auto-assigns bit 4.
    assert!(ir.contains("store i8 4") || ir.contains(" 4, ptr"), "power-of-two tag missing:\n{ir}");
}

/// Maybe::unwrap panics on Nothing through the runtime.
#[test]
fn maybe_unwrap_emits_panic_path() {
    let b = Builder::new();
    let just = b.call(b.path(&["Maybe", "Just"]), vec![b.int(7)]);
    let unwrap = b.method(b.ident("m"), "unwrap", vec![]);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![b.let_stmt("m", just), b.let_stmt("v", unwrap)],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("call void @panic(ptr"));
    assert!(ir.contains("unreachable"));
    assert!(ir.contains("unwrap.fail"));
}

/// The same input emits byte-identical IR on a second run.
#[test]
fn emission_is_deterministic() {
    let build = || {
        let b = Builder::new();
        let chain = b.add(b.add(b.string("x"), b.string("y")), b.ident("tail"));
        let main = b.func(
            "main",
            vec![("tail", TypeExpr::prim(PrimKind::Str))],
            None,
            b.block(vec![b.let_stmt("s", chain)], None),
        );
        let mut module = ast::Module::new(vec![]);
        module.functions.push(main);
        module
    };
    let first = emit(build());
    let second = emit(build());
    assert_eq!(first, second);
}

/// Generic functions monomorphize once per distinct argument set, with
/// stable mangled symbols.
#[test]
fn generic_function_monomorphizes_per_type() {
    let b = Builder::new();
    let identity = b.generic_func(
        "identity",
        vec![ast::TypeParam::Type {
            name: "T".into(),
            bounds: vec![],
        }],
        vec![],
        vec![("x", TypeExpr::named("T"))],
        Some(TypeExpr::named("T")),
        b.block(vec![], Some(b.ident("x"))),
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("a", b.call(b.ident("identity"), vec![b.int(1)])),
                b.let_stmt("c", b.call(b.ident("identity"), vec![b.string("s")])),
                b.let_stmt("d", b.call(b.ident("identity"), vec![b.int(2)])),
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(identity);
    module.functions.push(main);

    let ir = emit(module);
    assert_eq!(ir.matches("define linkonce_odr i32 @identity__I32(").count(), 1);
    assert_eq!(ir.matches("define linkonce_odr ptr @identity__Str(").count(), 1);
    assert_eq!(ir.matches("call i32 @identity__I32(").count(), 2);
}

/// Local symbols take the suite prefix; the entry point never does.
#[test]
fn suite_prefix_applies_to_local_functions() {
    let b = Builder::new();
    let helper = b.func(
        "helper",
        vec![],
        Some(TypeExpr::prim(PrimKind::I32)),
        b.block(vec![], Some(b.int(3))),
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![b.let_stmt("x", b.call(b.ident("helper"), vec![]))],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(helper);
    module.functions.push(main);

    let ir = emit_with(
        module,
        GenOptions {
            suite: "app".into(),
            coverage: false,
        },
    );
    assert!(ir.contains("define i32 @tml_app_helper("));
    assert!(ir.contains("call i32 @tml_app_helper("));
    assert!(ir.contains("define void @main("));
}

/// Coverage hooks fire at builtin method call sites when enabled.
#[test]
fn coverage_hooks_emit_at_builtin_sites() {
    let b = Builder::new();
    let len = b.method(b.string("abc"), "len", vec![]);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(vec![b.let_stmt("n", len)], None),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit_with(
        module,
        GenOptions {
            suite: String::new(),
            coverage: true,
        },
    );
    assert!(ir.contains("call void @emit_coverage(ptr"));
    assert!(ir.contains("c\"Str::len\\00\""));
}

/// Closure calls split into a thin path (null environment, raw function
/// pointer) and a fat path (environment first), merged by a phi.
#[test]
fn closure_call_splits_thin_and_fat() {
    let b = Builder::new();
    let body = b.ident("x");
    let closure = b.expr(ast::ExprKind::Closure {
        params: vec![("x".to_string(), Some(TypeExpr::prim(PrimKind::I32)))],
        return_type: Some(TypeExpr::prim(PrimKind::I32)),
        body: Box::new(body),
    });
    let call = b.call(b.ident("f"), vec![b.int(3)]);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![b.let_stmt("f", closure), b.let_stmt("y", call)],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("closure.thin"), "thin path missing:\n{ir}");
    assert!(ir.contains("closure.fat"), "fat path missing:\n{ir}");
    assert!(ir.contains("icmp eq ptr"), "null env test missing:\n{ir}");
    assert!(ir.contains("phi i32"), "merge phi missing:\n{ir}");
    // The hoisted closure body exists as its own function.
    assert!(ir.contains("@\"main.closure1\""), "hoisted body missing:\n{ir}");
}

/// `break` drops only the loop body's scopes; values in enclosing scopes
/// drop exactly once, where their own scope closes.
#[test]
fn break_drops_only_loop_scopes() {
    let b = Builder::new();
    let mut module = ast::Module::new(vec![]);
    module.structs.push(ast::StructDecl {
        name: "Res".into(),
        type_params: vec![],
        fields: vec![],
        derives: vec![],
        span: tml_common::Span::dummy(),
    });
    let new_body = b.block(
        vec![],
        Some(b.expr(ast::ExprKind::StructLit {
            name: "Res".into(),
            type_args: vec![],
            fields: vec![],
        })),
    );
    let drop_body = b.block(vec![], None);
    module.impls.push(ast::ImplBlock {
        target: TypeExpr::named("Res"),
        behavior: None,
        type_params: vec![],
        where_clauses: vec![],
        methods: vec![
            b.func("new", vec![], Some(TypeExpr::named("Res")), new_body),
            b.method_decl("drop", ast::ThisKind::MutRef, vec![], None, drop_body),
        ],
        span: tml_common::Span::dummy(),
    });

    let loop_body = b.block(
        vec![
            b.let_stmt("inner", b.call(b.path(&["Res", "new"]), vec![])),
            ast::Stmt::Break {
                span: tml_common::Span::dummy(),
            },
        ],
        None,
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("outer", b.call(b.path(&["Res", "new"]), vec![])),
                ast::Stmt::Loop {
                    body: loop_body,
                    span: tml_common::Span::dummy(),
                },
            ],
            None,
        ),
    );
    module.functions.push(main);

    let ir = emit(module);
    // One drop for `inner` at the break, one for `outer` at scope close --
    // never a second drop of `outer` on the break path.
    assert_eq!(
        ir.matches("call void @Res_drop(").count(),
        2,
        "expected exactly two drops:\n{ir}"
    );
    // The abandoned iteration's frame is restored on the break edge.
    assert_eq!(
        ir.matches("call void @llvm.stackrestore(ptr").count(),
        1,
        "expected the break edge to restore the frame:\n{ir}"
    );
}

/// `continue` balances the per-iteration stacksave before branching back.
#[test]
fn continue_restores_the_iteration_frame() {
    let b = Builder::new();
    let cond = b.binary(ast::BinOp::Lt, b.ident("i"), b.int(3));
    let body = b.block(
        vec![
            ast::Stmt::Assign {
                target: b.ident("i"),
                op: None,
                value: b.add(b.ident("i"), b.int(1)),
                span: tml_common::Span::dummy(),
            },
            ast::Stmt::Continue {
                span: tml_common::Span::dummy(),
            },
        ],
        None,
    );
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_mut("i", None, b.int(0)),
                ast::Stmt::While {
                    cond,
                    body,
                    span: tml_common::Span::dummy(),
                },
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert_eq!(ir.matches("call ptr @llvm.stacksave()").count(), 1);
    assert_eq!(
        ir.matches("call void @llvm.stackrestore(ptr").count(),
        1,
        "continue must restore the frame it entered with:\n{ir}"
    );
}

/// Widening an unsigned value zero-extends; sign extension would corrupt
/// values with the high bit set.
#[test]
fn unsigned_widening_zero_extends() {
    let b = Builder::new();
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_typed("y", TypeExpr::prim(PrimKind::U8), b.int(200)),
                b.let_typed("x", TypeExpr::prim(PrimKind::U32), b.ident("y")),
            ],
            None,
        ),
    );
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let ir = emit(module);
    assert!(
        ir.contains("zext i8") && ir.contains("to i32"),
        "expected u8->u32 zext:\n{ir}"
    );
    assert!(!ir.contains("sext i8"), "sign extension of U8:\n{ir}");
}

/// Derived `to_string` renders field contents, not just the type name.
#[test]
fn derived_to_string_renders_fields() {
    let b = Builder::new();
    let mut module = ast::Module::new(vec![]);
    module.structs.push(ast::StructDecl {
        name: "Point".into(),
        type_params: vec![],
        fields: vec![
            ast::Field {
                name: "x".into(),
                ty: TypeExpr::prim(PrimKind::I32),
                span: tml_common::Span::dummy(),
            },
            ast::Field {
                name: "label".into(),
                ty: TypeExpr::prim(PrimKind::Str),
                span: tml_common::Span::dummy(),
            },
        ],
        derives: vec![ast::Derive::Display, ast::Derive::Serialize],
        span: tml_common::Span::dummy(),
    });

    let lit = b.expr(ast::ExprKind::StructLit {
        name: "Point".into(),
        type_args: vec![],
        fields: vec![("x".into(), b.int(4)), ("label".into(), b.string("origin"))],
    });
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("p", lit),
                b.let_stmt("s", b.method(b.ident("p"), "to_string", vec![])),
                b.let_stmt("j", b.method(b.ident("p"), "serialize", vec![])),
            ],
            None,
        ),
    );
    module.functions.push(main);

    let ir = emit(module);
    assert!(ir.contains("define linkonce_odr ptr @Point_to_string("));
    assert!(ir.contains("c\"Point(\\00\""), "display prefix missing:\n{ir}");
    assert!(
        ir.contains("call ptr @str_from_i64"),
        "integer field not rendered:\n{ir}"
    );
    assert!(
        ir.contains("call ptr @str_concat_opt"),
        "field pieces not joined:\n{ir}"
    );
    // Serialize names the fields rather than just the type.
    assert!(ir.contains("define linkonce_odr ptr @Point_serialize("));
    assert!(
        ir.contains("c\"\\22x\\22:\\00\""),
        "serialized field key missing:\n{ir}"
    );
}
