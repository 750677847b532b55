//! Integration tests for the type checker, driving whole modules through
//! both passes with constructed ASTs.

use tml_ast as ast;
use tml_ast::{BinOp, Builder, PrimKind, TypeExpr, TypeParam, WhereClause};
use tml_typeck::{check_modules, DispatchKind};

/// `func main() { let xs = List[I32]::new(); xs.push(1); xs.push(2); let n = xs.len(); }`
#[test]
fn generic_list_program_checks() {
    let b = Builder::new();

    let new_call = {
        let receiver = b.ident("List");
        b.method_generic(
            receiver,
            "new",
            vec![TypeExpr::prim(PrimKind::I32)],
            vec![],
        )
    };
    let let_xs = b.let_mut("xs", None, new_call);
    let push1 = {
        let xs = b.ident("xs");
        let one = b.int(1);
        b.method(xs, "push", vec![one])
    };
    let push2 = {
        let xs = b.ident("xs");
        let two = b.int(2);
        b.method(xs, "push", vec![two])
    };
    let len_call = {
        let xs = b.ident("xs");
        b.method(xs, "len", vec![])
    };
    let push1_id = push1.id;
    let len_id = len_call.id;
    let let_n = b.let_stmt("n", len_call);

    let body = b.block(
        vec![
            let_xs,
            b.expr_stmt(push1),
            b.expr_stmt(push2),
            let_n,
        ],
        None,
    );
    let main = b.func("main", vec![], None, body);

    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let result = check_modules(&[module]);
    assert!(
        !result.has_errors(),
        "unexpected errors: {:?}",
        result.diagnostics.diagnostics()
    );

    let push_res = result.typed.resolutions.get(&push1_id).expect("push resolved");
    assert_eq!(push_res.kind, DispatchKind::Builtin);
    assert_eq!(push_res.target, "List::push");

    let len_ty = result.typed.expr_types.get(&len_id).expect("len typed");
    assert_eq!(result.env.interner.display(*len_ty), "I64");
}

/// A function returning `Outcome[I32, Str]` matched with `Ok(v)` / `Err(e)`.
#[test]
fn outcome_pattern_match_binds_payload_types() {
    let b = Builder::new();

    // func fetch() -> Outcome[I32, Str] { return Outcome::Ok(42) }
    let outcome_ty = TypeExpr::generic(
        "Outcome",
        vec![TypeExpr::prim(PrimKind::I32), TypeExpr::prim(PrimKind::Str)],
    );
    let ok_ctor = {
        let path = b.path(&["Outcome", "Ok"]);
        let fortytwo = b.int(42);
        b.call(path, vec![fortytwo])
    };
    let fetch_body = b.block(vec![b.ret(Some(ok_ctor))], None);
    let fetch = b.func("fetch", vec![], Some(outcome_ty), fetch_body);

    // func main() { when fetch() { Ok(v) => v, Err(e) => 0 } }
    let fetch_call = {
        let callee = b.ident("fetch");
        b.call(callee, vec![])
    };
    let ok_body = b.ident("v");
    let ok_body_id = ok_body.id;
    let v_pat = b.bind("v");
    let ok_arm = {
        let pat = b.variant_pat(None, "Ok", vec![v_pat]);
        b.arm(pat, ok_body)
    };
    let err_body = b.int(0);
    let e_pat = b.bind("e");
    let err_arm = {
        let pat = b.variant_pat(None, "Err", vec![e_pat]);
        b.arm(pat, err_body)
    };
    let when = b.when(fetch_call, vec![ok_arm, err_arm]);
    let main_body = b.block(vec![b.expr_stmt(when)], None);
    let main = b.func("main", vec![], None, main_body);

    let mut module = ast::Module::new(vec![]);
    module.functions.push(fetch);
    module.functions.push(main);

    let result = check_modules(&[module]);
    assert!(
        !result.has_errors(),
        "unexpected errors: {:?}",
        result.diagnostics.diagnostics()
    );

    let bindings = result
        .typed
        .pattern_bindings
        .get(&ok_body_id)
        .expect("ok arm bindings recorded");
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].0, "v");
    assert_eq!(result.env.interner.display(bindings[0].1), "I32");
}

/// `where T: Printable` rejected when the concrete type has no impl.
#[test]
fn unsatisfied_bound_is_t060() {
    let b = Builder::new();

    // behavior Printable { func print_me(ref this) -> Str }
    let behavior = ast::BehaviorDecl {
        name: "Printable".into(),
        type_params: vec![],
        required: vec![],
        methods: vec![{
            let body = None;
            let mut f = b.func("print_me", vec![], Some(TypeExpr::prim(PrimKind::Str)), b.block(vec![], None));
            f.body = body;
            f.this = Some(ast::ThisKind::Ref);
            f
        }],
        span: tml_common::Span::dummy(),
    };

    // func show[T](x: T) -> Unit where T: Printable { }
    let show = b.generic_func(
        "show",
        vec![TypeParam::Type {
            name: "T".into(),
            bounds: vec![],
        }],
        vec![WhereClause {
            param: "T".into(),
            bounds: vec!["Printable".into()],
        }],
        vec![("x", TypeExpr::named("T"))],
        None,
        b.block(vec![], None),
    );

    // func main() { show(1) }  -- I32 has no Printable impl
    let call = {
        let callee = b.ident("show");
        let one = b.int(1);
        b.call(callee, vec![one])
    };
    let main = b.func("main", vec![], None, b.block(vec![b.expr_stmt(call)], None));

    let mut module = ast::Module::new(vec![]);
    module.behaviors.push(behavior);
    module.functions.push(show);
    module.functions.push(main);

    let result = check_modules(&[module]);
    assert!(result.has_errors());
    assert!(result
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "T060"));
}

/// String + Integer is a T057 mismatch.
#[test]
fn string_plus_int_is_mismatch() {
    let b = Builder::new();
    let concat = {
        let lhs = b.string("a");
        let rhs = b.int(1);
        b.binary(BinOp::Add, lhs, rhs)
    };
    let main = b.func("main", vec![], None, b.block(vec![b.expr_stmt(concat)], None));
    let mut module = ast::Module::new(vec![]);
    module.functions.push(main);

    let result = check_modules(&[module]);
    assert!(result
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "T057"));
}

/// Private class members are rejected outside the class.
#[test]
fn private_method_outside_class_is_t061() {
    let b = Builder::new();

    let secret_body = b.block(vec![], Some(b.int(7)));
    let mut secret = b.method_decl(
        "secret",
        ast::ThisKind::Ref,
        vec![],
        Some(TypeExpr::prim(PrimKind::I32)),
        secret_body,
    );
    secret.visibility = ast::Visibility::Private;

    let class = ast::ClassDecl {
        name: "Vault".into(),
        base: None,
        type_params: vec![],
        fields: vec![],
        methods: vec![secret],
        span: tml_common::Span::dummy(),
    };

    // func main(v: Vault) { v.secret() }
    let call = {
        let v = b.ident("v");
        b.method(v, "secret", vec![])
    };
    let main = b.func(
        "main",
        vec![("v", TypeExpr::named("Vault"))],
        None,
        b.block(vec![b.expr_stmt(call)], None),
    );

    let mut module = ast::Module::new(vec![]);
    module.classes.push(class);
    module.functions.push(main);

    let result = check_modules(&[module]);
    assert!(result
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "T061"));
}
