use siderite_asr::{Symbol, Ty};
use siderite_core::DiagnosticKind;
use siderite_syntax as ast;

use super::test_support::*;

/// `requirement binop(u, g)` declaring `g(x, y) -> u` over `type(u)`.
fn binop_requirement() -> ast::Decl {
    let spec_fn = ast::Procedure {
        kind: ast::ProcKind::Function,
        name: ident("g"),
        args: vec![ident("x"), ident("y")],
        result: None,
        return_type: Some(ast::TypeSpec::Named { name: ident("u") }),
        attrs: ast::ProcAttrs::default(),
        decls: vec![typed_decl(
            ast::TypeSpec::Named { name: ident("u") },
            vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
            &["x", "y"],
        )],
        body: vec![],
        contains: vec![],
        span: sp(),
    };
    ast::Decl::Requirement(ast::Requirement {
        name: ident("binop"),
        params: vec![ident("u"), ident("g")],
        requires: vec![],
        decls: vec![ast::Decl::Interface(ast::Interface {
            kind: ast::InterfaceKind::Abstract,
            items: vec![ast::InterfaceItem::Procedure(spec_fn)],
            span: sp(),
        })],
        span: sp(),
    })
}

/// `template add_t(t, f)` requiring `binop(t, f)` with one function
/// `add(x, y) = f(x, y)`.
fn add_template() -> ast::Decl {
    let add = ast::Procedure {
        kind: ast::ProcKind::Function,
        name: ident("add"),
        args: vec![ident("x"), ident("y")],
        result: None,
        return_type: Some(ast::TypeSpec::Named { name: ident("t") }),
        attrs: ast::ProcAttrs::default(),
        decls: vec![typed_decl(
            ast::TypeSpec::Named { name: ident("t") },
            vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
            &["x", "y"],
        )],
        body: vec![ast::Stmt::Assignment {
            target: name("add"),
            value: ast::Expr::Call {
                callee: ident("f"),
                args: vec![
                    ast::CallArg::positional(name("x")),
                    ast::CallArg::positional(name("y")),
                ],
                span: sp(),
            },
            span: sp(),
        }],
        contains: vec![],
        span: sp(),
    };
    ast::Decl::Template(ast::Template {
        name: ident("add_t"),
        params: vec![ident("t"), ident("f")],
        requires: vec![ast::RequireClause {
            requirement: ident("binop"),
            args: vec![ident("t"), ident("f")],
            span: sp(),
        }],
        decls: vec![],
        contains: vec![add],
        span: sp(),
    })
}

fn instantiate_with_operator(local: &str) -> ast::Decl {
    ast::Decl::Instantiate(ast::Instantiate {
        template: ident("add_t"),
        args: vec![
            ast::InstantiateArg {
                kind: ast::InstantiateArgKind::Type(ast::TypeSpec::Integer { kind: None }),
                span: sp(),
            },
            ast::InstantiateArg {
                kind: ast::InstantiateArgKind::Operator(ast::OpTag::Add),
                span: sp(),
            },
        ],
        only: Some(vec![ast::UseSymbol {
            local: Some(ident(local)),
            remote: ident("add"),
        }]),
        span: sp(),
    })
}

#[test]
fn instantiation_with_an_intrinsic_operator() {
    let tree = unit(vec![program(
        "main",
        vec![
            binop_requirement(),
            add_template(),
            instantiate_with_operator("add_integer"),
        ],
        vec![],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();

    // The synthesised wrapper sits behind the `~add` overload set.
    let op = resolved.asr.get_symbol(table, "~add").unwrap();
    let Symbol::CustomOperator(c) = resolved.asr.symbol(op) else {
        panic!("~add is a custom operator");
    };
    assert_eq!(c.procs.len(), 1);
    let wrapper = c.procs[0];
    let Symbol::Function(w) = resolved.asr.symbol(wrapper) else {
        panic!("wrapper is a function");
    };
    assert_eq!(w.name, "add_integer__lcompilers");
    assert_eq!(w.signature.arg_types, vec![Ty::default_int(), Ty::default_int()]);

    // The instantiated function is a plain, non-generic function whose
    // dependency list carries the synthesised operator.
    let inst = resolved.asr.get_symbol(table, "add_integer").unwrap();
    let Symbol::Function(f) = resolved.asr.symbol(inst) else {
        panic!("add_integer is a function");
    };
    assert_eq!(f.signature.arg_types, vec![Ty::default_int(), Ty::default_int()]);
    assert_eq!(f.signature.return_type, Some(Ty::default_int()));
    assert!(
        f.dependencies
            .contains(&"add_integer__lcompilers".to_string())
    );
}

#[test]
fn instantiating_twice_produces_distinct_copies() {
    let tree = unit(vec![program(
        "main",
        vec![
            binop_requirement(),
            add_template(),
            instantiate_with_operator("add_a"),
            instantiate_with_operator("add_b"),
        ],
        vec![],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();

    let a = resolved.asr.get_symbol(table, "add_a").unwrap();
    let b = resolved.asr.get_symbol(table, "add_b").unwrap();
    assert_ne!(a, b);

    let (Symbol::Function(fa), Symbol::Function(fb)) =
        (resolved.asr.symbol(a), resolved.asr.symbol(b))
    else {
        panic!("both instantiations are functions");
    };
    // Symbol-distinct but structurally equal.
    assert_ne!(fa.table, fb.table);
    assert_eq!(fa.signature, fb.signature);
    assert_eq!(fa.args.len(), fb.args.len());

    // The wrapper is shared: synthesis is idempotent per (op, type).
    let op = resolved.asr.get_symbol(table, "~add").unwrap();
    let Symbol::CustomOperator(c) = resolved.asr.symbol(op) else {
        panic!("~add is a custom operator");
    };
    assert_eq!(c.procs.len(), 1);
}

#[test]
fn parameter_count_mismatch_is_template_misuse() {
    let inst = ast::Decl::Instantiate(ast::Instantiate {
        template: ident("add_t"),
        args: vec![ast::InstantiateArg {
            kind: ast::InstantiateArgKind::Type(ast::TypeSpec::Integer { kind: None }),
            span: sp(),
        }],
        only: None,
        span: sp(),
    });
    let tree = unit(vec![program(
        "main",
        vec![binop_requirement(), add_template(), inst],
        vec![],
        vec![],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::TemplateMisuse)
    );
}

#[test]
fn restriction_rejects_an_incompatible_function() {
    // `wrong` takes one argument; the restriction wants two.
    let wrong = function(
        "wrong",
        &["a"],
        vec![typed_decl(
            ast::TypeSpec::Integer { kind: None },
            vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
            &["a"],
        )],
        vec![],
    );
    let inst = ast::Decl::Instantiate(ast::Instantiate {
        template: ident("add_t"),
        args: vec![
            ast::InstantiateArg {
                kind: ast::InstantiateArgKind::Type(ast::TypeSpec::Integer { kind: None }),
                span: sp(),
            },
            ast::InstantiateArg {
                kind: ast::InstantiateArgKind::Symbol(ident("wrong")),
                span: sp(),
            },
        ],
        only: None,
        span: sp(),
    });
    let tree = unit(vec![
        module("helpers", vec![], vec![wrong]),
        program(
            "main",
            vec![
                use_module("helpers"),
                binop_requirement(),
                add_template(),
                inst,
            ],
            vec![],
            vec![],
        ),
    ]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::TemplateMisuse)
    );
}

#[test]
fn instantiating_a_non_template_is_template_misuse() {
    let inst = ast::Decl::Instantiate(ast::Instantiate {
        template: ident("x"),
        args: vec![],
        only: None,
        span: sp(),
    });
    let tree = unit(vec![program(
        "main",
        vec![int_decl(&["x"]), inst],
        vec![],
        vec![],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::TemplateMisuse)
    );
}

#[test]
fn template_body_types_stay_parametric_until_instantiation() {
    let tree = unit(vec![program(
        "main",
        vec![binop_requirement(), add_template()],
        vec![],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    let tpl = resolved.asr.get_symbol(table, "add_t").unwrap();
    let Symbol::Template(t) = resolved.asr.symbol(tpl) else {
        panic!("add_t is a template");
    };
    assert_eq!(t.params, vec!["t".to_string(), "f".to_string()]);

    let tpl_table = resolved.asr.symbol(tpl).symtab().unwrap();
    let add = resolved.asr.get_symbol(tpl_table, "add").unwrap();
    let Symbol::Function(f) = resolved.asr.symbol(add) else {
        panic!("add is a function");
    };
    assert_eq!(
        f.signature.arg_types,
        vec![
            Ty::TypeParameter { name: "t".to_string() },
            Ty::TypeParameter { name: "t".to_string() },
        ]
    );
}
