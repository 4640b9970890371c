use indexmap::IndexSet;

use siderite_asr::{Symbol, SymbolId, verify};
use siderite_core::DiagnosticKind;
use siderite_syntax as ast;

use super::test_support::*;

fn plus_interface() -> ast::Decl {
    ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::Generic(ident("plus")),
        items: vec![ast::InterfaceItem::ModuleProcedure(vec![])],
        span: sp(),
    })
}

fn generic_module(name: &str, procs: &[&str]) -> ast::Item {
    let interface = ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::Generic(ident("plus")),
        items: vec![ast::InterfaceItem::ModuleProcedure(
            procs.iter().map(|p| ident(p)).collect(),
        )],
        span: sp(),
    });
    let contains = procs
        .iter()
        .map(|p| {
            function(
                p,
                &["a"],
                vec![typed_decl(
                    ast::TypeSpec::Integer { kind: None },
                    vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
                    &["a"],
                )],
                vec![],
            )
        })
        .collect();
    module(name, vec![interface], contains)
}

fn aggregate_names(resolved: &Resolved, scope_name: &str, aggregate: &str) -> IndexSet<String> {
    let resolution = resolved.resolution.as_ref().expect("resolution succeeded");
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let scope = resolved.asr.get_symbol(global, scope_name).unwrap();
    let table = resolved.asr.symbol(scope).symtab().unwrap();
    let agg = resolved
        .asr
        .get_symbol(table, aggregate)
        .unwrap_or_else(|| panic!("`{aggregate}` not found in `{scope_name}`"));
    let procs: &[SymbolId] = match resolved.asr.symbol(agg) {
        Symbol::GenericProcedure(g) => &g.procs,
        Symbol::CustomOperator(c) => &c.procs,
        other => panic!("`{aggregate}` is a {}", other.kind_name()),
    };
    procs
        .iter()
        .map(|p| {
            resolved
                .asr
                .symbol(resolved.asr.get_past_external(*p))
                .name()
                .unwrap()
                .to_string()
        })
        .collect()
}

#[test]
fn use_imports_the_public_surface_as_externals() {
    let tree = unit(vec![
        module(
            "m",
            vec![],
            vec![function("foo", &[], vec![], vec![])],
        ),
        program(
            "main",
            vec![use_module("m"), int_decl(&["x"])],
            vec![assign("x", ast::Expr::Call {
                callee: ident("foo"),
                args: vec![],
                span: sp(),
            })],
            vec![],
        ),
    ]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    let foo = resolved.asr.get_symbol(table, "foo").unwrap();
    let Symbol::External(e) = resolved.asr.symbol(foo) else {
        panic!("imported `foo` is an external");
    };
    assert_eq!(e.module_name, "m");
    assert_eq!(e.original_name, "foo");
    assert!(e.target.is_some());

    // Program dependencies carry the origin module.
    let Symbol::Program(p) = resolved.asr.symbol(main) else {
        panic!("main is a program");
    };
    assert_eq!(p.dependencies, vec!["m".to_string()]);
}

#[test]
fn local_declaration_shadows_an_import_with_a_warning() {
    // `use m` brings in `foo`; the local `integer :: foo` takes over.
    let tree = unit(vec![
        module(
            "m",
            vec![],
            vec![function("foo", &[], vec![], vec![])],
        ),
        program(
            "main",
            vec![use_module("m"), int_decl(&["foo"])],
            vec![assign("foo", int(3))],
            vec![],
        ),
    ]);
    let resolved = expect_resolved(&tree);
    assert!(resolved.diag.has_warnings());
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::ShadowedImport)
    );

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    let foo = resolved.asr.get_symbol(table, "foo").unwrap();
    assert!(matches!(resolved.asr.symbol(foo), Symbol::Variable(_)));
}

#[test]
fn only_list_imports_selectively_with_renames() {
    let tree = unit(vec![
        module(
            "m",
            vec![],
            vec![
                function("foo", &[], vec![], vec![]),
                function("bar", &[], vec![], vec![]),
            ],
        ),
        program(
            "main",
            vec![use_only("m", &[("foo", Some("alias"))])],
            vec![],
            vec![],
        ),
    ]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    // Only the renamed import exists.
    assert!(resolved.asr.get_symbol(table, "bar").is_none());
    assert!(resolved.asr.get_symbol(table, "foo").is_none());
    let alias = resolved.asr.get_symbol(table, "alias").unwrap();
    let Symbol::External(e) = resolved.asr.symbol(alias) else {
        panic!("alias is an external");
    };
    assert_eq!(e.original_name, "foo");
}

#[test]
fn only_import_of_a_missing_name_is_an_error() {
    let tree = unit(vec![
        module("m", vec![], vec![]),
        program(
            "main",
            vec![use_only("m", &[("ghost", None)])],
            vec![],
            vec![],
        ),
    ]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
    );
}

#[test]
fn missing_module_is_reported() {
    let tree = unit(vec![program(
        "main",
        vec![use_module("nowhere")],
        vec![],
        vec![],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::ModuleNotFound)
    );
}

#[test]
fn generic_sets_merge_across_two_uses() {
    let tree = unit(vec![
        generic_module("a", &["pa1", "pa2"]),
        generic_module("b", &["pb1"]),
        program(
            "main",
            vec![use_module("a"), use_module("b")],
            vec![],
            vec![],
        ),
    ]);
    let resolved = expect_resolved(&tree);

    let names = aggregate_names(&resolved, "main", "plus");
    let expected: IndexSet<String> = ["pa1", "pa2", "pb1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn generic_merge_is_commutative_as_a_set() {
    let forward = unit(vec![
        generic_module("a", &["pa1", "pa2"]),
        generic_module("b", &["pb1"]),
        program(
            "main",
            vec![use_module("a"), use_module("b")],
            vec![],
            vec![],
        ),
    ]);
    let backward = unit(vec![
        generic_module("a", &["pa1", "pa2"]),
        generic_module("b", &["pb1"]),
        program(
            "main",
            vec![use_module("b"), use_module("a")],
            vec![],
            vec![],
        ),
    ]);

    let forward = expect_resolved(&forward);
    let backward = expect_resolved(&backward);

    let mut from_forward: Vec<String> =
        aggregate_names(&forward, "main", "plus").into_iter().collect();
    let mut from_backward: Vec<String> =
        aggregate_names(&backward, "main", "plus").into_iter().collect();
    from_forward.sort();
    from_backward.sort();
    assert_eq!(from_forward, from_backward);
}

#[test]
fn merging_the_same_module_twice_is_idempotent() {
    let tree = unit(vec![
        generic_module("a", &["pa1", "pa2"]),
        program(
            "main",
            vec![use_module("a"), use_module("a")],
            vec![],
            vec![],
        ),
    ]);
    let resolved = resolve_unit(&tree);
    assert!(!resolved.diag.has_errors());
    let names = aggregate_names(&resolved, "main", "plus");
    assert_eq!(names.len(), 2);
}

#[test]
fn private_constituents_import_under_mangled_names() {
    // `helper` is private; only the aggregate exposes it.
    let mut helper = function(
        "helper",
        &["a"],
        vec![typed_decl(
            ast::TypeSpec::Integer { kind: None },
            vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
            &["a"],
        )],
        vec![],
    );
    helper.attrs.access = Some(ast::Access::Private);
    let interface = ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::Generic(ident("plus")),
        items: vec![ast::InterfaceItem::ModuleProcedure(vec![ident("helper")])],
        span: sp(),
    });
    let tree = unit(vec![
        module("m", vec![interface], vec![helper]),
        program("main", vec![use_module("m")], vec![], vec![]),
    ]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    // Not importable directly, only through the aggregate's mangled name.
    assert!(resolved.asr.get_symbol(table, "helper").is_none());
    let mangled = resolved.asr.get_symbol(table, "helper@plus").unwrap();
    assert!(matches!(resolved.asr.symbol(mangled), Symbol::External(_)));

    let names = aggregate_names(&resolved, "main", "plus");
    assert!(names.contains("helper"));
}

#[test]
fn operator_interfaces_become_custom_operators() {
    let interface = ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::Operator(ast::OpTag::Add),
        items: vec![ast::InterfaceItem::ModuleProcedure(vec![ident("vec_add")])],
        span: sp(),
    });
    let tree = unit(vec![
        module(
            "m",
            vec![interface],
            vec![function(
                "vec_add",
                &["a", "b"],
                vec![typed_decl(
                    ast::TypeSpec::Integer { kind: None },
                    vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
                    &["a", "b"],
                )],
                vec![],
            )],
        ),
        program("main", vec![use_module("m")], vec![], vec![]),
    ]);
    let resolved = expect_resolved(&tree);

    // The operator aggregate exists in the module and merges into the
    // program on use.
    let in_module = aggregate_names(&resolved, "m", "~add");
    assert!(in_module.contains("vec_add"));
    let in_main = aggregate_names(&resolved, "main", "~add");
    assert!(in_main.contains("vec_add"));

    let resolution = resolved.resolution.as_ref().unwrap();
    verify(&resolved.asr, resolution.unit, true).expect("operators verify");
}

#[test]
fn defined_operator_uses_the_reserved_spelling() {
    let interface = ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::DefinedOperator(ident(".cross.")),
        items: vec![ast::InterfaceItem::ModuleProcedure(vec![ident("cross_impl")])],
        span: sp(),
    });
    let tree = unit(vec![module(
        "m",
        vec![interface],
        vec![function(
            "cross_impl",
            &["a", "b"],
            vec![typed_decl(
                ast::TypeSpec::Integer { kind: None },
                vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
                &["a", "b"],
            )],
            vec![],
        )],
    )]);
    let resolved = expect_resolved(&tree);

    let names = aggregate_names(&resolved, "m", "~~cross~~");
    assert!(names.contains("cross_impl"));
}

#[test]
fn generic_name_collision_renames_the_constituent() {
    // The generic `norm` aggregates a procedure also called `norm`.
    let interface = ast::Decl::Interface(ast::Interface {
        kind: ast::InterfaceKind::Generic(ident("norm")),
        items: vec![ast::InterfaceItem::ModuleProcedure(vec![ident("norm")])],
        span: sp(),
    });
    let tree = unit(vec![module(
        "m",
        vec![interface],
        vec![function(
            "norm",
            &["a"],
            vec![typed_decl(
                ast::TypeSpec::Integer { kind: None },
                vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
                &["a"],
            )],
            vec![],
        )],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();

    let generic = resolved.asr.get_symbol(table, "norm").unwrap();
    assert!(matches!(
        resolved.asr.symbol(generic),
        Symbol::GenericProcedure(_)
    ));
    let renamed = resolved
        .asr
        .get_symbol(table, "norm__lcompilers")
        .expect("constituent moved aside");
    assert!(matches!(resolved.asr.symbol(renamed), Symbol::Function(_)));
}

#[test]
fn unused_empty_interface_contributes_nothing() {
    let tree = unit(vec![
        module("m", vec![plus_interface()], vec![]),
        program("main", vec![use_module("m")], vec![], vec![]),
    ]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let table = resolved.asr.symbol(main).symtab().unwrap();
    assert!(resolved.asr.get_symbol(table, "plus").is_none());
}
