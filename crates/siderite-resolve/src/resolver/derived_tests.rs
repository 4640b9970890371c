use siderite_asr::{EnumKind, Symbol, Ty};
use siderite_core::DiagnosticKind;
use siderite_syntax as ast;

use super::test_support::*;

fn derived(name: &str, extends: Option<&str>, members: Vec<ast::TypeDecl>) -> ast::DerivedType {
    ast::DerivedType {
        name: ident(name),
        extends: extends.map(ident),
        is_abstract: false,
        bind_c: false,
        alignment: None,
        members,
        bindings: vec![],
        span: sp(),
    }
}

fn member(spec: ast::TypeSpec, attrs: Vec<ast::DeclAttr>, names: &[&str]) -> ast::TypeDecl {
    ast::TypeDecl {
        type_spec: spec,
        attrs,
        entities: names.iter().map(|n| entity(n)).collect(),
        span: sp(),
    }
}

fn binding(name: &str, target: Option<&str>, deferred: bool) -> ast::TypeBound {
    ast::TypeBound {
        name: ident(name),
        target: target.map(ident),
        deferred,
        nopass: false,
        pass_arg: None,
        span: sp(),
    }
}

#[test]
fn struct_members_keep_declaration_order() {
    let dt = derived(
        "point",
        None,
        vec![member(
            ast::TypeSpec::Real { kind: None },
            vec![],
            &["x", "y"],
        )],
    );
    let tree = unit(vec![module(
        "geometry",
        vec![ast::Decl::DerivedType(dt)],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "geometry").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let point = resolved.asr.get_symbol(table, "point").unwrap();
    let Symbol::Struct(s) = resolved.asr.symbol(point) else {
        panic!("point is a struct");
    };
    assert_eq!(s.members, vec!["x".to_string(), "y".to_string()]);
    assert!(s.parent.is_none());
}

#[test]
fn self_referential_member_resolves_through_the_sentinel() {
    let dt = derived(
        "node",
        None,
        vec![
            member(ast::TypeSpec::Integer { kind: None }, vec![], &["value"]),
            member(
                ast::TypeSpec::Named { name: ident("node") },
                vec![ast::DeclAttr::Pointer],
                &["next"],
            ),
        ],
    );
    let tree = unit(vec![module(
        "lists",
        vec![ast::Decl::DerivedType(dt)],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "lists").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let node = resolved.asr.get_symbol(table, "node").unwrap();
    let node_table = resolved.asr.symbol(node).symtab().unwrap();
    let next = resolved.asr.get_symbol(node_table, "next").unwrap();
    let Symbol::Variable(v) = resolved.asr.symbol(next) else {
        panic!("next is a variable");
    };
    assert!(matches!(
        &v.ty,
        Ty::Pointer { elem } if matches!(&**elem, Ty::StructType { decl, .. } if *decl == node)
    ));
}

#[test]
fn forward_declared_type_is_patched_at_scope_end() {
    // `type(point) :: origin` appears before `point` is defined.
    let var_decl = ast::Decl::TypeDecl(ast::TypeDecl {
        type_spec: ast::TypeSpec::Named { name: ident("point") },
        attrs: vec![],
        entities: vec![entity("origin")],
        span: sp(),
    });
    let dt = derived(
        "point",
        None,
        vec![member(
            ast::TypeSpec::Real { kind: None },
            vec![],
            &["x"],
        )],
    );
    let tree = unit(vec![module(
        "geometry",
        vec![var_decl, ast::Decl::DerivedType(dt)],
        vec![],
    )]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "geometry").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let origin = resolved.asr.get_symbol(table, "origin").unwrap();
    let point = resolved.asr.get_symbol(table, "point").unwrap();
    let Symbol::Variable(v) = resolved.asr.symbol(origin) else {
        panic!("origin is a variable");
    };
    assert!(matches!(&v.ty, Ty::StructType { decl, .. } if *decl == point));
    assert_eq!(v.type_decl, Some(point));
    assert_eq!(v.dependencies, vec!["point".to_string()]);
}

#[test]
fn unresolved_forward_type_is_reported() {
    let var_decl = ast::Decl::TypeDecl(ast::TypeDecl {
        type_spec: ast::TypeSpec::Named { name: ident("ghost") },
        attrs: vec![],
        entities: vec![entity("x")],
        span: sp(),
    });
    let tree = unit(vec![module("m", vec![var_decl], vec![])]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
    );
}

#[test]
fn inherited_method_resolves_to_the_override() {
    // Scenario: Shape declares area() deferred; Circle overrides it; a
    // call through a Circle binds Circle's area.
    let mut shape = derived("shape", None, vec![]);
    shape.is_abstract = true;
    shape.bindings = vec![binding("area", None, true)];

    let mut circle = derived(
        "circle",
        Some("shape"),
        vec![member(ast::TypeSpec::Real { kind: None }, vec![], &["r"])],
    );
    circle.bindings = vec![binding("area", Some("circle_area"), false)];

    let circle_area = function(
        "circle_area",
        &["self_obj"],
        vec![member_decl_class("circle", &["self_obj"])],
        vec![],
    );

    let get_area = function(
        "get_area",
        &[],
        vec![
            ast::Decl::TypeDecl(ast::TypeDecl {
                type_spec: ast::TypeSpec::Named { name: ident("circle") },
                attrs: vec![],
                entities: vec![entity("c")],
                span: sp(),
            }),
        ],
        vec![ast::Stmt::Assignment {
            target: name("get_area"),
            value: ast::Expr::MethodCall {
                base: Box::new(name("c")),
                name: ident("area"),
                args: vec![],
                span: sp(),
            },
            span: sp(),
        }],
    );

    let tree = unit(vec![
        module(
            "shapes",
            vec![
                ast::Decl::DerivedType(shape),
                ast::Decl::DerivedType(circle),
            ],
            vec![circle_area],
        ),
        program(
            "main",
            vec![use_module("shapes")],
            vec![],
            vec![get_area],
        ),
    ]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let main = resolved.asr.get_symbol(global, "main").unwrap();
    let main_table = resolved.asr.symbol(main).symtab().unwrap();
    let get_area = resolved.asr.get_symbol(main_table, "get_area").unwrap();
    let Symbol::Function(f) = resolved.asr.symbol(get_area) else {
        panic!("get_area is a function");
    };
    // The enclosing scope depends on the type and the override, not on the
    // parent's deferred binding.
    assert_eq!(
        f.dependencies,
        vec!["circle".to_string(), "area".to_string()]
    );

    // The call target is the method in circle's table.
    let shapes = resolved.asr.get_symbol(global, "shapes").unwrap();
    let shapes_table = resolved.asr.symbol(shapes).symtab().unwrap();
    let circle = resolved.asr.get_symbol(shapes_table, "circle").unwrap();
    let circle_table = resolved.asr.symbol(circle).symtab().unwrap();
    let area = resolved.asr.get_symbol(circle_table, "area").unwrap();
    let Symbol::Function(f) = resolved.asr.symbol(get_area) else {
        panic!("get_area is a function");
    };
    let siderite_asr::Stmt::Assignment { value, .. } = &f.body[0] else {
        panic!("body is an assignment");
    };
    let siderite_asr::Expr::FunctionCall { callee, .. } = value else {
        panic!("value is a call");
    };
    assert_eq!(*callee, area);
}

#[test]
fn deferred_binding_requires_an_abstract_type() {
    let mut concrete = derived("solid", None, vec![]);
    concrete.bindings = vec![binding("area", None, true)];
    let tree = unit(vec![module(
        "m",
        vec![ast::Decl::DerivedType(concrete)],
        vec![],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::TypeShape)
    );
}

#[test]
fn binding_to_a_missing_procedure_is_reported() {
    let mut circle = derived("circle", None, vec![]);
    circle.bindings = vec![binding("area", Some("nowhere"), false)];
    let tree = unit(vec![module(
        "m",
        vec![ast::Decl::DerivedType(circle)],
        vec![],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
    );
}

#[test]
fn pass_object_must_be_compatible_with_the_struct() {
    // The bound procedure's first argument is an integer, not the struct.
    let mut circle = derived("circle", None, vec![]);
    circle.bindings = vec![binding("area", Some("bad_area"), false)];
    let bad_area = function(
        "bad_area",
        &["x"],
        vec![typed_decl(
            ast::TypeSpec::Integer { kind: None },
            vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
            &["x"],
        )],
        vec![],
    );
    let tree = unit(vec![module(
        "m",
        vec![ast::Decl::DerivedType(circle)],
        vec![bad_area],
    )]);
    let resolved = resolve_unit(&tree);
    assert!(
        resolved
            .diag
            .iter()
            .any(|d| d.kind == DiagnosticKind::TypeShape)
    );
}

#[test]
fn enum_members_classify_consecutive_from_zero() {
    let e = ast::Decl::EnumDef(ast::EnumDef {
        name: ident("color"),
        bind_c: false,
        items: vec![
            ast::EnumItem {
                name: ident("red"),
                value: None,
                span: sp(),
            },
            ast::EnumItem {
                name: ident("green"),
                value: None,
                span: sp(),
            },
        ],
        span: sp(),
    });
    let tree = unit(vec![module("m", vec![e], vec![])]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let color = resolved.asr.get_symbol(table, "color").unwrap();
    let Symbol::Enum(e) = resolved.asr.symbol(color) else {
        panic!("color is an enum");
    };
    assert_eq!(e.kind, EnumKind::ConsecutiveFromZero);
    assert_eq!(e.members, vec!["red".to_string(), "green".to_string()]);
}

#[test]
fn enum_with_sparse_values_classifies_unique() {
    let e = ast::Decl::EnumDef(ast::EnumDef {
        name: ident("status"),
        bind_c: false,
        items: vec![
            ast::EnumItem {
                name: ident("ok"),
                value: Some(int(0)),
                span: sp(),
            },
            ast::EnumItem {
                name: ident("failed"),
                value: Some(int(7)),
                span: sp(),
            },
        ],
        span: sp(),
    });
    let tree = unit(vec![module("m", vec![e], vec![])]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let status = resolved.asr.get_symbol(table, "status").unwrap();
    assert!(matches!(
        resolved.asr.symbol(status),
        Symbol::Enum(e) if e.kind == EnumKind::Unique
    ));
}

#[test]
fn union_collects_its_members() {
    let u = ast::Decl::UnionDef(ast::UnionDef {
        name: ident("raw"),
        members: vec![
            member(ast::TypeSpec::Integer { kind: None }, vec![], &["i"]),
            member(ast::TypeSpec::Real { kind: None }, vec![], &["x"]),
        ],
        span: sp(),
    });
    let tree = unit(vec![module("m", vec![u], vec![])]);
    let resolved = expect_resolved(&tree);

    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let raw = resolved.asr.get_symbol(table, "raw").unwrap();
    assert!(matches!(
        resolved.asr.symbol(raw),
        Symbol::Union(u) if u.members == vec!["i".to_string(), "x".to_string()]
    ));
}

/// `class(circle) :: names...`
fn member_decl_class(struct_name: &str, names: &[&str]) -> ast::Decl {
    ast::Decl::TypeDecl(ast::TypeDecl {
        type_spec: ast::TypeSpec::Class {
            name: ident(struct_name),
        },
        attrs: vec![],
        entities: names.iter().map(|n| entity(n)).collect(),
        span: sp(),
    })
}
