//! Builders and drivers for resolver tests.
//!
//! The parser collaborator is out of scope, so tests assemble the
//! syntactic tree directly. Builders stay close to the surface syntax:
//! `module("m", ..)`, `int_decl(&["x"])`, `assign("x", int(3))`.

use siderite_asr::{Asr, verify};
use siderite_core::{Diagnostics, Span};
use siderite_syntax as ast;

use crate::loader::NullLoader;
use crate::resolver::{Resolution, ResolverConfig, resolve};

pub fn sp() -> Span {
    Span::default()
}

pub fn ident(name: &str) -> ast::Ident {
    ast::Ident::new(name, sp())
}

pub fn int(value: i64) -> ast::Expr {
    ast::Expr::int(value, sp())
}

pub fn name(text: &str) -> ast::Expr {
    ast::Expr::name(text, sp())
}

pub fn unit(items: Vec<ast::Item>) -> ast::TranslationUnit {
    ast::TranslationUnit { items, span: sp() }
}

pub fn module(name: &str, decls: Vec<ast::Decl>, contains: Vec<ast::Procedure>) -> ast::Item {
    ast::Item::Module(ast::Module {
        name: ident(name),
        decls,
        contains,
        span: sp(),
    })
}

pub fn program(
    name: &str,
    decls: Vec<ast::Decl>,
    body: Vec<ast::Stmt>,
    contains: Vec<ast::Procedure>,
) -> ast::Item {
    ast::Item::Program(ast::Program {
        name: ident(name),
        decls,
        body,
        contains,
        span: sp(),
    })
}

pub fn function(
    name: &str,
    args: &[&str],
    decls: Vec<ast::Decl>,
    body: Vec<ast::Stmt>,
) -> ast::Procedure {
    ast::Procedure {
        kind: ast::ProcKind::Function,
        name: ident(name),
        args: args.iter().map(|a| ident(a)).collect(),
        result: None,
        return_type: Some(ast::TypeSpec::Integer { kind: None }),
        attrs: ast::ProcAttrs::default(),
        decls,
        body,
        contains: Vec::new(),
        span: sp(),
    }
}

pub fn subroutine(
    name: &str,
    args: &[&str],
    decls: Vec<ast::Decl>,
    body: Vec<ast::Stmt>,
) -> ast::Procedure {
    ast::Procedure {
        kind: ast::ProcKind::Subroutine,
        name: ident(name),
        args: args.iter().map(|a| ident(a)).collect(),
        result: None,
        return_type: None,
        attrs: ast::ProcAttrs::default(),
        decls,
        body,
        contains: Vec::new(),
        span: sp(),
    }
}

/// `integer :: a, b, c`
pub fn int_decl(names: &[&str]) -> ast::Decl {
    typed_decl(ast::TypeSpec::Integer { kind: None }, Vec::new(), names)
}

/// `integer, intent(in) :: a` and friends.
pub fn typed_decl(spec: ast::TypeSpec, attrs: Vec<ast::DeclAttr>, names: &[&str]) -> ast::Decl {
    ast::Decl::TypeDecl(ast::TypeDecl {
        type_spec: spec,
        attrs,
        entities: names.iter().map(|n| entity(n)).collect(),
        span: sp(),
    })
}

pub fn entity(name: &str) -> ast::EntityDecl {
    ast::EntityDecl {
        name: ident(name),
        dims: None,
        init: None,
        span: sp(),
    }
}

pub fn entity_init(name: &str, init: ast::Expr) -> ast::EntityDecl {
    ast::EntityDecl {
        name: ident(name),
        dims: None,
        init: Some(init),
        span: sp(),
    }
}

/// `integer, parameter :: n = value`
pub fn int_parameter(name: &str, value: i64) -> ast::Decl {
    ast::Decl::TypeDecl(ast::TypeDecl {
        type_spec: ast::TypeSpec::Integer { kind: None },
        attrs: vec![ast::DeclAttr::Parameter],
        entities: vec![entity_init(name, int(value))],
        span: sp(),
    })
}

pub fn use_module(module: &str) -> ast::Decl {
    ast::Decl::Use(ast::Use {
        module: ident(module),
        only: None,
        renames: Vec::new(),
        span: sp(),
    })
}

pub fn use_only(module: &str, names: &[(&str, Option<&str>)]) -> ast::Decl {
    ast::Decl::Use(ast::Use {
        module: ident(module),
        only: Some(
            names
                .iter()
                .map(|(remote, local)| ast::UseSymbol {
                    local: local.map(ident),
                    remote: ident(remote),
                })
                .collect(),
        ),
        renames: Vec::new(),
        span: sp(),
    })
}

pub fn assign(target: &str, value: ast::Expr) -> ast::Stmt {
    ast::Stmt::Assignment {
        target: name(target),
        value,
        span: sp(),
    }
}

pub fn call_stmt(callee: &str, args: Vec<ast::Expr>) -> ast::Stmt {
    ast::Stmt::Call {
        name: ident(callee),
        args: args.into_iter().map(ast::CallArg::positional).collect(),
        span: sp(),
    }
}

/// Everything a test wants to inspect after a resolution run.
pub struct Resolved {
    pub asr: Asr,
    pub diag: Diagnostics,
    pub resolution: Option<Resolution>,
}

pub fn resolve_unit(tree: &ast::TranslationUnit) -> Resolved {
    resolve_unit_with(tree, &ResolverConfig::default())
}

pub fn resolve_unit_with(tree: &ast::TranslationUnit, config: &ResolverConfig) -> Resolved {
    let mut asr = Asr::new();
    let mut diag = Diagnostics::new();
    let mut loader = NullLoader;
    let resolution = resolve(tree, &mut asr, &mut loader, config, &mut diag).ok();
    Resolved {
        asr,
        diag,
        resolution,
    }
}

/// Resolve, assert no errors, and run the verifier in post-link mode: the
/// property every accepted unit must satisfy.
pub fn expect_resolved(tree: &ast::TranslationUnit) -> Resolved {
    let resolved = resolve_unit(tree);
    assert!(
        !resolved.diag.has_errors(),
        "unexpected diagnostics: {}",
        resolved.diag.printer().render()
    );
    let resolution = resolved
        .resolution
        .as_ref()
        .expect("resolution succeeds without errors");
    verify(&resolved.asr, resolution.unit, true)
        .unwrap_or_else(|e| panic!("verifier rejected resolver output: {e}"));
    resolved
}
