use siderite_asr::{Expr, Presence, Symbol};
use siderite_syntax as ast;

use super::test_support::*;

/// Scenario: `subroutine s(a, b)` with `entry e(b, c)`.
fn unit_with_entry() -> ast::TranslationUnit {
    let s = subroutine(
        "s",
        &["a", "b"],
        vec![int_decl(&["a", "b", "c"])],
        vec![
            assign("a", int(1)),
            ast::Stmt::Entry {
                name: ident("e"),
                args: vec![ident("b"), ident("c")],
                span: sp(),
            },
            assign("c", int(2)),
        ],
    );
    unit(vec![module("m", vec![], vec![s])])
}

fn arg_names(asr: &siderite_asr::Asr, f: &siderite_asr::Function) -> Vec<String> {
    f.args
        .iter()
        .map(|arg| match arg {
            Expr::Var { sym, .. } => asr.symbol(*sym).name().unwrap().to_string(),
            _ => panic!("argument is a variable reference"),
        })
        .collect()
}

#[test]
fn entry_rewrite_produces_master_and_stubs() {
    let resolved = expect_resolved(&unit_with_entry());
    let resolution = resolved.resolution.as_ref().unwrap();

    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();

    // Three symbols: the two entry stubs and the master.
    let s = resolved.asr.get_symbol(table, "s").unwrap();
    let e = resolved.asr.get_symbol(table, "e").unwrap();
    let master = resolved
        .asr
        .get_symbol(table, "s_main__lcompilers")
        .expect("master exists");

    let Symbol::Function(master_fn) = resolved.asr.symbol(master) else {
        panic!("master is a function");
    };
    assert_eq!(
        arg_names(&resolved.asr, master_fn),
        vec!["entry__lcompilers", "a", "b", "c"]
    );
    // Everything after the selector is omittable.
    for arg in &master_fn.args[1..] {
        let Expr::Var { sym, .. } = arg else { continue };
        let Symbol::Variable(v) = resolved.asr.symbol(*sym) else {
            continue;
        };
        assert_eq!(v.presence, Presence::Optional);
    }
    // The master keeps the body, entries removed.
    assert_eq!(master_fn.body.len(), 2);

    let Symbol::Function(s_fn) = resolved.asr.symbol(s) else {
        panic!("s is a function");
    };
    assert_eq!(arg_names(&resolved.asr, s_fn), vec!["a", "b"]);
    assert_eq!(s_fn.body.len(), 1);
    assert_eq!(s_fn.dependencies, vec!["s_main__lcompilers".to_string()]);

    let Symbol::Function(e_fn) = resolved.asr.symbol(e) else {
        panic!("e is a function");
    };
    assert_eq!(arg_names(&resolved.asr, e_fn), vec!["b", "c"]);
    assert_eq!(e_fn.dependencies, vec!["s_main__lcompilers".to_string()]);
}

#[test]
fn entry_argument_positions_are_recorded() {
    let resolved = expect_resolved(&unit_with_entry());
    let resolution = resolved.resolution.as_ref().unwrap();

    // Positions are indices into the master's formal list; slot 0 is the
    // selector.
    assert_eq!(resolution.entry_args["s"], vec![1, 2]);
    assert_eq!(resolution.entry_args["e"], vec![2, 3]);
}

#[test]
fn stub_calls_pass_their_selector_and_omit_foreign_formals() {
    let resolved = expect_resolved(&unit_with_entry());
    let resolution = resolved.resolution.as_ref().unwrap();

    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    let table = resolved.asr.symbol(m).symtab().unwrap();
    let e = resolved.asr.get_symbol(table, "e").unwrap();
    let master = resolved.asr.get_symbol(table, "s_main__lcompilers").unwrap();

    let Symbol::Function(e_fn) = resolved.asr.symbol(e) else {
        panic!("e is a function");
    };
    let siderite_asr::Stmt::SubroutineCall { callee, args, .. } = &e_fn.body[0] else {
        panic!("stub body is a call");
    };
    assert_eq!(*callee, master);
    // selector, a (omitted), b, c
    assert_eq!(args.len(), 4);
    assert!(matches!(
        args[0].value,
        Some(Expr::IntConstant { value: 2, .. })
    ));
    assert!(args[1].value.is_none());
    assert!(args[2].value.is_some());
    assert!(args[3].value.is_some());
}
