use crate::arena::StoreError;
use crate::symbol::Symbol;
use crate::test_fixtures::*;
use crate::ty::Ty;
use crate::{Asr, External};

#[test]
fn two_step_table_construction() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);

    assert_eq!(asr.table(table).parent(), None);
    assert_eq!(asr.table(table).owner(), Some(unit));
}

#[test]
fn counters_are_unique_and_monotone() {
    let mut asr = Asr::new();
    let a = asr.new_table(None);
    let b = asr.new_table(Some(a));
    let c = asr.new_table(Some(a));

    let ca = asr.table(a).counter();
    let cb = asr.table(b).counter();
    let cc = asr.table(c).counter();
    assert!(ca < cb && cb < cc);
}

#[test]
fn add_symbol_canonicalises_names() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);

    let x = add_variable(&mut asr, table, "x", Ty::default_int());
    // Lookups canonicalise too, so mixed case finds the same binding.
    assert_eq!(asr.get_symbol(table, "X"), Some(x));
    assert_eq!(asr.get_symbol(table, "x"), Some(x));
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);
    add_variable(&mut asr, table, "x", Ty::default_int());

    let clash = asr.add_symbol(
        table,
        "X",
        Symbol::Variable(crate::Variable {
            name: "x".to_string(),
            parent: table,
            ty: Ty::default_int(),
            init: None,
            value: None,
            intent: Default::default(),
            storage: Default::default(),
            access: Default::default(),
            presence: Default::default(),
            dependencies: Vec::new(),
            type_decl: None,
            span: span(),
        }),
    );
    assert!(matches!(clash, Err(StoreError::DuplicateSymbol(_))));
}

#[test]
fn invalid_names_are_rejected() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);
    let x = add_variable(&mut asr, table, "x", Ty::default_int());

    assert!(matches!(
        asr.bind(table, "not a name", x, false),
        Err(StoreError::InvalidName(_))
    ));
    // Mangled forms are storable.
    assert!(asr.bind(table, "~add", x, false).is_ok());
    assert!(asr.bind(table, "impl@plus", x, false).is_ok());
}

#[test]
fn overwrite_replaces_binding() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);
    let a = add_variable(&mut asr, table, "x", Ty::default_int());
    let b = add_variable(&mut asr, table, "y", Ty::default_real());

    assert!(asr.bind(table, "x", b, false).is_err());
    asr.bind(table, "x", b, true).expect("overwrite is allowed");
    assert_eq!(asr.get_symbol(table, "x"), Some(b));
    assert_ne!(asr.get_symbol(table, "x"), Some(a));
}

#[test]
fn resolve_walks_the_parent_chain() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let global = unit_table(&asr, unit);
    let module = add_module(&mut asr, unit, "m");
    let module_table = asr.symbol(module).symtab().unwrap();

    let x = add_variable(&mut asr, global, "x", Ty::default_int());
    let y = add_variable(&mut asr, module_table, "y", Ty::default_int());

    // Local lookup does not see the parent scope.
    assert_eq!(asr.get_symbol(module_table, "x"), None);
    // Chain lookup does, and prefers the nearest binding.
    assert_eq!(asr.resolve_symbol(module_table, "x"), Some(x));
    assert_eq!(asr.resolve_symbol(module_table, "y"), Some(y));
    assert_eq!(asr.resolve_symbol(global, "y"), None);
}

#[test]
fn shadowing_prefers_the_inner_scope() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let global = unit_table(&asr, unit);
    let module = add_module(&mut asr, unit, "m");
    let module_table = asr.symbol(module).symtab().unwrap();

    let outer = add_variable(&mut asr, global, "x", Ty::default_int());
    let inner = add_variable(&mut asr, module_table, "x", Ty::default_real());

    assert_eq!(asr.resolve_symbol(module_table, "x"), Some(inner));
    assert_eq!(asr.resolve_symbol(global, "x"), Some(outer));
}

#[test]
fn find_scoped_descends_through_owned_tables() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let module = add_module(&mut asr, unit, "m");
    let module_table = asr.symbol(module).symtab().unwrap();
    let f = add_function(
        &mut asr,
        module_table,
        "f",
        &["a"],
        Ty::default_int(),
        Some(Ty::default_int()),
    );
    let f_table = asr.symbol(f).symtab().unwrap();
    let a = asr.get_symbol(f_table, "a").unwrap();

    assert_eq!(
        asr.find_scoped(module_table, "a", &["f".to_string()]),
        Some(a)
    );
    assert_eq!(asr.find_scoped(module_table, "f", &[]), Some(f));
    assert_eq!(asr.find_scoped(module_table, "missing", &[]), None);
}

#[test]
fn get_past_external_is_one_hop() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let global = unit_table(&asr, unit);
    let module = add_module(&mut asr, unit, "m");
    let module_table = asr.symbol(module).symtab().unwrap();
    let target = add_variable(&mut asr, module_table, "x", Ty::default_int());

    let ext = asr
        .add_symbol(
            global,
            "x",
            Symbol::External(External {
                name: "x".to_string(),
                parent: global,
                target: Some(target),
                module_name: "m".to_string(),
                original_name: "x".to_string(),
                scope_path: Vec::new(),
                access: Default::default(),
                span: span(),
            }),
        )
        .unwrap();

    assert_eq!(asr.get_past_external(ext), target);
    // Non-externals map to themselves.
    assert_eq!(asr.get_past_external(target), target);
}

#[test]
fn remove_symbol_unbinds_but_keeps_the_node() {
    let mut asr = Asr::new();
    let unit = new_unit(&mut asr);
    let table = unit_table(&asr, unit);
    let x = add_variable(&mut asr, table, "x", Ty::default_int());

    assert_eq!(asr.remove_symbol(table, "x"), Some(x));
    assert_eq!(asr.get_symbol(table, "x"), None);
    // The arena slot is still alive.
    assert!(matches!(asr.symbol(x), Symbol::Variable(_)));
}

#[test]
fn is_ancestor_includes_self() {
    let mut asr = Asr::new();
    let a = asr.new_table(None);
    let b = asr.new_table(Some(a));
    let c = asr.new_table(Some(b));

    assert!(asr.is_ancestor(a, c));
    assert!(asr.is_ancestor(b, c));
    assert!(asr.is_ancestor(c, c));
    assert!(!asr.is_ancestor(c, a));
}
