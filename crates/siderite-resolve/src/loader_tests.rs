use std::fs;

use siderite_asr::{Asr, Symbol, verify};
use siderite_core::{DiagnosticKind, Diagnostics, Span};
use siderite_syntax as ast;

use crate::loader::{
    FileModuleLoader, LoadError, ModuleCache, ModuleLoader, NullLoader, decode_module,
    save_module,
};
use crate::resolver::test_support::*;
use crate::resolver::{ResolverConfig, resolve};

/// A resolved module `m` exporting `double(x)`.
fn math_module_unit() -> ast::TranslationUnit {
    unit(vec![module(
        "m",
        vec![],
        vec![function(
            "double",
            &["x"],
            vec![typed_decl(
                ast::TypeSpec::Integer { kind: None },
                vec![ast::DeclAttr::Intent(ast::IntentSpec::In)],
                &["x"],
            )],
            vec![],
        )],
    )])
}

fn saved_module_bytes() -> Vec<u8> {
    let resolved = expect_resolved(&math_module_unit());
    let resolution = resolved.resolution.as_ref().unwrap();
    let global = resolved.asr.symbol(resolution.unit).symtab().unwrap();
    let m = resolved.asr.get_symbol(global, "m").unwrap();
    save_module(&resolved.asr, m).expect("module serializes")
}

#[test]
fn null_loader_misses_everything() {
    let mut asr = Asr::new();
    let global = asr.new_table(None);
    let mut diag = Diagnostics::new();
    let result = NullLoader.load_module("m", Span::default(), &mut asr, global, &mut diag);
    assert!(matches!(result, Err(LoadError::NotFound(_))));
}

#[test]
fn image_round_trips_through_bytes() {
    let bytes = saved_module_bytes();
    let image = decode_module("m", &bytes).expect("decodes");
    assert_eq!(image.name, "m");
    assert_eq!(image.symbols.len(), 1);
}

#[test]
fn checksum_corruption_is_detected() {
    let mut bytes = saved_module_bytes();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x5a;
    let result = decode_module("m", &bytes);
    assert!(matches!(result, Err(LoadError::Format(_, _))));
}

#[test]
fn truncated_file_is_malformed() {
    let result = decode_module("m", b"SM");
    assert!(matches!(result, Err(LoadError::Format(_, _))));
}

#[test]
fn file_loader_materialises_a_saved_module() {
    let bytes = saved_module_bytes();
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("m.smod"), &bytes).expect("write module");

    // A second compilation unit imports the saved module.
    let tree = unit(vec![program(
        "main",
        vec![use_only("m", &[("double", None)]), int_decl(&["y"])],
        vec![ast::Stmt::Assignment {
            target: name("y"),
            value: ast::Expr::Call {
                callee: ident("double"),
                args: vec![ast::CallArg::positional(int(2))],
                span: sp(),
            },
            span: sp(),
        }],
        vec![],
    )]);

    let mut asr = Asr::new();
    let mut diag = Diagnostics::new();
    let mut loader = FileModuleLoader::new(vec![dir.path().to_path_buf()]);
    let config = ResolverConfig::default();
    let resolution =
        resolve(&tree, &mut asr, &mut loader, &config, &mut diag).expect("resolves");
    assert!(!diag.has_errors(), "{}", diag.printer().render());
    verify(&asr, resolution.unit, true).expect("loaded tree verifies");

    let global = asr.symbol(resolution.unit).symtab().unwrap();
    let m = asr.get_symbol(global, "m").unwrap();
    assert!(matches!(asr.symbol(m), Symbol::Module(_)));
    let main = asr.get_symbol(global, "main").unwrap();
    let table = asr.symbol(main).symtab().unwrap();
    let double = asr.get_symbol(table, "double").unwrap();
    assert!(matches!(asr.symbol(double), Symbol::External(_)));
}

#[test]
fn loading_is_cached_per_name() {
    let bytes = saved_module_bytes();
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("m.smod"), &bytes).expect("write module");

    let mut asr = Asr::new();
    let global = asr.new_table(None);
    let mut diag = Diagnostics::new();
    let mut loader = FileModuleLoader::new(vec![dir.path().to_path_buf()]);

    let first = loader
        .load_module("m", Span::default(), &mut asr, global, &mut diag)
        .expect("first load");
    let second = loader
        .load_module("m", Span::default(), &mut asr, global, &mut diag)
        .expect("cached load");
    assert_eq!(first, second);
}

#[test]
fn missing_file_reports_module_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tree = unit(vec![program(
        "main",
        vec![use_module("ghost")],
        vec![],
        vec![],
    )]);

    let mut asr = Asr::new();
    let mut diag = Diagnostics::new();
    let mut loader = FileModuleLoader::new(vec![dir.path().to_path_buf()]);
    let config = ResolverConfig::default();
    let result = resolve(&tree, &mut asr, &mut loader, &config, &mut diag);
    assert!(result.is_err());
    assert!(diag.iter().any(|d| d.kind == DiagnosticKind::ModuleNotFound));
}

#[test]
fn in_flight_loads_surface_as_cycles() {
    let mut cache = ModuleCache::new();
    cache.begin("a");
    assert!(matches!(cache.lookup("a"), Some(Err(LoadError::Cycle(_)))));
    cache.cancel("a");
    assert!(cache.lookup("a").is_none());
}

#[test]
fn clearing_the_cache_forgets_finished_loads() {
    let mut asr = Asr::new();
    let table = asr.new_table(None);
    let module = asr.alloc(Symbol::TranslationUnit(siderite_asr::TranslationUnit {
        table,
        items: Vec::new(),
    }));

    let mut cache = ModuleCache::new();
    cache.begin("m");
    cache.finish("m", module);
    assert!(matches!(cache.lookup("m"), Some(Ok(id)) if id == module));

    cache.clear();
    assert!(cache.lookup("m").is_none());
}
