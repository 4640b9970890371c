#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! The declaration resolver.
//!
//! Walks the syntactic tree and builds the ASR: nested symbol tables,
//! `use` imports, overload sets, type-bound procedures, templates, and the
//! per-entity dependency lists the verifier enforces afterwards.
//!
//! - `resolver` - the pass itself
//! - `implicit` - per-scope implicit-typing dictionaries
//! - `loader` - the module loader contract, cache, and file-backed loader

pub mod implicit;
pub mod loader;
pub mod resolver;

#[cfg(test)]
mod loader_tests;

pub use implicit::ImplicitStack;
pub use loader::{
    FileModuleLoader, LoadError, ModuleCache, ModuleLoader, NullLoader, save_module,
};
pub use resolver::{Resolution, ResolverConfig, SemanticAbort, resolve};
