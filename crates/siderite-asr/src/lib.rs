#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! The abstract semantic representation (ASR).
//!
//! A typed, symbolic tree with scoped symbol tables:
//! - `arena` - the store owning every table and symbol node
//! - `table` - one lexical scope: name -> symbol bindings
//! - `symbol` - the tagged symbol variants
//! - `ty` - the type variants
//! - `expr` - typed expressions and statements
//! - `const_eval` - the constant folding declaration resolution needs
//! - `verify` - the invariant checker later passes must keep happy
//! - `dump` - deterministic tree rendering for tests and debugging

pub mod arena;
pub mod const_eval;
pub mod dump;
pub mod expr;
pub mod symbol;
pub mod table;
pub mod ty;
pub mod verify;

#[cfg(test)]
mod arena_tests;
#[cfg(test)]
pub mod test_fixtures;

pub use arena::{Asr, StoreError, SymbolId, TableId};
pub use expr::{BinOp, CallArg, CaseStmt, Expr, Stmt};
pub use symbol::{
    Access, Block, BlockKind, CustomOperator, Enum, EnumKind, External, Function,
    GenericProcedure, Intent, Module, Presence, Program, Require, Requirement, Storage, Struct,
    StructMethod, Symbol, Template, TranslationUnit, Union, Variable,
};
pub use table::SymbolTable;
pub use ty::{
    Abi, ArrayPhysical, DefKind, Dimension, FunctionFlags, FunctionType, StringLength,
    StringPhysical, Ty,
};
pub use verify::{VerifyError, VerifyErrorKind, dependencies_of, verify};
