#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! The syntactic tree handed over by the parser.
//!
//! This crate is the contract between the parser collaborator and the
//! declaration resolver: plain owned nodes, each carrying a [`Span`].
//! Nothing here is typed or resolved; names are raw source spellings.
//!
//! [`Span`]: siderite_core::Span

pub mod ast;
pub mod expr;

pub use ast::*;
pub use expr::*;
