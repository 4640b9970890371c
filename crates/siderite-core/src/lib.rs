#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Shared substrate for the siderite compiler front-end.
//!
//! - `source_map` - arena storage for compilation sources
//! - `span` - source locations carried by every tree node
//! - `names` - identifier canonicalisation and reserved-name mangling
//! - `diagnostics` - diagnostic collection and rendering

pub mod diagnostics;
pub mod names;
pub mod source_map;
pub mod span;

pub use diagnostics::{DiagnosticKind, Diagnostics, DiagnosticsPrinter, Severity};
pub use source_map::{Source, SourceId, SourceKind, SourceMap};
pub use span::Span;
