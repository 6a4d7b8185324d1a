//! Asphyxiate Core - documentation extraction for C headers
//!
//! This crate provides:
//! - Lexer: C tokenization with comments kept
//! - Scanner: comment blocks, group markers and the code that follows them
//! - Parser: declaration classification and signatures
//! - Registry: symbol table and group hierarchy behind a freeze barrier
//! - Doc: structured comments, cross-reference resolution, the output model
//! - Pipeline: the two-phase batch driver
//!
//! ```
//! use asphyxiate_core::{ExtractorConfig, Pipeline, SymbolKind};
//!
//! let header = "/** @file */\n/** Add. See sum(). */\nint sum(int a, int b);\n";
//! let output = Pipeline::new(ExtractorConfig::default())
//!     .run(&[("math.h", header)])
//!     .unwrap();
//! assert!(output.model.symbol("sum", SymbolKind::Function).is_some());
//! ```

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lexer module - tokenization of C source
pub mod lexer;

/// Comment scanner - comment blocks, markup and code fragments
pub mod scanner;

/// Declaration parser
pub mod parser;

/// Documentation comments, cross-linking and the output model
pub mod doc;

/// Symbol table
pub mod symbol;

/// Group hierarchy and the per-file group stack
pub mod group;

pub mod registry;

/// Diagnostics collected during a run
pub mod diagnostic;

pub mod config;

/// Two-phase driver
pub mod pipeline;

pub mod logging;

pub use config::{ConfigError, ExtractorConfig};
pub use diagnostic::{Category, Diagnostic, DiagnosticKind};
pub use doc::{DocModel, GroupDoc, Reference, ReferenceShape, Resolution, SymbolDoc, UnresolvedReason};
pub use lexer::{FileId, SourceLocation, Span};
pub use pipeline::{DocOutput, Pipeline};
pub use registry::{Registry, RegistryError};
pub use symbol::{KindFilter, SymbolId, SymbolKind};
