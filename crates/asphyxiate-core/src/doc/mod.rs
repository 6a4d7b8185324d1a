//! Documentation extraction and cross-referencing
//!
//! Per-file extraction ([`DocExtractor`]) feeds the registry; once it is
//! frozen, [`DocModel::assemble`] resolves every comment with a
//! [`CrossLinker`].

mod crosslink;
mod extractor;
mod model;
mod types;

pub use crosslink::{
    scan_references, CrossLinker, LinkedText, RawReference, Reference, ReferenceShape, Resolution,
    Segment, UnresolvedReason,
};
pub use extractor::{DocExtractor, ExtractItem, ExtractedSymbol, FileExtract};
pub use model::{
    DeclarationDoc, DocModel, FileDoc, FileSection, GroupDoc, ResolvedDoc, ResolvedParam,
    ResolvedSection, SymbolDoc,
};
pub use types::{DocComment, DocSection, Documentation, ParamDirection, ParamDoc, SectionKind};
