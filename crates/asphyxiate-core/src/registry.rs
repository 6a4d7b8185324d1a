//! The symbol table and group hierarchy of a batch, behind one freeze
//! barrier
//!
//! Registration is single-writer and happens in input-file order. After
//! [`Registry::freeze`] the registry is only read, and `&Registry` can be
//! shared by every resolver thread.

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::doc::{ExtractItem, FileExtract};
use crate::group::GroupHierarchy;
use crate::lexer::FileId;
use crate::scanner::SourceComment;
use crate::symbol::{SymbolId, SymbolTable};

/// Out-of-order use of the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry is frozen; `{0}` cannot be registered")]
    Frozen(String),

    #[error("registry is not frozen yet; lookups and resolution must wait for registration to finish")]
    NotFrozen,

    #[error("declaration `{0}` has no name or kind to register under")]
    Unnamed(String),
}

/// What the registry keeps about each input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub has_file_marker: bool,
    /// `@file` documentation
    pub docs: Vec<SourceComment>,
    /// Comments that document nothing
    pub loose: Vec<SourceComment>,
    /// Symbols declared in this file, in file order
    pub symbols: Vec<SymbolId>,
}

/// Symbol table + group hierarchy
#[derive(Debug, Clone, Default)]
pub struct Registry {
    symbols: SymbolTable,
    groups: GroupHierarchy,
    files: Vec<FileRecord>,
    diagnostics: Vec<Diagnostic>,
    frozen: bool,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one file's extraction results.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] once the registry is frozen.
    pub fn register_file(&mut self, extract: FileExtract) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen(extract.name));
        }
        let FileExtract {
            file,
            name,
            has_file_marker,
            items,
            diagnostics,
        } = extract;
        self.diagnostics.extend(diagnostics);

        let mut record = FileRecord {
            id: file,
            name,
            has_file_marker,
            docs: Vec::new(),
            loose: Vec::new(),
            symbols: Vec::new(),
        };

        for item in items {
            match item {
                ExtractItem::Group(def) => {
                    let (_, diagnostics) = self.groups.define(def);
                    self.diagnostics.extend(diagnostics);
                }
                ExtractItem::Symbol(symbol) => {
                    let location = symbol.declaration.location;
                    let id = self.symbols.register(symbol.declaration)?;
                    if !record.symbols.contains(&id) {
                        record.symbols.push(id);
                    }
                    for group in symbol.group.iter().chain(&symbol.in_groups) {
                        let group = self.groups.ensure(group, location);
                        self.groups.add_member(group, id);
                        self.symbols.set_group(id, group)?;
                    }
                }
                ExtractItem::FileDoc(comment) => record.docs.push(comment),
                ExtractItem::Loose(comment) => record.loose.push(comment),
            }
        }

        tracing::trace!(file = %record.id, symbols = record.symbols.len(), "registered file");
        self.files.push(record);
        Ok(())
    }

    /// End registration. Freezing twice is harmless.
    pub fn freeze(&mut self) {
        self.symbols.freeze();
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// The symbol table
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The group hierarchy
    #[must_use]
    pub fn groups(&self) -> &GroupHierarchy {
        &self.groups
    }

    /// Files in registration order
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Diagnostics collected while extracting and registering
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
