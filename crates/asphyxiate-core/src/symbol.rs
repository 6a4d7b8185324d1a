//! Batch-wide symbol table
//!
//! Symbols are keyed by (name, kind). The table is written only during
//! registration; once frozen it answers lookups and refuses writes, which
//! lets resolution read it from many threads without locking.

use std::collections::HashMap;

use serde::Serialize;

use crate::group::GroupId;
use crate::parser::Declaration;
use crate::registry::RegistryError;

/// Index of a symbol, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SymbolId(pub u32);

/// The kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SymbolKind {
    Function,
    Struct,
    Typedef,
    Macro,
    Enum,
    Variable,
}

impl SymbolKind {
    /// Kinds a `::Name` reference may resolve to
    #[must_use]
    pub const fn is_type(self) -> bool {
        matches!(self, Self::Struct | Self::Typedef | Self::Enum)
    }

    /// Lowercase name used in signatures, anchors and hints
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Struct => "struct",
            Self::Typedef => "typedef",
            Self::Macro => "macro",
            Self::Enum => "enum",
            Self::Variable => "variable",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kinds a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Any,
    Only(SymbolKind),
    /// Struct, typedef or enum
    Types,
}

impl KindFilter {
    #[must_use]
    pub fn accepts(self, kind: SymbolKind) -> bool {
        match self {
            Self::Any => true,
            Self::Only(only) => only == kind,
            Self::Types => kind.is_type(),
        }
    }
}

/// A named entity and every declaration of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Sorted by (file, offset)
    pub declarations: Vec<Declaration>,
    /// First group the symbol was placed in
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TableState {
    #[default]
    Open,
    Frozen,
}

/// All symbols of a batch
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    state: TableState,
    symbols: Vec<Symbol>,
    index: HashMap<(String, SymbolKind), SymbolId>,
    by_name: HashMap<String, Vec<SymbolId>>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, merging it into an existing symbol of the same
    /// name and kind
    #[allow(clippy::cast_possible_truncation)]
    pub fn register(&mut self, declaration: Declaration) -> Result<SymbolId, RegistryError> {
        let (Some(name), Some(kind)) = (declaration.name.clone(), declaration.symbol_kind()) else {
            return Err(RegistryError::Unnamed(declaration.signature));
        };
        if self.state == TableState::Frozen {
            return Err(RegistryError::Frozen(name));
        }

        let key = (name, kind);
        if let Some(&id) = self.index.get(&key) {
            let declarations = &mut self.symbols[id.0 as usize].declarations;
            let at = declarations.partition_point(|d| d.location <= declaration.location);
            declarations.insert(at, declaration);
            return Ok(id);
        }

        let id = SymbolId(self.symbols.len() as u32);
        let (name, kind) = key;
        self.symbols.push(Symbol {
            id,
            name: name.clone(),
            kind,
            declarations: vec![declaration],
            group: None,
        });
        self.by_name.entry(name.clone()).or_default().push(id);
        self.index.insert((name, kind), id);
        Ok(id)
    }

    /// Place a symbol in a group unless it already has one
    pub fn set_group(&mut self, id: SymbolId, group: GroupId) -> Result<(), RegistryError> {
        if self.state == TableState::Frozen {
            return Err(RegistryError::Frozen(self.name_of(id)));
        }
        if let Some(symbol) = self.symbols.get_mut(id.0 as usize) {
            symbol.group.get_or_insert(group);
        }
        Ok(())
    }

    fn name_of(&self, id: SymbolId) -> String {
        self.get(id).map(|s| s.name.clone()).unwrap_or_default()
    }

    /// Make the table read-only. Freezing twice is harmless.
    pub fn freeze(&mut self) {
        self.state = TableState::Frozen;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state == TableState::Frozen
    }

    /// Symbols with this exact name whose kind passes the filter, in
    /// registration order
    pub fn lookup(&self, name: &str, filter: KindFilter) -> Result<Vec<&Symbol>, RegistryError> {
        if self.state != TableState::Frozen {
            return Err(RegistryError::NotFrozen);
        }
        Ok(self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.get(id))
            .filter(|s| filter.accepts(s.kind))
            .collect())
    }

    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    /// Symbols in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
