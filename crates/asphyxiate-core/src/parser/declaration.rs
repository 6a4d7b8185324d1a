//! Declaration types produced by the parser

use serde::Serialize;

use crate::doc::Documentation;
use crate::lexer::SourceLocation;
use crate::symbol::SymbolKind;

/// A function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    /// Omitted in prototypes such as `int f(int)`
    pub name: Option<String>,
    pub ty: String,
}

/// A struct or union member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub name: String,
    pub ty: String,
    pub doc: Option<Documentation>,
    pub location: SourceLocation,
}

/// Kind-specific shape of a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
    Function {
        return_type: String,
        params: Vec<Param>,
        variadic: bool,
        /// Has a body rather than ending in `;`
        is_definition: bool,
    },
    Struct {
        is_union: bool,
        members: Vec<Member>,
    },
    Typedef {
        /// The aliased type, e.g. `struct one` or `void *`
        target: String,
    },
    Macro {
        /// `None` for object-like macros
        params: Option<Vec<String>>,
        body: String,
    },
    Enum {
        enumerators: Vec<String>,
    },
    Variable {
        ty: String,
    },
    /// Code the parser could not classify
    Unrecognized,
}

impl DeclKind {
    /// The symbol kind this declaration registers under
    #[must_use]
    pub const fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            Self::Function { .. } => Some(SymbolKind::Function),
            Self::Struct { .. } => Some(SymbolKind::Struct),
            Self::Typedef { .. } => Some(SymbolKind::Typedef),
            Self::Macro { .. } => Some(SymbolKind::Macro),
            Self::Enum { .. } => Some(SymbolKind::Enum),
            Self::Variable { .. } => Some(SymbolKind::Variable),
            Self::Unrecognized => None,
        }
    }

    /// Parameter names, for kinds that take parameters
    #[must_use]
    pub fn param_names(&self) -> Option<Vec<&str>> {
        match self {
            Self::Function { params, .. } => {
                Some(params.iter().filter_map(|p| p.name.as_deref()).collect())
            }
            Self::Macro {
                params: Some(params),
                ..
            } => Some(params.iter().map(String::as_str).collect()),
            _ => None,
        }
    }
}

/// One declaration found in a header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    /// Qualified name; `None` for anonymous or unrecognized code
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: DeclKind,
    /// Declaration text with whitespace normalized and bodies elided
    pub signature: String,
    pub location: SourceLocation,
    pub doc: Option<Documentation>,
}

impl Declaration {
    #[must_use]
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        self.kind.symbol_kind()
    }
}
