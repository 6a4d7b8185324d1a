//! Named, titled, nestable documentation groups
//!
//! [`GroupStack`] follows `@{`/`@}` nesting while one file is scanned.
//! [`GroupHierarchy`] is the batch-wide tree that group definitions from all
//! files are merged into.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::SourceLocation;
use crate::scanner::{GroupMode, SourceComment};
use crate::symbol::SymbolId;

/// Errors from group frame bookkeeping
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStackError {
    #[error("group close without a matching open")]
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Named(String),
    /// `@{` with no group to open; balances a later `@}` and nothing else
    Anonymous,
}

/// The open `@{` frames of the file being scanned
#[derive(Debug, Clone, Default)]
pub struct GroupStack {
    frames: Vec<Frame>,
    aborted: bool,
}

impl GroupStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame for a named group
    pub fn open_group(&mut self, name: impl Into<String>) {
        if !self.aborted {
            self.frames.push(Frame::Named(name.into()));
        }
    }

    /// Push a frame that belongs to no group
    pub fn open_anonymous(&mut self) {
        if !self.aborted {
            self.frames.push(Frame::Anonymous);
        }
    }

    /// Pop the innermost frame, returning the group it belonged to.
    ///
    /// Closing with nothing open stops group tracking for good: every later
    /// open and close is ignored and nothing is reported as open again.
    pub fn close_group(&mut self) -> Result<Option<String>, GroupStackError> {
        if self.aborted {
            return Ok(None);
        }
        match self.frames.pop() {
            Some(Frame::Named(name)) => Ok(Some(name)),
            Some(Frame::Anonymous) => Ok(None),
            None => {
                self.aborted = true;
                Err(GroupStackError::Unmatched)
            }
        }
    }

    /// Name of the innermost open named group
    #[must_use]
    pub fn innermost(&self) -> Option<&str> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Named(name) => Some(name.as_str()),
            Frame::Anonymous => None,
        })
    }

    /// True while any named group is open
    #[must_use]
    pub fn has_open_group(&self) -> bool {
        self.innermost().is_some()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Consume the stack, returning named groups left open (outermost first)
    #[must_use]
    pub fn finish(self) -> Vec<String> {
        self.frames
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Named(name) => Some(name),
                Frame::Anonymous => None,
            })
            .collect()
    }
}

/// Index of a group in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupId(pub u32);

/// A group definition as found in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefinition {
    pub name: String,
    pub title: Option<String>,
    pub mode: GroupMode,
    /// Enclosing group at the definition site, or the first `@ingroup`
    pub parent: Option<String>,
    pub doc: Option<SourceComment>,
    pub location: SourceLocation,
}

/// A merged group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub title: Option<String>,
    /// Lookup-only link to the enclosing group
    pub parent: Option<GroupId>,
    /// Members in first-seen order
    pub members: Vec<SymbolId>,
    /// Documentation from every definition, in registration order
    pub docs: Vec<SourceComment>,
    /// Where the group was first mentioned
    pub location: SourceLocation,
    /// Whether a `@defgroup` has been seen (as opposed to only additions)
    defined: bool,
}

/// Batch-wide tree of groups
#[derive(Debug, Clone, Default)]
pub struct GroupHierarchy {
    groups: Vec<Group>,
    by_name: HashMap<String, GroupId>,
}

impl GroupHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a group up by name, creating an untitled one if needed
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn ensure(&mut self, name: &str, location: SourceLocation) -> GroupId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(Group {
            id,
            name: name.to_string(),
            title: None,
            parent: None,
            members: Vec::new(),
            docs: Vec::new(),
            location,
            defined: false,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Merge a definition into the hierarchy.
    ///
    /// A later non-empty title replaces an earlier one (except for
    /// `@weakgroup`, which only fills a missing title); documentation is
    /// appended; the first parent that keeps the tree acyclic wins.
    pub(crate) fn define(&mut self, def: GroupDefinition) -> (GroupId, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let id = self.ensure(&def.name, def.location);
        let parent = def
            .parent
            .as_deref()
            .filter(|p| *p != def.name)
            .map(|p| self.ensure(p, def.location));

        if let Some(parent) = parent {
            if self.groups[id.0 as usize].parent.is_none() {
                if self.is_ancestor(id, parent) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::GroupCycle {
                            group: def.name.clone(),
                            parent: self.groups[parent.0 as usize].name.clone(),
                        },
                        def.location,
                    ));
                } else {
                    self.groups[id.0 as usize].parent = Some(parent);
                }
            }
        }

        let group = &mut self.groups[id.0 as usize];
        if def.mode == GroupMode::Define {
            if group.defined {
                tracing::debug!(group = %def.name, "duplicate group definition merged");
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateGroupName(def.name.clone()),
                        def.location,
                    )
                    .with_hint("definitions are merged; the later title wins"),
                );
            }
            group.defined = true;
        }
        if let Some(title) = def.title {
            if def.mode != GroupMode::Weak || group.title.is_none() {
                group.title = Some(title);
            }
        }
        if let Some(doc) = def.doc {
            group.docs.push(doc);
        }
        (id, diagnostics)
    }

    /// Append a member unless it is already listed
    pub(crate) fn add_member(&mut self, group: GroupId, symbol: SymbolId) {
        if let Some(group) = self.groups.get_mut(group.0 as usize) {
            if !group.members.contains(&symbol) {
                group.members.push(symbol);
            }
        }
    }

    /// True if `ancestor` is `group` or one of its parents
    fn is_ancestor(&self, ancestor: GroupId, group: GroupId) -> bool {
        let mut current = Some(group);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.groups.get(id.0 as usize).and_then(|g| g.parent);
        }
        false
    }

    #[must_use]
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0 as usize)
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Group> {
        self.by_name.get(name).and_then(|&id| self.get(id))
    }

    /// Names from the root group down to `id`
    #[must_use]
    pub fn path(&self, id: GroupId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self.get(id);
        while let Some(group) = current {
            path.push(group.name.clone());
            current = group.parent.and_then(|p| self.get(p));
        }
        path.reverse();
        path
    }

    /// Direct subgroups of `id`, in definition order
    pub fn children(&self, id: GroupId) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(move |g| g.parent == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{FileId, Location, Span};

    fn here() -> SourceLocation {
        SourceLocation::new(FileId(0), Span::new(0, 1), Location::new(1, 1))
    }

    fn def(name: &str, title: Option<&str>, mode: GroupMode, parent: Option<&str>) -> GroupDefinition {
        GroupDefinition {
            name: name.to_string(),
            title: title.map(str::to_string),
            mode,
            parent: parent.map(str::to_string),
            doc: None,
            location: here(),
        }
    }

    #[test]
    fn test_stack_nesting() {
        let mut stack = GroupStack::new();
        stack.open_group("outer");
        stack.open_anonymous();
        assert_eq!(stack.innermost(), Some("outer"));
        stack.open_group("inner");
        assert_eq!(stack.innermost(), Some("inner"));
        assert_eq!(stack.close_group(), Ok(Some("inner".to_string())));
        assert_eq!(stack.close_group(), Ok(None));
        assert_eq!(stack.innermost(), Some("outer"));
        assert_eq!(stack.finish(), vec!["outer".to_string()]);
    }

    #[test]
    fn test_unmatched_close_aborts_tracking() {
        let mut stack = GroupStack::new();
        stack.open_group("g");
        assert!(stack.close_group().is_ok());
        assert_eq!(stack.close_group(), Err(GroupStackError::Unmatched));
        assert!(stack.is_aborted());
        stack.open_group("h");
        assert!(!stack.has_open_group());
        assert_eq!(stack.close_group(), Ok(None));
    }

    #[test]
    fn test_duplicate_definitions_merge() {
        let mut groups = GroupHierarchy::new();
        let (a, diags) = groups.define(def("init", Some("Setup"), GroupMode::Define, None));
        assert!(diags.is_empty());
        groups.add_member(a, SymbolId(3));
        groups.add_member(a, SymbolId(1));

        let (b, diags) = groups.define(def("init", Some("Setup and Teardown"), GroupMode::Define, None));
        assert_eq!(a, b);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::DuplicateGroupName("init".into()));
        groups.add_member(b, SymbolId(1));
        groups.add_member(b, SymbolId(7));

        let group = groups.by_name("init").unwrap();
        assert_eq!(group.title.as_deref(), Some("Setup and Teardown"));
        assert_eq!(group.members, vec![SymbolId(3), SymbolId(1), SymbolId(7)]);
    }

    #[test]
    fn test_addtogroup_is_not_a_duplicate() {
        let mut groups = GroupHierarchy::new();
        groups.define(def("pools", Some("Pools"), GroupMode::Define, None));
        let (_, diags) = groups.define(def("pools", None, GroupMode::Add, None));
        assert!(diags.is_empty());
        let (_, diags) = groups.define(def("pools", Some("Weak"), GroupMode::Weak, None));
        assert!(diags.is_empty());
        assert_eq!(groups.by_name("pools").unwrap().title.as_deref(), Some("Pools"));
    }

    #[test]
    fn test_paths_and_cycles() {
        let mut groups = GroupHierarchy::new();
        let (outer, _) = groups.define(def("outer", None, GroupMode::Define, None));
        let (inner, _) = groups.define(def("inner", None, GroupMode::Define, Some("outer")));
        assert_eq!(groups.path(inner), vec!["outer".to_string(), "inner".to_string()]);
        assert_eq!(groups.children(outer).count(), 1);

        let (_, diags) = groups.define(def("outer", None, GroupMode::Add, Some("inner")));
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].kind, DiagnosticKind::GroupCycle { .. }));
        assert_eq!(groups.get(outer).unwrap().parent, None);
    }
}
