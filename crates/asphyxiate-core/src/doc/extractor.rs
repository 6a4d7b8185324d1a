//! Documentation extractor - turns one header into registrable items
//!
//! This is the per-file half of a run. It touches nothing shared, so files
//! can be extracted in parallel; the results are merged into the
//! [`Registry`](crate::registry::Registry) afterwards, in input order.

use crate::config::ExtractorConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::group::GroupDefinition;
use crate::lexer::{FileId, SourceLocation};
use crate::parser::{DeclKind, DeclParser, Declaration};
use crate::scanner::{self, Attachment, DocTarget, Entry, GroupEvent, ScanItem, SourceComment, TargetKind};

use super::types::Documentation;

/// A declaration ready to become (part of) a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSymbol {
    pub declaration: Declaration,
    /// Innermost open group at the declaration
    pub group: Option<String>,
    /// Groups named with `@ingroup`
    pub in_groups: Vec<String>,
}

/// One registrable item, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractItem {
    Group(GroupDefinition),
    Symbol(ExtractedSymbol),
    FileDoc(SourceComment),
    Loose(SourceComment),
}

/// Everything extracted from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtract {
    pub file: FileId,
    pub name: String,
    pub has_file_marker: bool,
    pub items: Vec<ExtractItem>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileExtract {
    fn new(file: FileId, name: &str, has_file_marker: bool) -> Self {
        Self {
            file,
            name: name.to_string(),
            has_file_marker,
            items: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn loose(&mut self, comment: SourceComment) {
        self.items.push(ExtractItem::Loose(comment));
    }

    /// Declarations in this file, in order
    pub fn symbols(&self) -> impl Iterator<Item = &ExtractedSymbol> {
        self.items.iter().filter_map(|item| match item {
            ExtractItem::Symbol(s) => Some(s),
            _ => None,
        })
    }
}

/// Extracts documentation from header text
pub struct DocExtractor<'c> {
    config: &'c ExtractorConfig,
}

impl<'c> DocExtractor<'c> {
    #[must_use]
    pub fn new(config: &'c ExtractorConfig) -> Self {
        Self { config }
    }

    /// Scan, parse and pair one file
    #[tracing::instrument(level = "debug", skip_all, fields(file = %file, name = name))]
    pub fn extract(&self, file: FileId, name: &str, source: &str) -> FileExtract {
        let scanned = scanner::scan(file, source);
        let parser = DeclParser::new(file, &scanned.line_index, self.config.autobrief);
        let mut out = FileExtract::new(file, name, scanned.has_file_marker);
        out.diagnostics.extend(scanned.diagnostics.iter().cloned());

        for item in scanned.items.iter().cloned() {
            match item {
                ScanItem::Group(GroupEvent::Defined(def)) => out.items.push(ExtractItem::Group(def)),
                ScanItem::Group(event) => tracing::trace!(?event, "group nesting"),
                ScanItem::FileDoc(comment) => out.items.push(ExtractItem::FileDoc(comment)),
                ScanItem::Loose(comment) => out.loose(comment),
                ScanItem::Entry(entry) => self.extract_entry(&parser, entry, &mut out),
            }
        }

        tracing::debug!(
            symbols = out.symbols().count(),
            diagnostics = out.diagnostics.len(),
            "extracted file"
        );
        out
    }

    fn extract_entry(&self, parser: &DeclParser<'_>, entry: Entry<'_>, out: &mut FileExtract) {
        if !entry.is_documented() && !self.config.extract_all {
            return;
        }
        let Entry {
            comment,
            trailing,
            target,
            in_groups,
            fragment,
            group,
        } = entry;

        // A leading comment wins over a trailing one
        let comment = match (comment, trailing) {
            (Some(leading), Some(trailing)) => {
                out.loose(trailing);
                Some(leading)
            }
            (leading, trailing) => leading.or(trailing),
        };
        let code = fragment.as_ref().map(|f| parser.parse(f));

        let declaration = match target {
            Some(target) => {
                let location = comment.as_ref().map_or_else(
                    || code.as_ref().map(|d| d.location),
                    |c| Some(comment_location(c)),
                );
                match location {
                    Some(location) => self.explicit_target(parser, &target, code, location, &group, out),
                    None => code,
                }
            }
            None => code,
        };
        let Some(mut declaration) = declaration else {
            if let Some(comment) = comment {
                out.loose(comment);
            }
            return;
        };

        if declaration.symbol_kind().is_none() {
            if let Some(comment) = comment {
                out.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnrecognizedDeclaration(declaration.signature.clone()),
                    declaration.location,
                ));
                out.loose(comment);
            }
            return;
        }
        let Some(owner) = declaration.name.clone() else {
            // Anonymous struct or enum: nothing to register it under
            if let Some(comment) = comment {
                out.loose(comment);
            }
            return;
        };

        if let Some(mut comment) = comment {
            comment.attachment = Attachment::Declaration;
            let doc = Documentation::parse(comment, self.config.autobrief);
            if self.config.warn_param_mismatch {
                check_params(&owner, &declaration.kind, &doc, &mut out.diagnostics);
            }
            declaration.doc = Some(doc);
        }

        let members = self.member_symbols(&owner, &declaration);
        out.items.push(ExtractItem::Symbol(ExtractedSymbol {
            declaration,
            group,
            in_groups,
        }));
        out.items.extend(members.into_iter().map(|declaration| {
            ExtractItem::Symbol(ExtractedSymbol {
                declaration,
                group: None,
                in_groups: Vec::new(),
            })
        }));
    }

    /// Resolve a `@struct`/`@fn`/... command against the code that follows
    fn explicit_target(
        &self,
        parser: &DeclParser<'_>,
        target: &DocTarget,
        code: Option<Declaration>,
        location: SourceLocation,
        group: &Option<String>,
        out: &mut FileExtract,
    ) -> Option<Declaration> {
        let Some(name) = target.name() else {
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MissingCommandTarget(command_name(target.kind)),
                location,
            ));
            return code;
        };
        match code {
            Some(code) if code.name.as_deref() == Some(name) => Some(code),
            code => {
                // The command documents something else; the code stays undocumented
                if let Some(code) = code.filter(|c| self.config.extract_all && c.name.is_some()) {
                    if code.symbol_kind().is_some() {
                        out.items.push(ExtractItem::Symbol(ExtractedSymbol {
                            declaration: code,
                            group: group.clone(),
                            in_groups: Vec::new(),
                        }));
                    }
                }
                Some(parser.parse_target(target, location))
            }
        }
    }

    /// Documented members of a struct, as `owner::member` variables
    fn member_symbols(&self, owner: &str, declaration: &Declaration) -> Vec<Declaration> {
        let DeclKind::Struct { members, .. } = &declaration.kind else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|m| m.doc.is_some() || self.config.extract_all)
            .map(|m| {
                let doc = m.doc.clone().map(|mut doc| {
                    doc.comment.attachment = Attachment::Declaration;
                    doc
                });
                Declaration {
                    name: Some(format!("{owner}::{}", m.name)),
                    kind: DeclKind::Variable { ty: m.ty.clone() },
                    signature: member_signature(&m.ty, &m.name),
                    location: m.location,
                    doc,
                }
            })
            .collect()
    }
}

fn comment_location(comment: &SourceComment) -> SourceLocation {
    SourceLocation::new(comment.file, comment.span, comment.location)
}

const fn command_name(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Struct => "@struct",
        TargetKind::Union => "@union",
        TargetKind::Enum => "@enum",
        TargetKind::Typedef => "@typedef",
        TargetKind::Function => "@fn",
        TargetKind::Macro => "@def",
        TargetKind::Variable => "@var",
    }
}

/// `char *` + `a` is `char *a`; `char [4]` + `b` is `char b[4]`
fn member_signature(ty: &str, name: &str) -> String {
    if let Some(bracket) = ty.find('[') {
        format!("{} {name}{}", ty[..bracket].trim_end(), &ty[bracket..])
    } else if ty.ends_with('*') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

/// Warn about `@param` names the declaration does not have
fn check_params(owner: &str, kind: &DeclKind, doc: &Documentation, diagnostics: &mut Vec<Diagnostic>) {
    let Some(names) = kind.param_names() else {
        return;
    };
    for param in &doc.doc.params {
        if param.name.is_empty() || param.name == "..." || names.contains(&param.name.as_str()) {
            continue;
        }
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::ParamMismatch {
                function: owner.to_string(),
                param: param.name.clone(),
            },
            doc.comment.location_of(param.name_span),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolKind;

    fn extract(source: &str) -> FileExtract {
        DocExtractor::new(&ExtractorConfig::default()).extract(FileId(0), "test.h", source)
    }

    fn names(extract: &FileExtract) -> Vec<(String, SymbolKind)> {
        extract
            .symbols()
            .filter_map(|s| Some((s.declaration.name.clone()?, s.declaration.symbol_kind()?)))
            .collect()
    }

    #[test]
    fn test_extract_documented_function() {
        let out = extract("/** Sum two numbers. */\nint sum(int a, int b);\nint hidden(void);\n");
        assert_eq!(names(&out), vec![("sum".to_string(), SymbolKind::Function)]);
        let decl = &out.symbols().next().unwrap().declaration;
        assert_eq!(decl.doc.as_ref().unwrap().brief(), Some("Sum two numbers."));
        assert_eq!(decl.doc.as_ref().unwrap().comment.attachment, Attachment::Declaration);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_extract_all_registers_undocumented() {
        let config = ExtractorConfig::default().with_extract_all(true);
        let out = DocExtractor::new(&config).extract(FileId(0), "a.h", "int hidden(void);\n");
        assert_eq!(names(&out), vec![("hidden".to_string(), SymbolKind::Function)]);
    }

    #[test]
    fn test_struct_members_become_symbols() {
        let out = extract("/** A pair. */\nstruct one {\n  int a; /**< First. */\n  int b;\n};\n");
        assert_eq!(
            names(&out),
            vec![
                ("one".to_string(), SymbolKind::Struct),
                ("one::a".to_string(), SymbolKind::Variable),
            ]
        );
        let member = out.symbols().nth(1).unwrap();
        assert_eq!(member.declaration.signature, "int a");
    }

    #[test]
    fn test_param_mismatch() {
        let out = extract("/**\n * Read.\n * @param io the pool\n * @param bogus nothing\n */\nint rd(int io);\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(
            out.diagnostics[0].kind,
            DiagnosticKind::ParamMismatch {
                function: "rd".into(),
                param: "bogus".into()
            }
        );
        assert_eq!(out.diagnostics[0].location.line(), 4);

        let config = ExtractorConfig::default().with_warn_param_mismatch(false);
        let out = DocExtractor::new(&config).extract(
            FileId(0),
            "a.h",
            "/** @param bogus x */\nint rd(int io);\n",
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_unrecognized_documented_fragment() {
        let out = extract("/** Declares things. */\nDECLARE_THINGS(foo);\n");
        assert!(names(&out).is_empty());
        assert!(matches!(
            out.diagnostics[0].kind,
            DiagnosticKind::UnrecognizedDeclaration(_)
        ));
        assert!(matches!(out.items[0], ExtractItem::Loose(_)));
    }

    #[test]
    fn test_explicit_target_overrides_code() {
        let source = "/**\n * @typedef rados_watchcb_t\n * Callback on notify.\n */\ntypedef void (*rados_watchcb_t)(uint8_t opcode, void *arg);\n/** @struct stat_t\n * Pool stats.\n */\n";
        let out = extract(source);
        assert_eq!(
            names(&out),
            vec![
                ("rados_watchcb_t".to_string(), SymbolKind::Typedef),
                ("stat_t".to_string(), SymbolKind::Struct),
            ]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_target_name() {
        let out = extract("/** @struct\n * Nothing named.\n */\nint x;\n");
        assert_eq!(
            out.diagnostics[0].kind,
            DiagnosticKind::MissingCommandTarget("@struct")
        );
        assert_eq!(names(&out), vec![("x".to_string(), SymbolKind::Variable)]);
    }

    #[test]
    fn test_group_definitions_pass_through() {
        let out = extract("/** @defgroup init Setup\n * Setup calls.\n * @{\n */\n/** Go. */\nint go(void);\n/** @} */\n");
        let ExtractItem::Group(def) = &out.items[0] else {
            panic!("expected a group definition");
        };
        assert_eq!(def.name, "init");
        assert!(def.doc.is_some());
        assert_eq!(out.symbols().next().unwrap().group.as_deref(), Some("init"));
    }
}
