//! End-to-end runs of the two-phase pipeline

use asphyxiate_core::doc::{ResolvedDoc, SymbolDoc};
use asphyxiate_core::{
    Category, DiagnosticKind, DocOutput, ExtractorConfig, FileId, KindFilter, Pipeline, Reference,
    ReferenceShape, Resolution, SymbolKind, UnresolvedReason,
};
use pretty_assertions::assert_eq;

fn run(inputs: &[(&str, &str)]) -> DocOutput {
    Pipeline::new(ExtractorConfig::default()).run(inputs).unwrap()
}

/// Every reference in a resolved comment, in text order
fn references(doc: &ResolvedDoc) -> Vec<&Reference> {
    doc.brief
        .iter()
        .chain(&doc.details)
        .chain(doc.params.iter().map(|p| &p.text))
        .chain(&doc.returns)
        .chain(doc.sections.iter().map(|s| &s.text))
        .flat_map(|text| text.references())
        .collect()
}

fn symbol<'a>(output: &'a DocOutput, name: &str, kind: SymbolKind) -> &'a SymbolDoc {
    output
        .model
        .symbol(name, kind)
        .unwrap_or_else(|| panic!("no {kind} `{name}`"))
}

const ARITHMETIC: &str = "\
/**
 * @file
 * Arithmetic helpers.
 */

/** A pair of operands. */
struct one {
  int left;  /**< Left operand. */
  int right; /**< Right operand. */
};

/**
 * Sum two numbers.
 * Both must be non-negative. As in sum().
 * @param a first operand
 * @param b second operand
 * @return the total
 */
int sum(int a, int b);

/**
 * Subtract two numbers.
 * See sum(). See ::one.
 */
int subtract(int a, int b);
";

#[test]
fn scenario_a_call_references_resolve() {
    let output = run(&[("arith.h", ARITHMETIC)]);
    let sum = symbol(&output, "sum", SymbolKind::Function);
    let subtract = symbol(&output, "subtract", SymbolKind::Function);

    let own = references(sum.doc().unwrap());
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].shape, ReferenceShape::Call);
    assert_eq!(own[0].text, "sum()");
    assert_eq!(own[0].resolution, Resolution::Resolved { symbol: sum.id });

    let calls: Vec<_> = references(subtract.doc().unwrap())
        .into_iter()
        .filter(|r| r.shape == ReferenceShape::Call)
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].resolution, Resolution::Resolved { symbol: sum.id });
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn scenario_b_scoped_reference_resolves_to_struct() {
    let output = run(&[("arith.h", ARITHMETIC)]);
    let one = symbol(&output, "one", SymbolKind::Struct);
    let subtract = symbol(&output, "subtract", SymbolKind::Function);

    let scoped: Vec<_> = references(subtract.doc().unwrap())
        .into_iter()
        .filter(|r| r.shape == ReferenceShape::Scoped)
        .collect();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].text, "::one");
    assert_eq!(scoped[0].resolution, Resolution::Resolved { symbol: one.id });
    assert_eq!(scoped[0].location.line(), 23);
}

#[test]
fn scenario_c_excess_close_aborts_group_tracking() {
    let source = "\
/** @defgroup ops Operations
 * @{
 */
/** Add. */
int add(int a, int b);
/** Sub. */
int sub(int a, int b);
/** @} */
/** @} */
/** Mul. */
int mul(int a, int b);
";
    let output = run(&[("ops.h", source)]);

    let mismatches: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.category() == Category::GroupMismatch)
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].kind, DiagnosticKind::UnmatchedGroupClose);
    assert_eq!(mismatches[0].location.line(), 9);

    let ops = vec!["ops".to_string()];
    assert_eq!(symbol(&output, "add", SymbolKind::Function).group_path, ops);
    assert_eq!(symbol(&output, "sub", SymbolKind::Function).group_path, ops);
    assert!(symbol(&output, "mul", SymbolKind::Function).group_path.is_empty());

    let group = output.model.group(&["ops"]).unwrap();
    assert_eq!(group.title.as_deref(), Some("Operations"));
    assert_eq!(group.members.len(), 2);
}

#[test]
fn scenario_d_redeclarations_merge_across_files() {
    let inputs = [
        ("a.h", "/** Foo, first. */\nint foo(int);\n"),
        ("b.h", "\n\n/** Foo, second. */\nint foo(int);\n"),
        ("c.h", "/** Wraps foo(). */\nint bar(int);\n"),
    ];
    let pipeline = Pipeline::new(ExtractorConfig::default());

    let mut registry = pipeline.register(&inputs).unwrap();
    registry.freeze();
    let found = registry
        .symbols()
        .lookup("foo", KindFilter::Only(SymbolKind::Function))
        .unwrap();
    assert_eq!(found.len(), 1);
    let positions: Vec<_> = found[0]
        .declarations
        .iter()
        .map(|d| (d.location.file, d.location.line()))
        .collect();
    assert_eq!(positions, vec![(FileId(0), 2), (FileId(1), 4)]);

    let output = pipeline.run(&inputs).unwrap();
    let foo = symbol(&output, "foo", SymbolKind::Function);
    let bar = symbol(&output, "bar", SymbolKind::Function);
    let reference = references(bar.doc().unwrap())[0];
    match &reference.resolution {
        Resolution::ResolvedSet { symbol, declarations } => {
            assert_eq!(*symbol, foo.id);
            assert_eq!(declarations.len(), 2);
            assert_eq!(declarations[0].file, FileId(0));
            assert_eq!(declarations[1].file, FileId(1));
        }
        other => panic!("expected a resolved set, got {other:?}"),
    }
}

#[test]
fn bare_reference_without_file_marker_is_unresolved() {
    let source = "\
/** A pair. */
struct pair { int a; };

/** Takes a pair. */
int take(struct pair *p);
";
    let output = run(&[("pair.h", source)]);
    let take = symbol(&output, "take", SymbolKind::Function);
    let pair = symbol(&output, "pair", SymbolKind::Struct);

    let bare = references(take.doc().unwrap());
    assert_eq!(bare.len(), 1);
    assert_eq!(
        bare[0].resolution,
        Resolution::Unresolved {
            reason: UnresolvedReason::ReferencesDisabled,
            candidates: vec![pair.id],
        }
    );
    // The text is kept as written
    let brief = take.doc().unwrap().brief.as_ref().unwrap();
    assert_eq!(brief.plain_text(), "Takes a pair.");

    // Once in the struct's own comment, once in take's
    let disabled = output
        .diagnostics
        .iter()
        .filter(|d| {
            matches!(
                d.kind,
                DiagnosticKind::ReferenceUnresolved {
                    reason: UnresolvedReason::ReferencesDisabled,
                    ..
                }
            )
        })
        .count();
    assert_eq!(disabled, 2);
}

#[test]
fn open_group_enables_bare_references() {
    let source = "\
/** @defgroup pairs Pairs
 * @{
 */
/** A pair. */
struct pair { int a; };

/** Takes a pair. */
int take(struct pair *p);
/** @} */

/** Also takes a pair. */
int take_again(struct pair *p);
";
    let output = run(&[("pair.h", source)]);
    let pair = symbol(&output, "pair", SymbolKind::Struct);

    let inside = references(symbol(&output, "take", SymbolKind::Function).doc().unwrap());
    assert_eq!(inside[0].resolution, Resolution::Resolved { symbol: pair.id });

    let outside = references(symbol(&output, "take_again", SymbolKind::Function).doc().unwrap());
    assert!(matches!(
        outside[0].resolution,
        Resolution::Unresolved {
            reason: UnresolvedReason::ReferencesDisabled,
            ..
        }
    ));
}

#[test]
fn bare_reference_matching_two_kinds_is_ambiguous() {
    let source = "\
/** @file */
/** The stat record. */
struct stat { int size; };
/** Fill a stat. */
int stat(const char *path, struct stat *buf);
/** Wraps stat for files. */
int fstat(int fd, struct stat *buf);
";
    let output = run(&[("stat.h", source)]);
    let fstat = symbol(&output, "fstat", SymbolKind::Function);
    let refs = references(fstat.doc().unwrap());
    assert_eq!(refs.len(), 1);
    assert!(matches!(
        &refs[0].resolution,
        Resolution::Unresolved {
            reason: UnresolvedReason::Ambiguous,
            candidates,
        } if candidates.len() == 2
    ));
    let ambiguous = output
        .diagnostics
        .iter()
        .find(|d| d.location.line() == 6)
        .unwrap();
    assert_eq!(
        ambiguous.hint.as_deref(),
        Some("candidates: struct `stat`, function `stat`")
    );
}

#[test]
fn unknown_file_is_absent() {
    let output = run(&[("arith.h", ARITHMETIC)]);
    assert!(output.model.file("arith.h").is_some());
    assert!(output.model.file("missing.h").is_none());
}

#[test]
fn repeated_runs_are_identical() {
    let inputs = [
        ("arith.h", ARITHMETIC),
        ("more.h", "/** Add three, see sum() and ::one. */\nint sum3(int a, int b, int c);\n"),
    ];
    let pipeline = Pipeline::new(ExtractorConfig::default());
    let first = pipeline.run(&inputs).unwrap();
    let second = pipeline.run(&inputs).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.model.to_json().unwrap(), second.model.to_json().unwrap());

    let sequential = Pipeline::new(ExtractorConfig::default().with_parallel(false))
        .run(&inputs)
        .unwrap();
    assert_eq!(first, sequential);
}

#[test]
fn config_file_controls_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("asphyxiate.toml");
    std::fs::write(&path, "extract_all = true\nparallel = false\n").unwrap();
    let config = ExtractorConfig::load(&path).unwrap();
    assert!(config.extract_all);

    let source = "int hidden(void);\n/** Shown. */\nint shown(void);\n";
    let all = Pipeline::new(config).run(&[("x.h", source)]).unwrap();
    assert!(all.model.symbol("hidden", SymbolKind::Function).is_some());

    let documented = run(&[("x.h", source)]);
    assert!(documented.model.symbol("hidden", SymbolKind::Function).is_none());
    assert!(documented.model.symbol("shown", SymbolKind::Function).is_some());
}

const SUM_HEADER: &str = include_str!("fixtures/sum.h");
const SUM_STRUCT_HEADER: &str = include_str!("fixtures/sum_struct.h");
const LIBRADOS_HEADER: &str = include_str!("fixtures/librados.h");

#[test]
fn sum_header_links_calls() {
    let output = run(&[("sum.h", SUM_HEADER)]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert!(output.model.file("sum.h").unwrap().has_file_marker);

    let sum = symbol(&output, "sum", SymbolKind::Function);
    let subtract = symbol(&output, "subtract", SymbolKind::Function);
    assert_eq!(
        sum.doc().unwrap().brief.as_ref().unwrap().plain_text(),
        "Sum two numbers."
    );

    for (doc, line) in [(sum.doc().unwrap(), 8), (subtract.doc().unwrap(), 13)] {
        let refs = references(doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].shape, ReferenceShape::Call);
        assert_eq!(refs[0].text, "sum()");
        assert_eq!(refs[0].resolution, Resolution::Resolved { symbol: sum.id });
        assert_eq!(refs[0].location.line(), line);
    }
}

#[test]
fn sum_struct_header_links_scoped_reference() {
    let output = run(&[("sum.h", SUM_STRUCT_HEADER)]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let one = symbol(&output, "one", SymbolKind::Struct);
    assert!(output.model.symbol("one::a", SymbolKind::Variable).is_some());

    let subtract = symbol(&output, "subtract", SymbolKind::Function);
    let refs = references(subtract.doc().unwrap());
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].shape, ReferenceShape::Scoped);
    assert_eq!(refs[0].text, "::one");
    assert_eq!(refs[0].resolution, Resolution::Resolved { symbol: one.id });
    assert_eq!(refs[0].location.line(), 12);

    // The struct's own brief names it bare, and `@file` enables that
    let own = references(one.doc().unwrap());
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].shape, ReferenceShape::Bare);
    assert_eq!(own[0].resolution, Resolution::Resolved { symbol: one.id });
}

#[test]
fn librados_header_symbols_and_groups() {
    let output = run(&[("librados.h", LIBRADOS_HEADER)]);
    assert_eq!(output.model.symbols.len(), 84);
    assert_eq!(output.model.groups.len(), 10);
    assert!(!output
        .diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::UnexpectedCharacter(_))));

    let xattrs = output.model.group(&["synch_io", "xattrs"]).unwrap();
    assert_eq!(xattrs.title.as_deref(), Some("Xattrs"));
    assert!(output
        .model
        .group(&["synch_io"])
        .unwrap()
        .subgroups
        .contains(&"xattrs".to_string()));

    let path = |name: &str| symbol(&output, name, SymbolKind::Function).group_path.clone();
    assert_eq!(path("rados_getxattr"), vec!["synch_io", "xattrs"]);
    assert_eq!(path("rados_create"), vec!["init"]);
    assert!(path("rados_version").is_empty());
    assert!(path("rados_cluster_stat").is_empty());
}

#[test]
fn librados_header_reports_only_missing_call_targets() {
    let output = run(&[("librados.h", LIBRADOS_HEADER)]);

    let mut missing: Vec<&str> = output
        .diagnostics
        .iter()
        .filter_map(|d| match &d.kind {
            DiagnosticKind::ReferenceUnresolved {
                text,
                shape,
                reason: UnresolvedReason::NotFound,
            } => {
                assert_eq!(*shape, ReferenceShape::Call, "{d:?}");
                Some(text.as_str())
            }
            _ => None,
        })
        .collect();
    missing.sort_unstable();
    missing.dedup();

    for text in &missing {
        let name = text.trim_end_matches(['(', ')']);
        assert!(output.model.symbol(name, SymbolKind::Function).is_none(), "{name}");
    }
    assert_eq!(
        missing,
        vec![
            "rados_ioctx_objects_list_close()",
            "rados_ioctx_objects_list_next()",
            "rados_ioctx_objects_list_open()",
            "rados_ioctx_open()",
            "rados_ioctx_selfmanaged_snap_set_write_context()",
            "rados_ioctx_set_object_locater_key()",
            "rados_ioctx_set_snap_read()",
            "rados_ioctx_wait_for_complete()",
            "rados_selfmanaged_snap_set_write_context()",
        ]
    );

    // Declared targets still link
    let shutdown = symbol(&output, "rados_shutdown", SymbolKind::Function);
    let connect = symbol(&output, "rados_connect", SymbolKind::Function);
    assert!(references(shutdown.doc().unwrap())
        .iter()
        .any(|r| r.text == "rados_connect()" && r.resolution == Resolution::Resolved { symbol: connect.id }));
}
