//! tests of the full compiler, including expected successes and failures

use pretty_assertions::assert_eq;

use crate::{
    compile::{SubtableBody, Verb},
    types::LookupKind,
    Compilation, Compiler, CompilerError, DiagnosticKind, Opts,
};

static THAI: &str = "\
@class CONS = ka kha ngo
@class UPPER = sara_i sara_ii
@class UPPER_NARROW = sara_i.narrow sara_ii.narrow

# Lookup: narrow
@simple {
    sara_i -> sara_i.narrow
    sara_ii -> sara_ii.narrow
}

# Lookup: narrow_after_consonant
# Feature: ccmp
# Script: thai
@contextual {
    after @CONS: @UPPER => lookup narrow
    before tail: ngo => ngo.short
}

# Lookup: ligatures
# Feature: liga
@ligature {
    f_i := f + i
}

# Lookup: decompose
# Feature: ccmp
@one2many {
    sara_am > nikhahit sara_aa
}

# Lookup: swap
# Feature: ccmp
@reorder {
    pre_e cons => cons pre_e
}

@markclass TOP <150, 500>
    mai_ek mai_tho
@base ka
    TOP <300, 700>
@distance T o -60
";

fn compile(text: &str) -> Compilation {
    let _ = env_logger::builder().is_test(true).try_init();
    Compiler::new(text).compile().unwrap()
}

fn kinds(compilation: &Compilation) -> Vec<DiagnosticKind> {
    compilation.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn every_subtable_kind() {
    let compilation = compile(THAI);
    assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
    let names = compilation
        .morx
        .iter()
        .map(|s| (s.lookup.as_str(), s.body.type_name()))
        .collect::<Vec<_>>();
    // 'narrow' is only used through the contextual rule
    assert_eq!(
        names,
        [
            ("narrow_after_consonant", "Contextual"),
            ("ligatures", "LigatureList"),
            ("decompose", "Insertion"),
            ("swap", "Rearrangement"),
        ]
    );
    assert_eq!(compilation.morx[1].namecode, (1, 2));
    let kerx = compilation.kerx.as_ref().unwrap();
    assert_eq!(kerx.distances.len(), 1);
    assert!(kerx.mark_to_base.is_some());
    assert!(kerx.mark_to_mark.is_none());
    compilation.require_output().unwrap();
}

#[test]
fn output_is_idempotent() {
    let first = compile(THAI);
    let second = compile(THAI);
    assert_eq!(first.morx_text(), second.morx_text());
    assert_eq!(first.kerx_text(), second.kerx_text());

    let parallel = Compiler::new(THAI)
        .with_opts(Opts::new().parallel(true))
        .compile()
        .unwrap();
    assert_eq!(first.morx_text(), parallel.morx_text());
}

#[test]
fn contextual_layout() {
    let compilation = compile(
        "\
@contextual {
    after x: a => b
}
",
    );
    let text = compilation.morx_text();
    let body = text.split_once("Exclusive       no\n\n").unwrap().1;
    let expected = "\
Match1          x  // CLASS_001

Match2          a  // CLASS_002

                EOT OOB DEL EOL Match1 Match2
StartText       1   1   1   1   2      1
StartLine       1   1   1   1   2      1
Saw1            1   1   2   1   2      3

    GoTo            Mark?   Advance?    SubstMark   SubstCurrent
1   StartText       no      yes         none        none
2   Saw1            no      yes         none        none
3   StartText       no      yes         none        doSubst1

doSubst1
    a               b

";
    assert_eq!(body, expected);
}

#[test]
fn ligature_layout() {
    let compilation = compile(THAI);
    let text = compilation.morx_text();
    assert!(text.contains("\nType            LigatureList\n"));
    assert!(text.contains("\nf_i                 f i\n"));
}

#[test]
fn long_pattern_rejected_sibling_kept() {
    let compilation = compile(
        "\
@contextual {
    after a b c d e f g h i j: x => y
    after a: x => z
}
",
    );
    assert_eq!(kinds(&compilation), [DiagnosticKind::PatternTooLong]);
    assert_eq!(compilation.diagnostics.iter().next().unwrap().line, Some(2));
    assert_eq!(compilation.morx.len(), 1);
    let SubtableBody::Contextual(subtable) = &compilation.morx[0].body else {
        panic!("expected a contextual subtable");
    };
    let z = compilation.glyphs().get("z").unwrap();
    assert!(subtable.substitutions[0].mapping.iter().any(|(_, t)| *t == z));
    compilation.require_output().unwrap();
}

#[test]
fn reorder_validity() {
    let compilation = compile(
        "\
@reorder {
    g1 g2 => g2 g1
    g1 g2 => g1 g3
}
",
    );
    assert_eq!(kinds(&compilation), [DiagnosticKind::InvalidReorder]);
    let SubtableBody::Rearrangement(subtable) = &compilation.morx[0].body else {
        panic!("expected a rearrangement subtable");
    };
    let verbs = subtable
        .table
        .entries
        .iter()
        .filter_map(|e| e.action)
        .collect::<Vec<_>>();
    assert_eq!(verbs.len(), 1);
    assert_eq!(verbs[0].name(), "Ax->xA");
    assert_eq!(Verb::find(&["g1", "g2"], &["g2", "g1"]), Some(verbs[0]));
    assert!(compilation.morx_text().contains("Ax->xA"));
}

#[test]
fn empty_kind_is_an_error() {
    let compilation = compile(
        "\
@simple {
    a -> b
}
@reorder {
    g1 g2 => g1 g3
}
",
    );
    assert_eq!(compilation.morx.len(), 1);
    assert!(matches!(
        compilation.require_output(),
        Err(CompilerError::EmptySubtableKind {
            kind: LookupKind::Reorder
        })
    ));
}

#[test]
fn unparseable_block_is_an_error() {
    let compilation = compile(
        "\
@simple {
    a -> b
}
@contextual {
    after x a => b
    after : => c
}
",
    );
    assert_eq!(
        kinds(&compilation),
        [
            DiagnosticKind::Parse,
            DiagnosticKind::Parse,
            DiagnosticKind::EmptyLookup
        ]
    );
    assert_eq!(compilation.source.lookups[1].rule_lines, 2);
    assert!(compilation.source.lookups[1].rules.is_empty());
    assert!(matches!(
        compilation.require_output(),
        Err(CompilerError::EmptySubtableKind {
            kind: LookupKind::Contextual
        })
    ));
}

#[test]
fn missing_kerx_is_an_error() {
    let compilation = compile(
        "\
@markclass TOP <150, 500>
    acute
@base a
    TOP <250, 800>
@base a
    TOP <260, 800>
",
    );
    assert!(compilation.kerx.is_none());
    assert!(kinds(&compilation).contains(&DiagnosticKind::AnchorIndexConflict));
    assert!(matches!(
        compilation.require_output(),
        Err(CompilerError::EmptyKerx)
    ));
}

#[test]
fn script_filter() {
    let text = "\
# Script: thai
@simple {
    a -> a.thai
}
# Script: latn
@simple {
    a -> a.latn
}
@simple {
    b -> b.any
}
";
    let compilation = Compiler::new(text)
        .with_opts(Opts::new().scripts(["thai"]))
        .compile()
        .unwrap();
    let text = compilation.morx_text();
    assert!(text.contains("a.thai"));
    assert!(!text.contains("a.latn"));
    assert!(text.contains("b.any"));
}

#[test]
fn table_selection() {
    let compilation = Compiler::new(THAI)
        .with_opts(Opts::new().compile_kerx(false))
        .compile()
        .unwrap();
    assert!(compilation.kerx.is_none());
    assert_eq!(compilation.kerx_text(), "");
    compilation.require_output().unwrap();

    let compilation = Compiler::new(THAI)
        .with_opts(Opts::new().compile_morx(false))
        .compile()
        .unwrap();
    assert!(compilation.morx.is_empty());
    assert!(compilation.kerx.is_some());
    compilation.require_output().unwrap();
}

#[test]
fn unknown_feature_uses_fallback() {
    let compilation = Compiler::new("# Feature: blwf\n@simple {\n    a -> b\n}\n")
        .with_opts(Opts::new().fallback_feature(8, 3))
        .compile()
        .unwrap();
    assert_eq!(compilation.morx[0].namecode, (8, 3));
    assert!(compilation.morx_text().contains("Namecode        8\n"));
}

#[test]
fn from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.txt");
    std::fs::write(&path, THAI).unwrap();
    let compilation = Compiler::from_path(&path).compile().unwrap();
    assert_eq!(compilation.morx_text(), compile(THAI).morx_text());

    let missing = dir.path().join("nope.txt");
    let err = Compiler::from_path(&missing).compile().unwrap_err();
    assert!(matches!(err, CompilerError::SourceLoad { path, .. } if path == missing));
}

#[test]
fn diagnostics_are_truncated() {
    let text = "@simple {\n    a -> b\n    nonsense\n    more nonsense\n    still more\n}\n";
    let compilation = Compiler::new(text)
        .with_opts(Opts::new().max_error_messages(1))
        .compile()
        .unwrap();
    assert_eq!(compilation.diagnostics.len(), 3);
    let printed = compilation.diagnostics.display().to_string();
    assert_eq!(printed.lines().count(), 2);
    assert!(printed.ends_with("... and 2 more\n"));
}
