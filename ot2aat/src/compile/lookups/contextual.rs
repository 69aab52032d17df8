//! Contextual substitutions
//!
//! `before`, `after` and `between` rules are all compiled into a single
//! machine. A rule whose source is followed by context marks the source and
//! substitutes the marked glyph once the context is complete; a rule whose
//! source comes last substitutes the current glyph.

use indexmap::IndexMap;

use crate::{
    common::{GlyphClass, GlyphId},
    compile::machine::Flavor,
    types::{ContextualRule, Spanned, SubstTarget},
    DiagnosticKind,
};

use super::{
    compile_patterns, machine_table, EntryFlags, LookupCtx, ResolvedPattern, StateTable,
};

/// A substitution table referenced by entries, `doSubstN` in the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubstTable {
    pub mapping: Vec<(GlyphId, GlyphId)>,
}

/// The substitutions performed by one entry, as indices into the tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    pub mark: Option<usize>,
    pub current: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextualSubtable {
    pub table: StateTable<Substitution>,
    pub substitutions: Vec<SubstTable>,
}

struct PreparedRule {
    pattern: ResolvedPattern,
    mapping: IndexMap<GlyphId, GlyphId>,
}

pub(super) fn build(
    ctx: &mut LookupCtx,
    rules: &[Spanned<ContextualRule>],
) -> Option<ContextualSubtable> {
    let (patterns, mappings): (Vec<_>, Vec<_>) = rules
        .iter()
        .filter_map(|rule| prepare(ctx, rule))
        .map(|rule| (rule.pattern, rule.mapping))
        .unzip();
    if patterns.is_empty() {
        return None;
    }
    let compiled = compile_patterns(ctx, &patterns, Flavor::Contextual)?;

    let mut tables: IndexMap<Vec<(GlyphId, GlyphId)>, usize> = IndexMap::new();
    let mut intern = |mapping: IndexMap<GlyphId, GlyphId>| {
        if mapping.is_empty() {
            return None;
        }
        let mapping = mapping.into_iter().collect::<Vec<_>>();
        let next = tables.len();
        Some(*tables.entry(mapping).or_insert(next))
    };
    let table = machine_table(compiled, |step| {
        let mut on_mark = IndexMap::new();
        let mut on_current = IndexMap::new();
        // completions are ascending, so earlier rules win
        for i in &step.completed {
            let target = if patterns[*i].mark_at.is_some() {
                &mut on_mark
            } else {
                &mut on_current
            };
            for (source, replacement) in &mappings[*i] {
                target.entry(*source).or_insert(*replacement);
            }
        }
        let flags = if step.mark {
            EntryFlags::MARK
        } else {
            EntryFlags::empty()
        };
        let action = Substitution {
            mark: intern(on_mark),
            current: intern(on_current),
        };
        (flags, action)
    });
    let Ok(table) = table else {
        ctx.report_too_many_entries();
        return None;
    };

    log::debug!(
        "contextual lookup '{}': {} rules, {} states, {} entries",
        ctx.lookup.name,
        patterns.len(),
        table.states.len(),
        table.entries.len()
    );
    let substitutions = tables
        .into_keys()
        .map(|mapping| SubstTable { mapping })
        .collect();
    Some(ContextualSubtable {
        table,
        substitutions,
    })
}

fn prepare(ctx: &mut LookupCtx, rule: &Spanned<ContextualRule>) -> Option<PreparedRule> {
    let (elements, source_pos) = rule.item.pattern();
    let max_len = ctx.session.opts.max_pattern_len;
    if elements.len() > max_len {
        ctx.report(
            DiagnosticKind::PatternTooLong,
            rule.line,
            format!(
                "pattern has {} elements; at most {max_len} are supported",
                elements.len()
            ),
        );
        return None;
    }
    let classes = ctx.resolve_elements(&elements, rule.line)?;
    let sources = classes[source_pos].1.clone();
    let mapping = target_mapping(ctx, &rule.item.target, &sources, rule.line)?;
    if mapping.is_empty() {
        let message = match &rule.item.target {
            SubstTarget::Lookup(name) => {
                format!("lookup '{name}' has no substitution for any source glyph")
            }
            SubstTarget::Element(_) => "rule substitutes nothing".to_string(),
        };
        ctx.report(DiagnosticKind::InvalidSubstitution, rule.line, message);
        return None;
    }
    let mark_at = (source_pos + 1 < elements.len()).then_some(source_pos);
    Some(PreparedRule {
        pattern: ResolvedPattern {
            classes,
            targets: source_pos..source_pos + 1,
            mark_at,
        },
        mapping,
    })
}

/// What each source glyph becomes.
fn target_mapping(
    ctx: &mut LookupCtx,
    target: &SubstTarget,
    sources: &GlyphClass,
    line: usize,
) -> Option<IndexMap<GlyphId, GlyphId>> {
    match target {
        SubstTarget::Element(element) => {
            let Some(replacements) = ctx.session.glyphs_of(element) else {
                let name = ctx.session.describe(element);
                ctx.report(
                    DiagnosticKind::UndefinedClass,
                    line,
                    format!("class '{name}' is not defined"),
                );
                return None;
            };
            match replacements.items() {
                [single] => Some(sources.iter().map(|g| (g, *single)).collect()),
                items if items.len() == sources.len() => {
                    Some(sources.iter().zip(items.iter().copied()).collect())
                }
                items => {
                    ctx.report(
                        DiagnosticKind::InvalidSubstitution,
                        line,
                        format!(
                            "cannot substitute {} glyphs with {}",
                            sources.len(),
                            items.len()
                        ),
                    );
                    None
                }
            }
        }
        SubstTarget::Lookup(name) => {
            let singles = ctx
                .session
                .source
                .lookup(name)
                .and_then(|lookup| lookup.single_substitutions());
            let Some(singles) = singles else {
                ctx.report(
                    DiagnosticKind::MissingLookupReference,
                    line,
                    format!("no @simple lookup named '{name}'"),
                );
                return None;
            };
            let mut mapping = IndexMap::new();
            for (source, replacement) in singles.filter(|(source, _)| sources.contains(*source)) {
                mapping.entry(source).or_insert(replacement);
            }
            Some(mapping)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        compile::{
            lookups::{build_lookup, SubtableBody},
            session::Session,
            Opts,
        },
        parse::{parse_source, ParsedSource},
        types::LookupKind,
        Diagnostic,
    };

    use super::*;

    fn compile(text: &str, opts: Opts) -> (ParsedSource, Option<ContextualSubtable>, Vec<Diagnostic>) {
        let (source, diagnostics) = parse_source(text);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let lookup = source
            .lookups
            .iter()
            .find(|l| l.kind() == LookupKind::Contextual)
            .unwrap();
        let (body, diagnostics) = {
            let mut session = Session::new(&source, &opts);
            session.register_lookup(lookup);
            build_lookup(&session, lookup)
        };
        let body = body.map(|body| match body {
            SubtableBody::Contextual(table) => table,
            _ => panic!("not contextual"),
        });
        (source, body, diagnostics)
    }

    /// Run a subtable over a glyph string, applying its substitutions.
    fn run(source: &ParsedSource, subtable: &ContextualSubtable, input: &str) -> String {
        let table = &subtable.table;
        let class_of = |glyph: GlyphId| {
            table
                .classes
                .iter()
                .position(|c| c.glyphs.contains(&glyph))
                .map(|i| i + 4)
                .unwrap_or(1)
        };
        let subst = |idx: Option<usize>, glyph: GlyphId| {
            idx.and_then(|i| {
                subtable.substitutions[i]
                    .mapping
                    .iter()
                    .find(|(s, _)| *s == glyph)
                    .map(|(_, t)| *t)
            })
            .unwrap_or(glyph)
        };
        let mut glyphs = input
            .split_whitespace()
            .map(|n| source.glyphs.get(n).unwrap())
            .collect::<Vec<_>>();
        let mut state = 0;
        let mut mark = None;
        for i in 0..glyphs.len() {
            let entry = table.entry(state, class_of(glyphs[i])).unwrap();
            if let Some(marked) = mark {
                glyphs[marked] = subst(entry.action.mark, glyphs[marked]);
            }
            glyphs[i] = subst(entry.action.current, glyphs[i]);
            if entry.marks() {
                mark = Some(i);
            }
            state = entry.next_state;
        }
        glyphs
            .iter()
            .map(|g| source.glyphs.name(*g))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn after_substitutes_current() {
        let (source, subtable, diagnostics) = compile(
            "\
@class CONS = ka kha
@contextual {
    after @CONS: sara_i => sara_i.narrow
}
",
            Opts::default(),
        );
        assert!(diagnostics.is_empty());
        let subtable = subtable.unwrap();
        assert_eq!(subtable.table.states, ["StartText", "StartLine", "Saw1"]);
        assert_eq!(
            run(&source, &subtable, "ka sara_i sara_i kha sara_i"),
            "ka sara_i.narrow sara_i kha sara_i.narrow"
        );
    }

    #[test]
    fn before_substitutes_marked() {
        let (source, subtable, _) = compile(
            "\
@contextual {
    before tail: f => f.short
}
",
            Opts::default(),
        );
        let subtable = subtable.unwrap();
        assert_eq!(run(&source, &subtable, "f f tail f"), "f f.short tail f");
    }

    #[test]
    fn between_and_class_targets() {
        let (source, subtable, diagnostics) = compile(
            "\
@class LOW = a b
@class HIGH = a.hi b.hi
@contextual {
    between x and y: @LOW => @HIGH
    after z: [a b] => c
}
",
            Opts::default(),
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let subtable = subtable.unwrap();
        assert_eq!(run(&source, &subtable, "x b y"), "x b.hi y");
        assert_eq!(run(&source, &subtable, "x b x a y"), "x b x a.hi y");
        assert_eq!(run(&source, &subtable, "z a x a"), "z c x a");
    }

    #[test]
    fn inline_lookup_reference() {
        let (source, subtable, diagnostics) = compile(
            "\
# Lookup: swap
@simple {
    a -> a.alt
    b -> b.alt
}
@contextual {
    after x: a => lookup swap
    after x: c => lookup nope
}
",
            Opts::default(),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingLookupReference);
        assert_eq!(diagnostics[0].line, Some(8));
        let subtable = subtable.unwrap();
        // only 'a' is a source glyph, so only its substitution is used
        assert_eq!(subtable.substitutions.len(), 1);
        assert_eq!(subtable.substitutions[0].mapping.len(), 1);
        assert_eq!(run(&source, &subtable, "x a"), "x a.alt");
    }

    #[test]
    fn lookup_reference_without_matches() {
        let (source, subtable, diagnostics) = compile(
            "\
# Lookup: swap
@simple {
    a -> a.alt
}
@contextual {
    after x: a => lookup swap
    after x: c => lookup swap
}
",
            Opts::default(),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidSubstitution);
        assert_eq!(diagnostics[0].line, Some(7));
        assert!(diagnostics[0].message.contains("'swap'"));
        let subtable = subtable.unwrap();
        assert_eq!(run(&source, &subtable, "x a x c"), "x a.alt x c");
    }

    #[test]
    fn long_pattern_rejected_siblings_kept() {
        let (source, subtable, diagnostics) = compile(
            "\
@contextual {
    after c1 c2 c3 c4 c5 c6 c7 c8 c9 c10: s => t
    after c1 c2 c3 c4 c5 c6 c7 c8 c9: s => t
}
",
            Opts::default(),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PatternTooLong);
        assert_eq!(diagnostics[0].line, Some(2));
        let subtable = subtable.unwrap();
        assert_eq!(
            run(&source, &subtable, "c1 c2 c3 c4 c5 c6 c7 c8 c9 s"),
            "c1 c2 c3 c4 c5 c6 c7 c8 c9 t"
        );
    }

    #[test]
    fn mismatched_class_lengths() {
        let (_, subtable, diagnostics) = compile(
            "\
@contextual {
    after x: [a b c] => [d e]
}
",
            Opts::default(),
        );
        assert!(subtable.is_none());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidSubstitution);
        assert_eq!(diagnostics.last().unwrap().kind, DiagnosticKind::EmptyLookup);
    }

    #[test]
    fn undefined_class_excludes_rule() {
        let (_, subtable, diagnostics) = compile(
            "\
@contextual {
    after @MISSING: a => b
    after x: a => b
}
",
            Opts::default(),
        );
        assert!(subtable.is_some());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UndefinedClass);
    }

    #[test]
    fn class_limit() {
        let (_, subtable, diagnostics) = compile(
            "\
@contextual {
    after x: a => b
    after y: c => d
}
",
            Opts::default().max_match_classes(3),
        );
        assert!(subtable.is_none());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PartitionExplosion);
    }

    #[test]
    fn tables_are_shared() {
        let (_, subtable, _) = compile(
            "\
@contextual {
    after x: a => b
    after y: a => b
}
",
            Opts::default(),
        );
        let subtable = subtable.unwrap();
        assert_eq!(subtable.substitutions.len(), 1);
        assert_eq!(subtable.table.entries[0].next_state, 0);
        assert_eq!(subtable.table.entries[0].action, Substitution::default());
    }
}
