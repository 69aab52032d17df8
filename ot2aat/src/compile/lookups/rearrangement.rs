//! Reordering, as a rearrangement subtable.

use std::collections::HashMap;

use crate::{
    compile::machine::Flavor,
    types::{GlyphOrClass, ReorderRule, Spanned},
    DiagnosticKind,
};

use super::{compile_patterns, machine_table, EntryFlags, LookupCtx, ResolvedPattern, StateTable};

/// One of the fifteen AAT rearrangement verbs.
///
/// Each verb moves up to two glyphs from the start of the marked range to
/// its end, and up to two from the end to the start, optionally reversing
/// either pair. The glyphs in between keep their order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Verb(u8);

/// `(from start, from end, reverse start, reverse end)`, indexed by verb - 1.
const VERB_SHAPES: [(usize, usize, bool, bool); 15] = [
    (1, 0, false, false),
    (0, 1, false, false),
    (1, 1, false, false),
    (2, 0, false, false),
    (2, 0, true, false),
    (0, 2, false, false),
    (0, 2, false, true),
    (1, 2, false, false),
    (1, 2, false, true),
    (2, 1, false, false),
    (2, 1, true, false),
    (2, 2, false, false),
    (2, 2, true, false),
    (2, 2, false, true),
    (2, 2, true, true),
];

const VERB_NAMES: [&str; 15] = [
    "Ax->xA",
    "xD->Dx",
    "AxD->DxA",
    "ABx->xAB",
    "ABx->xBA",
    "xCD->CDx",
    "xCD->DCx",
    "AxCD->CDxA",
    "AxCD->DCxA",
    "ABxD->DxAB",
    "ABxD->DxBA",
    "ABxCD->CDxAB",
    "ABxCD->CDxBA",
    "ABxCD->DCxAB",
    "ABxCD->DCxBA",
];

impl Verb {
    /// The verb's number, 1 to 15.
    pub fn number(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        VERB_NAMES[usize::from(self.0 - 1)]
    }

    fn all() -> impl Iterator<Item = Verb> {
        (1..=15).map(Verb)
    }

    /// Apply this verb to a range, or `None` if the range is too short.
    pub fn apply<T: Clone>(self, range: &[T]) -> Option<Vec<T>> {
        let (start, end, reverse_start, reverse_end) = VERB_SHAPES[usize::from(self.0 - 1)];
        if range.len() < start + end {
            return None;
        }
        let (head, rest) = range.split_at(start);
        let (middle, tail) = rest.split_at(rest.len() - end);
        let ordered = |items: &[T], reverse: bool| {
            let mut items = items.to_vec();
            if reverse {
                items.reverse();
            }
            items
        };
        let mut out = ordered(tail, reverse_end);
        out.extend_from_slice(middle);
        out.extend(ordered(head, reverse_start));
        Some(out)
    }

    /// The first verb that turns `before` into `after`.
    pub fn find<T: Clone + PartialEq>(before: &[T], after: &[T]) -> Option<Verb> {
        Verb::all().find(|verb| verb.apply(before).as_deref() == Some(after))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RearrangementSubtable {
    pub table: StateTable<Option<Verb>>,
}

pub(super) fn build(
    ctx: &mut LookupCtx,
    rules: &[Spanned<ReorderRule>],
) -> Option<RearrangementSubtable> {
    let mut patterns = Vec::new();
    let mut verbs = Vec::new();
    for rule in rules {
        let Some(verb) = check_rule(ctx, rule) else {
            continue;
        };
        let elements = rule.item.before.iter().collect::<Vec<_>>();
        let Some(classes) = ctx.resolve_elements(&elements, rule.line) else {
            continue;
        };
        patterns.push(ResolvedPattern {
            targets: 0..classes.len(),
            classes,
            mark_at: Some(0),
        });
        verbs.push(verb);
    }
    if patterns.is_empty() {
        return None;
    }

    let compiled = compile_patterns(ctx, &patterns, Flavor::Rearrangement)?;
    let table = machine_table(compiled, |step| {
        let mut flags = EntryFlags::empty();
        if step.mark {
            flags |= EntryFlags::MARK;
        }
        let verb = step.completed.first().map(|i| verbs[*i]);
        if verb.is_some() {
            flags |= EntryFlags::MARK_LAST;
        }
        (flags, verb)
    });
    let Ok(table) = table else {
        ctx.report_too_many_entries();
        return None;
    };
    log::debug!(
        "rearrangement lookup '{}': {} rules, {} states",
        ctx.lookup.name,
        patterns.len(),
        table.states.len()
    );
    Some(RearrangementSubtable { table })
}

/// Check that a rule is a permutation some verb can perform.
fn check_rule(ctx: &mut LookupCtx, rule: &Spanned<ReorderRule>) -> Option<Verb> {
    let ReorderRule { before, after } = &rule.item;
    let max_len = ctx.session.opts.max_pattern_len;
    if before.len() > max_len {
        ctx.report(
            DiagnosticKind::PatternTooLong,
            rule.line,
            format!(
                "pattern has {} elements; at most {max_len} are supported",
                before.len()
            ),
        );
        return None;
    }
    let problem = if before.len() != after.len() {
        Some("both sides must have the same length")
    } else if before.len() < 2 {
        Some("at least two elements are needed")
    } else if !same_elements(before, after) {
        Some("the right side is not a reordering of the left side")
    } else if before == after {
        Some("the rule does not change anything")
    } else {
        None
    };
    let verb = match problem {
        Some(problem) => Err(problem),
        None => Verb::find(before, after).ok_or("no rearrangement verb performs this reordering"),
    };
    match verb {
        Ok(verb) => Some(verb),
        Err(problem) => {
            let describe = |seq: &[GlyphOrClass]| {
                seq.iter()
                    .map(|e| ctx.session.describe(e))
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            let message = format!("'{} => {}': {problem}", describe(before), describe(after));
            ctx.report(DiagnosticKind::InvalidReorder, rule.line, message);
            None
        }
    }
}

fn same_elements(left: &[GlyphOrClass], right: &[GlyphOrClass]) -> bool {
    let mut counts: HashMap<&GlyphOrClass, i32> = HashMap::new();
    for element in left {
        *counts.entry(element).or_default() += 1;
    }
    for element in right {
        *counts.entry(element).or_default() -= 1;
    }
    counts.values().all(|count| *count == 0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{
        compile::{
            lookups::{build_lookup, SubtableBody},
            session::Session,
            Opts,
        },
        parse::parse_source,
        Diagnostic,
    };

    use super::*;

    #[rstest]
    #[case("AB", "BA", 1)]
    #[case("ABC", "CAB", 2)]
    #[case("ABC", "CBA", 3)]
    #[case("ABC", "BCA", 1)]
    #[case("ABCD", "CDAB", 4)]
    #[case("ABCD", "DCBA", 9)]
    #[case("ABCDE", "EDCBA", 15)]
    #[case("ABCDE", "DEcCBA", 0)]
    fn verb_search(#[case] before: &str, #[case] after: &str, #[case] expected: u8) {
        let before = before.chars().collect::<Vec<_>>();
        let after = after.chars().collect::<Vec<_>>();
        let verb = Verb::find(&before, &after);
        assert_eq!(verb.map(Verb::number).unwrap_or(0), expected);
    }

    #[test]
    fn every_verb_round_trips_its_name() {
        for verb in Verb::all() {
            let (before, after) = verb.name().split_once("->").unwrap();
            let before = before.chars().collect::<Vec<_>>();
            let after = after.chars().collect::<Vec<_>>();
            assert_eq!(verb.apply(&before), Some(after), "{}", verb.name());
        }
    }

    fn build(text: &str) -> (Option<RearrangementSubtable>, Vec<Diagnostic>) {
        let (source, diagnostics) = parse_source(text);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let opts = Opts::default();
        let mut session = Session::new(&source, &opts);
        let lookup = &source.lookups[0];
        session.register_lookup(lookup);
        let (body, diagnostics) = build_lookup(&session, lookup);
        let body = body.map(|body| match body {
            SubtableBody::Rearrangement(table) => table,
            _ => panic!("not rearrangement"),
        });
        (body, diagnostics)
    }

    #[test]
    fn swap_is_accepted() {
        let (subtable, diagnostics) = build(
            "\
@reorder {
    g1 g2 => g2 g1
}
",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let table = subtable.unwrap().table;
        // g1 marks first, g2 marks last and swaps
        let first = table.entry(0, 4).unwrap();
        assert!(first.marks());
        let last = table.entry(first.next_state, 5).unwrap();
        assert_eq!(last.action, Some(Verb(1)));
        assert!(last.flags.contains(EntryFlags::MARK_LAST));
        assert_eq!(last.next_state, 0);
    }

    #[test]
    fn non_permutation_is_rejected() {
        let (subtable, diagnostics) = build(
            "\
@reorder {
    g1 g2 => g1 g3
    g1 g2 => g1 g2
    g1 g2 g3 => g2 g1
}
",
        );
        assert!(subtable.is_none());
        let kinds = diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [
                DiagnosticKind::InvalidReorder,
                DiagnosticKind::InvalidReorder,
                DiagnosticKind::InvalidReorder,
                DiagnosticKind::EmptyLookup
            ]
        );
        assert!(diagnostics[0].message.contains("not a reordering"));
    }
}
