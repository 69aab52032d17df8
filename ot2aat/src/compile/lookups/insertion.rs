//! One-to-many substitutions, as glyph insertion.

use indexmap::IndexMap;

use crate::{
    common::GlyphId,
    types::{OneToManyRule, Spanned},
    DiagnosticKind,
};

use super::{
    Entry, EntryFlags, LookupCtx, MatchClass, StateTable, TableBuilder, TooManyEntries,
    START_STATES,
};

/// The glyphs inserted by one rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertAction {
    pub glyphs: Vec<GlyphId>,
    pub insert_before: bool,
    pub kashida_like: bool,
}

/// The insertions performed by one entry, as indices into the actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Insertion {
    pub mark: Option<usize>,
    pub current: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertionSubtable {
    pub table: StateTable<Insertion>,
    pub actions: Vec<InsertAction>,
}

pub(super) fn build(
    ctx: &mut LookupCtx,
    rules: &[Spanned<OneToManyRule>],
) -> Option<InsertionSubtable> {
    let max_glyphs = ctx.session.opts.max_insertion_glyphs;
    let mut by_source: IndexMap<GlyphId, &OneToManyRule> = IndexMap::new();
    for rule in rules {
        let item = &rule.item;
        if item.targets.len() > max_glyphs {
            let message = format!(
                "'{}' would insert {} glyphs; at most {max_glyphs} are allowed",
                ctx.glyph_name(item.source),
                item.targets.len()
            );
            ctx.report(DiagnosticKind::PatternTooLong, rule.line, message);
            continue;
        }
        if by_source.contains_key(&item.source) {
            let message = format!(
                "'{}' is already decomposed by an earlier rule",
                ctx.glyph_name(item.source)
            );
            ctx.report(DiagnosticKind::DuplicateRule, rule.line, message);
            continue;
        }
        by_source.insert(item.source, item);
    }
    if by_source.is_empty() {
        return None;
    }
    if !ctx.check_class_count(by_source.len()) {
        return None;
    }

    let states = START_STATES.iter().map(|s| (*s).into()).collect();
    let mut builder = TableBuilder::new(states);
    if lay_out(&mut builder, by_source.len()).is_err() {
        ctx.report_too_many_entries();
        return None;
    }
    let actions = by_source
        .values()
        .map(|rule| InsertAction {
            glyphs: rule.targets.clone(),
            insert_before: rule.insert_before,
            kashida_like: rule.kashida_like,
        })
        .collect::<Vec<_>>();

    let classes = by_source
        .keys()
        .map(|glyph| MatchClass {
            glyphs: vec![*glyph],
            signature: None,
        })
        .collect();
    log::debug!(
        "insertion lookup '{}' has {} actions",
        ctx.lookup.name,
        actions.len()
    );
    Some(InsertionSubtable {
        table: builder.finish(classes),
        actions,
    })
}

/// One entry per action, the same in both start states.
fn lay_out(builder: &mut TableBuilder<Insertion>, n_actions: usize) -> Result<(), TooManyEntries> {
    let mut cells = Vec::with_capacity(n_actions);
    for action in 0..n_actions {
        cells.push(builder.entry(Entry {
            next_state: 0,
            flags: EntryFlags::empty(),
            action: Insertion {
                mark: None,
                current: Some(action),
            },
        })?);
    }
    for _ in START_STATES {
        // both start states behave the same, so DEL can reset to StartText
        let mut row = builder.start_row(0)?;
        row.extend_from_slice(&cells);
        builder.push_row(row);
    }
    Ok(())
}
