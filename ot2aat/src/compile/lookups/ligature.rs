//! Ligature substitutions

use indexmap::IndexMap;

use crate::{
    common::GlyphId,
    types::{LigatureRule, Spanned},
    DiagnosticKind,
};

use super::LookupCtx;

/// Component sequences and the ligatures they form.
///
/// The ligature subtable's own state machine is generated by the font tools
/// from this list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LigatureSubtable {
    /// `components -> result`, in rule order.
    pub ligatures: IndexMap<Vec<GlyphId>, GlyphId>,
}

pub(super) fn build(ctx: &mut LookupCtx, rules: &[Spanned<LigatureRule>]) -> Option<LigatureSubtable> {
    let mut ligatures: IndexMap<Vec<GlyphId>, GlyphId> = IndexMap::new();
    for rule in rules {
        let LigatureRule { result, components } = &rule.item;
        match ligatures.get(components) {
            None => {
                ligatures.insert(components.clone(), *result);
            }
            Some(existing) if existing == result => (),
            Some(existing) => {
                let sequence = components
                    .iter()
                    .map(|g| ctx.glyph_name(*g))
                    .collect::<Vec<_>>()
                    .join(" + ");
                let message = format!(
                    "'{sequence}' already forms '{}'; ignoring '{}'",
                    ctx.glyph_name(*existing),
                    ctx.glyph_name(*result)
                );
                ctx.report(DiagnosticKind::DuplicateRule, rule.line, message);
            }
        }
    }
    (!ligatures.is_empty()).then_some(LigatureSubtable { ligatures })
}
