//! Simple substitutions

use indexmap::IndexMap;

use crate::{
    common::GlyphId,
    types::{SimpleRule, Spanned},
    DiagnosticKind,
};

use super::LookupCtx;

/// A direct glyph to glyph mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoncontextualSubtable {
    /// In rule order.
    pub mapping: IndexMap<GlyphId, GlyphId>,
}

pub(super) fn build(
    ctx: &mut LookupCtx,
    rules: &[Spanned<SimpleRule>],
) -> Option<NoncontextualSubtable> {
    let mut mapping = IndexMap::new();
    for rule in rules {
        let SimpleRule { source, target } = rule.item;
        match mapping.get(&source) {
            None => {
                mapping.insert(source, target);
            }
            Some(existing) if *existing == target => (),
            Some(existing) => {
                let message = format!(
                    "'{}' is already substituted by '{}'; ignoring '{}'",
                    ctx.glyph_name(source),
                    ctx.glyph_name(*existing),
                    ctx.glyph_name(target)
                );
                ctx.report(DiagnosticKind::DuplicateRule, rule.line, message);
            }
        }
    }
    (!mapping.is_empty()).then_some(NoncontextualSubtable { mapping })
}
