//! Substitution rules and lookups.

use smol_str::SmolStr;

use crate::common::{GlyphClass, GlyphId};

use super::ClassName;

/// A value along with the source line it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Spanned<T> {
    pub item: T,
    pub line: usize,
}

/// One element of a rule pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum GlyphOrClass {
    Glyph(GlyphId),
    /// A reference to a named class, resolved lazily by the compiler.
    Class(ClassName),
    /// A bracketed class written inline, `[a b c]`.
    Inline(GlyphClass),
}

/// Where the context sits relative to the substituted glyph.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Context {
    /// `before CTX: src => tgt`; the source comes before the context.
    Before(Vec<GlyphOrClass>),
    /// `after CTX: src => tgt`; the source comes after the context.
    After(Vec<GlyphOrClass>),
    /// `between B and A: src => tgt`.
    Between {
        before: Vec<GlyphOrClass>,
        after: Vec<GlyphOrClass>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SubstTarget {
    Element(GlyphOrClass),
    /// `lookup NAME`: take the single substitutions of a `@simple` lookup.
    Lookup(SmolStr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SimpleRule {
    pub source: GlyphId,
    pub target: GlyphId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContextualRule {
    pub context: Context,
    pub source: GlyphOrClass,
    pub target: SubstTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LigatureRule {
    pub result: GlyphId,
    pub components: Vec<GlyphId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OneToManyRule {
    pub source: GlyphId,
    pub targets: Vec<GlyphId>,
    /// Insert before the current glyph instead of after it.
    pub insert_before: bool,
    /// The inserted glyphs may be stretched during justification.
    pub kashida_like: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReorderRule {
    pub before: Vec<GlyphOrClass>,
    pub after: Vec<GlyphOrClass>,
}

/// A single parsed rule, of any kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Simple(SimpleRule),
    Contextual(ContextualRule),
    Ligature(LigatureRule),
    OneToMany(OneToManyRule),
    Reorder(ReorderRule),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LookupKind {
    Simple,
    Contextual,
    Ligature,
    OneToMany,
    Reorder,
}

/// The rules of one lookup.
///
/// A lookup is homogeneous, so rather than a list of [`Rule`]s this holds a
/// list of exactly one rule type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LookupRules {
    Simple(Vec<Spanned<SimpleRule>>),
    Contextual(Vec<Spanned<ContextualRule>>),
    Ligature(Vec<Spanned<LigatureRule>>),
    OneToMany(Vec<Spanned<OneToManyRule>>),
    Reorder(Vec<Spanned<ReorderRule>>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Lookup {
    pub name: SmolStr,
    pub feature: SmolStr,
    pub scripts: Vec<SmolStr>,
    pub rules: LookupRules,
    /// Line of the block marker.
    pub line: usize,
    /// Rule lines in the block, counting ones that failed to parse.
    pub rule_lines: usize,
    /// `true` if a feature header named this lookup's feature directly,
    /// rather than it being inherited from an earlier banner.
    pub(crate) has_own_feature: bool,
}

impl Rule {
    pub fn kind(&self) -> LookupKind {
        match self {
            Rule::Simple(_) => LookupKind::Simple,
            Rule::Contextual(_) => LookupKind::Contextual,
            Rule::Ligature(_) => LookupKind::Ligature,
            Rule::OneToMany(_) => LookupKind::OneToMany,
            Rule::Reorder(_) => LookupKind::Reorder,
        }
    }
}

impl LookupKind {
    /// The block marker that introduces lookups of this kind.
    pub fn block_name(self) -> &'static str {
        match self {
            LookupKind::Simple => "simple",
            LookupKind::Contextual => "contextual",
            LookupKind::Ligature => "ligature",
            LookupKind::OneToMany => "one2many",
            LookupKind::Reorder => "reorder",
        }
    }

    pub fn from_block_name(name: &str) -> Option<Self> {
        match name {
            "simple" => Some(LookupKind::Simple),
            "contextual" => Some(LookupKind::Contextual),
            "ligature" => Some(LookupKind::Ligature),
            "one2many" => Some(LookupKind::OneToMany),
            "reorder" => Some(LookupKind::Reorder),
            _ => None,
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.block_name())
    }
}

impl LookupRules {
    pub fn new(kind: LookupKind) -> Self {
        match kind {
            LookupKind::Simple => LookupRules::Simple(Vec::new()),
            LookupKind::Contextual => LookupRules::Contextual(Vec::new()),
            LookupKind::Ligature => LookupRules::Ligature(Vec::new()),
            LookupKind::OneToMany => LookupRules::OneToMany(Vec::new()),
            LookupKind::Reorder => LookupRules::Reorder(Vec::new()),
        }
    }

    pub fn kind(&self) -> LookupKind {
        match self {
            LookupRules::Simple(_) => LookupKind::Simple,
            LookupRules::Contextual(_) => LookupKind::Contextual,
            LookupRules::Ligature(_) => LookupKind::Ligature,
            LookupRules::OneToMany(_) => LookupKind::OneToMany,
            LookupRules::Reorder(_) => LookupKind::Reorder,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LookupRules::Simple(rules) => rules.len(),
            LookupRules::Contextual(rules) => rules.len(),
            LookupRules::Ligature(rules) => rules.len(),
            LookupRules::OneToMany(rules) => rules.len(),
            LookupRules::Reorder(rules) => rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a rule, returning it back if its kind doesn't match.
    pub fn push(&mut self, rule: Rule, line: usize) -> Result<(), Rule> {
        match (self, rule) {
            (LookupRules::Simple(rules), Rule::Simple(item)) => rules.push(Spanned { item, line }),
            (LookupRules::Contextual(rules), Rule::Contextual(item)) => {
                rules.push(Spanned { item, line })
            }
            (LookupRules::Ligature(rules), Rule::Ligature(item)) => {
                rules.push(Spanned { item, line })
            }
            (LookupRules::OneToMany(rules), Rule::OneToMany(item)) => {
                rules.push(Spanned { item, line })
            }
            (LookupRules::Reorder(rules), Rule::Reorder(item)) => {
                rules.push(Spanned { item, line })
            }
            (_, rule) => return Err(rule),
        }
        Ok(())
    }
}

impl Lookup {
    pub fn kind(&self) -> LookupKind {
        self.rules.kind()
    }

    /// The `source -> target` pairs of a simple lookup, or `None` for other kinds.
    pub fn single_substitutions(&self) -> Option<impl Iterator<Item = (GlyphId, GlyphId)> + '_> {
        match &self.rules {
            LookupRules::Simple(rules) => {
                Some(rules.iter().map(|rule| (rule.item.source, rule.item.target)))
            }
            _ => None,
        }
    }
}

impl Context {
    /// The glyphs matched before the source.
    pub fn backtrack(&self) -> &[GlyphOrClass] {
        match self {
            Context::After(seq) => seq,
            Context::Between { before, .. } => before,
            Context::Before(_) => &[],
        }
    }

    /// The glyphs matched after the source.
    pub fn lookahead(&self) -> &[GlyphOrClass] {
        match self {
            Context::Before(seq) => seq,
            Context::Between { after, .. } => after,
            Context::After(_) => &[],
        }
    }
}

impl ContextualRule {
    /// The full pattern, in input order, and the position of the source in it.
    pub fn pattern(&self) -> (Vec<&GlyphOrClass>, usize) {
        let backtrack = self.context.backtrack();
        let pattern = backtrack
            .iter()
            .chain(std::iter::once(&self.source))
            .chain(self.context.lookahead())
            .collect();
        (pattern, backtrack.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::common::GlyphInterner;

    use super::*;

    #[test]
    fn push_checks_kind() {
        let mut glyphs = GlyphInterner::new();
        let a = glyphs.intern("a");
        let b = glyphs.intern("b");
        let mut rules = LookupRules::new(LookupKind::Simple);
        let simple = Rule::Simple(SimpleRule {
            source: a,
            target: b,
        });
        let lig = Rule::Ligature(LigatureRule {
            result: a,
            components: vec![b, b],
        });
        assert!(rules.push(simple, 1).is_ok());
        assert_eq!(rules.push(lig.clone(), 2), Err(lig));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn between_pattern_order() {
        let mut glyphs = GlyphInterner::new();
        let [a, b, c] = ["a", "b", "c"].map(|n| glyphs.intern(n));
        let rule = ContextualRule {
            context: Context::Between {
                before: vec![GlyphOrClass::Glyph(a)],
                after: vec![GlyphOrClass::Glyph(c)],
            },
            source: GlyphOrClass::Glyph(b),
            target: SubstTarget::Element(GlyphOrClass::Glyph(a)),
        };
        let (pattern, source_pos) = rule.pattern();
        assert_eq!(pattern.len(), 3);
        assert_eq!(source_pos, 1);
        assert_eq!(pattern[2], &GlyphOrClass::Glyph(c));
    }
}
