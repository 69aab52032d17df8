//! The intermediate representation produced by the parser.

use smol_str::SmolStr;

mod marks;
mod rules;

pub use marks::{
    Anchor, BaseRecord, DistanceRule, LigatureRecord, Mark, MarkClassDef, PositioningInput,
};
pub use rules::{
    Context, ContextualRule, GlyphOrClass, LigatureRule, Lookup, LookupKind, LookupRules,
    OneToManyRule, ReorderRule, Rule, SimpleRule, Spanned, SubstTarget,
};

/// The name of a glyph class (declared, synthetic, or an OpenType mark class).
pub type ClassName = SmolStr;

/// The feature used by lookups that never saw a feature header.
pub const DFLT_FEATURE: &str = "dflt";
