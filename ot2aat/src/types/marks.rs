//! Positioning input: mark classes, attachment records, and distance pairs.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::common::GlyphId;

use super::{ClassName, GlyphOrClass};

/// An attachment point, in font units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
}

/// A mark glyph and its attachment point in one OpenType mark class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mark {
    pub glyph: GlyphId,
    pub anchor: Anchor,
    /// The OpenType class this mark was declared in.
    pub class: ClassName,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MarkClassDef {
    pub name: ClassName,
    pub marks: Vec<Mark>,
    pub line: usize,
}

/// A glyph that marks of some classes attach to.
///
/// Used for both `@base` and `@mark2mark` records.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BaseRecord {
    pub glyph: GlyphId,
    pub anchors: IndexMap<ClassName, Anchor>,
    pub line: usize,
}

/// A ligature, with one optional anchor per component for each mark class.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LigatureRecord {
    pub glyph: GlyphId,
    pub components: IndexMap<ClassName, Vec<Option<Anchor>>>,
    pub line: usize,
}

/// `@distance first second value [direction]`
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DistanceRule {
    pub first: GlyphId,
    pub second: GlyphOrClass,
    pub value: i32,
    pub direction: SmolStr,
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PositioningInput {
    pub mark_classes: IndexMap<ClassName, MarkClassDef>,
    pub bases: Vec<BaseRecord>,
    pub mark_bases: Vec<BaseRecord>,
    pub ligatures: Vec<LigatureRecord>,
    pub distances: Vec<DistanceRule>,
}

impl LigatureRecord {
    /// The anchor used when this ligature hosts marks of `class`.
    ///
    /// A control-point subtable can only attach to one point per group, so
    /// we use the last component that has one.
    pub fn host_anchor(&self, class: &str) -> Option<Anchor> {
        self.components
            .get(class)
            .and_then(|anchors| anchors.iter().rev().find_map(|a| *a))
    }
}

impl PositioningInput {
    pub fn is_empty(&self) -> bool {
        self.mark_classes.is_empty()
            && self.bases.is_empty()
            && self.mark_bases.is_empty()
            && self.ligatures.is_empty()
            && self.distances.is_empty()
    }

    /// `true` if there is anything that needs a control-point subtable.
    pub fn has_attachments(&self) -> bool {
        !(self.bases.is_empty() && self.mark_bases.is_empty() && self.ligatures.is_empty())
    }
}
