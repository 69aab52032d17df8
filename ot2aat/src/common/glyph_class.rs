use std::sync::Arc;

use indexmap::IndexSet;

use super::GlyphId;

/// An ordered set of glyphs.
///
/// Order is declaration order; duplicates are dropped, keeping the first
/// occurrence. Cloning is cheap, so classes are passed around by value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GlyphClass(Arc<[GlyphId]>);

impl FromIterator<GlyphId> for GlyphClass {
    fn from_iter<T: IntoIterator<Item = GlyphId>>(iter: T) -> Self {
        let unique = iter.into_iter().collect::<IndexSet<_>>();
        GlyphClass(unique.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GlyphClass {
    type Item = &'a GlyphId;

    type IntoIter = std::slice::Iter<'a, GlyphId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<GlyphId>> for GlyphClass {
    fn from(src: Vec<GlyphId>) -> GlyphClass {
        src.into_iter().collect()
    }
}

impl From<GlyphId> for GlyphClass {
    fn from(src: GlyphId) -> GlyphClass {
        GlyphClass(Arc::new([src]))
    }
}

impl GlyphClass {
    pub fn items(&self) -> &[GlyphId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = GlyphId> + '_ {
        self.items().iter().copied()
    }

    pub fn contains(&self, glyph: GlyphId) -> bool {
        self.0.contains(&glyph)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
