use std::collections::HashMap;

use super::GlyphName;

/// An interned glyph.
///
/// Every glyph name seen while parsing is assigned a small integer id, in
/// order of first appearance; classes, partitions and rules only ever store
/// these ids. The name is recovered from the [`GlyphInterner`] at emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GlyphId(u32);

/// Arena of glyph names, indexed by [`GlyphId`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GlyphInterner {
    names: Vec<GlyphName>,
    #[cfg_attr(feature = "serde", serde(skip))]
    ids: HashMap<GlyphName, GlyphId>,
}

impl GlyphInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for this name, allocating a new one if needed.
    pub fn intern(&mut self, name: &str) -> GlyphId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = GlyphId(self.names.len() as u32);
        let name = GlyphName::new(name);
        self.names.push(name.clone());
        self.ids.insert(name, id);
        id
    }

    /// Return the id of a previously interned name.
    pub fn get(&self, name: &str) -> Option<GlyphId> {
        self.ids.get(name).copied()
    }

    /// The name for this id.
    ///
    /// Ids are only ever created by an interner, so a missing id means the
    /// id came from some other interner; we return a placeholder rather than
    /// panicking.
    pub fn name(&self, id: GlyphId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(GlyphName::as_str)
            .unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (GlyphId, &GlyphName)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (GlyphId(i as u32), name))
    }
}

impl<'a> FromIterator<&'a str> for GlyphInterner {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut interner = GlyphInterner::new();
        for name in iter {
            interner.intern(name);
        }
        interner
    }
}
