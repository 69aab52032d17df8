//! Splitting overlapping classes into disjoint match classes.
//!
//! OpenType lets a glyph belong to any number of classes; an AAT state table
//! maps every glyph to exactly one column. Each distinct set of classes that
//! some glyph belongs to becomes one partition.
//!
//! Partitions also carry the roles their classes play in a subtable's rules.
//! The state builder tracks partial matches directly, so it does not need
//! them; they are kept for logging and inspection.

use std::collections::HashSet;

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::{
    common::{GlyphClass, GlyphId},
    types::ClassName,
};

bitflags! {
    /// How the classes in a partition are used by the rules of a subtable.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PartitionRole: u8 {
        /// Matched as context before or after a target.
        const PREDECESSOR = 0b01;
        /// Matched as the glyph being acted on.
        const TARGET = 0b10;
    }
}

/// A set of glyphs sharing exactly the same class memberships.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// The classes containing these glyphs, sorted.
    pub signature: Vec<ClassName>,
    pub glyphs: Vec<GlyphId>,
    pub role: PartitionRole,
}

impl Partition {
    /// The signature as one string, e.g. `A+B`.
    pub fn signature_string(&self) -> String {
        self.signature.join("+")
    }

    pub fn contains_class(&self, class: &str) -> bool {
        self.signature.binary_search_by(|c| c.as_str().cmp(class)).is_ok()
    }

    pub fn is_dual_role(&self) -> bool {
        self.role.contains(PartitionRole::PREDECESSOR | PartitionRole::TARGET)
    }
}

/// The disjoint cover of a set of classes.
#[derive(Clone, Debug, Default)]
pub struct Partitioning {
    partitions: Vec<Partition>,
}

impl Partitioning {
    /// Partition the given classes.
    ///
    /// Partitions are ordered by the first appearance of their first glyph,
    /// walking the classes in the order given. A class name given twice is
    /// only counted once.
    pub fn new<'a>(classes: impl IntoIterator<Item = (&'a ClassName, &'a GlyphClass)>) -> Self {
        let mut membership: IndexMap<GlyphId, Vec<ClassName>> = IndexMap::new();
        let mut seen = HashSet::new();
        for (name, class) in classes {
            if !seen.insert(name.clone()) {
                continue;
            }
            for glyph in class.iter() {
                membership.entry(glyph).or_default().push(name.clone());
            }
        }

        let mut by_signature: IndexMap<Vec<ClassName>, Vec<GlyphId>> = IndexMap::new();
        for (glyph, mut names) in membership {
            names.sort();
            by_signature.entry(names).or_default().push(glyph);
        }

        let partitions = by_signature
            .into_iter()
            .map(|(signature, glyphs)| Partition {
                signature,
                glyphs,
                role: PartitionRole::empty(),
            })
            .collect();
        Partitioning { partitions }
    }

    /// Flag each partition with the roles of the classes it contains.
    pub fn with_roles(
        mut self,
        predecessors: &HashSet<ClassName>,
        targets: &HashSet<ClassName>,
    ) -> Self {
        for partition in self.partitions.iter_mut() {
            for class in &partition.signature {
                if predecessors.contains(class) {
                    partition.role |= PartitionRole::PREDECESSOR;
                }
                if targets.contains(class) {
                    partition.role |= PartitionRole::TARGET;
                }
            }
        }
        self
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> + '_ {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The indices of all partitions whose glyphs belong to `class`.
    pub fn partitions_for_class(&self, class: &str) -> Vec<usize> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains_class(class))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::common::GlyphInterner;

    use super::*;

    fn classes(
        glyphs: &mut GlyphInterner,
        defs: &[(&str, &[&str])],
    ) -> IndexMap<ClassName, GlyphClass> {
        defs.iter()
            .map(|(name, members)| {
                (
                    ClassName::new(name),
                    members.iter().map(|g| glyphs.intern(g)).collect(),
                )
            })
            .collect()
    }

    fn signatures(partitioning: &Partitioning, glyphs: &GlyphInterner) -> Vec<(String, Vec<String>)> {
        partitioning
            .iter()
            .map(|p| {
                (
                    p.signature_string(),
                    p.glyphs.iter().map(|g| glyphs.name(*g).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn overlapping_pair() {
        let mut glyphs = GlyphInterner::new();
        let defs = classes(&mut glyphs, &[("A", &["x", "y"]), ("B", &["y", "z"])]);
        let partitioning = Partitioning::new(&defs);
        assert_eq!(
            signatures(&partitioning, &glyphs),
            vec![
                ("A".to_string(), vec!["x".to_string()]),
                ("A+B".to_string(), vec!["y".to_string()]),
                ("B".to_string(), vec!["z".to_string()]),
            ]
        );
    }

    /// Pairwise disjoint, covering, and each glyph's signature is exactly
    /// its membership set.
    #[test]
    fn partition_invariants() {
        let mut glyphs = GlyphInterner::new();
        let defs = classes(
            &mut glyphs,
            &[
                ("CONS", &["ka", "kha", "ngo", "po", "fo"]),
                ("ASC", &["po", "fo", "fo.alt"]),
                ("UPPER", &["mai_ek", "mai_tho", "fo", "sara_i"]),
                ("EMPTY", &[]),
                ("SAME", &["ka", "kha"]),
            ],
        );
        let partitioning = Partitioning::new(&defs);

        let mut seen = HashSet::new();
        for partition in partitioning.iter() {
            assert!(!partition.glyphs.is_empty());
            for glyph in &partition.glyphs {
                assert!(seen.insert(*glyph), "glyph in two partitions");
                let mut expected = defs
                    .iter()
                    .filter(|(_, class)| class.contains(*glyph))
                    .map(|(name, _)| name.clone())
                    .collect::<Vec<_>>();
                expected.sort();
                assert_eq!(partition.signature, expected);
            }
        }
        let all = defs.values().flat_map(|c| c.iter()).collect::<HashSet<_>>();
        assert_eq!(seen, all);
        assert!(partitioning.partitions_for_class("EMPTY").is_empty());
    }

    #[test]
    fn roles() {
        let mut glyphs = GlyphInterner::new();
        let defs = classes(&mut glyphs, &[("P", &["a", "b"]), ("T", &["b", "c"])]);
        let partitioning = Partitioning::new(&defs).with_roles(
            &HashSet::from(["P".into()]),
            &HashSet::from(["T".into()]),
        );
        let [a, b, c] = partitioning.partitions() else {
            panic!("expected three partitions");
        };
        assert_eq!(a.role, PartitionRole::PREDECESSOR);
        assert!(b.is_dual_role());
        assert_eq!(c.role, PartitionRole::TARGET);
        assert!(!a.is_dual_role() && !c.is_dual_role());
        assert_eq!(partitioning.partitions_for_class("T"), vec![1, 2]);
    }
}
