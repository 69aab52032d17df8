//! Grouping OpenType mark classes, and assigning AAT anchor indices.
//!
//! OpenType often splits one physical attachment point into several mark
//! classes. We merge classes that share a `(glyph, x, y)` mark, order the
//! merged groups by height, and then number the anchor points each glyph
//! needs in each control-point subtable.

use std::collections::HashMap;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use smol_str::SmolStr;

use crate::{
    common::{GlyphId, GlyphInterner},
    types::{Anchor, BaseRecord, ClassName, Mark, PositioningInput},
    Diagnostic, DiagnosticKind,
};

pub type GroupName = SmolStr;

/// Index of a group in the ordered list returned by [`resolve_groups`].
pub type GroupId = usize;

/// One physical attachment point, merged from one or more mark classes.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticGroup {
    pub name: GroupName,
    /// The OpenType classes merged into this group, in declaration order.
    pub classes: Vec<ClassName>,
    /// Deduplicated marks, in declaration order.
    pub marks: Vec<Mark>,
    /// Median y of the attachment points on bases and ligatures, or of the
    /// marks themselves if nothing attaches yet.
    pub median_y: OrderedFloat<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnchorRole {
    /// The glyph attaches to a preceding glyph.
    Attaching,
    /// The glyph is something a group of marks attaches to.
    Base,
}

/// Which control-point subtable an assignment is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    MarkToBase,
    MarkToMark,
}

/// The anchor indices used by one control-point subtable.
///
/// Every glyph's indices are `0..n` with no gaps, and each index has exactly
/// one point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnchorAssignment {
    indices: IndexMap<(GlyphId, AnchorRole, GroupId), u16>,
    points: IndexMap<GlyphId, Vec<Anchor>>,
}

impl AnchorAssignment {
    /// The index used when `glyph` plays `role` for `group`.
    pub fn index(&self, glyph: GlyphId, role: AnchorRole, group: GroupId) -> Option<u16> {
        self.indices.get(&(glyph, role, group)).copied()
    }

    /// The points of one glyph, by index.
    pub fn points(&self, glyph: GlyphId) -> &[Anchor] {
        self.points.get(&glyph).map(Vec::as_slice).unwrap_or_default()
    }

    /// All glyphs and their points, in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (GlyphId, &[Anchor])> + '_ {
        self.points.iter().map(|(g, p)| (*g, p.as_slice()))
    }

    /// All `(glyph, role, group) -> index` entries.
    pub fn entries(&self) -> impl Iterator<Item = (GlyphId, AnchorRole, GroupId, u16)> + '_ {
        self.indices
            .iter()
            .map(|((glyph, role, group), idx)| (*glyph, *role, *group, *idx))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A minimal union-find over class indices.
struct UnionFind(Vec<usize>);

impl UnionFind {
    fn new(len: usize) -> Self {
        UnionFind((0..len).collect())
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.0[i] != i {
            self.0[i] = self.0[self.0[i]];
            i = self.0[i];
        }
        i
    }

    /// Merge two sets, keeping the lower index as the root.
    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            let (root, child) = if a < b { (a, b) } else { (b, a) };
            self.0[child] = root;
        }
    }
}

fn median(mut values: Vec<i32>) -> Option<OrderedFloat<f64>> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    };
    Some(OrderedFloat(median))
}

fn group_names(n: usize) -> Vec<GroupName> {
    match n {
        2 => vec!["BOTTOM".into(), "TOP".into()],
        3 => vec!["BOTTOM".into(), "MIDDLE".into(), "TOP".into()],
        _ => (0..n).map(|i| format!("ATTACHMENT_{i}").into()).collect(),
    }
}

/// Merge the mark classes into semantic groups, ordered bottom to top.
pub fn resolve_groups(positioning: &PositioningInput) -> Vec<SemanticGroup> {
    let classes = positioning.mark_classes.values().collect::<Vec<_>>();
    let mut sets = UnionFind::new(classes.len());
    let mut first_with_mark: HashMap<(GlyphId, Anchor), usize> = HashMap::new();
    for (i, class) in classes.iter().enumerate() {
        for mark in &class.marks {
            match first_with_mark.get(&(mark.glyph, mark.anchor)) {
                Some(other) => sets.union(*other, i),
                None => {
                    first_with_mark.insert((mark.glyph, mark.anchor), i);
                }
            }
        }
    }

    // roots are the lowest member index, so this is first-seen order
    let mut merged: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for i in 0..classes.len() {
        let root = sets.find(i);
        merged.entry(root).or_default().push(i);
    }

    let mut groups = merged
        .into_values()
        .map(|members| {
            let names = members
                .iter()
                .map(|i| classes[*i].name.clone())
                .collect::<Vec<_>>();
            let mut marks: Vec<Mark> = Vec::new();
            for mark in members.iter().flat_map(|i| classes[*i].marks.iter()) {
                if !marks
                    .iter()
                    .any(|m| m.glyph == mark.glyph && m.anchor == mark.anchor)
                {
                    marks.push(mark.clone());
                }
            }
            let host_ys = attachment_ys(positioning, &names);
            let median_y = median(host_ys)
                .or_else(|| median(marks.iter().map(|m| m.anchor.y).collect()))
                .unwrap_or_default();
            SemanticGroup {
                name: GroupName::default(),
                classes: names,
                marks,
                median_y,
            }
        })
        .collect::<Vec<_>>();

    // stable, so ties keep first-seen order
    groups.sort_by_key(|group| group.median_y);
    let names = group_names(groups.len());
    for (group, name) in groups.iter_mut().zip(names) {
        group.name = name;
    }
    groups
}

/// The y of every base and ligature attachment point for these classes.
fn attachment_ys(positioning: &PositioningInput, classes: &[ClassName]) -> Vec<i32> {
    let base_ys = positioning.bases.iter().flat_map(|base| {
        classes
            .iter()
            .filter_map(|class| base.anchors.get(class))
            .map(|anchor| anchor.y)
    });
    let ligature_ys = positioning.ligatures.iter().flat_map(|lig| {
        classes
            .iter()
            .filter_map(|class| lig.components.get(class))
            .flatten()
            .flatten()
            .map(|anchor| anchor.y)
    });
    base_ys.chain(ligature_ys).collect()
}

/// Map each OpenType class name to the group containing it.
fn group_of_class(groups: &[SemanticGroup]) -> HashMap<&str, GroupId> {
    groups
        .iter()
        .enumerate()
        .flat_map(|(i, g)| g.classes.iter().map(move |c| (c.as_str(), i)))
        .collect()
}

/// A glyph that marks attach to, with its point for each group.
struct Host {
    glyph: GlyphId,
    points: Vec<(GroupId, Anchor)>,
}

/// Collects the inputs of one subtable and checks them for conflicts.
struct AssignmentBuilder<'a> {
    kind: AttachmentKind,
    glyphs: &'a GlyphInterner,
    hosts: IndexMap<GlyphId, IndexMap<GroupId, Anchor>>,
    attachers: IndexMap<GlyphId, (GroupId, Anchor)>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl<'a> AssignmentBuilder<'a> {
    fn new(kind: AttachmentKind, glyphs: &'a GlyphInterner) -> Self {
        AssignmentBuilder {
            kind,
            glyphs,
            hosts: IndexMap::new(),
            attachers: IndexMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn subtable_name(&self) -> &'static str {
        match self.kind {
            AttachmentKind::MarkToBase => "mark-to-base",
            AttachmentKind::MarkToMark => "mark-to-mark",
        }
    }

    fn conflict(&mut self, glyph: GlyphId, role: &str, group: &str, a: Anchor, b: Anchor) {
        let message = format!(
            "'{}' needs two {role} points for {group}: ({}, {}) and ({}, {})",
            self.glyphs.name(glyph),
            a.x,
            a.y,
            b.x,
            b.y
        );
        let diagnostic = Diagnostic::new(DiagnosticKind::AnchorIndexConflict, message)
            .in_lookup(self.subtable_name());
        self.errors.push(diagnostic);
    }

    fn add_host(&mut self, host: Host, groups: &[SemanticGroup]) {
        for (group, anchor) in host.points {
            let existing = self
                .hosts
                .entry(host.glyph)
                .or_default()
                .insert(group, anchor);
            if let Some(prev) = existing.filter(|prev| *prev != anchor) {
                // keep the first point
                self.hosts[&host.glyph].insert(group, prev);
                self.conflict(host.glyph, "base", &groups[group].name, prev, anchor);
            }
        }
    }

    fn add_attacher(&mut self, mark: &Mark, group: GroupId, groups: &[SemanticGroup]) {
        match self.attachers.get(&mark.glyph).copied() {
            None => {
                self.attachers.insert(mark.glyph, (group, mark.anchor));
            }
            Some((prev_group, prev)) if prev_group == group && prev == mark.anchor => (),
            Some((prev_group, prev)) => {
                let groups_desc = if prev_group == group {
                    groups[group].name.to_string()
                } else {
                    format!("{} and {}", groups[prev_group].name, groups[group].name)
                };
                self.conflict(mark.glyph, "attaching", &groups_desc, prev, mark.anchor);
            }
        }
    }

    fn finish(mut self) -> (Result<AnchorAssignment, Vec<Diagnostic>>, Vec<Diagnostic>) {
        if !self.errors.is_empty() {
            return (Err(self.errors), self.warnings);
        }
        let subtable = self.subtable_name();
        let mut assignment = AnchorAssignment::default();

        for (glyph, points) in self.hosts.iter_mut() {
            points.sort_keys();
            let slots = assignment.points.entry(*glyph).or_default();
            for (i, (group, anchor)) in points.iter().enumerate() {
                assignment
                    .indices
                    .insert((*glyph, AnchorRole::Base, *group), i as u16);
                slots.push(*anchor);
            }
        }

        for (glyph, (group, anchor)) in &self.attachers {
            let Some(hosted) = self.hosts.get(glyph) else {
                assignment
                    .indices
                    .insert((*glyph, AnchorRole::Attaching, *group), 0);
                assignment.points.entry(*glyph).or_default().push(*anchor);
                continue;
            };
            // both roles in one subtable: reuse a host index rather than
            // allocating a second one
            let (idx, host_point) = match hosted.get_index_of(group) {
                Some(idx) => (idx, hosted[idx]),
                None => (0, hosted[0]),
            };
            if host_point != *anchor {
                self.warnings.push(
                    Diagnostic::new(
                        DiagnosticKind::DualRoleAnchorMismatch,
                        format!(
                            "'{}' attaches at ({}, {}) but stacks at ({}, {}); using the stacking point",
                            self.glyphs.name(*glyph),
                            anchor.x,
                            anchor.y,
                            host_point.x,
                            host_point.y
                        ),
                    )
                    .in_lookup(subtable),
                );
            }
            assignment
                .indices
                .insert((*glyph, AnchorRole::Attaching, *group), idx as u16);
        }
        (Ok(assignment), self.warnings)
    }
}

/// The result of assigning one subtable's anchors.
pub struct AssignmentResult {
    /// `Err` holds the conflicts that make the subtable unusable.
    pub assignment: Result<AnchorAssignment, Vec<Diagnostic>>,
    pub warnings: Vec<Diagnostic>,
    /// The groups that appear in this subtable.
    pub groups: Vec<GroupId>,
}

fn host_from_base(
    record: &BaseRecord,
    class_groups: &HashMap<&str, GroupId>,
    undefined: &mut Vec<(ClassName, usize)>,
) -> Host {
    let points = record
        .anchors
        .iter()
        .filter_map(|(class, anchor)| match class_groups.get(class.as_str()) {
            Some(group) => Some((*group, *anchor)),
            None => {
                undefined.push((class.clone(), record.line));
                None
            }
        })
        .collect();
    Host {
        glyph: record.glyph,
        points,
    }
}

fn undefined_class_diagnostics(undefined: Vec<(ClassName, usize)>) -> Vec<Diagnostic> {
    undefined
        .into_iter()
        .map(|(class, line)| {
            Diagnostic::new(
                DiagnosticKind::UndefinedClass,
                format!("mark class '{class}' is not defined"),
            )
            .at_line(line)
        })
        .collect()
}

/// Assign anchors for one control-point subtable.
///
/// For mark-to-base the hosts are the `@base` and `@ligature` records; for
/// mark-to-mark they are the `@mark2mark` records. In both cases the
/// attaching glyphs are the marks of every group some host refers to.
pub fn assign_anchors(
    kind: AttachmentKind,
    positioning: &PositioningInput,
    groups: &[SemanticGroup],
    glyphs: &GlyphInterner,
) -> AssignmentResult {
    let class_groups = group_of_class(groups);
    let mut undefined = Vec::new();
    let mut hosts = Vec::new();
    match kind {
        AttachmentKind::MarkToBase => {
            for record in &positioning.bases {
                hosts.push(host_from_base(record, &class_groups, &mut undefined));
            }
            for record in &positioning.ligatures {
                let points = record
                    .components
                    .keys()
                    .filter_map(|class| match class_groups.get(class.as_str()) {
                        Some(group) => record.host_anchor(class).map(|a| (*group, a)),
                        None => {
                            undefined.push((class.clone(), record.line));
                            None
                        }
                    })
                    .collect();
                hosts.push(Host {
                    glyph: record.glyph,
                    points,
                });
            }
        }
        AttachmentKind::MarkToMark => {
            for record in &positioning.mark_bases {
                hosts.push(host_from_base(record, &class_groups, &mut undefined));
            }
        }
    }

    let mut used_groups = hosts
        .iter()
        .flat_map(|h| h.points.iter().map(|(g, _)| *g))
        .collect::<Vec<_>>();
    used_groups.sort_unstable();
    used_groups.dedup();

    let mut builder = AssignmentBuilder::new(kind, glyphs);
    for host in hosts {
        builder.add_host(host, groups);
    }
    for group in &used_groups {
        for mark in &groups[*group].marks {
            builder.add_attacher(mark, *group, groups);
        }
    }
    let (assignment, mut warnings) = builder.finish();
    warnings.extend(undefined_class_diagnostics(undefined));
    AssignmentResult {
        assignment,
        warnings,
        groups: used_groups,
    }
}
