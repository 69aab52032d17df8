//! Building kerx subtables: distance kerning and anchor attachment.
//!
//! Attachment is expressed as a control-point state machine. The glyphs of
//! each subtable are partitioned by which groups they host (`HOST_<group>`)
//! and which they attach to (`MARK_<group>`); a host is marked when it is
//! seen, and a mark that attaches to the marked host snaps its point onto
//! the host's.

use std::collections::HashSet;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::{
    common::{GlyphClass, GlyphId},
    types::{Anchor, ClassName},
    Diagnostic, DiagnosticKind,
};

use super::{
    anchors::{
        assign_anchors, resolve_groups, AnchorRole, AttachmentKind, GroupId, SemanticGroup,
    },
    partition::{Partition, Partitioning},
    session::Session,
};

/// The name of the state every control-point machine starts in.
pub const START_STATE: &str = "Start";

/// Everything in the kerx output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KerxTables {
    /// The attachment groups, bottom to top.
    pub groups: Vec<SemanticGroup>,
    /// One list per kerning direction, in first-seen order.
    pub distances: Vec<DistanceList>,
    pub mark_to_base: Option<ControlPointSubtable>,
    pub mark_to_mark: Option<ControlPointSubtable>,
}

impl KerxTables {
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty() && self.mark_to_base.is_none() && self.mark_to_mark.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernPair {
    pub first: GlyphId,
    pub second: GlyphId,
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceList {
    pub direction: SmolStr,
    pub pairs: Vec<KernPair>,
}

/// One state of a control-point machine.
///
/// Classes with no cell go back to the start state without doing anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KerxState {
    pub name: SmolStr,
    /// `(class, transition)` pairs, in class order.
    pub cells: Vec<(SmolStr, SmolStr)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KerxTransition {
    pub name: SmolStr,
    pub next_state: SmolStr,
    pub mark: bool,
    pub action: Option<SmolStr>,
}

/// Move the current glyph so that its point `current` sits on the marked
/// glyph's point `marked`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointAction {
    pub name: SmolStr,
    pub marked: u16,
    pub current: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlPointSubtable {
    pub kind: AttachmentKind,
    /// Each glyph's points, by index.
    pub anchors: Vec<(GlyphId, Vec<Anchor>)>,
    pub classes: Vec<(SmolStr, Vec<GlyphId>)>,
    pub states: Vec<KerxState>,
    pub transitions: Vec<KerxTransition>,
    pub actions: Vec<PointAction>,
}

/// Build the kerx tables, or `None` if there is no positioning input.
pub(crate) fn build(session: &Session) -> (Option<KerxTables>, Vec<Diagnostic>) {
    let positioning = &session.source.positioning;
    let mut diagnostics = Vec::new();
    if positioning.is_empty() {
        return (None, diagnostics);
    }
    let distances = distance_lists(session, &mut diagnostics);
    let groups = resolve_groups(positioning);
    log::debug!(
        "resolved {} mark classes into {} groups",
        positioning.mark_classes.len(),
        groups.len()
    );
    let mark_to_base = control_point(
        AttachmentKind::MarkToBase,
        session,
        &groups,
        &mut diagnostics,
    );
    let mark_to_mark = control_point(
        AttachmentKind::MarkToMark,
        session,
        &groups,
        &mut diagnostics,
    );
    diagnostics.extend(unpositioned_marks(session, [&mark_to_base, &mark_to_mark]));
    let tables = KerxTables {
        groups,
        distances,
        mark_to_base,
        mark_to_mark,
    };
    ((!tables.is_empty()).then_some(tables), diagnostics)
}

fn distance_lists(session: &Session, diagnostics: &mut Vec<Diagnostic>) -> Vec<DistanceList> {
    let mut lists: IndexMap<SmolStr, IndexMap<(GlyphId, GlyphId), i32>> = IndexMap::new();
    for rule in &session.source.positioning.distances {
        let Some(seconds) = session.glyphs_of(&rule.second) else {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UndefinedClass,
                    format!("class '{}' is not defined", session.describe(&rule.second)),
                )
                .at_line(rule.line),
            );
            continue;
        };
        let pairs = lists.entry(rule.direction.clone()).or_default();
        for second in seconds.iter() {
            match pairs.get(&(rule.first, second)) {
                None => {
                    pairs.insert((rule.first, second), rule.value);
                }
                Some(existing) if *existing == rule.value => (),
                Some(existing) => diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateRule,
                        format!(
                            "'{} {}' is already kerned by {existing}; ignoring {}",
                            session.glyph_name(rule.first),
                            session.glyph_name(second),
                            rule.value
                        ),
                    )
                    .at_line(rule.line),
                ),
            }
        }
    }
    lists
        .into_iter()
        .map(|(direction, pairs)| DistanceList {
            direction,
            pairs: pairs
                .into_iter()
                .map(|((first, second), value)| KernPair {
                    first,
                    second,
                    value,
                })
                .collect(),
        })
        .collect()
}

/// A partition of the attachment glyphs, and the groups it hosts and
/// attaches to.
struct AttachClass<'a> {
    name: SmolStr,
    partition: &'a Partition,
    hosted: Vec<GroupId>,
    attached: Vec<GroupId>,
}

impl AttachClass<'_> {
    fn state_name(&self) -> SmolStr {
        format!("with_{}", self.name).into()
    }

    fn first_glyph(&self) -> Option<GlyphId> {
        self.partition.glyphs.first().copied()
    }
}

fn host_class(group: &SemanticGroup) -> ClassName {
    format!("HOST_{}", group.name).into()
}

fn mark_class(group: &SemanticGroup) -> ClassName {
    format!("MARK_{}", group.name).into()
}

fn control_point(
    kind: AttachmentKind,
    session: &Session,
    groups: &[SemanticGroup],
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ControlPointSubtable> {
    let result = assign_anchors(kind, &session.source.positioning, groups, session.glyphs());
    diagnostics.extend(result.warnings);
    let assignment = match result.assignment {
        Ok(assignment) => assignment,
        Err(errors) => {
            log::warn!("{kind:?} subtable dropped after {} conflicts", errors.len());
            diagnostics.extend(errors);
            return None;
        }
    };
    if assignment.is_empty() {
        return None;
    }

    let mut roles: IndexMap<ClassName, GlyphClass> = IndexMap::new();
    for group in &result.groups {
        let with_role = |wanted: AnchorRole| {
            assignment
                .entries()
                .filter(|(_, role, g, _)| *role == wanted && g == group)
                .map(|(glyph, ..)| glyph)
                .collect::<GlyphClass>()
        };
        roles.insert(host_class(&groups[*group]), with_role(AnchorRole::Base));
        roles.insert(mark_class(&groups[*group]), with_role(AnchorRole::Attaching));
    }
    let partitioning = Partitioning::new(&roles);
    let classes = partitioning
        .iter()
        .map(|partition| {
            let of_role = |class: fn(&SemanticGroup) -> ClassName| {
                result
                    .groups
                    .iter()
                    .copied()
                    .filter(|g| partition.contains_class(&class(&groups[*g])))
                    .collect::<Vec<_>>()
            };
            let hosted = of_role(host_class);
            let attached = of_role(mark_class);
            AttachClass {
                name: class_name(groups, &hosted, &attached),
                partition,
                hosted,
                attached,
            }
        })
        .collect::<Vec<_>>();

    let mut machine = MachineBuilder::default();
    let hosts = classes.iter().filter(|c| !c.hosted.is_empty());
    let states = std::iter::once(None).chain(hosts.map(Some)).collect::<Vec<_>>();
    let mut kerx_states = Vec::with_capacity(states.len());
    for state in &states {
        let name = state.map_or_else(|| START_STATE.into(), AttachClass::state_name);
        let mut cells = Vec::new();
        for class in &classes {
            let snap = state.and_then(|host| {
                let group = class.attached.iter().find(|g| host.hosted.contains(*g))?;
                let marked = host
                    .first_glyph()
                    .and_then(|g| assignment.index(g, AnchorRole::Base, *group))?;
                let current = class
                    .first_glyph()
                    .and_then(|g| assignment.index(g, AnchorRole::Attaching, *group))?;
                Some(machine.action(marked, current))
            });
            let transition = match (snap, class.hosted.is_empty(), state) {
                (Some(action), false, _) => machine.transition(KerxTransition {
                    name: format!("{action}_see_{}", class.name).into(),
                    next_state: class.state_name(),
                    mark: true,
                    action: Some(action),
                }),
                (Some(action), true, Some(host)) if kind == AttachmentKind::MarkToBase => {
                    // later marks may still attach to the same base
                    machine.transition(KerxTransition {
                        name: format!("{action}_keep_{}", host.name).into(),
                        next_state: host.state_name(),
                        mark: false,
                        action: Some(action),
                    })
                }
                (Some(action), true, _) => machine.transition(KerxTransition {
                    name: action.clone(),
                    next_state: START_STATE.into(),
                    mark: false,
                    action: Some(action),
                }),
                (None, false, _) => machine.transition(KerxTransition {
                    name: format!("see_{}", class.name).into(),
                    next_state: class.state_name(),
                    mark: true,
                    action: None,
                }),
                (None, true, Some(host))
                    if kind == AttachmentKind::MarkToBase && !class.attached.is_empty() =>
                {
                    // a mark of some other group; skip over it
                    machine.transition(KerxTransition {
                        name: format!("keep_{}", host.name).into(),
                        next_state: host.state_name(),
                        mark: false,
                        action: None,
                    })
                }
                (None, true, _) => continue,
            };
            cells.push((class.name.clone(), transition));
        }
        kerx_states.push(KerxState { name, cells });
    }

    log::debug!(
        "{kind:?}: {} classes, {} states, {} transitions",
        classes.len(),
        kerx_states.len(),
        machine.transitions.len()
    );
    Some(ControlPointSubtable {
        kind,
        anchors: assignment
            .iter()
            .map(|(glyph, points)| (glyph, points.to_vec()))
            .collect(),
        classes: classes
            .iter()
            .map(|c| (c.name.clone(), c.partition.glyphs.clone()))
            .collect(),
        states: kerx_states,
        transitions: machine.transitions.into_values().collect(),
        actions: machine.actions.into_values().collect(),
    })
}

/// Report marks that no control-point class contains.
///
/// A mark whose class no base or mark record refers to is never moved.
fn unpositioned_marks(
    session: &Session,
    subtables: [&Option<ControlPointSubtable>; 2],
) -> Vec<Diagnostic> {
    let covered = subtables
        .into_iter()
        .flatten()
        .flat_map(|subtable| subtable.classes.iter().flat_map(|(_, glyphs)| glyphs))
        .copied()
        .collect::<HashSet<_>>();
    let mut reported = HashSet::new();
    let mut diagnostics = Vec::new();
    for def in session.source.positioning.mark_classes.values() {
        for mark in &def.marks {
            if covered.contains(&mark.glyph) || !reported.insert(mark.glyph) {
                continue;
            }
            let message = format!(
                "mark '{}' of class '{}' is in no attachment class and will not be positioned",
                session.glyph_name(mark.glyph),
                def.name
            );
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::UncoveredGlyph, message).at_line(def.line),
            );
        }
    }
    diagnostics
}

/// `bases_<groups>` for hosts, `marks_<groups>` for attaching glyphs, or both.
fn class_name(groups: &[SemanticGroup], hosted: &[GroupId], attached: &[GroupId]) -> SmolStr {
    let join = |prefix: &str, ids: &[GroupId]| {
        let names = ids
            .iter()
            .map(|g| groups[*g].name.as_str())
            .collect::<Vec<_>>();
        format!("{prefix}_{}", names.join("_"))
    };
    let mut parts = Vec::new();
    if !hosted.is_empty() {
        parts.push(join("bases", hosted));
    }
    if !attached.is_empty() {
        parts.push(join("marks", attached));
    }
    parts.join("_").into()
}

/// Interns transitions and actions by name.
#[derive(Default)]
struct MachineBuilder {
    transitions: IndexMap<SmolStr, KerxTransition>,
    actions: IndexMap<SmolStr, PointAction>,
}

impl MachineBuilder {
    fn action(&mut self, marked: u16, current: u16) -> SmolStr {
        let name: SmolStr = format!("snap_{marked}_{current}").into();
        self.actions
            .entry(name.clone())
            .or_insert_with(|| PointAction {
                name: name.clone(),
                marked,
                current,
            });
        name
    }

    fn transition(&mut self, transition: KerxTransition) -> SmolStr {
        let name = transition.name.clone();
        self.transitions.entry(name.clone()).or_insert(transition);
        name
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{compile::Opts, parse::parse_source, parse::ParsedSource};

    use super::*;

    fn build_tables(text: &str) -> (ParsedSource, Option<KerxTables>, Vec<Diagnostic>) {
        let (source, diagnostics) = parse_source(text);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let opts = Opts::default();
        let (tables, diagnostics) = build(&Session::new(&source, &opts));
        (source, tables, diagnostics)
    }

    fn cells(state: &KerxState) -> Vec<(&str, &str)> {
        state
            .cells
            .iter()
            .map(|(c, t)| (c.as_str(), t.as_str()))
            .collect()
    }

    const MARKS: &str = "\
@markclass ABOVE <150, 500>
    acute
@markclass BELOW <150, -50>
    dotbelow
@base a
    ABOVE <250, 800>
    BELOW <250, 0>
@base o
    ABOVE <300, 800>
@mark2mark acute
    ABOVE <150, 900>
";

    #[test]
    fn mark_to_base_machine() {
        let (source, tables, diagnostics) = build_tables(MARKS);
        // only the mark-to-mark subtable has anything to say
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::DualRoleAnchorMismatch));
        let subtable = tables.unwrap().mark_to_base.unwrap();

        let class_names = subtable
            .classes
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            class_names,
            ["bases_BOTTOM_TOP", "marks_BOTTOM", "bases_TOP", "marks_TOP"]
        );
        let state_names = subtable
            .states
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            state_names,
            ["Start", "with_bases_BOTTOM_TOP", "with_bases_TOP"]
        );
        assert_eq!(
            cells(&subtable.states[0]),
            [
                ("bases_BOTTOM_TOP", "see_bases_BOTTOM_TOP"),
                ("bases_TOP", "see_bases_TOP"),
            ]
        );
        // 'a' hosts BOTTOM at 0 and TOP at 1; 'o' hosts TOP at 0
        assert_eq!(
            cells(&subtable.states[1]),
            [
                ("bases_BOTTOM_TOP", "see_bases_BOTTOM_TOP"),
                ("marks_BOTTOM", "snap_0_0_keep_bases_BOTTOM_TOP"),
                ("bases_TOP", "see_bases_TOP"),
                ("marks_TOP", "snap_1_0_keep_bases_BOTTOM_TOP"),
            ]
        );
        assert_eq!(
            cells(&subtable.states[2]),
            [
                ("bases_BOTTOM_TOP", "see_bases_BOTTOM_TOP"),
                ("marks_BOTTOM", "keep_bases_TOP"),
                ("bases_TOP", "see_bases_TOP"),
                ("marks_TOP", "snap_0_0_keep_bases_TOP"),
            ]
        );
        let a = source.glyphs.get("a").unwrap();
        assert_eq!(
            subtable.anchors[0],
            (a, vec![Anchor { x: 250, y: 0 }, Anchor { x: 250, y: 800 }])
        );
        assert_eq!(subtable.actions.len(), 2);
    }

    #[test]
    fn mark_to_mark_machine() {
        let (_, tables, diagnostics) = build_tables(MARKS);
        let subtable = tables.unwrap().mark_to_mark.unwrap();
        // acute both hosts and attaches, at different points
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DualRoleAnchorMismatch);
        assert_eq!(subtable.classes.len(), 1);
        assert_eq!(subtable.classes[0].0, "bases_TOP_marks_TOP");
        assert_eq!(
            cells(&subtable.states[1]),
            [("bases_TOP_marks_TOP", "snap_0_0_see_bases_TOP_marks_TOP")]
        );
        let transition = &subtable.transitions[1];
        assert!(transition.mark);
        assert_eq!(transition.next_state, "with_bases_TOP_marks_TOP");
    }

    #[test]
    fn distances_expand_classes() {
        let (_, tables, diagnostics) = build_tables(
            "\
@class ROUND = o e
@distance T @ROUND -80
@distance T o -60
@distance T o 20 vertical
@distance T @NOPE 10
",
        );
        let tables = tables.unwrap();
        assert_eq!(tables.distances.len(), 2);
        assert_eq!(tables.distances[0].direction, "horizontal");
        assert_eq!(tables.distances[0].pairs.len(), 2);
        assert_eq!(tables.distances[0].pairs[0].value, -80);
        assert_eq!(tables.distances[1].pairs.len(), 1);
        let kinds = diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [DiagnosticKind::DuplicateRule, DiagnosticKind::UndefinedClass]
        );
        assert!(tables.mark_to_base.is_none());
    }

    #[test]
    fn conflict_drops_one_subtable() {
        let (_, tables, diagnostics) = build_tables(
            "\
@markclass TOP <150, 500>
    acute
@base a
    TOP <250, 800>
@base a
    TOP <260, 800>
@mark2mark grave
    TOP <0, 700>
",
        );
        let tables = tables.unwrap();
        assert!(tables.mark_to_base.is_none());
        assert!(tables.mark_to_mark.is_some());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::AnchorIndexConflict);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind != DiagnosticKind::UncoveredGlyph));
    }

    #[test]
    fn unattached_marks_are_reported() {
        let (_, tables, diagnostics) = build_tables(
            "\
@markclass TOP <150, 500>
    acute
@markclass BELOW <150, -50>
    dotbelow cedilla
@base a
    TOP <250, 800>
",
        );
        let subtable = tables.unwrap().mark_to_base.unwrap();
        assert_eq!(subtable.classes.len(), 2);
        let uncovered = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UncoveredGlyph)
            .collect::<Vec<_>>();
        assert_eq!(uncovered.len(), 2);
        assert!(uncovered[0].message.contains("'dotbelow'"));
        assert!(uncovered[1].message.contains("'cedilla'"));
        assert_eq!(uncovered[0].line, Some(3));
        assert!(!uncovered[0].is_error());
    }
}
