//! Building one morx subtable per lookup.

mod contextual;
mod insertion;
mod ligature;
mod noncontextual;
mod rearrangement;

use std::{collections::HashSet, hash::Hash, ops::Range};

use bitflags::bitflags;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::{
    common::{GlyphClass, GlyphId},
    types::{ClassName, GlyphOrClass, Lookup, LookupRules},
    Diagnostic, DiagnosticKind,
};

use super::{
    machine::{self, Automaton, Flavor, Pattern, Step, TooManyStates},
    partition::Partitioning,
    session::Session,
};

pub use contextual::{ContextualSubtable, SubstTable, Substitution};
pub use insertion::{InsertAction, InsertionSubtable, Insertion};
pub use ligature::LigatureSubtable;
pub use noncontextual::NoncontextualSubtable;
pub use rearrangement::{RearrangementSubtable, Verb};

/// The names of the four columns every state table starts with.
pub const CONTROL_COLUMNS: [&str; 4] = ["EOT", "OOB", "DEL", "EOL"];

/// The two states every state table starts with.
pub const START_STATES: [&str; 2] = ["StartText", "StartLine"];

bitflags! {
    /// The flags of one state table entry.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u16 {
        /// Mark the current glyph; `MarkFirst` in a rearrangement table.
        const MARK = 0x8000;
        const DONT_ADVANCE = 0x4000;
        /// Rearrangement only.
        const MARK_LAST = 0x2000;
    }
}

/// One row of an entry table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry<A> {
    /// Index into the table's states.
    pub next_state: usize,
    pub flags: EntryFlags,
    pub action: A,
}

impl<A> Entry<A> {
    pub fn marks(&self) -> bool {
        self.flags.contains(EntryFlags::MARK)
    }

    pub fn advances(&self) -> bool {
        !self.flags.contains(EntryFlags::DONT_ADVANCE)
    }
}

/// One column of a state table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchClass {
    pub glyphs: Vec<GlyphId>,
    /// The source classes these glyphs share, if the class came from
    /// partitioning.
    pub signature: Option<String>,
}

/// A finite-state subtable: classes, states, and the entry for each cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTable<A> {
    pub classes: Vec<MatchClass>,
    pub states: Vec<SmolStr>,
    /// `rows[state][column]` is a 1-based index into `entries`; columns are
    /// the control columns followed by one per class.
    pub rows: Vec<Vec<u16>>,
    pub entries: Vec<Entry<A>>,
}

impl<A> StateTable<A> {
    pub fn entry(&self, state: usize, column: usize) -> Option<&Entry<A>> {
        let id = *self.rows.get(state)?.get(column)?;
        self.entries.get(usize::from(id).checked_sub(1)?)
    }
}

/// More distinct entries than a state table cell can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TooManyEntries;

/// Assembles a [`StateTable`], deduplicating entries.
///
/// Entry 1 is always "go to StartText, do nothing".
pub(crate) struct TableBuilder<A> {
    states: Vec<SmolStr>,
    rows: Vec<Vec<u16>>,
    entries: IndexMap<Entry<A>, u16>,
}

impl<A: Clone + Default + Eq + Hash> TableBuilder<A> {
    pub(crate) fn new(states: Vec<SmolStr>) -> Self {
        let mut entries = IndexMap::new();
        let reset = Entry {
            next_state: 0,
            flags: EntryFlags::empty(),
            action: A::default(),
        };
        entries.insert(reset, 1);
        TableBuilder {
            states,
            rows: Vec::new(),
            entries,
        }
    }

    /// The 1-based id of an entry, adding it if it is new.
    pub(crate) fn entry(&mut self, entry: Entry<A>) -> Result<u16, TooManyEntries> {
        if let Some(id) = self.entries.get(&entry) {
            return Ok(*id);
        }
        let id = u16::try_from(self.entries.len() + 1).map_err(|_| TooManyEntries)?;
        self.entries.insert(entry, id);
        Ok(id)
    }

    /// Start a row with its control columns.
    ///
    /// End of text, end of line and glyphs outside every class reset the
    /// machine; deleted glyphs leave it where it is.
    pub(crate) fn start_row(&mut self, stay_in: usize) -> Result<Vec<u16>, TooManyEntries> {
        let stay = self.entry(Entry {
            next_state: stay_in,
            flags: EntryFlags::empty(),
            action: A::default(),
        })?;
        Ok(vec![1, 1, stay, 1])
    }

    pub(crate) fn push_row(&mut self, row: Vec<u16>) {
        self.rows.push(row);
    }

    pub(crate) fn finish(self, classes: Vec<MatchClass>) -> StateTable<A> {
        StateTable {
            classes,
            states: self.states,
            rows: self.rows,
            entries: self.entries.into_keys().collect(),
        }
    }
}

/// The match classes of a partitioned subtable, one per partition.
pub(crate) fn match_classes(partitioning: &Partitioning) -> Vec<MatchClass> {
    partitioning
        .iter()
        .map(|partition| MatchClass {
            glyphs: partition.glyphs.clone(),
            signature: Some(partition.signature_string()),
        })
        .collect()
}

/// A rule pattern whose elements have been resolved to classes.
pub(crate) struct ResolvedPattern {
    pub(crate) classes: Vec<(ClassName, GlyphClass)>,
    /// The elements acted on; everything else is context.
    pub(crate) targets: Range<usize>,
    pub(crate) mark_at: Option<usize>,
}

/// Patterns translated into match classes, and the machine recognizing them.
pub(crate) struct CompiledPatterns {
    pub(crate) classes: Vec<MatchClass>,
    pub(crate) automaton: Automaton,
}

/// Partition the classes used by these patterns and build their machine.
///
/// Returns `None`, after reporting why, if the result would be too large.
pub(crate) fn compile_patterns(
    ctx: &mut LookupCtx,
    resolved: &[ResolvedPattern],
    flavor: Flavor,
) -> Option<CompiledPatterns> {
    let mut predecessors = HashSet::new();
    let mut targets = HashSet::new();
    for pattern in resolved {
        for (i, (name, _)) in pattern.classes.iter().enumerate() {
            if pattern.targets.contains(&i) {
                targets.insert(name.clone());
            } else {
                predecessors.insert(name.clone());
            }
        }
    }
    let partitioning = Partitioning::new(
        resolved
            .iter()
            .flat_map(|p| p.classes.iter().map(|(name, class)| (name, class))),
    )
    .with_roles(&predecessors, &targets);
    if !ctx.check_class_count(partitioning.len()) {
        return None;
    }
    log::trace!(
        "lookup '{}': {} match classes, {} dual role",
        ctx.lookup.name,
        partitioning.len(),
        partitioning.iter().filter(|p| p.is_dual_role()).count()
    );

    let patterns = resolved
        .iter()
        .map(|pattern| Pattern {
            elements: pattern
                .classes
                .iter()
                .map(|(name, _)| partitioning.partitions_for_class(name).into_iter().collect())
                .collect(),
            mark_at: pattern.mark_at,
        })
        .collect::<Vec<_>>();
    let max_states = ctx.session.opts.max_states;
    match machine::build(&patterns, partitioning.len(), flavor, max_states) {
        Ok(automaton) => Some(CompiledPatterns {
            classes: match_classes(&partitioning),
            automaton,
        }),
        Err(TooManyStates(max)) => {
            ctx.report_lookup(
                DiagnosticKind::PartitionExplosion,
                format!("needs more than {max} states; lookup skipped"),
            );
            None
        }
    }
}

/// Lay out a machine as a state table.
///
/// The machine's start state is both `StartText` and `StartLine`; every
/// other state gets a row of its own.
pub(crate) fn machine_table<A: Clone + Default + Eq + Hash>(
    compiled: CompiledPatterns,
    mut action: impl FnMut(&Step) -> (EntryFlags, A),
) -> Result<StateTable<A>, TooManyEntries> {
    let CompiledPatterns { classes, automaton } = compiled;
    let row_of = |state: usize| if state == 0 { 0 } else { state + 1 };
    let mut states = START_STATES.map(SmolStr::new).to_vec();
    states.extend((1..automaton.n_states()).map(|s| SmolStr::from(format!("Saw{s}"))));

    let mut builder = TableBuilder::new(states);
    let machine_states = [0].into_iter().chain(0..automaton.n_states());
    for state in machine_states {
        let mut row = builder.start_row(row_of(state))?;
        for step in &automaton.steps[state] {
            let (flags, action) = action(step);
            row.push(builder.entry(Entry {
                next_state: row_of(step.next),
                flags,
                action,
            })?);
        }
        builder.push_row(row);
    }
    Ok(builder.finish(classes))
}

/// A compiled morx subtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubtableBody {
    Noncontextual(NoncontextualSubtable),
    Contextual(ContextualSubtable),
    Ligature(LigatureSubtable),
    Insertion(InsertionSubtable),
    Rearrangement(RearrangementSubtable),
}

impl SubtableBody {
    /// The morx subtable type, as written in a MIF `Type` line.
    pub fn type_name(&self) -> &'static str {
        match self {
            SubtableBody::Noncontextual(_) => "Noncontextual",
            SubtableBody::Contextual(_) => "Contextual",
            SubtableBody::Ligature(_) => "LigatureList",
            SubtableBody::Insertion(_) => "Insertion",
            SubtableBody::Rearrangement(_) => "Rearrangement",
        }
    }
}

/// Collects the diagnostics for one lookup.
pub(crate) struct LookupCtx<'a> {
    pub(crate) session: &'a Session<'a>,
    pub(crate) lookup: &'a Lookup,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> LookupCtx<'a> {
    pub(crate) fn new(session: &'a Session<'a>, lookup: &'a Lookup) -> Self {
        LookupCtx {
            session,
            lookup,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn report(&mut self, kind: DiagnosticKind, line: usize, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(kind, message)
                .at_line(line)
                .in_lookup(self.lookup.name.clone()),
        );
    }

    /// Report a problem with the lookup as a whole.
    pub(crate) fn report_lookup(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let line = self.lookup.line;
        self.report(kind, line, message);
    }

    /// Check the match class count against the configured limit.
    pub(crate) fn check_class_count(&mut self, n_classes: usize) -> bool {
        let max = self.session.opts.max_match_classes;
        if n_classes > max {
            self.report_lookup(
                DiagnosticKind::PartitionExplosion,
                format!("needs {n_classes} match classes (limit {max}); lookup skipped"),
            );
            return false;
        }
        true
    }

    /// Report a table whose entries no longer fit in a cell.
    pub(crate) fn report_too_many_entries(&mut self) {
        self.report_lookup(
            DiagnosticKind::PartitionExplosion,
            format!("needs more than {} distinct entries; lookup skipped", u16::MAX),
        );
    }

    pub(crate) fn glyph_name(&self, glyph: GlyphId) -> &str {
        self.session.glyph_name(glyph)
    }

    /// Resolve each element of a pattern to its class.
    ///
    /// An undefined class is empty, so the pattern can never match; we
    /// report it and return `None`.
    pub(crate) fn resolve_elements(
        &mut self,
        elements: &[&GlyphOrClass],
        line: usize,
    ) -> Option<Vec<(ClassName, GlyphClass)>> {
        let mut resolved = Vec::with_capacity(elements.len());
        let mut missing = Vec::new();
        for element in elements {
            match self.session.resolve(element) {
                Some(class) => resolved.push(class),
                None => missing.push(self.session.describe(element)),
            }
        }
        for name in &missing {
            self.report(
                DiagnosticKind::UndefinedClass,
                line,
                format!("class '{name}' is not defined; the rule can never match"),
            );
        }
        missing.is_empty().then_some(resolved)
    }
}

/// Build the subtable for one lookup.
///
/// Returns `None` if nothing in the lookup survived.
pub(crate) fn build_lookup(
    session: &Session,
    lookup: &Lookup,
) -> (Option<SubtableBody>, Vec<Diagnostic>) {
    let mut ctx = LookupCtx::new(session, lookup);
    let body = match &lookup.rules {
        LookupRules::Simple(rules) => {
            noncontextual::build(&mut ctx, rules).map(SubtableBody::Noncontextual)
        }
        LookupRules::Contextual(rules) => {
            contextual::build(&mut ctx, rules).map(SubtableBody::Contextual)
        }
        LookupRules::Ligature(rules) => ligature::build(&mut ctx, rules).map(SubtableBody::Ligature),
        LookupRules::OneToMany(rules) => {
            insertion::build(&mut ctx, rules).map(SubtableBody::Insertion)
        }
        LookupRules::Reorder(rules) => {
            rearrangement::build(&mut ctx, rules).map(SubtableBody::Rearrangement)
        }
    };
    if body.is_none() {
        ctx.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::EmptyLookup,
                format!("{} lookup has no rules left to emit", lookup.kind()),
            )
            .at_line(lookup.line)
            .in_lookup(lookup.name.clone()),
        );
    }
    (body, ctx.diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entry_is_first() {
        let mut builder = TableBuilder::<Option<u8>>::new(vec!["StartText".into(), "StartLine".into()]);
        let row = builder.start_row(1).unwrap();
        assert_eq!(row, vec![1, 1, 2, 1]);
        let again = builder.entry(Entry {
            next_state: 0,
            flags: EntryFlags::empty(),
            action: None,
        });
        assert_eq!(again, Ok(1));
        builder.push_row(row);
        let table = builder.finish(Vec::new());
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entry(0, 2).map(|e| e.next_state), Some(1));
        assert!(table.entry(0, 4).is_none());
    }

    #[test]
    fn entry_ids_fit_in_a_cell() {
        let entry = |action: u32| Entry {
            next_state: 0,
            flags: EntryFlags::empty(),
            action,
        };
        let mut builder = TableBuilder::<u32>::new(vec!["StartText".into()]);
        // ids 2..=65535; id 1 is the reset entry
        for action in 1..u32::from(u16::MAX) {
            builder.entry(entry(action)).unwrap();
        }
        assert_eq!(builder.entry(entry(u32::MAX)), Err(TooManyEntries));
        assert_eq!(builder.entry(entry(1)), Ok(2));
        assert_eq!(builder.entry(entry(0)), Ok(1));
    }
}
