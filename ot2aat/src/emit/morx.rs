//! MIF output for morx subtables

use std::fmt::{Display, Formatter, Result};

use crate::{
    common::GlyphInterner,
    compile::{
        ContextualSubtable, Entry, EntryFlags, InsertionSubtable, LigatureSubtable, MatchClass,
        MorxSubtable, NoncontextualSubtable, RearrangementSubtable, StateTable, SubtableBody,
        CONTROL_COLUMNS,
    },
};

use super::{banner, columns, file_header, joined, trimmed, yes_no, KEY_WIDTH};

/// Glyphs per line of a match class before continuing on a `+` line.
const GLYPHS_PER_LINE: usize = 10;

/// Width of the entry id column.
const ID_WIDTH: usize = 4;

/// Displays a list of subtables as a MIF file.
pub struct MorxPrinter<'a> {
    subtables: &'a [MorxSubtable],
    glyphs: &'a GlyphInterner,
}

pub fn printer<'a>(subtables: &'a [MorxSubtable], glyphs: &'a GlyphInterner) -> MorxPrinter<'a> {
    MorxPrinter { subtables, glyphs }
}

impl Display for MorxPrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        file_header(f, "morx subtables, MIF format")?;
        for subtable in self.subtables {
            print_subtable(f, subtable, self.glyphs)?;
        }
        Ok(())
    }
}

fn print_subtable(f: &mut Formatter, subtable: &MorxSubtable, glyphs: &GlyphInterner) -> Result {
    let body = &subtable.body;
    writeln!(f)?;
    banner(
        f,
        [
            format!("LOOKUP: {}", subtable.lookup),
            format!("Feature: {}", subtable.feature),
            format!("Type: {}", subtable.kind),
        ],
    )?;
    writeln!(f)?;

    let noncontextual = matches!(body, SubtableBody::Noncontextual(_));
    let (feature_type, selector) = subtable.namecode;
    field(f, "Type", body.type_name())?;
    field(f, "Name", &subtable.lookup)?;
    field(f, "Namecode", feature_type)?;
    field(f, "Setting", &subtable.lookup)?;
    field(f, "Settingcode", selector)?;
    field(f, "Default", yes_no(!noncontextual))?;
    field(f, "Orientation", "HV")?;
    field(f, "Forward", "yes")?;
    field(f, "Exclusive", yes_no(noncontextual))?;
    writeln!(f)?;

    match body {
        SubtableBody::Noncontextual(table) => print_noncontextual(f, table, glyphs),
        SubtableBody::Contextual(table) => print_contextual(f, table, glyphs),
        SubtableBody::Ligature(table) => print_ligatures(f, table, glyphs),
        SubtableBody::Insertion(table) => print_insertion(f, table, glyphs),
        SubtableBody::Rearrangement(table) => print_rearrangement(f, table, glyphs),
    }
}

fn field(f: &mut Formatter, key: &str, value: impl Display) -> Result {
    writeln!(f, "{key:<width$}{value}", width = KEY_WIDTH)
}

fn print_noncontextual(
    f: &mut Formatter,
    table: &NoncontextualSubtable,
    glyphs: &GlyphInterner,
) -> Result {
    let rows = table
        .mapping
        .iter()
        .map(|(source, target)| {
            vec![
                glyphs.name(*source).to_string(),
                glyphs.name(*target).to_string(),
            ]
        })
        .collect::<Vec<_>>();
    columns(f, &[20], &rows)?;
    writeln!(f)
}

fn print_ligatures(f: &mut Formatter, table: &LigatureSubtable, glyphs: &GlyphInterner) -> Result {
    let rows = table
        .ligatures
        .iter()
        .map(|(components, result)| {
            vec![
                glyphs.name(*result).to_string(),
                joined(components, glyphs, " "),
            ]
        })
        .collect::<Vec<_>>();
    columns(f, &[20], &rows)?;
    writeln!(f)
}

fn print_contextual(
    f: &mut Formatter,
    subtable: &ContextualSubtable,
    glyphs: &GlyphInterner,
) -> Result {
    let table = &subtable.table;
    print_classes(f, &table.classes, glyphs)?;
    print_states(f, table)?;

    let subst = |index: Option<usize>| match index {
        Some(i) => format!("doSubst{}", i + 1),
        None => "none".to_string(),
    };
    let header = ["GoTo", "Mark?", "Advance?", "SubstMark", "SubstCurrent"];
    print_entries(f, table, &[16, 8, 12, 12], header, |entry| {
        vec![
            yes_no(entry.marks()).to_string(),
            yes_no(entry.advances()).to_string(),
            subst(entry.action.mark),
            subst(entry.action.current),
        ]
    })?;

    for (i, substitution) in subtable.substitutions.iter().enumerate() {
        writeln!(f, "doSubst{}", i + 1)?;
        let rows = substitution
            .mapping
            .iter()
            .map(|(source, target)| {
                vec![
                    String::new(),
                    glyphs.name(*source).to_string(),
                    glyphs.name(*target).to_string(),
                ]
            })
            .collect::<Vec<_>>();
        columns(f, &[4, 16], &rows)?;
        writeln!(f)?;
    }
    Ok(())
}

fn print_insertion(
    f: &mut Formatter,
    subtable: &InsertionSubtable,
    glyphs: &GlyphInterner,
) -> Result {
    let table = &subtable.table;
    print_classes(f, &table.classes, glyphs)?;
    print_states(f, table)?;

    let insert = |index: Option<usize>| match index {
        Some(i) => format!("doInsert{}", i + 1),
        None => "none".to_string(),
    };
    let header = ["GoTo", "Mark?", "Advance?", "InsertMark", "InsertCurrent"];
    print_entries(f, table, &[16, 8, 12, 12], header, |entry| {
        vec![
            yes_no(entry.marks()).to_string(),
            yes_no(entry.advances()).to_string(),
            insert(entry.action.mark),
            insert(entry.action.current),
        ]
    })?;

    for (i, action) in subtable.actions.iter().enumerate() {
        writeln!(f, "doInsert{}", i + 1)?;
        let rows = [
            ["IsKashidaLike", yes_no(action.kashida_like)].map(String::from),
            ["InsertBefore", yes_no(action.insert_before)].map(String::from),
            ["Glyphs".to_string(), joined(&action.glyphs, glyphs, " ")],
        ]
        .map(|[key, value]| vec![String::new(), key, value]);
        columns(f, &[4, 16], &rows)?;
        writeln!(f)?;
    }
    Ok(())
}

fn print_rearrangement(
    f: &mut Formatter,
    subtable: &RearrangementSubtable,
    glyphs: &GlyphInterner,
) -> Result {
    let table = &subtable.table;
    print_classes(f, &table.classes, glyphs)?;
    print_states(f, table)?;
    let header = ["GoTo", "MarkFirst?", "MarkLast?", "Advance?", "DoThis"];
    print_entries(f, table, &[12, 12, 12, 12], header, |entry| {
        vec![
            yes_no(entry.marks()).to_string(),
            yes_no(entry.flags.contains(EntryFlags::MARK_LAST)).to_string(),
            yes_no(entry.advances()).to_string(),
            entry
                .action
                .map_or_else(|| "none".to_string(), |verb| verb.name().to_string()),
        ]
    })
}

fn print_classes(f: &mut Formatter, classes: &[MatchClass], glyphs: &GlyphInterner) -> Result {
    for (i, class) in classes.iter().enumerate() {
        let label = format!("Match{}", i + 1);
        let mut lines = class
            .glyphs
            .chunks(GLYPHS_PER_LINE)
            .map(|chunk| joined(chunk, glyphs, " "))
            .collect::<Vec<_>>();
        if let Some(signature) = &class.signature {
            if let Some(last) = lines.last_mut() {
                last.push_str("  // ");
                last.push_str(signature);
            }
        }
        for (j, line) in lines.iter().enumerate() {
            let key = if j == 0 { label.as_str() } else { "+" };
            trimmed(f, &format!("{key:<width$}{line}", width = KEY_WIDTH))?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn print_states<A>(f: &mut Formatter, table: &StateTable<A>) -> Result {
    let header = std::iter::once(String::new())
        .chain(CONTROL_COLUMNS.iter().map(|column| column.to_string()))
        .chain((1..=table.classes.len()).map(|i| format!("Match{i}")));
    let mut rows = vec![header.collect::<Vec<_>>()];
    for (state, cells) in table.states.iter().zip(&table.rows) {
        let row = std::iter::once(state.to_string()).chain(cells.iter().map(u16::to_string));
        rows.push(row.collect());
    }
    let mut min_widths = vec![KEY_WIDTH];
    min_widths.resize(rows[0].len(), 4);
    columns(f, &min_widths, &rows)?;
    writeln!(f)
}

/// Write the entry table: the id, the next state, then `describe`'s cells.
fn print_entries<A, const N: usize>(
    f: &mut Formatter,
    table: &StateTable<A>,
    min_widths: &[usize],
    header: [&str; N],
    describe: impl Fn(&Entry<A>) -> Vec<String>,
) -> Result {
    let mut rows = vec![std::iter::once("")
        .chain(header)
        .map(String::from)
        .collect::<Vec<_>>()];
    for (i, entry) in table.entries.iter().enumerate() {
        let next = table
            .states
            .get(entry.next_state)
            .map(|state| state.to_string())
            .unwrap_or_default();
        let mut row = vec![(i + 1).to_string(), next];
        row.extend(describe(entry));
        rows.push(row);
    }
    let mut widths = vec![ID_WIDTH];
    widths.extend_from_slice(min_widths);
    columns(f, &widths, &rows)?;
    writeln!(f)
}
