//! Writing compiled tables as text.
//!
//! `morx` subtables are written in the MIF format, `kerx` subtables in ATIF.
//! Both are consumed by Apple's font tools. Output depends only on the
//! compiled tables, so the same input always produces the same bytes.

use std::fmt::{Formatter, Result, Write};

use crate::common::{GlyphId, GlyphInterner};

pub mod kerx;
pub mod morx;

/// Width of the `// ----` rule lines.
const RULE_WIDTH: usize = 79;

/// Column the value of a `Key  value` line starts at.
const KEY_WIDTH: usize = 16;

fn rule_line(f: &mut Formatter) -> Result {
    writeln!(f, "// {}", "-".repeat(RULE_WIDTH))
}

/// A comment block between two rule lines.
fn banner<I>(f: &mut Formatter, lines: I) -> Result
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    rule_line(f)?;
    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            writeln!(f, "//")?;
        } else {
            writeln!(f, "// {line}")?;
        }
    }
    rule_line(f)
}

fn file_header(f: &mut Formatter, what: &str) -> Result {
    banner(f, ["", what, ""])?;
    writeln!(f)
}

fn joined(glyphs: &[GlyphId], names: &GlyphInterner, separator: &str) -> String {
    glyphs
        .iter()
        .map(|glyph| names.name(*glyph))
        .collect::<Vec<_>>()
        .join(separator)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Write left-aligned columns.
///
/// Each column is at least as wide as its minimum, and at least one space
/// wider than its longest cell.
fn columns(f: &mut Formatter, min_widths: &[usize], rows: &[Vec<String>]) -> Result {
    let mut widths = min_widths.to_vec();
    for row in rows {
        if widths.len() < row.len() {
            widths.resize(row.len(), 0);
        }
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len() + 1);
        }
    }
    for row in rows {
        let mut line = String::new();
        for (cell, &width) in row.iter().zip(&widths) {
            write!(line, "{cell:<width$}")?;
        }
        trimmed(f, &line)?;
    }
    Ok(())
}

/// Write `line` without trailing whitespace.
fn trimmed(f: &mut Formatter, line: &str) -> Result {
    writeln!(f, "{}", line.trim_end())
}
