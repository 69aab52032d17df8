//! ATIF output for kerx subtables

use std::fmt::{Display, Formatter, Result};

use crate::{
    common::GlyphInterner,
    compile::{AttachmentKind, ControlPointSubtable, DistanceList, KerxTables, SemanticGroup},
};

use super::{banner, file_header, joined};

pub struct KerxPrinter<'a> {
    tables: &'a KerxTables,
    glyphs: &'a GlyphInterner,
}

pub fn printer<'a>(tables: &'a KerxTables, glyphs: &'a GlyphInterner) -> KerxPrinter<'a> {
    KerxPrinter { tables, glyphs }
}

impl Display for KerxPrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        file_header(f, "kerx subtables, ATIF format")?;
        for list in &self.tables.distances {
            print_distances(f, list, self.glyphs)?;
        }
        for subtable in [&self.tables.mark_to_base, &self.tables.mark_to_mark]
            .into_iter()
            .flatten()
        {
            print_control_points(f, subtable, &self.tables.groups, self.glyphs)?;
        }
        Ok(())
    }
}

fn print_distances(f: &mut Formatter, list: &DistanceList, glyphs: &GlyphInterner) -> Result {
    banner(f, [format!("Distance kerning, {}", list.direction)])?;
    writeln!(f)?;
    writeln!(f, "kerning list {{")?;
    writeln!(f, "    layout is horizontal;")?;
    writeln!(f, "    kerning is {};", list.direction)?;
    writeln!(f)?;
    for pair in &list.pairs {
        writeln!(
            f,
            "    {} + {} => {};",
            glyphs.name(pair.first),
            glyphs.name(pair.second),
            pair.value
        )?;
    }
    writeln!(f, "}};")?;
    writeln!(f)
}

fn print_control_points(
    f: &mut Formatter,
    subtable: &ControlPointSubtable,
    groups: &[SemanticGroup],
    glyphs: &GlyphInterner,
) -> Result {
    let title = match subtable.kind {
        AttachmentKind::MarkToBase => "Mark-to-base positioning",
        AttachmentKind::MarkToMark => "Mark-to-mark positioning",
    };
    banner(f, [title])?;
    writeln!(f)?;
    writeln!(f, "control point kerning subtable {{")?;
    writeln!(f, "    layout is horizontal;")?;
    writeln!(f, "    kerning is horizontal;")?;
    writeln!(f, "    uses anchor points;")?;
    writeln!(f, "    scan glyphs forward;")?;
    writeln!(f)?;

    for group in groups {
        writeln!(
            f,
            "    // {}: median y {}, from {}",
            group.name,
            group.median_y,
            group.classes.join(", ")
        )?;
    }
    if !groups.is_empty() {
        writeln!(f)?;
    }

    for (glyph, points) in &subtable.anchors {
        let name = glyphs.name(*glyph);
        for (i, point) in points.iter().enumerate() {
            writeln!(f, "    anchor {name}[{i}] := ({}, {});", point.x, point.y)?;
        }
    }
    writeln!(f)?;

    for (name, members) in &subtable.classes {
        writeln!(f, "    class {name} {{ {} }};", joined(members, glyphs, ", "))?;
    }
    writeln!(f)?;

    for state in &subtable.states {
        writeln!(f, "    state {} {{", state.name)?;
        for (class, transition) in &state.cells {
            writeln!(f, "        {class}: {transition};")?;
        }
        writeln!(f, "    }};")?;
        writeln!(f)?;
    }

    for transition in &subtable.transitions {
        writeln!(f, "    transition {} {{", transition.name)?;
        writeln!(f, "        change state to {};", transition.next_state)?;
        if transition.mark {
            writeln!(f, "        mark glyph;")?;
        }
        if let Some(action) = &transition.action {
            writeln!(f, "        kerning action: {action};")?;
        }
        writeln!(f, "    }};")?;
        writeln!(f)?;
    }

    for (i, action) in subtable.actions.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        writeln!(f, "    anchor point action {} {{", action.name)?;
        writeln!(f, "        marked glyph point: {};", action.marked)?;
        writeln!(f, "        current glyph point: {};", action.current)?;
        writeln!(f, "    }};")?;
    }
    writeln!(f, "}};")?;
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::Compiler;

    #[test]
    fn distance_list() {
        let compilation = Compiler::new(
            "\
@class ROUND = o e
@distance T @ROUND -80
@distance V a 20 vertical
",
        )
        .compile()
        .unwrap();
        let text = compilation.kerx_text();
        let expected = "\
kerning list {
    layout is horizontal;
    kerning is horizontal;

    T + o => -80;
    T + e => -80;
};
";
        assert!(text.contains(expected), "{text}");
        assert!(text.contains("    kerning is vertical;\n\n    V + a => 20;\n"));
    }

    #[test]
    fn control_point_subtable() {
        let compilation = Compiler::new(
            "\
@markclass TOP <150, 500>
    acute grave
@base a
    TOP <250, 800>
",
        )
        .compile()
        .unwrap();
        assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
        let text = compilation.kerx_text();
        for line in [
            "    // ATTACHMENT_0: median y 800, from TOP\n",
            "    anchor a[0] := (250, 800);\n",
            "    anchor acute[0] := (150, 500);\n",
            "    class bases_ATTACHMENT_0 { a };\n",
            "    class marks_ATTACHMENT_0 { acute, grave };\n",
            "        marks_ATTACHMENT_0: snap_0_0_keep_bases_ATTACHMENT_0;\n",
            "        change state to with_bases_ATTACHMENT_0;\n        mark glyph;\n",
            "    anchor point action snap_0_0 {\n        marked glyph point: 0;\n        current glyph point: 0;\n    };\n",
        ] {
            assert!(text.contains(line), "missing {line:?} in\n{text}");
        }
        assert!(!text.contains("Mark-to-mark"));
    }

    #[test]
    fn no_positioning_no_text() {
        let compilation = Compiler::new("@simple {\n    a -> b\n}\n").compile().unwrap();
        assert_eq!(compilation.kerx_text(), "");
    }
}
