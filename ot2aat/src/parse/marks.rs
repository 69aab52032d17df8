//! Parsing positioning records.
//!
//! A record is a header line (`@markclass`, `@base`, ...) followed by entry
//! lines, up to the next directive. `@distance` is a single line.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use smol_str::SmolStr;

use crate::{
    common::GlyphInterner,
    types::{
        Anchor, BaseRecord, ClassName, DistanceRule, GlyphOrClass, LigatureRecord, Mark,
        MarkClassDef, PositioningInput,
    },
};

use super::rules::parse_glyph;

/// The record that entry lines are added to.
#[derive(Clone, Debug)]
pub(super) enum Target {
    MarkClass {
        name: ClassName,
        anchor: Option<Anchor>,
    },
    Base(usize),
    MarkBase(usize),
    Ligature(usize),
}

const POSITIONING_KEYWORDS: [&str; 6] = [
    "markclass",
    "mark_group",
    "base",
    "mark2mark",
    "ligature",
    "distance",
];

pub(super) fn is_positioning_keyword(keyword: &str) -> bool {
    POSITIONING_KEYWORDS.contains(&keyword)
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^<\s*(?:anchor\s+)?(-?\d+)\s*,?\s*(-?\d+)\s*>$").expect("valid regex")
    })
}

fn anchor_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid regex"))
}

/// Parse `<x, y>`, `<x y>` or `<NULL>`.
fn parse_anchor(text: &str) -> Result<Option<Anchor>, String> {
    if text.eq_ignore_ascii_case("<NULL>") {
        return Ok(None);
    }
    let caps = anchor_re()
        .captures(text)
        .ok_or_else(|| format!("invalid anchor '{text}', expected '<x, y>'"))?;
    let coord = |i: usize| {
        caps[i]
            .parse::<i32>()
            .map_err(|_| format!("anchor coordinate out of range in '{text}'"))
    };
    Ok(Some(Anchor {
        x: coord(1)?,
        y: coord(2)?,
    }))
}

/// Split a line into the tokens before the first anchor, and the anchors.
fn split_anchors(text: &str) -> Result<(Vec<&str>, Vec<Option<Anchor>>), String> {
    let first_anchor = text.find('<').unwrap_or(text.len());
    let (head, tail) = text.split_at(first_anchor);
    let anchors = anchor_span_re()
        .find_iter(tail)
        .map(|m| parse_anchor(m.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    let leftover = anchor_span_re().replace_all(tail, "");
    if !leftover.trim().is_empty() {
        return Err(format!("unexpected text '{}' after anchor", leftover.trim()));
    }
    Ok((head.split_whitespace().collect(), anchors))
}

fn class_name(token: &str) -> ClassName {
    SmolStr::new(token.strip_prefix('@').unwrap_or(token))
}

/// Parse a positioning header, returning the record that subsequent lines
/// belong to (or `None` for single-line records).
pub(super) fn parse_header(
    keyword: &str,
    rest: &str,
    line: usize,
    positioning: &mut PositioningInput,
    glyphs: &mut GlyphInterner,
) -> Result<Option<Target>, String> {
    let rest = super::strip_comment(rest);
    match keyword {
        "markclass" | "mark_group" => {
            let (names, anchors) = split_anchors(rest)?;
            let [name] = names.as_slice() else {
                return Err(format!("expected '@{keyword} NAME [<x, y>]'"));
            };
            let anchor = match anchors.as_slice() {
                [] => None,
                [Some(anchor)] => Some(*anchor),
                _ => return Err("a mark class takes at most one shared anchor".into()),
            };
            let name = class_name(name);
            positioning
                .mark_classes
                .entry(name.clone())
                .or_insert_with(|| MarkClassDef {
                    name: name.clone(),
                    marks: Vec::new(),
                    line,
                });
            Ok(Some(Target::MarkClass { name, anchor }))
        }
        "base" | "mark2mark" | "ligature" => {
            let glyph = match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [glyph] => parse_glyph(glyph, glyphs)?,
                _ => return Err(format!("expected '@{keyword} GLYPH'")),
            };
            Ok(Some(match keyword {
                "base" => {
                    positioning.bases.push(BaseRecord {
                        glyph,
                        anchors: IndexMap::new(),
                        line,
                    });
                    Target::Base(positioning.bases.len() - 1)
                }
                "mark2mark" => {
                    positioning.mark_bases.push(BaseRecord {
                        glyph,
                        anchors: IndexMap::new(),
                        line,
                    });
                    Target::MarkBase(positioning.mark_bases.len() - 1)
                }
                _ => {
                    positioning.ligatures.push(LigatureRecord {
                        glyph,
                        components: IndexMap::new(),
                        line,
                    });
                    Target::Ligature(positioning.ligatures.len() - 1)
                }
            }))
        }
        "distance" => {
            positioning.distances.push(parse_distance(rest, line, glyphs)?);
            Ok(None)
        }
        _ => Err(format!("unknown directive '@{keyword}'")),
    }
}

fn parse_distance(rest: &str, line: usize, glyphs: &mut GlyphInterner) -> Result<DistanceRule, String> {
    const USAGE: &str = "expected '@distance GLYPH GLYPH|@CLASS VALUE [horizontal|vertical]'";
    let tokens = rest.split_whitespace().collect::<Vec<_>>();
    let (first, second, value, direction) = match tokens.as_slice() {
        [first, second, value] => (first, second, value, "horizontal"),
        [first, second, value, direction] => (first, second, value, *direction),
        _ => return Err(USAGE.into()),
    };
    let direction = match direction {
        "horizontal" | "vertical" => SmolStr::new(direction),
        other => return Err(format!("unknown kerning direction '{other}'")),
    };
    let second = match second.strip_prefix('@') {
        Some(name) => GlyphOrClass::Class(name.into()),
        None => GlyphOrClass::Glyph(parse_glyph(second, glyphs)?),
    };
    Ok(DistanceRule {
        first: parse_glyph(first, glyphs)?,
        second,
        value: value
            .parse()
            .map_err(|_| format!("invalid distance '{value}'"))?,
        direction,
        line,
    })
}

/// Parse one entry line of an open positioning record.
pub(super) fn parse_entry(
    target: &Target,
    text: &str,
    positioning: &mut PositioningInput,
    glyphs: &mut GlyphInterner,
) -> Result<(), String> {
    let (tokens, anchors) = split_anchors(text)?;
    match target {
        Target::MarkClass { name, anchor } => {
            let anchor = match (anchors.as_slice(), anchor) {
                ([], Some(shared)) => *shared,
                ([Some(anchor)], _) => *anchor,
                ([], None) => return Err("mark has no anchor".into()),
                _ => return Err("expected 'glyph [glyph ...] <x, y>'".into()),
            };
            if tokens.is_empty() {
                return Err("expected at least one mark glyph".into());
            }
            let marks = tokens
                .iter()
                .map(|token| {
                    parse_glyph(token, glyphs).map(|glyph| Mark {
                        glyph,
                        anchor,
                        class: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let Some(def) = positioning.mark_classes.get_mut(name) else {
                return Err(format!("mark class '{name}' is not open"));
            };
            for mark in marks {
                if !def.marks.contains(&mark) {
                    def.marks.push(mark);
                }
            }
            Ok(())
        }
        Target::Base(idx) | Target::MarkBase(idx) => {
            let ([class], [Some(anchor)]) = (tokens.as_slice(), anchors.as_slice()) else {
                return Err("expected 'CLASS <x, y>'".into());
            };
            let records = if matches!(target, Target::Base(_)) {
                &mut positioning.bases
            } else {
                &mut positioning.mark_bases
            };
            let record = records
                .get_mut(*idx)
                .ok_or("attachment record is not open")?;
            let class = class_name(class);
            if let Some(existing) = record.anchors.get(&class) {
                if existing != anchor {
                    return Err(format!("class '{class}' already has an anchor on this glyph"));
                }
            }
            record.anchors.insert(class, *anchor);
            Ok(())
        }
        Target::Ligature(idx) => {
            let [class] = tokens.as_slice() else {
                return Err("expected 'CLASS <x, y> [<x, y> ...]'".into());
            };
            if anchors.is_empty() {
                return Err("expected one anchor per ligature component".into());
            }
            let record = positioning
                .ligatures
                .get_mut(*idx)
                .ok_or("ligature record is not open")?;
            record.components.insert(class_name(class), anchors);
            Ok(())
        }
    }
}
