//! Parsing individual rule lines.

use std::sync::OnceLock;

use regex::Regex;
use smol_str::SmolStr;

use crate::{
    common::{GlyphId, GlyphInterner},
    types::{
        Context, ContextualRule, GlyphOrClass, LigatureRule, LookupKind, OneToManyRule,
        ReorderRule, Rule, SimpleRule, SubstTarget,
    },
};

fn glyph_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid regex"))
}

fn contextual_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(before|after|between)\s+(.+?)\s*:\s*(.+?)\s*=>\s*(.+?)$")
            .expect("valid regex")
    })
}

fn between_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+and\s+").expect("valid regex"))
}

/// The operators, longest first so that `->` is not mistaken for `>`.
const OPERATORS: [&str; 4] = [":=", "=>", "->", ">"];

fn expected_operator(kind: LookupKind) -> &'static str {
    match kind {
        LookupKind::Simple => "->",
        LookupKind::Contextual | LookupKind::Reorder => "=>",
        LookupKind::Ligature => ":=",
        LookupKind::OneToMany => ">",
    }
}

/// Parse one line inside a block of the given kind.
pub(super) fn parse_rule(
    kind: LookupKind,
    line: &str,
    glyphs: &mut GlyphInterner,
) -> Result<Rule, String> {
    let expected = expected_operator(kind);
    match OPERATORS.iter().find(|op| line.contains(**op)) {
        None => return Err(format!("expected '{expected}' in a {kind} rule")),
        Some(op) if *op != expected => {
            return Err(format!(
                "found '{op}' in a {kind} block; rules here use '{expected}'"
            ))
        }
        _ => (),
    }
    match kind {
        LookupKind::Simple => parse_simple(line, glyphs).map(Rule::Simple),
        LookupKind::Contextual => parse_contextual(line, glyphs).map(Rule::Contextual),
        LookupKind::Ligature => parse_ligature(line, glyphs).map(Rule::Ligature),
        LookupKind::OneToMany => parse_one_to_many(line, glyphs).map(Rule::OneToMany),
        LookupKind::Reorder => parse_reorder(line, glyphs).map(Rule::Reorder),
    }
}

pub(super) fn parse_glyph(token: &str, glyphs: &mut GlyphInterner) -> Result<GlyphId, String> {
    if glyph_name_re().is_match(token) {
        Ok(glyphs.intern(token))
    } else {
        Err(format!("invalid glyph name '{token}'"))
    }
}

fn single_glyph(text: &str, glyphs: &mut GlyphInterner) -> Result<GlyphId, String> {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => parse_glyph(token, glyphs),
        (None, _) => Err("expected a glyph".into()),
        (Some(_), Some(_)) => Err(format!("expected a single glyph, found '{text}'")),
    }
}

fn parse_simple(line: &str, glyphs: &mut GlyphInterner) -> Result<SimpleRule, String> {
    let (source, target) = line.split_once("->").ok_or("expected 'src -> tgt'")?;
    Ok(SimpleRule {
        source: single_glyph(source, glyphs)?,
        target: single_glyph(target, glyphs)?,
    })
}

fn parse_contextual(line: &str, glyphs: &mut GlyphInterner) -> Result<ContextualRule, String> {
    let caps = contextual_re().captures(line).ok_or(
        "expected 'before|after CONTEXT: src => tgt' or 'between CONTEXT and CONTEXT: src => tgt'",
    )?;
    let context = match &caps[1] {
        "before" => Context::Before(parse_elements(&caps[2], glyphs)?),
        "after" => Context::After(parse_elements(&caps[2], glyphs)?),
        _ => {
            let parts = between_re().split(&caps[2]).collect::<Vec<_>>();
            let [before, after] = parts.as_slice() else {
                return Err("expected 'between CONTEXT and CONTEXT'".into());
            };
            Context::Between {
                before: parse_elements(before, glyphs)?,
                after: parse_elements(after, glyphs)?,
            }
        }
    };
    if context.backtrack().is_empty() && context.lookahead().is_empty() {
        return Err("empty context".into());
    }
    let source = parse_element(&caps[3], glyphs)?;
    let target = match caps[4].strip_prefix("lookup") {
        Some(name) if name.starts_with(char::is_whitespace) => {
            SubstTarget::Lookup(SmolStr::new(name.trim()))
        }
        _ => SubstTarget::Element(parse_element(&caps[4], glyphs)?),
    };
    Ok(ContextualRule {
        context,
        source,
        target,
    })
}

fn parse_ligature(line: &str, glyphs: &mut GlyphInterner) -> Result<LigatureRule, String> {
    let (result, components) = line
        .split_once(":=")
        .ok_or("expected 'result := c1 + c2'")?;
    let result = single_glyph(result, glyphs)?;
    let components = components
        .split('+')
        .map(|part| single_glyph(part, glyphs))
        .collect::<Result<Vec<_>, _>>()?;
    if components.len() < 2 {
        return Err("a ligature needs at least two components".into());
    }
    Ok(LigatureRule { result, components })
}

fn parse_one_to_many(line: &str, glyphs: &mut GlyphInterner) -> Result<OneToManyRule, String> {
    let (source, rest) = line.split_once('>').ok_or("expected 'src > t1 t2'")?;
    let source = single_glyph(source, glyphs)?;
    let mut rule = OneToManyRule {
        source,
        targets: Vec::new(),
        insert_before: false,
        kashida_like: false,
    };
    for token in rest.split_whitespace() {
        match token.strip_prefix('!') {
            Some("before") => rule.insert_before = true,
            Some("kashida") => rule.kashida_like = true,
            Some(other) => return Err(format!("unknown modifier '!{other}'")),
            None => rule.targets.push(parse_glyph(token, glyphs)?),
        }
    }
    if rule.targets.is_empty() {
        return Err("no glyphs to insert".into());
    }
    Ok(rule)
}

fn parse_reorder(line: &str, glyphs: &mut GlyphInterner) -> Result<ReorderRule, String> {
    let (before, after) = line.split_once("=>").ok_or("expected 'a b => b a'")?;
    Ok(ReorderRule {
        before: parse_elements(before, glyphs)?,
        after: parse_elements(after, glyphs)?,
    })
}

fn parse_element(text: &str, glyphs: &mut GlyphInterner) -> Result<GlyphOrClass, String> {
    let mut elements = parse_elements(text, glyphs)?;
    match elements.len() {
        1 => Ok(elements.remove(0)),
        0 => Err("expected a glyph or class".into()),
        _ => Err(format!("expected a single glyph or class, found '{}'", text.trim())),
    }
}

/// Split a sequence of glyphs, `@CLASS` references and `[a b c]` classes.
fn parse_elements(text: &str, glyphs: &mut GlyphInterner) -> Result<Vec<GlyphOrClass>, String> {
    let mut elements = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('[') {
            let end = inner.find(']').ok_or("unclosed '['")?;
            let members = &inner[..end];
            if members.contains('[') {
                return Err("nested '[' is not allowed".into());
            }
            let class = members
                .split_whitespace()
                .map(|token| parse_glyph(token, glyphs))
                .collect::<Result<Vec<_>, _>>()?;
            if class.is_empty() {
                return Err("empty inline class '[]'".into());
            }
            elements.push(GlyphOrClass::Inline(class.into()));
            rest = inner[end + 1..].trim_start();
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '[')
            .unwrap_or(rest.len());
        let token = &rest[..end];
        match token.strip_prefix('@') {
            Some(name) if glyph_name_re().is_match(name) => {
                elements.push(GlyphOrClass::Class(name.into()))
            }
            Some(_) => return Err(format!("invalid class reference '{token}'")),
            None => elements.push(GlyphOrClass::Glyph(parse_glyph(token, glyphs)?)),
        }
        rest = rest[end..].trim_start();
    }
    Ok(elements)
}
