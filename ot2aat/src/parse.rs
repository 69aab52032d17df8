//! Parsing the rule language.
//!
//! The input is line oriented: class declarations, lookup blocks holding one
//! rule per line, and positioning records. A malformed line produces a
//! diagnostic and is skipped; it never stops the rest of the file from being
//! parsed.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use smol_str::SmolStr;

use crate::{
    common::{GlyphClass, GlyphInterner},
    types::{
        ClassName, Lookup, LookupKind, LookupRules, PositioningInput, DFLT_FEATURE,
    },
    Diagnostic, DiagnosticKind,
};

mod marks;
mod rules;

/// Everything parsed from one rule file.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParsedSource {
    pub glyphs: GlyphInterner,
    /// Declared classes, in declaration order.
    pub classes: IndexMap<ClassName, GlyphClass>,
    pub lookups: Vec<Lookup>,
    pub positioning: PositioningInput,
}

impl ParsedSource {
    pub fn class(&self, name: &str) -> Option<&GlyphClass> {
        self.classes.get(name)
    }

    /// The first lookup with this name.
    pub fn lookup(&self, name: &str) -> Option<&Lookup> {
        self.lookups.iter().find(|lookup| lookup.name == name)
    }
}

/// Parse rule source text.
///
/// Always returns a (possibly partial) [`ParsedSource`], along with any
/// problems found along the way.
pub fn parse_source(text: &str) -> (ParsedSource, Vec<Diagnostic>) {
    let mut parser = Parser::default();
    for (i, line) in text.lines().enumerate() {
        parser.line(i + 1, line);
    }
    parser.finish()
}

#[derive(Default)]
struct Parser {
    out: ParsedSource,
    diagnostics: Vec<Diagnostic>,
    header: PendingHeader,
    /// The most recent feature header; inherited by lookups without one.
    banner_feature: Option<SmolStr>,
    n_unnamed: usize,
    state: State,
}

/// Metadata comments seen since the last lookup block.
#[derive(Default)]
struct PendingHeader {
    name: Option<SmolStr>,
    feature: Option<SmolStr>,
    scripts: Vec<SmolStr>,
}

#[derive(Default)]
enum State {
    #[default]
    TopLevel,
    Block(Lookup),
    Positioning(marks::Target),
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i)(lookup|features?|scripts?)\s*:\s*(.*?)\s*$").expect("valid regex")
    })
}

fn class_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_.\-]+)\s*=\s*(.*)$").expect("valid regex"))
}

impl Parser {
    fn line(&mut self, line_no: usize, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        if matches!(self.state, State::Block(_)) {
            self.block_line(line_no, line);
        } else {
            self.top_level_line(line_no, line);
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(DiagnosticKind::Parse, message).at_line(line));
    }

    fn top_level_line(&mut self, line_no: usize, line: &str) {
        if let Some(comment) = line.strip_prefix('#') {
            self.header_comment(comment);
            return;
        }
        if let Some(directive) = line.strip_prefix('@') {
            // positioning entries may name their class as '@CLASS'
            let in_positioning = matches!(self.state, State::Positioning(_));
            if !in_positioning || is_directive(directive) {
                self.state = State::TopLevel;
                self.directive(line_no, directive);
                return;
            }
        }
        let line = strip_comment(line);
        match &self.state {
            State::Positioning(target) => {
                let target = target.clone();
                let result = marks::parse_entry(
                    &target,
                    line,
                    &mut self.out.positioning,
                    &mut self.out.glyphs,
                );
                if let Err(e) = result {
                    self.error(line_no, e);
                }
            }
            _ if line == "}" => self.error(line_no, "unmatched '}'"),
            _ => self.error(line_no, format!("unexpected line outside of a block: '{line}'")),
        }
    }

    fn header_comment(&mut self, comment: &str) {
        let Some(caps) = header_re().captures(comment.trim()) else {
            return;
        };
        let key = caps[1].to_ascii_lowercase();
        let mut values = caps[2]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(SmolStr::new);
        match key.as_str() {
            "lookup" => self.header.name = values.next(),
            "feature" | "features" => {
                if let Some(feature) = values.next() {
                    self.header.feature = Some(feature.clone());
                    self.banner_feature = Some(feature);
                }
            }
            _ => self.header.scripts.extend(values),
        }
    }

    fn directive(&mut self, line_no: usize, directive: &str) {
        let keyword_len = directive
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(directive.len());
        let (keyword, rest) = directive.split_at(keyword_len);
        let rest = rest.trim();

        if keyword == "class" {
            self.class_def(line_no, rest);
            return;
        }
        if let Some(kind) = LookupKind::from_block_name(keyword) {
            if let Some(after_brace) = rest.strip_prefix('{') {
                if !after_brace.trim().is_empty() {
                    self.error(line_no, "unexpected text after '{'");
                }
                self.open_block(line_no, kind);
                return;
            }
            // '@ligature GLYPH' is a positioning record
            if kind != LookupKind::Ligature {
                self.error(line_no, format!("expected '{{' after '@{keyword}'"));
                return;
            }
        }
        match marks::parse_header(
            keyword,
            rest,
            line_no,
            &mut self.out.positioning,
            &mut self.out.glyphs,
        ) {
            Ok(Some(target)) => self.state = State::Positioning(target),
            Ok(None) => (),
            Err(e) => self.error(line_no, e),
        }
    }

    fn class_def(&mut self, line_no: usize, rest: &str) {
        let Some(caps) = class_def_re().captures(rest) else {
            self.error(line_no, "expected '@class NAME = glyph glyph ...'");
            return;
        };
        let name = SmolStr::new(&caps[1]);
        let body = strip_comment(&caps[2]);
        let body = body
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(body);

        let mut glyphs = Vec::new();
        for token in body.split_whitespace() {
            if let Some(other) = token.strip_prefix('@') {
                match self.out.classes.get(other) {
                    Some(class) => glyphs.extend(class.iter()),
                    None => self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::UndefinedClass,
                            format!("class '@{other}' is not defined"),
                        )
                        .at_line(line_no)
                        .help("classes used inside a class declaration must be declared first"),
                    ),
                }
                continue;
            }
            match rules::parse_glyph(token, &mut self.out.glyphs) {
                Ok(glyph) => glyphs.push(glyph),
                Err(e) => {
                    self.error(line_no, e);
                    return;
                }
            }
        }
        if self.out.classes.contains_key(&name) {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::Parse,
                    format!("class '@{name}' redefined; the new definition replaces the old"),
                )
                .at_line(line_no),
            );
        }
        self.out.classes.insert(name, glyphs.into());
    }

    fn open_block(&mut self, line_no: usize, kind: LookupKind) {
        let header = std::mem::take(&mut self.header);
        let name = match header.name {
            Some(name) => name,
            None => {
                self.n_unnamed += 1;
                format!("lookup_{}", self.n_unnamed).into()
            }
        };
        let has_own_feature = header.feature.is_some();
        let feature = header
            .feature
            .or_else(|| self.banner_feature.clone())
            .unwrap_or_else(|| DFLT_FEATURE.into());
        self.state = State::Block(Lookup {
            name,
            feature,
            scripts: header.scripts,
            rules: LookupRules::new(kind),
            line: line_no,
            rule_lines: 0,
            has_own_feature,
        });
    }

    fn block_line(&mut self, line_no: usize, line: &str) {
        if let Some(rest) = line.strip_prefix('}') {
            if !strip_comment(rest).is_empty() {
                self.error(line_no, "unexpected text after '}'");
            }
            self.close_block();
            return;
        }
        if line.starts_with('#') {
            return;
        }
        let line = strip_comment(line);
        let Parser {
            state: State::Block(lookup),
            out,
            diagnostics,
            ..
        } = self
        else {
            return;
        };
        lookup.rule_lines += 1;
        match rules::parse_rule(lookup.kind(), line, &mut out.glyphs) {
            Ok(rule) => {
                // parse_rule only returns rules of the requested kind
                if lookup.rules.push(rule, line_no).is_err() {
                    log::warn!("rule kind mismatch in lookup '{}'", lookup.name);
                }
            }
            Err(e) => diagnostics.push(
                Diagnostic::new(DiagnosticKind::Parse, e)
                    .at_line(line_no)
                    .in_lookup(lookup.name.clone()),
            ),
        }
    }

    fn close_block(&mut self) {
        let State::Block(lookup) = std::mem::take(&mut self.state) else {
            return;
        };
        if self.out.lookup(&lookup.name).is_some() {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::DuplicateRule,
                    format!("a lookup named '{}' already exists", lookup.name),
                )
                .at_line(lookup.line)
                .help("'lookup NAME' references resolve to the first definition"),
            );
        }
        log::debug!(
            "parsed {} lookup '{}' with {} rules",
            lookup.kind(),
            lookup.name,
            lookup.rules.len()
        );
        self.out.lookups.push(lookup);
    }

    fn finish(mut self) -> (ParsedSource, Vec<Diagnostic>) {
        if let State::Block(lookup) = &self.state {
            let line = lookup.line;
            let name = lookup.name.clone();
            self.diagnostics.push(
                Diagnostic::new(DiagnosticKind::Parse, "block is never closed")
                    .at_line(line)
                    .in_lookup(name),
            );
            self.close_block();
        }
        (self.out, self.diagnostics)
    }
}

fn is_directive(text: &str) -> bool {
    let keyword = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    keyword == "class"
        || LookupKind::from_block_name(keyword).is_some()
        || marks::is_positioning_keyword(keyword)
}

/// Remove a trailing `# comment`.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    }
}
