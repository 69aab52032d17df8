//! Reporting errors, warnings, and other information to the user.

use std::fmt::{Display, Formatter};

use smol_str::SmolStr;

const DEFAULT_N_MESSAGES_TO_PRINT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Level {
    Error,
    Warning,
    Info,
}

/// The kind of problem a [`Diagnostic`] describes.
///
/// None of these abort a compilation; each one excludes some line, rule,
/// lookup or subtable from the output (or nothing, for warnings).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DiagnosticKind {
    /// A malformed line; the line is skipped.
    Parse,
    /// A reference to a class that was never declared; treated as empty.
    UndefinedClass,
    /// A glyph needs two indices for one role; the subtable is dropped.
    AnchorIndexConflict,
    /// A pattern is longer than the context scanner supports; the rule is dropped.
    PatternTooLong,
    /// Too many match classes or states; the lookup is dropped.
    PartitionExplosion,
    /// A contextual rule names an auxiliary lookup that does not exist.
    MissingLookupReference,
    /// A reorder rule that no rearrangement verb can express.
    InvalidReorder,
    /// A class substitution whose source and target lengths differ.
    InvalidSubstitution,
    /// A rule repeating an earlier rule's input; the later rule is ignored.
    DuplicateRule,
    /// A rule glyph that no match class covers.
    UncoveredGlyph,
    /// A glyph whose attaching and stacking points disagree.
    DualRoleAnchorMismatch,
    /// A lookup with nothing left to emit.
    EmptyLookup,
}

impl DiagnosticKind {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::Parse => "ParseError",
            DiagnosticKind::UndefinedClass => "UndefinedClassError",
            DiagnosticKind::AnchorIndexConflict => "AnchorIndexConflictError",
            DiagnosticKind::PatternTooLong => "PatternTooLongError",
            DiagnosticKind::PartitionExplosion => "PartitionExplosionWarning",
            DiagnosticKind::MissingLookupReference => "MissingLookupReferenceError",
            DiagnosticKind::InvalidReorder => "InvalidReorderError",
            DiagnosticKind::InvalidSubstitution => "InvalidSubstitutionError",
            DiagnosticKind::DuplicateRule => "DuplicateRuleWarning",
            DiagnosticKind::UncoveredGlyph => "UncoveredGlyphWarning",
            DiagnosticKind::DualRoleAnchorMismatch => "DualRoleAnchorWarning",
            DiagnosticKind::EmptyLookup => "EmptyLookupWarning",
        }
    }

    fn default_level(self) -> Level {
        match self {
            DiagnosticKind::PartitionExplosion
            | DiagnosticKind::DuplicateRule
            | DiagnosticKind::UncoveredGlyph
            | DiagnosticKind::DualRoleAnchorMismatch
            | DiagnosticKind::EmptyLookup => Level::Warning,
            _ => Level::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: Level,
    pub message: String,
    /// 1-based source line, if the problem can be pinned to one.
    pub line: Option<usize>,
    /// The lookup (or kerx subtable) the problem belongs to.
    pub lookup: Option<SmolStr>,
    help: Option<String>,
}

impl Diagnostic {
    /// A new diagnostic, at the default level for its kind.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            level: kind.default_level(),
            message: message.into(),
            line: None,
            lookup: None,
            help: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic::new(kind, message).with_level(Level::Warning)
    }

    fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn in_lookup(mut self, lookup: impl Into<SmolStr>) -> Self {
        self.lookup = Some(lookup.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, Level::Error)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Error => f.write_str("error"),
            Level::Warning => f.write_str("warning"),
            Level::Info => f.write_str("info"),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.level, self.kind.name())?;
        match (&self.lookup, self.line) {
            (Some(lookup), Some(line)) => write!(f, " ({lookup}, line {line})")?,
            (Some(lookup), None) => write!(f, " ({lookup})")?,
            (None, Some(line)) => write!(f, " (line {line})")?,
            (None, None) => (),
        }
        write!(f, ": {}", self.message)?;
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

/// A set of diagnostics, in the order they were produced.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSet {
    pub(crate) messages: Vec<Diagnostic>,
    max_to_print: usize,
}

impl DiagnosticSet {
    pub fn new(messages: Vec<Diagnostic>) -> Self {
        DiagnosticSet {
            messages,
            max_to_print: DEFAULT_N_MESSAGES_TO_PRINT,
        }
    }

    /// Set the maximum number of messages written by [`DiagnosticSet::display`].
    pub fn set_max_to_print(&mut self, max: usize) {
        self.max_to_print = max;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.messages.iter()
    }

    /// Return a type that can print the messages, truncated to the current max.
    pub fn display(&self) -> impl Display + '_ {
        DiagnosticDisplayer(self)
    }
}

struct DiagnosticDisplayer<'a>(&'a DiagnosticSet);

impl Display for DiagnosticDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let set = self.0;
        for message in set.messages.iter().take(set.max_to_print) {
            writeln!(f, "{message}")?;
        }
        if let Some(overflow) = set.messages.len().checked_sub(set.max_to_print) {
            if overflow > 0 {
                writeln!(f, "... and {overflow} more")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let diag = Diagnostic::new(DiagnosticKind::PatternTooLong, "11 elements")
            .in_lookup("calt_1")
            .at_line(7);
        assert_eq!(
            diag.to_string(),
            "error[PatternTooLongError] (calt_1, line 7): 11 elements"
        );
        assert!(diag.is_error());
    }

    #[test]
    fn default_levels() {
        assert!(!Diagnostic::new(DiagnosticKind::PartitionExplosion, "").is_error());
        assert!(Diagnostic::new(DiagnosticKind::UndefinedClass, "").is_error());
        assert!(!Diagnostic::warning(DiagnosticKind::Parse, "").is_error());
    }

    #[test]
    fn display_truncates() {
        let mut set = DiagnosticSet::new(
            (0..5)
                .map(|i| Diagnostic::warning(DiagnosticKind::DuplicateRule, format!("dup {i}")))
                .collect(),
        );
        set.set_max_to_print(2);
        let text = set.display().to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with("... and 3 more\n"));
        assert!(!set.has_errors());
    }
}
