//! The main public API for compilation

use std::{
    collections::{BTreeSet, HashSet},
    path::PathBuf,
};

use smol_str::SmolStr;

use crate::{
    parse::{parse_source, ParsedSource},
    types::{Lookup, LookupKind, LookupRules, SubstTarget},
    Diagnostic, DiagnosticSet,
};

use super::{
    error::CompilerError,
    features::aat_feature,
    kerx,
    lookups::{build_lookup, SubtableBody},
    output::{Compilation, MorxSubtable},
    session::Session,
    Opts,
};

enum Source {
    Text(String),
    Path(PathBuf),
}

/// A builder-style entry point for the compiler.
///
/// ```no_run
/// # use ot2aat::Compiler;
/// let compilation = Compiler::from_path("path/to/rules.txt").compile().unwrap();
/// print!("{}", compilation.morx_text());
/// ```
pub struct Compiler {
    source: Source,
    opts: Opts,
}

impl Compiler {
    /// Configure a compilation run over rule text held in memory.
    pub fn new(text: impl Into<String>) -> Self {
        Compiler {
            source: Source::Text(text.into()),
            opts: Default::default(),
        }
    }

    /// Configure a compilation run over a rule file on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Compiler {
            source: Source::Path(path.into()),
            opts: Default::default(),
        }
    }

    /// Specify additional compiler options.
    pub fn with_opts(mut self, opts: Opts) -> Self {
        self.opts = opts;
        self
    }

    /// Parse and compile this source.
    ///
    /// Problems with individual rules or lookups do not fail the compilation;
    /// they are collected in [`Compilation::diagnostics`]. Use
    /// [`Compilation::require_output`] to check that something came out.
    pub fn compile(self) -> Result<Compilation, CompilerError> {
        let text = match self.source {
            Source::Text(text) => text,
            Source::Path(path) => std::fs::read_to_string(&path)
                .map_err(|inner| CompilerError::SourceLoad { path, inner })?,
        };
        let (source, diagnostics) = parse_source(&text);
        log::debug!(
            "parsed {} glyphs, {} classes, {} lookups",
            source.glyphs.len(),
            source.classes.len(),
            source.lookups.len()
        );
        Ok(compile_parsed(source, diagnostics, &self.opts))
    }
}

/// Compile an already-parsed source.
pub fn compile_parsed(
    source: ParsedSource,
    mut diagnostics: Vec<Diagnostic>,
    opts: &Opts,
) -> Compilation {
    let mut morx = Vec::new();
    let mut attempted = BTreeSet::new();
    let mut kerx_tables = None;
    let mut kerx_attempted = false;

    {
        let selected = select_lookups(&source, opts);
        let mut session = Session::new(&source, opts);
        for lookup in &selected {
            session.register_lookup(lookup);
        }

        for (lookup, (body, lookup_diagnostics)) in build_all(&session, &selected) {
            diagnostics.extend(lookup_diagnostics);
            if lookup.rule_lines > 0 {
                attempted.insert(lookup.kind());
            }
            let Some(body) = body else {
                continue;
            };
            morx.push(MorxSubtable {
                lookup: lookup.name.clone(),
                kind: lookup.kind(),
                feature: lookup.feature.clone(),
                namecode: namecode(&lookup.feature, opts),
                body,
            });
        }

        if opts.compile_kerx {
            let positioning = &source.positioning;
            kerx_attempted = positioning.has_attachments() || !positioning.distances.is_empty();
            let (tables, kerx_diagnostics) = kerx::build(&session);
            diagnostics.extend(kerx_diagnostics);
            kerx_tables = tables;
        }
    }

    log::info!(
        "compiled {} morx subtables{}",
        morx.len(),
        if kerx_tables.is_some() { " and kerx" } else { "" }
    );
    let mut diagnostics = DiagnosticSet::new(diagnostics);
    diagnostics.set_max_to_print(opts.max_n_errors);
    Compilation {
        source,
        morx,
        kerx: kerx_tables,
        diagnostics,
        attempted,
        kerx_attempted,
    }
}

/// The lookups to compile, in declaration order.
///
/// A `@simple` lookup that only exists to be referenced from a contextual
/// rule (`=> lookup NAME`) and has no feature of its own is not emitted.
fn select_lookups<'a>(source: &'a ParsedSource, opts: &Opts) -> Vec<&'a Lookup> {
    if !opts.compile_morx {
        return Vec::new();
    }
    let referenced = source
        .lookups
        .iter()
        .filter_map(|lookup| match &lookup.rules {
            LookupRules::Contextual(rules) => Some(rules),
            _ => None,
        })
        .flatten()
        .filter_map(|rule| match &rule.item.target {
            SubstTarget::Lookup(name) => Some(name.clone()),
            SubstTarget::Element(_) => None,
        })
        .collect::<HashSet<SmolStr>>();

    source
        .lookups
        .iter()
        .filter(|lookup| {
            if !opts.wants_script(&lookup.scripts) {
                log::debug!("skipping lookup '{}': script not selected", lookup.name);
                return false;
            }
            let auxiliary = lookup.kind() == LookupKind::Simple
                && !lookup.has_own_feature
                && referenced.contains(&lookup.name);
            if auxiliary {
                log::debug!("lookup '{}' is only used by reference", lookup.name);
            }
            !auxiliary
        })
        .collect()
}

type Built<'a> = (&'a Lookup, (Option<SubtableBody>, Vec<Diagnostic>));

#[cfg(feature = "rayon")]
fn build_all<'a>(session: &Session, lookups: &[&'a Lookup]) -> Vec<Built<'a>> {
    use rayon::prelude::*;
    if session.opts.parallel {
        return lookups
            .par_iter()
            .map(|lookup| (*lookup, build_lookup(session, lookup)))
            .collect();
    }
    lookups
        .iter()
        .map(|lookup| (*lookup, build_lookup(session, lookup)))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn build_all<'a>(session: &Session, lookups: &[&'a Lookup]) -> Vec<Built<'a>> {
    lookups
        .iter()
        .map(|lookup| (*lookup, build_lookup(session, lookup)))
        .collect()
}

fn namecode(feature: &str, opts: &Opts) -> (u16, u16) {
    aat_feature(feature).unwrap_or_else(|| {
        log::info!(
            "no AAT equivalent for feature '{feature}', using {:?}",
            opts.fallback_feature
        );
        opts.fallback_feature
    })
}
