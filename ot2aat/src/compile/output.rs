//! The result of a compilation

use std::collections::BTreeSet;

use smol_str::SmolStr;

use crate::{
    common::GlyphInterner,
    emit,
    parse::ParsedSource,
    types::LookupKind,
    DiagnosticSet,
};

use super::{error::CompilerError, kerx::KerxTables, lookups::SubtableBody};

/// One lookup, compiled to a morx subtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MorxSubtable {
    pub lookup: SmolStr,
    pub kind: LookupKind,
    pub feature: SmolStr,
    /// The AAT feature `(type, selector)` the subtable is enabled by.
    pub namecode: (u16, u16),
    pub body: SubtableBody,
}

/// The compiled tables, along with everything reported along the way.
#[derive(Debug)]
pub struct Compilation {
    /// The parsed input.
    pub source: ParsedSource,
    /// Subtables in lookup declaration order.
    pub morx: Vec<MorxSubtable>,
    pub kerx: Option<KerxTables>,
    pub diagnostics: DiagnosticSet,
    /// Kinds of lookup that had at least one rule.
    pub(crate) attempted: BTreeSet<LookupKind>,
    /// `true` if there was positioning input that should produce kerx.
    pub(crate) kerx_attempted: bool,
}

impl Compilation {
    pub fn glyphs(&self) -> &GlyphInterner {
        &self.source.glyphs
    }

    /// The morx subtables, as MIF text.
    pub fn morx_text(&self) -> String {
        emit::morx::printer(&self.morx, self.glyphs()).to_string()
    }

    /// The kerx subtables, as ATIF text.
    pub fn kerx_text(&self) -> String {
        match &self.kerx {
            Some(kerx) => emit::kerx::printer(kerx, self.glyphs()).to_string(),
            None => String::new(),
        }
    }

    /// Check that every kind of input produced some output.
    ///
    /// Individual rules and lookups may fail without failing the whole
    /// compilation; this is an error only if nothing of a kind survived.
    pub fn require_output(&self) -> Result<(), CompilerError> {
        for kind in &self.attempted {
            if !self.morx.iter().any(|subtable| subtable.kind == *kind) {
                return Err(CompilerError::EmptySubtableKind { kind: *kind });
            }
        }
        if self.kerx_attempted && self.kerx.is_none() {
            return Err(CompilerError::EmptyKerx);
        }
        Ok(())
    }
}
