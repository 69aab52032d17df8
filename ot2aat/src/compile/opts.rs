//! Options used during compilation

use smol_str::SmolStr;

const DEFAULT_N_MESSAGES_TO_PRINT: usize = 100;

/// The longest context pattern the AAT context scanner can follow.
pub const MAX_PATTERN_LEN: usize = 10;

/// The most glyphs one insertion action can insert.
pub const MAX_INSERTION_GLYPHS: usize = 31;

const DEFAULT_MAX_MATCH_CLASSES: usize = 1024;
const DEFAULT_MAX_STATES: usize = 1024;

/// The AAT feature type and selector used for unknown feature tags.
const FALLBACK_FEATURE: (u16, u16) = (8, 1);

/// Options for configuring compilation behaviour.
#[derive(Clone, Debug)]
pub struct Opts {
    pub(crate) max_n_errors: usize,
    pub(crate) compile_morx: bool,
    pub(crate) compile_kerx: bool,
    pub(crate) max_pattern_len: usize,
    pub(crate) max_insertion_glyphs: usize,
    pub(crate) max_match_classes: usize,
    pub(crate) max_states: usize,
    pub(crate) scripts: Vec<SmolStr>,
    pub(crate) fallback_feature: (u16, u16),
    pub(crate) parallel: bool,
}

impl Opts {
    /// Create a new default set of options
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify the number of errors to print when printing a [`DiagnosticSet`].
    ///
    /// To suppress errors, pass `0`. For 'all errors', pass `usize::MAX`.
    ///
    /// [`DiagnosticSet`]: crate::DiagnosticSet
    pub fn max_error_messages(mut self, max_n_errors: usize) -> Self {
        self.max_n_errors = max_n_errors;
        self
    }

    /// Specify whether or not we should compile morx subtables. Default is `true`.
    pub fn compile_morx(mut self, flag: bool) -> Self {
        self.compile_morx = flag;
        self
    }

    /// Specify whether or not we should compile kerx subtables. Default is `true`.
    pub fn compile_kerx(mut self, flag: bool) -> Self {
        self.compile_kerx = flag;
        self
    }

    /// The longest contextual or reorder pattern accepted. Default is 10.
    pub fn max_pattern_len(mut self, len: usize) -> Self {
        self.max_pattern_len = len;
        self
    }

    /// The most match classes one subtable may use before it is dropped.
    pub fn max_match_classes(mut self, n: usize) -> Self {
        self.max_match_classes = n;
        self
    }

    /// The most states one subtable may use before it is dropped.
    pub fn max_states(mut self, n: usize) -> Self {
        self.max_states = n;
        self
    }

    /// Only compile lookups tagged with one of these scripts.
    ///
    /// Lookups with no script header are always compiled. An empty list (the
    /// default) disables filtering.
    pub fn scripts(mut self, scripts: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    /// The AAT feature type and selector used for feature tags with no
    /// known AAT equivalent.
    pub fn fallback_feature(mut self, feature_type: u16, selector: u16) -> Self {
        self.fallback_feature = (feature_type, selector);
        self
    }

    /// If `true`, and the `rayon` feature is enabled, lookups are compiled
    /// in parallel. Output is the same either way.
    pub fn parallel(mut self, flag: bool) -> Self {
        self.parallel = flag;
        self
    }

    pub(crate) fn wants_script(&self, scripts: &[SmolStr]) -> bool {
        self.scripts.is_empty()
            || scripts.is_empty()
            || scripts.iter().any(|script| self.scripts.contains(script))
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            max_n_errors: DEFAULT_N_MESSAGES_TO_PRINT,
            compile_morx: true,
            compile_kerx: true,
            max_pattern_len: MAX_PATTERN_LEN,
            max_insertion_glyphs: MAX_INSERTION_GLYPHS,
            max_match_classes: DEFAULT_MAX_MATCH_CLASSES,
            max_states: DEFAULT_MAX_STATES,
            scripts: Vec::new(),
            fallback_feature: FALLBACK_FEATURE,
            parallel: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_filter() {
        let opts = Opts::new();
        assert!(opts.wants_script(&["thai".into()]));

        let opts = Opts::new().scripts(["thai"]);
        assert!(opts.wants_script(&["thai".into(), "latn".into()]));
        assert!(!opts.wants_script(&["latn".into()]));
        assert!(opts.wants_script(&[]));
    }
}
