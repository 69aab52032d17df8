//! Error types related to compilation

use std::path::PathBuf;

use crate::types::LookupKind;

/// An error reported by the compiler
///
/// These are structural failures; problems with individual rules are
/// reported as [`Diagnostic`](crate::Diagnostic)s instead.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum CompilerError {
    #[error("could not read '{path}': '{inner}'")]
    SourceLoad {
        path: PathBuf,
        inner: std::io::Error,
    },
    #[error("{kind} lookups were given but none produced a subtable")]
    EmptySubtableKind { kind: LookupKind },
    #[error("positioning records were given but no kerx subtable was produced")]
    EmptyKerx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_compiler_error_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CompilerError>();
    }
}
