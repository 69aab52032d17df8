//! Compiling OpenType-style layout rules into AAT `morx` and `kerx` tables.
//!
//! Rules are parsed into a small intermediate representation, each lookup
//! is compiled into a state machine, and the result is written out as the
//! text formats understood by Apple's font tools: MIF for `morx` and ATIF
//! for `kerx`.

pub mod common;
pub mod compile;
mod diagnostic;
pub mod emit;
pub mod parse;
pub mod types;


pub use common::{GlyphClass, GlyphId, GlyphInterner, GlyphName};
pub use compile::{Compilation, Compiler, CompilerError, Opts};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSet, Level};
pub use parse::{parse_source, ParsedSource};
