//! Script model for Kulisse.
//!
//! Splits an NScripter-style script into classified lines (labels, text,
//! `:`-separated command lines), lexes command lines with logos, and builds
//! the label table used by the engine to resolve jumps and to map a global
//! line number back to its label.

/// Diagnostics and ariadne rendering.
pub mod diagnostics;
/// Error types for loading scripts.
pub mod error;
/// Command-line tokenizer.
pub mod lexer;
/// Classified lines and the label table.
pub mod script;

pub use diagnostics::{Counts, Diagnostic, Severity, render_diagnostics};
pub use error::{ScriptLoadError, ScriptLoadResult};
pub use lexer::{LexError, Token, lex_line};
pub use script::{Label, LabelId, Line, LineKind, Script};
