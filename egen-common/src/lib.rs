//! Entry-point generator - Common Types and Utilities
//!
//! This crate contains shared types, error definitions, and utilities
//! used across the IR, lowering and driver crates.

pub mod error;
pub mod types;
pub mod source_loc;

pub use error::{CompilerError, Diagnostic, DiagnosticKind, ErrorReporter, Severity};
pub use types::*;
pub use source_loc::{SourceLocation, SourceSpan};
