//! Entry-point generator - Lowering
//!
//! This crate turns the top-level code of a source file into the program
//! entry point:
//! - Top-level lowering: visits module-scope declarations in order and
//!   diagnoses code that can never run
//! - Escape marking: records where module storage captured by reference
//!   becomes reachable from other code
//! - Main invocation: calls a user-defined `main` and maps its outcome to
//!   an exit code
//! - Entry point assembly: builds `main` (and `async_Main`) with a single
//!   epilogue for normal and error exits

pub mod ast;
pub mod cleanup;
pub mod collaborator;
pub mod context;
pub mod entry_point;
pub mod escape;
pub mod main_call;
pub mod top_level;

pub use ast::{Decl, DeclKind, Element, ElementKind, Expr, MainDecl, SourceFile, Stmt};
pub use cleanup::{Cleanup, CleanupStack, JumpDest};
pub use collaborator::{BasicLowering, LoweringCollaborator, RValue};
pub use context::LoweringContext;
pub use entry_point::{EmitOptions, EntryDescriptor, EntryKind, EntryPointEmitter, EntrySignature};
pub use top_level::TopLevelStatementLowerer;
