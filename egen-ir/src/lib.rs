//! Entry-point generator - Intermediate Representation
//!
//! This crate defines the ownership-aware IR the entry-point emitter builds,
//! the builder used to construct it, and the verifier that checks a finished
//! function before it is handed to later phases.

pub mod error;
pub mod ir;
pub mod verify;

pub use error::IrError;
pub use ir::{
    BasicBlock, CallingConvention, Function, Instruction, IrBuilder, IrType, Linkage, Module,
    OperandRole, OwnershipKind, Profiler, ValueDef, ValueInfo,
};
pub use verify::{verify_function, verify_module, VerifyError};
pub use egen_common::{BlockId, ValueId};
