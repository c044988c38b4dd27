//! Ownership-aware IR
//!
//! ## Architecture
//!
//! - `types` - Type system (IrType, CallingConvention)
//! - `values` - Value table entries and ownership tags
//! - `instructions` - IR instructions and terminators
//! - `blocks` - Basic blocks with block parameters
//! - `function` - Functions owning an arena of blocks
//! - `module` - Modules and external declarations
//! - `builder` - Insertion-point based construction

pub use self::types::{IrType, CallingConvention};
pub use self::values::{OwnershipKind, ValueDef, ValueInfo};
pub use self::instructions::{Instruction, OperandRole};
pub use self::blocks::BasicBlock;
pub use self::function::{Function, Profiler};
pub use self::module::{Module, Linkage};
pub use self::builder::IrBuilder;

mod types;
mod values;
mod instructions;
mod blocks;
mod function;
mod module;
mod builder;

#[cfg(test)]
mod tests;
