//! IR Value table
//!
//! Values are referred to by `ValueId`; the owning function keeps one
//! `ValueInfo` per id recording the type, the ownership tag and where the
//! value is defined.

use egen_common::BlockId;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::ir::IrType;

/// Ownership tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnershipKind {
    /// Must be consumed or explicitly ended exactly once on every path
    Owned,
    /// Borrowed for the duration of its scope
    Guaranteed,
    /// Trivial; no lifetime to end
    None,
}

impl OwnershipKind {
    /// Ownership an instruction result of type `ty` is given by default
    pub fn for_result(ty: &IrType) -> Self {
        if ty.is_trivial() {
            OwnershipKind::None
        } else {
            OwnershipKind::Owned
        }
    }
}

impl fmt::Display for OwnershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipKind::Owned => write!(f, "@owned"),
            OwnershipKind::Guaranteed => write!(f, "@guaranteed"),
            OwnershipKind::None => write!(f, "@none"),
        }
    }
}

/// Definition site of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    /// Parameter `index` of `block`
    BlockParam { block: BlockId, index: usize },
    /// Result of an instruction in `block`
    Instruction { block: BlockId },
}

impl ValueDef {
    pub fn block(&self) -> BlockId {
        match self {
            ValueDef::BlockParam { block, .. } | ValueDef::Instruction { block } => *block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub ty: IrType,
    pub ownership: OwnershipKind,
    pub def: ValueDef,
}
