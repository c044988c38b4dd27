//! Basic Block Management
//!
//! A block is a straight-line instruction sequence with a single entry,
//! optional block parameters, and exactly one terminator once complete.

use egen_common::{BlockId, ValueId};
use serde::{Deserialize, Serialize};
use crate::ir::Instruction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Values supplied by each predecessor's branch
    pub params: Vec<ValueId>,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            params: Vec::new(),
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions.last().is_some_and(Instruction::is_terminator)
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|instr| instr.is_terminator())
    }

    pub fn has_predecessors(&self) -> bool {
        !self.predecessors.is_empty()
    }
}
