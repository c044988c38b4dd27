//! Function Definitions
//!
//! A function owns an arena of basic blocks addressed by stable ids and a
//! value table. The first block in the arena is the entry block.

use egen_common::{BlockId, ValueId};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::IrError;
use crate::ir::{BasicBlock, CallingConvention, IrType, Linkage, OwnershipKind, ValueDef, ValueInfo};

/// Coverage counters attached to a function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profiler {
    pub counters: u32,
}

impl Profiler {
    pub fn next_counter(&mut self) -> u32 {
        let index = self.counters;
        self.counters += 1;
        index
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub param_types: Vec<IrType>,
    pub result_type: IrType,
    pub error_type: Option<IrType>,
    pub convention: CallingConvention,
    pub linkage: Linkage,
    pub blocks: Vec<BasicBlock>,
    /// Indexed by `ValueId`
    pub values: Vec<ValueInfo>,
    next_block_id: BlockId,

    pub is_external: bool,
    /// Compiler-synthesized declaration with no source counterpart
    pub is_implicit: bool,
    /// No implicit argument or self conventions
    pub is_bare: bool,
    pub is_async: bool,

    /// Set while the top-level code emitter owns this function
    pub emitting_top_level_code: bool,
    pub expected_executor: Option<ValueId>,
    pub profiler: Option<Profiler>,
}

impl Function {
    pub fn new(name: String, param_types: Vec<IrType>, result_type: IrType) -> Self {
        Self {
            name,
            param_types,
            result_type,
            error_type: None,
            convention: CallingConvention::Native,
            linkage: Linkage::External,
            blocks: Vec::new(),
            values: Vec::new(),
            next_block_id: 0,
            is_external: false,
            is_implicit: false,
            is_bare: false,
            is_async: false,
            emitting_top_level_code: false,
            expected_executor: None,
            profiler: None,
        }
    }

    /// External declaration without a body
    pub fn declaration(
        name: String,
        param_types: Vec<IrType>,
        result_type: IrType,
        convention: CallingConvention,
    ) -> Self {
        let mut function = Self::new(name, param_types, result_type);
        function.convention = convention;
        function.is_external = true;
        function
    }

    pub fn is_declaration(&self) -> bool {
        self.is_external && self.blocks.is_empty()
    }

    pub fn function_type(&self) -> IrType {
        IrType::Function {
            params: self.param_types.clone(),
            result: Box::new(self.result_type.clone()),
            error: self.error_type.clone().map(Box::new),
            convention: self.convention,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn add_value(&mut self, ty: IrType, ownership: OwnershipKind, def: ValueDef) -> ValueId {
        let id = self.values.len() as ValueId;
        self.values.push(ValueInfo { ty, ownership, def });
        id
    }

    pub fn value(&self, id: ValueId) -> Option<&ValueInfo> {
        self.values.get(id as usize)
    }

    pub fn value_type(&self, id: ValueId) -> Result<&IrType, IrError> {
        self.value(id).map(|info| &info.ty).ok_or_else(|| IrError::ValueNotFound {
            function: self.name.clone(),
            value: id,
        })
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn block(&self, id: BlockId) -> Result<&BasicBlock, IrError> {
        self.get_block(id).ok_or_else(|| IrError::BlockNotFound {
            function: self.name.clone(),
            block: id,
        })
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock, IrError> {
        let function = self.name.clone();
        self.get_block_mut(id)
            .ok_or(IrError::BlockNotFound { function, block: id })
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Record a control-flow edge in both directions
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<(), IrError> {
        self.block_mut(to)?.predecessors.push(from);
        self.block_mut(from)?.successors.push(to);
        Ok(())
    }

    /// Remove a block from the arena, dropping every edge that mentions it
    pub fn erase_block(&mut self, id: BlockId) -> Result<BasicBlock, IrError> {
        if self.entry_block().is_some_and(|entry| entry.id == id) {
            return Err(IrError::EraseEntryBlock { function: self.name.clone() });
        }
        let position = self.blocks.iter().position(|b| b.id == id).ok_or_else(|| {
            IrError::BlockNotFound {
                function: self.name.clone(),
                block: id,
            }
        })?;
        let removed = self.blocks.remove(position);
        for block in &mut self.blocks {
            block.predecessors.retain(|pred| *pred != id);
            block.successors.retain(|succ| *succ != id);
        }
        Ok(removed)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{keyword} ")?;
        if self.linkage == Linkage::Internal {
            write!(f, "[internal] ")?;
        }
        if self.is_bare {
            write!(f, "[bare] ")?;
        }
        if self.is_async {
            write!(f, "[async] ")?;
        }
        write!(f, "@{} : ${}", self.name, self.function_type())?;
        if self.is_declaration() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for block in &self.blocks {
            write!(f, "bb{}", block.id)?;
            if !block.params.is_empty() {
                write!(f, "(")?;
                for (i, param) in block.params.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    match self.value(*param) {
                        Some(info) => write!(f, "%{param} : {} ${}", info.ownership, info.ty)?,
                        None => write!(f, "%{param}")?,
                    }
                }
                write!(f, ")")?;
            }
            writeln!(f, ":")?;
            for instr in &block.instructions {
                writeln!(f, "  {instr}")?;
            }
        }
        writeln!(f, "}}")
    }
}
