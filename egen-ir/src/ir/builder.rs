//! IR Builder
//!
//! Owns the function under construction and an insertion point. Emitting a
//! terminator records the control-flow edges it creates and invalidates the
//! insertion point; nothing can be emitted until a new block is positioned.

use egen_common::{BlockId, SourceLocation, ValueId};
use log::trace;
use crate::error::IrError;
use crate::ir::{Function, Instruction, IrType, OwnershipKind, ValueDef};

pub struct IrBuilder {
    function: Function,
    insertion_point: Option<BlockId>,
}

impl IrBuilder {
    pub fn new(function: Function) -> Self {
        Self {
            function,
            insertion_point: None,
        }
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn function_mut(&mut self) -> &mut Function {
        &mut self.function
    }

    pub fn finish(self) -> Function {
        self.function
    }

    pub fn create_block(&mut self) -> BlockId {
        self.function.create_block()
    }

    /// Append a parameter to `block`
    pub fn create_block_param(
        &mut self,
        block: BlockId,
        ty: IrType,
        ownership: OwnershipKind,
    ) -> Result<ValueId, IrError> {
        let index = self.function.block(block)?.params.len();
        let value = self.function.add_value(ty, ownership, ValueDef::BlockParam { block, index });
        self.function.block_mut(block)?.params.push(value);
        Ok(value)
    }

    /// Position the builder at the end of `block`
    pub fn emit_block(&mut self, block: BlockId) -> Result<(), IrError> {
        if self.function.block(block)?.has_terminator() {
            return Err(IrError::BlockTerminated { block });
        }
        self.insertion_point = Some(block);
        Ok(())
    }

    pub fn insertion_block(&self) -> Option<BlockId> {
        self.insertion_point
    }

    pub fn has_valid_insertion_point(&self) -> bool {
        self.insertion_point.is_some()
    }

    pub fn value_type(&self, value: ValueId) -> Result<&IrType, IrError> {
        self.function.value_type(value)
    }

    fn current_block(&self) -> Result<BlockId, IrError> {
        self.insertion_point.ok_or_else(|| IrError::NoInsertionPoint {
            function: self.function.name.clone(),
        })
    }

    fn new_result(&mut self, ty: IrType, ownership: OwnershipKind) -> Result<ValueId, IrError> {
        let block = self.current_block()?;
        Ok(self.function.add_value(ty, ownership, ValueDef::Instruction { block }))
    }

    fn emit(&mut self, instr: Instruction) -> Result<(), IrError> {
        let block = self.current_block()?;
        trace!("bb{}: {}", block, instr);
        let successors = instr.successors();
        let is_terminator = instr.is_terminator();
        self.function.block_mut(block)?.add_instruction(instr);
        if is_terminator {
            for successor in successors {
                self.function.add_edge(block, successor)?;
            }
            self.insertion_point = None;
        }
        Ok(())
    }

    pub fn integer_literal(&mut self, ty: IrType, value: i64) -> Result<ValueId, IrError> {
        let result = self.new_result(ty.clone(), OwnershipKind::None)?;
        self.emit(Instruction::IntegerLiteral { result, ty, value })?;
        Ok(result)
    }

    pub fn create_struct(&mut self, ty: IrType, elements: Vec<ValueId>) -> Result<ValueId, IrError> {
        let owns_element = elements.iter().any(|element| {
            self.function
                .value(*element)
                .is_some_and(|info| info.ownership == OwnershipKind::Owned)
        });
        let ownership = if owns_element { OwnershipKind::Owned } else { OwnershipKind::None };
        let result = self.new_result(ty.clone(), ownership)?;
        self.emit(Instruction::Struct { result, ty, elements })?;
        Ok(result)
    }

    pub fn metatype(&mut self, ty: IrType) -> Result<ValueId, IrError> {
        let result = self.new_result(ty.clone(), OwnershipKind::None)?;
        self.emit(Instruction::Metatype { result, ty })?;
        Ok(result)
    }

    pub fn function_ref(&mut self, function: &Function) -> Result<ValueId, IrError> {
        let ty = function.function_type();
        let result = self.new_result(ty.clone(), OwnershipKind::None)?;
        self.emit(Instruction::FunctionRef {
            result,
            function: function.name.clone(),
            ty,
        })?;
        Ok(result)
    }

    pub fn global_addr(&mut self, global: &str, object_type: IrType) -> Result<ValueId, IrError> {
        let ty = IrType::address_of(object_type);
        let result = self.new_result(ty.clone(), OwnershipKind::None)?;
        self.emit(Instruction::GlobalAddr {
            result,
            global: global.to_string(),
            ty,
        })?;
        Ok(result)
    }

    /// Call a non-throwing function value
    pub fn apply(&mut self, callee: ValueId, args: Vec<ValueId>) -> Result<ValueId, IrError> {
        let callee_type = self.function.value_type(callee)?;
        let result_type = callee_type.function_result().cloned().ok_or_else(|| IrError::NotCallable {
            value: callee,
            ty: callee_type.to_string(),
        })?;
        let ownership = OwnershipKind::for_result(&result_type);
        let result = self.new_result(result_type, ownership)?;
        self.emit(Instruction::Apply { result, callee, args })?;
        Ok(result)
    }

    pub fn builtin(&mut self, name: &str, args: Vec<ValueId>, result_type: IrType) -> Result<ValueId, IrError> {
        let ownership = OwnershipKind::for_result(&result_type);
        let result = self.new_result(result_type, ownership)?;
        self.emit(Instruction::Builtin {
            result,
            name: name.to_string(),
            args,
        })?;
        Ok(result)
    }

    pub fn alloc_stack(&mut self, ty: IrType) -> Result<ValueId, IrError> {
        let result = self.new_result(IrType::address_of(ty.clone()), OwnershipKind::None)?;
        self.emit(Instruction::AllocStack { result, ty })?;
        Ok(result)
    }

    pub fn dealloc_stack(&mut self, operand: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::DeallocStack { operand })
    }

    pub fn store(&mut self, value: ValueId, dest: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::Store { value, dest })
    }

    /// A taking load owns its result; otherwise the result borrows the storage
    pub fn load(&mut self, source: ValueId, take: bool) -> Result<ValueId, IrError> {
        let ty = self.function.value_type(source)?.object_type().clone();
        let ownership = match OwnershipKind::for_result(&ty) {
            OwnershipKind::Owned if !take => OwnershipKind::Guaranteed,
            ownership => ownership,
        };
        let result = self.new_result(ty, ownership)?;
        self.emit(Instruction::Load { result, source, take })?;
        Ok(result)
    }

    pub fn end_lifetime(&mut self, operand: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::EndLifetime { operand })
    }

    pub fn destroy_value(&mut self, operand: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::DestroyValue { operand })
    }

    pub fn optional_some(&mut self, operand: ValueId) -> Result<ValueId, IrError> {
        let info = self.function.value(operand).cloned().ok_or_else(|| IrError::ValueNotFound {
            function: self.function.name.clone(),
            value: operand,
        })?;
        let ty = IrType::optional(info.ty);
        let result = self.new_result(ty.clone(), info.ownership)?;
        self.emit(Instruction::OptionalSome { result, operand, ty })?;
        Ok(result)
    }

    pub fn hop_to_executor(&mut self, executor: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::HopToExecutor { executor })
    }

    pub fn mark_function_escape(&mut self, vars: Vec<ValueId>) -> Result<(), IrError> {
        self.emit(Instruction::MarkFunctionEscape { vars })
    }

    pub fn increment_profiler_counter(&mut self, index: u32) -> Result<(), IrError> {
        let function = self.function.name.clone();
        self.emit(Instruction::IncrementProfilerCounter { function, index })
    }

    pub fn debug_scope(&mut self, location: SourceLocation) -> Result<(), IrError> {
        self.emit(Instruction::DebugScope { location })
    }

    pub fn return_value(&mut self, value: ValueId) -> Result<(), IrError> {
        self.emit(Instruction::Return(value))
    }

    pub fn branch(&mut self, target: BlockId, args: Vec<ValueId>) -> Result<(), IrError> {
        self.emit(Instruction::Branch { target, args })
    }

    pub fn cond_branch(
        &mut self,
        condition: ValueId,
        true_target: BlockId,
        false_target: BlockId,
    ) -> Result<(), IrError> {
        self.emit(Instruction::CondBranch { condition, true_target, false_target })
    }

    pub fn try_apply(
        &mut self,
        callee: ValueId,
        args: Vec<ValueId>,
        normal: BlockId,
        error: BlockId,
        error_buffer: Option<ValueId>,
    ) -> Result<(), IrError> {
        self.emit(Instruction::TryApply { callee, args, normal, error, error_buffer })
    }

    pub fn unreachable(&mut self) -> Result<(), IrError> {
        self.emit(Instruction::Unreachable)
    }
}
