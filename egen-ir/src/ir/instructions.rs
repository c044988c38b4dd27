//! IR Instructions
//!
//! Defines all instruction types available in the IR. Terminators live in
//! the same enum and must be the last instruction of their block.

use egen_common::{BlockId, SourceLocation, ValueId};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::ir::IrType;

/// How an instruction uses one of its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// Ends the lifetime of an owned operand
    Consume,
    /// Borrows the operand for the duration of the instruction
    Borrow,
}

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// result = integer_literal ty, value
    IntegerLiteral {
        result: ValueId,
        ty: IrType,
        value: i64,
    },

    /// result = struct ty (elements...)
    Struct {
        result: ValueId,
        ty: IrType,
        elements: Vec<ValueId>,
    },

    /// result = metatype ty
    Metatype {
        result: ValueId,
        ty: IrType,
    },

    /// result = function_ref @function
    FunctionRef {
        result: ValueId,
        function: String,
        ty: IrType,
    },

    /// result = global_addr @global
    GlobalAddr {
        result: ValueId,
        global: String,
        ty: IrType,
    },

    /// result = apply callee(args...)
    Apply {
        result: ValueId,
        callee: ValueId,
        args: Vec<ValueId>,
    },

    /// result = builtin "name"(args...)
    Builtin {
        result: ValueId,
        name: String,
        args: Vec<ValueId>,
    },

    /// result = alloc_stack ty
    AllocStack {
        result: ValueId,
        ty: IrType,
    },

    DeallocStack {
        operand: ValueId,
    },

    /// store value to [init] dest
    Store {
        value: ValueId,
        dest: ValueId,
    },

    /// result = load [take|borrow] source
    Load {
        result: ValueId,
        source: ValueId,
        take: bool,
    },

    /// Ends the lifetime of a value without destroying it
    EndLifetime {
        operand: ValueId,
    },

    DestroyValue {
        operand: ValueId,
    },

    /// result = enum Optional.some(operand)
    OptionalSome {
        result: ValueId,
        operand: ValueId,
        ty: IrType,
    },

    /// Resume on the given execution context
    HopToExecutor {
        executor: ValueId,
    },

    /// Escape point of module-scope storage captured by reference
    MarkFunctionEscape {
        vars: Vec<ValueId>,
    },

    IncrementProfilerCounter {
        function: String,
        index: u32,
    },

    /// Opens a lexical debug scope
    DebugScope {
        location: SourceLocation,
    },

    /// return value
    Return(ValueId),

    /// br target(args...)
    Branch {
        target: BlockId,
        args: Vec<ValueId>,
    },

    /// cond_br condition, true_target, false_target
    CondBranch {
        condition: ValueId,
        true_target: BlockId,
        false_target: BlockId,
    },

    /// try_apply callee(args...), normal normal, error error
    TryApply {
        callee: ValueId,
        args: Vec<ValueId>,
        normal: BlockId,
        error: BlockId,
        /// Out-parameter receiving the error for indirect error results
        error_buffer: Option<ValueId>,
    },

    Unreachable,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Return(_)
                | Instruction::Branch { .. }
                | Instruction::CondBranch { .. }
                | Instruction::TryApply { .. }
                | Instruction::Unreachable
        )
    }

    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instruction::IntegerLiteral { result, .. }
            | Instruction::Struct { result, .. }
            | Instruction::Metatype { result, .. }
            | Instruction::FunctionRef { result, .. }
            | Instruction::GlobalAddr { result, .. }
            | Instruction::Apply { result, .. }
            | Instruction::Builtin { result, .. }
            | Instruction::AllocStack { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::OptionalSome { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Operands in order, each with the role the instruction gives it.
    /// `Consume` only affects owned values; trivial operands are unaffected.
    pub fn operands(&self) -> Vec<(ValueId, OperandRole)> {
        use OperandRole::*;
        match self {
            Instruction::Struct { elements, .. } => elements.iter().map(|v| (*v, Consume)).collect(),
            Instruction::Apply { callee, args, .. } => std::iter::once((*callee, Borrow))
                .chain(args.iter().map(|v| (*v, Borrow)))
                .collect(),
            Instruction::Builtin { args, .. } => args.iter().map(|v| (*v, Borrow)).collect(),
            Instruction::DeallocStack { operand } => vec![(*operand, Borrow)],
            Instruction::Store { value, dest } => vec![(*value, Consume), (*dest, Borrow)],
            Instruction::Load { source, .. } => vec![(*source, Borrow)],
            Instruction::EndLifetime { operand } | Instruction::DestroyValue { operand } => {
                vec![(*operand, Consume)]
            }
            Instruction::OptionalSome { operand, .. } => vec![(*operand, Consume)],
            Instruction::HopToExecutor { executor } => vec![(*executor, Borrow)],
            Instruction::MarkFunctionEscape { vars } => vars.iter().map(|v| (*v, Borrow)).collect(),
            Instruction::Return(value) => vec![(*value, Consume)],
            Instruction::Branch { args, .. } => args.iter().map(|v| (*v, Consume)).collect(),
            Instruction::CondBranch { condition, .. } => vec![(*condition, Borrow)],
            Instruction::TryApply { callee, args, error_buffer, .. } => std::iter::once((*callee, Borrow))
                .chain(args.iter().map(|v| (*v, Borrow)))
                .chain(error_buffer.iter().map(|v| (*v, Borrow)))
                .collect(),
            Instruction::IntegerLiteral { .. }
            | Instruction::Metatype { .. }
            | Instruction::FunctionRef { .. }
            | Instruction::GlobalAddr { .. }
            | Instruction::AllocStack { .. }
            | Instruction::IncrementProfilerCounter { .. }
            | Instruction::DebugScope { .. }
            | Instruction::Unreachable => Vec::new(),
        }
    }

    /// Successor blocks of a terminator, empty for everything else
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Branch { target, .. } => vec![*target],
            Instruction::CondBranch { true_target, false_target, .. } => vec![*true_target, *false_target],
            Instruction::TryApply { normal, error, .. } => vec![*normal, *error],
            _ => Vec::new(),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[ValueId]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "%{value}")?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::IntegerLiteral { result, ty, value } => {
                write!(f, "%{result} = integer_literal ${ty}, {value}")
            }
            Instruction::Struct { result, ty, elements } => {
                write!(f, "%{result} = struct ${ty} (")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Instruction::Metatype { result, ty } => write!(f, "%{result} = metatype ${ty}"),
            Instruction::FunctionRef { result, function, ty } => {
                write!(f, "%{result} = function_ref @{function} : ${ty}")
            }
            Instruction::GlobalAddr { result, global, ty } => {
                write!(f, "%{result} = global_addr @{global} : ${ty}")
            }
            Instruction::Apply { result, callee, args } => {
                write!(f, "%{result} = apply %{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Instruction::Builtin { result, name, args } => {
                write!(f, "%{result} = builtin \"{name}\"(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Instruction::AllocStack { result, ty } => write!(f, "%{result} = alloc_stack ${ty}"),
            Instruction::DeallocStack { operand } => write!(f, "dealloc_stack %{operand}"),
            Instruction::Store { value, dest } => write!(f, "store %{value} to [init] %{dest}"),
            Instruction::Load { result, source, take } => {
                let kind = if *take { "take" } else { "borrow" };
                write!(f, "%{result} = load [{kind}] %{source}")
            }
            Instruction::EndLifetime { operand } => write!(f, "end_lifetime %{operand}"),
            Instruction::DestroyValue { operand } => write!(f, "destroy_value %{operand}"),
            Instruction::OptionalSome { result, operand, ty } => {
                write!(f, "%{result} = enum ${ty}, #Optional.some!enumelt, %{operand}")
            }
            Instruction::HopToExecutor { executor } => write!(f, "hop_to_executor %{executor}"),
            Instruction::MarkFunctionEscape { vars } => {
                write!(f, "mark_function_escape ")?;
                write_list(f, vars)
            }
            Instruction::IncrementProfilerCounter { function, index } => {
                write!(f, "increment_profiler_counter {index}, \"{function}\"")
            }
            Instruction::DebugScope { location } => write!(f, "debug_scope {location}"),
            Instruction::Return(value) => write!(f, "return %{value}"),
            Instruction::Branch { target, args } => {
                write!(f, "br bb{target}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    write_list(f, args)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            Instruction::CondBranch { condition, true_target, false_target } => {
                write!(f, "cond_br %{condition}, bb{true_target}, bb{false_target}")
            }
            Instruction::TryApply { callee, args, normal, error, error_buffer } => {
                write!(f, "try_apply %{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")?;
                if let Some(buffer) = error_buffer {
                    write!(f, " error_indirect %{buffer}")?;
                }
                write!(f, ", normal bb{normal}, error bb{error}")
            }
            Instruction::Unreachable => write!(f, "unreachable"),
        }
    }
}
