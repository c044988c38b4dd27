//! Post-construction verifier
//!
//! A pure check over a finished function, run after construction and never
//! interleaved with it. Two passes:
//!
//! - structure: every block ends in exactly one terminator, branch targets
//!   exist and receive the right number and types of arguments, edge lists
//!   match the terminators, every use is dominated by its definition;
//! - ownership: every owned value is consumed exactly once along every path
//!   from its definition to a function exit. Paths ending in `unreachable`
//!   may leave values unconsumed since the process never continues there.

use std::collections::{HashMap, HashSet, VecDeque};
use egen_common::{BlockId, CompilerError, ValueId};
use thiserror::Error;
use crate::ir::{Function, Instruction, IrType, Module, OperandRole, OwnershipKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifyErrorKind {
    #[error("function has no entry block")]
    NoEntryBlock,

    #[error("entry block has predecessors")]
    EntryHasPredecessors,

    #[error("entry block parameters do not match the function signature")]
    EntryParamMismatch,

    #[error("block bb{block} appears more than once")]
    DuplicateBlock { block: BlockId },

    #[error("block bb{block} has no terminator")]
    MissingTerminator { block: BlockId },

    #[error("block bb{block} has an instruction after its terminator")]
    TerminatorNotLast { block: BlockId },

    #[error("block bb{block} branches to missing block bb{target}")]
    MissingBlock { block: BlockId, target: BlockId },

    #[error("branch from bb{block} to bb{target} passes {given} arguments, expected {expected}")]
    ArgumentCountMismatch {
        block: BlockId,
        target: BlockId,
        given: usize,
        expected: usize,
    },

    #[error("value %{value} has type {found}, expected {expected}")]
    TypeMismatch {
        value: ValueId,
        found: String,
        expected: String,
    },

    #[error("edge lists of bb{block} do not match the terminators")]
    InconsistentEdges { block: BlockId },

    #[error("value %{value} defined more than once")]
    DuplicateDefinition { value: ValueId },

    #[error("use of undefined value %{value} in bb{block}")]
    UndefinedValue { block: BlockId, value: ValueId },

    #[error("borrowed value %{value} is consumed in bb{block}")]
    ConsumedBorrow { block: BlockId, value: ValueId },

    #[error("call in bb{block} passes {given} arguments, callee expects {expected}")]
    CallArity {
        block: BlockId,
        given: usize,
        expected: usize,
    },

    #[error("callee %{value} in bb{block} is not a function")]
    NotCallable { block: BlockId, value: ValueId },

    #[error("throwing callee %{value} in bb{block} must be called with try_apply")]
    ThrowingApply { block: BlockId, value: ValueId },

    #[error("owned value %{value} is not consumed on a path ending in bb{block}")]
    LeakedValue { block: BlockId, value: ValueId },

    #[error("owned value %{value} is consumed more than once in bb{block}")]
    DoubleConsume { block: BlockId, value: ValueId },

    #[error("value %{value} used after being consumed, in bb{block}")]
    UseAfterConsume { block: BlockId, value: ValueId },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("in '{function}': {kind}")]
pub struct VerifyError {
    pub function: String,
    pub kind: VerifyErrorKind,
}

impl From<VerifyError> for CompilerError {
    fn from(err: VerifyError) -> Self {
        CompilerError::VerificationFailed {
            function: err.function,
            message: err.kind.to_string(),
        }
    }
}

pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for function in module.functions.iter().filter(|f| !f.is_declaration()) {
        verify_function(function)?;
    }
    Ok(())
}

pub fn verify_function(function: &Function) -> Result<(), VerifyError> {
    let wrap = |kind| VerifyError {
        function: function.name.clone(),
        kind,
    };
    let defs = check_structure(function).map_err(wrap)?;
    check_ownership(function, &defs).map_err(wrap)?;
    Ok(())
}

/// Where each value is defined: block and index of the first instruction
/// that may use it
type DefPositions = HashMap<ValueId, (BlockId, usize)>;

fn check_structure(function: &Function) -> Result<DefPositions, VerifyErrorKind> {
    let entry = function.entry_block().ok_or(VerifyErrorKind::NoEntryBlock)?;
    if entry.has_predecessors() {
        return Err(VerifyErrorKind::EntryHasPredecessors);
    }
    let entry_types: Vec<&IrType> = entry
        .params
        .iter()
        .filter_map(|param| function.value(*param).map(|info| &info.ty))
        .collect();
    if entry_types.len() != function.param_types.len()
        || entry_types.iter().zip(&function.param_types).any(|(found, expected)| *found != expected)
    {
        return Err(VerifyErrorKind::EntryParamMismatch);
    }

    let mut seen_blocks = HashSet::new();
    let mut defs = DefPositions::new();
    for block in &function.blocks {
        if !seen_blocks.insert(block.id) {
            return Err(VerifyErrorKind::DuplicateBlock { block: block.id });
        }
        for param in &block.params {
            if defs.insert(*param, (block.id, 0)).is_some() {
                return Err(VerifyErrorKind::DuplicateDefinition { value: *param });
            }
        }
        for (index, instr) in block.instructions.iter().enumerate() {
            if let Some(result) = instr.result() {
                if defs.insert(result, (block.id, index + 1)).is_some() {
                    return Err(VerifyErrorKind::DuplicateDefinition { value: result });
                }
            }
        }
    }

    let dom_sets = dominators(function, entry.id);
    let mut expected_preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for block in &function.blocks {
        let Some(last) = block.instructions.last() else {
            return Err(VerifyErrorKind::MissingTerminator { block: block.id });
        };
        if !last.is_terminator() {
            return Err(VerifyErrorKind::MissingTerminator { block: block.id });
        }
        if block.instructions[..block.instructions.len() - 1]
            .iter()
            .any(Instruction::is_terminator)
        {
            return Err(VerifyErrorKind::TerminatorNotLast { block: block.id });
        }

        for (index, instr) in block.instructions.iter().enumerate() {
            for (operand, role) in instr.operands() {
                let defined = match defs.get(&operand) {
                    Some((def_block, position)) if *def_block == block.id => *position <= index,
                    Some((def_block, _)) => dominates(&dom_sets, *def_block, block.id),
                    None => false,
                };
                if !defined {
                    return Err(VerifyErrorKind::UndefinedValue {
                        block: block.id,
                        value: operand,
                    });
                }
                let borrowed = function
                    .value(operand)
                    .is_some_and(|info| info.ownership == OwnershipKind::Guaranteed);
                if borrowed && role == OperandRole::Consume {
                    return Err(VerifyErrorKind::ConsumedBorrow {
                        block: block.id,
                        value: operand,
                    });
                }
            }
            check_call(function, block.id, instr)?;
        }

        let mut successors = last.successors();
        for target in &successors {
            if seen_blocks.get(target).is_none() {
                return Err(VerifyErrorKind::MissingBlock {
                    block: block.id,
                    target: *target,
                });
            }
            expected_preds.entry(*target).or_default().push(block.id);
        }
        check_terminator(function, block.id, last)?;

        let mut recorded = block.successors.clone();
        successors.sort_unstable();
        recorded.sort_unstable();
        if successors != recorded {
            return Err(VerifyErrorKind::InconsistentEdges { block: block.id });
        }
    }

    for block in &function.blocks {
        let mut expected = expected_preds.remove(&block.id).unwrap_or_default();
        let mut recorded = block.predecessors.clone();
        expected.sort_unstable();
        recorded.sort_unstable();
        if expected != recorded {
            return Err(VerifyErrorKind::InconsistentEdges { block: block.id });
        }
    }

    Ok(defs)
}

/// Dominator sets of the blocks reachable from `entry`, following the
/// terminators rather than the recorded edge lists
fn dominators(function: &Function, entry: BlockId) -> HashMap<BlockId, HashSet<BlockId>> {
    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    let mut order = vec![entry];
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(id) = queue.pop_front() {
        let Some(block) = function.get_block(id) else {
            continue;
        };
        let successors = block.instructions.last().map(Instruction::successors).unwrap_or_default();
        for target in successors {
            if function.get_block(target).is_none() {
                continue;
            }
            preds.entry(target).or_default().push(id);
            if seen.insert(target) {
                order.push(target);
                queue.push_back(target);
            }
        }
    }

    let mut doms: HashMap<BlockId, HashSet<BlockId>> = order.iter().map(|id| (*id, seen.clone())).collect();
    doms.insert(entry, HashSet::from([entry]));
    let mut changed = true;
    while changed {
        changed = false;
        for id in order.iter().skip(1) {
            let mut update: Option<HashSet<BlockId>> = None;
            for pred in preds.get(id).into_iter().flatten() {
                let Some(pred_doms) = doms.get(pred) else {
                    continue;
                };
                update = Some(match update {
                    None => pred_doms.clone(),
                    Some(current) => current.intersection(pred_doms).copied().collect(),
                });
            }
            let mut update = update.unwrap_or_default();
            update.insert(*id);
            if doms.get(id) != Some(&update) {
                doms.insert(*id, update);
                changed = true;
            }
        }
    }
    doms
}

/// Unreachable blocks are dominated by every block
fn dominates(dominators: &HashMap<BlockId, HashSet<BlockId>>, def: BlockId, user: BlockId) -> bool {
    dominators.get(&user).map_or(true, |doms| doms.contains(&def))
}

fn type_of(function: &Function, value: ValueId) -> Option<&IrType> {
    function.value(value).map(|info| &info.ty)
}

fn expect_type(function: &Function, value: ValueId, expected: &IrType) -> Result<(), VerifyErrorKind> {
    match type_of(function, value) {
        Some(found) if found == expected => Ok(()),
        found => Err(VerifyErrorKind::TypeMismatch {
            value,
            found: found.map(ToString::to_string).unwrap_or_default(),
            expected: expected.to_string(),
        }),
    }
}

/// Check a call's callee and argument count; returns the callee type
fn check_callee<'f>(
    function: &'f Function,
    block: BlockId,
    callee: ValueId,
    args: &[ValueId],
) -> Result<&'f IrType, VerifyErrorKind> {
    let callee_type = type_of(function, callee)
        .filter(|ty| matches!(ty, IrType::Function { .. }))
        .ok_or(VerifyErrorKind::NotCallable { block, value: callee })?;
    let params = callee_type.function_params().unwrap_or_default();
    if params.len() != args.len() {
        return Err(VerifyErrorKind::CallArity {
            block,
            given: args.len(),
            expected: params.len(),
        });
    }
    for (arg, param) in args.iter().zip(params) {
        expect_type(function, *arg, param)?;
    }
    Ok(callee_type)
}

fn check_call(function: &Function, block: BlockId, instr: &Instruction) -> Result<(), VerifyErrorKind> {
    if let Instruction::Apply { callee, args, .. } = instr {
        let callee_type = check_callee(function, block, *callee, args)?;
        if callee_type.function_error().is_some() {
            return Err(VerifyErrorKind::ThrowingApply { block, value: *callee });
        }
    }
    Ok(())
}

fn check_block_args(
    function: &Function,
    block: BlockId,
    target: BlockId,
    arg_types: &[IrType],
) -> Result<(), VerifyErrorKind> {
    let params = function
        .get_block(target)
        .map(|b| b.params.as_slice())
        .unwrap_or_default();
    if params.len() != arg_types.len() {
        return Err(VerifyErrorKind::ArgumentCountMismatch {
            block,
            target,
            given: arg_types.len(),
            expected: params.len(),
        });
    }
    for (param, arg_type) in params.iter().zip(arg_types) {
        expect_type(function, *param, arg_type)?;
    }
    Ok(())
}

fn check_terminator(function: &Function, block: BlockId, instr: &Instruction) -> Result<(), VerifyErrorKind> {
    match instr {
        Instruction::Return(value) => expect_type(function, *value, &function.result_type),
        Instruction::Branch { target, args } => {
            let arg_types: Vec<IrType> = args
                .iter()
                .map(|arg| type_of(function, *arg).cloned().unwrap_or(IrType::Never))
                .collect();
            check_block_args(function, block, *target, &arg_types)
        }
        Instruction::CondBranch { true_target, false_target, .. } => {
            check_block_args(function, block, *true_target, &[])?;
            check_block_args(function, block, *false_target, &[])
        }
        Instruction::TryApply { callee, args, normal, error, error_buffer } => {
            let callee_type = check_callee(function, block, *callee, args)?;
            let result = callee_type.function_result().cloned().unwrap_or(IrType::EmptyTuple);
            check_block_args(function, block, *normal, &[result])?;
            let error_type = callee_type.function_error().cloned().unwrap_or(IrType::ErrorExistential);
            match error_buffer {
                Some(buffer) => {
                    expect_type(function, *buffer, &IrType::address_of(error_type))?;
                    check_block_args(function, block, *error, &[])
                }
                None => check_block_args(function, block, *error, &[error_type]),
            }
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Liveness {
    Live,
    Consumed,
}

fn check_ownership(function: &Function, defs: &DefPositions) -> Result<(), VerifyErrorKind> {
    let mut owned: Vec<ValueId> = defs
        .keys()
        .copied()
        .filter(|value| {
            function
                .value(*value)
                .is_some_and(|info| info.ownership == OwnershipKind::Owned)
        })
        .collect();
    owned.sort_unstable();

    for value in owned {
        let (block, start) = defs[&value];
        check_value_lifetime(function, value, block, start)?;
    }
    Ok(())
}

fn check_value_lifetime(
    function: &Function,
    value: ValueId,
    def_block: BlockId,
    def_start: usize,
) -> Result<(), VerifyErrorKind> {
    let mut worklist = VecDeque::from([(def_block, def_start, Liveness::Live)]);
    let mut visited = HashSet::new();

    while let Some((block_id, start, mut state)) = worklist.pop_front() {
        let Some(block) = function.get_block(block_id) else {
            continue;
        };
        for instr in &block.instructions[start..] {
            let mut consumes = 0;
            for (operand, role) in instr.operands() {
                if operand != value {
                    continue;
                }
                if state == Liveness::Consumed {
                    return Err(VerifyErrorKind::UseAfterConsume { block: block_id, value });
                }
                if role == OperandRole::Consume {
                    consumes += 1;
                }
            }
            if consumes > 1 {
                return Err(VerifyErrorKind::DoubleConsume { block: block_id, value });
            }
            if consumes == 1 {
                state = Liveness::Consumed;
            }
        }

        match block.terminator() {
            Some(Instruction::Return(_)) if state == Liveness::Live => {
                return Err(VerifyErrorKind::LeakedValue { block: block_id, value });
            }
            Some(terminator) => {
                for successor in terminator.successors() {
                    if visited.insert((successor, state)) {
                        worklist.push_back((successor, 0, state));
                    }
                }
            }
            None => {}
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
