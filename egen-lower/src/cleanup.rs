//! Cleanup scopes
//!
//! Release actions are kept on a LIFO stack. A scope remembers the stack
//! depth at which it was opened; closing it pops everything above that
//! depth, emitting the actions only while the insertion point is valid.
//! Jumps out of a scope (throws) emit the actions between the current depth
//! and the destination's depth without popping them, since the fallthrough
//! path still owns them.

use egen_common::{BlockId, ValueId};
use egen_ir::{IrBuilder, IrError};
use log::trace;

/// One release action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    DestroyValue(ValueId),
    EndLifetime(ValueId),
    DeallocStack(ValueId),
}

impl Cleanup {
    fn emit(&self, builder: &mut IrBuilder) -> Result<(), IrError> {
        trace!("  Emitting cleanup {:?}", self);
        match *self {
            Cleanup::DestroyValue(value) => builder.destroy_value(value),
            Cleanup::EndLifetime(value) => builder.end_lifetime(value),
            Cleanup::DeallocStack(slot) => builder.dealloc_stack(slot),
        }
    }
}

/// A branch target together with the cleanup depth it expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpDest {
    pub block: BlockId,
    pub depth: usize,
}

/// Marker returned by `open_scope`, consumed by `close_scope`
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct ScopeToken {
    depth: usize,
}

#[derive(Debug, Default)]
pub struct CleanupStack {
    cleanups: Vec<Cleanup>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.cleanups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty()
    }

    pub fn push(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    pub fn open_scope(&self) -> ScopeToken {
        ScopeToken { depth: self.depth() }
    }

    /// Pop the scope's cleanups, emitting them on the fallthrough path
    pub fn close_scope(&mut self, builder: &mut IrBuilder, scope: ScopeToken) -> Result<(), IrError> {
        while self.cleanups.len() > scope.depth {
            let Some(cleanup) = self.cleanups.pop() else {
                break;
            };
            if builder.has_valid_insertion_point() {
                cleanup.emit(builder)?;
            }
        }
        Ok(())
    }

    /// Emit, innermost first, every cleanup above `depth` without popping
    pub fn emit_cleanups_to(&self, builder: &mut IrBuilder, depth: usize) -> Result<(), IrError> {
        for cleanup in self.cleanups[depth.min(self.cleanups.len())..].iter().rev() {
            cleanup.emit(builder)?;
        }
        Ok(())
    }

    /// Emit every pending cleanup for an abnormal exit from the function
    pub fn emit_cleanups_for_unwind(&self, builder: &mut IrBuilder) -> Result<(), IrError> {
        self.emit_cleanups_to(builder, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egen_ir::{Function, Instruction, IrType};
    use pretty_assertions::assert_eq;

    fn builder() -> IrBuilder {
        let mut builder = IrBuilder::new(Function::new("f".to_string(), vec![], IrType::EmptyTuple));
        let entry = builder.create_block();
        builder.emit_block(entry).unwrap();
        builder
    }

    fn instructions(builder: &IrBuilder) -> Vec<Instruction> {
        builder.function().blocks[0].instructions.clone()
    }

    #[test]
    fn test_close_scope_emits_in_reverse_order() {
        let mut builder = builder();
        let slot = builder.alloc_stack(IrType::ErrorExistential).unwrap();
        let error = builder.builtin("make_error", vec![], IrType::ErrorExistential).unwrap();

        let mut cleanups = CleanupStack::new();
        let scope = cleanups.open_scope();
        cleanups.push(Cleanup::DeallocStack(slot));
        cleanups.push(Cleanup::DestroyValue(error));
        cleanups.close_scope(&mut builder, scope).unwrap();

        assert!(cleanups.is_empty());
        let emitted = instructions(&builder);
        assert_eq!(emitted[2], Instruction::DestroyValue { operand: error });
        assert_eq!(emitted[3], Instruction::DeallocStack { operand: slot });
    }

    #[test]
    fn test_close_scope_without_insertion_point_only_pops() {
        let mut builder = builder();
        let error = builder.builtin("make_error", vec![], IrType::ErrorExistential).unwrap();
        builder.unreachable().unwrap();

        let mut cleanups = CleanupStack::new();
        let scope = cleanups.open_scope();
        cleanups.push(Cleanup::DestroyValue(error));
        cleanups.close_scope(&mut builder, scope).unwrap();

        assert!(cleanups.is_empty());
        assert_eq!(instructions(&builder).len(), 2);
    }

    #[test]
    fn test_emit_cleanups_to_keeps_outer_and_pending() {
        let mut builder = builder();
        let outer = builder.builtin("make_error", vec![], IrType::ErrorExistential).unwrap();
        let inner = builder.builtin("make_error", vec![], IrType::ErrorExistential).unwrap();

        let mut cleanups = CleanupStack::new();
        cleanups.push(Cleanup::DestroyValue(outer));
        let depth = cleanups.depth();
        cleanups.push(Cleanup::EndLifetime(inner));
        cleanups.emit_cleanups_to(&mut builder, depth).unwrap();

        assert_eq!(cleanups.depth(), 2);
        let emitted = instructions(&builder);
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[2], Instruction::EndLifetime { operand: inner });
    }
}
