//! Per-function lowering state
//!
//! `LoweringContext` is handed to every component and collaborator that
//! emits into the function under construction. It owns the builder and the
//! cleanup stack and borrows the module and the diagnostic sink.

use std::collections::HashMap;
use egen_common::{CompilerError, DeclId, DiagnosticKind, ErrorReporter, SourceSpan, ValueId};
use egen_ir::{Function, IrBuilder, IrType, Module};
use log::debug;
use crate::cleanup::{CleanupStack, JumpDest};

pub struct LoweringContext<'a> {
    pub builder: IrBuilder,
    pub module: &'a mut Module,
    pub cleanups: CleanupStack,
    reporter: &'a mut ErrorReporter,
    /// Storage (address-typed) or value (value-typed) of each lowered variable
    var_locs: HashMap<DeclId, ValueId>,
    throw_dest: Option<JumpDest>,
}

impl<'a> LoweringContext<'a> {
    pub fn new(function: Function, module: &'a mut Module, reporter: &'a mut ErrorReporter) -> Self {
        Self {
            builder: IrBuilder::new(function),
            module,
            cleanups: CleanupStack::new(),
            reporter,
            var_locs: HashMap::new(),
            throw_dest: None,
        }
    }

    pub fn function(&self) -> &Function {
        self.builder.function()
    }

    pub fn var_loc(&self, decl: DeclId) -> Option<ValueId> {
        self.var_locs.get(&decl).copied()
    }

    pub fn set_var_loc(&mut self, decl: DeclId, value: ValueId) {
        self.var_locs.insert(decl, value);
    }

    /// Whether the recorded location of `decl` is a storage address
    pub fn is_address_location(&self, decl: DeclId) -> bool {
        self.var_loc(decl)
            .and_then(|value| self.builder.value_type(value).ok())
            .is_some_and(IrType::is_address)
    }

    pub fn throw_dest(&self) -> Option<JumpDest> {
        self.throw_dest
    }

    pub fn set_throw_dest(&mut self, dest: JumpDest) {
        self.throw_dest = Some(dest);
    }

    pub fn take_throw_dest(&mut self) -> Option<JumpDest> {
        self.throw_dest.take()
    }

    /// Run the cleanups between here and the throw destination, then branch
    /// to it carrying `error`
    pub fn emit_throw(&mut self, error: ValueId) -> Result<(), CompilerError> {
        let dest = self
            .throw_dest
            .ok_or_else(|| CompilerError::internal("throw outside of a throwing context"))?;
        self.cleanups.emit_cleanups_to(&mut self.builder, dest.depth)?;
        self.builder.branch(dest.block, vec![error])?;
        Ok(())
    }

    pub fn expected_executor(&self) -> Option<ValueId> {
        self.builder.function().expected_executor
    }

    pub fn set_expected_executor(&mut self, executor: ValueId) {
        self.builder.function_mut().expected_executor = Some(executor);
    }

    pub fn is_emitting_top_level_code(&self) -> bool {
        self.builder.function().emitting_top_level_code
    }

    pub fn stop_emitting_top_level_code(&mut self) {
        self.builder.function_mut().emitting_top_level_code = false;
    }

    /// Allocate the next coverage counter, if the function is profiled
    pub fn next_profiler_counter(&mut self) -> Option<u32> {
        self.builder
            .function_mut()
            .profiler
            .as_mut()
            .map(|profiler| profiler.next_counter())
    }

    pub fn diagnose(&mut self, span: SourceSpan, kind: DiagnosticKind) {
        debug!("Diagnosing {:?} at {}", kind, span);
        self.reporter.diagnose(span, kind);
    }

    /// Hand back the finished function, no longer marked as emitting
    pub fn finish(mut self) -> Function {
        self.stop_emitting_top_level_code();
        self.builder.finish()
    }
}
