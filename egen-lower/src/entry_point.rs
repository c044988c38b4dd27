//! Entry point assembly
//!
//! Produces the function the process loader starts in. Top-level code and
//! the call of a user `main` are lowered into one function whose normal and
//! error paths converge in a single epilogue:
//!
//! ```text
//! bb0(argc, argv):            // synchronous entry
//!   ... top-level code ...    // throws branch to bb1
//!   br bbN(0)
//! bb1(%error : @owned any Error):
//!   builtin "error_in_main"(%error)
//!   end_lifetime %error
//!   br bbN(1)
//! bbN(%code):
//!   return %code              // or: apply exit(%code); unreachable
//! ```
//!
//! The rethrow block `bb1` is erased when nothing throws. Asynchronous entry
//! points run the same body in `async_Main`, started from `main` by a
//! thread-start sequence.

use egen_common::{
    CompilerError, ErrorReporter, ASYNC_ENTRY_POINT_NAME, ENTRY_POINT_NAME,
};
use egen_ir::{verify_function, CallingConvention, Function, IrBuilder, IrType, Linkage, Module, OwnershipKind, Profiler};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use crate::ast::SourceFile;
use crate::cleanup::JumpDest;
use crate::collaborator::LoweringCollaborator;
use crate::context::LoweringContext;
use crate::main_call::{self, ERROR_IN_MAIN_BUILTIN};
use crate::top_level::TopLevelStatementLowerer;

/// Runtime routine that runs the main executor's queue forever
pub const DRAIN_MAIN_QUEUE: &str = "async_main_drain_queue";

/// Builtin enqueueing the asynchronous entry function as the first task
pub const START_ASYNC_MAIN_BUILTIN: &str = "start_async_main";

/// Execution model of the program entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Returns the exit code to the process loader
    Synchronous,
    /// Runs on the main executor and leaves through `exit`
    Asynchronous,
}

/// Lowered signature of the process entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySignature {
    pub argc: IrType,
    pub argv: IrType,
    pub result: IrType,
}

impl Default for EntrySignature {
    fn default() -> Self {
        Self {
            argc: IrType::int32(),
            argv: IrType::RawPointer,
            result: IrType::int32(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDescriptor {
    pub kind: EntryKind,
    pub signature: EntrySignature,
}

impl EntryDescriptor {
    pub fn synchronous() -> Self {
        Self {
            kind: EntryKind::Synchronous,
            signature: EntrySignature::default(),
        }
    }

    pub fn asynchronous() -> Self {
        Self {
            kind: EntryKind::Asynchronous,
            signature: EntrySignature::default(),
        }
    }
}

/// Options controlling entry point emission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Attach a profiler and count executions of each top-level code block
    pub profile: bool,
}

pub struct EntryPointEmitter<'a> {
    module: &'a mut Module,
    reporter: &'a mut ErrorReporter,
    options: EmitOptions,
}

impl<'a> EntryPointEmitter<'a> {
    pub fn new(module: &'a mut Module, reporter: &'a mut ErrorReporter, options: EmitOptions) -> Self {
        Self { module, reporter, options }
    }

    /// Build the entry point of `source` and add it to the module.
    /// Fails with an internal error if the module already has one.
    pub fn emit_entry_point(
        &mut self,
        source: &SourceFile,
        descriptor: &EntryDescriptor,
        collaborator: &mut dyn LoweringCollaborator,
    ) -> Result<(), CompilerError> {
        if self.module.has_definition(ENTRY_POINT_NAME) || self.module.has_definition(ASYNC_ENTRY_POINT_NAME) {
            return Err(CompilerError::internal(format!(
                "entry point of module '{}' was already emitted",
                self.module.name
            )));
        }
        info!("Emitting {:?} entry point for '{}'", descriptor.kind, source.name);

        let signature = &descriptor.signature;
        let mut entry = Function::new(
            ENTRY_POINT_NAME.to_string(),
            vec![signature.argc.clone(), signature.argv.clone()],
            signature.result.clone(),
        );
        entry.is_bare = true;

        let (thread_start, mut top_level) = match descriptor.kind {
            EntryKind::Synchronous => (None, entry),
            EntryKind::Asynchronous => {
                let mut async_main = Function::new(ASYNC_ENTRY_POINT_NAME.to_string(), vec![], IrType::EmptyTuple);
                async_main.is_async = true;
                async_main.is_bare = true;
                // Only reachable through the thread start
                async_main.linkage = Linkage::Internal;
                let thread_start = self.emit_async_main_thread_start(entry, &async_main)?;
                (Some(thread_start), async_main)
            }
        };
        top_level.emitting_top_level_code = true;
        if self.options.profile {
            top_level.profiler = Some(Profiler::default());
        }

        let mut ctx = LoweringContext::new(top_level, self.module, self.reporter);
        let result = emit_top_level_body(&mut ctx, source, descriptor, collaborator);
        let top_level = ctx.finish();
        result?;

        debug!("lowered top-level function:\n{}", top_level);
        verify_function(&top_level)?;

        if let Some(thread_start) = thread_start {
            self.module.add_function(thread_start);
        }
        self.module.add_function(top_level);
        Ok(())
    }

    /// Body of the synchronous `main` of an asynchronous program: start
    /// `async_main` as a task and run the main executor until `exit`
    fn emit_async_main_thread_start(&mut self, entry: Function, async_main: &Function) -> Result<Function, CompilerError> {
        let drain = self
            .module
            .get_or_declare(DRAIN_MAIN_QUEUE, vec![], IrType::Never, CallingConvention::Foreign)?
            .clone();

        let mut builder = IrBuilder::new(entry);
        let block = builder.create_block();
        let param_types = builder.function().param_types.clone();
        for ty in param_types {
            let ownership = OwnershipKind::for_result(&ty);
            builder.create_block_param(block, ty, ownership)?;
        }
        builder.emit_block(block)?;

        let async_ref = builder.function_ref(async_main)?;
        builder.builtin(START_ASYNC_MAIN_BUILTIN, vec![async_ref], IrType::EmptyTuple)?;
        let drain_ref = builder.function_ref(&drain)?;
        builder.apply(drain_ref, vec![])?;
        builder.unreachable()?;

        let function = builder.finish();
        verify_function(&function)?;
        Ok(function)
    }
}

fn emit_top_level_body(
    ctx: &mut LoweringContext<'_>,
    source: &SourceFile,
    descriptor: &EntryDescriptor,
    collaborator: &mut dyn LoweringCollaborator,
) -> Result<(), CompilerError> {
    let kind = descriptor.kind;
    let entry = ctx.builder.create_block();

    let rethrow = ctx.builder.create_block();
    ctx.builder
        .create_block_param(rethrow, IrType::ErrorExistential, OwnershipKind::Owned)?;
    ctx.set_throw_dest(JumpDest {
        block: rethrow,
        depth: ctx.cleanups.depth(),
    });

    match kind {
        EntryKind::Asynchronous => {
            ctx.builder.emit_block(entry)?;
            // Already running on the main executor
            let executor = collaborator.resolve_execution_context(ctx)?;
            let expected = ctx.builder.optional_some(executor)?;
            ctx.set_expected_executor(expected);
        }
        EntryKind::Synchronous => {
            let param_types = ctx.function().param_types.clone();
            for ty in param_types {
                let ownership = OwnershipKind::for_result(&ty);
                ctx.builder.create_block_param(entry, ty, ownership)?;
            }
            ctx.builder.emit_block(entry)?;
        }
    }

    let scope = ctx.cleanups.open_scope();
    TopLevelStatementLowerer::new(ctx, collaborator).lower_source_file(source)?;
    ctx.cleanups.close_scope(&mut ctx.builder, scope)?;
    ctx.stop_emitting_top_level_code();

    if let Some(main) = &source.main {
        if ctx.builder.has_valid_insertion_point() {
            main_call::emit_call_to_main(ctx, main, kind)?;
        }
    }

    let exit_type = main_call::exit_code_type(ctx, kind)?;
    let mut exit_code = None;
    if ctx.builder.has_valid_insertion_point() {
        exit_code = Some(main_call::emit_exit_code(ctx, 0, &exit_type)?);
    }

    ctx.take_throw_dest();
    let rethrow_used = ctx.function().block(rethrow)?.has_predecessors();
    if !rethrow_used {
        debug!("Erasing unused rethrow block bb{}", rethrow);
        ctx.builder.function_mut().erase_block(rethrow)?;
    } else {
        let epilogue = ctx.builder.create_block();
        if let Some(code) = exit_code {
            ctx.builder.branch(epilogue, vec![code])?;
        }
        let code = ctx
            .builder
            .create_block_param(epilogue, exit_type.clone(), OwnershipKind::for_result(&exit_type))?;

        ctx.builder.emit_block(rethrow)?;
        let error = ctx.function().block(rethrow)?.params[0];
        ctx.builder.builtin(ERROR_IN_MAIN_BUILTIN, vec![error], IrType::EmptyTuple)?;
        // The process is about to exit; no destruction needed
        ctx.builder.end_lifetime(error)?;
        ctx.cleanups.emit_cleanups_for_unwind(&mut ctx.builder)?;
        let one = main_call::emit_exit_code(ctx, 1, &exit_type)?;
        ctx.builder.branch(epilogue, vec![one])?;

        ctx.builder.emit_block(epilogue)?;
        exit_code = Some(code);
    }

    if ctx.builder.has_valid_insertion_point() {
        let code = exit_code.ok_or_else(|| CompilerError::internal("missing exit code in the epilogue"))?;
        main_call::emit_exit(ctx, code, kind)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "entry_point_tests.rs"]
mod tests;
