//! Invocation of a user-defined `main`
//!
//! The call is emitted at the current insertion point. Both outcomes meet
//! in one exit block taking the raw 32-bit exit code, which either returns
//! it (synchronous entry) or passes it to the external `exit` routine
//! (asynchronous entry).

use egen_common::{CompilerError, ValueId};
use egen_ir::{CallingConvention, Function, IrType, OwnershipKind};
use log::debug;
use crate::ast::{ErrorConvention, MainDecl};
use crate::context::LoweringContext;
use crate::entry_point::EntryKind;

/// Runtime entry point for errors of a statically known type
pub const ERROR_IN_MAIN_TYPED: &str = "error_in_main_typed";

/// Builtin reporting an error that escaped the program
pub const ERROR_IN_MAIN_BUILTIN: &str = "error_in_main";

/// Whether `ty` can carry a process exit status
fn is_exit_code_type(ty: &IrType) -> bool {
    match ty {
        IrType::Builtin { bits: 32 } => true,
        IrType::Struct { fields, .. } => matches!(fields.as_slice(), [IrType::Builtin { bits: 32 }]),
        _ => false,
    }
}

/// The type the exit code must have when it leaves the function
pub fn exit_code_type(ctx: &mut LoweringContext<'_>, kind: EntryKind) -> Result<IrType, CompilerError> {
    match kind {
        EntryKind::Synchronous => {
            let result = &ctx.function().result_type;
            if !is_exit_code_type(result) {
                return Err(CompilerError::internal(format!(
                    "entry point '{}' has no resolvable exit code result type (found '{}')",
                    ctx.function().name,
                    result
                )));
            }
            Ok(result.clone())
        }
        EntryKind::Asynchronous => {
            let exit = ctx.module.lookup_or_synthesize_exit()?;
            match exit.param_types.as_slice() {
                [code] if is_exit_code_type(code) => Ok(code.clone()),
                _ => Err(CompilerError::internal(format!(
                    "'{}' does not take an exit code",
                    exit.name
                ))),
            }
        }
    }
}

/// Materialize `value` as an exit code of type `ty`
pub fn emit_exit_code(ctx: &mut LoweringContext<'_>, value: i64, ty: &IrType) -> Result<ValueId, CompilerError> {
    let raw = ctx.builder.integer_literal(IrType::builtin_int32(), value)?;
    wrap_exit_code(ctx, raw, ty)
}

fn wrap_exit_code(ctx: &mut LoweringContext<'_>, code: ValueId, ty: &IrType) -> Result<ValueId, CompilerError> {
    if ctx.builder.value_type(code)? == ty {
        return Ok(code);
    }
    Ok(ctx.builder.create_struct(ty.clone(), vec![code])?)
}

/// Leave the program with `code`: return it, or hand it to `exit`
pub fn emit_exit(ctx: &mut LoweringContext<'_>, code: ValueId, kind: EntryKind) -> Result<(), CompilerError> {
    let ty = exit_code_type(ctx, kind)?;
    let code = wrap_exit_code(ctx, code, &ty)?;
    match kind {
        EntryKind::Synchronous => ctx.builder.return_value(code)?,
        EntryKind::Asynchronous => {
            let exit = ctx.module.lookup_or_synthesize_exit()?.clone();
            let exit_ref = ctx.builder.function_ref(&exit)?;
            ctx.builder.apply(exit_ref, vec![code])?;
            ctx.builder.unreachable()?;
        }
    }
    Ok(())
}

/// The external declaration `main` is lowered to
fn main_declaration(main: &MainDecl) -> Function {
    let mut declaration = Function::declaration(
        main.symbol.clone(),
        vec![IrType::Metatype(main.enclosing_type.clone())],
        IrType::EmptyTuple,
        CallingConvention::Method,
    );
    if main.throws {
        declaration.error_type = Some(main.error_type.clone());
    }
    declaration.is_async = main.is_async;
    declaration
}

/// Emit the call of `main` and its exit paths. Leaves no insertion point.
pub fn emit_call_to_main(ctx: &mut LoweringContext<'_>, main: &MainDecl, kind: EntryKind) -> Result<(), CompilerError> {
    if main.is_async != (kind == EntryKind::Asynchronous) {
        return Err(CompilerError::internal(format!(
            "'{}' does not match the {:?} entry point",
            main.symbol, kind
        )));
    }
    let entry_block = ctx
        .builder
        .insertion_block()
        .ok_or_else(|| CompilerError::internal("no insertion point for the call to main"))?;
    debug!("Emitting call to '{}' in bb{}", main.symbol, entry_block);

    let main_function = ctx.module.declare(main_declaration(main))?.clone();
    let metatype = ctx.builder.metatype(IrType::Metatype(main.enclosing_type.clone()))?;
    let main_ref = ctx.builder.function_ref(&main_function)?;

    let exit_block = ctx.builder.create_block();
    let exit_code = ctx
        .builder
        .create_block_param(exit_block, IrType::builtin_int32(), OwnershipKind::None)?;
    ctx.builder.emit_block(exit_block)?;
    emit_exit(ctx, exit_code, kind)?;

    let Some(error_type) = main_function.error_type.clone() else {
        ctx.builder.emit_block(entry_block)?;
        ctx.builder.apply(main_ref, vec![metatype])?;
        let zero = ctx.builder.integer_literal(IrType::builtin_int32(), 0)?;
        ctx.builder.branch(exit_block, vec![zero])?;
        return Ok(());
    };

    let error_buffer = match main.error_convention {
        ErrorConvention::Direct => None,
        ErrorConvention::Indirect => {
            ctx.builder.emit_block(entry_block)?;
            Some(ctx.builder.alloc_stack(error_type.clone())?)
        }
    };

    let success_block = ctx.builder.create_block();
    ctx.builder
        .create_block_param(success_block, IrType::EmptyTuple, OwnershipKind::None)?;
    ctx.builder.emit_block(success_block)?;
    if let Some(buffer) = error_buffer {
        ctx.builder.dealloc_stack(buffer)?;
    }
    let zero = ctx.builder.integer_literal(IrType::builtin_int32(), 0)?;
    ctx.builder.branch(exit_block, vec![zero])?;

    let failure_block = ctx.builder.create_block();
    let error = match error_buffer {
        Some(buffer) => buffer,
        None => ctx.builder.create_block_param(
            failure_block,
            error_type.clone(),
            OwnershipKind::for_result(&error_type),
        )?,
    };
    ctx.builder.emit_block(failure_block)?;
    emit_error_in_main(ctx, error, &error_type)?;
    ctx.builder.unreachable()?;

    ctx.builder.emit_block(entry_block)?;
    ctx.builder
        .try_apply(main_ref, vec![metatype], success_block, failure_block, error_buffer)?;
    Ok(())
}

/// Report the error `main` failed with
fn emit_error_in_main(ctx: &mut LoweringContext<'_>, error: ValueId, error_type: &IrType) -> Result<(), CompilerError> {
    let error_is_address = ctx.builder.value_type(error)?.is_address();

    if error_type.is_error_existential() {
        let error = if error_is_address {
            ctx.builder.load(error, true)?
        } else {
            error
        };
        ctx.builder.builtin(ERROR_IN_MAIN_BUILTIN, vec![error], IrType::EmptyTuple)?;
        return Ok(());
    }

    // Typed errors are passed to the runtime indirectly
    let error = if error_is_address {
        error
    } else {
        let slot = ctx.builder.alloc_stack(error_type.clone())?;
        ctx.builder.store(error, slot)?;
        slot
    };
    let entry = ctx
        .module
        .get_or_declare(
            ERROR_IN_MAIN_TYPED,
            vec![IrType::address_of(error_type.clone())],
            IrType::Never,
            CallingConvention::Native,
        )?
        .clone();
    let entry_ref = ctx.builder.function_ref(&entry)?;
    ctx.builder.apply(entry_ref, vec![error])?;
    Ok(())
}

#[cfg(test)]
#[path = "main_call_tests.rs"]
mod tests;
