//! Tests for the post-construction verifier

use super::*;
use crate::ir::{CallingConvention, IrBuilder};
use pretty_assertions::assert_eq;

fn builder_with_entry() -> (IrBuilder, BlockId) {
    let function = Function::new("test".to_string(), vec![], IrType::builtin_int32());
    let mut builder = IrBuilder::new(function);
    let entry = builder.create_block();
    builder.emit_block(entry).unwrap();
    (builder, entry)
}

fn return_zero(builder: &mut IrBuilder) {
    let zero = builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    builder.return_value(zero).unwrap();
}

fn make_error(builder: &mut IrBuilder) -> ValueId {
    builder.builtin("make_error", vec![], IrType::ErrorExistential).unwrap()
}

fn kind_of(builder: IrBuilder) -> VerifyErrorKind {
    verify_function(&builder.finish()).unwrap_err().kind
}

#[test]
fn test_valid_function_passes() {
    let (mut builder, _) = builder_with_entry();
    return_zero(&mut builder);
    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_missing_terminator() {
    let (mut builder, entry) = builder_with_entry();
    builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    assert_eq!(kind_of(builder), VerifyErrorKind::MissingTerminator { block: entry });
}

#[test]
fn test_branch_argument_count_mismatch() {
    let (mut builder, entry) = builder_with_entry();
    let exit = builder.create_block();
    builder
        .create_block_param(exit, IrType::builtin_int32(), OwnershipKind::None)
        .unwrap();
    builder.branch(exit, vec![]).unwrap();
    builder.emit_block(exit).unwrap();
    return_zero(&mut builder);

    assert_eq!(
        kind_of(builder),
        VerifyErrorKind::ArgumentCountMismatch {
            block: entry,
            target: exit,
            given: 0,
            expected: 1,
        }
    );
}

#[test]
fn test_return_type_mismatch() {
    let (mut builder, _) = builder_with_entry();
    let code = builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    let wrapped = builder.create_struct(IrType::int32(), vec![code]).unwrap();
    builder.return_value(wrapped).unwrap();

    assert!(matches!(kind_of(builder), VerifyErrorKind::TypeMismatch { .. }));
}

#[test]
fn test_inconsistent_edges() {
    let (mut builder, _) = builder_with_entry();
    let orphan = builder.create_block();
    return_zero(&mut builder);
    builder.emit_block(orphan).unwrap();
    return_zero(&mut builder);

    let mut function = builder.finish();
    function.get_block_mut(orphan).unwrap().predecessors.push(7);
    assert_eq!(
        verify_function(&function).unwrap_err().kind,
        VerifyErrorKind::InconsistentEdges { block: orphan }
    );
}

#[test]
fn test_instruction_after_terminator() {
    let (mut builder, entry) = builder_with_entry();
    return_zero(&mut builder);

    let mut function = builder.finish();
    function.get_block_mut(entry).unwrap().instructions.push(Instruction::Unreachable);
    assert_eq!(
        verify_function(&function).unwrap_err().kind,
        VerifyErrorKind::TerminatorNotLast { block: entry }
    );
}

#[test]
fn test_branch_to_missing_block() {
    let (mut builder, entry) = builder_with_entry();
    builder.unreachable().unwrap();

    let mut function = builder.finish();
    let block = function.get_block_mut(entry).unwrap();
    block.instructions.pop();
    block.instructions.push(Instruction::Branch { target: 9, args: vec![] });
    assert_eq!(
        verify_function(&function).unwrap_err().kind,
        VerifyErrorKind::MissingBlock { block: entry, target: 9 }
    );
}

#[test]
fn test_use_on_path_without_definition() {
    let (mut builder, _) = builder_with_entry();
    let defining = builder.create_block();
    let bypass = builder.create_block();
    let join = builder.create_block();
    let condition = builder.integer_literal(IrType::Builtin { bits: 1 }, 1).unwrap();
    builder.cond_branch(condition, defining, bypass).unwrap();

    builder.emit_block(defining).unwrap();
    let seven = builder.integer_literal(IrType::builtin_int32(), 7).unwrap();
    builder.branch(join, vec![]).unwrap();
    builder.emit_block(bypass).unwrap();
    builder.branch(join, vec![]).unwrap();
    builder.emit_block(join).unwrap();
    builder.return_value(seven).unwrap();

    assert_eq!(kind_of(builder), VerifyErrorKind::UndefinedValue { block: join, value: seven });
}

#[test]
fn test_use_in_dominated_block() {
    let (mut builder, _) = builder_with_entry();
    let left = builder.create_block();
    let right = builder.create_block();
    let seven = builder.integer_literal(IrType::builtin_int32(), 7).unwrap();
    let condition = builder.integer_literal(IrType::Builtin { bits: 1 }, 0).unwrap();
    builder.cond_branch(condition, left, right).unwrap();

    builder.emit_block(left).unwrap();
    builder.return_value(seven).unwrap();
    builder.emit_block(right).unwrap();
    builder.return_value(seven).unwrap();

    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_borrowed_load_needs_no_end() {
    let (mut builder, _) = builder_with_entry();
    let slot = builder.alloc_stack(IrType::ErrorExistential).unwrap();
    let error = make_error(&mut builder);
    builder.store(error, slot).unwrap();
    builder.load(slot, false).unwrap();
    let taken = builder.load(slot, true).unwrap();
    builder.destroy_value(taken).unwrap();
    builder.dealloc_stack(slot).unwrap();
    return_zero(&mut builder);

    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_consuming_a_borrowed_load() {
    let (mut builder, entry) = builder_with_entry();
    let slot = builder.alloc_stack(IrType::ErrorExistential).unwrap();
    let error = make_error(&mut builder);
    builder.store(error, slot).unwrap();
    let borrowed = builder.load(slot, false).unwrap();
    builder.destroy_value(borrowed).unwrap();
    builder.dealloc_stack(slot).unwrap();
    return_zero(&mut builder);

    assert_eq!(kind_of(builder), VerifyErrorKind::ConsumedBorrow { block: entry, value: borrowed });
}

#[test]
fn test_leaked_owned_value() {
    let (mut builder, entry) = builder_with_entry();
    let error = make_error(&mut builder);
    return_zero(&mut builder);

    assert_eq!(kind_of(builder), VerifyErrorKind::LeakedValue { block: entry, value: error });
}

#[test]
fn test_end_lifetime_consumes_owned_value() {
    let (mut builder, _) = builder_with_entry();
    let error = make_error(&mut builder);
    builder.end_lifetime(error).unwrap();
    return_zero(&mut builder);

    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_use_after_consume() {
    let (mut builder, entry) = builder_with_entry();
    let error = make_error(&mut builder);
    builder.end_lifetime(error).unwrap();
    builder.destroy_value(error).unwrap();
    return_zero(&mut builder);

    assert_eq!(kind_of(builder), VerifyErrorKind::UseAfterConsume { block: entry, value: error });
}

#[test]
fn test_double_consume_in_one_instruction() {
    let (mut builder, entry) = builder_with_entry();
    let error = make_error(&mut builder);
    let pair = IrType::Struct {
        name: "Pair".to_string(),
        fields: vec![IrType::ErrorExistential, IrType::ErrorExistential],
    };
    builder.create_struct(pair, vec![error, error]).unwrap();
    builder.unreachable().unwrap();

    assert_eq!(kind_of(builder), VerifyErrorKind::DoubleConsume { block: entry, value: error });
}

#[test]
fn test_unreachable_path_may_leak() {
    let (mut builder, _) = builder_with_entry();
    make_error(&mut builder);
    builder.unreachable().unwrap();

    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_leak_on_one_path_only() {
    let (mut builder, _) = builder_with_entry();
    let error = make_error(&mut builder);
    let condition = builder.integer_literal(IrType::Builtin { bits: 1 }, 1).unwrap();
    let consume = builder.create_block();
    let leak = builder.create_block();
    builder.cond_branch(condition, consume, leak).unwrap();

    builder.emit_block(consume).unwrap();
    builder.end_lifetime(error).unwrap();
    return_zero(&mut builder);

    builder.emit_block(leak).unwrap();
    return_zero(&mut builder);

    assert_eq!(kind_of(builder), VerifyErrorKind::LeakedValue { block: leak, value: error });
}

#[test]
fn test_owned_value_forwarded_through_block_param() {
    let (mut builder, _) = builder_with_entry();
    let error = make_error(&mut builder);
    let handler = builder.create_block();
    let param = builder
        .create_block_param(handler, IrType::ErrorExistential, OwnershipKind::Owned)
        .unwrap();
    builder.branch(handler, vec![error]).unwrap();

    builder.emit_block(handler).unwrap();
    builder.end_lifetime(param).unwrap();
    return_zero(&mut builder);

    assert!(verify_function(&builder.finish()).is_ok());
}

#[test]
fn test_throwing_callee_requires_try_apply() {
    let (mut builder, entry) = builder_with_entry();
    let mut callee = Function::declaration(
        "may_throw".to_string(),
        vec![],
        IrType::EmptyTuple,
        CallingConvention::Native,
    );
    callee.error_type = Some(IrType::ErrorExistential);
    let callee_ref = builder.function_ref(&callee).unwrap();
    builder.apply(callee_ref, vec![]).unwrap();
    return_zero(&mut builder);

    assert_eq!(
        kind_of(builder),
        VerifyErrorKind::ThrowingApply { block: entry, value: callee_ref }
    );
}

#[test]
fn test_verify_error_converts_to_internal_error() {
    let function = Function::new("empty".to_string(), vec![], IrType::EmptyTuple);
    let err: CompilerError = verify_function(&function).unwrap_err().into();
    assert!(err.is_internal());
    assert_eq!(
        err,
        CompilerError::VerificationFailed {
            function: "empty".to_string(),
            message: "function has no entry block".to_string(),
        }
    );
}
