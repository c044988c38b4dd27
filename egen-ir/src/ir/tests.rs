//! Unit tests for the IR module

use super::*;
use crate::error::IrError;
use egen_common::EXIT_FUNCTION_NAME;
use pretty_assertions::assert_eq;

fn entry_builder() -> (IrBuilder, u32) {
    let function = Function::new("main".to_string(), vec![], IrType::int32());
    let mut builder = IrBuilder::new(function);
    let entry = builder.create_block();
    builder.emit_block(entry).unwrap();
    (builder, entry)
}

#[test]
fn test_type_triviality() {
    assert!(IrType::int32().is_trivial());
    assert!(!IrType::ErrorExistential.is_trivial());
    assert!(IrType::address_of(IrType::ErrorExistential).is_trivial());
    assert!(!IrType::optional(IrType::ErrorExistential).is_trivial());
    assert!(IrType::Nominal { name: "Code".to_string(), trivial: true }.is_trivial());
}

#[test]
fn test_type_display() {
    assert_eq!(IrType::builtin_int32().to_string(), "Builtin.Int32");
    assert_eq!(
        IrType::function(vec![IrType::int32()], IrType::Never, CallingConvention::Foreign).to_string(),
        "@convention(c) (Int32) -> Never"
    );
    assert_eq!(IrType::address_of(IrType::ErrorExistential).to_string(), "*any Error");
}

#[test]
fn test_terminator_invalidates_insertion_point() {
    let (mut builder, entry) = entry_builder();
    let code = builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    let wrapped = builder.create_struct(IrType::int32(), vec![code]).unwrap();
    assert!(builder.has_valid_insertion_point());

    builder.return_value(wrapped).unwrap();
    assert!(!builder.has_valid_insertion_point());
    assert!(matches!(
        builder.integer_literal(IrType::builtin_int32(), 1),
        Err(IrError::NoInsertionPoint { .. })
    ));
    assert!(matches!(builder.emit_block(entry), Err(IrError::BlockTerminated { .. })));
}

#[test]
fn test_branch_records_edges() {
    let (mut builder, entry) = entry_builder();
    let exit = builder.create_block();
    let code = builder
        .create_block_param(exit, IrType::builtin_int32(), OwnershipKind::None)
        .unwrap();
    let zero = builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    builder.branch(exit, vec![zero]).unwrap();

    let function = builder.function();
    assert_eq!(function.get_block(entry).unwrap().successors, vec![exit]);
    assert_eq!(function.get_block(exit).unwrap().predecessors, vec![entry]);
    assert_eq!(function.get_block(exit).unwrap().params, vec![code]);
    assert_eq!(
        function.value(code).unwrap().def,
        ValueDef::BlockParam { block: exit, index: 0 }
    );
}

#[test]
fn test_erase_block_repairs_edges() {
    let (mut builder, entry) = entry_builder();
    let middle = builder.create_block();
    let exit = builder.create_block();
    builder.branch(middle, vec![]).unwrap();
    builder.emit_block(middle).unwrap();
    builder.branch(exit, vec![]).unwrap();

    let mut function = builder.finish();
    let removed = function.erase_block(middle).unwrap();
    assert_eq!(removed.id, middle);
    assert!(function.get_block(middle).is_none());
    assert!(function.get_block(entry).unwrap().successors.is_empty());
    assert!(function.get_block(exit).unwrap().predecessors.is_empty());
}

#[test]
fn test_erase_entry_block_is_rejected() {
    let (builder, entry) = entry_builder();
    let mut function = builder.finish();
    assert!(matches!(function.erase_block(entry), Err(IrError::EraseEntryBlock { .. })));
}

#[test]
fn test_apply_result_ownership() {
    let (mut builder, _) = entry_builder();
    let producer = Function::declaration(
        "produce_error".to_string(),
        vec![],
        IrType::ErrorExistential,
        CallingConvention::Native,
    );
    let callee = builder.function_ref(&producer).unwrap();
    let error = builder.apply(callee, vec![]).unwrap();

    let info = builder.function().value(error).unwrap();
    assert_eq!(info.ownership, OwnershipKind::Owned);
    assert_eq!(info.ty, IrType::ErrorExistential);
}

#[test]
fn test_load_from_address_yields_object_type() {
    let (mut builder, _) = entry_builder();
    let slot = builder.alloc_stack(IrType::ErrorExistential).unwrap();
    assert!(builder.value_type(slot).unwrap().is_address());

    let loaded = builder.load(slot, true).unwrap();
    assert_eq!(builder.value_type(loaded).unwrap(), &IrType::ErrorExistential);
    assert_eq!(builder.function().value(loaded).unwrap().ownership, OwnershipKind::Owned);
}

#[test]
fn test_non_taking_load_borrows() {
    let (mut builder, _) = entry_builder();
    let slot = builder.alloc_stack(IrType::ErrorExistential).unwrap();
    let borrowed = builder.load(slot, false).unwrap();
    assert_eq!(builder.function().value(borrowed).unwrap().ownership, OwnershipKind::Guaranteed);

    let counter = builder.alloc_stack(IrType::int32()).unwrap();
    let count = builder.load(counter, false).unwrap();
    assert_eq!(builder.function().value(count).unwrap().ownership, OwnershipKind::None);
}

#[test]
fn test_synthesize_exit_declaration() {
    let mut module = Module::new("test".to_string());
    let exit = module.lookup_or_synthesize_exit().unwrap();
    assert_eq!(exit.name, EXIT_FUNCTION_NAME);
    assert!(exit.is_declaration());
    assert!(exit.is_implicit);
    assert_eq!(exit.convention, CallingConvention::Foreign);
    assert_eq!(exit.param_types, vec![IrType::int32()]);
    assert_eq!(exit.result_type, IrType::Never);

    module.lookup_or_synthesize_exit().unwrap();
    assert_eq!(module.functions.len(), 1);
}

#[test]
fn test_existing_exit_with_other_signature_is_rejected() {
    let mut module = Module::new("test".to_string());
    module.add_function(Function::declaration(
        EXIT_FUNCTION_NAME.to_string(),
        vec![IrType::builtin_int32()],
        IrType::EmptyTuple,
        CallingConvention::Foreign,
    ));

    assert!(matches!(
        module.lookup_or_synthesize_exit(),
        Err(IrError::SignatureMismatch { .. })
    ));
}

#[test]
fn test_function_display() {
    let (mut builder, _) = entry_builder();
    let code = builder.integer_literal(IrType::builtin_int32(), 0).unwrap();
    let wrapped = builder.create_struct(IrType::int32(), vec![code]).unwrap();
    builder.return_value(wrapped).unwrap();
    let mut function = builder.finish();
    function.is_bare = true;

    let expected = "define [bare] @main : $() -> Int32 {\n\
                    bb0:\n  \
                    %0 = integer_literal $Builtin.Int32, 0\n  \
                    %1 = struct $Int32 (%0)\n  \
                    return %1\n\
                    }\n";
    assert_eq!(function.to_string(), expected);
}

#[test]
fn test_declare_returns_existing_definition() {
    let mut module = Module::new("test".to_string());
    let mut definition = Function::new(
        "S.main".to_string(),
        vec![IrType::Metatype("S".to_string())],
        IrType::EmptyTuple,
    );
    definition.convention = CallingConvention::Method;
    definition.create_block();
    module.add_function(definition);

    let declaration = Function::declaration(
        "S.main".to_string(),
        vec![IrType::Metatype("S".to_string())],
        IrType::EmptyTuple,
        CallingConvention::Method,
    );
    let found = module.declare(declaration).unwrap();
    assert!(!found.is_declaration());
    assert_eq!(module.functions.len(), 1);
    assert!(module.has_definition("S.main"));
}

#[test]
fn test_module_serializes_to_json() {
    let mut module = Module::new("test".to_string());
    module.lookup_or_synthesize_exit().unwrap();

    let json = serde_json::to_string(&module).unwrap();
    let restored: Module = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, module);
}
