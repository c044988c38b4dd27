//! Tests for top-level statement lowering

use super::*;
use crate::ast::{Expr, FunctionDecl, PatternEntry, Stmt, VarDecl};
use crate::collaborator::BasicLowering;
use egen_common::{DeclId, ErrorReporter, SourceLocation, SourceSpan, ValueId};
use egen_ir::{Function, Instruction, IrType, Module, Profiler};
use pretty_assertions::assert_eq;

fn try_lower(file: &SourceFile, profile: bool) -> Result<(Function, ErrorReporter), CompilerError> {
    let mut module = Module::new("test".to_string());
    let mut reporter = ErrorReporter::new();
    let mut function = Function::new("main".to_string(), vec![], IrType::EmptyTuple);
    function.emitting_top_level_code = true;
    if profile {
        function.profiler = Some(Profiler::default());
    }

    let function = {
        let mut ctx = LoweringContext::new(function, &mut module, &mut reporter);
        let entry = ctx.builder.create_block();
        ctx.builder.emit_block(entry)?;
        let mut collaborator = BasicLowering::new();
        TopLevelStatementLowerer::new(&mut ctx, &mut collaborator).lower_source_file(file)?;
        ctx.finish()
    };
    Ok((function, reporter))
}

fn lower(file: &SourceFile) -> (Function, ErrorReporter) {
    try_lower(file, false).unwrap()
}

fn int(value: i64) -> Expr {
    Expr::IntegerLiteral { value, ty: IrType::int32() }
}

fn call(name: &str) -> Element {
    Element::expr(Expr::call(name, vec![], IrType::EmptyTuple))
}

fn exit_call() -> Element {
    Element::stmt(Stmt::Expr(Expr::call("exit", vec![int(0)], IrType::Never)))
}

fn at_line(line: u32) -> SourceSpan {
    SourceSpan::from_location(SourceLocation::new("main.src", line, 1))
}

fn code(id: DeclId, elements: Vec<Element>) -> Decl {
    Decl::new(id, DeclKind::TopLevelCode { elements })
}

fn global(id: DeclId, name: &str) -> Decl {
    Decl::new(
        id,
        DeclKind::Var(VarDecl {
            name: name.to_string(),
            ty: IrType::int32(),
            mutable: true,
            init: Some(int(0)),
        }),
    )
}

fn constant(id: DeclId, name: &str) -> Decl {
    Decl::new(
        id,
        DeclKind::Var(VarDecl {
            name: name.to_string(),
            ty: IrType::int32(),
            mutable: false,
            init: Some(int(1)),
        }),
    )
}

fn initializer(id: DeclId, captures: Vec<DeclId>) -> Decl {
    Decl::new(
        id,
        DeclKind::PatternBinding(PatternBindingDecl {
            entries: vec![PatternEntry {
                var: id,
                name: format!("field{}", id),
                ty: IrType::int32(),
                mutable: true,
                init: Some(int(0)),
                captures,
                local_context: false,
            }],
            is_static: false,
        }),
    )
}

fn method(id: DeclId, captures: Vec<DeclId>) -> Decl {
    Decl::new(
        id,
        DeclKind::Function(FunctionDecl {
            name: format!("method{}", id),
            captures,
            local_context: false,
        }),
    )
}

fn structure(id: DeclId, members: Vec<Decl>) -> Decl {
    Decl::new(
        id,
        DeclKind::Nominal {
            name: "Config".to_string(),
            kind: NominalKind::Struct,
            members,
        },
    )
}

fn extension(id: DeclId, is_object_model_bridge: bool, members: Vec<Decl>) -> Decl {
    Decl::new(
        id,
        DeclKind::Extension {
            extended: "Widget".to_string(),
            is_object_model_bridge,
            members,
        },
    )
}

fn callees(function: &Function) -> Vec<String> {
    function
        .blocks
        .iter()
        .flat_map(|block| &block.instructions)
        .filter_map(|instr| match instr {
            Instruction::FunctionRef { function, .. } => Some(function.clone()),
            _ => None,
        })
        .collect()
}

fn markers(function: &Function) -> Vec<Vec<ValueId>> {
    function
        .blocks
        .iter()
        .flat_map(|block| &block.instructions)
        .filter_map(|instr| match instr {
            Instruction::MarkFunctionEscape { vars } => Some(vars.clone()),
            _ => None,
        })
        .collect()
}

fn storage_of(function: &Function, name: &str) -> ValueId {
    function
        .blocks
        .iter()
        .flat_map(|block| &block.instructions)
        .find_map(|instr| match instr {
            Instruction::GlobalAddr { result, global, .. } if global == name => Some(*result),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_declarations_visited_in_order() {
    let mut file = SourceFile::new("main.src");
    let mut second = code(2, vec![call("second")]);
    second.auxiliary.push(code(3, vec![call("auxiliary")]));
    file.top_level_decls = vec![code(1, vec![call("first")]), second];
    file.hoisted_decls = vec![code(4, vec![call("hoisted")])];

    let (function, reporter) = lower(&file);
    assert_eq!(callees(&function), vec!["first", "auxiliary", "second", "hoisted"]);
    assert_eq!(reporter.diagnostics().len(), 0);
}

#[test]
fn test_statement_after_exit_is_diagnosed_once() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![code(
        1,
        vec![
            exit_call().with_span(at_line(1)),
            call("after").with_span(at_line(2)),
            call("later").with_span(at_line(3)),
        ],
    )];

    let (function, reporter) = lower(&file);
    assert_eq!(reporter.count_of(DiagnosticKind::UnreachableCode), 1);
    assert_eq!(reporter.diagnostics()[0].span, at_line(2));
    assert_eq!(callees(&function), vec!["exit"]);
}

#[test]
fn test_implicit_elements_after_exit_are_skipped_silently() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![code(1, vec![exit_call(), call("synthesized").implicit()])];

    let (function, reporter) = lower(&file);
    assert_eq!(reporter.diagnostics().len(), 0);
    assert_eq!(callees(&function), vec!["exit"]);
}

#[test]
fn test_each_dead_block_is_diagnosed() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![
        code(1, vec![exit_call(), call("a").with_span(at_line(2))]),
        code(2, vec![call("b").with_span(at_line(4)), call("c").with_span(at_line(5))]),
    ];

    let (_, reporter) = lower(&file);
    let lines: Vec<u32> = reporter.diagnostics().iter().map(|d| d.span.start.line).collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn test_synthesized_struct_is_rejected() {
    let mut file = SourceFile::new("main.src");
    file.synthesized_decls = vec![structure(1, vec![])];

    let err = try_lower(&file, false).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn test_synthesized_extension_is_visited() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![global(1, "counter")];
    file.synthesized_decls = vec![extension(2, false, vec![method(3, vec![1])])];

    let (function, _) = lower(&file);
    assert_eq!(markers(&function), vec![vec![storage_of(&function, "counter")]]);
}

#[test]
fn test_initializer_capturing_global_by_reference() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![global(1, "counter"), structure(2, vec![initializer(3, vec![1])])];

    let (function, _) = lower(&file);
    assert_eq!(markers(&function), vec![vec![storage_of(&function, "counter")]]);
}

#[test]
fn test_initializer_capturing_constant_by_value() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![constant(1, "limit"), structure(2, vec![initializer(3, vec![1])])];

    let (function, _) = lower(&file);
    assert!(markers(&function).is_empty());
}

#[test]
fn test_static_and_skipped_members_are_ignored() {
    let mut static_binding = initializer(3, vec![1]);
    if let DeclKind::PatternBinding(binding) = &mut static_binding.kind {
        binding.is_static = true;
    }
    let mut skipped = method(4, vec![1]);
    skipped.skipped = true;

    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![global(1, "counter"), structure(2, vec![static_binding, skipped])];

    let (function, _) = lower(&file);
    assert!(markers(&function).is_empty());
}

#[test]
fn test_extension_initializers_need_object_model_bridge() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![
        global(1, "counter"),
        extension(2, false, vec![initializer(3, vec![1])]),
        extension(4, true, vec![initializer(5, vec![1])]),
    ];

    let (function, _) = lower(&file);
    assert_eq!(markers(&function).len(), 1);
}

#[test]
fn test_nested_types_and_accessors_are_marked() {
    let accessor = FunctionDecl {
        name: "get".to_string(),
        captures: vec![1],
        local_context: false,
    };
    let storage = Decl::new(
        5,
        DeclKind::Storage {
            name: "total".to_string(),
            accessors: vec![accessor],
        },
    );
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![global(1, "counter"), structure(2, vec![structure(3, vec![storage])])];

    let (function, _) = lower(&file);
    assert_eq!(markers(&function).len(), 1);
}

#[test]
fn test_local_types_in_skipped_bodies_are_not_visited() {
    let mut hidden = structure(3, vec![method(4, vec![1])]);
    hidden.in_skipped_function_body = true;

    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![global(1, "counter")];
    file.local_type_decls = vec![hidden, structure(5, vec![method(6, vec![1])])];

    let (function, _) = lower(&file);
    assert_eq!(markers(&function).len(), 1);
}

#[test]
fn test_profiler_counter_per_code_block() {
    let mut file = SourceFile::new("main.src");
    file.top_level_decls = vec![code(1, vec![call("a")]), code(2, vec![call("b")])];

    let (function, _) = try_lower(&file, true).unwrap();
    let counters: Vec<u32> = function.blocks[0]
        .instructions
        .iter()
        .filter_map(|instr| match instr {
            Instruction::IncrementProfilerCounter { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(counters, vec![0, 1]);
    assert_eq!(function.profiler, Some(Profiler { counters: 2 }));
    assert!(!function.emitting_top_level_code);
}
