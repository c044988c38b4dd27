//! General lowering routines used by top-level code emission
//!
//! Entry-point emission only decides *where* statements, expressions and
//! declarations are lowered; the lowering itself belongs to the
//! `LoweringCollaborator`. `BasicLowering` implements the small language
//! subset described by `crate::ast`.

use egen_common::{CompilerError, DeclId, ValueId, EXIT_FUNCTION_NAME};
use egen_ir::{CallingConvention, IrType, OwnershipKind};
use log::trace;
use crate::ast::{Binding, Decl, DeclKind, Expr, PatternBindingDecl, Stmt, VarDecl};
use crate::cleanup::Cleanup;
use crate::context::LoweringContext;

pub trait LoweringCollaborator {
    fn lower_statement(&mut self, ctx: &mut LoweringContext<'_>, stmt: &Stmt) -> Result<(), CompilerError>;

    fn lower_expression_discarding_result(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        expr: &Expr,
    ) -> Result<(), CompilerError>;

    fn lower_declaration(&mut self, ctx: &mut LoweringContext<'_>, decl: &Decl) -> Result<(), CompilerError>;

    /// Produce the handle of the default execution context
    fn resolve_execution_context(&mut self, ctx: &mut LoweringContext<'_>) -> Result<ValueId, CompilerError>;
}

/// Result of lowering an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RValue {
    pub value: ValueId,
    /// The value was produced at +1 and must be consumed by the user
    pub owned: bool,
}

#[derive(Debug, Default)]
pub struct BasicLowering;

impl BasicLowering {
    pub fn new() -> Self {
        Self
    }

    /// Lower `expr`; `None` means control flow ended inside it
    pub fn lower_expression(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        expr: &Expr,
    ) -> Result<Option<RValue>, CompilerError> {
        match expr {
            Expr::IntegerLiteral { value, ty } => self.lower_integer_literal(ctx, *value, ty).map(Some),
            Expr::VarRef(decl) => {
                let location = ctx.var_loc(*decl).ok_or_else(|| {
                    CompilerError::internal(format!("variable {} used before its declaration was lowered", decl))
                })?;
                if ctx.builder.value_type(location)?.is_address() {
                    let value = ctx.builder.load(location, false)?;
                    Ok(Some(Self::rvalue(ctx, value)))
                } else {
                    Ok(Some(RValue { value: location, owned: false }))
                }
            }
            Expr::Call { callee, args, result, awaited } => self.lower_call(ctx, callee, args, result, *awaited),
        }
    }

    fn rvalue(ctx: &LoweringContext<'_>, value: ValueId) -> RValue {
        let owned = ctx
            .function()
            .value(value)
            .is_some_and(|info| info.ownership == OwnershipKind::Owned);
        RValue { value, owned }
    }

    fn lower_integer_literal(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        value: i64,
        ty: &IrType,
    ) -> Result<RValue, CompilerError> {
        let literal = match ty {
            IrType::Builtin { .. } => ctx.builder.integer_literal(ty.clone(), value)?,
            IrType::Struct { fields, .. } => match fields.as_slice() {
                [raw @ IrType::Builtin { .. }] => {
                    let raw = ctx.builder.integer_literal(raw.clone(), value)?;
                    ctx.builder.create_struct(ty.clone(), vec![raw])?
                }
                _ => return Err(CompilerError::internal(format!("'{}' is not an integer type", ty))),
            },
            _ => return Err(CompilerError::internal(format!("'{}' is not an integer type", ty))),
        };
        Ok(RValue { value: literal, owned: false })
    }

    fn lower_call(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        callee: &str,
        args: &[Expr],
        result: &IrType,
        awaited: bool,
    ) -> Result<Option<RValue>, CompilerError> {
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            match self.lower_expression(ctx, arg)? {
                Some(arg) => lowered.push(arg),
                None => return Ok(None),
            }
        }

        let mut param_types = Vec::with_capacity(lowered.len());
        for arg in &lowered {
            param_types.push(ctx.builder.value_type(arg.value)?.clone());
        }
        let function = if callee == EXIT_FUNCTION_NAME {
            ctx.module.lookup_or_synthesize_exit()?.clone()
        } else {
            ctx.module
                .get_or_declare(callee, param_types, result.clone(), CallingConvention::Native)?
                .clone()
        };

        let callee_ref = ctx.builder.function_ref(&function)?;
        let value = ctx
            .builder
            .apply(callee_ref, lowered.iter().map(|arg| arg.value).collect())?;
        trace!("Lowered call to '{}' as %{}", callee, value);

        if *ctx.builder.value_type(value)? == IrType::Never {
            ctx.builder.unreachable()?;
            return Ok(None);
        }
        if awaited {
            let executor = ctx.expected_executor().ok_or_else(|| {
                CompilerError::internal(format!("call to '{}' awaited outside of an asynchronous context", callee))
            })?;
            ctx.builder.hop_to_executor(executor)?;
        }

        // Arguments are borrowed by the callee
        for arg in lowered.iter().filter(|arg| arg.owned) {
            ctx.builder.destroy_value(arg.value)?;
        }
        Ok(Some(Self::rvalue(ctx, value)))
    }

    /// Lower an expression whose value is handed over to a consuming use
    fn lower_consumable(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        expr: &Expr,
    ) -> Result<Option<ValueId>, CompilerError> {
        let Some(rvalue) = self.lower_expression(ctx, expr)? else {
            return Ok(None);
        };
        let trivial = ctx.builder.value_type(rvalue.value)?.is_trivial();
        if !rvalue.owned && !trivial {
            return Err(CompilerError::internal(format!(
                "borrowed value %{} cannot be consumed without a copy",
                rvalue.value
            )));
        }
        Ok(Some(rvalue.value))
    }

    fn lower_throw(&mut self, ctx: &mut LoweringContext<'_>, error: &Expr) -> Result<(), CompilerError> {
        let Some(error) = self.lower_consumable(ctx, error)? else {
            return Ok(());
        };
        let ty = ctx.builder.value_type(error)?;
        if !ty.is_error_existential() {
            return Err(CompilerError::internal(format!("cannot throw a value of type '{}'", ty)));
        }
        ctx.emit_throw(error)
    }

    fn lower_assign(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        var: DeclId,
        value: &Expr,
    ) -> Result<(), CompilerError> {
        let location = ctx
            .var_loc(var)
            .filter(|location| ctx.builder.value_type(*location).is_ok_and(IrType::is_address))
            .ok_or_else(|| CompilerError::internal(format!("variable {} is not assignable", var)))?;
        if let Some(value) = self.lower_consumable(ctx, value)? {
            ctx.builder.store(value, location)?;
        }
        Ok(())
    }

    fn lower_do(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        bindings: &[Binding],
        body: &[Stmt],
    ) -> Result<(), CompilerError> {
        let scope = ctx.cleanups.open_scope();
        let mut live = true;
        for binding in bindings {
            match self.lower_expression(ctx, &binding.value)? {
                Some(rvalue) => {
                    if rvalue.owned {
                        ctx.cleanups.push(Cleanup::DestroyValue(rvalue.value));
                    }
                    ctx.set_var_loc(binding.var, rvalue.value);
                }
                None => {
                    live = false;
                    break;
                }
            }
        }
        if live {
            for stmt in body {
                if !ctx.builder.has_valid_insertion_point() {
                    break;
                }
                self.lower_statement(ctx, stmt)?;
            }
        }
        ctx.cleanups.close_scope(&mut ctx.builder, scope)?;
        Ok(())
    }

    fn lower_var(&mut self, ctx: &mut LoweringContext<'_>, decl: &Decl, var: &VarDecl) -> Result<(), CompilerError> {
        self.lower_variable(ctx, decl.id, &var.name, &var.ty, var.mutable, var.init.as_ref())
    }

    fn lower_pattern_binding(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        binding: &PatternBindingDecl,
    ) -> Result<(), CompilerError> {
        for entry in &binding.entries {
            if !ctx.builder.has_valid_insertion_point() {
                break;
            }
            self.lower_variable(ctx, entry.var, &entry.name, &entry.ty, entry.mutable, entry.init.as_ref())?;
        }
        Ok(())
    }

    /// Module variables live in global storage; constants are bound to their value
    fn lower_variable(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        id: DeclId,
        name: &str,
        ty: &IrType,
        mutable: bool,
        init: Option<&Expr>,
    ) -> Result<(), CompilerError> {
        if mutable {
            let address = ctx.builder.global_addr(name, ty.clone())?;
            ctx.set_var_loc(id, address);
            if let Some(init) = init {
                if let Some(value) = self.lower_consumable(ctx, init)? {
                    ctx.builder.store(value, address)?;
                }
            }
            return Ok(());
        }

        let init = init.ok_or_else(|| CompilerError::internal(format!("constant '{}' has no initializer", name)))?;
        if let Some(rvalue) = self.lower_expression(ctx, init)? {
            if rvalue.owned {
                ctx.cleanups.push(Cleanup::DestroyValue(rvalue.value));
            }
            ctx.set_var_loc(id, rvalue.value);
        }
        Ok(())
    }
}

impl LoweringCollaborator for BasicLowering {
    fn lower_statement(&mut self, ctx: &mut LoweringContext<'_>, stmt: &Stmt) -> Result<(), CompilerError> {
        match stmt {
            Stmt::Throw(error) => self.lower_throw(ctx, error),
            Stmt::Assign { var, value } => self.lower_assign(ctx, *var, value),
            Stmt::Do { bindings, body } => self.lower_do(ctx, bindings, body),
            Stmt::Expr(expr) => self.lower_expression_discarding_result(ctx, expr),
        }
    }

    fn lower_expression_discarding_result(
        &mut self,
        ctx: &mut LoweringContext<'_>,
        expr: &Expr,
    ) -> Result<(), CompilerError> {
        if let Some(rvalue) = self.lower_expression(ctx, expr)? {
            if rvalue.owned {
                ctx.builder.destroy_value(rvalue.value)?;
            }
        }
        Ok(())
    }

    fn lower_declaration(&mut self, ctx: &mut LoweringContext<'_>, decl: &Decl) -> Result<(), CompilerError> {
        match &decl.kind {
            DeclKind::Var(var) => self.lower_var(ctx, decl, var),
            DeclKind::PatternBinding(binding) => self.lower_pattern_binding(ctx, binding),
            // Bodies of functions and types are emitted by their own visitors
            _ => Ok(()),
        }
    }

    fn resolve_execution_context(&mut self, ctx: &mut LoweringContext<'_>) -> Result<ValueId, CompilerError> {
        Ok(ctx.builder.builtin("get_main_executor", vec![], IrType::Executor)?)
    }
}
