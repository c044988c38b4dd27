//! Top-level statement lowering
//!
//! Walks a source file in declaration order. Executable top-level code is
//! handed to the collaborator; type and extension declarations are only
//! descended into to mark the module storage their initializers and
//! function-like members capture.

use egen_common::{CompilerError, DiagnosticKind};
use log::{debug, trace};
use crate::ast::{Decl, DeclKind, Element, ElementKind, NominalKind, PatternBindingDecl, SourceFile};
use crate::collaborator::LoweringCollaborator;
use crate::context::LoweringContext;
use crate::escape;

/// Which declaration context a member list belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberContext {
    Type,
    Extension { is_object_model_bridge: bool },
}

impl MemberContext {
    /// Stored-property initializers are only visited in types and in
    /// extensions that implement an object-model class
    fn visits_initializers(self) -> bool {
        match self {
            MemberContext::Type => true,
            MemberContext::Extension { is_object_model_bridge } => is_object_model_bridge,
        }
    }
}

pub struct TopLevelStatementLowerer<'c, 'a> {
    pub ctx: &'c mut LoweringContext<'a>,
    pub collaborator: &'c mut dyn LoweringCollaborator,
}

impl<'c, 'a> TopLevelStatementLowerer<'c, 'a> {
    pub fn new(ctx: &'c mut LoweringContext<'a>, collaborator: &'c mut dyn LoweringCollaborator) -> Self {
        Self { ctx, collaborator }
    }

    pub fn lower_source_file(&mut self, file: &SourceFile) -> Result<(), CompilerError> {
        debug!("Lowering top-level code of '{}'", file.name);

        for decl in &file.top_level_decls {
            for auxiliary in &decl.auxiliary {
                self.visit(auxiliary)?;
            }
            self.visit(decl)?;
        }

        for decl in &file.synthesized_decls {
            let allowed = matches!(
                decl.kind,
                DeclKind::Extension { .. } | DeclKind::Nominal { kind: NominalKind::Protocol, .. }
            );
            if !allowed {
                return Err(CompilerError::internal(format!(
                    "synthesized top-level declaration {} is neither an extension nor a protocol",
                    decl.id
                )));
            }
            self.visit(decl)?;
        }

        for decl in &file.hoisted_decls {
            self.visit(decl)?;
        }

        for decl in &file.local_type_decls {
            if decl.in_skipped_function_body {
                trace!("Skipping local type {} in a skipped function body", decl.id);
                continue;
            }
            self.visit(decl)?;
        }
        Ok(())
    }

    fn visit(&mut self, decl: &Decl) -> Result<(), CompilerError> {
        match &decl.kind {
            DeclKind::TopLevelCode { elements } => self.visit_top_level_code(decl, elements),
            DeclKind::Var(_) | DeclKind::PatternBinding(_) => {
                // Storage declared after an unconditional exit is never initialized
                if !self.ctx.builder.has_valid_insertion_point() {
                    trace!("Skipping declaration {} after an unconditional exit", decl.id);
                    return Ok(());
                }
                self.collaborator.lower_declaration(self.ctx, decl)
            }
            DeclKind::Function(function) => {
                escape::mark_function_escape(self.ctx, function)?;
                Ok(())
            }
            DeclKind::Storage { accessors, .. } => {
                for accessor in accessors {
                    escape::mark_function_escape(self.ctx, accessor)?;
                }
                Ok(())
            }
            DeclKind::Nominal { members, .. } => self.visit_members(members, MemberContext::Type),
            DeclKind::Extension { members, is_object_model_bridge, .. } => self.visit_members(
                members,
                MemberContext::Extension { is_object_model_bridge: *is_object_model_bridge },
            ),
        }
    }

    fn visit_top_level_code(&mut self, decl: &Decl, elements: &[Element]) -> Result<(), CompilerError> {
        if let Some(counter) = self.ctx.next_profiler_counter() {
            if self.ctx.builder.has_valid_insertion_point() {
                self.ctx.builder.increment_profiler_counter(counter)?;
            }
        }
        if self.ctx.builder.has_valid_insertion_point() {
            self.ctx.builder.debug_scope(decl.span.start.clone())?;
        }

        for element in elements {
            if !self.ctx.builder.has_valid_insertion_point() {
                if element.implicit {
                    continue;
                }
                self.ctx.diagnose(element.span.clone(), DiagnosticKind::UnreachableCode);
                // Nothing after an unconditional exit can be emitted
                return Ok(());
            }

            match &element.kind {
                ElementKind::Stmt(stmt) => self.collaborator.lower_statement(self.ctx, stmt)?,
                ElementKind::Expr(expr) => self.collaborator.lower_expression_discarding_result(self.ctx, expr)?,
                ElementKind::Decl(decl) => self.collaborator.lower_declaration(self.ctx, decl)?,
            }
        }
        Ok(())
    }

    fn visit_members(&mut self, members: &[Decl], context: MemberContext) -> Result<(), CompilerError> {
        for member in members {
            if member.skipped {
                continue;
            }
            match &member.kind {
                DeclKind::PatternBinding(binding) => {
                    if context.visits_initializers() {
                        self.visit_pattern_binding(binding)?;
                    }
                }
                DeclKind::Nominal { members, .. } => self.visit_members(members, MemberContext::Type)?,
                DeclKind::Function(function) => {
                    escape::mark_function_escape(self.ctx, function)?;
                }
                DeclKind::Storage { accessors, .. } => {
                    for accessor in accessors {
                        escape::mark_function_escape(self.ctx, accessor)?;
                    }
                }
                DeclKind::TopLevelCode { .. } | DeclKind::Var(_) | DeclKind::Extension { .. } => {}
            }
        }
        Ok(())
    }

    fn visit_pattern_binding(&mut self, binding: &PatternBindingDecl) -> Result<(), CompilerError> {
        if binding.is_static {
            return Ok(());
        }
        for entry in &binding.entries {
            if entry.init.is_none() || entry.local_context {
                continue;
            }
            trace!("Checking initializer captures of '{}'", entry.name);
            escape::mark_captures_escape(self.ctx, &entry.captures)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "top_level_tests.rs"]
mod tests;
