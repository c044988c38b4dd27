//! Escape markers for module storage captured by reference
//!
//! Definite initialization runs over the entry function and must know where
//! a function or initializer may observe module variables. For every such
//! declaration we emit one `mark_function_escape` naming the captured
//! storage addresses. Captures bound by value (value-typed locations) cannot
//! observe later writes and are left out.

use egen_common::{CompilerError, DeclId, ValueId};
use log::{debug, trace};
use crate::ast::FunctionDecl;
use crate::context::LoweringContext;

/// Storage addresses among `captures`, in capture order
pub fn escaping_storage(ctx: &LoweringContext<'_>, captures: &[DeclId]) -> Vec<ValueId> {
    captures
        .iter()
        .filter(|decl| ctx.is_address_location(**decl))
        .filter_map(|decl| ctx.var_loc(*decl))
        .collect()
}

/// Emit one escape marker for the by-reference captures, or nothing.
/// Returns the marked storage.
pub fn mark_captures_escape(
    ctx: &mut LoweringContext<'_>,
    captures: &[DeclId],
) -> Result<Vec<ValueId>, CompilerError> {
    let vars = escaping_storage(ctx, captures);
    if vars.is_empty() {
        return Ok(vars);
    }
    // Dead code cannot observe anything
    if !ctx.builder.has_valid_insertion_point() {
        trace!("Skipping escape marker after an unconditional exit");
        return Ok(Vec::new());
    }
    debug!("Marking escape of {:?}", vars);
    ctx.builder.mark_function_escape(vars.clone())?;
    Ok(vars)
}

/// Escape marker for a function-like declaration at module scope
pub fn mark_function_escape(
    ctx: &mut LoweringContext<'_>,
    function: &FunctionDecl,
) -> Result<Vec<ValueId>, CompilerError> {
    if function.local_context {
        return Ok(Vec::new());
    }
    trace!("Checking captures of '{}'", function.name);
    mark_captures_escape(ctx, &function.captures)
}
