//! Modules and external declarations
//!
//! A module owns every function produced for one compilation unit, both
//! definitions and the external declarations they reference.

use egen_common::EXIT_FUNCTION_NAME;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::IrError;
use crate::ir::{CallingConvention, Function, IrType};

/// Linkage types for global symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible to other modules
    External,
    /// Only visible within this module
    Internal,
}

/// IR Module - represents a complete compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: String) -> Self {
        Self {
            name,
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Whether a function with a body exists under `name`
    pub fn has_definition(&self, name: &str) -> bool {
        self.get_function(name).is_some_and(|f| !f.is_declaration())
    }

    /// Add an external declaration unless a function of the same name exists.
    /// An existing function with a different type is rejected.
    pub fn declare(&mut self, declaration: Function) -> Result<&Function, IrError> {
        let expected = declaration.function_type();
        if let Some(position) = self.functions.iter().position(|f| f.name == declaration.name) {
            let existing = &self.functions[position];
            let found = existing.function_type();
            if found != expected {
                return Err(IrError::SignatureMismatch {
                    name: declaration.name,
                    found: found.to_string(),
                    expected: expected.to_string(),
                });
            }
            return Ok(existing);
        }

        debug!("Declaring external function '{}' : {}", declaration.name, expected);
        self.functions.push(declaration);
        let last = self.functions.len() - 1;
        Ok(&self.functions[last])
    }

    /// Return the declaration of `name`, synthesizing an implicit one if absent
    pub fn get_or_declare(
        &mut self,
        name: &str,
        param_types: Vec<IrType>,
        result_type: IrType,
        convention: CallingConvention,
    ) -> Result<&Function, IrError> {
        let mut declaration = Function::declaration(name.to_string(), param_types, result_type, convention);
        declaration.is_implicit = true;
        self.declare(declaration)
    }

    /// Find the process-exit routine `exit(Int32) -> Never`, synthesizing an
    /// implicit foreign declaration when none is visible.
    pub fn lookup_or_synthesize_exit(&mut self) -> Result<&Function, IrError> {
        self.get_or_declare(
            EXIT_FUNCTION_NAME,
            vec![IrType::int32()],
            IrType::Never,
            CallingConvention::Foreign,
        )
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// module {}", self.name)?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
