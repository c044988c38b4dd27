//! IR construction errors
//!
//! Every variant is a misuse of the builder or the function arena by the
//! compiler itself, so all of them map to internal compiler errors.

use egen_common::{BlockId, CompilerError, ValueId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IrError {
    #[error("no insertion point in function '{function}'")]
    NoInsertionPoint { function: String },

    #[error("block bb{block} not found in function '{function}'")]
    BlockNotFound { function: String, block: BlockId },

    #[error("value %{value} not found in function '{function}'")]
    ValueNotFound { function: String, value: ValueId },

    #[error("block bb{block} is already terminated")]
    BlockTerminated { block: BlockId },

    #[error("cannot erase the entry block of '{function}'")]
    EraseEntryBlock { function: String },

    #[error("value %{value} of type {ty} is not callable")]
    NotCallable { value: ValueId, ty: String },

    #[error("'{name}' is declared as {found}, expected {expected}")]
    SignatureMismatch {
        name: String,
        found: String,
        expected: String,
    },
}

impl From<IrError> for CompilerError {
    fn from(err: IrError) -> Self {
        CompilerError::InternalError {
            message: err.to_string(),
        }
    }
}
