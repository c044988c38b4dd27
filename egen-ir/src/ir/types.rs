//! IR Type System
//!
//! Types distinguish object values from addresses, and trivial values
//! (no lifetime to end) from values whose ownership must be tracked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a function expects to be called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallingConvention {
    /// Ordinary native function
    Native,
    /// Static or instance method taking its `Self` metatype last
    Method,
    /// Externally defined C routine
    Foreign,
}

/// IR Type system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Raw machine integer with bit width
    Builtin { bits: u8 },

    /// ABI struct wrapping its fields (e.g. `Int32` wraps a 32-bit builtin)
    Struct { name: String, fields: Vec<IrType> },

    /// Named type whose layout is opaque to this phase
    Nominal { name: String, trivial: bool },

    /// Existential box holding any error value
    ErrorExistential,

    /// Metatype of a nominal type
    Metatype(String),

    /// Function type
    Function {
        params: Vec<IrType>,
        result: Box<IrType>,
        error: Option<Box<IrType>>,
        convention: CallingConvention,
    },

    /// Address of storage holding a value of the inner type
    Address(Box<IrType>),

    RawPointer,

    /// Handle to an execution context
    Executor,

    Optional(Box<IrType>),

    EmptyTuple,

    /// Uninhabited result of routines that never return
    Never,
}

impl IrType {
    pub fn builtin_int32() -> Self {
        IrType::Builtin { bits: 32 }
    }

    /// The standard library's 32-bit signed integer
    pub fn int32() -> Self {
        IrType::Struct {
            name: "Int32".to_string(),
            fields: vec![IrType::builtin_int32()],
        }
    }

    pub fn address_of(ty: IrType) -> Self {
        IrType::Address(Box::new(ty))
    }

    pub fn optional(ty: IrType) -> Self {
        IrType::Optional(Box::new(ty))
    }

    pub fn function(params: Vec<IrType>, result: IrType, convention: CallingConvention) -> Self {
        IrType::Function {
            params,
            result: Box::new(result),
            error: None,
            convention,
        }
    }

    pub fn throwing_function(
        params: Vec<IrType>,
        result: IrType,
        error: IrType,
        convention: CallingConvention,
    ) -> Self {
        IrType::Function {
            params,
            result: Box::new(result),
            error: Some(Box::new(error)),
            convention,
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self, IrType::Address(_))
    }

    /// Object type of an address, or the type itself
    pub fn object_type(&self) -> &IrType {
        match self {
            IrType::Address(inner) => inner,
            other => other,
        }
    }

    pub fn is_error_existential(&self) -> bool {
        matches!(self, IrType::ErrorExistential)
    }

    /// Trivial values carry no ownership and need no lifetime ending
    pub fn is_trivial(&self) -> bool {
        match self {
            IrType::Builtin { .. }
            | IrType::Metatype(_)
            | IrType::Function { .. }
            | IrType::Address(_)
            | IrType::RawPointer
            | IrType::Executor
            | IrType::EmptyTuple
            | IrType::Never => true,
            IrType::Struct { fields, .. } => fields.iter().all(IrType::is_trivial),
            IrType::Nominal { trivial, .. } => *trivial,
            IrType::Optional(inner) => inner.is_trivial(),
            IrType::ErrorExistential => false,
        }
    }

    pub fn function_params(&self) -> Option<&[IrType]> {
        match self {
            IrType::Function { params, .. } => Some(params),
            _ => None,
        }
    }

    pub fn function_result(&self) -> Option<&IrType> {
        match self {
            IrType::Function { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn function_error(&self) -> Option<&IrType> {
        match self {
            IrType::Function { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Builtin { bits } => write!(f, "Builtin.Int{bits}"),
            IrType::Struct { name, .. } => write!(f, "{name}"),
            IrType::Nominal { name, .. } => write!(f, "{name}"),
            IrType::ErrorExistential => write!(f, "any Error"),
            IrType::Metatype(name) => write!(f, "@thin {name}.Type"),
            IrType::Function { params, result, error, convention } => {
                if *convention == CallingConvention::Foreign {
                    write!(f, "@convention(c) ")?;
                }
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> ")?;
                if let Some(error) = error {
                    write!(f, "(@error {error}) ")?;
                }
                write!(f, "{result}")
            }
            IrType::Address(inner) => write!(f, "*{inner}"),
            IrType::RawPointer => write!(f, "Builtin.RawPointer"),
            IrType::Executor => write!(f, "Builtin.Executor"),
            IrType::Optional(inner) => write!(f, "Optional<{inner}>"),
            IrType::EmptyTuple => write!(f, "()"),
            IrType::Never => write!(f, "Never"),
        }
    }
}
