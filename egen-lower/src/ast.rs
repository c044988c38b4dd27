//! Type-checked description of one source file
//!
//! Only what entry-point emission needs is modeled: the top-level
//! declaration lists in their visiting order, the executable elements of
//! top-level code blocks, capture lists of function-like declarations and
//! stored-property initializers, and the resolved `main` routine.

use egen_common::{DeclId, SourceSpan};
use egen_ir::IrType;
use serde::{Deserialize, Serialize};

/// A source file ready for lowering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(default)]
    pub top_level_decls: Vec<Decl>,
    /// Derived declarations added by the type checker; extensions and protocols only
    #[serde(default)]
    pub synthesized_decls: Vec<Decl>,
    #[serde(default)]
    pub hoisted_decls: Vec<Decl>,
    #[serde(default)]
    pub local_type_decls: Vec<Decl>,
    #[serde(default)]
    pub main: Option<MainDecl>,
}

impl SourceFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            top_level_decls: Vec::new(),
            synthesized_decls: Vec::new(),
            hoisted_decls: Vec::new(),
            local_type_decls: Vec::new(),
            main: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    pub id: DeclId,
    pub kind: DeclKind,
    #[serde(default)]
    pub span: SourceSpan,
    /// Compiler-synthesized, not written by the user
    #[serde(default)]
    pub implicit: bool,
    /// Excluded from emission (e.g. unavailable members)
    #[serde(default)]
    pub skipped: bool,
    /// Declarations introduced alongside this one, visited first
    #[serde(default)]
    pub auxiliary: Vec<Decl>,
    #[serde(default)]
    pub in_skipped_function_body: bool,
}

impl Decl {
    pub fn new(id: DeclId, kind: DeclKind) -> Self {
        Self {
            id,
            kind,
            span: SourceSpan::default(),
            implicit: false,
            skipped: false,
            auxiliary: Vec::new(),
            in_skipped_function_body: false,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclKind {
    /// A block of executable top-level statements
    TopLevelCode { elements: Vec<Element> },

    /// Module-scope variable; constants have a value-typed location
    Var(VarDecl),

    Function(FunctionDecl),

    /// Computed storage, represented by its emitted accessors
    Storage {
        name: String,
        accessors: Vec<FunctionDecl>,
    },

    PatternBinding(PatternBindingDecl),

    Nominal {
        name: String,
        kind: NominalKind,
        members: Vec<Decl>,
    },

    Extension {
        extended: String,
        /// Implements an externally visible object-model class
        is_object_model_bridge: bool,
        members: Vec<Decl>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalKind {
    Struct,
    Class,
    Enum,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: IrType,
    pub mutable: bool,
    #[serde(default)]
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Declarations whose storage the body refers to
    #[serde(default)]
    pub captures: Vec<DeclId>,
    /// Nested inside another function body
    #[serde(default)]
    pub local_context: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBindingDecl {
    pub entries: Vec<PatternEntry>,
    #[serde(default)]
    pub is_static: bool,
}

/// One `name = initializer` entry of a pattern binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// The variable anchoring this entry
    pub var: DeclId,
    pub name: String,
    pub ty: IrType,
    #[serde(default = "default_true")]
    pub mutable: bool,
    /// Executable initializer, absent for declarations without one
    #[serde(default)]
    pub init: Option<Expr>,
    /// Captures of the initializer expression
    #[serde(default)]
    pub captures: Vec<DeclId>,
    /// The anchoring variable lives in a local context
    #[serde(default)]
    pub local_context: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    #[serde(default)]
    pub span: SourceSpan,
    #[serde(default)]
    pub implicit: bool,
}

impl Element {
    pub fn stmt(stmt: Stmt) -> Self {
        Self::new(ElementKind::Stmt(stmt))
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(ElementKind::Expr(expr))
    }

    pub fn decl(decl: Decl) -> Self {
        Self::new(ElementKind::Decl(decl))
    }

    fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            span: SourceSpan::default(),
            implicit: false,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }

    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Stmt(Stmt),
    Expr(Expr),
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Propagate an error value to the enclosing throw destination
    Throw(Expr),

    /// Store into a module variable
    Assign { var: DeclId, value: Expr },

    /// Scoped block whose bindings are released on every exit
    Do { bindings: Vec<Binding>, body: Vec<Stmt> },

    /// Expression evaluated for its side effects
    Expr(Expr),
}

/// A `let` binding local to a `Do` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub var: DeclId,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal of a builtin integer type or a struct wrapping one
    IntegerLiteral { value: i64, ty: IrType },

    /// Read of a declared variable
    VarRef(DeclId),

    /// Direct call of a named function; `Never` results end control flow
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<Expr>,
        result: IrType,
        /// Suspends and resumes on the expected executor
        #[serde(default)]
        awaited: bool,
    },
}

impl Expr {
    pub fn call(callee: &str, args: Vec<Expr>, result: IrType) -> Self {
        Expr::Call {
            callee: callee.to_string(),
            args,
            result,
            awaited: false,
        }
    }
}

/// How a throwing `main` hands its error back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorConvention {
    /// As a value received by the failure block
    #[default]
    Direct,
    /// Through a caller-provided out-buffer
    Indirect,
}

/// The resolved user-defined `main` routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainDecl {
    /// Lowered symbol name of the routine
    pub symbol: String,
    /// Nominal type declaring `main`
    pub enclosing_type: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub throws: bool,
    #[serde(default = "default_error_type")]
    pub error_type: IrType,
    #[serde(default)]
    pub error_convention: ErrorConvention,
    #[serde(default)]
    pub span: SourceSpan,
}

fn default_error_type() -> IrType {
    IrType::ErrorExistential
}

impl MainDecl {
    pub fn new(symbol: &str, enclosing_type: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            enclosing_type: enclosing_type.to_string(),
            is_async: false,
            throws: false,
            error_type: default_error_type(),
            error_convention: ErrorConvention::Direct,
            span: SourceSpan::default(),
        }
    }

    pub fn throwing(mut self, error_type: IrType, convention: ErrorConvention) -> Self {
        self.throws = true;
        self.error_type = error_type;
        self.error_convention = convention;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}
