//! Identifier types shared by the IR and the lowering crates

/// Basic block identifier, stable for the lifetime of a function
pub type BlockId = u32;

/// SSA value identifier (instruction results and block parameters)
pub type ValueId = u32;

/// Declaration identifier assigned by the frontend
pub type DeclId = u32;

/// Name of the process entry point produced for a module
pub const ENTRY_POINT_NAME: &str = "main";

/// Name of the asynchronous entry function started by the thread-start sequence
pub const ASYNC_ENTRY_POINT_NAME: &str = "async_Main";

/// Name of the external process-exit routine
pub const EXIT_FUNCTION_NAME: &str = "exit";
