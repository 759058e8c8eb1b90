//! Error types for code generation

use thiserror::Error;
use vyc_data::FunctionId;

/// Error type for code generation. Reaching one of these means semantic analysis let through
/// something the backend cannot lower; user errors are reported as diagnostics before this point.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("`{op}` cannot be evaluated at runtime")]
    Unsupported { op: &'static str },

    #[error("`{ty}` has no place in memory")]
    NotAddressable { ty: String },

    #[error("function {function} expects {expected} arguments, {found} given")]
    ArgumentCount { function: FunctionId, expected: usize, found: usize },

    #[error("`{what}` used outside of a loop")]
    OutsideLoop { what: &'static str },

    #[error("memory frame of function {function} grows past {limit:#x}")]
    FrameOverflow { function: String, limit: u32 },
}

/// Result type for code generation operations
pub type Result<T> = std::result::Result<T, CodegenError>;
