//! Lowering errors
//!
//! Errors surface only at the declaration-builder seam; per-node failures
//! inside the engines degrade to a warning plus a fallback value and never
//! abort a whole-program pass.

use thiserror::Error;

pub type LowerResult<T> = Result<T, LowerError>;

#[derive(Debug, Error)]
pub enum LowerError {
    #[error("cannot synthesize a method for this callable: {0}")]
    UnsupportedCallable(String),

    #[error("cannot synthesize a class for this literal: {0}")]
    UnsupportedClass(String),

    #[error("internal lowering error: {0}")]
    Internal(String),
}
