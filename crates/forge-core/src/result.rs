//! Convenience result type alias for Spine Forge.

use crate::error::AppError;

/// A specialized `Result` type for Spine Forge operations.
pub type AppResult<T> = Result<T, AppError>;
