//! Result type alias for bulkfs operations

use crate::ProcessError;

/// Result type alias for bulkfs operations
pub type Result<T> = std::result::Result<T, ProcessError>;
