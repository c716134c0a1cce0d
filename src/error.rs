// ============================================================================
// spark-store - Errors
// ============================================================================

use thiserror::Error;

/// Errors returned by store entry points.
///
/// Everything else a store does is total: reads of missing keys yield
/// `Value::Undefined` and writes to non-composite leaves are plain raw
/// assignments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The root of a mutable store must be an object, array or class instance
    #[error("unexpected type {found} passed as a store root, expected an object or array")]
    InvalidRootType { found: &'static str },
}

pub type Result<T> = std::result::Result<T, StoreError>;
