//! Error types for memoized computations.

use std::fmt;
use std::sync::Arc;

use crate::cache::CacheId;
use crate::value::ValueKind;

/// Errors returned when reading a [`Cache`](crate::Cache) or calling a
/// [`Memoized`](crate::Memoized) function.
///
/// User errors can be propagated from a computation with the `?` operator,
/// which converts any `Into<anyhow::Error>` type into `MemoError::UserError`.
///
/// Errors are never cached: the next read runs the computation again.
#[derive(Debug, Clone)]
pub enum MemoError {
    /// A cache was read from inside its own computation.
    Cycle {
        /// The cache that was re-entered.
        cache: CacheId,
    },

    /// Error produced by the wrapped computation.
    UserError(Arc<anyhow::Error>),
}

impl fmt::Display for MemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoError::Cycle { cache } => {
                write!(f, "{} read during its own computation", cache)
            }
            MemoError::UserError(e) => write!(f, "user error: {}", e),
        }
    }
}

impl<T: Into<anyhow::Error>> From<T> for MemoError {
    fn from(err: T) -> Self {
        MemoError::UserError(Arc::new(err.into()))
    }
}

impl MemoError {
    /// Returns a reference to the inner user error if this is a `UserError` variant.
    pub fn user_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            MemoError::UserError(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the user error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.user_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is a `UserError` containing an error of type `E`.
    pub fn is<E: std::error::Error + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }
}

/// A typed accessor was used on a value of another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    /// The kind the accessor requires.
    pub expected: ValueKind,
    /// The kind actually found.
    pub found: ValueKind,
}
