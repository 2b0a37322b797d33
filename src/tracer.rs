//! Tracer trait for observing memoized computations.
//!
//! This module defines the [`Tracer`] trait and related types for observing
//! cache checks, recomputations and argument-tree repairs. The default
//! [`NoopTracer`] provides zero-cost when tracing is not needed.
//!
//! # Example
//!
//! ```ignore
//! use autotrack::{Memoize, SpanId, Tracer, TracerCacheKey};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn new_span_id(&self) -> SpanId {
//!         SpanId(1)
//!     }
//!
//!     fn on_compute_start(&self, _span_id: SpanId, cache: TracerCacheKey) {
//!         println!("recomputing {}", cache);
//!     }
//! }
//!
//! let memoized = Memoize::builder().tracer(PrintTracer).build(|args| Ok(args.len()));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::CacheId;

/// Unique identifier for one recomputation span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpanId(pub u64);

/// Identifies a cache (and the memoized function built on it) in tracer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TracerCacheKey {
    /// Process-unique cache id.
    pub id: CacheId,
    /// Optional label given through the builder.
    pub label: Option<&'static str>,
}

impl fmt::Display for TracerCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{}({})", label, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Recomputation result classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The computation ran and its value was cached.
    Computed,
    /// The computation failed; nothing was cached.
    Error {
        /// Display form of the error.
        message: String,
    },
    /// The computation read its own cache.
    CycleDetected,
}

/// Tracer trait for observing memoized computations.
///
/// All methods except [`Tracer::new_span_id`] have default empty
/// implementations, so you only need to override the events you're
/// interested in.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one tracer can be shared by
/// memoized functions living on different threads.
pub trait Tracer: Send + Sync + 'static {
    /// Generate a new unique span ID. Called at the start of each recomputation.
    fn new_span_id(&self) -> SpanId;

    /// Called when a memoized function compares its new arguments with the previous ones.
    #[inline]
    fn on_arguments_check(&self, _cache: TracerCacheKey, _changed: bool) {}

    /// Called after the argument tree has been repaired.
    ///
    /// `dirtied` is the number of cell writes the repair performed.
    #[inline]
    fn on_tree_updated(&self, _cache: TracerCacheKey, _dirtied: u64) {}

    /// Called when cache validity is checked.
    #[inline]
    fn on_cache_check(&self, _cache: TracerCacheKey, _valid: bool) {}

    /// Called when a recomputation starts.
    #[inline]
    fn on_compute_start(&self, _span_id: SpanId, _cache: TracerCacheKey) {}

    /// Called when a recomputation ends.
    #[inline]
    fn on_compute_end(&self, _span_id: SpanId, _cache: TracerCacheKey, _result: ExecutionResult) {
    }

    /// Called when a cache is read during its own computation.
    #[inline]
    fn on_cycle_detected(&self, _cache: TracerCacheKey) {}

    /// Called when a cache is cleared.
    #[inline]
    fn on_cache_cleared(&self, _cache: TracerCacheKey) {}
}

impl<T: Tracer + ?Sized> Tracer for Arc<T> {
    fn new_span_id(&self) -> SpanId {
        (**self).new_span_id()
    }

    fn on_arguments_check(&self, cache: TracerCacheKey, changed: bool) {
        (**self).on_arguments_check(cache, changed)
    }

    fn on_tree_updated(&self, cache: TracerCacheKey, dirtied: u64) {
        (**self).on_tree_updated(cache, dirtied)
    }

    fn on_cache_check(&self, cache: TracerCacheKey, valid: bool) {
        (**self).on_cache_check(cache, valid)
    }

    fn on_compute_start(&self, span_id: SpanId, cache: TracerCacheKey) {
        (**self).on_compute_start(span_id, cache)
    }

    fn on_compute_end(&self, span_id: SpanId, cache: TracerCacheKey, result: ExecutionResult) {
        (**self).on_compute_end(span_id, cache, result)
    }

    fn on_cycle_detected(&self, cache: TracerCacheKey) {
        (**self).on_cycle_detected(cache)
    }

    fn on_cache_cleared(&self, cache: TracerCacheKey) {
        (**self).on_cache_cleared(cache)
    }
}

/// Global span counter shared by the built-in tracers.
static SPAN_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_span_id() -> SpanId {
    SpanId(SPAN_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Zero-cost tracer that discards all events.
///
/// This is the default tracer for [`Cache`](crate::Cache) and
/// [`Memoized`](crate::Memoized).
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }
}

/// Tracer that forwards events to the `tracing` crate.
///
/// Checks and tree repairs are emitted at `TRACE`, recomputations at `DEBUG`,
/// failures and cycles at `WARN`.
#[cfg(feature = "tracing")]
pub struct TracingTracer;

#[cfg(feature = "tracing")]
impl Tracer for TracingTracer {
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }

    fn on_arguments_check(&self, cache: TracerCacheKey, changed: bool) {
        tracing::trace!(cache = %cache, changed, "arguments checked");
    }

    fn on_tree_updated(&self, cache: TracerCacheKey, dirtied: u64) {
        tracing::trace!(cache = %cache, dirtied, "argument tree updated");
    }

    fn on_cache_check(&self, cache: TracerCacheKey, valid: bool) {
        tracing::trace!(cache = %cache, valid, "cache checked");
    }

    fn on_compute_start(&self, span_id: SpanId, cache: TracerCacheKey) {
        tracing::debug!(span = span_id.0, cache = %cache, "recompute started");
    }

    fn on_compute_end(&self, span_id: SpanId, cache: TracerCacheKey, result: ExecutionResult) {
        match result {
            ExecutionResult::Computed => {
                tracing::debug!(span = span_id.0, cache = %cache, "recompute finished");
            }
            ExecutionResult::Error { message } => {
                tracing::warn!(span = span_id.0, cache = %cache, error = %message, "recompute failed");
            }
            ExecutionResult::CycleDetected => {
                tracing::warn!(span = span_id.0, cache = %cache, "recompute hit a cycle");
            }
        }
    }

    fn on_cycle_detected(&self, cache: TracerCacheKey) {
        tracing::warn!(cache = %cache, "cache read during its own computation");
    }

    fn on_cache_cleared(&self, cache: TracerCacheKey) {
        tracing::debug!(cache = %cache, "cache cleared");
    }
}
