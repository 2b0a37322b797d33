//! Event collector for testing and debugging.
//!
//! [`EventCollector`] implements [`Tracer`] by recording every hook call as a
//! [`FlowEvent`], so tests can assert on what a memoized function did and in
//! which order.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::tracer::{next_span_id, ExecutionResult, SpanId, Tracer, TracerCacheKey};

/// Events recorded by [`EventCollector`].
///
/// `cache` identifies the cache (or memoized function) that emitted the event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// New arguments were compared with the previous ones.
    ArgumentsCheck {
        cache: TracerCacheKey,
        /// Whether any argument differed.
        changed: bool,
    },

    /// The argument tree was repaired.
    TreeUpdated {
        cache: TracerCacheKey,
        /// Number of cell writes performed by the repair.
        dirtied: u64,
    },

    /// Cache validity check completed.
    CacheCheck {
        cache: TracerCacheKey,
        /// Whether the cached value was served.
        valid: bool,
    },

    /// Recomputation started.
    ComputeStart {
        span_id: SpanId,
        cache: TracerCacheKey,
    },

    /// Recomputation finished.
    ComputeEnd {
        span_id: SpanId,
        cache: TracerCacheKey,
        result: ExecutionResult,
        /// Wall time between start and end.
        duration: Duration,
    },

    /// A cache was read during its own computation.
    CycleDetected { cache: TracerCacheKey },

    /// A cache was cleared.
    CacheCleared { cache: TracerCacheKey },
}

impl FlowEvent {
    /// The cache the event belongs to.
    pub fn cache(&self) -> TracerCacheKey {
        match self {
            FlowEvent::ArgumentsCheck { cache, .. }
            | FlowEvent::TreeUpdated { cache, .. }
            | FlowEvent::CacheCheck { cache, .. }
            | FlowEvent::ComputeStart { cache, .. }
            | FlowEvent::ComputeEnd { cache, .. }
            | FlowEvent::CycleDetected { cache }
            | FlowEvent::CacheCleared { cache } => *cache,
        }
    }
}

/// Tracer that accumulates events for later inspection and assertion.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use autotrack::{EventCollector, FlowEvent, Memoize, Value};
///
/// let collector = Arc::new(EventCollector::new());
/// let first = Memoize::builder()
///     .tracer(collector.clone())
///     .build(|args| Ok(args[0].get(0).to_value()));
///
/// first.call(&[Value::list(["a", "b"])]).unwrap();
/// let computed = collector
///     .events()
///     .iter()
///     .filter(|event| matches!(event, FlowEvent::ComputeStart { .. }))
///     .count();
/// assert_eq!(computed, 1);
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<FlowEvent>>,
    start_times: Mutex<HashMap<SpanId, Instant, ahash::RandomState>>,
}

impl EventCollector {
    /// Create a new empty event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events as a vector.
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Take collected events, clearing the collector.
    pub fn take(&self) -> Vec<FlowEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Get the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn emit(&self, event: FlowEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for EventCollector {
    #[inline]
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }

    fn on_arguments_check(&self, cache: TracerCacheKey, changed: bool) {
        self.emit(FlowEvent::ArgumentsCheck { cache, changed });
    }

    fn on_tree_updated(&self, cache: TracerCacheKey, dirtied: u64) {
        self.emit(FlowEvent::TreeUpdated { cache, dirtied });
    }

    fn on_cache_check(&self, cache: TracerCacheKey, valid: bool) {
        self.emit(FlowEvent::CacheCheck { cache, valid });
    }

    fn on_compute_start(&self, span_id: SpanId, cache: TracerCacheKey) {
        self.start_times.lock().insert(span_id, Instant::now());
        self.emit(FlowEvent::ComputeStart { span_id, cache });
    }

    fn on_compute_end(&self, span_id: SpanId, cache: TracerCacheKey, result: ExecutionResult) {
        let duration = self
            .start_times
            .lock()
            .remove(&span_id)
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.emit(FlowEvent::ComputeEnd {
            span_id,
            cache,
            result,
            duration,
        });
    }

    fn on_cycle_detected(&self, cache: TracerCacheKey) {
        self.emit(FlowEvent::CycleDetected { cache });
    }

    fn on_cache_cleared(&self, cache: TracerCacheKey) {
        self.emit(FlowEvent::CacheCleared { cache });
    }
}
