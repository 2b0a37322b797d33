//! Derived caches: memoized nullary computations that revalidate against
//! the revisions of whatever they read last time.
//!
//! # Revalidation
//!
//! A cache records every [`Cell`](crate::Cell) and cache read while its
//! computation runs. Its revision is the maximum revision among those
//! dependencies (0 when it has none). Reading [`Cache::value`] recomputes only
//! when that revision is newer than the one stored at the last successful
//! computation, so the check costs one pass over the recorded dependencies.
//!
//! # Composition
//!
//! Reading a cache inside another cache's computation registers the inner
//! cache as a dependency of the outer one. The outer cache is then stale
//! exactly when one of the inner cache's dependencies changed.

use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::revision::Revision;
use crate::tracer::{ExecutionResult, NoopTracer, Tracer, TracerCacheKey};
use crate::tracker::{self, Dependencies, Dependency};
use crate::MemoError;

/// Process-unique identifier of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheId(pub u64);

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache#{}", self.0)
    }
}

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

type Compute<T> = Box<dyn Fn() -> Result<T, MemoError>>;

/// A memoized nullary computation.
///
/// Cloning a `Cache` creates a new handle to the same cached state.
///
/// ```
/// use autotrack::{Cache, Cell, MemoError};
///
/// let price = Cell::new(10);
/// let quantity = Cell::new(3);
/// let total = Cache::new({
///     let (price, quantity) = (price.clone(), quantity.clone());
///     move || Ok::<_, MemoError>(price.read() * quantity.read())
/// });
///
/// assert_eq!(total.value().unwrap(), 30);
/// assert_eq!(total.value().unwrap(), 30);
/// assert_eq!(total.recomputations(), 1);
///
/// quantity.write(4);
/// assert_eq!(total.value().unwrap(), 40);
/// assert_eq!(total.recomputations(), 2);
/// ```
pub struct Cache<T> {
    inner: Rc<CacheInner<T>>,
}

struct CacheInner<T> {
    id: CacheId,
    label: Option<&'static str>,
    compute: Compute<T>,
    state: RefCell<CacheState<T>>,
    computing: StdCell<bool>,
    tracer: Arc<dyn Tracer>,
}

struct CacheState<T> {
    value: Option<T>,
    /// Revision of the dependencies at the last successful computation.
    /// `None` means the cache has never computed (or was cleared).
    revision: Option<Revision>,
    deps: Dependencies,
    recomputations: u64,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            value: None,
            revision: None,
            deps: Vec::new(),
            recomputations: 0,
        }
    }
}

fn max_revision(deps: &Dependencies) -> Revision {
    deps.iter()
        .map(|dep| dep.revision())
        .max()
        .unwrap_or(Revision::ZERO)
}

impl<T> CacheInner<T> {
    fn key(&self) -> TracerCacheKey {
        TracerCacheKey {
            id: self.id,
            label: self.label,
        }
    }
}

impl<T> Dependency for CacheInner<T> {
    fn revision(&self) -> Revision {
        max_revision(&self.state.borrow().deps)
    }
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Cache")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("value", &state.value)
            .field("revision", &state.revision)
            .field("deps", &state.deps.len())
            .finish()
    }
}

/// Marks a cache as computing for the lifetime of the guard.
struct ComputingGuard<'a>(&'a StdCell<bool>);

impl<'a> ComputingGuard<'a> {
    fn new(flag: &'a StdCell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: Clone + 'static> Cache<T> {
    /// Create a cache around `compute` with default settings.
    ///
    /// Nothing runs until the first [`Cache::value`].
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T, MemoError> + 'static,
    {
        CacheBuilder::new().build(compute)
    }

    /// Get the value, recomputing first if any recorded dependency changed.
    ///
    /// When called inside another cache's computation, this cache is
    /// registered as a dependency of that computation.
    ///
    /// # Errors
    ///
    /// - `MemoError::UserError` - the computation failed; nothing is cached
    ///   and the next read runs it again
    /// - `MemoError::Cycle` - this cache was read during its own computation
    pub fn value(&self) -> Result<T, MemoError> {
        let inner = &self.inner;
        if inner.computing.get() {
            inner.tracer.on_cycle_detected(inner.key());
            return Err(MemoError::Cycle { cache: inner.id });
        }

        let cached = {
            let state = inner.state.borrow();
            match (&state.value, state.revision) {
                (Some(value), Some(revision)) if max_revision(&state.deps) <= revision => {
                    Some(value.clone())
                }
                _ => None,
            }
        };
        inner.tracer.on_cache_check(inner.key(), cached.is_some());

        let value = match cached {
            Some(value) => value,
            None => self.recompute()?,
        };
        tracker::consume(&self.inner);
        Ok(value)
    }

    fn recompute(&self) -> Result<T, MemoError> {
        let inner = &self.inner;
        let span_id = inner.tracer.new_span_id();
        inner.tracer.on_compute_start(span_id, inner.key());

        let result = {
            let _computing = ComputingGuard::new(&inner.computing);
            let frame = tracker::enter();
            let result = (inner.compute)();
            (result, frame.finish())
        };

        match result {
            (Ok(value), deps) => {
                let mut state = inner.state.borrow_mut();
                state.revision = Some(max_revision(&deps));
                state.deps = deps;
                state.value = Some(value.clone());
                state.recomputations += 1;
                drop(state);
                inner
                    .tracer
                    .on_compute_end(span_id, inner.key(), ExecutionResult::Computed);
                Ok(value)
            }
            (Err(err), _) => {
                let result = match err {
                    MemoError::Cycle { .. } => ExecutionResult::CycleDetected,
                    MemoError::UserError(ref e) => ExecutionResult::Error {
                        message: e.to_string(),
                    },
                };
                inner.tracer.on_compute_end(span_id, inner.key(), result);
                Err(err)
            }
        }
    }
}

impl Cache<()> {
    /// Create a builder for customizing the cache.
    ///
    /// The value type is fixed by [`CacheBuilder::build`].
    pub fn builder() -> CacheBuilder {
        CacheBuilder::new()
    }
}

impl<T> Cache<T> {
    /// Reset to the never-computed state so the next read recomputes.
    ///
    /// This also resets [`Cache::recomputations`].
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.inner.state.borrow_mut());
        drop(previous);
        self.inner.tracer.on_cache_cleared(self.inner.key());
    }

    /// Number of successful computations so far.
    pub fn recomputations(&self) -> u64 {
        self.inner.state.borrow().recomputations
    }

    /// Maximum revision among the dependencies recorded by the last successful computation.
    pub fn revision(&self) -> Revision {
        self.inner.revision()
    }

    /// Identifier of this cache in tracer events and errors.
    pub fn id(&self) -> CacheId {
        self.inner.id
    }

    /// Label given through the builder, if any.
    pub fn label(&self) -> Option<&'static str> {
        self.inner.label
    }

    pub(crate) fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.inner.tracer
    }

    pub(crate) fn key(&self) -> TracerCacheKey {
        self.inner.key()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Cache`] with customizable settings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use autotrack::{Cache, Cell, EventCollector, MemoError};
///
/// let todos = Cell::new(vec!["write docs", "ship"]);
/// let events = Arc::new(EventCollector::new());
/// let cache = Cache::builder()
///     .label("visible_todos")
///     .tracer(events.clone())
///     .build({
///         let todos = todos.clone();
///         move || Ok::<_, MemoError>(todos.with(|todos| todos.len()))
///     });
///
/// assert_eq!(cache.value().unwrap(), 2);
/// assert_eq!(cache.label(), Some("visible_todos"));
/// assert!(!events.is_empty());
/// ```
#[derive(Clone)]
pub struct CacheBuilder {
    label: Option<&'static str>,
    tracer: Arc<dyn Tracer>,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            label: None,
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Set a label reported in tracer events.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Set the tracer receiving this cache's events.
    ///
    /// Pass an `Arc` to keep a handle to the tracer.
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Build the cache with the configured settings.
    pub fn build<T, F>(self, compute: F) -> Cache<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T, MemoError> + 'static,
    {
        Cache {
            inner: Rc::new(CacheInner {
                id: CacheId(NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed)),
                label: self.label,
                compute: Box::new(compute),
                state: RefCell::new(CacheState::default()),
                computing: StdCell::new(false),
                tracer: self.tracer,
            }),
        }
    }
}
