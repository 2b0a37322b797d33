//! Ambient dependency tracking.
//!
//! A tracker collects every cell and cache read while it is the innermost
//! active one. Trackers form a thread-local stack: a cache recomputation
//! pushes a fresh tracker and pops it when the computation returns, fails or
//! panics, so one cache can read another inside its computation.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::revision::Revision;

/// Anything a computation can depend on: it reports the revision at which it last changed.
pub(crate) trait Dependency {
    fn revision(&self) -> Revision;
}

/// Dependencies recorded by one tracker, in first-read order.
pub(crate) type Dependencies = Vec<Rc<dyn Dependency>>;

#[derive(Default)]
struct Tracker {
    seen: HashSet<usize, ahash::RandomState>,
    deps: Dependencies,
    /// Set for the throwaway tracker pushed by [`untracked`].
    discard: bool,
}

impl Tracker {
    fn add(&mut self, dep: Rc<dyn Dependency>) {
        let addr = Rc::as_ptr(&dep) as *const () as usize;
        if self.seen.insert(addr) {
            self.deps.push(dep);
        }
    }
}

// Thread-local tracker stack; the last entry is the active tracker.
thread_local! {
    static TRACKERS: RefCell<Vec<Tracker>> = const { RefCell::new(Vec::new()) };
}

/// Register `dep` into the active tracker, if there is one.
pub(crate) fn consume<D: Dependency + 'static>(dep: &Rc<D>) {
    TRACKERS.with(|stack| {
        if let Some(tracker) = stack.borrow_mut().last_mut() {
            tracker.add(dep.clone());
        }
    });
}

/// Push a new tracker. It is popped when the returned frame is finished or dropped.
pub(crate) fn enter() -> Frame {
    push(Tracker::default())
}

fn push(tracker: Tracker) -> Frame {
    TRACKERS.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(tracker);
        Frame {
            depth: stack.len(),
            finished: false,
        }
    })
}

/// Guard for one pushed tracker.
pub(crate) struct Frame {
    depth: usize,
    finished: bool,
}

impl Frame {
    /// Pop the tracker and return what it collected.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.finished = true;
        TRACKERS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth);
            stack.truncate(self.depth);
            stack.pop().map(|tracker| tracker.deps).unwrap_or_default()
        })
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Unwinding out of a computation: restore the enclosing tracker.
        let _ = TRACKERS.try_with(|stack| {
            if let Ok(mut stack) = stack.try_borrow_mut() {
                stack.truncate(self.depth.saturating_sub(1));
            }
        });
    }
}

/// Returns true if reads on this thread are currently being recorded.
///
/// Inside [`untracked`] this is false even when an enclosing computation is running.
pub fn is_tracking() -> bool {
    TRACKERS.with(|stack| stack.borrow().last().is_some_and(|tracker| !tracker.discard))
}

/// Run `f` without recording any of its reads into the enclosing computation.
///
/// ```
/// use autotrack::{untracked, Cache, Cell, MemoError};
///
/// let hidden = Cell::new(1);
/// let cache = Cache::new({
///     let hidden = hidden.clone();
///     move || Ok::<_, MemoError>(untracked(|| hidden.read()))
/// });
/// assert_eq!(cache.value().unwrap(), 1);
/// hidden.write(2);
/// // The read was not recorded, so the cached value is still served.
/// assert_eq!(cache.value().unwrap(), 1);
/// ```
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let frame = push(Tracker {
        discard: true,
        ..Tracker::default()
    });
    let result = f();
    drop(frame.finish());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    struct Fixed(StdCell<u64>);

    impl Dependency for Fixed {
        fn revision(&self) -> Revision {
            Revision(self.0.get())
        }
    }

    fn fixed(rev: u64) -> Rc<Fixed> {
        Rc::new(Fixed(StdCell::new(rev)))
    }

    #[test]
    fn test_consume_without_tracker_is_noop() {
        assert!(!is_tracking());
        consume(&fixed(1));
        assert!(!is_tracking());
    }

    #[test]
    fn test_frame_collects_deduplicated() {
        let a = fixed(1);
        let b = fixed(2);
        let frame = enter();
        consume(&a);
        consume(&b);
        consume(&a);
        let deps = frame.finish();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].revision(), Revision(1));
        assert_eq!(deps[1].revision(), Revision(2));
        assert!(!is_tracking());
    }

    #[test]
    fn test_nested_frames_are_isolated() {
        let outer_dep = fixed(1);
        let inner_dep = fixed(2);
        let outer = enter();
        consume(&outer_dep);
        let inner = enter();
        consume(&inner_dep);
        let inner_deps = inner.finish();
        let outer_deps = outer.finish();
        assert_eq!(inner_deps.len(), 1);
        assert_eq!(outer_deps.len(), 1);
        assert_eq!(outer_deps[0].revision(), Revision(1));
    }

    #[test]
    fn test_dropped_frame_restores_stack() {
        let outer = enter();
        {
            let _inner = enter();
        }
        consume(&fixed(3));
        let deps = outer.finish();
        assert_eq!(deps.len(), 1);
        assert!(!is_tracking());
    }

    #[test]
    fn test_untracked_hides_reads() {
        let dep = fixed(5);
        let frame = enter();
        untracked(|| consume(&dep));
        assert!(frame.finish().is_empty());
    }

    #[test]
    fn test_is_tracking_inside_untracked() {
        let frame = enter();
        assert!(is_tracking());
        assert!(!untracked(is_tracking));
        // A computation started inside `untracked` records again.
        assert!(untracked(|| {
            let inner = enter();
            let tracking = is_tracking();
            drop(inner.finish());
            tracking
        }));
        assert!(is_tracking());
        drop(frame.finish());
        assert!(!is_tracking());
        assert!(!untracked(is_tracking));
    }
}
