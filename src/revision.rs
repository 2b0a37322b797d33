//! Revision clock for the autotracking engine.
//!
//! Every effective write to a [`Cell`](crate::Cell) claims the next revision
//! from this clock. The clock lives in thread-local storage: cells, caches and
//! memoized functions are `!Send`, so all of them observe a single clock.

use std::cell::Cell as StdCell;

/// Revision is a monotonically increasing number claimed by each effective cell write.
///
/// Revisions are comparable only within the thread that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Revision(pub u64);

impl Revision {
    /// The revision every clock starts at.
    pub const ZERO: Revision = Revision(0);

    /// Number of revisions claimed between `earlier` and `self`.
    #[inline]
    pub fn since(self, earlier: Revision) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

thread_local! {
    static CLOCK: StdCell<Revision> = const { StdCell::new(Revision::ZERO) };
}

/// Get the current revision of this thread's clock.
///
/// ```
/// use autotrack::{current_revision, Cell};
///
/// let before = current_revision();
/// let cell = Cell::new(1);
/// cell.write(2);
/// assert!(current_revision() > before);
/// ```
#[inline]
pub fn current_revision() -> Revision {
    CLOCK.with(|clock| clock.get())
}

/// Advance the clock by one and return the claimed revision.
pub(crate) fn bump() -> Revision {
    CLOCK.with(|clock| {
        let next = Revision(clock.get().0 + 1);
        clock.set(next);
        next
    })
}
