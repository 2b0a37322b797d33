//! Cells: the smallest trackable mutable leaves.

use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::revision::{self, current_revision, Revision};
use crate::tracker::{self, Dependency};

/// Equality a cell uses to decide whether a write is a no-op.
pub type Equality<T> = fn(&T, &T) -> bool;

/// A tag is a cell used purely as a change signal. Every write to it counts.
pub type Tag = Cell<()>;

/// A mutable value that records the revision at which it last changed.
///
/// Reading a cell inside a [`Cache`](crate::Cache) computation registers the
/// cell as a dependency of that computation.
///
/// Cloning a `Cell` creates a new handle to the same value.
///
/// ```
/// use autotrack::Cell;
///
/// let cell = Cell::new(1);
/// let created = cell.revision();
/// assert!(!cell.write(1)); // equal value: no-op
/// assert_eq!(cell.revision(), created);
/// assert!(cell.write(2));
/// assert!(cell.revision() > created);
/// ```
pub struct Cell<T> {
    inner: Rc<CellInner<T>>,
}

struct CellInner<T> {
    value: RefCell<T>,
    revision: StdCell<Revision>,
    equals: Equality<T>,
}

impl<T> Dependency for CellInner<T> {
    fn revision(&self) -> Revision {
        self.revision.get()
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("value", &self.inner.value.borrow())
            .field("revision", &self.inner.revision.get())
            .finish()
    }
}

fn never_equal<T>(_: &T, _: &T) -> bool {
    false
}

impl<T: PartialEq + 'static> Cell<T> {
    /// Create a cell whose writes are no-ops when the new value is `==` to the old one.
    pub fn new(initial: T) -> Self {
        Self::with_equality(initial, |a, b| a == b)
    }
}

impl<T: 'static> Cell<T> {
    /// Create a cell with a custom equality, allocated at the current revision.
    pub fn with_equality(initial: T, equals: Equality<T>) -> Self {
        Self {
            inner: Rc::new(CellInner {
                value: RefCell::new(initial),
                revision: StdCell::new(current_revision()),
                equals,
            }),
        }
    }

    /// Create a tag-like cell holding `marker`: every write takes effect.
    pub fn tag(marker: T) -> Self {
        Self::with_equality(marker, never_equal)
    }

    /// Read the value, registering this cell with the active tracker.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the value, registering this cell with the active tracker.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Register this cell with the active tracker without reading it.
    pub fn track(&self) {
        tracker::consume(&self.inner);
    }

    /// Write a value. Returns `false` (and changes nothing) if the cell's
    /// equality considers it equal to the current value.
    pub fn write(&self, value: T) -> bool {
        let unchanged = (self.inner.equals)(&self.inner.value.borrow(), &value);
        if unchanged {
            return false;
        }
        self.store(value);
        true
    }

    /// Write a value unconditionally, claiming a new revision.
    pub fn dirty(&self, value: T) {
        self.store(value);
    }

    /// Revision at which this cell last changed.
    pub fn revision(&self) -> Revision {
        self.inner.revision.get()
    }

    fn store(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.inner.revision.set(revision::bump());
    }
}

/// Create a new [`Tag`] at the current revision.
pub fn create_tag() -> Tag {
    Cell::tag(())
}
