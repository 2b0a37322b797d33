//! Memoized functions over tracked arguments.
//!
//! [`memoize`] wraps a function of positional [`Field`] arguments. Each call
//! compares the new arguments with the previous ones by position; when any
//! differs, the argument tree is repaired in place and the function's cache
//! decides whether something it actually read has changed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::cache::{Cache, CacheBuilder};
use crate::node::{Field, Node, Tracked};
use crate::revision::current_revision;
use crate::tracer::Tracer;
use crate::update::update;
use crate::value::Value;
use crate::MemoError;

/// A memoized function created by [`memoize`] or [`Memoize::builder`].
///
/// ```
/// use autotrack::{memoize, Value};
///
/// let total = memoize(|args| {
///     let mut sum = 0.0;
///     for item in args[0].get("items").iter() {
///         sum += item.get("price").as_f64()?;
///     }
///     Ok(sum)
/// });
///
/// let cart = Value::record([(
///     "items",
///     Value::list([Value::record([("price", 2.5)]), Value::record([("price", 4.0)])]),
/// )]);
/// assert_eq!(total.call(&[cart.clone()]).unwrap(), 6.5);
///
/// // A different record with an unchanged price does not recompute.
/// let renamed = cart.with("owner", "ada");
/// assert_eq!(total.call(&[renamed]).unwrap(), 6.5);
/// assert_eq!(total.recomputations(), 1);
/// ```
pub struct Memoized<T> {
    root: Rc<Node>,
    last_arguments: RefCell<Option<Vec<Value>>>,
    cache: Cache<T>,
}

impl<T: Clone + 'static> Memoized<T> {
    /// Call the function, recomputing only if something it read changed.
    ///
    /// # Errors
    ///
    /// Whatever the function returned, or [`MemoError::Cycle`] if the
    /// function called itself. Errors are not cached.
    pub fn call(&self, args: &[Value]) -> Result<T, MemoError> {
        let changed = {
            let last = self.last_arguments.borrow();
            match last.as_deref() {
                Some(last) => {
                    last.len() != args.len()
                        || last.iter().zip(args).any(|(old, new)| !old.same(new))
                }
                None => true,
            }
        };
        let tracer = self.cache.tracer();
        tracer.on_arguments_check(self.cache.key(), changed);

        if changed {
            let before = current_revision();
            update(&self.root, Value::List(Rc::new(args.to_vec())));
            *self.last_arguments.borrow_mut() = Some(args.to_vec());
            tracer.on_tree_updated(self.cache.key(), current_revision().since(before));
        }

        self.cache.value()
    }
}

impl<T> Memoized<T> {
    /// Discard the cached result. The argument tree is kept, so the next
    /// call recomputes against the arguments it is given.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of times the function has run successfully since creation or
    /// the last [`Memoized::clear_cache`].
    pub fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }

    /// The cache backing this function.
    pub fn cache(&self) -> &Cache<T> {
        &self.cache
    }
}

impl<T: fmt::Debug> fmt::Debug for Memoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("arguments", &self.last_arguments.borrow())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Memoize `func` with default settings.
pub fn memoize<T, F>(func: F) -> Memoized<T>
where
    T: Clone + 'static,
    F: Fn(&[Field]) -> Result<T, MemoError> + 'static,
{
    Memoize::builder().build(func)
}

/// Entry point for configured memoized functions.
pub struct Memoize;

impl Memoize {
    /// Create a builder for a memoized function.
    pub fn builder() -> MemoizeBuilder {
        MemoizeBuilder::new()
    }
}

/// Builder for [`Memoized`] with customizable settings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use autotrack::{EventCollector, Memoize, Value};
///
/// let events = Arc::new(EventCollector::new());
/// let count = Memoize::builder()
///     .label("count_todos")
///     .tracer(events.clone())
///     .build(|args| Ok(args[0].len()));
///
/// assert_eq!(count.call(&[Value::list([1, 2])]).unwrap(), 2);
/// assert!(!events.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MemoizeBuilder {
    cache: CacheBuilder,
}

impl MemoizeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            cache: CacheBuilder::new(),
        }
    }

    /// Set a label reported in tracer events.
    pub fn label(mut self, label: &'static str) -> Self {
        self.cache = self.cache.label(label);
        self
    }

    /// Set the tracer receiving this function's events.
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.cache = self.cache.tracer(tracer);
        self
    }

    /// Build the memoized function.
    pub fn build<T, F>(self, func: F) -> Memoized<T>
    where
        T: Clone + 'static,
        F: Fn(&[Field]) -> Result<T, MemoError> + 'static,
    {
        let root = Node::new(Value::List(Rc::new(Vec::new())));
        let arguments = Tracked::new(root.clone());
        let cache = self.cache.build(move || {
            let args: Vec<Field> = arguments.iter().collect();
            func(&args)
        });
        Memoized {
            root,
            last_arguments: RefCell::new(None),
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    fn counted<T, F>(func: F) -> (Memoized<T>, Rc<StdCell<u32>>)
    where
        T: Clone + 'static,
        F: Fn(&[Field]) -> Result<T, MemoError> + 'static,
    {
        let calls = Rc::new(StdCell::new(0));
        let memoized = memoize({
            let calls = calls.clone();
            move |args| {
                calls.set(calls.get() + 1);
                func(args)
            }
        });
        (memoized, calls)
    }

    #[test]
    fn test_same_reference_is_not_recomputed() {
        let (memoized, calls) = counted(|args| Ok(args[0].get("a").as_f64()?));
        let state = Value::record([("a", 1)]);
        assert_eq!(memoized.call(&[state.clone()]).unwrap(), 1.0);
        assert_eq!(memoized.call(&[state]).unwrap(), 1.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_primitive_arguments() {
        let (memoized, calls) = counted(|args| Ok(args[0].as_f64()? + args[1].as_f64()?));
        assert_eq!(memoized.call(&[1.into(), 2.into()]).unwrap(), 3.0);
        assert_eq!(memoized.call(&[1.into(), 2.into()]).unwrap(), 3.0);
        assert_eq!(calls.get(), 1);
        assert_eq!(memoized.call(&[1.into(), 5.into()]).unwrap(), 6.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_argument_count_change_recomputes() {
        let (memoized, calls) = counted(|args| Ok(args.len()));
        assert_eq!(memoized.call(&[1.into()]).unwrap(), 1);
        assert_eq!(memoized.call(&[1.into(), 2.into()]).unwrap(), 2);
        assert_eq!(memoized.call(&[]).unwrap(), 0);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_clear_cache_keeps_tree() {
        let (memoized, calls) = counted(|args| Ok(args[0].get("a").to_value()));
        let state = Value::record([("a", "x")]);
        memoized.call(&[state.clone()]).unwrap();
        let child_count = memoized.root.children.borrow().len();
        memoized.clear_cache();
        assert_eq!(memoized.recomputations(), 0);
        assert_eq!(memoized.root.children.borrow().len(), child_count);
        assert_eq!(memoized.call(&[state]).unwrap(), Value::from("x"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_error_then_success() {
        let memoized = memoize(|args| Ok(args[0].get("n").as_i64()?));
        let err = memoized.call(&[Value::record([("n", "oops")])]).unwrap_err();
        assert!(err.is::<crate::TypeMismatch>());
        assert_eq!(memoized.call(&[Value::record([("n", 7)])]).unwrap(), 7);
    }

    #[test]
    fn test_replaced_arguments_are_released() {
        let memoized = memoize(|args| Ok(args[0].get("items").len()));
        let first = Value::record([("items", Value::list([1, 2]))]);
        memoized.call(&[first.clone()]).unwrap();
        for n in 3..6 {
            let items = Value::list((0..n).collect::<Vec<i32>>());
            memoized.call(&[Value::record([("items", items)])]).unwrap();
        }
        match &first {
            Value::Record(entries) => assert_eq!(Rc::strong_count(entries), 1),
            other => panic!("expected record, got {:?}", other),
        }
        match first.lookup(&"items".into()) {
            Some(Value::List(items)) => assert_eq!(Rc::strong_count(items), 1),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_call_outside_tracking_leaves_no_tracker() {
        let memoized = memoize(|args| Ok(args.len()));
        memoized.call(&[Value::Null]).unwrap();
        assert!(!crate::tracker::is_tracking());
    }
}
