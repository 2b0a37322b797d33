//! Shadow node tree and its accessor wrappers.
//!
//! Every list or record reached while a computation reads its arguments gets
//! a [`Node`] mirroring it. The node hands out a [`Tracked`] handle whose
//! accessor methods read the real value and, as a side effect, record which
//! parts were read:
//!
//! - reading a primitive property records that property's cell,
//! - reading a nested list/record records the child node's identity tag,
//! - enumerating keys or reading a length records the collection tag.
//!
//! Cells, child nodes and the collection tag are all created on first read.
//!
//! Accessors replace native field syntax: a computation calls
//! `args[0].get("todos").len()` where a dynamic language would write
//! `args[0].todos.length`. Existence checks ([`Tracked::has_key`]) and raw
//! reads ([`Tracked::describe`], [`Tracked::raw`]) are not tracked.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::cell::{create_tag, Cell, Tag};
use crate::error::TypeMismatch;
use crate::value::{Key, Value, ValueKind};

/// Name that reads a list's length through [`Tracked::get`].
pub const LENGTH: &str = "length";

type Map<V> = HashMap<Key, V, ahash::RandomState>;

/// One node of the shadow tree.
pub(crate) struct Node {
    pub(crate) value: RefCell<Value>,
    /// Read whenever this node is reached from its parent.
    pub(crate) identity: Tag,
    /// Cells for primitive properties read so far.
    pub(crate) tags: RefCell<Map<Cell<Value>>>,
    /// Nodes for list/record properties read so far.
    pub(crate) children: RefCell<Map<Rc<Node>>>,
    /// Key-set/length signal, created on first enumeration.
    pub(crate) collection: RefCell<Option<Tag>>,
}

impl Node {
    pub(crate) fn new(value: Value) -> Rc<Self> {
        Rc::new(Self {
            identity: create_tag(),
            value: RefCell::new(value),
            tags: RefCell::new(Map::default()),
            children: RefCell::new(Map::default()),
            collection: RefCell::new(None),
        })
    }

    pub(crate) fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    fn consume_collection(&self) {
        let tag = self
            .collection
            .borrow_mut()
            .get_or_insert_with(create_tag)
            .clone();
        tag.track();
    }

    pub(crate) fn dirty_collection(&self) {
        if let Some(tag) = self.collection.borrow().as_ref() {
            tag.dirty(());
        }
    }
}

/// Tracked handle to a list or record argument.
///
/// Cloning is cheap and yields a handle to the same node.
#[derive(Clone)]
pub struct Tracked {
    node: Rc<Node>,
}

impl Tracked {
    pub(crate) fn new(node: Rc<Node>) -> Self {
        Self { node }
    }

    /// Read the property under `key`.
    ///
    /// Lists and records come back as [`Field::Node`], primitives as
    /// [`Field::Value`]; an absent key reads as `Null`. On a list, the
    /// [`LENGTH`] name reads the length (tracked like [`Tracked::len`]) and any
    /// other non-numeric name is not data: it yields `Null` and records nothing.
    pub fn get(&self, key: impl Into<Key>) -> Field {
        let key = key.into();
        let current = self.node.value();

        if let (Value::List(_), Key::Name(name)) = (&current, &key) {
            if &**name == LENGTH {
                return Field::Value(Value::from(self.len()));
            }
            return Field::Value(Value::Null);
        }

        let child_value = current.at(&key);
        if child_value.is_container() {
            let child = self
                .node
                .children
                .borrow_mut()
                .entry(key)
                .or_insert_with(|| Node::new(child_value))
                .clone();
            child.identity.track();
            Field::Node(Tracked::new(child))
        } else {
            let tag = self
                .node
                .tags
                .borrow_mut()
                .entry(key)
                .or_insert_with(|| Cell::tag(child_value.clone()))
                .clone();
            tag.track();
            Field::Value(child_value)
        }
    }

    /// Keys of the underlying value, tracking the key set.
    pub fn keys(&self) -> Vec<Key> {
        self.node.consume_collection();
        self.node.value.borrow().keys()
    }

    /// Number of entries, tracking the key set (or list length).
    pub fn len(&self) -> usize {
        self.node.consume_collection();
        self.node.value.borrow().len()
    }

    /// Returns true if there are no entries, tracking the key set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the entries' fields in key order.
    ///
    /// Tracks the key set and every entry, as if each were read with [`Tracked::get`].
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.keys().into_iter().map(move |key| self.get(key))
    }

    /// Iterate over `(key, field)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (Key, Field)> + '_ {
        self.keys()
            .into_iter()
            .map(move |key| (key.clone(), self.get(key)))
    }

    /// Whether `key` exists. Not tracked.
    pub fn has_key(&self, key: impl Into<Key>) -> bool {
        self.node.value.borrow().contains_key(&key.into())
    }

    /// The raw value under `key`, if present. Not tracked.
    pub fn describe(&self, key: impl Into<Key>) -> Option<Value> {
        self.node.value.borrow().lookup(&key.into()).cloned()
    }

    /// The underlying value. Not tracked.
    pub fn raw(&self) -> Value {
        self.node.value()
    }

    /// Kind of the underlying value (list or record). Not tracked.
    pub fn kind(&self) -> ValueKind {
        self.node.value.borrow().kind()
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked")
            .field(&*self.node.value.borrow())
            .finish()
    }
}

/// Result of reading a property through a [`Tracked`] handle.
#[derive(Clone, Debug)]
pub enum Field {
    /// A primitive value.
    Value(Value),
    /// A tracked list or record.
    Node(Tracked),
}

impl Field {
    /// Read a nested property. Reading through a primitive yields `Null`.
    pub fn get(&self, key: impl Into<Key>) -> Field {
        match self {
            Field::Node(node) => node.get(key),
            Field::Value(_) => Field::Value(Value::Null),
        }
    }

    /// Keys of a list/record (tracked); empty for primitives.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Field::Node(node) => node.keys(),
            Field::Value(_) => Vec::new(),
        }
    }

    /// Length of a list/record (tracked), or of a primitive as [`Value::len`].
    pub fn len(&self) -> usize {
        match self {
            Field::Node(node) => node.len(),
            Field::Value(value) => value.len(),
        }
    }

    /// Returns true if [`Field::len`] is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over entries of a list/record; empty for primitives.
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.keys().into_iter().map(move |key| self.get(key))
    }

    /// Kind of the value behind this field. Not tracked.
    pub fn kind(&self) -> ValueKind {
        match self {
            Field::Node(node) => node.kind(),
            Field::Value(value) => value.kind(),
        }
    }

    /// The tracked handle, if this is a list or record.
    pub fn as_tracked(&self) -> Option<&Tracked> {
        match self {
            Field::Node(node) => Some(node),
            Field::Value(_) => None,
        }
    }

    /// The plain value behind this field. Lists and records are returned untracked.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Node(node) => node.raw(),
            Field::Value(value) => value.clone(),
        }
    }

    fn mismatch(&self, expected: ValueKind) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// The number, or a [`TypeMismatch`].
    pub fn as_f64(&self) -> Result<f64, TypeMismatch> {
        match self {
            Field::Value(Value::Number(n)) => Ok(*n),
            _ => Err(self.mismatch(ValueKind::Number)),
        }
    }

    /// The number as an integer, or a [`TypeMismatch`] if it is not integral
    /// or does not fit in an `i64`.
    pub fn as_i64(&self) -> Result<i64, TypeMismatch> {
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        const RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;
        match self {
            Field::Value(Value::Number(n)) if n.fract() == 0.0 && RANGE.contains(n) => {
                Ok(*n as i64)
            }
            _ => Err(self.mismatch(ValueKind::Number)),
        }
    }

    /// The boolean, or a [`TypeMismatch`].
    pub fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            Field::Value(Value::Bool(b)) => Ok(*b),
            _ => Err(self.mismatch(ValueKind::Bool)),
        }
    }

    /// The text, or a [`TypeMismatch`].
    pub fn as_str(&self) -> Result<Rc<str>, TypeMismatch> {
        match self {
            Field::Value(Value::Text(text)) => Ok(text.clone()),
            _ => Err(self.mismatch(ValueKind::Text)),
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Value(Value::Null))
    }
}
