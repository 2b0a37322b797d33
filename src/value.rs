//! Schema-less argument values.
//!
//! Memoized functions receive arguments as [`Value`] graphs. Lists and
//! records are reference-counted and compared by identity when the engine
//! decides what changed, so sharing an unchanged sub-value between two
//! arguments (see [`Value::with`]) is what lets the engine skip work.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Entries of a record value, in insertion order.
pub type Record = IndexMap<Rc<str>, Value, ahash::RandomState>;

/// A dynamically shaped value: a primitive, a list or a keyed record.
///
/// `PartialEq` compares structurally. The engine uses [`Value::same`], which
/// compares lists and records by identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or null value.
    #[default]
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// Numeric primitive.
    Number(f64),
    /// Text primitive.
    Text(Rc<str>),
    /// Ordered list of values.
    List(Rc<Vec<Value>>),
    /// Keyed record of values.
    Record(Rc<Record>),
}

/// The kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Null`]
    Null,
    /// [`Value::Bool`]
    Bool,
    /// [`Value::Number`]
    Number,
    /// [`Value::Text`]
    Text,
    /// [`Value::List`]
    List,
    /// [`Value::Record`]
    Record,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Record => "record",
        };
        f.write_str(name)
    }
}

/// A property key: a list index or a record field name.
///
/// Keys are canonical: a name spelled as a plain decimal integer (`"0"`,
/// `"12"`, but not `"012"`) is an [`Key::Index`]. Records store every key as
/// text and look index keys up by their decimal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Position in a list, or a numeric record key.
    Index(usize),
    /// Non-numeric record key.
    Name(Rc<str>),
}

fn canonical_index(name: &str) -> Option<usize> {
    let digits = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
    if !digits || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse().ok()
}

impl Key {
    fn from_name(name: &Rc<str>) -> Self {
        match canonical_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(name.clone()),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Key::Index(index as usize)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::Index(index),
            Err(_) => Key::Name(index.to_string().into()),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match canonical_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(name.into()),
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::from(name.as_str())
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::from_name(&name)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl Value {
    /// Build a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build a record value. Later entries overwrite earlier ones with the same key.
    pub fn record<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Value::Record(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Returns true for lists and records, the values the engine mirrors with nodes.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Record(_))
    }

    /// Identity comparison: primitives by value, lists and records by pointer.
    ///
    /// ```
    /// use autotrack::Value;
    ///
    /// let a = Value::record([("x", 1)]);
    /// let b = Value::record([("x", 1)]);
    /// assert_eq!(a, b);
    /// assert!(!a.same(&b));
    /// assert!(a.same(&a.clone()));
    /// ```
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Look up the value stored under `key`. Primitives have no keys.
    pub fn lookup(&self, key: &Key) -> Option<&Value> {
        match (self, key) {
            (Value::List(items), Key::Index(index)) => items.get(*index),
            (Value::Record(entries), Key::Name(name)) => entries.get(&**name),
            (Value::Record(entries), Key::Index(index)) => entries.get(index.to_string().as_str()),
            _ => None,
        }
    }

    /// Value under `key`, or `Null` when absent.
    pub(crate) fn at(&self, key: &Key) -> Value {
        self.lookup(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns true if `key` addresses an entry of this value.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.lookup(key).is_some()
    }

    /// Keys of this value in order: indices for lists, field names for records.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Value::List(items) => (0..items.len()).map(Key::Index).collect(),
            Value::Record(entries) => entries.keys().map(Key::from_name).collect(),
            _ => Vec::new(),
        }
    }

    /// Number of keys for lists and records, characters for text, 0 otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::List(items) => items.len(),
            Value::Record(entries) => entries.len(),
            Value::Text(text) => text.chars().count(),
            _ => 0,
        }
    }

    /// Returns true if [`Value::len`] is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shallow copy with `key` set to `value`, sharing every other entry.
    ///
    /// On a list, an index past the end pads with `Null`. On a record, a new
    /// key is appended. Primitives are replaced by a one-entry record.
    pub fn with(&self, key: impl Into<Key>, value: impl Into<Value>) -> Value {
        let key = key.into();
        let value = value.into();
        match (self, &key) {
            (Value::List(items), Key::Index(index)) => {
                let mut items = Vec::clone(items);
                if *index >= items.len() {
                    items.resize(*index + 1, Value::Null);
                }
                items[*index] = value;
                Value::List(Rc::new(items))
            }
            (Value::Record(entries), _) => {
                let mut entries = Record::clone(entries);
                entries.insert(key.to_string().into(), value);
                Value::Record(Rc::new(entries))
            }
            _ => Value::record([(key.to_string(), value)]),
        }
    }

    /// Shallow copy without `key`, sharing every other entry.
    ///
    /// Removing a list index shifts the following items down.
    pub fn without(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match (self, &key) {
            (Value::List(items), Key::Index(index)) if *index < items.len() => {
                let mut items = Vec::clone(items);
                items.remove(*index);
                Value::List(Rc::new(items))
            }
            (Value::Record(entries), _) => {
                let mut entries = Record::clone(entries);
                entries.shift_remove(key.to_string().as_str());
                Value::Record(Rc::new(entries))
            }
            _ => self.clone(),
        }
    }

    /// Number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.into())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(text: Rc<str>) -> Self {
        Value::Text(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<Record> for Value {
    fn from(entries: Record) -> Self {
        Value::Record(Rc::new(entries))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_keys() {
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("42"), Key::Index(42));
        assert_eq!(Key::from("042"), Key::Name("042".into()));
        assert_eq!(Key::from(""), Key::Name("".into()));
        assert_eq!(Key::from("-1"), Key::Name("-1".into()));
        assert_eq!(Key::from("x"), Key::Name("x".into()));
        assert_eq!(Key::from(-1), Key::Name("-1".into()));
        assert_eq!(Key::from(3), Key::Index(3));
    }

    #[test]
    fn test_record_index_lookup() {
        let record = Value::record([("1", "one"), ("a", "letter")]);
        assert_eq!(record.lookup(&Key::Index(1)), Some(&Value::from("one")));
        assert_eq!(record.keys(), vec![Key::Index(1), Key::from("a")]);
        assert!(record.contains_key(&Key::from("a")));
        assert!(!record.contains_key(&Key::Index(0)));
    }

    #[test]
    fn test_list_lookup() {
        let list = Value::list([1, 2, 3]);
        assert_eq!(list.lookup(&Key::Index(2)), Some(&Value::Number(3.0)));
        assert_eq!(list.lookup(&Key::Index(3)), None);
        assert_eq!(list.lookup(&Key::from("length")), None);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_primitives_have_no_keys() {
        assert!(Value::Number(1.0).keys().is_empty());
        assert_eq!(Value::Null.at(&Key::from("a")), Value::Null);
        assert_eq!(Value::from("héllo").len(), 5);
    }

    #[test]
    fn test_same_is_identity_for_containers() {
        let list = Value::list([1]);
        assert!(list.same(&list.clone()));
        assert!(!list.same(&Value::list([1])));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(!Value::Null.same(&Value::Bool(false)));
    }

    #[test]
    fn test_with_shares_untouched_entries() {
        let inner = Value::record([("x", 1)]);
        let state = Value::record([("a", inner.clone()), ("b", Value::from(2))]);
        let next = state.with("b", 3);
        assert!(!next.same(&state));
        assert!(next.at(&Key::from("a")).same(&inner));
        assert_eq!(next.at(&Key::from("b")), Value::Number(3.0));
        assert_eq!(next.keys(), state.keys());
    }

    #[test]
    fn test_with_pads_lists() {
        let list = Value::list([1]).with(2, "z");
        assert_eq!(list, Value::list([Value::from(1), Value::Null, Value::from("z")]));
    }

    #[test]
    fn test_without() {
        let record = Value::record([("a", 1), ("b", 2)]);
        assert_eq!(record.without("a").keys(), vec![Key::from("b")]);
        let list = Value::list([1, 2, 3]).without(0);
        assert_eq!(list, Value::list([2, 3]));
        assert!(Value::Null.without("a").is_null());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Value::list(Vec::<Value>::new()).kind().to_string(), "list");
        assert_eq!(ValueKind::Record.to_string(), "record");
    }
}
