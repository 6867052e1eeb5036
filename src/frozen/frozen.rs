use super::path::{Path, Segment};
use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// A read-only view over a shared state tree.
///
/// Wrapping is cheap: the tree is moved behind an `Arc` once, and every
/// child reached through [`get`](Frozen::get), [`at`](Frozen::at) or
/// iteration is a new view over the same allocation. Nothing below the
/// wrapped node is copied until [`to_value`](Frozen::to_value) is asked for
/// a mutable copy.
///
/// There is no `&mut` access to the tree. [`set`](Frozen::set) exists only
/// to reject writes with a descriptive error.
///
/// # Examples
///
/// ```
/// use glassbil::Frozen;
/// use serde_json::json;
///
/// let state = Frozen::wrap(json!([{"id": 1, "done": false}]));
/// let first = state.index(0).unwrap();
/// assert_eq!(first.field("id").and_then(|id| id.as_i64()), Some(1));
/// assert!(first.set("done", true).is_err());
///
/// let mut plain = state.to_value();
/// plain[0]["done"] = json!(true);
/// assert_eq!(state.at("0.done").and_then(|d| d.as_bool()), Some(false));
/// ```
#[derive(Clone)]
pub struct Frozen {
    root: Arc<Value>,
    path: Arc<[Segment]>,
}

impl Frozen {
    /// Freeze `value`. Primitives are wrapped too; they simply have no children.
    pub fn wrap(value: Value) -> Self {
        Self {
            root: Arc::new(value),
            path: Arc::from(Vec::new()),
        }
    }

    /// The initial snapshot of every store: an empty array.
    pub fn empty() -> Self {
        Self::wrap(Value::Array(Vec::new()))
    }

    /// Serialize any value into a frozen tree.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::wrap(serde_json::to_value(value)?))
    }

    /// Read the wrapped node back into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(self.node())?)
    }

    fn node(&self) -> &Value {
        self.path
            .iter()
            .try_fold(&*self.root, |node, segment| segment.lookup(node))
            .unwrap_or(&NULL)
    }

    fn child(&self, segment: Segment) -> Self {
        let mut path = self.path.to_vec();
        path.push(segment);
        Self {
            root: Arc::clone(&self.root),
            path: Arc::from(path),
        }
    }

    /// Borrow the wrapped node. The borrow cannot be used to mutate.
    pub fn as_value(&self) -> &Value {
        self.node()
    }

    /// A view of the child at `segment`, if present.
    pub fn get(&self, segment: impl Into<Segment>) -> Option<Frozen> {
        let segment = segment.into();
        segment.lookup(self.node())?;
        Some(self.child(segment))
    }

    pub fn field(&self, key: &str) -> Option<Frozen> {
        self.get(key)
    }

    pub fn index(&self, index: usize) -> Option<Frozen> {
        self.get(index)
    }

    /// A view of the node at a dot path relative to this one.
    pub fn at(&self, path: impl Into<Path>) -> Option<Frozen> {
        let path = path.into();
        path.resolve(self.node())?;
        let mut segments = self.path.to_vec();
        segments.extend(path.segments().iter().cloned());
        Some(Self {
            root: Arc::clone(&self.root),
            path: Arc::from(segments),
        })
    }

    /// Always fails: frozen views cannot be written to.
    ///
    /// The error names the property and the value that was rejected.
    pub fn set(&self, segment: impl Into<Segment>, value: impl Into<Value>) -> Result<()> {
        Err(StoreError::Immutable {
            property: segment.into().to_string(),
            value: value.into().to_string(),
        })
    }

    /// A plain, fully mutable deep copy of the wrapped node.
    pub fn to_value(&self) -> Value {
        self.node().clone()
    }

    /// Like [`to_value`](Frozen::to_value), but skips the copy when this view
    /// is the sole owner of its tree.
    pub fn into_value(self) -> Value {
        if !self.path.is_empty() {
            return self.to_value();
        }
        Arc::try_unwrap(self.root).unwrap_or_else(|shared| (*shared).clone())
    }

    /// `true` when both views point at the same node of the same allocation.
    pub fn ptr_eq(a: &Frozen, b: &Frozen) -> bool {
        Arc::ptr_eq(&a.root, &b.root) && a.path == b.path
    }

    pub fn is_null(&self) -> bool {
        self.node().is_null()
    }

    pub fn is_array(&self) -> bool {
        self.node().is_array()
    }

    pub fn is_object(&self) -> bool {
        self.node().is_object()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.node().as_str()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.node().as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.node().as_u64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.node().as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.node().as_bool()
    }

    /// Element count for arrays, entry count for objects, zero otherwise.
    pub fn len(&self) -> usize {
        match self.node() {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Object keys in map order. Empty for anything that is not an object.
    pub fn keys(&self) -> Vec<String> {
        match self.node() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Views over each object entry.
    pub fn entries(&self) -> Vec<(String, Frozen)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let view = self.child(Segment::Key(key.clone()));
                (key, view)
            })
            .collect()
    }

    /// Views over each array element. Non-arrays yield nothing.
    pub fn iter(&self) -> impl Iterator<Item = Frozen> + '_ {
        let len = match self.node() {
            Value::Array(items) => items.len(),
            _ => 0,
        };
        (0..len).map(move |index| self.child(Segment::Index(index)))
    }

    /// Build a new frozen array from `f` applied to each element.
    pub fn map<F, R>(&self, mut f: F) -> Frozen
    where
        F: FnMut(Frozen) -> R,
        R: Into<Value>,
    {
        Frozen::wrap(Value::Array(self.iter().map(|item| f(item).into()).collect()))
    }

    /// A new frozen array holding the elements for which `predicate` holds.
    pub fn filter<F>(&self, mut predicate: F) -> Frozen
    where
        F: FnMut(&Frozen) -> bool,
    {
        Frozen::wrap(Value::Array(
            self.iter()
                .filter(|item| predicate(item))
                .map(|item| item.to_value())
                .collect(),
        ))
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<Frozen>
    where
        F: FnMut(&Frozen) -> bool,
    {
        self.iter().find(|item| predicate(item))
    }

    pub fn position<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&Frozen) -> bool,
    {
        self.iter().position(|item| predicate(&item))
    }

    /// Index of the first element equal to `needle`.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        match self.node() {
            Value::Array(items) => items.iter().position(|item| item == needle),
            _ => None,
        }
    }

    /// A new frozen array copied from `range`, clamped to the array bounds.
    pub fn slice(&self, range: Range<usize>) -> Frozen {
        let items = match self.node() {
            Value::Array(items) => {
                let end = range.end.min(items.len());
                let start = range.start.min(end);
                items[start..end].to_vec()
            }
            _ => Vec::new(),
        };
        Frozen::wrap(Value::Array(items))
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(Frozen),
    {
        self.iter().for_each(f);
    }

    pub fn some<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&Frozen) -> bool,
    {
        self.iter().any(|item| predicate(&item))
    }

    pub fn every<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&Frozen) -> bool,
    {
        self.iter().all(|item| predicate(&item))
    }
}

impl Default for Frozen {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Frozen {
    fn from(value: Value) -> Self {
        Self::wrap(value)
    }
}

impl From<Frozen> for Value {
    fn from(frozen: Frozen) -> Self {
        frozen.into_value()
    }
}

impl PartialEq for Frozen {
    fn eq(&self, other: &Self) -> bool {
        Frozen::ptr_eq(self, other) || self.node() == other.node()
    }
}

impl PartialEq<Value> for Frozen {
    fn eq(&self, other: &Value) -> bool {
        self.node() == other
    }
}

impl Serialize for Frozen {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.node().serialize(serializer)
    }
}

impl fmt::Debug for Frozen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frozen").field(self.node()).finish()
    }
}

impl fmt::Display for Frozen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node())
    }
}
