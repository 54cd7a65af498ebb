//! Dynamic values moved through the engine.
//!
//! Reference kinds (`Text`, `List`, `Map`, `Object`) share their storage
//! behind an `Arc`, so "the same value" has a precise meaning: see
//! [`Value::same`]. Non-singleton constant bindings hand out
//! [`Value::deep_copy`]s so callers can mutate results freely.

use crate::key::Key;
use crate::producers::ProducerRef;
use crate::types::TypeId;
use indexmap::IndexMap;
use injex_common::Atom;
use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type Shared<T> = Arc<RwLock<T>>;
pub type ValueMap = IndexMap<Arc<str>, Value>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Atomic enum-like token.
    Token(Atom),
    /// Frozen text.
    Str(Arc<str>),
    /// Mutable text buffer.
    Text(Shared<String>),
    List(Shared<Vec<Value>>),
    Map(Shared<ValueMap>),
    Object(Arc<Instance>),
    Key(Key),
    Producer(ProducerRef),
    /// Opaque host handle; never copied or inspected.
    Native(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Arc::new(RwLock::new(s.into())))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    pub fn map<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(Arc::new(RwLock::new(
            entries
                .into_iter()
                .map(|(k, v)| (Arc::from(k.as_ref()), v))
                .collect(),
        )))
    }

    pub fn from_map(map: ValueMap) -> Self {
        Self::Map(Arc::new(RwLock::new(map)))
    }

    pub fn object(instance: Instance) -> Self {
        Self::Object(Arc::new(instance))
    }

    pub fn native<T: Any + Send + Sync>(value: T) -> Self {
        Self::Native(Arc::new(value))
    }

    /// Identity comparison: storage identity for reference kinds, equality
    /// for immediates.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Producer(a), Self::Producer(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            (Self::Text(_) | Self::List(_) | Self::Map(_) | Self::Object(_), _) => false,
            _ => self == other,
        }
    }

    /// Values that can be handed out repeatedly without copying.
    pub fn is_immutable(&self) -> bool {
        !matches!(
            self,
            Self::Text(_) | Self::List(_) | Self::Map(_) | Self::Object(_)
        )
    }

    /// Fresh storage for every mutable component, recursively.
    pub fn deep_copy(&self) -> Value {
        match self {
            Self::Text(s) => Self::text(read(s).clone()),
            Self::List(items) => Self::list(read(items).iter().map(Value::deep_copy)),
            Self::Map(map) => Self::from_map(
                read(map)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            Self::Object(instance) => Self::Object(Arc::new(instance.deep_copy())),
            other => other.clone(),
        }
    }

    /// Built-in type of this value (class for objects).
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Nil => TypeId::NIL,
            Self::Bool(_) => TypeId::BOOLEAN,
            Self::Int(_) => TypeId::INTEGER,
            Self::Float(_) => TypeId::FLOAT,
            Self::Token(_) => TypeId::TOKEN,
            Self::Str(_) | Self::Text(_) => TypeId::TEXT,
            Self::List(_) => TypeId::SEQUENCE,
            Self::Map(_) => TypeId::MAPPING,
            Self::Object(instance) => instance.class(),
            Self::Key(_) => TypeId::KEY,
            Self::Producer(_) => TypeId::PRODUCER,
            Self::Native(_) => TypeId::ANY,
        }
    }

    /// Scalars, and lists/maps made only of data.
    pub fn is_data(&self) -> bool {
        match self {
            Self::Nil
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Token(_)
            | Self::Str(_)
            | Self::Text(_) => true,
            Self::List(items) => read(items).iter().all(Value::is_data),
            Self::Map(map) => read(map).values().all(Value::is_data),
            _ => false,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text content of `Str` or `Text`.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.to_string()),
            Self::Text(s) => Some(read(s).clone()),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<Key> {
        match self {
            Self::Key(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_producer(&self) -> Option<&ProducerRef> {
        match self {
            Self::Producer(producer) => Some(producer),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Instance>> {
        match self {
            Self::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn downcast_native<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Native(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Copy of the list's current elements.
    pub fn list_snapshot(&self) -> Option<Vec<Value>> {
        match self {
            Self::List(items) => Some(read(items).clone()),
            _ => None,
        }
    }

    /// Copy of the map's current entries.
    pub fn map_snapshot(&self) -> Option<ValueMap> {
        match self {
            Self::Map(map) => Some(read(map).clone()),
            _ => None,
        }
    }

    /// Entry `name` of a map value; `None` for non-maps.
    pub fn map_get(&self, name: &str) -> Option<Value> {
        match self {
            Self::Map(map) => read(map).get(name).cloned(),
            _ => None,
        }
    }

    /// Append to a list value in place. Returns `false` for non-lists.
    pub fn push(&self, item: Value) -> bool {
        match self {
            Self::List(items) => {
                write(items).push(item);
                true
            }
            _ => false,
        }
    }

    /// Insert into a map value in place. Returns `false` for non-maps.
    pub fn insert(&self, name: &str, item: Value) -> bool {
        match self {
            Self::Map(map) => {
                write(map).insert(Arc::from(name), item);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(read(items).len()),
            Self::Map(map) => Some(read(map).len()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Token(a), Self::Token(b)) => a == b,
            (Self::Key(a), Self::Key(b)) => a == b,
            (Self::Str(_) | Self::Text(_), Self::Str(_) | Self::Text(_)) => {
                self.as_string() == other.as_string()
            }
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || *read(a) == *read(b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || *read(a) == *read(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b) || **a == **b,
            (Self::Producer(a), Self::Producer(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Token(atom) => write!(f, ":{}", atom.0),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Text(s) => write!(f, "{:?}", *read(s)),
            Self::List(items) => f.debug_list().entries(read(items).iter()).finish(),
            Self::Map(map) => f.debug_map().entries(read(map).iter()).finish(),
            Self::Object(instance) => write!(f, "{instance:?}"),
            Self::Key(key) => write!(f, "{key:?}"),
            Self::Producer(producer) => write!(f, "<producer {:?}>", producer.kind()),
            Self::Native(_) => f.write_str("<native>"),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::str(value)
    }
}

impl From<Key> for Value {
    fn from(value: Key) -> Self {
        Self::Key(value)
    }
}

impl From<ProducerRef> for Value {
    fn from(value: ProducerRef) -> Self {
        Self::Producer(value)
    }
}

// =============================================================================
// Instance
// =============================================================================

/// A constructed class instance with mutable fields.
pub struct Instance {
    class: TypeId,
    fields: RwLock<ValueMap>,
}

impl Instance {
    pub fn new(class: TypeId) -> Self {
        Self {
            class,
            fields: RwLock::new(ValueMap::new()),
        }
    }

    pub fn with_field(self, name: &str, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn class(&self) -> TypeId {
        self.class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        read(&self.fields).get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        write(&self.fields).insert(Arc::from(name), value);
    }

    pub fn deep_copy(&self) -> Instance {
        Instance {
            class: self.class,
            fields: RwLock::new(
                read(&self.fields)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && *read(&self.fields) == *read(&other.fields)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.0)
            .field("fields", &*read(&self.fields))
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/value_tests.rs"]
mod tests;
