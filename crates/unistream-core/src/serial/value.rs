//! The dynamic value model used for untyped documents.

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::errno::{Result, StreamError};

use super::base::{BaseKind, ContainerBase, Scalar, downcast_mut};

/// A self-describing value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The scalar this value holds, if it is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<Scalar<'_>> {
        Some(match self {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Int(n) => Scalar::Int(*n),
            Value::Uint(n) => Scalar::Uint(*n),
            Value::Float(f) => Scalar::Float(*f),
            Value::Text(s) => Scalar::Text(s),
            Value::Binary(b) => Scalar::Bytes(b),
            Value::List(_) | Value::Map(_) => return None,
        })
    }

    #[must_use]
    pub fn from_scalar(scalar: Scalar<'_>) -> Self {
        match scalar {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(n) => Value::Int(n),
            Scalar::Uint(n) => Value::Uint(n),
            Scalar::Float(f) => Value::Float(f),
            Scalar::Text(s) => Value::Text(s.to_owned()),
            Scalar::Bytes(b) => Value::Binary(b.to_vec()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BaseKind {
        match self {
            Value::Null => BaseKind::Null,
            Value::Bool(_) => BaseKind::Bool,
            Value::Int(_) => BaseKind::Signed,
            Value::Uint(_) => BaseKind::Unsigned,
            Value::Float(_) => BaseKind::Float,
            Value::Text(_) => BaseKind::Text,
            Value::Binary(_) => BaseKind::Binary,
            Value::List(_) => BaseKind::List,
            Value::Map(_) => BaseKind::Map,
        }
    }
}

/// Integers compare by value across `Int` and `Uint`, so a document that
/// parses `5` as unsigned equals one built with `Value::Int(5)`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Int(a), Value::Uint(b)) | (Value::Uint(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

fn value_create() -> Box<dyn Any> {
    Box::new(Value::Null)
}

fn value_view(data: &dyn Any) -> Option<Scalar<'_>> {
    data.downcast_ref::<Value>()?.as_scalar()
}

fn value_store(data: &mut dyn Any, scalar: Scalar<'_>) -> Result<()> {
    *downcast_mut::<Value>(data)? = Value::from_scalar(scalar);
    Ok(())
}

fn value_compare(a: &dyn Any, b: &dyn Any) -> Option<std::cmp::Ordering> {
    let (a, b) = (a.downcast_ref::<Value>()?, b.downcast_ref::<Value>()?);
    match (a.as_scalar()?, b.as_scalar()?) {
        (Scalar::Int(x), Scalar::Int(y)) => x.partial_cmp(&y),
        (Scalar::Uint(x), Scalar::Uint(y)) => x.partial_cmp(&y),
        (Scalar::Float(x), Scalar::Float(y)) => x.partial_cmp(&y),
        (Scalar::Text(x), Scalar::Text(y)) => x.partial_cmp(y),
        (Scalar::Bytes(x), Scalar::Bytes(y)) => x.partial_cmp(y),
        (Scalar::Bool(x), Scalar::Bool(y)) => x.partial_cmp(&y),
        (Scalar::Null, Scalar::Null) => Some(std::cmp::Ordering::Equal),
        _ => None,
    }
}

/// The base for [`Value`].
#[must_use]
pub fn value_base() -> ContainerBase {
    ContainerBase {
        name: Cow::Borrowed("value"),
        kind: BaseKind::Dynamic,
        size: std::mem::size_of::<Value>(),
        native_format: Cow::Borrowed("json"),
        serialize: Some(super::json::serialize_json),
        parse: Some(super::json::parse_json),
        compare: Some(value_compare),
        scalar: Some(value_view),
        store: Some(value_store),
        create: value_create,
        collection: None,
        key_child: None,
        value_child: None,
    }
}

/// Put `value` into `data`, a value of the type `base` describes.
///
/// Collections go through the base's `create`/`clear`/`insert` callbacks,
/// recursively.
pub fn assign(data: &mut dyn Any, base: &ContainerBase, value: Value) -> Result<()> {
    match base.kind {
        BaseKind::Dynamic => {
            *downcast_mut::<Value>(data)? = value;
            Ok(())
        }
        BaseKind::List => {
            let Value::List(items) = value else {
                return Err(StreamError::InvalidArgument);
            };
            let ops = *base.collection()?;
            let child = base.value_child()?;
            (ops.clear)(data)?;
            for item in items {
                let mut slot = (child.create)();
                assign(slot.as_mut(), child, item)?;
                (ops.insert)(data, None, slot)?;
            }
            Ok(())
        }
        BaseKind::Map => {
            let Value::Map(entries) = value else {
                return Err(StreamError::InvalidArgument);
            };
            let ops = *base.collection()?;
            let key_base = base.key_child()?;
            let child = base.value_child()?;
            (ops.clear)(data)?;
            for (k, v) in entries {
                let mut key = (key_base.create)();
                assign(key.as_mut(), key_base, Value::Text(k))?;
                let mut slot = (child.create)();
                assign(slot.as_mut(), child, v)?;
                (ops.insert)(data, Some(key), slot)?;
            }
            Ok(())
        }
        BaseKind::Opaque => Err(StreamError::NotSupported),
        _ => {
            let store = base.store.ok_or(StreamError::NotSupported)?;
            let scalar = value.as_scalar().ok_or(StreamError::InvalidArgument)?;
            store(data, scalar)
        }
    }
}

/// Build a [`Value`] from `data`, a value of the type `base` describes.
pub fn to_value(data: &dyn Any, base: &ContainerBase) -> Result<Value> {
    match base.kind {
        BaseKind::Dynamic => Ok(super::base::downcast::<Value>(data)?.clone()),
        BaseKind::List => {
            let ops = base.collection()?;
            let child = base.value_child()?;
            let items = (ops.iter)(data).ok_or(StreamError::InvalidArgument)?;
            items
                .map(|(_, v)| to_value(v, child))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        BaseKind::Map => {
            let ops = base.collection()?;
            let key_base = base.key_child()?;
            let child = base.value_child()?;
            let entries = (ops.iter)(data).ok_or(StreamError::InvalidArgument)?;
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let k = k.ok_or(StreamError::InvalidArgument)?;
                let Scalar::Text(key) = key_base.scalar_of(k)? else {
                    return Err(StreamError::InvalidArgument);
                };
                map.insert(key.to_owned(), to_value(v, child)?);
            }
            Ok(Value::Map(map))
        }
        BaseKind::Opaque => Err(StreamError::NotSupported),
        _ => Ok(Value::from_scalar(base.scalar_of(data)?)),
    }
}
