//! Container bases: per-type descriptors that carry the serializer, the
//! parser and, for collections, iteration and insertion.
//!
//! Values travel as `&dyn Any`; each callback downcasts to the concrete
//! type it was built for and reports `InvalidArgument` on a mismatch.

use std::any::Any;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errno::{Result, StreamError};
use crate::stream::Stream;

/// Format-negotiation record passed to serializers and parsers.
///
/// On the way in, `format` names the format the caller asked for (empty for
/// "whatever is native"). On the way out, it names what was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub format: Cow<'static, str>,
    pub utf8: bool,
    pub written: usize,
}

impl Identity {
    #[must_use]
    pub fn requesting(format: impl Into<Cow<'static, str>>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }
}

/// Write `data` (described by the base) to the stream.
pub type SerializeFn = fn(&mut Stream, &dyn Any, &ContainerBase, &mut Identity) -> Result<()>;
/// Read a value from the stream into `data` (described by the base).
pub type ParseFn = fn(&mut Stream, &mut dyn Any, &ContainerBase, &mut Identity) -> Result<()>;
/// Order two values of the base's type.
pub type CompareFn = fn(&dyn Any, &dyn Any) -> Option<Ordering>;

/// Shape of the values a base describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    Null,
    Bool,
    Signed,
    Unsigned,
    Float,
    Text,
    Binary,
    List,
    Map,
    /// A [`crate::serial::Value`] of any shape.
    Dynamic,
    /// No structure visible; only the base's own serializer knows the value.
    Opaque,
}

/// A scalar read out of, or stored into, a typed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// One element of a collection: the key is `None` for lists.
pub type Entry<'a> = (Option<&'a dyn Any>, &'a dyn Any);

/// Collection callbacks.
#[derive(Clone, Copy)]
pub struct CollectionOps {
    pub iter: for<'a> fn(&'a dyn Any) -> Option<Box<dyn Iterator<Item = Entry<'a>> + 'a>>,
    pub len: fn(&dyn Any) -> Option<usize>,
    pub clear: fn(&mut dyn Any) -> Result<()>,
    pub insert: fn(&mut dyn Any, Option<Box<dyn Any>>, Box<dyn Any>) -> Result<()>,
}

/// Descriptor of a value type.
#[derive(Clone)]
pub struct ContainerBase {
    pub name: Cow<'static, str>,
    pub kind: BaseKind,
    /// `size_of` the value type.
    pub size: usize,
    /// The format [`Self::serialize`] produces, e.g. `utf8`.
    pub native_format: Cow<'static, str>,
    pub serialize: Option<SerializeFn>,
    pub parse: Option<ParseFn>,
    pub compare: Option<CompareFn>,
    /// Read a scalar view of a value; scalar kinds only.
    pub scalar: Option<for<'a> fn(&'a dyn Any) -> Option<Scalar<'a>>>,
    /// Store a scalar into a value; scalar kinds only.
    pub store: Option<fn(&mut dyn Any, Scalar<'_>) -> Result<()>>,
    /// A fresh default value.
    pub create: fn() -> Box<dyn Any>,
    pub collection: Option<CollectionOps>,
    pub key_child: Option<Arc<ContainerBase>>,
    pub value_child: Option<Arc<ContainerBase>>,
}

impl fmt::Debug for ContainerBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBase")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("native_format", &self.native_format)
            .finish_non_exhaustive()
    }
}

impl ContainerBase {
    /// An opaque base around a serializer; the usual way to register a
    /// user type.
    #[must_use]
    pub fn opaque<T: Any + Default>(name: impl Into<Cow<'static, str>>, serialize: SerializeFn) -> Self {
        Self {
            name: name.into(),
            kind: BaseKind::Opaque,
            size: std::mem::size_of::<T>(),
            native_format: Cow::Borrowed("utf8"),
            serialize: Some(serialize),
            parse: None,
            compare: None,
            scalar: None,
            store: None,
            create: create_default::<T>,
            collection: None,
            key_child: None,
            value_child: None,
        }
    }

    #[must_use]
    pub fn with_parse(mut self, parse: ParseFn) -> Self {
        self.parse = Some(parse);
        self
    }

    /// Scalar view of `data`, or `InvalidArgument` if the base has none or
    /// the value is of another type.
    pub fn scalar_of<'a>(&self, data: &'a dyn Any) -> Result<Scalar<'a>> {
        self.scalar
            .and_then(|f| f(data))
            .ok_or(StreamError::InvalidArgument)
    }

    pub fn collection(&self) -> Result<&CollectionOps> {
        self.collection.as_ref().ok_or(StreamError::InvalidArgument)
    }

    pub fn value_child(&self) -> Result<&Arc<ContainerBase>> {
        self.value_child.as_ref().ok_or(StreamError::InvalidArgument)
    }

    pub fn key_child(&self) -> Result<&Arc<ContainerBase>> {
        self.key_child.as_ref().ok_or(StreamError::InvalidArgument)
    }
}

fn create_default<T: Any + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

pub(crate) fn downcast<T: Any>(data: &dyn Any) -> Result<&T> {
    data.downcast_ref::<T>().ok_or(StreamError::InvalidArgument)
}

pub(crate) fn downcast_mut<T: Any>(data: &mut dyn Any) -> Result<&mut T> {
    data.downcast_mut::<T>().ok_or(StreamError::InvalidArgument)
}

pub(crate) fn unbox<T: Any>(data: Box<dyn Any>) -> Result<T> {
    data.downcast::<T>()
        .map(|b| *b)
        .map_err(|_| StreamError::InvalidArgument)
}

// ---------------------------------------------------------------------------
// Scalar bases
// ---------------------------------------------------------------------------

fn compare_partial<T: Any + PartialOrd>(a: &dyn Any, b: &dyn Any) -> Option<Ordering> {
    a.downcast_ref::<T>()?.partial_cmp(b.downcast_ref::<T>()?)
}

/// Rust types with a scalar base.
pub trait ScalarType: Any + Default + PartialOrd + Send + Sync {
    const KIND: BaseKind;
    const NAME: &'static str;
    fn view(&self) -> Scalar<'_>;
    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()>;
}

fn scalar_view<T: ScalarType>(data: &dyn Any) -> Option<Scalar<'_>> {
    data.downcast_ref::<T>().map(ScalarType::view)
}

fn scalar_store<T: ScalarType>(data: &mut dyn Any, scalar: Scalar<'_>) -> Result<()> {
    downcast_mut::<T>(data)?.assign(scalar)
}

/// The base for a scalar type. Its own serializer writes the UTF-8 text
/// form.
#[must_use]
pub fn scalar_base<T: ScalarType>() -> ContainerBase {
    ContainerBase {
        name: Cow::Borrowed(T::NAME),
        kind: T::KIND,
        size: std::mem::size_of::<T>(),
        native_format: Cow::Borrowed("utf8"),
        serialize: Some(super::text::serialize_utf8),
        parse: Some(super::text::parse_utf8),
        compare: Some(compare_partial::<T>),
        scalar: Some(scalar_view::<T>),
        store: Some(scalar_store::<T>),
        create: create_default::<T>,
        collection: None,
        key_child: None,
        value_child: None,
    }
}

fn null_view(data: &dyn Any) -> Option<Scalar<'_>> {
    data.downcast_ref::<()>().map(|()| Scalar::Null)
}

fn null_store(data: &mut dyn Any, scalar: Scalar<'_>) -> Result<()> {
    match scalar {
        Scalar::Null => downcast_mut::<()>(data).map(|_| ()),
        _ => Err(StreamError::InvalidArgument),
    }
}

/// The `null` base, over `()`.
#[must_use]
pub fn null_base() -> ContainerBase {
    ContainerBase {
        name: Cow::Borrowed("null"),
        kind: BaseKind::Null,
        size: 0,
        native_format: Cow::Borrowed("utf8"),
        serialize: Some(super::text::serialize_utf8),
        parse: Some(super::text::parse_utf8),
        compare: Some(compare_partial::<()>),
        scalar: Some(null_view),
        store: Some(null_store),
        create: create_default::<()>,
        collection: None,
        key_child: None,
        value_child: None,
    }
}

impl ScalarType for bool {
    const KIND: BaseKind = BaseKind::Bool;
    const NAME: &'static str = "bool";

    fn view(&self) -> Scalar<'_> {
        Scalar::Bool(*self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        match scalar {
            Scalar::Bool(b) => *self = b,
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }
}

impl ScalarType for i64 {
    const KIND: BaseKind = BaseKind::Signed;
    const NAME: &'static str = "i64";

    fn view(&self) -> Scalar<'_> {
        Scalar::Int(*self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        *self = match scalar {
            Scalar::Int(n) => n,
            Scalar::Uint(n) => i64::try_from(n).map_err(|_| StreamError::Overflow)?,
            _ => return Err(StreamError::InvalidArgument),
        };
        Ok(())
    }
}

impl ScalarType for u64 {
    const KIND: BaseKind = BaseKind::Unsigned;
    const NAME: &'static str = "u64";

    fn view(&self) -> Scalar<'_> {
        Scalar::Uint(*self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        *self = match scalar {
            Scalar::Uint(n) => n,
            Scalar::Int(n) => u64::try_from(n).map_err(|_| StreamError::Overflow)?,
            _ => return Err(StreamError::InvalidArgument),
        };
        Ok(())
    }
}

impl ScalarType for f64 {
    const KIND: BaseKind = BaseKind::Float;
    const NAME: &'static str = "f64";

    fn view(&self) -> Scalar<'_> {
        Scalar::Float(*self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        *self = match scalar {
            Scalar::Float(f) => f,
            Scalar::Int(n) => n as f64,
            Scalar::Uint(n) => n as f64,
            _ => return Err(StreamError::InvalidArgument),
        };
        Ok(())
    }
}

impl ScalarType for String {
    const KIND: BaseKind = BaseKind::Text;
    const NAME: &'static str = "str";

    fn view(&self) -> Scalar<'_> {
        Scalar::Text(self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        match scalar {
            Scalar::Text(s) => s.clone_into(self),
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }
}

impl ScalarType for Vec<u8> {
    const KIND: BaseKind = BaseKind::Binary;
    const NAME: &'static str = "bytes";

    fn view(&self) -> Scalar<'_> {
        Scalar::Bytes(self)
    }

    fn assign(&mut self, scalar: Scalar<'_>) -> Result<()> {
        match scalar {
            Scalar::Bytes(b) => b.clone_into(self),
            Scalar::Text(s) => s.as_bytes().clone_into(self),
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collection bases
// ---------------------------------------------------------------------------

fn vec_iter<T: Any>(data: &dyn Any) -> Option<Box<dyn Iterator<Item = Entry<'_>> + '_>> {
    let v = data.downcast_ref::<Vec<T>>()?;
    Some(Box::new(
        v.iter().map(|item| (None::<&dyn Any>, item as &dyn Any)),
    ))
}

fn vec_len<T: Any>(data: &dyn Any) -> Option<usize> {
    data.downcast_ref::<Vec<T>>().map(Vec::len)
}

fn vec_clear<T: Any>(data: &mut dyn Any) -> Result<()> {
    downcast_mut::<Vec<T>>(data)?.clear();
    Ok(())
}

fn vec_insert<T: Any>(data: &mut dyn Any, _key: Option<Box<dyn Any>>, value: Box<dyn Any>) -> Result<()> {
    let v = downcast_mut::<Vec<T>>(data)?;
    v.push(unbox::<T>(value)?);
    Ok(())
}

/// Base for `Vec<T>`, where `child` describes `T`.
#[must_use]
pub fn list_base<T: Any + Send + Sync>(child: Arc<ContainerBase>) -> ContainerBase {
    ContainerBase {
        name: Cow::Owned(format!("list<{}>", child.name)),
        kind: BaseKind::List,
        size: std::mem::size_of::<Vec<T>>(),
        native_format: Cow::Borrowed("utf8"),
        serialize: Some(super::text::serialize_utf8),
        parse: None,
        compare: None,
        scalar: None,
        store: None,
        create: create_default::<Vec<T>>,
        collection: Some(CollectionOps {
            iter: vec_iter::<T>,
            len: vec_len::<T>,
            clear: vec_clear::<T>,
            insert: vec_insert::<T>,
        }),
        key_child: None,
        value_child: Some(child),
    }
}

fn map_iter<K: Any + Ord, V: Any>(data: &dyn Any) -> Option<Box<dyn Iterator<Item = Entry<'_>> + '_>> {
    let m = data.downcast_ref::<BTreeMap<K, V>>()?;
    Some(Box::new(
        m.iter().map(|(k, v)| (Some(k as &dyn Any), v as &dyn Any)),
    ))
}

fn map_len<K: Any + Ord, V: Any>(data: &dyn Any) -> Option<usize> {
    data.downcast_ref::<BTreeMap<K, V>>().map(BTreeMap::len)
}

fn map_clear<K: Any + Ord, V: Any>(data: &mut dyn Any) -> Result<()> {
    downcast_mut::<BTreeMap<K, V>>(data)?.clear();
    Ok(())
}

fn map_insert<K: Any + Ord, V: Any>(
    data: &mut dyn Any,
    key: Option<Box<dyn Any>>,
    value: Box<dyn Any>,
) -> Result<()> {
    let m = downcast_mut::<BTreeMap<K, V>>(data)?;
    let key = unbox::<K>(key.ok_or(StreamError::InvalidArgument)?)?;
    m.insert(key, unbox::<V>(value)?);
    Ok(())
}

/// Base for `BTreeMap<K, V>`.
#[must_use]
pub fn map_base<K: Any + Ord + Send + Sync, V: Any + Send + Sync>(
    key: Arc<ContainerBase>,
    value: Arc<ContainerBase>,
) -> ContainerBase {
    ContainerBase {
        name: Cow::Owned(format!("map<{}, {}>", key.name, value.name)),
        kind: BaseKind::Map,
        size: std::mem::size_of::<BTreeMap<K, V>>(),
        native_format: Cow::Borrowed("utf8"),
        serialize: Some(super::text::serialize_utf8),
        parse: None,
        compare: None,
        scalar: None,
        store: None,
        create: create_default::<BTreeMap<K, V>>,
        collection: Some(CollectionOps {
            iter: map_iter::<K, V>,
            len: map_len::<K, V>,
            clear: map_clear::<K, V>,
            insert: map_insert::<K, V>,
        }),
        key_child: Some(key),
        value_child: Some(value),
    }
}
