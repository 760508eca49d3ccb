//! Typed-value serialization: container bases, the dynamic [`Value`]
//! model, and the builtin `utf8`, `json` and `base64` formats.

pub mod base;
pub mod dispatch;
pub mod json;
pub mod text;
pub mod value;

pub use base::{
    BaseKind, CollectionOps, CompareFn, ContainerBase, Entry, Identity, ParseFn, Scalar,
    ScalarType, SerializeFn, list_base, map_base, null_base, scalar_base,
};
pub use dispatch::{parse, serialize};
pub use json::{read_json, write_json};
pub use value::{Value, assign, to_value, value_base};
