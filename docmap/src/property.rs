//! How Rust types take part in the mapping.
//!
//! Leaf types implement [`Property`]; types with a model implement
//! [`Mapped`] and opt into being used as properties with
//! [`embedded_property!`](crate::embedded_property). Enums stored by constant
//! name are declared with [`mapped_enum!`](crate::mapped_enum).
//!
//! ```ignore
//! struct Address {
//!     street: String,
//!     city: String,
//! }
//!
//! impl Mapped for Address {
//!     fn describe(model: &mut EntityModelBuilder) {
//!         model.embedded(EmbeddedAnnotation::new());
//!         model.property::<String>("street");
//!         model.property::<String>("city");
//!     }
//!
//!     fn to_instance(&self) -> Result<Instance> {
//!         Instance::of::<Self>()
//!             .with("street", &self.street)?
//!             .with("city", &self.city)
//!     }
//!
//!     fn from_instance(mut instance: Instance) -> Result<Self> {
//!         Ok(Self {
//!             street: instance.take("street")?,
//!             city: instance.take("city")?,
//!         })
//!     }
//! }
//!
//! embedded_property!(Address);
//! ```

use crate::{
    codec::scalar,
    error::{Error, Result},
    mapping::{EntityModelBuilder, EnumSpec, KeyKind, ScalarKind, SequenceKind, TypeKey, TypeShape},
    value::{Instance, MapKey, Pointer, Value},
};
use mongodb::bson::{self, Binary, Bson, Document, Uuid, oid::ObjectId};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::Hash,
};

/// A type with an entity model.
///
/// `from_instance` is the construction path: every decoded property is
/// handed over by name, so immutable fields and types without a default
/// constructor decode like any other.
pub trait Mapped: Sized + Send + Sync + 'static {
    fn describe(model: &mut EntityModelBuilder);

    fn to_instance(&self) -> Result<Instance>;

    fn from_instance(instance: Instance) -> Result<Self>;
}

/// A Rust type usable as the type of a mapped property.
pub trait Property: Sized {
    fn shape() -> TypeShape;

    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Result<Value>;

    fn from_value(value: Value) -> Result<Self>;
}

/// A Rust type usable as the key of a mapped map.
pub trait KeyProperty: Sized {
    fn key_kind() -> KeyKind;

    fn to_key(&self) -> MapKey;

    fn from_key(key: MapKey) -> Result<Self>;
}

/// A fieldless enum stored by constant name. Implemented by
/// [`mapped_enum!`](crate::mapped_enum).
pub trait MappedEnum: Sized + Copy + 'static {
    const SPEC: EnumSpec;

    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;
}

pub(crate) fn mismatch(expected: &str, value: &Value) -> Error {
    Error::decode("", format!("expected {expected}, found {}", value.kind()))
}

#[doc(hidden)]
pub fn entity_from_value<T: Mapped>(value: Value) -> Result<T> {
    match value {
        Value::Entity(instance) => T::from_instance(*instance),
        other => Err(mismatch(std::any::type_name::<T>(), &other)),
    }
}

#[doc(hidden)]
pub fn enum_from_value<T: MappedEnum>(value: Value) -> Result<T> {
    match value {
        Value::Enum(name) | Value::String(name) => T::from_name(&name).ok_or_else(|| {
            Error::decode("", format!("`{name}` is not a constant of `{}`", T::SPEC.name))
        }),
        other => Err(mismatch(T::SPEC.name, &other)),
    }
}

#[doc(hidden)]
pub fn enum_from_key<T: MappedEnum>(key: MapKey) -> Result<T> {
    match key {
        MapKey::Enum(name) | MapKey::String(name) => enum_from_value(Value::Enum(name)),
        other => Err(Error::decode("", format!("expected {} key, found {other:?}", T::SPEC.name))),
    }
}

/// Makes [`Mapped`] types usable as embedded properties.
#[macro_export]
macro_rules! embedded_property {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Property for $ty {
                fn shape() -> $crate::mapping::TypeShape {
                    $crate::mapping::TypeShape::Entity($crate::mapping::TypeKey::of::<Self>())
                }

                fn to_value(&self) -> $crate::Result<$crate::Value> {
                    $crate::Mapped::to_instance(self).map($crate::Value::from)
                }

                fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                    $crate::property::entity_from_value(value)
                }
            }
        )+
    };
}

/// Declares a fieldless enum stored by constant name, usable both as a
/// property and as a map key.
///
/// ```ignore
/// mapped_enum! {
///     pub enum Status {
///         Active,
///         Suspended,
///     }
/// }
/// ```
#[macro_export]
macro_rules! mapped_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($(#[$variant_meta])* $variant),*
        }

        impl $crate::MappedEnum for $name {
            const SPEC: $crate::mapping::EnumSpec = $crate::mapping::EnumSpec {
                name: stringify!($name),
                variants: &[$(stringify!($variant)),*],
            };

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                $(
                    if name == stringify!($variant) {
                        return Some(Self::$variant);
                    }
                )*
                None
            }
        }

        impl $crate::Property for $name {
            fn shape() -> $crate::mapping::TypeShape {
                $crate::mapping::TypeShape::Scalar($crate::mapping::ScalarKind::Enum(
                    <Self as $crate::MappedEnum>::SPEC,
                ))
            }

            fn to_value(&self) -> $crate::Result<$crate::Value> {
                Ok($crate::Value::Enum(
                    $crate::MappedEnum::name(self).to_owned(),
                ))
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                $crate::property::enum_from_value(value)
            }
        }

        impl $crate::KeyProperty for $name {
            fn key_kind() -> $crate::mapping::KeyKind {
                $crate::mapping::KeyKind::Enum(<Self as $crate::MappedEnum>::SPEC)
            }

            fn to_key(&self) -> $crate::MapKey {
                $crate::MapKey::Enum($crate::MappedEnum::name(self).to_owned())
            }

            fn from_key(key: $crate::MapKey) -> $crate::Result<Self> {
                $crate::property::enum_from_key(key)
            }
        }
    };
}

impl Property for bool {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Bool)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(value) => Ok(value),
            other => Err(mismatch("bool", &other)),
        }
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(value) => Some(i64::from(*value)),
        Value::Int64(value) => Some(*value),
        _ => None,
    }
}

macro_rules! integer_property {
    ($($ty:ty => $kind:ident / $variant:ident / $wide:ty),* $(,)?) => {
        $(
            impl Property for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Scalar(ScalarKind::$kind)
                }

                fn to_value(&self) -> Result<Value> {
                    let value = <$wide>::try_from(*self).map_err(|_| {
                        Error::decode("", format!("{self} does not fit the stored integer width"))
                    })?;
                    Ok(Value::$variant(value))
                }

                fn from_value(value: Value) -> Result<Self> {
                    let wide = integer(&value).ok_or_else(|| mismatch(stringify!($ty), &value))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::decode("", format!("{wide} is out of range for {}", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

integer_property! {
    i8 => Int32 / Int32 / i32,
    i16 => Int32 / Int32 / i32,
    i32 => Int32 / Int32 / i32,
    u16 => Int32 / Int32 / i32,
    i64 => Int64 / Int64 / i64,
    u32 => Int64 / Int64 / i64,
    u64 => Int64 / Int64 / i64,
    usize => Int64 / Int64 / i64,
}

fn bytes_to_value(bytes: &[u8]) -> Value {
    Value::Binary(Binary {
        subtype: bson::spec::BinarySubtype::Generic,
        bytes: bytes.to_vec(),
    })
}

fn bytes_from_value(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Binary(binary) => Ok(binary.bytes),
        other => Err(mismatch("bytes", &other)),
    }
}

/// Byte strings are stored as generic binary, not as arrays of integers.
impl Property for Vec<u8> {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Binary)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(bytes_to_value(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        bytes_from_value(value)
    }
}

impl Property for Box<[u8]> {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Binary)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(bytes_to_value(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        bytes_from_value(value).map(Vec::into_boxed_slice)
    }
}

impl Property for f64 {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Double)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Double(*self))
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Double(value) => Ok(value),
            Value::Int32(value) => Ok(f64::from(value)),
            Value::Int64(value) => Ok(value as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl Property for f32 {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Double)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Double(f64::from(*self)))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|value| value as f32)
    }
}

impl Property for String {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::String)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(value) => Ok(value),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl Property for ObjectId {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::ObjectId)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::ObjectId(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::ObjectId(value) => Ok(value),
            other => Err(mismatch("object id", &other)),
        }
    }
}

impl Property for Uuid {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Uuid)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Uuid(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(value) => Ok(value),
            other => Err(mismatch("uuid", &other)),
        }
    }
}

impl Property for bson::DateTime {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::DateTime)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::DateTime(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(value) => Ok(value),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl Property for chrono::DateTime<chrono::Utc> {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::DateTime)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::DateTime(bson::DateTime::from_millis(
            self.timestamp_millis(),
        )))
    }

    fn from_value(value: Value) -> Result<Self> {
        let millis = bson::DateTime::from_value(value)?.timestamp_millis();
        chrono::DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| Error::decode("", format!("{millis} is out of range for a date")))
    }
}

impl Property for Binary {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Binary)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Binary(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Binary(value) => Ok(value),
            other => Err(mismatch("binary", &other)),
        }
    }
}

impl Property for Document {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Document)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Document(value) => Ok(value),
            other => Err(mismatch("document", &other)),
        }
    }
}

impl Property for Bson {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Any)
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::from_bson(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        scalar::natural(value)
    }
}

impl<T: Property> Property for Option<T> {
    fn shape() -> TypeShape {
        T::shape()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Result<Value> {
        match self {
            Some(value) => value.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

fn sequence_to_value<'a, T: Property + 'a>(items: impl IntoIterator<Item = &'a T>) -> Result<Value> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.to_value().map_err(|err| err.at(&index.to_string())))
        .collect::<Result<Vec<_>>>()
        .map(Value::Sequence)
}

fn sequence_from_value<T: Property, C: FromIterator<T>>(value: Value) -> Result<C> {
    let items = match value {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        other => return Err(mismatch("sequence", &other)),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| T::from_value(item).map_err(|err| err.at(&index.to_string())))
        .collect()
}

impl<T: Property> Property for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence(SequenceKind::List, T::shape())
    }

    fn to_value(&self) -> Result<Value> {
        sequence_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        sequence_from_value(value)
    }
}

impl<T: Property> Property for VecDeque<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence(SequenceKind::List, T::shape())
    }

    fn to_value(&self) -> Result<Value> {
        sequence_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        sequence_from_value(value)
    }
}

impl<T: Property> Property for Box<[T]> {
    fn shape() -> TypeShape {
        TypeShape::sequence(SequenceKind::Array, T::shape())
    }

    fn to_value(&self) -> Result<Value> {
        sequence_to_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self> {
        sequence_from_value::<T, Vec<T>>(value).map(Vec::into_boxed_slice)
    }
}

impl<T: Property + Eq + Hash> Property for HashSet<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence(SequenceKind::Set, T::shape())
    }

    fn to_value(&self) -> Result<Value> {
        sequence_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        sequence_from_value(value)
    }
}

impl<T: Property + Ord> Property for BTreeSet<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence(SequenceKind::Set, T::shape())
    }

    fn to_value(&self) -> Result<Value> {
        sequence_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        sequence_from_value(value)
    }
}

fn map_to_value<'a, K, V>(entries: impl IntoIterator<Item = (&'a K, &'a V)>) -> Result<Value>
where
    K: KeyProperty + 'a,
    V: Property + 'a,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let key = key.to_key();
            let value = value
                .to_value()
                .map_err(|err| err.at(&format!("{key:?}")))?;
            Ok((key, value))
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Map)
}

fn map_from_value<K, V, C>(value: Value) -> Result<C>
where
    K: KeyProperty,
    V: Property,
    C: FromIterator<(K, V)>,
{
    let entries = match value {
        Value::Map(entries) => entries,
        Value::Null => Vec::new(),
        other => return Err(mismatch("map", &other)),
    };

    entries
        .into_iter()
        .map(|(key, value)| {
            let segment = format!("{key:?}");
            let key = K::from_key(key).map_err(|err| err.at(&segment))?;
            let value = V::from_value(value).map_err(|err| err.at(&segment))?;
            Ok((key, value))
        })
        .collect()
}

impl<K: KeyProperty + Eq + Hash, V: Property> Property for HashMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::map(K::key_kind(), V::shape())
    }

    fn to_value(&self) -> Result<Value> {
        map_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        map_from_value(value)
    }
}

impl<K: KeyProperty + Ord, V: Property> Property for BTreeMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::map(K::key_kind(), V::shape())
    }

    fn to_value(&self) -> Result<Value> {
        map_to_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        map_from_value(value)
    }
}

impl KeyProperty for String {
    fn key_kind() -> KeyKind {
        KeyKind::String
    }

    fn to_key(&self) -> MapKey {
        MapKey::String(self.clone())
    }

    fn from_key(key: MapKey) -> Result<Self> {
        match key {
            MapKey::String(key) => Ok(key),
            other => Err(Error::decode("", format!("expected string key, found {other:?}"))),
        }
    }
}

macro_rules! integer_key {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl KeyProperty for $ty {
                fn key_kind() -> KeyKind {
                    KeyKind::$kind
                }

                fn to_key(&self) -> MapKey {
                    MapKey::Int(i64::from(*self))
                }

                fn from_key(key: MapKey) -> Result<Self> {
                    match key {
                        MapKey::Int(key) => <$ty>::try_from(key).map_err(|_| {
                            Error::decode("", format!("{key} is out of range for {}", stringify!($ty)))
                        }),
                        other => Err(Error::decode("", format!("expected integer key, found {other:?}"))),
                    }
                }
            }
        )*
    };
}

integer_key! {
    i32 => Int32,
    i64 => Int64,
}

impl KeyProperty for ObjectId {
    fn key_kind() -> KeyKind {
        KeyKind::ObjectId
    }

    fn to_key(&self) -> MapKey {
        MapKey::ObjectId(*self)
    }

    fn from_key(key: MapKey) -> Result<Self> {
        match key {
            MapKey::ObjectId(key) => Ok(key),
            other => Err(Error::decode("", format!("expected object id key, found {other:?}"))),
        }
    }
}

impl KeyProperty for Uuid {
    fn key_kind() -> KeyKind {
        KeyKind::Uuid
    }

    fn to_key(&self) -> MapKey {
        MapKey::Uuid(*self)
    }

    fn from_key(key: MapKey) -> Result<Self> {
        match key {
            MapKey::Uuid(key) => Ok(key),
            other => Err(Error::decode("", format!("expected uuid key, found {other:?}"))),
        }
    }
}

/// A property pointing at another entity, stored in its own collection.
///
/// Decoding yields [`Reference::Loaded`] when the target was fetched along
/// with the owner and [`Reference::Pointer`] otherwise. A pointer can be
/// resolved later with [`Reference::fetch`].
#[derive(Clone, Debug, PartialEq)]
pub enum Reference<T> {
    Pointer(Pointer),
    Loaded(Box<T>),
}

impl<T> Reference<T> {
    pub fn to(entity: T) -> Self {
        Self::Loaded(Box::new(entity))
    }

    pub fn pointer(pointer: Pointer) -> Self {
        Self::Pointer(pointer)
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Loaded(entity) => Some(&**entity),
            Self::Pointer(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn into_loaded(self) -> Option<T> {
        match self {
            Self::Loaded(entity) => Some(*entity),
            Self::Pointer(_) => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Self::Pointer(pointer) => Some(pointer),
            Self::Loaded(_) => None,
        }
    }
}

impl<T: Mapped> Property for Reference<T> {
    fn shape() -> TypeShape {
        TypeShape::Reference(TypeKey::of::<T>())
    }

    fn to_value(&self) -> Result<Value> {
        match self {
            Self::Loaded(entity) => entity.to_instance().map(Value::from),
            Self::Pointer(pointer) => Ok(Value::Reference(pointer.clone())),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Entity(instance) => T::from_instance(*instance).map(Self::to),
            Value::Reference(pointer) => Ok(Self::Pointer(pointer)),
            other => Err(mismatch("reference", &other)),
        }
    }
}
