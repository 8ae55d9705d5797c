//! The in-memory side of the mapping: a closed value tree the codec engine
//! encodes from and decodes into.
//!
//! Rust types reach this representation through [`Property`](crate::Property)
//! and [`Mapped`](crate::Mapped); the engine itself never touches user types.

use crate::{
    Mapped, Property,
    error::{Error, Result},
    mapping::TypeKey,
};
use mongodb::bson::{self, Binary, Bson, Document, Uuid, oid::ObjectId};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(bson::DateTime),
    Binary(Binary),
    Uuid(Uuid),
    ObjectId(ObjectId),
    /// A raw document stored as-is.
    Document(Document),
    /// An enum constant, by name.
    Enum(String),
    Sequence(Vec<Value>),
    /// Keyed map in insertion order.
    Map(Vec<(MapKey, Value)>),
    Entity(Box<Instance>),
    Reference(Pointer),
    /// A wire value with no counterpart above, kept untouched.
    Raw(Bson),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub(crate) fn is_empty_container(&self) -> bool {
        match self {
            Self::Sequence(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::DateTime(_) => "date",
            Self::Binary(_) => "binary",
            Self::Uuid(_) => "uuid",
            Self::ObjectId(_) => "objectId",
            Self::Document(_) => "document",
            Self::Enum(_) => "enum",
            Self::Sequence(_) => "sequence",
            Self::Map(_) => "map",
            Self::Entity(_) => "entity",
            Self::Reference(_) => "reference",
            Self::Raw(_) => "raw",
        }
    }

    /// Converts a wire value without any declared shape to guide it.
    ///
    /// Nested documents stay raw documents and arrays become sequences.
    pub fn from_bson(bson: Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Boolean(value) => Self::Bool(value),
            Bson::Int32(value) => Self::Int32(value),
            Bson::Int64(value) => Self::Int64(value),
            Bson::Double(value) => Self::Double(value),
            Bson::String(value) => Self::String(value),
            Bson::DateTime(value) => Self::DateTime(value),
            Bson::ObjectId(value) => Self::ObjectId(value),
            // Legacy subtype 3 stays binary so it is written back unchanged.
            Bson::Binary(binary) if binary.subtype == bson::spec::BinarySubtype::Uuid => {
                match uuid_from_binary(&binary) {
                    Some(uuid) => Self::Uuid(uuid),
                    None => Self::Binary(binary),
                }
            }
            Bson::Binary(binary) => Self::Binary(binary),
            Bson::Document(document) => Self::Document(document),
            Bson::Array(items) => Self::Sequence(items.into_iter().map(Self::from_bson).collect()),
            other => Self::Raw(other),
        }
    }
}

pub(crate) fn uuid_from_binary(binary: &Binary) -> Option<Uuid> {
    use bson::spec::BinarySubtype;

    match binary.subtype {
        BinarySubtype::Uuid | BinarySubtype::UuidOld => {
            let bytes: [u8; 16] = binary.bytes.as_slice().try_into().ok()?;
            Some(Uuid::from_bytes(bytes))
        }
        _ => None,
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    String => String,
    &str => String,
    bson::DateTime => DateTime,
    Binary => Binary,
    Uuid => Uuid,
    ObjectId => ObjectId,
    Document => Document,
    Vec<Value> => Sequence,
    Pointer => Reference,
    Instance => Entity,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A map key as held in memory, before it is turned into a wire-legal string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    String(String),
    Int(i64),
    Enum(String),
    ObjectId(ObjectId),
    Uuid(Uuid),
}

/// A pointer-style reference to a document in another collection.
///
/// `collection` is `None` for id-only references whose target collection is
/// implied by the declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub collection: Option<String>,
    pub id: Bson,
}

impl Pointer {
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            collection: Some(collection.into()),
            id: id.into(),
        }
    }

    pub fn id_only(id: impl Into<Bson>) -> Self {
        Self {
            collection: None,
            id: id.into(),
        }
    }
}

/// A decoded (or about to be encoded) object: its concrete type plus its
/// properties keyed by Rust field name.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    type_key: TypeKey,
    properties: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(type_key: TypeKey) -> Self {
        Self {
            type_key,
            properties: BTreeMap::new(),
        }
    }

    pub fn of<T: Mapped>() -> Self {
        Self::new(TypeKey::of::<T>())
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn is<T: Mapped>(&self) -> bool {
        self.type_key == TypeKey::of::<T>()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Converts `value` through its [`Property`] impl and stores it.
    pub fn with<P: Property>(mut self, name: &str, value: &P) -> Result<Self> {
        let value = value.to_value().map_err(|err| err.at(name))?;
        self.properties.insert(name.to_owned(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.properties.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Removes a property and converts it. An absent property converts from
    /// [`Value::Null`], so only nullable properties accept it.
    pub fn take<P: Property>(&mut self, name: &str) -> Result<P> {
        let value = self.properties.remove(name).unwrap_or(Value::Null);
        P::from_value(value).map_err(|err| err.at(name))
    }

    /// Like [`take`](Self::take) but absent and null both give `None`.
    pub fn take_opt<P: Property>(&mut self, name: &str) -> Result<Option<P>> {
        match self.properties.remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => P::from_value(value)
                .map(Some)
                .map_err(|err| err.at(name)),
        }
    }
}

impl Error {
    /// Prefixes the path of a decode error with `segment`.
    pub(crate) fn at(self, segment: &str) -> Self {
        match self {
            Self::Decode { path, message } => Self::Decode {
                path: if path.is_empty() {
                    segment.to_owned()
                } else {
                    format!("{segment}.{path}")
                },
                message,
            },
            other => other,
        }
    }
}
