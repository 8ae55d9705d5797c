//! Map keys as document field names.
//!
//! Distinct in-memory keys may stringify to the same field name (`"1"` the
//! string and `1` the integer never share a map, but two enums might). The
//! later entry overwrites the earlier one.

use crate::{
    error::{Error, Result},
    mapping::KeyKind,
    value::MapKey,
};
use mongodb::bson::{Uuid, oid::ObjectId};

pub(crate) fn to_wire(key: &MapKey) -> String {
    match key {
        MapKey::String(key) | MapKey::Enum(key) => key.clone(),
        MapKey::Int(key) => key.to_string(),
        MapKey::ObjectId(key) => key.to_hex(),
        MapKey::Uuid(key) => key.to_string(),
    }
}

pub(crate) fn from_wire(kind: KeyKind, key: &str) -> Result<MapKey> {
    let invalid = || Error::decode(key, format!("`{key}` is not a valid {kind:?} map key"));

    Ok(match kind {
        KeyKind::String => MapKey::String(key.to_owned()),
        KeyKind::Int32 => MapKey::Int(i64::from(key.parse::<i32>().map_err(|_| invalid())?)),
        KeyKind::Int64 => MapKey::Int(key.parse::<i64>().map_err(|_| invalid())?),
        KeyKind::Enum(spec) => {
            if !spec.contains(key) {
                return Err(invalid());
            }
            MapKey::Enum(key.to_owned())
        }
        KeyKind::ObjectId => MapKey::ObjectId(ObjectId::parse_str(key).map_err(|_| invalid())?),
        KeyKind::Uuid => MapKey::Uuid(Uuid::parse_str(key).map_err(|_| invalid())?),
    })
}
