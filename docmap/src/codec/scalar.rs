//! Scalar values and the legacy wire forms accepted for them.

use super::{keys, reference};
use crate::{
    error::{Error, Result},
    mapping::ScalarKind,
    value::{Value, uuid_from_binary},
};
use mongodb::bson::{self, Binary, Bson, Document, Uuid, oid::ObjectId};

/// Encodes with the declared kind where it changes the wire form, and
/// naturally otherwise. Query operands reach this path with values of other
/// kinds (a double bound on an integer field), which pass through unchanged.
pub(crate) fn encode(kind: ScalarKind, value: &Value) -> Result<Bson> {
    Ok(match (kind, value) {
        (ScalarKind::Int64, Value::Int32(value)) => Bson::Int64(i64::from(*value)),
        (ScalarKind::Double, Value::Int32(value)) => Bson::Double(f64::from(*value)),
        (ScalarKind::Enum(spec), Value::Enum(name) | Value::String(name)) => {
            if !spec.contains(name) {
                return Err(Error::UnsupportedShape(format!(
                    "`{name}` is not a constant of `{}`",
                    spec.name
                )));
            }
            Bson::String(name.clone())
        }
        (_, value) => natural(value.clone())?,
    })
}

/// Wire form of a value with no declared shape.
pub(crate) fn natural(value: Value) -> Result<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(value) => Bson::Boolean(value),
        Value::Int32(value) => Bson::Int32(value),
        Value::Int64(value) => Bson::Int64(value),
        Value::Double(value) => Bson::Double(value),
        Value::String(value) | Value::Enum(value) => Bson::String(value),
        Value::DateTime(value) => Bson::DateTime(value),
        Value::Binary(value) => Bson::Binary(value),
        Value::Uuid(value) => Bson::Binary(Binary::from_uuid(value)),
        Value::ObjectId(value) => Bson::ObjectId(value),
        Value::Document(value) => Bson::Document(value),
        Value::Sequence(items) => Bson::Array(
            items
                .into_iter()
                .map(natural)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(entries) => {
            let mut document = Document::new();
            for (key, value) in entries {
                document.insert(keys::to_wire(&key), natural(value)?);
            }
            Bson::Document(document)
        }
        Value::Reference(pointer) => reference::pointer_to_bson(&pointer, None),
        Value::Raw(value) => value,
        Value::Entity(instance) => {
            return Err(Error::UnsupportedShape(format!(
                "`{}` cannot be written without its model",
                instance.type_key()
            )));
        }
    })
}

fn unexpected(kind: ScalarKind, bson: &Bson) -> Error {
    Error::decode(
        "",
        format!("expected {kind:?}, found {:?}", bson.element_type()),
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

fn integer(kind: ScalarKind, bson: &Bson) -> Result<i64> {
    match bson {
        Bson::Int32(value) => Ok(i64::from(*value)),
        Bson::Int64(value) => Ok(*value),
        Bson::Double(value) => whole(*value).ok_or_else(|| unexpected(kind, bson)),
        Bson::String(value) => value.trim().parse().map_err(|_| unexpected(kind, bson)),
        _ => Err(unexpected(kind, bson)),
    }
}

fn date_from_string(value: &str) -> Option<bson::DateTime> {
    let parsed = chrono::DateTime::parse_from_rfc3339(value).ok()?;
    Some(bson::DateTime::from_millis(parsed.timestamp_millis()))
}

/// Decodes a scalar by its declared kind.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn decode(kind: ScalarKind, bson: Bson) -> Result<Value> {
    Ok(match (kind, bson) {
        (ScalarKind::Any, bson) => Value::from_bson(bson),

        (ScalarKind::Bool, Bson::Boolean(value)) => Value::Bool(value),
        (ScalarKind::Bool, Bson::String(value)) if value == "true" => Value::Bool(true),
        (ScalarKind::Bool, Bson::String(value)) if value == "false" => Value::Bool(false),

        (ScalarKind::Int32, bson) => {
            let wide = integer(kind, &bson)?;
            Value::Int32(i32::try_from(wide).map_err(|_| unexpected(kind, &bson))?)
        }
        (ScalarKind::Int64, bson) => Value::Int64(integer(kind, &bson)?),

        (ScalarKind::Double, Bson::Double(value)) => Value::Double(value),
        (ScalarKind::Double, Bson::Int32(value)) => Value::Double(f64::from(value)),
        (ScalarKind::Double, Bson::Int64(value)) => Value::Double(value as f64),
        (ScalarKind::Double, Bson::String(value)) => Value::Double(
            value
                .trim()
                .parse()
                .map_err(|_| unexpected(kind, &Bson::String(value.clone())))?,
        ),

        (ScalarKind::String, Bson::String(value) | Bson::Symbol(value)) => Value::String(value),
        (ScalarKind::String, Bson::ObjectId(value)) => Value::String(value.to_hex()),

        (ScalarKind::DateTime, Bson::DateTime(value)) => Value::DateTime(value),
        (ScalarKind::DateTime, Bson::Int64(millis)) => {
            Value::DateTime(bson::DateTime::from_millis(millis))
        }
        (ScalarKind::DateTime, Bson::Int32(millis)) => {
            Value::DateTime(bson::DateTime::from_millis(i64::from(millis)))
        }
        (ScalarKind::DateTime, Bson::String(value)) => Value::DateTime(
            date_from_string(&value).ok_or_else(|| unexpected(kind, &Bson::String(value.clone())))?,
        ),

        (ScalarKind::Binary, Bson::Binary(value)) => Value::Binary(value),

        (ScalarKind::Uuid, Bson::Binary(binary)) => Value::Uuid(
            uuid_from_binary(&binary).ok_or_else(|| unexpected(kind, &Bson::Binary(binary.clone())))?,
        ),
        (ScalarKind::Uuid, Bson::String(value)) => Value::Uuid(
            Uuid::parse_str(&value).map_err(|_| unexpected(kind, &Bson::String(value.clone())))?,
        ),

        (ScalarKind::ObjectId, Bson::ObjectId(value)) => Value::ObjectId(value),
        (ScalarKind::ObjectId, Bson::String(value)) => Value::ObjectId(
            ObjectId::parse_str(&value)
                .map_err(|_| unexpected(kind, &Bson::String(value.clone())))?,
        ),

        (ScalarKind::Document, Bson::Document(value)) => Value::Document(value),

        (ScalarKind::Enum(spec), Bson::String(name)) => {
            if !spec.contains(&name) {
                return Err(Error::decode(
                    "",
                    format!("`{name}` is not a constant of `{}`", spec.name),
                ));
            }
            Value::Enum(name)
        }
        (ScalarKind::Enum(spec), ordinal @ (Bson::Int32(_) | Bson::Int64(_))) => {
            let name = integer(kind, &ordinal)
                .ok()
                .and_then(|ordinal| usize::try_from(ordinal).ok())
                .and_then(|ordinal| spec.variants.get(ordinal))
                .ok_or_else(|| unexpected(kind, &ordinal))?;
            Value::Enum((*name).to_owned())
        }

        (kind, bson) => return Err(unexpected(kind, &bson)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::EnumSpec;
    use pretty_assertions::assert_eq;

    const COLOR: EnumSpec = EnumSpec {
        name: "Color",
        variants: &["Red", "Green"],
    };

    #[test]
    fn integers_accept_legacy_forms() {
        assert_eq!(decode(ScalarKind::Int32, Bson::Int64(7)).unwrap(), Value::Int32(7));
        assert_eq!(decode(ScalarKind::Int32, Bson::Double(7.0)).unwrap(), Value::Int32(7));
        assert_eq!(
            decode(ScalarKind::Int64, Bson::String("42".into())).unwrap(),
            Value::Int64(42)
        );
        assert!(decode(ScalarKind::Int32, Bson::Double(7.5)).is_err());
        assert!(decode(ScalarKind::Int32, Bson::Int64(i64::MAX)).is_err());

        // 2^63 rounds to `i64::MAX as f64` but is out of range.
        assert!(decode(ScalarKind::Int64, Bson::Double(9_223_372_036_854_775_808.0)).is_err());
        assert_eq!(
            decode(ScalarKind::Int64, Bson::Double(-9_223_372_036_854_775_808.0)).unwrap(),
            Value::Int64(i64::MIN)
        );
    }

    #[test]
    fn enums_decode_by_name_or_ordinal() {
        let kind = ScalarKind::Enum(COLOR);

        assert_eq!(decode(kind, Bson::String("Green".into())).unwrap(), Value::Enum("Green".into()));
        assert_eq!(decode(kind, Bson::Int32(0)).unwrap(), Value::Enum("Red".into()));
        assert!(decode(kind, Bson::Int32(2)).is_err());
        assert!(decode(kind, Bson::String("Blue".into())).is_err());
    }

    #[test]
    fn dates_from_millis_and_rfc3339() {
        let expected = Value::DateTime(bson::DateTime::from_millis(1_000));

        assert_eq!(decode(ScalarKind::DateTime, Bson::Int64(1_000)).unwrap(), expected);
        assert_eq!(
            decode(ScalarKind::DateTime, Bson::String("1970-01-01T00:00:01Z".into())).unwrap(),
            expected
        );
    }

    #[test]
    fn object_ids_and_uuids_from_strings() {
        let id = ObjectId::new();
        assert_eq!(
            decode(ScalarKind::ObjectId, Bson::String(id.to_hex())).unwrap(),
            Value::ObjectId(id)
        );

        let uuid = Uuid::new();
        assert_eq!(
            decode(ScalarKind::Uuid, Bson::String(uuid.to_string())).unwrap(),
            Value::Uuid(uuid)
        );
        assert_eq!(
            encode(ScalarKind::Uuid, &Value::Uuid(uuid)).unwrap(),
            Bson::Binary(Binary::from_uuid(uuid))
        );
    }

    #[test]
    fn booleans_from_strings() {
        assert_eq!(decode(ScalarKind::Bool, Bson::String("true".into())).unwrap(), Value::Bool(true));
        assert!(decode(ScalarKind::Bool, Bson::String("yes".into())).is_err());
    }
}
