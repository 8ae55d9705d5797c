//! Wire forms of references.
//!
//! A full reference is stored as `{"$ref": collection, "$id": id}`, an id-only
//! one as the bare id. A reference read back by a `$lookup` arrives as the
//! joined document (or an array holding it) and decodes to the entity itself.

use crate::{
    error::{Error, Result},
    mapping::{Mapper, ReferenceOptions, TypeKey},
    value::{Pointer, Value},
};
use mongodb::bson::{Bson, Document, doc};

pub(crate) fn pointer_to_bson(pointer: &Pointer, collection: Option<&str>) -> Bson {
    match pointer.collection.as_deref().or(collection) {
        Some(collection) => Bson::Document(doc! {
            "$ref": collection,
            "$id": pointer.id.clone(),
        }),
        None => pointer.id.clone(),
    }
}

impl Mapper {
    pub(crate) fn encode_reference(
        &self,
        target: TypeKey,
        options: ReferenceOptions,
        value: &Value,
    ) -> Result<Bson> {
        match value {
            Value::Null => Ok(Bson::Null),
            Value::Entity(instance) => {
                let model = self.entity_model(instance.type_key())?;
                let no_id = || {
                    Error::mapping(
                        model.type_name(),
                        "cannot be referenced before it has an id",
                    )
                };

                let id_property = model.id_property().ok_or_else(no_id)?;
                let id = match instance.get(id_property.name()) {
                    None | Some(Value::Null) => return Err(no_id()),
                    Some(id) => self.encode_value(id_property.shape(), None, id)?,
                };

                let pointer = Pointer {
                    collection: (!options.id_only)
                        .then(|| model.collection().unwrap_or_default().to_owned()),
                    id,
                };

                Ok(pointer_to_bson(&pointer, None))
            }
            Value::Reference(pointer) => {
                if options.id_only {
                    return Ok(pointer.id.clone());
                }

                let collection = self.collection_name(target)?;
                Ok(pointer_to_bson(pointer, Some(&collection)))
            }
            other => Err(Error::UnsupportedShape(format!(
                "cannot store {} as a reference to `{target}`",
                other.kind()
            ))),
        }
    }

    pub(crate) fn decode_reference(&self, target: TypeKey, bson: Bson) -> Result<Value> {
        match bson {
            Bson::Document(document) if document.contains_key("$ref") => {
                Ok(Value::Reference(pointer_from_document(&document)?))
            }
            Bson::Document(document) => {
                let model = self.model(target)?;
                let instance = self.decode_entity(&model, document)?;
                Ok(Value::Entity(Box::new(instance)))
            }
            // `$lookup` output: zero or one joined documents.
            Bson::Array(joined) => match joined.into_iter().next() {
                Some(first) => self.decode_reference(target, first),
                None => Ok(Value::Null),
            },
            Bson::Null => Ok(Value::Null),
            id => Ok(Value::Reference(Pointer::id_only(id))),
        }
    }
}

fn pointer_from_document(document: &Document) -> Result<Pointer> {
    let collection = document
        .get_str("$ref")
        .map_err(|_| Error::decode("$ref", "expected a collection name"))?;
    let id = document
        .get("$id")
        .cloned()
        .ok_or_else(|| Error::decode("$id", "missing"))?;

    Ok(Pointer::new(collection, id))
}
