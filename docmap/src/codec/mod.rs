//! The property codec engine.
//!
//! Every value is encoded and decoded by the shape its property declares,
//! never by what the runtime value happens to be. Nested entities recurse
//! through their own models; polymorphic ones carry a discriminator.

pub(crate) mod keys;
pub(crate) mod reference;
pub(crate) mod scalar;
pub mod writer;

use crate::{
    Mapped,
    error::{Error, Result},
    mapping::{EntityModel, Mapper, PropertyModel, ReferenceOptions, TypeShape},
    value::{Instance, Value},
};
use mongodb::bson::{Bson, Document};
use std::sync::Arc;

fn empty(shape: &TypeShape) -> Value {
    match shape {
        TypeShape::Map { .. } => Value::Map(Vec::new()),
        _ => Value::Sequence(Vec::new()),
    }
}

impl Mapper {
    pub fn to_document<T: Mapped>(&self, entity: &T) -> Result<Document> {
        let model = self.map::<T>()?;
        let instance = entity.to_instance()?;
        self.encode_instance(&model, &instance)
    }

    pub fn from_document<T: Mapped>(&self, document: Document) -> Result<T> {
        let model = self.map::<T>()?;
        let instance = self.decode_instance(&model, document)?;
        T::from_instance(instance)
    }

    /// Encodes a top-level instance declared as `model` (or one of its
    /// subtypes).
    pub fn encode_instance(&self, model: &EntityModel, instance: &Instance) -> Result<Document> {
        self.encode_entity(model, instance, true)
    }

    pub fn decode_instance(&self, model: &Arc<EntityModel>, document: Document) -> Result<Instance> {
        self.decode_entity(model, document)
    }

    fn encode_entity(
        &self,
        declared: &EntityModel,
        instance: &Instance,
        top_level: bool,
    ) -> Result<Document> {
        let concrete = if instance.type_key() == declared.type_key() {
            None
        } else {
            Some(self.model(instance.type_key())?)
        };
        let model = concrete.as_deref().unwrap_or(declared);

        let mut document = Document::new();
        let options = self.options();

        if let Some(id) = model.id_property() {
            if let Some(value) = instance.get(id.name()).filter(|value| !value.is_null()) {
                let id_value = self
                    .encode_property(id, value)
                    .map_err(|err| err.at(id.name()))?;
                document.insert("_id", id_value);
            }
        }

        let emit_discriminator = model.uses_discriminator()
            && (top_level || concrete.is_some() || declared.is_polymorphic());
        if emit_discriminator {
            document.insert(declared.discriminator_key(), model.discriminator());
        }

        let stored = model
            .properties()
            .iter()
            .filter(|property| !property.is_id())
            .filter(|property| !(options.ignore_finals && property.is_final()));

        for property in stored {
            let value = instance.get(property.name()).unwrap_or(&Value::Null);

            if value.is_null() && !options.store_nulls {
                continue;
            }
            if value.is_empty_container() && !options.store_empties {
                continue;
            }

            let bson = self
                .encode_property(property, value)
                .map_err(|err| err.at(property.name()))?;
            document.insert(property.mapped_name(), bson);
        }

        Ok(document)
    }

    fn encode_property(&self, property: &PropertyModel, value: &Value) -> Result<Bson> {
        self.encode_value(property.shape(), property.reference().copied(), value)
    }

    pub(crate) fn encode_value(
        &self,
        shape: &TypeShape,
        reference: Option<ReferenceOptions>,
        value: &Value,
    ) -> Result<Bson> {
        match (shape, value) {
            (_, Value::Null) => Ok(Bson::Null),
            (TypeShape::Scalar(kind), value) => scalar::encode(*kind, value),
            (TypeShape::Sequence { element, .. }, Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    self.encode_value(element, reference, item)
                        .map_err(|err| err.at(&index.to_string()))
                })
                .collect::<Result<Vec<_>>>()
                .map(Bson::Array),
            (TypeShape::Map { value: shape, .. }, Value::Map(entries)) => {
                let mut document = Document::new();
                for (key, value) in entries {
                    let key = keys::to_wire(key);
                    let value = self
                        .encode_value(shape, reference, value)
                        .map_err(|err| err.at(&key))?;
                    document.insert(key, value);
                }
                Ok(Bson::Document(document))
            }
            (TypeShape::Entity(key), Value::Entity(instance)) => {
                let declared = self.model(*key)?;
                self.encode_entity(&declared, instance, false)
                    .map(Bson::Document)
            }
            (TypeShape::Reference(target), value) => {
                self.encode_reference(*target, reference.unwrap_or_default(), value)
            }
            (shape, value) => Err(Error::UnsupportedShape(format!(
                "cannot store {} as {shape}",
                value.kind()
            ))),
        }
    }

    /// Encodes a query operand. Without a known shape, entities use their own
    /// model and everything else its natural wire form.
    pub(crate) fn encode_operand(
        &self,
        shape: Option<&TypeShape>,
        reference: Option<ReferenceOptions>,
        value: &Value,
    ) -> Result<Bson> {
        match (shape, value) {
            // `{tags: "a"}` matches an element; `{age: {$in: [..]}}` lists
            // several candidates for one scalar.
            (Some(TypeShape::Sequence { element, .. }), value)
                if !matches!(value, Value::Sequence(_) | Value::Null) =>
            {
                self.encode_operand(Some(element), reference, value)
            }
            (Some(shape), Value::Sequence(items)) if !shape.is_container() => items
                .iter()
                .map(|item| self.encode_operand(Some(shape), reference, item))
                .collect::<Result<Vec<_>>>()
                .map(Bson::Array),
            (Some(shape), value) => self.encode_value(shape, reference, value),
            (None, Value::Entity(instance)) => {
                let model = self.model(instance.type_key())?;
                self.encode_entity(&model, instance, false)
                    .map(Bson::Document)
            }
            (None, Value::Sequence(items)) => items
                .iter()
                .map(|item| self.encode_operand(None, reference, item))
                .collect::<Result<Vec<_>>>()
                .map(Bson::Array),
            (None, value) => scalar::natural(value.clone()),
        }
    }

    pub(crate) fn decode_entity(
        &self,
        declared: &Arc<EntityModel>,
        mut document: Document,
    ) -> Result<Instance> {
        let model = match document.get(declared.discriminator_key()) {
            Some(Bson::String(tag)) => self.resolve(declared.type_key(), tag)?,
            _ if declared.is_abstract() => {
                return Err(Error::decode(
                    declared.discriminator_key(),
                    format!(
                        "`{}` is abstract and the document carries no discriminator",
                        declared.type_name()
                    ),
                ));
            }
            _ => Arc::clone(declared),
        };

        let mut instance = Instance::new(model.type_key());
        let options = self.options();

        for property in model.properties() {
            if options.ignore_finals && property.is_final() {
                let value = match property.default_value() {
                    Some(default) => default.clone(),
                    None => self.decode_value(property, property.shape(), Bson::Null)?,
                };
                instance.set(property.name(), value);
                continue;
            }

            let raw = document.remove(property.mapped_name()).or_else(|| {
                property
                    .also_load()
                    .iter()
                    .find_map(|alias| document.remove(alias))
            });

            let value = match (raw, property.default_value()) {
                (None, Some(default)) => default.clone(),
                (None, None) => self.decode_value(property, property.shape(), Bson::Null)?,
                (Some(bson), _) => self
                    .decode_value(property, property.shape(), bson)
                    .map_err(|err| err.at(property.name()))?,
            };

            instance.set(property.name(), value);
        }

        Ok(instance)
    }

    fn decode_value(&self, property: &PropertyModel, shape: &TypeShape, bson: Bson) -> Result<Value> {
        let top_level = std::ptr::eq(shape, property.shape());

        match (shape, bson) {
            (shape, Bson::Null | Bson::Undefined) => {
                if shape.is_container() && !(top_level && property.is_nullable()) {
                    Ok(empty(shape))
                } else {
                    Ok(Value::Null)
                }
            }
            (TypeShape::Scalar(kind), bson) => scalar::decode(*kind, bson),
            (TypeShape::Sequence { element, .. }, Bson::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    self.decode_value(property, element, item)
                        .map_err(|err| err.at(&index.to_string()))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            // A lone value where a sequence is declared.
            (TypeShape::Sequence { element, .. }, single) => {
                Ok(Value::Sequence(vec![self.decode_value(property, element, single)?]))
            }
            (TypeShape::Map { key, value: shape }, Bson::Document(document)) => document
                .into_iter()
                .map(|(wire_key, value)| {
                    let key = keys::from_wire(*key, &wire_key)?;
                    let value = self
                        .decode_value(property, shape, value)
                        .map_err(|err| err.at(&wire_key))?;
                    Ok((key, value))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
            (TypeShape::Entity(key), Bson::Document(document)) => {
                let declared = self.model(*key)?;
                let instance = self.decode_entity(&declared, document)?;
                Ok(Value::Entity(Box::new(instance)))
            }
            (TypeShape::Reference(target), bson) => self.decode_reference(*target, bson),
            (shape, bson) => Err(Error::decode(
                "",
                format!("expected {shape}, found {:?}", bson.element_type()),
            )),
        }
    }
}
