use super::{TypeKey, TypeShape};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    /// Top-level, independently addressable; has an id and a collection.
    Entity,
    /// Only ever inlined inside a parent document.
    Embedded,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReferenceOptions {
    /// Keep the pointer on decode instead of joining the target in.
    pub lazy: bool,
    /// Store the bare id instead of a `{"$ref", "$id"}` pointer.
    pub id_only: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyModel {
    pub(crate) name: String,
    pub(crate) mapped_name: String,
    pub(crate) also_load: Vec<String>,
    pub(crate) shape: TypeShape,
    pub(crate) nullable: bool,
    pub(crate) is_id: bool,
    pub(crate) is_final: bool,
    pub(crate) reference: Option<ReferenceOptions>,
    pub(crate) default: Option<Value>,
}

impl PropertyModel {
    /// Rust field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name on the wire.
    pub fn mapped_name(&self) -> &str {
        &self.mapped_name
    }

    /// Legacy names accepted on decode when the mapped name is absent.
    pub fn also_load(&self) -> &[String] {
        &self.also_load
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_id(&self) -> bool {
        self.is_id
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&ReferenceOptions> {
        self.reference.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether `name` addresses this property, by Rust or wire name.
    pub(crate) fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.mapped_name == name
    }
}

/// Immutable description of a mapped type.
#[derive(Clone, Debug)]
pub struct EntityModel {
    pub(crate) type_key: TypeKey,
    pub(crate) kind: ModelKind,
    pub(crate) collection: Option<String>,
    pub(crate) properties: Vec<PropertyModel>,
    pub(crate) id_index: Option<usize>,
    pub(crate) discriminator_key: String,
    pub(crate) discriminator: String,
    pub(crate) use_discriminator: bool,
    pub(crate) is_abstract: bool,
    pub(crate) subtypes: Vec<TypeKey>,
}

impl EntityModel {
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn type_name(&self) -> &'static str {
        self.type_key.name()
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_entity(&self) -> bool {
        self.kind == ModelKind::Entity
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyModel> {
        self.properties.iter().find(|property| property.answers_to(name))
    }

    pub fn id_property(&self) -> Option<&PropertyModel> {
        self.id_index.map(|index| &self.properties[index])
    }

    pub fn discriminator_key(&self) -> &str {
        &self.discriminator_key
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn uses_discriminator(&self) -> bool {
        self.use_discriminator
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Directly declared subtypes.
    pub fn subtypes(&self) -> &[TypeKey] {
        &self.subtypes
    }

    /// Values of this type may be of another concrete type.
    pub fn is_polymorphic(&self) -> bool {
        self.is_abstract || !self.subtypes.is_empty()
    }

    pub fn references(&self) -> impl Iterator<Item = &PropertyModel> {
        self.properties.iter().filter(|property| property.is_reference())
    }

    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    /// References that should be joined in when loading this type.
    pub fn eager_references(&self) -> impl Iterator<Item = &PropertyModel> {
        self.references()
            .filter(|property| property.reference.is_some_and(|options| !options.lazy))
    }

    pub fn has_eager_references(&self) -> bool {
        self.eager_references().next().is_some()
    }

    pub(crate) fn nested_types(&self) -> Vec<TypeKey> {
        let mut types = self.subtypes.clone();
        for property in &self.properties {
            property.shape.collect_types(&mut types);
        }
        types
    }
}
