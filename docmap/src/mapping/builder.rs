//! Declarative model descriptions.
//!
//! ```ignore
//! impl Mapped for Hotel {
//!     fn describe(model: &mut EntityModelBuilder) {
//!         model.entity(EntityAnnotation::new().collection("hotels"));
//!         model.id::<ObjectId>("id");
//!         model.property::<String>("name");
//!         model.property::<Vec<PhoneNumber>>("phone_numbers");
//!         model.property::<Option<Address>>("address");
//!     }
//!     // ...
//! }
//! ```

use super::{
    EntityModel, ModelKind, PropertyModel, ReferenceOptions, TypeKey, TypeShape,
};
use crate::{
    Mapped, Property,
    error::{Error, Result},
    value::Value,
};
use std::collections::HashSet;

/// Marks a type as a top-level, independently persisted entity.
#[derive(Clone, Debug)]
pub struct EntityAnnotation {
    pub collection: Option<String>,
    pub use_discriminator: bool,
    pub discriminator_key: Option<String>,
    pub discriminator: Option<String>,
}

impl EntityAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn use_discriminator(mut self, use_discriminator: bool) -> Self {
        self.use_discriminator = use_discriminator;
        self
    }

    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = Some(key.into());
        self
    }

    pub fn discriminator(mut self, value: impl Into<String>) -> Self {
        self.discriminator = Some(value.into());
        self
    }
}

impl Default for EntityAnnotation {
    fn default() -> Self {
        Self {
            collection: None,
            use_discriminator: true,
            discriminator_key: None,
            discriminator: None,
        }
    }
}

/// Marks a type as embedded-only.
#[derive(Clone, Debug)]
pub struct EmbeddedAnnotation {
    /// A name for the type itself. Embedded values have no collection, so
    /// setting this is rejected when the model is built.
    pub value: Option<String>,
    pub use_discriminator: bool,
    pub discriminator_key: Option<String>,
    pub discriminator: Option<String>,
}

impl EmbeddedAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn use_discriminator(mut self, use_discriminator: bool) -> Self {
        self.use_discriminator = use_discriminator;
        self
    }

    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = Some(key.into());
        self
    }

    pub fn discriminator(mut self, value: impl Into<String>) -> Self {
        self.discriminator = Some(value.into());
        self
    }
}

impl Default for EmbeddedAnnotation {
    fn default() -> Self {
        Self {
            value: None,
            use_discriminator: true,
            discriminator_key: None,
            discriminator: None,
        }
    }
}

#[derive(Debug)]
pub struct PropertyBuilder {
    name: String,
    mapped_name: Option<String>,
    explicit_name: bool,
    also_load: Vec<String>,
    shape: TypeShape,
    nullable: bool,
    is_id: bool,
    is_final: bool,
    reference: Option<ReferenceOptions>,
    default: Option<Value>,
}

impl PropertyBuilder {
    fn new(name: &str, shape: TypeShape, nullable: bool) -> Self {
        Self {
            name: name.to_owned(),
            mapped_name: None,
            explicit_name: false,
            also_load: Vec::new(),
            shape,
            nullable,
            is_id: false,
            is_final: false,
            reference: None,
            default: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn mapped_name(&self) -> Option<&str> {
        self.mapped_name.as_deref()
    }

    pub fn is_id(&self) -> bool {
        self.is_id
    }

    pub fn has_explicit_name(&self) -> bool {
        self.explicit_name
    }

    /// Stores the property under `mapped_name` instead of its field name.
    pub fn named(&mut self, mapped_name: impl Into<String>) -> &mut Self {
        self.mapped_name = Some(mapped_name.into());
        self.explicit_name = true;
        self
    }

    /// Sets the wire name unless one was given explicitly. Used by conventions.
    pub fn default_mapped_name(&mut self, mapped_name: impl Into<String>) -> &mut Self {
        if !self.explicit_name {
            self.mapped_name = Some(mapped_name.into());
        }
        self
    }

    pub fn also_load<I, N>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.also_load.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set only through the construction path.
    pub fn immutable(&mut self) -> &mut Self {
        self.is_final = true;
        self
    }

    pub fn nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    pub fn lazy(&mut self) -> &mut Self {
        self.reference.get_or_insert_with(ReferenceOptions::default).lazy = true;
        self
    }

    pub fn id_only(&mut self) -> &mut Self {
        self.reference.get_or_insert_with(ReferenceOptions::default).id_only = true;
        self
    }

    /// Value the property takes when the document does not carry it.
    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    fn build(self, type_name: &str) -> Result<PropertyModel> {
        let reference = match (self.shape.referenced_type(), self.reference) {
            (Some(_), options) => Some(options.unwrap_or_default()),
            (None, None) => None,
            (None, Some(_)) => {
                return Err(Error::mapping(
                    type_name,
                    format!(
                        "`{}` has reference options but is not a reference",
                        self.name
                    ),
                ));
            }
        };

        let mapped_name = if self.is_id {
            "_id".to_owned()
        } else {
            self.mapped_name.unwrap_or_else(|| self.name.clone())
        };

        Ok(PropertyModel {
            name: self.name,
            mapped_name,
            also_load: self.also_load,
            shape: self.shape,
            nullable: self.nullable,
            is_id: self.is_id,
            is_final: self.is_final,
            reference,
            default: self.default,
        })
    }
}

/// A model under construction. Filled by [`Mapped::describe`], then by the
/// conventions, then validated into an [`EntityModel`].
#[derive(Debug)]
pub struct EntityModelBuilder {
    type_key: TypeKey,
    entity: Option<EntityAnnotation>,
    embedded: Option<EmbeddedAnnotation>,
    collection: Option<String>,
    use_discriminator: Option<bool>,
    discriminator_key: Option<String>,
    discriminator: Option<String>,
    is_abstract: bool,
    subtypes: Vec<TypeKey>,
    enclosing: Option<&'static str>,
    properties: Vec<PropertyBuilder>,
}

impl EntityModelBuilder {
    pub fn new(type_key: TypeKey) -> Self {
        Self {
            type_key,
            entity: None,
            embedded: None,
            collection: None,
            use_discriminator: None,
            discriminator_key: None,
            discriminator: None,
            is_abstract: false,
            subtypes: Vec::new(),
            enclosing: None,
            properties: Vec::new(),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn entity(&mut self, annotation: EntityAnnotation) -> &mut Self {
        self.entity = Some(annotation);
        self
    }

    pub fn embedded(&mut self, annotation: EmbeddedAnnotation) -> &mut Self {
        self.embedded = Some(annotation);
        self
    }

    pub fn entity_annotation(&self) -> Option<&EntityAnnotation> {
        self.entity.as_ref()
    }

    pub fn embedded_annotation(&self) -> Option<&EmbeddedAnnotation> {
        self.embedded.as_ref()
    }

    pub fn collection(&mut self, collection: impl Into<String>) -> &mut Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn use_discriminator(&mut self, use_discriminator: bool) -> &mut Self {
        self.use_discriminator = Some(use_discriminator);
        self
    }

    pub fn uses_discriminator(&self) -> Option<bool> {
        self.use_discriminator
    }

    pub fn discriminator_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.discriminator_key = Some(key.into());
        self
    }

    pub fn discriminator_key_value(&self) -> Option<&str> {
        self.discriminator_key.as_deref()
    }

    pub fn discriminator(&mut self, value: impl Into<String>) -> &mut Self {
        self.discriminator = Some(value.into());
        self
    }

    pub fn discriminator_value(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// No value is ever of exactly this type; decoding needs a discriminator.
    pub fn abstract_type(&mut self) -> &mut Self {
        self.is_abstract = true;
        self
    }

    pub fn subtype<S: Mapped>(&mut self) -> &mut Self {
        self.subtypes.push(TypeKey::of::<S>());
        self
    }

    /// Declares that instances only exist inside an instance of `O`, which the
    /// mapper has no way to supply. Such a type fails to map.
    pub fn enclosed_by<O: 'static>(&mut self) -> &mut Self {
        self.enclosing = Some(std::any::type_name::<O>());
        self
    }

    pub fn id<P: Property>(&mut self, name: &str) -> &mut PropertyBuilder {
        let mut property = PropertyBuilder::new(name, P::shape(), P::nullable());
        property.is_id = true;
        self.push(property)
    }

    pub fn property<P: Property>(&mut self, name: &str) -> &mut PropertyBuilder {
        self.push(PropertyBuilder::new(name, P::shape(), P::nullable()))
    }

    /// A property whose shape is given directly rather than derived from a
    /// Rust type.
    pub fn property_with_shape(&mut self, name: &str, shape: TypeShape) -> &mut PropertyBuilder {
        self.push(PropertyBuilder::new(name, shape, false))
    }

    pub fn properties(&self) -> &[PropertyBuilder] {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut [PropertyBuilder] {
        &mut self.properties
    }

    fn push(&mut self, property: PropertyBuilder) -> &mut PropertyBuilder {
        self.properties.push(property);
        let last = self.properties.len() - 1;
        &mut self.properties[last]
    }

    /// Validates the description. Runs after every convention has been applied.
    pub fn build(self) -> Result<EntityModel> {
        let type_name = self.type_key.name();
        let fail = |message: String| Err(Error::mapping(type_name, message));

        if let Some(outer) = self.enclosing {
            return fail(format!(
                "cannot be instantiated without an enclosing instance of `{outer}`"
            ));
        }

        if let Some(embedded) = &self.embedded {
            if let Some(value) = &embedded.value {
                return fail(format!(
                    "embedded types cannot be named (`{value}`); rename the properties holding them instead"
                ));
            }
        }

        let kind = if self.entity.is_some() {
            ModelKind::Entity
        } else {
            ModelKind::Embedded
        };

        let properties = self
            .properties
            .into_iter()
            .map(|property| property.build(type_name))
            .collect::<Result<Vec<_>>>()?;

        let mut id_index = None;
        let mut seen = HashSet::new();

        for (index, property) in properties.iter().enumerate() {
            if !seen.insert(property.mapped_name.as_str()) {
                return fail(format!(
                    "more than one property is mapped to `{}`",
                    property.mapped_name
                ));
            }

            if property.is_id {
                if id_index.is_some() {
                    return fail("more than one id property".to_owned());
                }
                id_index = Some(index);
            }
        }

        match (kind, id_index) {
            (ModelKind::Entity, None) if !self.is_abstract => {
                return fail("entities must declare an id property".to_owned());
            }
            (ModelKind::Embedded, Some(index)) if self.embedded.is_some() => {
                return fail(format!(
                    "embedded types cannot declare an id property (`{}`)",
                    properties[index].name
                ));
            }
            _ => {}
        }

        let collection = match kind {
            ModelKind::Entity => Some(
                self.collection
                    .unwrap_or_else(|| self.type_key.simple_name().to_owned()),
            ),
            ModelKind::Embedded => None,
        };

        Ok(EntityModel {
            type_key: self.type_key,
            kind,
            collection,
            properties,
            id_index,
            discriminator_key: self.discriminator_key.unwrap_or_else(|| "_t".to_owned()),
            discriminator: self
                .discriminator
                .unwrap_or_else(|| self.type_key.name().to_owned()),
            use_discriminator: self.use_discriminator.unwrap_or(true),
            is_abstract: self.is_abstract,
            subtypes: self.subtypes,
        })
    }
}
