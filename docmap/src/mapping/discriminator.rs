//! Type tags written next to polymorphic values.

use super::{EntityModel, Mapper, TypeKey};
use crate::error::{Error, Result};
use mongodb::bson::{Bson, Document, doc};
use serde::Deserialize;
use std::sync::Arc;

/// Derives a discriminator value from a type when none is declared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminatorFunction {
    /// Fully qualified type name.
    #[default]
    ClassName,
    SimpleName,
    LowerSimpleName,
}

impl DiscriminatorFunction {
    pub fn apply(self, type_key: TypeKey) -> String {
        match self {
            Self::ClassName => type_key.name().to_owned(),
            Self::SimpleName => type_key.simple_name().to_owned(),
            Self::LowerSimpleName => type_key.simple_name().to_lowercase(),
        }
    }
}

impl Mapper {
    /// Wire tag of `type_key`, mapping the type first if needed.
    pub fn discriminator_for(&self, type_key: TypeKey) -> Result<String> {
        Ok(self.model(type_key)?.discriminator().to_owned())
    }

    /// The static type itself followed by its transitive subtypes, depth
    /// first in declaration order.
    pub fn hierarchy(&self, type_key: TypeKey) -> Result<Vec<Arc<EntityModel>>> {
        let mut models = Vec::new();
        let mut pending = vec![type_key];

        while let Some(next) = pending.pop() {
            if models
                .iter()
                .any(|model: &Arc<EntityModel>| model.type_key() == next)
            {
                continue;
            }

            let model = self.model(next)?;
            pending.extend(model.subtypes().iter().rev().copied());
            models.push(model);
        }

        Ok(models)
    }

    /// Concrete type a value declared as `static_type` and tagged `value`
    /// decodes to.
    pub fn resolve(&self, static_type: TypeKey, value: &str) -> Result<Arc<EntityModel>> {
        self.hierarchy(static_type)?
            .into_iter()
            .find(|model| !model.is_abstract() && model.discriminator() == value)
            .ok_or_else(|| Error::Discriminator {
                expected: static_type.name().to_owned(),
                value: value.to_owned(),
            })
    }

    /// Restricts `query` to documents of `model` (and of its subtypes when
    /// polymorphic queries are enabled) unless it already names an id or a
    /// discriminator.
    pub fn update_query_with_discriminators(
        &self,
        model: &EntityModel,
        query: &mut Document,
    ) -> Result<()> {
        let key = model.discriminator_key();

        if !model.is_entity()
            || !model.uses_discriminator()
            || query.contains_key("_id")
            || query.contains_key(key)
        {
            return Ok(());
        }

        let mut values = Vec::new();
        if !model.is_abstract() {
            values.push(Bson::String(model.discriminator().to_owned()));
        }

        if self.options().enable_polymorphic_queries {
            for subtype in self.hierarchy(model.type_key())?.iter().skip(1) {
                if !subtype.is_abstract() {
                    values.push(Bson::String(subtype.discriminator().to_owned()));
                }
            }
        }

        if !values.is_empty() {
            query.insert(key, doc! { "$in": values });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shape;

    impl crate::Mapped for Shape {
        fn describe(_: &mut super::super::EntityModelBuilder) {}

        fn to_instance(&self) -> Result<crate::Instance> {
            Ok(crate::Instance::of::<Self>())
        }

        fn from_instance(_: crate::Instance) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn functions_derive_from_type_name() {
        let key = TypeKey::of::<Shape>();

        assert!(DiscriminatorFunction::ClassName.apply(key).ends_with("::Shape"));
        assert_eq!(DiscriminatorFunction::SimpleName.apply(key), "Shape");
        assert_eq!(DiscriminatorFunction::LowerSimpleName.apply(key), "shape");
    }
}
