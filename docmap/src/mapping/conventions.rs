//! Rules run over every model description before it is validated.
//!
//! Conventions run in registration order. Each one may look at what the
//! type declared about itself and at what earlier conventions filled in.
//! Values set explicitly on the builder always win over annotations, which
//! win over the [`MapperOptions`] defaults.

use super::EntityModelBuilder;
use crate::options::MapperOptions;

pub trait Convention: Send + Sync {
    fn apply(&self, options: &MapperOptions, builder: &mut EntityModelBuilder);
}

impl<F> Convention for F
where
    F: Fn(&MapperOptions, &mut EntityModelBuilder) + Send + Sync,
{
    fn apply(&self, options: &MapperOptions, builder: &mut EntityModelBuilder) {
        self(options, builder);
    }
}

/// Discriminator settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultsConvention;

impl Convention for DefaultsConvention {
    fn apply(&self, options: &MapperOptions, builder: &mut EntityModelBuilder) {
        let annotated = match (builder.entity_annotation(), builder.embedded_annotation()) {
            (Some(entity), _) => Some((
                entity.use_discriminator,
                entity.discriminator_key.clone(),
                entity.discriminator.clone(),
            )),
            (None, Some(embedded)) => Some((
                embedded.use_discriminator,
                embedded.discriminator_key.clone(),
                embedded.discriminator.clone(),
            )),
            (None, None) => None,
        };

        let (use_discriminator, key, value) = annotated.unwrap_or((true, None, None));

        if builder.uses_discriminator().is_none() {
            builder.use_discriminator(use_discriminator);
        }

        if builder.discriminator_key_value().is_none() {
            builder.discriminator_key(key.unwrap_or_else(|| options.discriminator_key.clone()));
        }

        if builder.discriminator_value().is_none() {
            let value = value.unwrap_or_else(|| options.discriminator.apply(builder.type_key()));
            builder.discriminator(value);
        }
    }
}

/// Collection and wire field names.
#[derive(Clone, Copy, Debug, Default)]
pub struct NamingConvention;

impl Convention for NamingConvention {
    fn apply(&self, options: &MapperOptions, builder: &mut EntityModelBuilder) {
        if builder.collection_name().is_none() {
            let collection = builder
                .entity_annotation()
                .and_then(|entity| entity.collection.clone())
                .unwrap_or_else(|| {
                    options
                        .collection_naming
                        .apply(builder.type_key().simple_name())
                });
            builder.collection(collection);
        }

        for property in builder.properties_mut() {
            if !property.has_explicit_name() && !property.is_id() {
                let mapped = options.field_naming.apply(property.name());
                property.default_mapped_name(mapped);
            }
        }
    }
}
