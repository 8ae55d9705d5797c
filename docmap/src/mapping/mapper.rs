use super::{
    EntityModel, EntityModelBuilder, TypeKey,
    conventions::{Convention, DefaultsConvention, NamingConvention},
};
use crate::{
    Mapped,
    error::{Error, Result},
    options::MapperOptions,
};
use dashmap::DashMap;
use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

/// Builds, validates and caches entity models.
///
/// Models are built on first use and live as long as the mapper. Mapping is
/// safe to trigger from several threads at once: concurrent builds of one
/// type produce equal models and the first one stored is kept.
pub struct Mapper {
    options: MapperOptions,
    conventions: Vec<Box<dyn Convention>>,
    models: DashMap<TypeId, Arc<EntityModel>>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_options(options: MapperOptions) -> Self {
        Self::builder().options(options).build()
    }

    pub fn builder() -> MapperBuilder {
        MapperBuilder::default()
    }

    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    pub fn map<T: Mapped>(&self) -> Result<Arc<EntityModel>> {
        self.model(TypeKey::of::<T>())
    }

    pub fn model(&self, type_key: TypeKey) -> Result<Arc<EntityModel>> {
        if let Some(model) = self.models.get(&type_key.id()) {
            return Ok(Arc::clone(&model));
        }

        self.build(type_key, &mut HashSet::new())
    }

    /// Model of `type_key`, which must be a top-level entity.
    pub fn entity_model(&self, type_key: TypeKey) -> Result<Arc<EntityModel>> {
        let model = self.model(type_key)?;

        if !model.is_entity() {
            return Err(Error::mapping(
                type_key.name(),
                "is not an entity and cannot be persisted on its own",
            ));
        }

        Ok(model)
    }

    pub fn collection_name(&self, type_key: TypeKey) -> Result<String> {
        let model = self.entity_model(type_key)?;
        Ok(model.collection().unwrap_or_default().to_owned())
    }

    pub fn is_mapped(&self, type_key: TypeKey) -> bool {
        self.models.contains_key(&type_key.id())
    }

    pub fn mapped_models(&self) -> Vec<Arc<EntityModel>> {
        self.models
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Maps every type submitted with [`register!`](crate::register).
    #[cfg(feature = "meta")]
    pub fn map_registered(&self) -> Result<()> {
        for type_key in crate::meta::registered_types() {
            self.model(type_key)?;
        }

        Ok(())
    }

    fn build(
        &self,
        type_key: TypeKey,
        in_progress: &mut HashSet<TypeId>,
    ) -> Result<Arc<EntityModel>> {
        in_progress.insert(type_key.id());

        let mut builder = EntityModelBuilder::new(type_key);
        type_key.describe(&mut builder);

        for convention in &self.conventions {
            convention.apply(&self.options, &mut builder);
        }

        let model = builder.build()?;

        for nested in model.nested_types() {
            if !in_progress.contains(&nested.id()) && !self.is_mapped(nested) {
                self.build(nested, in_progress)?;
            }
        }

        self.check_discriminators(&model)?;

        let model = Arc::clone(
            self.models
                .entry(type_key.id())
                .or_insert_with(|| Arc::new(model))
                .value(),
        );

        log::debug!(
            "mapped `{}` ({:?}, {} properties)",
            type_key.name(),
            model.kind(),
            model.properties().len()
        );

        Ok(model)
    }

    /// Rejects two concrete types reachable from `model` with the same tag.
    /// Subtypes still under construction further up are checked when their
    /// own build finishes.
    fn check_discriminators(&self, model: &EntityModel) -> Result<()> {
        let mut seen: HashMap<String, TypeKey> = HashMap::new();
        let mut visited = HashSet::new();
        let mut pending = vec![model.type_key()];

        while let Some(next) = pending.pop() {
            if !visited.insert(next.id()) {
                continue;
            }

            let (is_abstract, discriminator, subtypes) = if next == model.type_key() {
                (
                    model.is_abstract(),
                    model.discriminator().to_owned(),
                    model.subtypes().to_vec(),
                )
            } else if let Some(subtype) = self.models.get(&next.id()) {
                (
                    subtype.is_abstract(),
                    subtype.discriminator().to_owned(),
                    subtype.subtypes().to_vec(),
                )
            } else {
                continue;
            };

            pending.extend(subtypes);

            if is_abstract {
                continue;
            }

            if let Some(other) = seen.insert(discriminator.clone(), next) {
                return Err(Error::mapping(
                    model.type_name(),
                    format!(
                        "`{}` and `{}` share the discriminator `{discriminator}`",
                        other.name(),
                        next.name()
                    ),
                ));
            }
        }

        Ok(())
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("options", &self.options)
            .field("conventions", &self.conventions.len())
            .field("models", &self.models.len())
            .finish()
    }
}

pub struct MapperBuilder {
    options: MapperOptions,
    conventions: Vec<Box<dyn Convention>>,
}

impl Default for MapperBuilder {
    fn default() -> Self {
        Self {
            options: MapperOptions::default(),
            conventions: vec![Box::new(DefaultsConvention), Box::new(NamingConvention)],
        }
    }
}

impl MapperBuilder {
    pub fn options(mut self, options: MapperOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a convention, run after the built-in ones.
    pub fn convention(mut self, convention: impl Convention + 'static) -> Self {
        self.conventions.push(Box::new(convention));
        self
    }

    /// Drops every convention registered so far, built-ins included.
    pub fn clear_conventions(mut self) -> Self {
        self.conventions.clear();
        self
    }

    pub fn build(self) -> Mapper {
        Mapper {
            options: self.options,
            conventions: self.conventions,
            models: DashMap::new(),
        }
    }
}
