use crate::{
    Mapped, Reference,
    error::{Error, Result},
    mapping::{Mapper, ScalarKind, TypeKey, TypeShape},
    query::{DeleteOptions, FindOptions, Query},
    store::{DeleteResult, DocumentStore},
    value::{Instance, Pointer, Value},
};
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use std::{collections::HashMap, sync::Arc};

/// Entry point tying a [`Mapper`] to a [`DocumentStore`].
///
/// ```ignore
/// let store = MongoStore::new(client.database("travel"));
/// let datastore = Datastore::new(store);
///
/// let id = datastore.save(&hotel).await?;
/// let found = datastore
///     .find::<Hotel>()?
///     .filter(Filters::eq("id", id))
///     .first(FindOptions::default())
///     .await?;
/// ```
#[derive(Debug)]
pub struct Datastore<S> {
    mapper: Arc<Mapper>,
    store: S,
}

impl<S: DocumentStore> Datastore<S> {
    pub fn new(store: S) -> Self {
        Self::with_mapper(Arc::new(Mapper::new()), store)
    }

    pub fn with_mapper(mapper: Arc<Mapper>, store: S) -> Self {
        Self { mapper, store }
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn find<T: Mapped>(&self) -> Result<Query<'_, T, S>> {
        let model = self.mapper.entity_model(TypeKey::of::<T>())?;
        let collection = model.collection().unwrap_or_default().to_owned();

        Ok(Query::new(self, model, collection, None))
    }

    /// Queries `T` stored in a collection other than its own.
    pub fn find_in<T: Mapped>(&self, collection: impl Into<String>) -> Result<Query<'_, T, S>> {
        let model = self.mapper.entity_model(TypeKey::of::<T>())?;

        Ok(Query::new(self, model, collection.into(), None))
    }

    /// Queries `T` starting from a raw query document.
    pub fn find_with_seed<T: Mapped>(&self, seed: Document) -> Result<Query<'_, T, S>> {
        let model = self.mapper.entity_model(TypeKey::of::<T>())?;
        let collection = model.collection().unwrap_or_default().to_owned();

        Ok(Query::new(self, model, collection, Some(seed)))
    }

    pub fn to_document<T: Mapped>(&self, entity: &T) -> Result<Document> {
        self.mapper.to_document(entity)
    }

    pub fn from_document<T: Mapped>(&self, document: Document) -> Result<T> {
        self.mapper.from_document(document)
    }

    /// Inserts `entity` and returns its id. A missing object id is generated.
    pub async fn save<T: Mapped>(&self, entity: &T) -> Result<Bson> {
        let model = self.mapper.entity_model(TypeKey::of::<T>())?;
        let mut instance = entity.to_instance()?;

        if let Some(id) = model.id_property() {
            let missing = instance.get(id.name()).is_none_or(Value::is_null);
            if missing && *id.shape() == TypeShape::Scalar(ScalarKind::ObjectId) {
                instance.set(id.name(), ObjectId::new());
            }
        }

        let document = self.mapper.encode_instance(&model, &instance)?;
        let collection = model.collection().unwrap_or_default();
        log::trace!("insert into `{collection}`: {document}");

        self.store.insert_one(collection, document).await
    }

    pub async fn delete<T: Mapped>(&self, entity: &T) -> Result<DeleteResult> {
        let model = self.mapper.entity_model(TypeKey::of::<T>())?;
        let instance = entity.to_instance()?;

        let (property, value) = model
            .id_property()
            .and_then(|property| instance.get(property.name()).map(|value| (property, value)))
            .filter(|(_, value)| !value.is_null())
            .ok_or_else(|| Error::mapping(model.type_name(), "cannot delete an entity without an id"))?;
        let id = self.mapper.encode_value(property.shape(), None, value)?;

        let collection = model.collection().unwrap_or_default();
        log::trace!("delete from `{collection}`: {id}");

        self.store
            .delete(collection, doc! { "_id": id }, DeleteOptions::default())
            .await
    }

    /// Loads the entity a pointer refers to.
    pub async fn dereference<T: Mapped>(&self, pointer: &Pointer) -> Result<Option<T>> {
        let collection = match &pointer.collection {
            Some(collection) => collection.clone(),
            None => self.mapper.collection_name(TypeKey::of::<T>())?,
        };
        log::trace!("dereference `{collection}`: {}", pointer.id);

        let mut documents = self
            .store
            .find(
                &collection,
                doc! { "_id": pointer.id.clone() },
                FindOptions::new().limit(1),
            )
            .await?;

        match documents.try_next().await? {
            Some(document) => self.mapper.from_document(document).map(Some),
            None => Ok(None),
        }
    }

    /// Replaces pointers held by non-lazy references of `instances` with the
    /// entities they point to, using one `_id $in` query per collection.
    pub(crate) async fn resolve_references(&self, instances: &mut [Instance]) -> Result<()> {
        let mut wanted: HashMap<String, (TypeKey, Vec<Bson>)> = HashMap::new();

        for instance in instances.iter() {
            let model = self.mapper.model(instance.type_key())?;
            for property in model.eager_references() {
                let Some(target) = property.shape().referenced_type() else {
                    continue;
                };
                let default_collection = self.mapper.collection_name(target)?;

                if let Some(value) = instance.get(property.name()) {
                    for pointer in pointers(value) {
                        let collection = pointer
                            .collection
                            .clone()
                            .unwrap_or_else(|| default_collection.clone());
                        let (_, ids) = wanted.entry(collection).or_insert_with(|| (target, Vec::new()));
                        if !ids.contains(&pointer.id) {
                            ids.push(pointer.id.clone());
                        }
                    }
                }
            }
        }

        let mut loaded: HashMap<(String, String), Instance> = HashMap::new();

        for (collection, (target, ids)) in wanted {
            let model = self.mapper.model(target)?;
            log::trace!("resolve {} references in `{collection}`", ids.len());

            let mut documents = self
                .store
                .find(
                    &collection,
                    doc! { "_id": { "$in": ids } },
                    FindOptions::default(),
                )
                .await?;

            while let Some(document) = documents.try_next().await? {
                let Some(id) = document.get("_id").map(ToString::to_string) else {
                    continue;
                };
                let instance = self.mapper.decode_instance(&model, document)?;
                loaded.insert((collection.clone(), id), instance);
            }
        }

        for instance in instances.iter_mut() {
            let model = self.mapper.model(instance.type_key())?;
            for property in model.eager_references() {
                let Some(target) = property.shape().referenced_type() else {
                    continue;
                };
                let default_collection = self.mapper.collection_name(target)?;

                if let Some(value) = instance.get_mut(property.name()) {
                    populate(value, &default_collection, &loaded);
                }
            }
        }

        Ok(())
    }
}

fn pointers(value: &Value) -> Vec<&Pointer> {
    match value {
        Value::Reference(pointer) => vec![pointer],
        Value::Sequence(items) => items.iter().flat_map(pointers).collect(),
        Value::Map(entries) => entries.iter().flat_map(|(_, value)| pointers(value)).collect(),
        _ => Vec::new(),
    }
}

fn populate(value: &mut Value, default_collection: &str, loaded: &HashMap<(String, String), Instance>) {
    match value {
        Value::Reference(pointer) => {
            let collection = pointer.collection.as_deref().unwrap_or(default_collection);
            let key = (collection.to_owned(), pointer.id.to_string());
            if let Some(instance) = loaded.get(&key) {
                *value = Value::Entity(Box::new(instance.clone()));
            }
        }
        Value::Sequence(items) => {
            for item in items {
                populate(item, default_collection, loaded);
            }
        }
        Value::Map(entries) => {
            for (_, item) in entries {
                populate(item, default_collection, loaded);
            }
        }
        _ => {}
    }
}

impl<T: Mapped> Reference<T> {
    /// Loads the target if this reference only holds a pointer. Returns
    /// `None` when the target no longer exists.
    pub async fn fetch<S: DocumentStore>(&mut self, datastore: &Datastore<S>) -> Result<Option<&T>> {
        if let Self::Pointer(pointer) = self {
            let pointer = pointer.clone();
            match datastore.dereference::<T>(&pointer).await? {
                Some(entity) => *self = Self::to(entity),
                None => return Ok(None),
            }
        }

        Ok(self.get())
    }
}
