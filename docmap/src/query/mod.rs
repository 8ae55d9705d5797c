//! The query façade.
//!
//! A [`Query`] collects filters for one entity type. Nothing is compiled
//! until it runs; every execution compiles the filters afresh, so a query
//! can be refined and run again.
//!
//! ```ignore
//! let mut query = datastore.find::<Hotel>()?;
//! query.filter(Filters::gte("stars", 4)).filter_expr("address.city", "Lisbon")?;
//!
//! let hotels: Vec<Hotel> = query
//!     .to_vec(FindOptions::new().sort(Sort::new().descending("stars")).limit(10))
//!     .await?;
//! ```

mod cursor;
pub mod filters;
pub(crate) mod lookup;
pub mod options;
pub mod sort;
pub mod updates;

pub use cursor::MappedCursor;
pub use filters::{Filter, Filters, Operand};
pub use options::{
    AggregationOptions, CountOptions, DeleteOptions, FindAndDeleteOptions, FindOptions,
    ModifyOptions, UpdateOptions,
};
pub use sort::Sort;
pub use updates::{UpdateOperator, Updates};

use crate::{
    Mapped,
    codec::writer::DocumentWriter,
    datastore::Datastore,
    error::{Error, Result},
    mapping::{EntityModel, TypeKey, path::translate_path},
    options::ReferenceFetch,
    store::{DeleteResult, DocumentStore, UpdateResult},
    value::Pointer,
};
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use std::{fmt, marker::PhantomData, sync::Arc};

pub struct Query<'a, T, S> {
    datastore: &'a Datastore<S>,
    model: Arc<EntityModel>,
    collection: String,
    filters: Vec<Filter>,
    seed: Option<Document>,
    validate: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Mapped, S: DocumentStore> Query<'a, T, S> {
    pub(crate) fn new(
        datastore: &'a Datastore<S>,
        model: Arc<EntityModel>,
        collection: String,
        seed: Option<Document>,
    ) -> Self {
        Self {
            datastore,
            model,
            collection,
            filters: Vec::new(),
            seed,
            validate: true,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    pub fn filter(&mut self, mut filter: Filter) -> &mut Self {
        filter.stamp(self.type_key(), self.validate);
        self.filters.push(filter);
        self
    }

    pub fn filters(&mut self, filters: impl IntoIterator<Item = Filter>) -> &mut Self {
        for filter in filters {
            self.filter(filter);
        }
        self
    }

    /// Adds a textual condition such as `"age >"`.
    pub fn filter_expr(
        &mut self,
        condition: &str,
        value: impl Into<crate::Value>,
    ) -> Result<&mut Self> {
        let filter = Filter::parse(condition, value)?;
        Ok(self.filter(filter))
    }

    /// Filters added from now on pass unknown field paths through untranslated.
    pub fn disable_validation(&mut self) -> &mut Self {
        self.validate = false;
        self
    }

    pub fn enable_validation(&mut self) -> &mut Self {
        self.validate = true;
        self
    }

    pub fn search(&mut self, text: impl Into<String>) -> &mut Self {
        self.filter(Filters::text(text))
    }

    pub fn search_with_language(
        &mut self,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> &mut Self {
        self.filter(Filters::text(text).language(language))
    }

    /// Compiles the filters, seed and discriminator restriction into one
    /// query document.
    pub fn to_document(&self) -> Result<Document> {
        let mapper = self.datastore.mapper();
        let mut writer = DocumentWriter::new(self.seed.clone());

        for filter in &self.filters {
            writer.merge(filter.encode(mapper)?);
        }

        let mut document = writer.into_document();
        mapper.update_query_with_discriminators(&self.model, &mut document)?;

        Ok(document)
    }

    fn wire_field(&self, field: &str) -> Result<String> {
        let resolved = translate_path(self.datastore.mapper(), &self.model, field, self.validate)?;
        Ok(resolved.mapped)
    }

    /// Translates projected and sorted fields to wire names.
    fn wire_options(&self, mut options: FindOptions) -> Result<FindOptions> {
        options.includes = options
            .includes
            .iter()
            .map(|field| self.wire_field(field))
            .collect::<Result<_>>()?;
        options.excludes = options
            .excludes
            .iter()
            .map(|field| self.wire_field(field))
            .collect::<Result<_>>()?;

        if let Some(sort) = options.sort.take() {
            let mut translated = Document::new();
            for (field, order) in sort {
                // `{$meta: ..}` keys name a computed value, not a property.
                let field = match &order {
                    Bson::Document(meta) if meta.contains_key("$meta") => field,
                    _ => self.wire_field(&field)?,
                };
                translated.insert(field, order);
            }
            options.sort = Some(translated);
        }

        Ok(options)
    }

    async fn start_profiling(&self) -> Result<Document> {
        self.datastore
            .store()
            .run_command(doc! { "profile": 2, "slowms": 0 })
            .await
    }

    async fn stop_profiling(&self, previous: Document) -> Result<()> {
        let mut restore = doc! {
            "profile": previous.get("was").cloned().unwrap_or(Bson::Int32(0)),
        };
        for key in ["slowms", "sampleRate"] {
            if let Some(value) = previous.get(key) {
                restore.insert(key, value.clone());
            }
        }

        self.datastore.store().run_command(restore).await?;

        Ok(())
    }

    pub async fn count(&self, options: CountOptions) -> Result<u64> {
        let query = self.to_document()?;
        log::trace!("count on `{}`: {query}", self.collection);

        self.datastore
            .store()
            .count_documents(&self.collection, query, options)
            .await
    }

    pub async fn delete(&self, options: DeleteOptions) -> Result<DeleteResult> {
        let query = self.to_document()?;
        log::trace!("delete on `{}`: {query} (multi: {})", self.collection, options.multi);

        self.datastore
            .store()
            .delete(&self.collection, query, options)
            .await
    }

    pub async fn find_and_delete(&self, mut options: FindAndDeleteOptions) -> Result<Option<T>> {
        let query = self.to_document()?;
        if let Some(sort) = options.sort.take() {
            options.sort = self.wire_options(FindOptions::new().sort(sort))?.sort;
        }
        log::trace!("find and delete on `{}`: {query}", self.collection);

        let document = self
            .datastore
            .store()
            .find_one_and_delete(&self.collection, query, options)
            .await?;

        document
            .map(|document| self.datastore.mapper().from_document(document))
            .transpose()
    }

    /// Runs the query and returns a cursor over the decoded results.
    ///
    /// Non-lazy references are populated, either by rewriting the find into
    /// an aggregation with `$lookup` stages or by a follow-up query per
    /// referenced collection, as configured in the mapper options.
    pub async fn iter(&self, options: FindOptions) -> Result<MappedCursor<'_, T>> {
        let query = self.to_document()?;
        let options = self.wire_options(options)?;

        if options.is_tailable() && options.sort.is_some() {
            log::warn!(
                "sorting on a tailable cursor over `{}`; the server may reject it",
                self.collection
            );
        }

        let profiling = if options.log_query {
            Some(self.start_profiling().await?)
        } else {
            None
        };

        let cursor = self.open_cursor(query, options).await;

        if let Some(previous) = profiling {
            self.stop_profiling(previous).await?;
        }

        cursor
    }

    async fn open_cursor(
        &self,
        query: Document,
        options: FindOptions,
    ) -> Result<MappedCursor<'_, T>> {
        let datastore = self.datastore;
        let mapper = datastore.mapper();
        let store = datastore.store();

        let eager = self.model.has_eager_references();
        let cursor = match mapper.options().reference_fetch {
            ReferenceFetch::Aggregation if eager => {
                let aggregation = AggregationOptions::from(&options);
                let pipeline = lookup::pipeline(mapper, &self.model, query, &options)?;
                log::trace!("aggregate on `{}`: {pipeline:?}", self.collection);

                let documents = store.aggregate(&self.collection, pipeline, aggregation).await?;
                MappedCursor::from_documents(mapper, Arc::clone(&self.model), documents)
            }
            ReferenceFetch::SecondaryQuery if eager => {
                log::trace!("find on `{}`: {query}", self.collection);

                let mut instances = Vec::new();
                let mut documents = store.find(&self.collection, query, options).await?;
                while let Some(document) = documents.try_next().await? {
                    instances.push(mapper.decode_instance(&self.model, document)?);
                }

                datastore.resolve_references(&mut instances).await?;
                MappedCursor::from_instances(mapper, Arc::clone(&self.model), instances)
            }
            _ => {
                log::trace!("find on `{}`: {query}", self.collection);

                let documents = store.find(&self.collection, query, options).await?;
                MappedCursor::from_documents(mapper, Arc::clone(&self.model), documents)
            }
        };

        Ok(cursor)
    }

    pub async fn to_vec(&self, options: FindOptions) -> Result<Vec<T>> {
        self.iter(options).await?.to_vec().await
    }

    pub async fn first(&self, options: FindOptions) -> Result<Option<T>> {
        self.iter(options.limit(1)).await?.try_next().await
    }

    /// Pointers to the matching documents, without decoding them.
    pub async fn keys(&self, mut options: FindOptions) -> Result<Vec<Pointer>> {
        let query = self.to_document()?;
        options.includes = vec!["_id".to_owned()];
        options.excludes.clear();
        options.sort = match options.sort.take() {
            Some(sort) => self.wire_options(FindOptions::new().sort(sort))?.sort,
            None => None,
        };
        log::trace!("keys on `{}`: {query}", self.collection);

        let documents: Vec<Document> = self
            .datastore
            .store()
            .find(&self.collection, query, options)
            .await?
            .try_collect()
            .await?;

        Ok(documents
            .into_iter()
            .filter_map(|mut document| document.remove("_id"))
            .map(|id| Pointer::new(self.collection.clone(), id))
            .collect())
    }

    /// The server's plan for this query.
    pub async fn explain(&self, options: FindOptions) -> Result<Document> {
        let options = self.wire_options(options)?;
        let mut find = doc! {
            "find": self.collection.as_str(),
            "filter": self.to_document()?,
        };
        if let Some(sort) = options.sort {
            find.insert("sort", sort);
        }
        if let Some(skip) = options.skip {
            find.insert("skip", i64::try_from(skip).unwrap_or(i64::MAX));
        }
        if let Some(limit) = options.limit {
            find.insert("limit", limit);
        }

        self.datastore
            .store()
            .run_command(doc! { "explain": find })
            .await
    }

    pub fn update(&self, operators: Vec<UpdateOperator>) -> Update<'_, 'a, T, S> {
        Update {
            query: self,
            operators,
        }
    }

    pub fn modify(&self, operators: Vec<UpdateOperator>) -> Modify<'_, 'a, T, S> {
        Modify {
            query: self,
            operators,
        }
    }

    fn compile_update(&self, operators: &[UpdateOperator]) -> Result<Document> {
        updates::compile(self.datastore.mapper(), &self.model, operators, self.validate)
    }

    #[deprecated(note = "pass a sort through `FindOptions`")]
    pub fn order(&mut self, _: &str) -> Result<&mut Self> {
        Err(Error::LegacyOperation("order"))
    }

    #[deprecated(note = "pass a limit through `FindOptions`")]
    pub fn limit(&mut self, _: i64) -> Result<&mut Self> {
        Err(Error::LegacyOperation("limit"))
    }

    #[deprecated(note = "pass a skip through `FindOptions`")]
    pub fn offset(&mut self, _: u64) -> Result<&mut Self> {
        Err(Error::LegacyOperation("offset"))
    }

    #[deprecated(note = "pass a projection through `FindOptions`")]
    pub fn retrieved_fields(&mut self, _: bool, _: &[&str]) -> Result<&mut Self> {
        Err(Error::LegacyOperation("retrieved_fields"))
    }
}

impl<T: Mapped, S: DocumentStore> fmt::Display for Query<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_document() {
            Ok(document) => write!(f, "{}.find({document})", self.collection),
            Err(err) => write!(f, "{}.find(<{err}>)", self.collection),
        }
    }
}

impl<T, S> fmt::Debug for Query<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("type", &self.model.type_name())
            .field("collection", &self.collection)
            .field("filters", &self.filters)
            .field("seed", &self.seed)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

/// An update over every document a query matches.
pub struct Update<'q, 'a, T, S> {
    query: &'q Query<'a, T, S>,
    operators: Vec<UpdateOperator>,
}

impl<T: Mapped, S: DocumentStore> Update<'_, '_, T, S> {
    pub async fn execute(self, options: UpdateOptions) -> Result<UpdateResult> {
        let query = self.query;
        let filter = query.to_document()?;
        let update = query.compile_update(&self.operators)?;
        log::trace!("update on `{}`: {filter} with {update}", query.collection);

        query
            .datastore
            .store()
            .update(&query.collection, filter, update, options)
            .await
    }
}

/// Find-and-modify of the first document a query matches.
pub struct Modify<'q, 'a, T, S> {
    query: &'q Query<'a, T, S>,
    operators: Vec<UpdateOperator>,
}

impl<T: Mapped, S: DocumentStore> Modify<'_, '_, T, S> {
    pub async fn execute(self, mut options: ModifyOptions) -> Result<Option<T>> {
        let query = self.query;
        let filter = query.to_document()?;
        let update = query.compile_update(&self.operators)?;
        if let Some(sort) = options.sort.take() {
            options.sort = query.wire_options(FindOptions::new().sort(sort))?.sort;
        }
        log::trace!("modify on `{}`: {filter} with {update}", query.collection);

        let document = query
            .datastore
            .store()
            .find_one_and_update(&query.collection, filter, update, options)
            .await?;

        document
            .map(|document| query.datastore.mapper().from_document(document))
            .transpose()
    }
}
