//! The document store the query façade runs against.
//!
//! Everything here is plumbing: [`MongoStore`] forwards each call to the
//! driver, optionally inside a session.

use crate::{
    error::Result,
    query::options::{
        AggregationOptions, CountOptions, DeleteOptions, FindAndDeleteOptions, FindOptions,
        ModifyOptions, UpdateOptions,
    },
};
use futures_util::{
    FutureExt, StreamExt, TryStreamExt,
    future::BoxFuture,
    lock::Mutex,
    stream::{self, BoxStream},
};
use mongodb::{
    ClientSession, Collection, Database,
    bson::{Bson, Document},
    options::{
        CollectionOptions, Hint, ReadConcern, ReturnDocument, SelectionCriteria, WriteConcern,
    },
};
use std::sync::Arc;

pub type DocumentStream<'a> = BoxStream<'a, Result<Document>>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

pub trait DocumentStore: Send + Sync {
    /// Inserts `document` and returns its `_id`.
    fn insert_one<'a>(&'a self, collection: &'a str, document: Document)
    -> BoxFuture<'a, Result<Bson>>;

    fn find<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: FindOptions,
    ) -> BoxFuture<'a, Result<DocumentStream<'a>>>;

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: Vec<Document>,
        options: AggregationOptions,
    ) -> BoxFuture<'a, Result<DocumentStream<'a>>>;

    fn count_documents<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: CountOptions,
    ) -> BoxFuture<'a, Result<u64>>;

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: DeleteOptions,
    ) -> BoxFuture<'a, Result<DeleteResult>>;

    fn find_one_and_delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: FindAndDeleteOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>>;

    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BoxFuture<'a, Result<UpdateResult>>;

    fn find_one_and_update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        options: ModifyOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>>;

    fn run_command<'a>(&'a self, command: Document) -> BoxFuture<'a, Result<Document>>;
}

/// [`DocumentStore`] over a driver database handle.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    session: Option<Arc<Mutex<ClientSession>>>,
    read_concern: Option<ReadConcern>,
    selection_criteria: Option<SelectionCriteria>,
    write_concern: Option<WriteConcern>,
}

impl std::fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("db", &self.db.name())
            .field("session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

macro_rules! with_session {
    ($action: expr, $session: expr) => {
        match $session {
            Some(session) => $action.session(&mut *session.lock().await).await,
            None => $action.await,
        }
    };
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            session: None,
            read_concern: None,
            selection_criteria: None,
            write_concern: None,
        }
    }

    /// Runs every operation inside `session`. The caller keeps its own handle
    /// to commit or abort a transaction started on it.
    pub fn with_session(mut self, session: Arc<Mutex<ClientSession>>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_read_concern(mut self, read_concern: ReadConcern) -> Self {
        self.read_concern = Some(read_concern);
        self
    }

    pub fn with_selection_criteria(mut self, selection_criteria: SelectionCriteria) -> Self {
        self.selection_criteria = Some(selection_criteria);
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = Some(write_concern);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        let mut options = CollectionOptions::default();
        options.read_concern.clone_from(&self.read_concern);
        options.selection_criteria.clone_from(&self.selection_criteria);
        options.write_concern.clone_from(&self.write_concern);

        self.db.collection_with_options(name, options)
    }
}

impl DocumentStore for MongoStore {
    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Document,
    ) -> BoxFuture<'a, Result<Bson>> {
        async move {
            let collection = self.collection(collection);
            let result = with_session!(collection.insert_one(document), &self.session)?;

            Ok(result.inserted_id)
        }
        .boxed()
    }

    fn find<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: FindOptions,
    ) -> BoxFuture<'a, Result<DocumentStream<'a>>> {
        async move {
            let collection = self.collection(collection);
            let mut query = collection.find(filter);

            if let Some(sort) = options.sort {
                query = query.sort(sort);
            }
            if let Some(skip) = options.skip {
                query = query.skip(skip);
            }
            if let Some(limit) = options.limit {
                query = query.limit(limit);
            }
            if let Some(batch_size) = options.batch_size {
                query = query.batch_size(batch_size);
            }
            if let Some(comment) = options.comment {
                query = query.comment(Bson::String(comment));
            }
            if let Some(hint) = options.hint {
                query = query.hint(Hint::Keys(hint));
            }
            if let Some(max_time) = options.max_time {
                query = query.max_time(max_time);
            }
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(cursor_type) = options.cursor_type {
                query = query.cursor_type(cursor_type);
            }
            if let Some(read_concern) = options.read_concern {
                query = query.read_concern(read_concern);
            }
            if let Some(selection_criteria) = options.selection_criteria {
                query = query.selection_criteria(selection_criteria);
            }
            if let Some(projection) = projection(&options.includes, &options.excludes) {
                query = query.projection(projection);
            }

            let stream: DocumentStream<'a> = match &self.session {
                Some(session) => {
                    let mut session = session.lock().await;
                    let documents: Vec<Document> = query
                        .session(&mut *session)
                        .await?
                        .stream(&mut *session)
                        .try_collect()
                        .await?;
                    stream::iter(documents.into_iter().map(Ok)).boxed()
                }
                None => query.await?.map_err(Into::into).boxed(),
            };

            Ok(stream)
        }
        .boxed()
    }

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: Vec<Document>,
        options: AggregationOptions,
    ) -> BoxFuture<'a, Result<DocumentStream<'a>>> {
        async move {
            let collection = self.collection(collection);
            let mut query = collection.aggregate(pipeline);

            if let Some(allow_disk_use) = options.allow_disk_use {
                query = query.allow_disk_use(allow_disk_use);
            }
            if let Some(batch_size) = options.batch_size {
                query = query.batch_size(batch_size);
            }
            if let Some(bypass) = options.bypass_document_validation {
                query = query.bypass_document_validation(bypass);
            }
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(hint) = options.hint {
                query = query.hint(Hint::Keys(hint));
            }
            if let Some(comment) = options.comment {
                query = query.comment(Bson::String(comment));
            }
            if let Some(max_time) = options.max_time {
                query = query.max_time(max_time);
            }
            if let Some(max_await_time) = options.max_await_time {
                query = query.max_await_time(max_await_time);
            }
            if let Some(read_concern) = options.read_concern {
                query = query.read_concern(read_concern);
            }
            if let Some(selection_criteria) = options.selection_criteria {
                query = query.selection_criteria(selection_criteria);
            }
            if let Some(write_concern) = options.write_concern {
                query = query.write_concern(write_concern);
            }

            let stream: DocumentStream<'a> = match &self.session {
                Some(session) => {
                    let mut session = session.lock().await;
                    let documents: Vec<Document> = query
                        .session(&mut *session)
                        .await?
                        .stream(&mut *session)
                        .try_collect()
                        .await?;
                    stream::iter(documents.into_iter().map(Ok)).boxed()
                }
                None => query.await?.map_err(Into::into).boxed(),
            };

            Ok(stream)
        }
        .boxed()
    }

    fn count_documents<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: CountOptions,
    ) -> BoxFuture<'a, Result<u64>> {
        async move {
            let collection = self.collection(collection);
            let mut query = collection.count_documents(filter);

            if let Some(skip) = options.skip {
                query = query.skip(skip);
            }
            if let Some(limit) = options.limit {
                query = query.limit(limit);
            }
            if let Some(hint) = options.hint {
                query = query.hint(Hint::Keys(hint));
            }
            if let Some(max_time) = options.max_time {
                query = query.max_time(max_time);
            }
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(read_concern) = options.read_concern {
                query = query.read_concern(read_concern);
            }
            if let Some(selection_criteria) = options.selection_criteria {
                query = query.selection_criteria(selection_criteria);
            }

            let count = with_session!(query, &self.session)?;

            Ok(count)
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: DeleteOptions,
    ) -> BoxFuture<'a, Result<DeleteResult>> {
        async move {
            let collection = self.collection(collection);

            let mut query = if options.multi {
                collection.delete_many(filter)
            } else {
                collection.delete_one(filter)
            };

            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(hint) = options.hint {
                query = query.hint(Hint::Keys(hint));
            }
            if let Some(write_concern) = options.write_concern {
                query = query.write_concern(write_concern);
            }

            let result = with_session!(query, &self.session)?;

            Ok(DeleteResult {
                deleted_count: result.deleted_count,
            })
        }
        .boxed()
    }

    fn find_one_and_delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        options: FindAndDeleteOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        async move {
            let collection = self.collection(collection);
            let mut query = collection.find_one_and_delete(filter);

            if let Some(sort) = options.sort {
                query = query.sort(sort);
            }
            if let Some(max_time) = options.max_time {
                query = query.max_time(max_time);
            }
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(write_concern) = options.write_concern {
                query = query.write_concern(write_concern);
            }

            let document = with_session!(query, &self.session)?;

            Ok(document)
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BoxFuture<'a, Result<UpdateResult>> {
        async move {
            let collection = self.collection(collection);

            let mut query = if options.multi {
                collection.update_many(filter, update)
            } else {
                collection.update_one(filter, update)
            };

            query = query.upsert(options.upsert);
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(write_concern) = options.write_concern {
                query = query.write_concern(write_concern);
            }

            let result = with_session!(query, &self.session)?;

            Ok(UpdateResult {
                matched_count: result.matched_count,
                modified_count: result.modified_count,
                upserted_id: result.upserted_id,
            })
        }
        .boxed()
    }

    fn find_one_and_update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        options: ModifyOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        async move {
            let collection = self.collection(collection);
            let mut query = collection
                .find_one_and_update(filter, update)
                .upsert(options.upsert)
                .return_document(if options.return_new {
                    ReturnDocument::After
                } else {
                    ReturnDocument::Before
                });

            if let Some(sort) = options.sort {
                query = query.sort(sort);
            }
            if let Some(max_time) = options.max_time {
                query = query.max_time(max_time);
            }
            if let Some(collation) = options.collation {
                query = query.collation(collation);
            }
            if let Some(write_concern) = options.write_concern {
                query = query.write_concern(write_concern);
            }

            let document = with_session!(query, &self.session)?;

            Ok(document)
        }
        .boxed()
    }

    fn run_command<'a>(&'a self, command: Document) -> BoxFuture<'a, Result<Document>> {
        async move {
            let query = self.db.run_command(command);
            let document = with_session!(query, &self.session)?;

            Ok(document)
        }
        .boxed()
    }
}

fn projection(includes: &[String], excludes: &[String]) -> Option<Document> {
    if includes.is_empty() && excludes.is_empty() {
        return None;
    }

    let mut document = Document::new();
    for field in includes {
        document.insert(field, 1);
    }
    for field in excludes {
        document.insert(field, 0);
    }

    Some(document)
}
