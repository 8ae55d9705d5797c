#![allow(dead_code)]

use docmap::{
    Datastore, DeleteResult, DocumentStore, DocumentStream, EmbeddedAnnotation, EntityAnnotation,
    EntityModelBuilder, Instance, Mapped, Mapper, MapperOptions, Reference, Result, UpdateResult,
    embedded_property, mapped_enum,
    mongodb::bson::{Bson, Document, doc, oid::ObjectId},
    query::{
        AggregationOptions, CountOptions, DeleteOptions, FindAndDeleteOptions, FindOptions,
        ModifyOptions, UpdateOptions,
    },
};
use futures_util::{
    FutureExt,
    future::BoxFuture,
    stream::{self, StreamExt},
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

mapped_enum! {
    pub enum Status {
        Open,
        Closed,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

impl Mapped for Address {
    fn describe(model: &mut EntityModelBuilder) {
        model.embedded(EmbeddedAnnotation::new());
        model.property::<String>("street");
        model.property::<String>("city");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("street", &self.street)?
            .with("city", &self.city)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            street: instance.take("street")?,
            city: instance.take("city")?,
        })
    }
}

embedded_property!(Address);

#[derive(Clone, Debug, PartialEq)]
pub struct Hotel {
    pub id: Option<ObjectId>,
    pub name: String,
    pub stars: i32,
    pub address: Option<Address>,
    pub tags: Vec<String>,
    pub status: Status,
}

impl Hotel {
    pub fn grand() -> Self {
        Self {
            id: None,
            name: "Grand".to_owned(),
            stars: 4,
            address: Some(Address {
                street: "Rua Augusta 1".to_owned(),
                city: "Lisbon".to_owned(),
            }),
            tags: vec!["spa".to_owned(), "pool".to_owned()],
            status: Status::Open,
        }
    }
}

impl Mapped for Hotel {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("hotels"));
        model.id::<Option<ObjectId>>("id");
        model.property::<String>("name");
        model.property::<i32>("stars").named("rating");
        model.property::<Option<Address>>("address");
        model.property::<Vec<String>>("tags");
        model.property::<Status>("status");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("name", &self.name)?
            .with("stars", &self.stars)?
            .with("address", &self.address)?
            .with("tags", &self.tags)?
            .with("status", &self.status)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            name: instance.take("name")?,
            stars: instance.take("stars")?,
            address: instance.take("address")?,
            tags: instance.take("tags")?,
            status: instance.take("status")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dog {
    pub name: String,
    pub good: bool,
}

impl Mapped for Dog {
    fn describe(model: &mut EntityModelBuilder) {
        model.property::<String>("name");
        model.property::<bool>("good");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("name", &self.name)?
            .with("good", &self.good)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            name: instance.take("name")?,
            good: instance.take("good")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cat {
    pub name: String,
    pub lives: i32,
}

impl Mapped for Cat {
    fn describe(model: &mut EntityModelBuilder) {
        model.property::<String>("name");
        model.property::<i32>("lives");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("name", &self.name)?
            .with("lives", &self.lives)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            name: instance.take("name")?,
            lives: instance.take("lives")?,
        })
    }
}

/// Embedded base type; values are always one of its subtypes.
#[derive(Clone, Debug, PartialEq)]
pub enum Pet {
    Dog(Dog),
    Cat(Cat),
}

impl Mapped for Pet {
    fn describe(model: &mut EntityModelBuilder) {
        model.abstract_type();
        model.subtype::<Dog>().subtype::<Cat>();
    }

    fn to_instance(&self) -> Result<Instance> {
        match self {
            Self::Dog(dog) => dog.to_instance(),
            Self::Cat(cat) => cat.to_instance(),
        }
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        if instance.is::<Dog>() {
            Dog::from_instance(instance).map(Self::Dog)
        } else {
            Cat::from_instance(instance).map(Self::Cat)
        }
    }
}

embedded_property!(Pet, Dog, Cat);

#[derive(Clone, Debug, PartialEq)]
pub struct Owner {
    pub id: ObjectId,
    pub pets: Vec<Pet>,
    pub favourite: Option<Pet>,
}

impl Mapped for Owner {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new());
        model.id::<ObjectId>("id");
        model.property::<Vec<Pet>>("pets");
        model.property::<Option<Pet>>("favourite");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("pets", &self.pets)?
            .with("favourite", &self.favourite)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            pets: instance.take("pets")?,
            favourite: instance.take("favourite")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Circle {
    pub id: ObjectId,
    pub radius: f64,
}

impl Mapped for Circle {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("shapes"));
        model.id::<ObjectId>("id");
        model.property::<f64>("radius");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("radius", &self.radius)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            radius: instance.take("radius")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Square {
    pub id: ObjectId,
    pub side: f64,
}

impl Mapped for Square {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("shapes"));
        model.id::<ObjectId>("id");
        model.property::<f64>("side");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("side", &self.side)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            side: instance.take("side")?,
        })
    }
}

/// Abstract entity stored in the collection shared by its subtypes.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Square(Square),
}

impl Mapped for Shape {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("shapes"));
        model.abstract_type();
        model.subtype::<Circle>().subtype::<Square>();
    }

    fn to_instance(&self) -> Result<Instance> {
        match self {
            Self::Circle(circle) => circle.to_instance(),
            Self::Square(square) => square.to_instance(),
        }
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        if instance.is::<Circle>() {
            Circle::from_instance(instance).map(Self::Circle)
        } else {
            Square::from_instance(instance).map(Self::Square)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Author {
    pub id: ObjectId,
    pub name: String,
}

impl Mapped for Author {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("authors"));
        model.id::<ObjectId>("id");
        model.property::<String>("name");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("name", &self.name)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            name: instance.take("name")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Book {
    pub id: ObjectId,
    pub title: String,
    pub author: Reference<Author>,
    pub sequel: Option<Reference<Book>>,
}

impl Mapped for Book {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("books"));
        model.id::<ObjectId>("id");
        model.property::<String>("title");
        model.property::<Reference<Author>>("author");
        model.property::<Option<Reference<Book>>>("sequel").lazy();
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("title", &self.title)?
            .with("author", &self.author)?
            .with("sequel", &self.sequel)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            title: instance.take("title")?,
            author: instance.take("author")?,
            sequel: instance.take("sequel")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Anthology {
    pub id: ObjectId,
    pub title: String,
    pub authors: Vec<Reference<Author>>,
}

impl Mapped for Anthology {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new().collection("anthologies"));
        model.id::<ObjectId>("id");
        model.property::<String>("title");
        model.property::<Vec<Reference<Author>>>("authors");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("title", &self.title)?
            .with("authors", &self.authors)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            title: instance.take("title")?,
            authors: instance.take("authors")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    pub id: ObjectId,
    pub by_number: BTreeMap<i32, String>,
    pub by_status: BTreeMap<Status, i64>,
    pub by_owner: BTreeMap<ObjectId, String>,
}

impl Mapped for Registry {
    fn describe(model: &mut EntityModelBuilder) {
        model.entity(EntityAnnotation::new());
        model.id::<ObjectId>("id");
        model.property::<BTreeMap<i32, String>>("by_number");
        model.property::<BTreeMap<Status, i64>>("by_status");
        model.property::<BTreeMap<ObjectId, String>>("by_owner");
    }

    fn to_instance(&self) -> Result<Instance> {
        Instance::of::<Self>()
            .with("id", &self.id)?
            .with("by_number", &self.by_number)?
            .with("by_status", &self.by_status)?
            .with("by_owner", &self.by_owner)
    }

    fn from_instance(mut instance: Instance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            by_number: instance.take("by_number")?,
            by_status: instance.take("by_status")?,
            by_owner: instance.take("by_owner")?,
        })
    }
}

/// Options used by most tests: short discriminators keep expected documents
/// readable.
pub fn options() -> MapperOptions {
    MapperOptions::new().discriminator(docmap::DiscriminatorFunction::SimpleName)
}

pub fn mapper() -> Mapper {
    Mapper::with_options(options())
}

pub fn datastore() -> Datastore<FakeStore> {
    datastore_with(options())
}

pub fn datastore_with(options: MapperOptions) -> Datastore<FakeStore> {
    Datastore::with_mapper(Arc::new(Mapper::with_options(options)), FakeStore::default())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub operation: &'static str,
    pub collection: String,
    pub body: Document,
}

/// In-memory [`DocumentStore`] recording every call it receives.
///
/// `find` understands equality and `$in` on top-level fields; aggregations
/// return whatever was queued with [`FakeStore::queue_aggregate`].
#[derive(Debug, Default)]
pub struct FakeStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    aggregate_results: Mutex<Vec<Document>>,
    calls: Mutex<Vec<Call>>,
    sorts: Mutex<Vec<Option<Document>>>,
}

impl FakeStore {
    pub fn insert(&self, collection: &str, documents: impl IntoIterator<Item = Document>) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_owned())
            .or_default()
            .extend(documents);
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn queue_aggregate(&self, documents: impl IntoIterator<Item = Document>) {
        self.aggregate_results.lock().unwrap().extend(documents);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Sort passed to the latest `find`.
    pub fn last_sort(&self) -> Option<Document> {
        self.sorts.lock().unwrap().last().cloned().flatten()
    }

    pub fn last_call(&self) -> Call {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }

    fn record(&self, operation: &'static str, collection: &str, body: Document) {
        self.calls.lock().unwrap().push(Call {
            operation,
            collection: collection.to_owned(),
            body,
        });
    }

    fn matching(&self, collection: &str, filter: &Document) -> Vec<Document> {
        self.documents(collection)
            .into_iter()
            .filter(|document| matches(document, filter))
            .collect()
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(field, condition)| {
        if field.starts_with('$') {
            return true;
        }
        let value = document.get(field);

        match condition {
            Bson::Document(operators) if operators.keys().all(|key| key.starts_with('$')) => {
                operators.iter().all(|(operator, operand)| match (operator.as_str(), operand) {
                    ("$eq", operand) => value == Some(operand),
                    ("$in", Bson::Array(candidates)) => {
                        value.is_some_and(|value| candidates.contains(value))
                    }
                    _ => true,
                })
            }
            condition => value == Some(condition),
        }
    })
}

fn into_stream<'a>(documents: Vec<Document>) -> DocumentStream<'a> {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

impl DocumentStore for FakeStore {
    fn insert_one<'a>(&'a self, collection: &'a str, document: Document) -> BoxFuture<'a, Result<Bson>> {
        async move {
            self.record("insert_one", collection, document.clone());
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            self.insert(collection, [document]);

            Ok(id)
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
            self.record("find", collection, filter.clone());
            self.sorts.lock().unwrap().push(options.sort.clone());
            let mut documents = self.matching(collection, &filter);
            if let Some(limit) = options.limit {
                documents.truncate(usize::try_from(limit).unwrap());
            }

            Ok(into_stream(documents))
        }
        .boxed()
    }

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: Vec<Document>,
        _: AggregationOptions,
    ) -> BoxFuture<'a, Result<DocumentStream<'a>>> {
        async move {
            self.record("aggregate", collection, doc! { "pipeline": pipeline });
            let documents = std::mem::take(&mut *self.aggregate_results.lock().unwrap());

            Ok(into_stream(documents))
        }
        .boxed()
    }

    fn count_documents<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        _: CountOptions,
    ) -> BoxFuture<'a, Result<u64>> {
        async move {
            self.record("count_documents", collection, filter.clone());

            Ok(self.matching(collection, &filter).len() as u64)
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
            self.record("delete", collection, filter.clone());

            let mut collections = self.collections.lock().unwrap();
            let documents = collections.entry(collection.to_owned()).or_default();
            let before = documents.len();
            let mut deleted = 0;
            documents.retain(|document| {
                let remove = matches(document, &filter) && (options.multi || deleted == 0);
                if remove {
                    deleted += 1;
                }
                !remove
            });

            Ok(DeleteResult {
                deleted_count: (before - documents.len()) as u64,
            })
        }
        .boxed()
    }

    fn find_one_and_delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        _: FindAndDeleteOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        async move {
            self.record("find_one_and_delete", collection, filter.clone());

            let mut collections = self.collections.lock().unwrap();
            let documents = collections.entry(collection.to_owned()).or_default();
            let position = documents.iter().position(|document| matches(document, &filter));

            Ok(position.map(|position| documents.remove(position)))
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        _: UpdateOptions,
    ) -> BoxFuture<'a, Result<UpdateResult>> {
        async move {
            let matched = self.matching(collection, &filter).len() as u64;
            self.record("update", collection, doc! { "filter": filter, "update": update });

            Ok(UpdateResult {
                matched_count: matched,
                modified_count: matched,
                upserted_id: None,
            })
        }
        .boxed()
    }

    fn find_one_and_update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        _: ModifyOptions,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        async move {
            let found = self.matching(collection, &filter).into_iter().next();
            self.record(
                "find_one_and_update",
                collection,
                doc! { "filter": filter, "update": update },
            );

            Ok(found)
        }
        .boxed()
    }

    fn run_command<'a>(&'a self, command: Document) -> BoxFuture<'a, Result<Document>> {
        async move {
            self.record("run_command", "admin", command);

            Ok(doc! { "ok": 1, "was": 0, "slowms": 100 })
        }
        .boxed()
    }
}
