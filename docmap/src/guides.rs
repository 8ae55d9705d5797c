/// ## Getting started
///
/// A type becomes persistent by implementing [`Mapped`](crate::Mapped). The
/// `describe` function lists the stored properties; `to_instance` and
/// `from_instance` move values in and out of the generic
/// [`Instance`](crate::Instance) tree the codec works on.
///
/// An entity must:
/// - be marked with [`EntityAnnotation`](crate::EntityAnnotation), unless it
///   is only ever embedded or used as an abstract base
/// - declare exactly one id property with [`EntityModelBuilder::id`](crate::EntityModelBuilder::id)
///   (always stored as `_id`)
///
/// ```ignore
/// impl Mapped for User {
///     fn describe(model: &mut EntityModelBuilder) {
///         model.entity(EntityAnnotation::new());
///         model.id::<ObjectId>("id");
///         model.property::<String>("email");
///         model.property::<Option<String>>("nickname");
///     }
///     // to_instance / from_instance
/// }
/// ```
///
/// By default the collection is the simple type name (`User`) and property
/// names are stored unchanged. Both follow
/// [`MapperOptions`](crate::MapperOptions):
///
/// ```ignore
/// let mapper = Mapper::with_options(
///     MapperOptions::default()
///         .collection_naming(NamingStrategy::SnakeCase)
///         .field_naming(NamingStrategy::CamelCase),
/// );
/// ```
///
/// ### Method overview
///
/// | Call                                   | Server operation                    |
/// |----------------------------------------|-------------------------------------|
/// | [`Datastore::save`](crate::Datastore::save)     | `insertOne`                |
/// | [`Datastore::delete`](crate::Datastore::delete) | `deleteOne({ _id })`       |
/// | [`Query::iter`](crate::Query::iter)    | `find` or `aggregate` with `$lookup` |
/// | [`Query::count`](crate::Query::count)  | `countDocuments`                    |
/// | [`Query::delete`](crate::Query::delete)| `deleteOne` / `deleteMany`          |
/// | [`Query::update`](crate::Query::update)| `updateOne` / `updateMany`          |
/// | [`Query::modify`](crate::Query::modify)| `findOneAndUpdate`                  |
pub mod getting_started {}

/// ## Conventions
///
/// Every model passes through the mapper's conventions before it is
/// validated. The defaults fill in the discriminator settings and apply the
/// naming strategies; custom conventions run after them and may change any
/// part of the description.
///
/// ```ignore
/// let mapper = Mapper::builder()
///     .convention(|_: &MapperOptions, model: &mut EntityModelBuilder| {
///         for property in model.properties_mut() {
///             if property.name() == "version" {
///                 property.immutable();
///             }
///         }
///     })
///     .build();
/// ```
///
/// Properties marked `immutable` are left out of stored documents when
/// [`MapperOptions::ignore_finals`](crate::MapperOptions::ignore_finals) is
/// set, and decode to their default value.
///
/// A property named explicitly with [`PropertyBuilder::named`](crate::mapping::PropertyBuilder::named)
/// keeps its name regardless of the field naming strategy.
pub mod conventions {}

/// ## Polymorphism
///
/// A base type lists its subtypes with
/// [`EntityModelBuilder::subtype`](crate::EntityModelBuilder::subtype). Stored
/// documents carry a discriminator (`_t` by default) naming their concrete
/// type, and decoding picks the model that discriminator belongs to.
///
/// ```ignore
/// impl Mapped for Shape {
///     fn describe(model: &mut EntityModelBuilder) {
///         model.entity(EntityAnnotation::new().collection("shapes"));
///         model.abstract_type();
///         model.subtype::<Circle>().subtype::<Square>();
///         model.id::<ObjectId>("id");
///     }
///     // ...
/// }
/// ```
///
/// With [`MapperOptions::enable_polymorphic_queries`](crate::MapperOptions::enable_polymorphic_queries)
/// a query for `Shape` matches `{ _t: { $in: ["Circle", "Square"] } }`;
/// otherwise it matches only the discriminator of the queried type itself.
///
/// Values of a field declared as a base type are read back as whatever
/// subtype was written, both for embedded values and for references.
pub mod polymorphism {}

/// ## References
///
/// A property of type [`Reference<T>`](crate::Reference) stores a pointer to
/// a document of another collection instead of embedding it. Pointers are
/// written as `{ $ref, $id }` or, with
/// [`PropertyBuilder::id_only`](crate::mapping::PropertyBuilder::id_only), as
/// the bare id.
///
/// Non-lazy references are populated when a query runs: by rewriting the
/// find into an aggregation with one `$lookup` per reference, or by one
/// follow-up `_id $in` query per referenced collection, depending on
/// [`ReferenceFetch`](crate::ReferenceFetch). Lazy references stay pointers
/// until [`Reference::fetch`](crate::Reference::fetch) loads them, which is
/// also how cyclic graphs are stored.
///
/// ```ignore
/// model.property::<Reference<Author>>("author");
/// model.property::<Reference<Book>>("sequel").lazy();
///
/// let mut book = datastore.find::<Book>()?.first(FindOptions::default()).await?.unwrap();
/// let sequel = book.sequel.fetch(&datastore).await?;
/// ```
pub mod references {}

/// ## Filters and updates
///
/// Filters name Rust property names and dotted paths; the query translates
/// them to stored names and encodes values with the declared type of the
/// property they compare with.
///
/// ```ignore
/// // { rating: { $gte: 4 }, "address.city": { $in: ["Lisbon", "Porto"] } }
/// query
///     .filter(Filters::gte("stars", 4))
///     .filter(Filters::in_("address.city", ["Lisbon", "Porto"]));
///
/// // The same with the textual form and the macro
/// query.filter_expr("stars >=", 4)?;
/// query.filters(filter! { "address.city": In(["Lisbon", "Porto"]) });
/// ```
///
/// Updates are grouped by operator:
///
/// ```ignore
/// // { $inc: { rating: 1 }, $push: { tags: "renovated" } }
/// query
///     .update(update! { stars: Inc(1), tags: Push("renovated") })
///     .execute(UpdateOptions::default().multi(true))
///     .await?;
/// ```
///
/// Unknown paths are rejected unless validation is disabled on the query
/// with [`Query::disable_validation`](crate::Query::disable_validation).
pub mod filters_and_updates {}

/// ## Sessions
///
/// [`MongoStore::with_session`](crate::MongoStore::with_session) runs every
/// operation of a datastore in one client session, which is how the driver
/// groups operations into a transaction.
///
/// ```ignore
/// let mut session = client.start_session().await?;
/// session.start_transaction().await?;
///
/// // futures_util::lock::Mutex
/// let session = Arc::new(Mutex::new(session));
/// let datastore = Datastore::new(MongoStore::new(db).with_session(Arc::clone(&session)));
/// datastore.save(&order).await?;
///
/// session.lock().await.commit_transaction().await?;
/// ```
pub mod sessions {}
