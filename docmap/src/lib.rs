//! Docmap is an object-document mapper for `MongoDB`.
//!
//! Types describe their persistent properties once; a [`Mapper`] turns that
//! description into a validated [`EntityModel`] and converts instances to and
//! from BSON documents. A [`Datastore`] builds typed queries on top.
//!
//! ## Example
//!
//! ```ignore
//! struct Hotel {
//!     id: Option<ObjectId>,
//!     name: String,
//!     stars: i32,
//!     address: Address,
//!     tags: Vec<String>,
//! }
//!
//! impl Mapped for Hotel {
//!     fn describe(model: &mut EntityModelBuilder) {
//!         model.entity(EntityAnnotation::new().collection("hotels"));
//!         model.id::<Option<ObjectId>>("id");
//!         model.property::<String>("name");
//!         model.property::<i32>("stars").named("rating");
//!         model.property::<Address>("address");
//!         model.property::<Vec<String>>("tags");
//!     }
//!
//!     fn to_instance(&self) -> Result<Instance> {
//!         Instance::of::<Self>()
//!             .with("id", &self.id)?
//!             .with("name", &self.name)?
//!             .with("stars", &self.stars)?
//!             .with("address", &self.address)?
//!             .with("tags", &self.tags)
//!     }
//!
//!     fn from_instance(mut instance: Instance) -> Result<Self> {
//!         Ok(Self {
//!             id: instance.take("id")?,
//!             name: instance.take("name")?,
//!             stars: instance.take("stars")?,
//!             address: instance.take("address")?,
//!             tags: instance.take("tags")?,
//!         })
//!     }
//! }
//!
//! let datastore = Datastore::new(MongoStore::new(client.database("travel")));
//!
//! // db.hotels.insertOne({ _id: ..., name: "Grand", rating: 4, ... })
//! datastore.save(&hotel).await?;
//!
//! // db.hotels.find({ rating: { $gte: 4 } }).sort({ name: 1 })
//! let hotels: Vec<Hotel> = datastore
//!     .find::<Hotel>()?
//!     .filters(filter! { stars: Gte(4) })
//!     .to_vec(FindOptions::new().sort(Sort::new().ascending("name")))
//!     .await?;
//! ```
//!
//! See [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

pub mod codec;
pub mod datastore;
pub mod error;
pub mod guides;
pub mod mapping;
#[cfg(feature = "meta")]
pub mod meta;
pub mod options;
pub mod property;
pub mod query;
pub mod store;
pub mod value;

pub use docmap_macros::{filter, update};

pub use datastore::Datastore;
pub use error::{Error, Result};
pub use mapping::{
    DiscriminatorFunction, EmbeddedAnnotation, EntityAnnotation, EntityModel,
    EntityModelBuilder, Mapper, MapperBuilder, PropertyModel, TypeKey, TypeShape,
};
pub use options::{MapperOptions, NamingStrategy, ReferenceFetch};
pub use property::{KeyProperty, Mapped, MappedEnum, Property, Reference};
pub use query::{
    Filter, Filters, FindOptions, MappedCursor, Query, Sort, UpdateOperator, Updates,
};
pub use store::{DeleteResult, DocumentStore, DocumentStream, MongoStore, UpdateResult};
pub use value::{Instance, MapKey, Pointer, Value};

pub use mongodb;
