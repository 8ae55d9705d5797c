//! Entity models and how they are derived.
//!
//! A type describes itself once through [`Mapped::describe`](crate::Mapped::describe);
//! the [`Mapper`] runs the [`conventions`] over that description, validates
//! the result and caches it as an immutable [`EntityModel`].

pub mod builder;
pub mod conventions;
pub mod discriminator;
mod mapper;
mod model;
pub(crate) mod path;
mod shape;

pub use builder::{EmbeddedAnnotation, EntityAnnotation, EntityModelBuilder, PropertyBuilder};
pub use discriminator::DiscriminatorFunction;
pub use mapper::{Mapper, MapperBuilder};
pub use model::{EntityModel, ModelKind, PropertyModel, ReferenceOptions};
pub use shape::{EnumSpec, KeyKind, ScalarKind, SequenceKind, TypeShape};

use crate::Mapped;
use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
};

/// Stable handle to a mapped type.
///
/// Models refer to each other only through these handles, so mutually
/// recursive types never form pointer cycles.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    describe: fn(&mut EntityModelBuilder),
}

impl TypeKey {
    pub fn of<T: Mapped>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            describe: T::describe,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path or generic arguments.
    pub fn simple_name(&self) -> &'static str {
        let name = self.name.split('<').next().unwrap_or(self.name);
        name.rsplit("::").next().unwrap_or(name)
    }

    pub(crate) fn describe(&self, builder: &mut EntityModelBuilder) {
        (self.describe)(builder);
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
