//! Link-time registry of mapped types.
//!
//! ```ignore
//! docmap::register!(Hotel, Address);
//!
//! let mapper = Mapper::new();
//! mapper.map_registered()?;
//! ```

use crate::mapping::TypeKey;

#[doc(hidden)]
pub use inventory;

#[doc(hidden)]
pub struct RegisteredType(pub fn() -> TypeKey);

inventory::collect!(RegisteredType);

pub fn registered_types() -> impl Iterator<Item = TypeKey> {
    inventory::iter::<RegisteredType>
        .into_iter()
        .map(|registered| (registered.0)())
}

/// Submits types to the registry read by
/// [`Mapper::map_registered`](crate::Mapper::map_registered).
#[macro_export]
macro_rules! register {
    ($($ty:ty),+ $(,)?) => {
        $(
            $crate::meta::inventory::submit! {
                $crate::meta::RegisteredType({
                    fn type_key() -> $crate::TypeKey {
                        $crate::TypeKey::of::<$ty>()
                    }
                    type_key
                })
            }
        )+
    };
}
