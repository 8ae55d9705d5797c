use crate::mapping::DiscriminatorFunction;
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase};
use serde::Deserialize;

/// Global defaults consulted by the conventions and the codec.
///
/// Deserializable from any serde source; omitted fields take their defaults.
///
/// ```ignore
/// let options: MapperOptions = serde_json::from_str(r#"{ "store_empties": true }"#)?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    pub discriminator_key: String,
    pub discriminator: DiscriminatorFunction,
    pub collection_naming: NamingStrategy,
    pub field_naming: NamingStrategy,
    pub store_nulls: bool,
    pub store_empties: bool,
    /// Leave `immutable` properties out of stored documents.
    pub ignore_finals: bool,
    /// Widen discriminator filters to every declared subtype.
    pub enable_polymorphic_queries: bool,
    pub reference_fetch: ReferenceFetch,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            discriminator_key: "_t".to_owned(),
            discriminator: DiscriminatorFunction::default(),
            collection_naming: NamingStrategy::default(),
            field_naming: NamingStrategy::default(),
            store_nulls: false,
            store_empties: false,
            ignore_finals: false,
            enable_polymorphic_queries: false,
            reference_fetch: ReferenceFetch::default(),
        }
    }
}

impl MapperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = key.into();
        self
    }

    pub fn discriminator(mut self, discriminator: DiscriminatorFunction) -> Self {
        self.discriminator = discriminator;
        self
    }

    pub fn collection_naming(mut self, strategy: NamingStrategy) -> Self {
        self.collection_naming = strategy;
        self
    }

    pub fn field_naming(mut self, strategy: NamingStrategy) -> Self {
        self.field_naming = strategy;
        self
    }

    pub fn store_nulls(mut self, store_nulls: bool) -> Self {
        self.store_nulls = store_nulls;
        self
    }

    pub fn store_empties(mut self, store_empties: bool) -> Self {
        self.store_empties = store_empties;
        self
    }

    pub fn ignore_finals(mut self, ignore_finals: bool) -> Self {
        self.ignore_finals = ignore_finals;
        self
    }

    pub fn enable_polymorphic_queries(mut self, enable: bool) -> Self {
        self.enable_polymorphic_queries = enable;
        self
    }

    pub fn reference_fetch(mut self, reference_fetch: ReferenceFetch) -> Self {
        self.reference_fetch = reference_fetch;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    #[default]
    Identity,
    LowerCase,
    SnakeCase,
    CamelCase,
    KebabCase,
}

impl NamingStrategy {
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Identity => name.to_owned(),
            Self::LowerCase => name.to_lowercase(),
            Self::SnakeCase => name.to_snake_case(),
            Self::CamelCase => name.to_lower_camel_case(),
            Self::KebabCase => name.to_kebab_case(),
        }
    }
}

/// How non-lazy references are populated when a query loads entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFetch {
    /// Rewrite the find into an aggregation with one `$lookup` per reference.
    #[default]
    Aggregation,
    /// Run the find, then one `_id $in` find per referenced collection.
    SecondaryQuery,
}
