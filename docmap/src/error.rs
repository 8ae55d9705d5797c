use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// A type could not be turned into a valid entity model, or a mapped value
    /// could not be written (e.g. a reference to an entity without an id).
    #[error("mapping error on `{type_name}`: {message}")]
    Mapping { type_name: String, message: String },

    #[error("no type reachable from `{expected}` is registered with discriminator `{value}`")]
    Discriminator { expected: String, value: String },

    #[error("cannot decode `{path}`: {message}")]
    Decode { path: String, message: String },

    #[error("'{0}' is not a legal filter condition")]
    MalformedFilter(String),

    #[error("could not resolve path `{path}` against `{type_name}`")]
    Validation { type_name: String, path: String },

    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("`{0}` is a legacy operation and is no longer supported; use the options types instead")]
    LegacyOperation(&'static str),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error(transparent)]
    Store(#[from] mongodb::error::Error),
}

impl Error {
    pub(crate) fn mapping(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_legacy_operation(&self) -> bool {
        matches!(self, Self::LegacyOperation(_))
    }
}
