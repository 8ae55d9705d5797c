use super::TypeKey;
use std::fmt;

/// The declared static type of a property, which is what the codec
/// dispatches on. Runtime values never influence the choice of codec.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeShape {
    Scalar(ScalarKind),
    Sequence {
        kind: SequenceKind,
        element: Box<TypeShape>,
    },
    Map {
        key: KeyKind,
        value: Box<TypeShape>,
    },
    /// An embedded value. Polymorphism is decided by the target's model.
    Entity(TypeKey),
    Reference(TypeKey),
}

impl TypeShape {
    pub fn sequence(kind: SequenceKind, element: TypeShape) -> Self {
        Self::Sequence {
            kind,
            element: Box::new(element),
        }
    }

    pub fn map(key: KeyKind, value: TypeShape) -> Self {
        Self::Map {
            key,
            value: Box::new(value),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Sequence { .. } | Self::Map { .. })
    }

    /// Target of the reference this shape holds, directly or as a container
    /// element.
    pub fn referenced_type(&self) -> Option<TypeKey> {
        match self {
            Self::Reference(key) => Some(*key),
            Self::Sequence { element, .. } => element.referenced_type(),
            Self::Map { value, .. } => value.referenced_type(),
            Self::Scalar(_) | Self::Entity(_) => None,
        }
    }

    /// Shape reached after stepping through any container layers.
    pub fn innermost(&self) -> &TypeShape {
        match self {
            Self::Sequence { element, .. } => element.innermost(),
            Self::Map { value, .. } => value.innermost(),
            other => other,
        }
    }

    pub(crate) fn collect_types(&self, out: &mut Vec<TypeKey>) {
        match self {
            Self::Entity(key) | Self::Reference(key) => out.push(*key),
            Self::Sequence { element, .. } => element.collect_types(out),
            Self::Map { value, .. } => value.collect_types(out),
            Self::Scalar(_) => {}
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind:?}"),
            Self::Sequence { kind, element } => write!(f, "{kind:?}<{element}>"),
            Self::Map { key, value } => write!(f, "Map<{key:?}, {value}>"),
            Self::Entity(key) => write!(f, "{}", key.simple_name()),
            Self::Reference(key) => write!(f, "Reference<{}>", key.simple_name()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Double,
    String,
    DateTime,
    Binary,
    Uuid,
    ObjectId,
    Document,
    Enum(EnumSpec),
    /// Any wire value, converted without a shape.
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceKind {
    /// Fixed size once built (`Box<[T]>`).
    Array,
    List,
    Set,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyKind {
    String,
    Int32,
    Int64,
    Enum(EnumSpec),
    ObjectId,
    Uuid,
}

/// Constants of a mapped enum, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumSpec {
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.contains(&variant)
    }
}
