//! Translation of dotted field paths from Rust names to wire names.

use super::{EntityModel, Mapper, PropertyModel, TypeShape};
use crate::error::{Error, Result};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ResolvedPath {
    pub mapped: String,
    /// Last property the path walked through.
    pub property: Option<PropertyModel>,
    /// Declared shape of the value the path addresses, when known.
    pub shape: Option<TypeShape>,
}

enum Position {
    Model(Arc<EntityModel>),
    Shape(TypeShape),
    Unknown,
}

fn is_positional(segment: &str) -> bool {
    segment.starts_with('$') || segment.bytes().all(|byte| byte.is_ascii_digit())
}

fn find_property(
    mapper: &Mapper,
    model: &Arc<EntityModel>,
    name: &str,
) -> Result<Option<PropertyModel>> {
    if let Some(property) = model.property(name) {
        return Ok(Some(property.clone()));
    }

    // Fields declared only on a subtype are still addressable through the
    // parent type.
    for subtype in mapper.hierarchy(model.type_key())?.iter().skip(1) {
        if let Some(property) = subtype.property(name) {
            return Ok(Some(property.clone()));
        }
    }

    Ok(None)
}

/// Position reached after stepping into a value of `shape`.
fn enter(mapper: &Mapper, shape: &TypeShape) -> Result<Position> {
    Ok(match shape {
        TypeShape::Entity(key) => Position::Model(mapper.model(*key)?),
        TypeShape::Sequence { .. } | TypeShape::Map { .. } => Position::Shape(shape.clone()),
        TypeShape::Scalar(_) | TypeShape::Reference(_) => Position::Unknown,
    })
}

pub(crate) fn translate_path(
    mapper: &Mapper,
    model: &Arc<EntityModel>,
    path: &str,
    validate: bool,
) -> Result<ResolvedPath> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut mapped = Vec::with_capacity(segments.len());
    let mut property = None;
    let mut shape = None;
    let mut position = Position::Model(Arc::clone(model));

    for (index, segment) in segments.iter().copied().enumerate() {
        position = match position {
            Position::Shape(TypeShape::Sequence { element, .. }) => {
                if is_positional(segment) {
                    mapped.push(segment.to_owned());
                    shape = Some((*element).clone());
                    enter(mapper, &element)?
                } else {
                    // `addresses.city` reaches into every element.
                    match enter(mapper, &element)? {
                        Position::Model(inner) => {
                            resolve_in_model(
                                mapper,
                                model,
                                &inner,
                                &segments[index..],
                                validate,
                                &mut mapped,
                                &mut property,
                                &mut shape,
                            )?;
                            break;
                        }
                        _ => {
                            return unresolved(model, path, validate, &segments[index..], mapped);
                        }
                    }
                }
            }
            Position::Shape(TypeShape::Map { value, .. }) => {
                mapped.push(segment.to_owned());
                shape = Some((*value).clone());
                enter(mapper, &value)?
            }
            Position::Model(current) => {
                if is_positional(segment) {
                    mapped.push(segment.to_owned());
                    Position::Model(current)
                } else if let Some(found) = find_property(mapper, &current, segment)? {
                    mapped.push(found.mapped_name().to_owned());
                    shape = Some(found.shape().clone());
                    let next = enter(mapper, found.shape())?;
                    property = Some(found);
                    next
                } else {
                    return unresolved(model, path, validate, &segments[index..], mapped);
                }
            }
            Position::Shape(_) | Position::Unknown => {
                if is_positional(segment) {
                    mapped.push(segment.to_owned());
                    shape = None;
                    Position::Unknown
                } else {
                    return unresolved(model, path, validate, &segments[index..], mapped);
                }
            }
        };
    }

    Ok(ResolvedPath {
        mapped: mapped.join("."),
        property,
        shape,
    })
}

#[allow(clippy::too_many_arguments)]
fn resolve_in_model(
    mapper: &Mapper,
    root: &Arc<EntityModel>,
    inner: &Arc<EntityModel>,
    rest: &[&str],
    validate: bool,
    mapped: &mut Vec<String>,
    property: &mut Option<PropertyModel>,
    shape: &mut Option<TypeShape>,
) -> Result<()> {
    let nested = translate_path(mapper, inner, &rest.join("."), validate).map_err(|err| {
        match err {
            Error::Validation { .. } => Error::Validation {
                type_name: root.type_name().to_owned(),
                path: format!("{}.{}", mapped.join("."), rest.join(".")),
            },
            other => other,
        }
    })?;

    mapped.push(nested.mapped);
    if nested.property.is_some() {
        *property = nested.property;
    }
    *shape = nested.shape;

    Ok(())
}

fn unresolved(
    model: &EntityModel,
    path: &str,
    validate: bool,
    rest: &[&str],
    mut mapped: Vec<String>,
) -> Result<ResolvedPath> {
    if validate {
        return Err(Error::Validation {
            type_name: model.type_name().to_owned(),
            path: path.to_owned(),
        });
    }

    mapped.extend(rest.iter().map(|segment| (*segment).to_owned()));

    Ok(ResolvedPath {
        mapped: mapped.join("."),
        property: None,
        shape: None,
    })
}
