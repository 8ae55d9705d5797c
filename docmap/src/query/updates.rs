//! Update operations.
//!
//! ```ignore
//! datastore
//!     .find::<Hotel>()?
//!     .filter(Filters::eq("name", "Grand"))
//!     .update(vec![Updates::inc("stars", 1), Updates::push("tags", "renovated")])
//!     .execute(UpdateOptions::default())
//!     .await?;
//! ```

use crate::{
    error::{Error, Result},
    mapping::{EntityModel, Mapper, path::translate_path},
    value::Value,
};
use mongodb::bson::{Bson, Document, doc};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
enum Operand {
    /// Encoded with the shape of the field.
    Value(Value),
    /// Several elements for `$each` or `$pullAll`.
    Values(Vec<Value>),
    /// Written as-is.
    Raw(Bson),
    /// Another path on the same type.
    Path(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOperator {
    operator: &'static str,
    field: String,
    operand: Operand,
}

impl UpdateOperator {
    fn new(operator: &'static str, field: impl Into<String>, operand: Operand) -> Self {
        Self {
            operator,
            field: field.into(),
            operand,
        }
    }

    pub fn operator(&self) -> &'static str {
        self.operator
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn encode(
        &self,
        mapper: &Mapper,
        model: &Arc<EntityModel>,
        validate: bool,
    ) -> Result<(String, Bson)> {
        let path = translate_path(mapper, model, &self.field, validate)?;
        let reference = path
            .property
            .as_ref()
            .and_then(|property| property.reference().copied());

        let operand = match &self.operand {
            Operand::Value(value) => mapper.encode_operand(path.shape.as_ref(), reference, value)?,
            Operand::Values(values) => {
                let values = mapper.encode_operand(
                    path.shape.as_ref(),
                    reference,
                    &Value::Sequence(values.clone()),
                )?;

                match self.operator {
                    "$push" | "$addToSet" => Bson::Document(doc! { "$each": values }),
                    _ => values,
                }
            }
            Operand::Raw(bson) => bson.clone(),
            Operand::Path(target) => {
                Bson::String(translate_path(mapper, model, target, validate)?.mapped)
            }
        };

        Ok((path.mapped, operand))
    }
}

/// Constructors for [`UpdateOperator`].
#[derive(Debug)]
pub struct Updates;

impl Updates {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$set", field, Operand::Value(value.into()))
    }

    pub fn set_on_insert(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$setOnInsert", field, Operand::Value(value.into()))
    }

    pub fn unset(field: impl Into<String>) -> UpdateOperator {
        UpdateOperator::new("$unset", field, Operand::Raw(Bson::String(String::new())))
    }

    pub fn inc(field: impl Into<String>, by: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$inc", field, Operand::Value(by.into()))
    }

    pub fn mul(field: impl Into<String>, by: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$mul", field, Operand::Value(by.into()))
    }

    pub fn min(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$min", field, Operand::Value(value.into()))
    }

    pub fn max(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$max", field, Operand::Value(value.into()))
    }

    pub fn rename(field: impl Into<String>, to: impl Into<String>) -> UpdateOperator {
        UpdateOperator::new("$rename", field, Operand::Path(to.into()))
    }

    pub fn current_date(field: impl Into<String>) -> UpdateOperator {
        UpdateOperator::new("$currentDate", field, Operand::Raw(Bson::Boolean(true)))
    }

    pub fn push(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$push", field, Operand::Value(value.into()))
    }

    pub fn push_each<I, V>(field: impl Into<String>, values: I) -> UpdateOperator
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        UpdateOperator::new("$push", field, Operand::Values(values))
    }

    pub fn add_to_set(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$addToSet", field, Operand::Value(value.into()))
    }

    pub fn add_to_set_each<I, V>(field: impl Into<String>, values: I) -> UpdateOperator
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        UpdateOperator::new("$addToSet", field, Operand::Values(values))
    }

    pub fn pull(field: impl Into<String>, value: impl Into<Value>) -> UpdateOperator {
        UpdateOperator::new("$pull", field, Operand::Value(value.into()))
    }

    pub fn pull_all<I, V>(field: impl Into<String>, values: I) -> UpdateOperator
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        UpdateOperator::new("$pullAll", field, Operand::Values(values))
    }

    pub fn pop_first(field: impl Into<String>) -> UpdateOperator {
        UpdateOperator::new("$pop", field, Operand::Raw(Bson::Int32(-1)))
    }

    pub fn pop_last(field: impl Into<String>) -> UpdateOperator {
        UpdateOperator::new("$pop", field, Operand::Raw(Bson::Int32(1)))
    }
}

/// Compiles `operators` into one update document grouped by operator.
pub(crate) fn compile(
    mapper: &Mapper,
    model: &Arc<EntityModel>,
    operators: &[UpdateOperator],
    validate: bool,
) -> Result<Document> {
    if operators.is_empty() {
        return Err(Error::InvalidUpdate(format!(
            "no update operations given for `{}`",
            model.type_name()
        )));
    }

    let mut update = Document::new();

    for operator in operators {
        let (field, operand) = operator.encode(mapper, model, validate)?;

        match update.get_mut(operator.operator) {
            Some(Bson::Document(fields)) => {
                fields.insert(field, operand);
            }
            _ => {
                update.insert(operator.operator, doc! { field: operand });
            }
        }
    }

    Ok(update)
}
