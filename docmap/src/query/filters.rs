//! Typed query predicates and their compilation to the query language.
//!
//! ```ignore
//! let query = datastore
//!     .find::<Hotel>()?
//!     .filter(Filters::gte("stars", 4))
//!     .filter(Filters::or(vec![
//!         Filters::eq("address.city", "Lisbon"),
//!         Filters::eq("address.city", "Porto"),
//!     ]));
//! ```

use crate::{
    codec::writer::DocumentWriter,
    error::{Error, Result},
    mapping::{EntityModel, Mapper, TypeKey, TypeShape, path::{ResolvedPath, translate_path}},
    value::Value,
};
use mongodb::bson::{Bson, Document, Regex, doc};
use std::{fmt, sync::Arc};

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(Value),
    Filters(Vec<Filter>),
    Text {
        search: String,
        language: Option<String>,
        case_sensitive: Option<bool>,
        diacritic_sensitive: Option<bool>,
    },
    Regex {
        pattern: String,
        options: String,
    },
    Where(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    operator: &'static str,
    field: Option<String>,
    operand: Operand,
    negated: bool,
    validating: bool,
    entity: Option<TypeKey>,
}

/// Operators whose operand has the shape of the field itself.
fn compares_values(operator: &str) -> bool {
    matches!(
        operator,
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" | "$in" | "$nin" | "$all"
    )
}

fn operator_token(token: &str) -> Option<&'static str> {
    Some(match token {
        "=" | "==" | "eq" | "$eq" => "$eq",
        "!=" | "<>" | "ne" | "$ne" => "$ne",
        ">" | "gt" | "$gt" => "$gt",
        ">=" | "gte" | "$gte" => "$gte",
        "<" | "lt" | "$lt" => "$lt",
        "<=" | "lte" | "$lte" => "$lte",
        "in" | "$in" => "$in",
        "nin" | "$nin" => "$nin",
        "all" | "$all" => "$all",
        "exists" | "$exists" => "$exists",
        "size" | "$size" => "$size",
        "type" | "$type" => "$type",
        "mod" | "$mod" => "$mod",
        "elem" | "elemMatch" | "$elemMatch" => "$elemMatch",
        _ => return None,
    })
}

impl Filter {
    fn new(operator: &'static str, field: Option<String>, operand: Operand) -> Self {
        Self {
            operator,
            field,
            operand,
            negated: false,
            validating: true,
            entity: None,
        }
    }

    fn on(operator: &'static str, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(operator, Some(field.into()), Operand::Value(value.into()))
    }

    /// Parses a textual condition such as `"age >"` or `"name"` (equality).
    pub fn parse(condition: &str, value: impl Into<Value>) -> Result<Self> {
        let malformed = || Error::MalformedFilter(condition.to_owned());
        let tokens: Vec<&str> = condition.split_whitespace().collect();

        let (field, operator) = match tokens.as_slice() {
            [field] => (*field, "$eq"),
            [field, token] => (*field, operator_token(token).ok_or_else(malformed)?),
            _ => return Err(malformed()),
        };

        Ok(Self::on(operator, field, value))
    }

    pub fn operator(&self) -> &'static str {
        self.operator
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_validating(&self) -> bool {
        self.validating
    }

    pub fn entity(&self) -> Option<TypeKey> {
        self.entity
    }

    /// Wraps the condition in `$not`.
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Language of a text search.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        if let Operand::Text { language: slot, .. } = &mut self.operand {
            *slot = Some(language.into());
        }
        self
    }

    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        if let Operand::Text { case_sensitive, .. } = &mut self.operand {
            *case_sensitive = Some(enabled);
        }
        self
    }

    pub fn diacritic_sensitive(mut self, enabled: bool) -> Self {
        if let Operand::Text {
            diacritic_sensitive,
            ..
        } = &mut self.operand
        {
            *diacritic_sensitive = Some(enabled);
        }
        self
    }

    /// Records the target type and validation mode in force when the filter
    /// joined a query.
    pub(crate) fn stamp(&mut self, entity: TypeKey, validating: bool) {
        self.entity = Some(entity);
        self.validating = validating;

        if let Operand::Filters(nested) = &mut self.operand {
            // `$elemMatch` operands are relative to the element, which is
            // typed from the field at compile time.
            if self.operator != "$elemMatch" {
                for filter in nested {
                    filter.stamp(entity, validating);
                }
            }
        }
    }

    pub(crate) fn encode(&self, mapper: &Mapper) -> Result<Document> {
        let model = match self.entity {
            Some(key) => Some(mapper.model(key)?),
            None => None,
        };
        self.encode_in(mapper, model.as_ref())
    }

    fn encode_in(&self, mapper: &Mapper, model: Option<&Arc<EntityModel>>) -> Result<Document> {
        let Some(field) = &self.field else {
            return self.encode_unnamed(mapper, model);
        };

        let path = match model {
            Some(model) => translate_path(mapper, model, field, self.validating)?,
            None => ResolvedPath {
                mapped: field.clone(),
                property: None,
                shape: None,
            },
        };

        let operand = self.encode_operand(mapper, &path)?;
        let condition = if self.negated {
            doc! { "$not": { self.operator: operand } }
        } else {
            doc! { self.operator: operand }
        };

        Ok(doc! { path.mapped: condition })
    }

    fn encode_unnamed(&self, mapper: &Mapper, model: Option<&Arc<EntityModel>>) -> Result<Document> {
        let operand = match &self.operand {
            Operand::Filters(filters) => Bson::Array(
                filters
                    .iter()
                    .map(|filter| filter.encode_in(mapper, model).map(Bson::Document))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Operand::Text {
                search,
                language,
                case_sensitive,
                diacritic_sensitive,
            } => {
                let mut text = doc! { "$search": search.as_str() };
                if let Some(language) = language {
                    text.insert("$language", language.as_str());
                }
                if let Some(case_sensitive) = case_sensitive {
                    text.insert("$caseSensitive", *case_sensitive);
                }
                if let Some(diacritic_sensitive) = diacritic_sensitive {
                    text.insert("$diacriticSensitive", *diacritic_sensitive);
                }
                Bson::Document(text)
            }
            Operand::Where(code) => Bson::String(code.clone()),
            Operand::Value(value) => mapper.encode_operand(None, None, value)?,
            Operand::Regex { .. } => {
                return Err(Error::UnsupportedShape(format!(
                    "`{}` needs a field",
                    self.operator
                )));
            }
        };

        if self.negated {
            Ok(doc! { "$nor": [{ self.operator: operand }] })
        } else {
            Ok(doc! { self.operator: operand })
        }
    }

    fn encode_operand(&self, mapper: &Mapper, path: &ResolvedPath) -> Result<Bson> {
        match &self.operand {
            Operand::Value(value) if compares_values(self.operator) => {
                let reference = path.property.as_ref().and_then(|property| property.reference().copied());
                mapper.encode_operand(path.shape.as_ref(), reference, value)
            }
            Operand::Value(value) => mapper.encode_operand(None, None, value),
            Operand::Regex { pattern, options } => Ok(Bson::RegularExpression(Regex {
                pattern: pattern.clone(),
                options: options.clone(),
            })),
            Operand::Filters(filters) => {
                let element = match path.shape.as_ref().map(TypeShape::innermost) {
                    Some(TypeShape::Entity(key)) => Some(mapper.model(*key)?),
                    _ => None,
                };

                let mut writer = DocumentWriter::default();
                for filter in filters {
                    let mut filter = filter.clone();
                    filter.validating = self.validating;
                    writer.merge(filter.encode_in(mapper, element.as_ref())?);
                }
                Ok(Bson::Document(writer.into_document()))
            }
            Operand::Where(code) => Ok(Bson::String(code.clone())),
            Operand::Text { .. } => Err(Error::UnsupportedShape(
                "text search applies to the whole document".to_owned(),
            )),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("$not ")?;
        }
        match &self.field {
            Some(field) => write!(f, "{field} {} {:?}", self.operator, self.operand),
            None => write!(f, "{} {:?}", self.operator, self.operand),
        }
    }
}

/// Constructors for [`Filter`].
#[derive(Debug)]
pub struct Filters;

impl Filters {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$eq", field, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$ne", field, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$gt", field, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$gte", field, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$lt", field, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::on("$lte", field, value)
    }

    pub fn in_<I, V>(field: impl Into<String>, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::on("$in", field, values.into_iter().map(Into::into).collect::<Vec<Value>>())
    }

    pub fn nin<I, V>(field: impl Into<String>, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::on("$nin", field, values.into_iter().map(Into::into).collect::<Vec<Value>>())
    }

    pub fn all<I, V>(field: impl Into<String>, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::on("$all", field, values.into_iter().map(Into::into).collect::<Vec<Value>>())
    }

    pub fn exists(field: impl Into<String>) -> Filter {
        Filter::on("$exists", field, true)
    }

    pub fn size(field: impl Into<String>, size: i32) -> Filter {
        Filter::on("$size", field, size)
    }

    /// `kind` is a BSON type alias such as `"string"` or a type number.
    pub fn type_(field: impl Into<String>, kind: impl Into<Value>) -> Filter {
        Filter::on("$type", field, kind)
    }

    pub fn mod_(field: impl Into<String>, divisor: i64, remainder: i64) -> Filter {
        Filter::on(
            "$mod",
            field,
            vec![Value::Int64(divisor), Value::Int64(remainder)],
        )
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Filter {
        Self::regex_with_options(field, pattern, "")
    }

    pub fn regex_with_options(
        field: impl Into<String>,
        pattern: impl Into<String>,
        options: impl Into<String>,
    ) -> Filter {
        let mut options: Vec<char> = options.into().chars().collect();
        options.sort_unstable();

        Filter::new(
            "$regex",
            Some(field.into()),
            Operand::Regex {
                pattern: pattern.into(),
                options: options.into_iter().collect(),
            },
        )
    }

    /// Matches arrays with at least one element satisfying every filter.
    pub fn elem_match(field: impl Into<String>, filters: Vec<Filter>) -> Filter {
        Filter::new("$elemMatch", Some(field.into()), Operand::Filters(filters))
    }

    pub fn and(filters: Vec<Filter>) -> Filter {
        Filter::new("$and", None, Operand::Filters(filters))
    }

    pub fn or(filters: Vec<Filter>) -> Filter {
        Filter::new("$or", None, Operand::Filters(filters))
    }

    pub fn nor(filters: Vec<Filter>) -> Filter {
        Filter::new("$nor", None, Operand::Filters(filters))
    }

    pub fn text(search: impl Into<String>) -> Filter {
        Filter::new(
            "$text",
            None,
            Operand::Text {
                search: search.into(),
                language: None,
                case_sensitive: None,
                diacritic_sensitive: None,
            },
        )
    }

    pub fn where_(code: impl Into<String>) -> Filter {
        Filter::new("$where", None, Operand::Where(code.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(filter: &Filter) -> Document {
        filter.encode(&Mapper::new()).unwrap()
    }

    #[test]
    fn textual_conditions() {
        assert_eq!(Filter::parse("age >", 30).unwrap(), Filters::gt("age", 30));
        assert_eq!(Filter::parse("name", "x").unwrap(), Filters::eq("name", "x"));
        assert_eq!(Filter::parse("  age   <>  ", 3).unwrap(), Filters::ne("age", 3));
        assert_eq!(Filter::parse("tags $all", vec![Value::from("a")]).unwrap().operator(), "$all");

        for condition in ["", "age > 30", "age ~"] {
            assert!(matches!(
                Filter::parse(condition, 1),
                Err(Error::MalformedFilter(expression)) if expression == condition
            ));
        }
    }

    #[test]
    fn negation_and_logical_operators() {
        assert_eq!(
            compile(&Filters::gt("age", 30).not()),
            doc! { "age": { "$not": { "$gt": 30 } } }
        );
        assert_eq!(
            compile(&Filters::or(vec![Filters::eq("a", 1), Filters::exists("b")])),
            doc! { "$or": [{ "a": { "$eq": 1 } }, { "b": { "$exists": true } }] }
        );
    }

    #[test]
    fn text_search_with_language() {
        assert_eq!(
            compile(&Filters::text("coffee").language("pt")),
            doc! { "$text": { "$search": "coffee", "$language": "pt" } }
        );
    }

    #[test]
    fn regex_options_are_normalized() {
        assert_eq!(
            compile(&Filters::regex_with_options("name", "^A", "xi")),
            doc! { "name": { "$regex": Regex { pattern: "^A".into(), options: "ix".into() } } }
        );
    }
}
