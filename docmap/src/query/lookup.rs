//! Aggregation rewrite used to join eager references into the result.

use super::options::FindOptions;
use crate::{
    error::{Error, Result},
    mapping::{EntityModel, Mapper},
};
use mongodb::bson::{Bson, Document, doc};

fn sort_stage(sort: &Document) -> Result<Document> {
    let mut stage = Document::new();

    for (field, order) in sort {
        let order = match order {
            Bson::Int32(1) | Bson::Int64(1) => Bson::Int32(1),
            Bson::Int32(-1) | Bson::Int64(-1) => Bson::Int32(-1),
            Bson::Document(meta) if meta.contains_key("$meta") => Bson::Document(meta.clone()),
            other => {
                return Err(Error::UnsupportedShape(format!(
                    "unmapped sort option `{other}` on `{field}`"
                )));
            }
        };
        stage.insert(field, order);
    }

    Ok(stage)
}

/// `$match` → one `$lookup` per eager reference → `$project` → `$sort` →
/// `$skip` → `$limit`. Projection and sort fields must already be wire names.
pub(crate) fn pipeline(
    mapper: &Mapper,
    model: &EntityModel,
    query: Document,
    options: &FindOptions,
) -> Result<Vec<Document>> {
    let mut stages = Vec::new();

    if !query.is_empty() {
        stages.push(doc! { "$match": query });
    }

    for property in model.eager_references() {
        let Some(target) = property.shape().referenced_type() else {
            continue;
        };
        let id_only = property.reference().is_some_and(|options| options.id_only);
        let mapped = property.mapped_name();

        let local_field = if id_only {
            mapped.to_owned()
        } else {
            format!("{mapped}.$id")
        };

        stages.push(doc! {
            "$lookup": {
                "from": mapper.collection_name(target)?,
                "localField": local_field,
                "foreignField": "_id",
                "as": mapped,
            }
        });
    }

    if !options.includes.is_empty() || !options.excludes.is_empty() {
        let mut projection = Document::new();
        for field in &options.includes {
            projection.insert(field, 1);
        }
        for field in &options.excludes {
            projection.insert(field, 0);
        }
        stages.push(doc! { "$project": projection });
    }

    if let Some(sort) = &options.sort {
        stages.push(doc! { "$sort": sort_stage(sort)? });
    }

    if let Some(skip) = options.skip {
        stages.push(doc! { "$skip": i64::try_from(skip).unwrap_or(i64::MAX) });
    }

    if let Some(limit) = options.limit {
        stages.push(doc! { "$limit": limit });
    }

    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sort_values_map_to_pipeline_orders() {
        assert_eq!(
            sort_stage(&doc! { "a": 1, "b": -1_i64, "score": { "$meta": "textScore" } }).unwrap(),
            doc! { "a": 1, "b": -1, "score": { "$meta": "textScore" } }
        );

        assert!(matches!(
            sort_stage(&doc! { "a": "up" }),
            Err(Error::UnsupportedShape(message)) if message.contains("unmapped sort option")
        ));
    }
}
