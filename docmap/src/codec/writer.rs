use mongodb::bson::{Bson, Document};

fn is_logical(key: &str) -> bool {
    matches!(key, "$and" | "$or" | "$nor")
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Accumulates query fragments into one document.
///
/// Logical operator arrays accumulate, operator documents on one field merge
/// (`{age: {$gt: 1}}` + `{age: {$lt: 9}}`), anything else is last write wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentWriter {
    document: Document,
}

impl DocumentWriter {
    pub fn new(seed: Option<Document>) -> Self {
        Self {
            document: seed.unwrap_or_default(),
        }
    }

    pub fn merge(&mut self, fragment: Document) {
        for (key, value) in fragment {
            self.merge_entry(key, value);
        }
    }

    fn merge_entry(&mut self, key: String, value: Bson) {
        let value = match (self.document.get_mut(&key), value) {
            (Some(Bson::Array(existing)), Bson::Array(items)) if is_logical(&key) => {
                existing.extend(items);
                return;
            }
            (Some(Bson::Document(existing)), Bson::Document(incoming))
                if is_operator_document(existing) && is_operator_document(&incoming) =>
            {
                for (operator, operand) in incoming {
                    existing.insert(operator, operand);
                }
                return;
            }
            (_, value) => value,
        };

        self.document.insert(key, value);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn merges_ranges_and_accumulates_logical_operators() {
        let mut writer = DocumentWriter::new(Some(doc! { "active": true }));

        writer.merge(doc! { "age": { "$gt": 18 } });
        writer.merge(doc! { "age": { "$lt": 65 } });
        writer.merge(doc! { "$or": [{ "a": 1 }] });
        writer.merge(doc! { "$or": [{ "b": 2 }] });
        writer.merge(doc! { "name": "x" });
        writer.merge(doc! { "name": "y" });

        assert_eq!(
            writer.into_document(),
            doc! {
                "active": true,
                "age": { "$gt": 18, "$lt": 65 },
                "$or": [{ "a": 1 }, { "b": 2 }],
                "name": "y",
            }
        );
    }
}
