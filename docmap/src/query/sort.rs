use mongodb::bson::{Document, doc};

/// Ordered sort specification.
///
/// ```ignore
/// let options = FindOptions::new().sort(Sort::new().descending("rating").ascending("name"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sort(Document);

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), 1);
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), -1);
        self
    }

    /// Sort by relevance of a text search.
    pub fn text_score(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), doc! { "$meta": "textScore" });
        self
    }
}

impl From<Sort> for Document {
    fn from(sort: Sort) -> Self {
        sort.0
    }
}
