//! Per-call options. Field names in projections and sorts are Rust property
//! names; they are translated to wire names when the query runs.

use super::sort::Sort;
use mongodb::{
    bson::Document,
    options::{Collation, CursorType, ReadConcern, SelectionCriteria, WriteConcern},
};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub batch_size: Option<u32>,
    pub comment: Option<String>,
    pub hint: Option<Document>,
    pub max_time: Option<Duration>,
    pub collation: Option<Collation>,
    pub cursor_type: Option<CursorType>,
    pub read_concern: Option<ReadConcern>,
    pub selection_criteria: Option<SelectionCriteria>,
    /// Turn on server profiling around the query and restore it afterwards.
    pub log_query: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, N>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.includes.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, N>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.excludes.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn sort(mut self, sort: impl Into<Document>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn hint(mut self, hint: Document) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    pub fn cursor_type(mut self, cursor_type: CursorType) -> Self {
        self.cursor_type = Some(cursor_type);
        self
    }

    pub fn read_concern(mut self, read_concern: ReadConcern) -> Self {
        self.read_concern = Some(read_concern);
        self
    }

    pub fn selection_criteria(mut self, selection_criteria: SelectionCriteria) -> Self {
        self.selection_criteria = Some(selection_criteria);
        self
    }

    pub fn log_query(mut self, log_query: bool) -> Self {
        self.log_query = log_query;
        self
    }

    pub(crate) fn is_tailable(&self) -> bool {
        matches!(
            self.cursor_type,
            Some(CursorType::Tailable | CursorType::TailableAwait)
        )
    }
}

impl From<Sort> for FindOptions {
    fn from(sort: Sort) -> Self {
        Self::new().sort(sort)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AggregationOptions {
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
    pub bypass_document_validation: Option<bool>,
    pub collation: Option<Collation>,
    pub hint: Option<Document>,
    pub comment: Option<String>,
    pub max_time: Option<Duration>,
    pub max_await_time: Option<Duration>,
    pub read_concern: Option<ReadConcern>,
    pub selection_criteria: Option<SelectionCriteria>,
    pub write_concern: Option<WriteConcern>,
}

impl From<&FindOptions> for AggregationOptions {
    fn from(options: &FindOptions) -> Self {
        Self {
            batch_size: options.batch_size,
            collation: options.collation.clone(),
            hint: options.hint.clone(),
            comment: options.comment.clone(),
            max_time: options.max_time,
            read_concern: options.read_concern.clone(),
            selection_criteria: options.selection_criteria.clone(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CountOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub hint: Option<Document>,
    pub max_time: Option<Duration>,
    pub collation: Option<Collation>,
    pub read_concern: Option<ReadConcern>,
    pub selection_criteria: Option<SelectionCriteria>,
}

#[derive(Clone, Debug, Default)]
pub struct DeleteOptions {
    /// Delete every match instead of the first one.
    pub multi: bool,
    pub collation: Option<Collation>,
    pub hint: Option<Document>,
    pub write_concern: Option<WriteConcern>,
}

impl DeleteOptions {
    pub fn multi() -> Self {
        Self {
            multi: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FindAndDeleteOptions {
    pub sort: Option<Document>,
    pub max_time: Option<Duration>,
    pub collation: Option<Collation>,
    pub write_concern: Option<WriteConcern>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Update every match instead of the first one.
    pub multi: bool,
    pub upsert: bool,
    pub collation: Option<Collation>,
    pub write_concern: Option<WriteConcern>,
}

impl UpdateOptions {
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModifyOptions {
    /// Return the document as it is after the update.
    pub return_new: bool,
    pub upsert: bool,
    pub sort: Option<Document>,
    pub max_time: Option<Duration>,
    pub collation: Option<Collation>,
    pub write_concern: Option<WriteConcern>,
}

impl ModifyOptions {
    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = return_new;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}
