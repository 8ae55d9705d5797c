use crate::{
    Mapped,
    error::Result,
    mapping::{EntityModel, Mapper},
    store::DocumentStream,
    value::Instance,
};
use futures_util::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use std::{marker::PhantomData, sync::Arc, vec};

enum Source<'a> {
    Documents(DocumentStream<'a>),
    /// Already decoded, with references resolved.
    Instances(vec::IntoIter<Instance>),
}

/// Decodes query results one at a time.
pub struct MappedCursor<'a, T> {
    mapper: &'a Mapper,
    model: Arc<EntityModel>,
    source: Source<'a>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Mapped> MappedCursor<'a, T> {
    pub(crate) fn from_documents(
        mapper: &'a Mapper,
        model: Arc<EntityModel>,
        documents: DocumentStream<'a>,
    ) -> Self {
        Self {
            mapper,
            model,
            source: Source::Documents(documents),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_instances(
        mapper: &'a Mapper,
        model: Arc<EntityModel>,
        instances: Vec<Instance>,
    ) -> Self {
        Self {
            mapper,
            model,
            source: Source::Instances(instances.into_iter()),
            _marker: PhantomData,
        }
    }

    pub async fn try_next(&mut self) -> Result<Option<T>> {
        let instance = match &mut self.source {
            Source::Documents(documents) => match documents.try_next().await? {
                Some(document) => self.mapper.decode_instance(&self.model, document)?,
                None => return Ok(None),
            },
            Source::Instances(instances) => match instances.next() {
                Some(instance) => instance,
                None => return Ok(None),
            },
        };

        T::from_instance(instance).map(Some)
    }

    pub async fn to_vec(mut self) -> Result<Vec<T>> {
        let mut entities = Vec::new();

        while let Some(entity) = self.try_next().await? {
            entities.push(entity);
        }

        Ok(entities)
    }

    pub fn into_stream(self) -> BoxStream<'a, Result<T>> {
        stream::try_unfold(self, |mut cursor| async move {
            Ok(cursor.try_next().await?.map(|entity| (entity, cursor)))
        })
        .boxed()
    }
}
