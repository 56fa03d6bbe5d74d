use std::fmt;

use crate::batch::deferred::Deferred;
use crate::entity::EntityHandle;
use crate::error::{RestError, RestResult};

/// Result of an index lookup; inside a batch it is filled on execution
pub struct IndexHits<T> {
    hits: Deferred<Vec<T>>,
}

impl<T> Clone for IndexHits<T> {
    fn clone(&self) -> Self {
        Self {
            hits: self.hits.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for IndexHits<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndexHits").field(&self.hits).finish()
    }
}

impl<T: EntityHandle> IndexHits<T> {
    pub(crate) fn new(hits: Deferred<Vec<T>>) -> Self {
        Self { hits }
    }

    pub fn is_ready(&self) -> bool {
        self.hits.is_ready()
    }

    pub fn to_vec(&self) -> RestResult<Vec<T>> {
        self.hits.get()
    }

    pub fn len(&self) -> RestResult<usize> {
        Ok(self.to_vec()?.len())
    }

    pub fn is_empty(&self) -> RestResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The only hit, `None` for no hits; more than one is an error
    pub fn single(&self) -> RestResult<Option<T>> {
        let mut hits = self.to_vec()?;
        match hits.len() {
            0 => Ok(None),
            1 => Ok(hits.pop()),
            n => Err(RestError::ProtocolMismatch(format!(
                "expected at most one index hit, got {}",
                n
            ))),
        }
    }
}
