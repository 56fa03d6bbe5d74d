//! Shared cells for collection results that may arrive after a batch

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::converter::{ResolvedValue, UpdatableResult};
use crate::entity::EntityHandle;
use crate::error::{RestError, RestResult};

/// A value that is either available now or filled in when its batch
/// is executed. Clones share the same cell.
pub struct Deferred<T> {
    cell: Arc<RwLock<Option<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self { cell: self.cell.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&*self.cell.read()).finish()
    }
}

impl<T: Clone> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Self {
            cell: Arc::new(RwLock::new(Some(value))),
        }
    }

    pub fn pending() -> Self {
        Self {
            cell: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.read().is_some()
    }

    /// The value, or `Unresolved` while the batch has not run
    pub fn get(&self) -> RestResult<T> {
        self.cell
            .read()
            .clone()
            .ok_or_else(|| RestError::Unresolved("batch result not yet available".to_string()))
    }

    pub(crate) fn fill(&self, value: T) {
        *self.cell.write() = Some(value);
    }
}

impl<T: EntityHandle> UpdatableResult for Deferred<Vec<T>> {
    fn update_from(&self, resolved: ResolvedValue) -> RestResult<()> {
        match resolved {
            ResolvedValue::Entities(entities) => {
                self.fill(entities.into_iter().map(T::from_entity).collect());
                Ok(())
            }
            other => Err(RestError::ProtocolMismatch(format!(
                "expected a collection result, got {}",
                other.kind_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_and_pending() {
        let ready = Deferred::ready(vec![1, 2, 3]);
        assert!(ready.is_ready());
        assert_eq!(ready.get().unwrap(), vec![1, 2, 3]);

        let pending: Deferred<Vec<u8>> = Deferred::pending();
        assert!(!pending.is_ready());
        assert!(matches!(pending.get(), Err(RestError::Unresolved(_))));

        let shared = pending.clone();
        pending.fill(vec![9]);
        assert_eq!(shared.get().unwrap(), vec![9]);
    }
}
