//! Repair of a single drifted record.
//!
//! A fixer is bound to a `(base, target)` pair and always makes the target
//! look like the base. Every action is idempotent, so redelivered events are
//! harmless.

use std::sync::Arc;

use migrator_core::{Entity, InconsistencyKind};
use migrator_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::FixError;

/// What a repair did to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    /// The base record was written over the target.
    Upserted,
    /// The record was removed from the target.
    Deleted,
}

/// Repairs the target store from the base store.
pub struct Fixer<T: Entity> {
    base: Arc<dyn Store<T>>,
    target: Arc<dyn Store<T>>,
}

impl<T: Entity> Clone for Fixer<T> {
    fn clone(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
            target: Arc::clone(&self.target),
        }
    }
}

impl<T: Entity> Fixer<T> {
    #[must_use]
    pub fn new(base: Arc<dyn Store<T>>, target: Arc<dyn Store<T>>) -> Self {
        Self { base, target }
    }

    /// Bring record `id` in the target in line with the base.
    ///
    /// - `TargetMissing` / `NotEqual`: copy the base row over the target, or
    ///   delete the target row if the base row is gone by now.
    /// - `BaseMissing`: delete the target row.
    #[instrument(skip(self), fields(base = %self.base.name(), target = %self.target.name()))]
    pub async fn fix(&self, id: i64, kind: InconsistencyKind) -> Result<FixAction, FixError> {
        let action = match kind {
            InconsistencyKind::TargetMissing | InconsistencyKind::NotEqual => {
                let current = self.base.find(id).await.map_err(|source| FixError::Store {
                    op: "read",
                    id,
                    store: self.base.name().to_string(),
                    source,
                })?;

                match current {
                    Some(record) => {
                        self.upsert(&record).await?;
                        FixAction::Upserted
                    }
                    None => {
                        debug!("Base record vanished, deleting from target");
                        self.delete(id).await?;
                        FixAction::Deleted
                    }
                }
            }
            InconsistencyKind::BaseMissing => {
                self.delete(id).await?;
                FixAction::Deleted
            }
        };

        debug!(?action, "Record repaired");
        Ok(action)
    }

    async fn upsert(&self, record: &T) -> Result<(), FixError> {
        self.target
            .upsert(record)
            .await
            .map_err(|source| FixError::Store {
                op: "upsert",
                id: record.id(),
                store: self.target.name().to_string(),
                source,
            })
    }

    async fn delete(&self, id: i64) -> Result<(), FixError> {
        self.target
            .delete(id)
            .await
            .map_err(|source| FixError::Store {
                op: "delete",
                id,
                store: self.target.name().to_string(),
                source,
            })
    }
}
