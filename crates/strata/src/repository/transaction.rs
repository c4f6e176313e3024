//! Module: repository::transaction
//! Responsibility: transactional write grouping over the injected
//! connection.
//! Does not own: nesting semantics; those belong to the backend.

use super::Repository;
use crate::{
    error::{Error, RepositoryError},
    traits::{Connection, QueryExecutor},
};
use std::rc::Rc;
use tracing::warn;

impl<X: QueryExecutor> Repository<X> {
    fn require_connection(&self) -> Result<&Rc<dyn Connection>, Error> {
        self.connection
            .as_ref()
            .ok_or_else(|| RepositoryError::MissingConnection.into())
    }

    pub fn begin_transaction(&self) -> Result<(), Error> {
        self.require_connection()?.begin_transaction()
    }

    pub fn commit(&self) -> Result<(), Error> {
        self.require_connection()?.commit()
    }

    pub fn roll_back(&self) -> Result<(), Error> {
        self.require_connection()?.roll_back()
    }

    /// Run `work` inside a transaction. Commit on success; roll back
    /// on failure and propagate the original error. A failing roll
    /// back is logged, not surfaced, so the cause stays visible.
    pub fn transaction<T>(
        &mut self,
        work: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.begin_transaction()?;

        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.roll_back() {
                    warn!(%rollback_err, "transaction roll back failed");
                }
                Err(err)
            }
        }
    }
}
