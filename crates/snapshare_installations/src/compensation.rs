//! Rollback-time compensation for provider side effects
//!
//! The push provider does not take part in database transactions. Every
//! provider call that would leave orphaned state behind a rollback registers a
//! compensating action on the [`SagaTransaction`] it ran under. `commit`
//! discards the actions; `rollback` undoes the database work first and then
//! runs them in registration order. A failing action is handed to the
//! [`CompensationErrorSink`] and never replaces the error that caused the
//! rollback.

use std::future::Future;
use std::sync::Arc;

use snapshare_common::{log_error, BoxFuture};
use snapshare_db::{AnyConnection, DbClient, DbError, DbTransaction};
use tracing::{debug, info, warn};

use crate::error::InstallationError;

/// A queued compensating action
pub type CompensationAction = Box<dyn FnOnce() -> BoxFuture<'static, (), InstallationError> + Send>;

/// Receives compensation failures
pub trait CompensationErrorSink: Send + Sync {
    fn report(&self, label: &str, error: &InstallationError);
}

/// Reports compensation failures through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl CompensationErrorSink for TracingErrorSink {
    fn report(&self, label: &str, error: &InstallationError) {
        log_error(error, &format!("Compensation '{}' failed", label));
    }
}

struct Compensation {
    label: String,
    action: CompensationAction,
}

/// Ordered compensating actions of one transaction
#[derive(Default)]
pub struct CompensationList {
    entries: Vec<Compensation>,
}

impl CompensationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action behind the ones already registered.
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), InstallationError>> + Send + 'static,
    {
        let label = label.into();
        debug!("Registering compensation '{}'", label);
        self.entries.push(Compensation {
            label,
            action: Box::new(move || Box::pin(action())),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels of the queued actions, in registration order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.label.as_str()).collect()
    }

    /// Forget every queued action, returning how many there were.
    pub fn discard(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }

    /// Run every queued action in order.
    ///
    /// Failures go to `sink`; the list is empty afterwards. Returns the number
    /// of actions that failed.
    pub async fn run(&mut self, sink: &dyn CompensationErrorSink) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let mut failed = 0;

        for Compensation { label, action } in entries {
            debug!("Running compensation '{}'", label);
            if let Err(e) = action().await {
                failed += 1;
                sink.report(&label, &e);
            }
        }

        failed
    }
}

impl Drop for CompensationList {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                "Dropping {} pending compensation(s) without running them: {:?}",
                self.entries.len(),
                self.labels()
            );
        }
    }
}

/// A database transaction together with its compensating actions
///
/// Always end it with [`commit`](Self::commit), [`rollback`](Self::rollback) or
/// [`finish`](Self::finish). A transaction dropped while compensations are
/// pending rolls back the database but cannot reach the provider; the pending
/// actions are only logged.
pub struct SagaTransaction {
    tx: DbTransaction,
    compensations: CompensationList,
    sink: Arc<dyn CompensationErrorSink>,
}

impl SagaTransaction {
    /// Wrap an already open database transaction.
    pub fn new(tx: DbTransaction, sink: Arc<dyn CompensationErrorSink>) -> Self {
        Self {
            tx,
            compensations: CompensationList::new(),
            sink,
        }
    }

    /// Open a new transaction on `db`.
    pub async fn begin(
        db: &DbClient,
        sink: Arc<dyn CompensationErrorSink>,
    ) -> Result<Self, InstallationError> {
        let tx = db.begin().await?;
        Ok(Self::new(tx, sink))
    }

    /// The connection every statement of this transaction runs on.
    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut *self.tx
    }

    /// Register a compensating action for a provider side effect.
    pub fn compensate<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), InstallationError>> + Send + 'static,
    {
        self.compensations.push(label, action);
    }

    pub fn pending_compensations(&self) -> Vec<&str> {
        self.compensations.labels()
    }

    /// Commit the database work and discard the compensations.
    ///
    /// If the commit itself fails nothing was persisted, so the compensations
    /// run before the error is returned.
    pub async fn commit(self) -> Result<(), InstallationError> {
        let Self {
            tx,
            mut compensations,
            sink,
        } = self;

        match tx.commit().await {
            Ok(()) => {
                let discarded = compensations.discard();
                debug!("Transaction committed, {} compensation(s) discarded", discarded);
                Ok(())
            }
            Err(e) => {
                compensations.run(sink.as_ref()).await;
                Err(DbError::TransactionError(e.to_string()).into())
            }
        }
    }

    /// Roll back the database work, then run the compensations in order.
    ///
    /// The compensations run even when the database rollback fails.
    pub async fn rollback(self) -> Result<(), InstallationError> {
        let Self {
            tx,
            mut compensations,
            sink,
        } = self;

        let rolled_back = tx.rollback().await;
        if !compensations.is_empty() {
            info!("Rolling back, running {} compensation(s)", compensations.len());
        }
        let failed = compensations.run(sink.as_ref()).await;
        if failed > 0 {
            warn!("{} compensation(s) failed during rollback", failed);
        }

        rolled_back.map_err(|e| DbError::TransactionError(e.to_string()).into())
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// The original error is returned unchanged; a failing rollback is only
    /// logged.
    pub async fn finish<T>(
        self,
        result: Result<T, InstallationError>,
    ) -> Result<T, InstallationError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback().await {
                    log_error(rollback_error, "Rollback after failed saga step");
                }
                Err(e)
            }
        }
    }
}
