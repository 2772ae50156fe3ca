//! Collaborators shared by every part of the saga

use std::sync::Arc;

use snapshare_db::DbClient;
use snapshare_push::PushProvider;

use crate::compensation::{CompensationErrorSink, SagaTransaction};
use crate::error::InstallationError;
use crate::topics::TopicMap;

/// Everything a saga step or compensation needs to reach the outside world
///
/// Cloning is cheap. Compensations capture a clone because they outlive the
/// transaction that registered them.
#[derive(Clone)]
pub struct SagaContext {
    pub(crate) db: DbClient,
    pub(crate) provider: Arc<dyn PushProvider>,
    pub(crate) topics: Arc<TopicMap>,
    pub(crate) sink: Arc<dyn CompensationErrorSink>,
}

impl SagaContext {
    pub fn new(
        db: DbClient,
        provider: Arc<dyn PushProvider>,
        topics: TopicMap,
        sink: Arc<dyn CompensationErrorSink>,
    ) -> Self {
        Self {
            db,
            provider,
            topics: Arc::new(topics),
            sink,
        }
    }

    /// Open a saga transaction reporting to this context's error sink.
    pub async fn begin(&self) -> Result<SagaTransaction, InstallationError> {
        SagaTransaction::begin(&self.db, self.sink.clone()).await
    }

    pub fn db(&self) -> &DbClient {
        &self.db
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }
}
