#[cfg(test)]
mod tests {
    use std::future::{ready, Ready};
    use std::sync::{Arc, Mutex};

    use snapshare_db::repositories::installation;
    use snapshare_db::{schema, DbClient, NewInstallation, Platform};

    use crate::compensation::{CompensationErrorSink, CompensationList, SagaTransaction};
    use crate::error::InstallationError;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<String>>,
    }

    impl CompensationErrorSink for RecordingSink {
        fn report(&self, label: &str, _error: &InstallationError) {
            self.reports.lock().unwrap().push(label.to_string());
        }
    }

    async fn test_db() -> (tempfile::TempDir, DbClient) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("compensation.db").display()
        );
        let db = DbClient::from_url(&url).await.unwrap();
        schema::init_schema(&db).await.unwrap();
        (dir, db)
    }

    fn recording(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl FnOnce() -> Ready<Result<(), InstallationError>> + Send + 'static {
        let log = log.clone();
        move || {
            log.lock().unwrap().push(name);
            ready(Ok(()))
        }
    }

    fn new_installation(token: &str) -> NewInstallation {
        NewInstallation {
            user_id: None,
            platform: Platform::Android,
            device_token: token.to_string(),
            endpoint_id: Some(format!("endpoint/{}", token)),
            app_version: None,
            timezone: None,
            locale: None,
        }
    }

    #[tokio::test]
    async fn test_list_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::default();
        let mut list = CompensationList::new();
        list.push("first", recording(&log, "first"));
        list.push("second", recording(&log, "second"));
        list.push("third", recording(&log, "third"));

        assert_eq!(list.labels(), vec!["first", "second", "third"]);
        let failed = list.run(&sink).await;

        assert_eq!(failed, 0);
        assert!(list.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_do_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::default();
        let mut list = CompensationList::new();
        list.push("failing", || async {
            Err(InstallationError::InvalidRequest("boom".to_string()))
        });
        list.push("after", recording(&log, "after"));

        let failed = list.run(&sink).await;

        assert_eq!(failed, 1);
        assert_eq!(*sink.reports.lock().unwrap(), vec!["failing".to_string()]);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_commit_discards_compensations() {
        let (_dir, db) = test_db().await;
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::default());

        let mut trx = SagaTransaction::begin(&db, sink.clone()).await.unwrap();
        installation::insert(trx.conn(), &new_installation("T1"))
            .await
            .unwrap();
        trx.compensate("undo", recording(&log, "undo"));
        assert_eq!(trx.pending_compensations(), vec!["undo"]);
        trx.commit().await.unwrap();

        assert!(log.lock().unwrap().is_empty());
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(installation::find_by_token(&mut conn, "T1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_rollback_undoes_rows_then_runs_compensations() {
        let (_dir, db) = test_db().await;
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::default());

        let mut trx = SagaTransaction::begin(&db, sink.clone()).await.unwrap();
        installation::insert(trx.conn(), &new_installation("T1"))
            .await
            .unwrap();
        trx.compensate("undo", recording(&log, "undo"));
        trx.rollback().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["undo"]);
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(installation::find_by_token(&mut conn, "T1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_finish_keeps_the_original_error() {
        let (_dir, db) = test_db().await;
        let sink = Arc::new(RecordingSink::default());

        let mut trx = SagaTransaction::begin(&db, sink.clone()).await.unwrap();
        trx.compensate("broken", || async {
            Err(InstallationError::Constraint("compensation failed".to_string()))
        });

        let result: Result<(), InstallationError> = trx
            .finish(Err(InstallationError::InvalidRequest("original".to_string())))
            .await;

        match result {
            Err(InstallationError::InvalidRequest(msg)) => assert_eq!(msg, "original"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(*sink.reports.lock().unwrap(), vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_finish_commits_on_success() {
        let (_dir, db) = test_db().await;
        let sink = Arc::new(RecordingSink::default());

        let mut trx = SagaTransaction::begin(&db, sink).await.unwrap();
        let result = installation::insert(trx.conn(), &new_installation("T9"))
            .await
            .map_err(InstallationError::from);
        let inserted = trx.finish(result).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let found = installation::find_by_id(&mut conn, inserted.id)
            .await
            .unwrap();
        assert_eq!(found.map(|i| i.device_token), Some("T9".to_string()));
    }
}
