mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use appraise::adapters::sqlite::{
    SqliteErpRepository, SqliteInvitationRepository, SqliteResultRepository,
    SqliteSessionRepository,
};
use appraise::adapters::{FileArchiveStore, StaticCatalog};
use appraise::domain::models::{ArchiveConfig, InvitePolicy, MaintenanceConfig};
use appraise::services::{Archiver, InvitationService, MaintenanceDaemon, SessionService};

use helpers::database::{setup_test_db, teardown_test_db};
use helpers::fixtures::big5_test;

#[tokio::test]
async fn one_cycle_sweeps_sessions_archives_results_and_expires_invitations() {
    let pool = setup_test_db().await;
    let dir = TempDir::new().unwrap();

    let sessions = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let results = Arc::new(SqliteResultRepository::new(pool.clone()));
    let erp = Arc::new(SqliteErpRepository::new(pool.clone()));
    let invitations_repo = Arc::new(SqliteInvitationRepository::new(pool.clone()));
    let store = Arc::new(FileArchiveStore::new(dir.path()));
    let catalog = Arc::new(StaticCatalog::new());
    catalog.insert_test(big5_test()).await;

    let session_service = Arc::new(SessionService::new(
        sessions,
        results.clone(),
        catalog.clone(),
        Duration::hours(2),
    ));
    let archiver = Arc::new(Archiver::new(
        results.clone(),
        results,
        store.clone(),
        catalog.clone(),
        catalog,
        ArchiveConfig::default(),
    ));
    let invitation_service = Arc::new(InvitationService::new(
        invitations_repo,
        erp.clone(),
        erp,
        InvitePolicy::allow_all(),
        Duration::days(14),
    ));

    let daemon = MaintenanceDaemon::new(
        session_service.clone(),
        archiver,
        invitation_service,
        MaintenanceConfig::default(),
    );

    // One overdue session, one completed (pending archival) session.
    let overdue = session_service.start("big5", Uuid::new_v4()).await.unwrap();
    sqlx::query("UPDATE test_sessions SET expires_at = ? WHERE id = ?")
        .bind((Utc::now() - Duration::minutes(5)).to_rfc3339())
        .bind(overdue.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let done = session_service.start("big5", Uuid::new_v4()).await.unwrap();
    for i in 1..=5 {
        session_service
            .record_answer(done.id, &format!("q{i}"), 3)
            .await
            .unwrap();
    }
    let result = session_service.complete(done.id, false).await.unwrap();

    let report = daemon.run_cycle().await.unwrap();
    assert_eq!(report.expired_sessions, 1);
    assert_eq!(report.archive.archived, 1);
    assert_eq!(report.expired_invitations, 0);

    use appraise::domain::ports::ArchiveStore;
    let index = store.load_index(result.user_id).await.unwrap();
    assert_eq!(index.len(), 1);

    // Every sweep is idempotent: the second cycle finds nothing to do.
    let report = daemon.run_cycle().await.unwrap();
    assert_eq!(report.expired_sessions, 0);
    assert_eq!(report.archive.processed, 0);

    teardown_test_db(pool).await;
}
