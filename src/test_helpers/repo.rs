use std::sync::Arc;

use crate::persistence::SqliteStateRepository;

/// An in-memory repository with migrations applied.
pub async fn create_test_repo() -> Arc<SqliteStateRepository> {
    let repo = SqliteStateRepository::new("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");
    repo.run_migrations().await.expect("Failed to run migrations");
    Arc::new(repo)
}
