use sqlx::SqlitePool;

use crate::{mailer::Mailer, uploads::UploadStore};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub mailer: Mailer,
    pub uploads: UploadStore,
    pub base_url: String,
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory database, a file-transport mailer and an
    /// upload store inside one temporary directory.
    pub async fn for_tests() -> (tempfile::TempDir, Self) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mail = crate::config::MailConfig::File {
            dir: dir.path().join("outbox"),
            from: "noreply@adrauto.local".to_string(),
        };
        let state = Self {
            db: crate::db::test_pool().await,
            mailer: Mailer::new(&mail, "http://127.0.0.1:8080").expect("test mailer"),
            uploads: UploadStore::new(dir.path().join("uploads")).expect("test upload store"),
            base_url: "http://127.0.0.1:8080".to_string(),
        };
        (dir, state)
    }
}
