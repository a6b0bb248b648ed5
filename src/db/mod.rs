//! Best-effort chat history persistence.
//!
//! A [`HistoryStore`] probes its backend once at construction. If the probe
//! fails the store stays disconnected for its whole lifetime and every
//! [`HistoryStore::save`] returns `false` without touching the backend.

pub mod models;
pub mod sqlite;
pub mod supabase;

use std::path::PathBuf;

use models::ChatRecord;
use sqlite::SqliteHistory;
use supabase::SupabaseHistory;

/// Where chat history should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryTarget {
    Supabase { url: String, key: String },
    Sqlite(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store is not connected")]
    Disconnected,
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("REST error: {status} - {message}")]
    Rest { status: u16, message: String },
    #[error("history connection lock poisoned")]
    Poisoned,
}

enum Backend {
    Supabase(SupabaseHistory),
    Sqlite(SqliteHistory),
}

/// Connection state suitable for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub endpoint: Option<String>,
    pub error: Option<String>,
}

pub struct HistoryStore {
    backend: Option<Backend>,
    endpoint: Option<String>,
    last_error: Option<String>,
}

impl HistoryStore {
    /// A store that never writes anything.
    pub fn disconnected() -> Self {
        Self {
            backend: None,
            endpoint: None,
            last_error: None,
        }
    }

    /// Opens and probes the target. Never fails; on error the store is disconnected.
    pub async fn connect(target: Option<&HistoryTarget>) -> Self {
        let Some(target) = target else {
            tracing::info!("no history store configured; chat history will not be saved");
            return Self::disconnected();
        };

        let endpoint = Some(match target {
            HistoryTarget::Supabase { url, .. } => shorten(url),
            HistoryTarget::Sqlite(path) => path.display().to_string(),
        });

        match Self::open(target).await {
            Ok(backend) => {
                tracing::info!(endpoint = endpoint.as_deref().unwrap_or_default(), "history store connected");
                Self {
                    backend: Some(backend),
                    endpoint,
                    last_error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "history store connection failed; continuing without persistence");
                Self {
                    backend: None,
                    endpoint,
                    last_error: Some(e.to_string()),
                }
            }
        }
    }

    async fn open(target: &HistoryTarget) -> Result<Backend, HistoryError> {
        match target {
            HistoryTarget::Supabase { url, key } => {
                let remote = SupabaseHistory::new(url, key);
                remote.probe().await?;
                Ok(Backend::Supabase(remote))
            }
            HistoryTarget::Sqlite(path) => {
                let local = SqliteHistory::open(path)?;
                local.probe()?;
                Ok(Backend::Sqlite(local))
            }
        }
    }

    pub fn from_sqlite(local: SqliteHistory) -> Self {
        Self {
            backend: Some(Backend::Sqlite(local)),
            endpoint: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            endpoint: self.endpoint.clone(),
            error: self.last_error.clone(),
        }
    }

    /// Writes one record. Returns whether it was stored; errors are only logged.
    pub async fn save(
        &self,
        identity: &str,
        query: &str,
        response: &str,
        file_name: Option<&str>,
    ) -> bool {
        let record = ChatRecord::new(identity, query, response, file_name);
        match self.insert(&record).await {
            Ok(()) => {
                tracing::info!(user = %identity, "chat saved");
                true
            }
            Err(HistoryError::Disconnected) => {
                tracing::debug!("history store not connected; skipping save");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "error saving chat history");
                false
            }
        }
    }

    async fn insert(&self, record: &ChatRecord) -> Result<(), HistoryError> {
        match &self.backend {
            Some(Backend::Supabase(remote)) => remote.insert(record).await,
            Some(Backend::Sqlite(local)) => local.insert(record),
            None => Err(HistoryError::Disconnected),
        }
    }

    /// Last `limit` records for `identity`, newest first.
    pub async fn recent(&self, identity: &str, limit: usize) -> Result<Vec<ChatRecord>, HistoryError> {
        match &self.backend {
            Some(Backend::Supabase(remote)) => remote.recent(identity, limit).await,
            Some(Backend::Sqlite(local)) => local.recent(identity, limit),
            None => Err(HistoryError::Disconnected),
        }
    }
}

fn shorten(url: &str) -> String {
    if url.chars().count() > 30 {
        format!("{}...", url.chars().take(30).collect::<String>())
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_never_saves() {
        let store = HistoryStore::connect(None).await;
        assert!(!store.is_connected());
        assert!(!store.save("a@b.com", "q", "r", None).await);
        assert!(matches!(
            store.recent("a@b.com", 5).await,
            Err(HistoryError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_sqlite_target_degrades_to_no_op() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let target = HistoryTarget::Sqlite(dir.path().to_path_buf());

        let store = HistoryStore::connect(Some(&target)).await;
        let status = store.status();
        assert!(!status.connected);
        assert!(status.error.is_some());
        assert!(!store.save("a@b.com", "q", "r", None).await);
    }

    #[tokio::test]
    async fn test_unreachable_supabase_degrades_to_no_op() {
        let target = HistoryTarget::Supabase {
            url: "http://127.0.0.1:9".into(),
            key: "anon".into(),
        };
        let store = HistoryStore::connect(Some(&target)).await;
        assert!(!store.is_connected());
        assert!(!store.save("a@b.com", "q", "r", Some("f.pdf")).await);
    }

    #[tokio::test]
    async fn test_sqlite_store_saves_once_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let target = HistoryTarget::Sqlite(dir.path().join("history.db"));
        let store = HistoryStore::connect(Some(&target)).await;
        assert!(store.is_connected());

        assert!(store.save("a@b.com", "What is EBITDA?", "• Earnings before...", Some("pl.pdf")).await);
        let records = store.recent("a@b.com", 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "What is EBITDA?");
        assert_eq!(records[0].file_name.as_deref(), Some("pl.pdf"));
    }

    #[test]
    fn test_long_endpoints_are_shortened() {
        assert_eq!(shorten("http://x"), "http://x");
        let long = "https://abcdefghijklmnop.supabase.co";
        assert_eq!(shorten(long), "https://abcdefghijklmnop.supab...");
    }
}
