use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::models::ChatRecord;
use super::HistoryError;

/// Local `chat_history` table in a SQLite file.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).ok();
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HistoryError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, HistoryError> {
        self.conn.lock().map_err(|_| HistoryError::Poisoned)
    }

    fn migrate(&self) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chat_history (
                id TEXT PRIMARY KEY,
                user_email TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                file_name TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_history_user
                ON chat_history (user_email, created_at);
            ",
        )?;
        Ok(())
    }

    /// Trivial read used as the reachability probe.
    pub fn probe(&self) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM chat_history LIMIT 1")?;
        let mut rows = stmt.query([])?;
        rows.next()?;
        Ok(())
    }

    pub fn insert(&self, record: &ChatRecord) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chat_history (id, user_email, query, response, file_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                record.user_email,
                record.query,
                record.response,
                record.file_name,
                record.created_at
            ],
        )?;
        Ok(())
    }

    pub fn recent(&self, identity: &str, limit: usize) -> Result<Vec<ChatRecord>, HistoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_email, query, response, file_name, created_at FROM chat_history
             WHERE user_email = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![identity, limit as i64], |row| {
            Ok(ChatRecord {
                user_email: row.get(0)?,
                query: row.get(1)?,
                response: row.get(2)?,
                file_name: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<i64, HistoryError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM chat_history", [], |row| row.get(0))?)
    }
}
