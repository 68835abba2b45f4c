//! SQLite session store.

use std::str::FromStr;

use chrono::Utc;
use deskclaw_core::error::StoreError;
use deskclaw_core::message::{Session, SessionId, StoredMessage, StoredRole};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// SQLite-backed store for sessions and their transcripts.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral in-process database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                is_active  INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("store migrations complete");
        Ok(())
    }

    /// Create a fresh session with a generated id.
    pub async fn create_session(&self) -> Result<Session, StoreError> {
        let session = Session {
            id: SessionId::new(),
            created_at: Utc::now(),
            is_active: true,
        };

        sqlx::query("INSERT INTO sessions (id, created_at, is_active) VALUES (?1, ?2, 1)")
            .bind(&session.id.0)
            .bind(session.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT session: {e}")))?;

        debug!(session_id = %session.id, "created session");
        Ok(session)
    }

    /// Look up a session by id.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT id, created_at, is_active FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT session: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_session(r)?)),
            None => Ok(None),
        }
    }

    /// Fetch the session, creating it on first contact. Clients connect
    /// with ids they may have minted themselves, so an unknown id is a new
    /// conversation rather than an error.
    pub async fn ensure_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        if let Some(session) = self.get_session(id).await? {
            return Ok(session);
        }

        let session = Session {
            id: id.clone(),
            created_at: Utc::now(),
            is_active: true,
        };

        // Racing connects are possible; the second insert is a no-op.
        sqlx::query(
            "INSERT INTO sessions (id, created_at, is_active) VALUES (?1, ?2, 1)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&session.id.0)
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session: {e}")))?;

        debug!(session_id = %session.id, "created session on first contact");
        Ok(session)
    }

    /// Append one message to a session's transcript.
    pub async fn append_message(
        &self,
        session_id: &SessionId,
        role: StoredRole,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session_id.0)
        .bind(role.as_str())
        .bind(content)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message: {e}")))?;

        Ok(StoredMessage {
            id: result.last_insert_rowid(),
            session_id: session_id.clone(),
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    /// Full transcript in timestamp order, insertion id as tiebreak.
    ///
    /// An unknown session id yields an empty transcript rather than an
    /// error; the WebSocket path treats every id as a conversation that may
    /// simply not have started yet.
    pub async fn history(&self, session_id: &SessionId) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, timestamp FROM messages
             WHERE session_id = ?1 ORDER BY timestamp, id",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT history: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    /// Delete a session and, via the cascade, its transcript.
    pub async fn delete_session(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE session: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let is_active: i64 = row
            .try_get("is_active")
            .map_err(|e| StoreError::QueryFailed(format!("is_active column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at parse: {e}")))?;

        Ok(Session {
            id: SessionId(id),
            created_at,
            is_active: is_active != 0,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| StoreError::QueryFailed(format!("timestamp column: {e}")))?;

        let role = role_str
            .parse::<StoredRole>()
            .map_err(StoreError::QueryFailed)?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("timestamp parse: {e}")))?;

        Ok(StoredMessage {
            id,
            session_id: SessionId(session_id),
            role,
            content,
            timestamp,
        })
    }
}
