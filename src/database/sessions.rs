// ABOUTME: Launch session store operations
// ABOUTME: Handles nonce-keyed session creation, atomic consumption, and expiry sweeps

use super::Database;
use crate::errors::AppResult;
use crate::models::LaunchSession;
use chrono::{Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the launch session table
    pub(super) async fn migrate_sessions(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS launch_sessions (
                id TEXT PRIMARY KEY,
                nonce TEXT UNIQUE NOT NULL,
                state TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                expires_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_launch_sessions_expires_at \
             ON launch_sessions(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a launch session for a nonce/state pair
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a nonce collision,
    /// which the unique constraint rejects).
    pub async fn create_session(
        &self,
        nonce: &str,
        state: &str,
        ttl_minutes: i64,
    ) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(ttl_minutes);

        sqlx::query(
            r"
            INSERT INTO launch_sessions (id, nonce, state, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id.to_string())
        .bind(nonce)
        .bind(state)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Atomically consume the session for a nonce: a single
    /// `DELETE ... RETURNING` bounded by the expiry timestamp, so two
    /// concurrent launches replaying the same nonce can never both
    /// observe the row. Returns `None` for unknown, already-consumed,
    /// and expired nonces alike.
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn take_session_by_nonce(&self, nonce: &str) -> AppResult<Option<LaunchSession>> {
        let row = sqlx::query(
            r"
            DELETE FROM launch_sessions
            WHERE nonce = ?1 AND expires_at > ?2
            RETURNING id, nonce, state, created_at, expires_at
            ",
        )
        .bind(nonce)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        Ok(Some(LaunchSession {
            id: Uuid::parse_str(&id)
                .map_err(|e| crate::errors::AppError::database(format!("bad session id: {e}")))?,
            nonce: row.try_get("nonce")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    /// Delete every expired session; returns the number removed.
    /// Intended for the periodic sweep task, not per-request use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn sweep_expired_sessions(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM launch_sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count live session rows (expired-but-unswept included)
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn count_sessions(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM launch_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
