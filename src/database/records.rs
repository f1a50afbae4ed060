// ABOUTME: Launch audit record and grade passback database operations
// ABOUTME: Append-only launch records plus pending/sent/failed passback transitions

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{GradePassback, GradePassbackStatus, LaunchOutcome, LaunchRecord};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create launch record and grade passback tables
    pub(super) async fn migrate_records(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS launch_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                context_id TEXT NOT NULL,
                resource_link_id TEXT NOT NULL,
                timestamp DATETIME NOT NULL,
                outcome TEXT NOT NULL CHECK (outcome IN ('success', 'failure')),
                error_message TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_launch_records_user_id \
             ON launch_records(user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS grade_passbacks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                resource_link_id TEXT NOT NULL,
                score REAL NOT NULL,
                max_score REAL NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'sent', 'failed')),
                sent_at DATETIME,
                response_body TEXT,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_grade_passbacks_resource_link_id \
             ON grade_passbacks(resource_link_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one launch audit record. Records are written exactly once
    /// per launch attempt and never mutated.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_launch_record(&self, record: &LaunchRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO launch_records (
                id, user_id, context_id, resource_link_id, timestamp, outcome, error_message
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.context_id)
        .bind(&record.resource_link_id)
        .bind(record.timestamp)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch launch records for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn get_launch_records_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<LaunchRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, context_id, resource_link_id, timestamp, outcome, error_message
            FROM launch_records
            WHERE user_id = ?1
            ORDER BY timestamp DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_launch_record).collect()
    }

    /// Create a grade passback row in `pending` status before any
    /// network activity, so every attempt is durably recorded even if
    /// the network step crashes the process
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_grade_passback(&self, passback: &GradePassback) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO grade_passbacks (
                id, user_id, resource_link_id, score, max_score, status,
                sent_at, response_body, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(passback.id.to_string())
        .bind(&passback.user_id)
        .bind(&passback.resource_link_id)
        .bind(passback.score)
        .bind(passback.max_score)
        .bind(passback.status.as_str())
        .bind(passback.sent_at)
        .bind(&passback.response_body)
        .bind(passback.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transition a passback to `sent`, storing the platform response
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_passback_sent(
        &self,
        id: Uuid,
        sent_at: DateTime<Utc>,
        response_body: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE grade_passbacks
            SET status = 'sent', sent_at = ?2, response_body = ?3
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .bind(sent_at)
        .bind(response_body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transition a passback to `failed`, storing the error detail
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_passback_failed(&self, id: Uuid, error_detail: &str) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE grade_passbacks
            SET status = 'failed', response_body = ?2
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .bind(error_detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one passback by id
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn get_grade_passback(&self, id: Uuid) -> AppResult<Option<GradePassback>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, resource_link_id, score, max_score, status,
                   sent_at, response_body, created_at
            FROM grade_passbacks
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_passback(&row)).transpose()
    }

    /// Count passback rows currently in the given status
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn count_passbacks_in_status(
        &self,
        status: GradePassbackStatus,
    ) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM grade_passbacks WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    fn row_to_launch_record(row: &sqlx::sqlite::SqliteRow) -> AppResult<LaunchRecord> {
        let id: String = row.try_get("id")?;
        let outcome: String = row.try_get("outcome")?;
        Ok(LaunchRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("bad launch record id: {e}")))?,
            user_id: row.try_get("user_id")?,
            context_id: row.try_get("context_id")?,
            resource_link_id: row.try_get("resource_link_id")?,
            timestamp: row.try_get("timestamp")?,
            outcome: if outcome == "success" {
                LaunchOutcome::Success
            } else {
                LaunchOutcome::Failure
            },
            error_message: row.try_get("error_message")?,
        })
    }

    fn row_to_passback(row: &sqlx::sqlite::SqliteRow) -> AppResult<GradePassback> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        Ok(GradePassback {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("bad passback id: {e}")))?,
            user_id: row.try_get("user_id")?,
            resource_link_id: row.try_get("resource_link_id")?,
            score: row.try_get("score")?,
            max_score: row.try_get("max_score")?,
            status: GradePassbackStatus::from_str_or_failed(&status),
            sent_at: row.try_get("sent_at")?,
            response_body: row.try_get("response_body")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
