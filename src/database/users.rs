// ABOUTME: User identity database operations
// ABOUTME: Handles launch-time provisioning and refresh of platform user identities

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{LtiRole, UserIdentity};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the user identity table
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_identities (
                id TEXT PRIMARY KEY,
                lti_user_id TEXT UNIQUE NOT NULL,
                platform_user_id TEXT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                given_name TEXT,
                family_name TEXT,
                role TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'admin')),
                enabled BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_identities_lti_user_id \
             ON user_identities(lti_user_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up an identity by the platform's stable subject identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip or row decoding fails.
    pub async fn get_user_by_lti_id(&self, lti_user_id: &str) -> AppResult<Option<UserIdentity>> {
        let row = sqlx::query(
            r"
            SELECT id, lti_user_id, platform_user_id, name, email, given_name,
                   family_name, role, enabled, created_at, updated_at
            FROM user_identities
            WHERE lti_user_id = ?1
            ",
        )
        .bind(lti_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_user(&row)).transpose()
    }

    /// Insert a newly provisioned identity
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_user_identity(&self, user: &UserIdentity) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_identities (
                id, lti_user_id, platform_user_id, name, email, given_name,
                family_name, role, enabled, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.lti_user_id)
        .bind(&user.platform_user_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.given_name)
        .bind(&user.family_name)
        .bind(user.role.as_str())
        .bind(user.enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Refresh the profile fields of an existing identity in place
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_user_identity(&self, user: &UserIdentity) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE user_identities SET
                platform_user_id = ?2,
                name = ?3,
                email = ?4,
                given_name = ?5,
                family_name = ?6,
                role = ?7,
                enabled = ?8,
                updated_at = ?9
            WHERE lti_user_id = ?1
            ",
        )
        .bind(&user.lti_user_id)
        .bind(&user.platform_user_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.given_name)
        .bind(&user.family_name)
        .bind(user.role.as_str())
        .bind(user.enabled)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> AppResult<UserIdentity> {
        let id: String = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        Ok(UserIdentity {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("bad user id: {e}")))?,
            lti_user_id: row.try_get("lti_user_id")?,
            platform_user_id: row.try_get("platform_user_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            given_name: row.try_get("given_name")?,
            family_name: row.try_get("family_name")?,
            role: LtiRole::from_str_or_student(&role),
            enabled: row.try_get("enabled")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
