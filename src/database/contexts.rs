// ABOUTME: Context and resource-link database operations
// ABOUTME: Upserts course contexts and assignable activities keyed by their external ids

use super::Database;
use crate::errors::AppResult;
use crate::models::{CourseContext, ResourceLink};
use sqlx::Row;

impl Database {
    /// Create context and resource link tables
    pub(super) async fn migrate_contexts(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS lti_contexts (
                context_id TEXT PRIMARY KEY,
                title TEXT,
                label TEXT,
                course_id TEXT,
                platform TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS resource_links (
                resource_link_id TEXT PRIMARY KEY,
                title TEXT,
                description TEXT,
                context_id TEXT NOT NULL,
                score_endpoint_url TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_resource_links_context_id \
             ON resource_links(context_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert a course context by its external id; every launch refreshes
    /// the platform-supplied fields
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn upsert_context(&self, context: &CourseContext) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO lti_contexts (context_id, title, label, course_id, platform)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (context_id) DO UPDATE SET
                title = excluded.title,
                label = excluded.label,
                course_id = excluded.course_id,
                platform = excluded.platform
            ",
        )
        .bind(&context.context_id)
        .bind(&context.title)
        .bind(&context.label)
        .bind(&context.course_id)
        .bind(&context.platform)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a context by external id
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn get_context(&self, context_id: &str) -> AppResult<Option<CourseContext>> {
        let row = sqlx::query(
            r"
            SELECT context_id, title, label, course_id, platform
            FROM lti_contexts
            WHERE context_id = ?1
            ",
        )
        .bind(context_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(CourseContext {
                context_id: row.try_get("context_id")?,
                title: row.try_get("title")?,
                label: row.try_get("label")?,
                course_id: row.try_get("course_id")?,
                platform: row.try_get("platform")?,
            })
        })
        .transpose()
    }

    /// Upsert a resource link by its external id. The score endpoint URL
    /// is always refreshed from the latest launch claims since the
    /// platform can rotate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn upsert_resource_link(&self, link: &ResourceLink) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO resource_links (
                resource_link_id, title, description, context_id, score_endpoint_url
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (resource_link_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                context_id = excluded.context_id,
                score_endpoint_url = excluded.score_endpoint_url
            ",
        )
        .bind(&link.resource_link_id)
        .bind(&link.title)
        .bind(&link.description)
        .bind(&link.context_id)
        .bind(&link.score_endpoint_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a resource link by external id
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn get_resource_link(
        &self,
        resource_link_id: &str,
    ) -> AppResult<Option<ResourceLink>> {
        let row = sqlx::query(
            r"
            SELECT resource_link_id, title, description, context_id, score_endpoint_url
            FROM resource_links
            WHERE resource_link_id = ?1
            ",
        )
        .bind(resource_link_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ResourceLink {
                resource_link_id: row.try_get("resource_link_id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                context_id: row.try_get("context_id")?,
                score_endpoint_url: row.try_get("score_endpoint_url")?,
            })
        })
        .transpose()
    }

    /// Count stored contexts (used by upsert-idempotency checks)
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn count_contexts(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM lti_contexts")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Count stored resource links
    ///
    /// # Errors
    ///
    /// Returns an error if the store round-trip fails.
    pub async fn count_resource_links(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM resource_links")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
