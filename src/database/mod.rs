// ABOUTME: Database management for the LTI bridge server
// ABOUTME: Owns the SQLite pool, schema migration, and per-domain query modules
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Database Management
//!
//! SQLite-backed persistence for launch sessions, identities, contexts,
//! resource links, audit records, and grade passbacks. The `Database` is
//! explicitly constructed at bootstrap and injected where needed; there is
//! no module-level global. Sessions are never cached in-process — every
//! session operation is a store round-trip so state stays visible across
//! horizontally scaled instances.

mod contexts;
mod records;
mod sessions;
mod users;

use crate::errors::AppResult;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database handle for all persisted collections
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or
    /// migration fails.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains("mode=")
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options).await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails.
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_sessions().await?;
        self.migrate_users().await?;
        self.migrate_contexts().await?;
        self.migrate_records().await?;
        Ok(())
    }
}
