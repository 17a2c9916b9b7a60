#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Registry store: connection, queries, and migrations.
//!
//! Uses `switchy_database` for query execution and `switchy_schema` for
//! embedded SQL migrations. The rest of the system talks to persistence
//! through the [`RegistryStore`] trait so the ingestion pipeline and the
//! API handlers can be tested against an in-memory stub; [`PgStore`] in
//! [`queries`] is the production implementation.

pub mod db;
pub mod queries;

use async_trait::async_trait;
use include_dir::{Dir, include_dir};
use pothole_map_database_models::{
    IncidentQuery, IncidentRecord, InvitationRow, NewIncident, NewUser, UserRow,
};
use pothole_map_incident_models::IncidentStatus;
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

pub use queries::PgStore;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

/// The persistence collaborator.
///
/// One method per registry operation; no process-wide mutable state
/// backs any of this. The dedup-check-then-persist sequence is not
/// atomic across these calls - two concurrent submissions for the same
/// location can both pass the candidate check and both create records.
/// That best-effort behavior is deliberate; merging happens on demand
/// through [`RegistryStore::boost_priority`].
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Inserts a new incident and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    async fn create_incident(&self, incident: &NewIncident) -> Result<IncidentRecord, DbError>;

    /// Fetches an incident by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, DbError>;

    /// Fetches an incident by its reference code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn incident_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<IncidentRecord>, DbError>;

    /// Lists incidents, optionally filtered by region-field equality
    /// (case-insensitive) and an inclusive reported-date range.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, DbError>;

    /// Returns all non-`fixed` incidents that carry a coordinate - the
    /// candidate set for the geospatial dedup engine.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn dedup_candidates(&self) -> Result<Vec<IncidentRecord>, DbError>;

    /// Transitions an incident's status, refreshing `last_update`.
    /// Returns `false` when the id does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<bool, DbError>;

    /// Applies a priority boost: increments the score by `boost`,
    /// increments the report count, and appends `reporter`. Returns the
    /// updated record, or `None` when the id does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    async fn boost_priority(
        &self,
        id: i64,
        boost: i64,
        reporter: &str,
    ) -> Result<Option<IncidentRecord>, DbError>;

    /// Inserts a new user account.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    async fn create_user(&self, user: &NewUser) -> Result<UserRow, DbError>;

    /// Fetches a user by email.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn user_by_email(&self, email: &str) -> Result<Option<UserRow>, DbError>;

    /// Resolves an opaque API bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn user_by_token(&self, token: &str) -> Result<Option<UserRow>, DbError>;

    /// Deletes a user account by email. Returns `false` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    async fn delete_user_by_email(&self, email: &str) -> Result<bool, DbError>;

    /// Inserts a new invitation code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    async fn create_invitation(&self, invitation: &InvitationRow) -> Result<(), DbError>;

    /// Fetches an invitation code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn invitation_by_code(&self, code: &str) -> Result<Option<InvitationRow>, DbError>;

    /// Lists all invitation codes, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    async fn invitations(&self) -> Result<Vec<InvitationRow>, DbError>;

    /// Marks an invitation code as redeemed by `used_by`. Returns
    /// `false` when the code does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    async fn mark_invitation_used(&self, code: &str, used_by: &str) -> Result<bool, DbError>;

    /// Deletes an invitation code. Returns `false` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    async fn delete_invitation(&self, code: &str) -> Result<bool, DbError>;
}
