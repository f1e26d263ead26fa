//! Database migrations module
//!
//! Schema versions are recorded in `schema_migrations` and numbered
//! migrations are applied forward from the stored version. Stores written
//! before versioning existed report version 0; for those the `products`
//! column set is inspected and a legacy layout is rebuilt before the numbered
//! migrations run.

pub mod legacy;
pub mod maintenance;

use rusqlite::{Connection, Result};
use thiserror::Error;

pub use legacy::{Layout, LegacyRebuild};

/// Migration error types
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration {0} failed: {1}")]
    Failed(usize, String),

    #[error("Legacy products table could not be rebuilt: {0}")]
    LegacyRebuild(String),
}

/// A single migration with its SQL content
struct Migration {
    version: usize,
    name: &'static str,
    sql: &'static str,
}

/// All available migrations
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial",
        sql: include_str!("001_initial.sql"),
    },
    Migration {
        version: 2,
        name: "single_image_per_product",
        sql: include_str!("002_single_image_per_product.sql"),
    },
    Migration {
        version: 3,
        name: "product_listing_index",
        sql: include_str!("003_product_listing_index.sql"),
    },
];

/// Outcome of [`ensure_schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Set when a pre-versioning legacy table was rebuilt.
    pub legacy: Option<LegacyRebuild>,
    /// Number of numbered migrations applied.
    pub migrations_applied: usize,
    /// Legacy auxiliary tables removed.
    pub dropped_tables: Vec<String>,
    /// Products whose dangling image reference was cleared.
    pub repaired_references: usize,
}

impl SchemaReport {
    /// Whether anything in the store was modified.
    pub fn changed(&self) -> bool {
        self.legacy.is_some()
            || self.migrations_applied > 0
            || !self.dropped_tables.is_empty()
            || self.repaired_references > 0
    }
}

/// Initialize the migrations table if it doesn't exist
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<usize> {
    match conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get::<_, Option<usize>>(0)
    }) {
        Ok(Some(version)) => Ok(version),
        Ok(None) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Apply a single migration
fn apply_migration(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    conn.execute_batch(migration.sql)
        .map_err(|e| MigrationError::Failed(migration.version, e.to_string()))?;

    conn.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?, ?)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(|e| MigrationError::Failed(migration.version, e.to_string()))?;

    Ok(())
}

/// Run all pending numbered migrations
///
/// Each migration runs in its own transaction.
///
/// # Returns
///
/// * `Ok(usize)` - Number of migrations applied
/// * `Err(MigrationError)` - If any migration fails
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .map_err(MigrationError::Database)?;

    init_migrations_table(conn).map_err(MigrationError::Database)?;

    let current_version = get_current_version(conn).map_err(MigrationError::Database)?;

    let pending_migrations: Vec<_> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect();

    if pending_migrations.is_empty() {
        return Ok(0);
    }

    let mut applied_count = 0;
    for migration in pending_migrations {
        let tx = conn
            .unchecked_transaction()
            .map_err(MigrationError::Database)?;

        apply_migration(&tx, migration)?;

        tx.commit()
            .map_err(|e| MigrationError::Failed(migration.version, e.to_string()))?;

        applied_count += 1;

        tracing::info!(
            "Applied migration {}: {}",
            migration.version,
            migration.name
        );
    }

    Ok(applied_count)
}

/// Bring the store to the current layout.
///
/// Idempotent: on an up-to-date store nothing is written and the returned
/// report is empty. Cleanup and reference repair failures are logged and do
/// not fail the call; failures to create or read the tables do.
pub fn ensure_schema(conn: &Connection) -> Result<SchemaReport, MigrationError> {
    init_migrations_table(conn)?;

    let mut report = SchemaReport::default();

    if get_current_version(conn)? == 0 {
        match legacy::detect_layout(conn)? {
            Layout::Legacy(columns) => {
                tracing::info!("Legacy product layout detected: {}", columns.join(", "));
                report.legacy = Some(legacy::rebuild_products(conn, &columns)?);
            }
            Layout::Current => tracing::info!("Adopting unversioned store with current layout"),
            Layout::Empty => tracing::debug!("Creating schema in empty store"),
        }
    }

    report.migrations_applied = run_migrations(conn)?;

    report.dropped_tables = maintenance::drop_legacy_tables(conn);

    match maintenance::clear_dangling_image_refs(conn) {
        Ok(0) => {}
        Ok(count) => {
            tracing::warn!("Cleared {} dangling image references", count);
            report.repaired_references = count;
        }
        Err(e) => tracing::warn!("Failed to repair image references: {}", e),
    }

    Ok(report)
}

/// Get the current schema version without applying migrations
pub fn current_version(conn: &Connection) -> Result<usize, MigrationError> {
    init_migrations_table(conn).map_err(MigrationError::Database)?;

    get_current_version(conn).map_err(MigrationError::Database)
}

/// Get the latest available migration version
pub fn latest_version() -> usize {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
