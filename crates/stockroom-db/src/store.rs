//! The store handle shared by every repository.
//!
//! A [`Store`] is opened once per process and handed to the repositories. It
//! owns one of two backends:
//!
//! - **snapshot**: an in-memory SQLite database whose full image is written
//!   to a [`BlobStore`] after each mutation and loaded from it on open;
//! - **direct**: a file-backed database reached through an r2d2 pool, where
//!   every write is durable when the statement returns.
//!
//! Opening a store always runs [`migrations::ensure_schema`].

use std::ops::Deref;
use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, OpenFlags};
use serde::{Deserialize, Serialize};
use stockroom_common::{Error, Result};

use crate::blob::{BlobStore, LegacyTextBlob, MemoryBlobStore, NoopBlobStore, DEFAULT_BLOB_KEY};
use crate::migrations::{self, maintenance, SchemaReport};

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// First 16 bytes of every SQLite database file.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Which backend a store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// In-memory database persisted as a blob after every write.
    #[default]
    Snapshot,
    /// File-backed database, durable per statement.
    Direct,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

enum Backend {
    Snapshot(Connection),
    Direct(DbPool),
}

/// Connection borrowed from a [`Store`].
pub enum StoreConn<'a> {
    Snapshot(&'a Connection),
    Pooled(PooledConnection),
}

impl Deref for StoreConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Snapshot(conn) => conn,
            Self::Pooled(conn) => conn,
        }
    }
}

/// Live handle to the inventory database.
pub struct Store {
    backend: Backend,
    blobs: Box<dyn BlobStore>,
    blob_key: String,
}

fn open_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> Result<SchemaReport> {
    migrations::ensure_schema(conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))
}

fn log_image_summary(conn: &Connection) {
    match maintenance::image_summary(conn) {
        Ok(summary) => tracing::debug!(
            "Database contains {} stored images, sample payload lengths {:?}",
            summary.count,
            summary.samples
        ),
        Err(e) => tracing::warn!("Failed to inspect stored images: {}", e),
    }
}

/// A database image written to a temp file and checked for integrity.
struct VerifiedImage {
    file: tempfile::NamedTempFile,
    page_size: i64,
}

/// Check that `data` is a readable SQLite database image without touching any
/// live connection.
fn verify_image(data: &[u8]) -> Result<VerifiedImage> {
    if data.len() < SQLITE_MAGIC.len() || &data[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        return Err(Error::validation("data is not an SQLite database image"));
    }

    let mut file = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(&mut file, data)?;

    let probe = Connection::open_with_flags(file.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::validation(format!("database image cannot be opened: {}", e)))?;

    let check: String = probe
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| Error::validation(format!("database image is unreadable: {}", e)))?;
    if check != "ok" {
        return Err(Error::validation(format!(
            "database image failed integrity check: {}",
            check
        )));
    }

    let has_products: bool = probe
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'products'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::validation(format!("database image is unreadable: {}", e)))?;
    if !has_products {
        return Err(Error::validation("database image holds no products table"));
    }

    let page_size: i64 = probe
        .query_row("PRAGMA page_size", [], |row| row.get(0))
        .map_err(|e| Error::validation(e.to_string()))?;

    Ok(VerifiedImage { file, page_size })
}

/// Load a verified image into a fresh in-memory connection.
fn load_image(data: &[u8]) -> Result<Connection> {
    let image = verify_image(data)?;

    let mut conn = Connection::open_in_memory()
        .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

    // In-memory backup targets must match the source page size.
    conn.execute_batch(&format!("PRAGMA page_size = {};", image.page_size))
        .map_err(|e| Error::database(e.to_string()))?;

    conn.restore(DatabaseName::Main, image.file.path(), None::<fn(Progress)>)
        .map_err(|e| Error::database(format!("Failed to load database image: {}", e)))?;

    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(conn)
}

fn serialize(conn: &Connection) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snapshot.sqlite");

    conn.backup(DatabaseName::Main, &path, None)
        .map_err(|e| Error::database(format!("Failed to serialize database: {}", e)))?;

    Ok(std::fs::read(&path)?)
}

impl Store {
    /// Open a snapshot store, loading the prior image from `blobs`.
    ///
    /// When `blobs` holds nothing under `blob_key` and a legacy text blob is
    /// given, its content is loaded, written to `blobs`, and the legacy file
    /// removed. An image that cannot be decoded is logged and replaced by an
    /// empty database; a failing blob store read is returned as an error.
    pub fn open_snapshot(
        blobs: Box<dyn BlobStore>,
        blob_key: &str,
        legacy: Option<&LegacyTextBlob>,
    ) -> Result<(Self, SchemaReport)> {
        let mut from_legacy = false;
        let mut prior = blobs.get(blob_key)?;

        if prior.is_none() {
            if let Some(legacy) = legacy {
                match legacy.read() {
                    Ok(Some(data)) => {
                        tracing::info!(
                            "Migrating database image from {}",
                            legacy.path().display()
                        );
                        prior = Some(data);
                        from_legacy = true;
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        "Ignoring unreadable legacy image {}: {}",
                        legacy.path().display(),
                        e
                    ),
                }
            }
        }

        let (conn, loaded) = match prior {
            Some(data) => match load_image(&data) {
                Ok(conn) => {
                    tracing::info!("Loaded existing database from {}", blobs.describe());
                    (conn, true)
                }
                Err(e) => {
                    tracing::error!("Stored database image is unusable, starting empty: {}", e);
                    (open_memory_connection()?, false)
                }
            },
            None => (open_memory_connection()?, false),
        };

        let report = ensure_schema(&conn)?;
        log_image_summary(&conn);

        let store = Self {
            backend: Backend::Snapshot(conn),
            blobs,
            blob_key: blob_key.to_string(),
        };

        if !loaded || from_legacy || report.changed() {
            store.persist()?;
        }

        if from_legacy {
            if let Some(legacy) = legacy {
                if let Err(e) = legacy.discard() {
                    tracing::warn!("Failed to remove legacy image {}: {}", legacy.path().display(), e);
                }
            }
        }

        Ok((store, report))
    }

    /// Snapshot store backed by process memory, for tests.
    pub fn open_memory() -> Result<Self> {
        let (store, _) =
            Self::open_snapshot(Box::new(MemoryBlobStore::new()), DEFAULT_BLOB_KEY, None)?;
        Ok(store)
    }

    /// Open a direct store on the database file at `db_path`.
    ///
    /// Every pooled connection enables foreign keys.
    pub fn open_direct(db_path: &Path, pool_size: u32) -> Result<(Self, SchemaReport)> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

        let conn = pool
            .get()
            .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;
        let report = ensure_schema(&conn)?;
        log_image_summary(&conn);
        drop(conn);

        Ok((
            Self {
                backend: Backend::Direct(pool),
                blobs: Box::new(NoopBlobStore),
                blob_key: DEFAULT_BLOB_KEY.to_string(),
            },
            report,
        ))
    }

    /// Backend this store runs on.
    pub fn mode(&self) -> StorageMode {
        match self.backend {
            Backend::Snapshot(_) => StorageMode::Snapshot,
            Backend::Direct(_) => StorageMode::Direct,
        }
    }

    /// Borrow a connection.
    pub fn conn(&self) -> Result<StoreConn<'_>> {
        match &self.backend {
            Backend::Snapshot(conn) => Ok(StoreConn::Snapshot(conn)),
            Backend::Direct(pool) => pool
                .get()
                .map(StoreConn::Pooled)
                .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e))),
        }
    }

    /// Blob store holding the persisted image.
    pub fn blob_store(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Key of the persisted image.
    pub fn blob_key(&self) -> &str {
        &self.blob_key
    }

    /// Write the current image to the blob store. Direct stores are already
    /// durable and return immediately.
    pub fn persist(&self) -> Result<()> {
        let Backend::Snapshot(conn) = &self.backend else {
            return Ok(());
        };

        let data = serialize(conn)?;
        self.blobs.put(&self.blob_key, &data)?;
        tracing::debug!(
            "Persisted {} byte database image to {}",
            data.len(),
            self.blobs.describe()
        );
        Ok(())
    }

    /// Serialize the whole database.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let conn = self.conn()?;
        serialize(&conn)
    }

    /// Replace the live content with a serialized database image.
    ///
    /// The image is verified, loaded into a staging database and migrated
    /// there first; the live content is only replaced once all of that
    /// succeeded.
    pub fn restore(&mut self, data: &[u8]) -> Result<SchemaReport> {
        let staged = load_image(data)?;
        let report = ensure_schema(&staged)?;
        log_image_summary(&staged);

        match &mut self.backend {
            Backend::Snapshot(conn) => {
                *conn = staged;
            }
            Backend::Direct(pool) => {
                let migrated = serialize(&staged)?;
                let image = verify_image(&migrated)?;
                let mut live = pool
                    .get()
                    .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))?;
                live.restore(DatabaseName::Main, image.file.path(), None::<fn(Progress)>)
                    .map_err(|e| Error::database(format!("Failed to restore database: {}", e)))?;
            }
        }

        self.persist()?;
        Ok(report)
    }
}
