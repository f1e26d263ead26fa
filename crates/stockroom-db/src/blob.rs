//! Persistence of the serialized database image as an opaque blob.
//!
//! The snapshot store keeps its database in memory and writes the complete
//! image to a [`BlobStore`] after every mutation, under a fixed key.
//! Implementations cover structured object storage (a key/value SQLite file),
//! plain files, memory, and a no-op for backends that are durable on their
//! own. [`LegacyTextBlob`] reads the comma-separated text format used by an
//! earlier generation so it can be moved into the current store once.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use stockroom_common::{Error, Result};

/// Key under which the database image is stored by default.
pub const DEFAULT_BLOB_KEY: &str = "database";

/// A persistent get/put store for byte blobs.
pub trait BlobStore: Send {
    /// Fetch the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `data` under `key`, replacing any previous value.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Remove the blob under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Short name for log messages.
    fn describe(&self) -> &'static str;
}

/// Structured object storage: an SQLite file with one `sqlite_data` table
/// keyed by `id`.
pub struct ObjectBlobStore {
    conn: Mutex<Connection>,
}

impl ObjectBlobStore {
    /// Open (creating if needed) the object store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            Error::database(format!(
                "Failed to open object store {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_connection(conn)
    }

    /// Object store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sqlite_data (
                id TEXT PRIMARY KEY NOT NULL,
                data BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BlobStore for ObjectBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.conn
            .lock()
            .query_row(
                "SELECT data FROM sqlite_data WHERE id = :id",
                rusqlite::named_params! { ":id": key },
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::database(e.to_string()))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO sqlite_data (id, data) VALUES (:id, :data)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                rusqlite::named_params! { ":id": key, ":data": data },
            )
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "DELETE FROM sqlite_data WHERE id = :id",
                rusqlite::named_params! { ":id": key },
            )
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "object store"
    }
}

/// One file per key under a directory: `<dir>/<key>.sqlite`.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Create a file store rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.sqlite", key))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Write next to the target and rename so readers never see a torn file.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.persist(self.path_for(key))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn describe(&self) -> &'static str {
        "file store"
    }
}

/// Process-local blob store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.lock().remove(key);
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "memory store"
    }
}

/// Store for backends that persist every write themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBlobStore;

impl BlobStore for NoopBlobStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "no-op store"
    }
}

/// Database image saved as comma-separated decimal bytes (`83,81,76,...`).
#[derive(Debug, Clone)]
pub struct LegacyTextBlob {
    path: PathBuf,
}

impl LegacyTextBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the blob, `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        decode_text_blob(&text).map(Some)
    }

    /// Delete the legacy file once its content lives elsewhere.
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Decode the comma-separated byte text format.
pub fn decode_text_blob(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(',')
        .map(|part| {
            part.trim().parse::<u8>().map_err(|e| {
                Error::serialization(format!("invalid byte {:?} in legacy blob: {}", part, e))
            })
        })
        .collect()
}
