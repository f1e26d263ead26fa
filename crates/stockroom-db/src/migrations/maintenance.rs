//! Consistency sweeps run after migrations on every startup.

use rusqlite::Connection;

/// Tables from superseded layouts that nothing reads any more.
pub const LEGACY_AUX_TABLES: &[&str] = &["categories"];

/// Clear `products.image_id` values that point at no stored image.
///
/// Returns the number of products repaired.
pub fn clear_dangling_image_refs(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE products SET image_id = NULL
         WHERE image_id IS NOT NULL
           AND image_id NOT IN (SELECT image_id FROM images)",
        [],
    )
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Drop legacy auxiliary tables. A missing table counts as done; a failed
/// drop is logged and skipped.
///
/// Returns the tables that were actually dropped.
pub fn drop_legacy_tables(conn: &Connection) -> Vec<String> {
    let mut dropped = Vec::new();

    for table in LEGACY_AUX_TABLES {
        match table_exists(conn, table) {
            Ok(false) => {}
            Ok(true) => match conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\"", table)) {
                Ok(()) => {
                    tracing::info!("Dropped legacy table {}", table);
                    dropped.push((*table).to_string());
                }
                Err(e) => tracing::warn!("Failed to drop legacy table {}: {}", table, e),
            },
            Err(e) => tracing::warn!("Failed to look up legacy table {}: {}", table, e),
        }
    }

    dropped
}

/// Stored image count and payload lengths of a few sample rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSummary {
    pub count: i64,
    /// `(product_id, payload length)` for up to five images.
    pub samples: Vec<(i64, i64)>,
}

/// Summarize stored image payloads, for diagnostics after load or import.
pub fn image_summary(conn: &Connection) -> rusqlite::Result<ImageSummary> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;

    let mut stmt =
        conn.prepare("SELECT product_id, LENGTH(base64_data) FROM images ORDER BY id LIMIT 5")?;
    let samples = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ImageSummary { count, samples })
}
