//! Export and import of the whole catalog.
//!
//! Two artifact formats are supported: the raw SQLite image of the store and
//! a JSON document listing every product. Imports detect the format from the
//! SQLite file header and validate everything before touching live data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_common::{Error, Result};
use stockroom_db::migrations::SchemaReport;
use stockroom_db::models::{Product, ProductInput};
use stockroom_db::queries::products;
use stockroom_db::store::SQLITE_MAGIC;
use stockroom_db::Store;

use crate::log_failure;
use crate::products::insert_record;

/// Artifact format for [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raw SQLite database image.
    #[default]
    Snapshot,
    /// JSON document with every product.
    Document,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Snapshot => "application/x-sqlite3",
            Self::Document => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Snapshot => "db",
            Self::Document => "json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" | "db" | "sqlite" => Ok(Self::Snapshot),
            "document" | "json" => Ok(Self::Document),
            other => Err(Error::validation(format!("unknown export format: {}", other))),
        }
    }
}

/// A downloadable export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// `inventory-export-<YYYY-MM-DD>.<ext>`
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// JSON document written by a `Document` export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub products: Vec<Product>,
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    products: Vec<ProductInput>,
}

/// What an import replaced the catalog with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub format: ExportFormat,
    /// Products in the store after the import.
    pub products: usize,
    /// Migration work done on an imported snapshot.
    pub schema: Option<SchemaReport>,
}

/// Export the catalog in `format`, naming the artifact after `now`.
pub fn export(store: &Store, format: ExportFormat, now: DateTime<Utc>) -> Result<ExportArtifact> {
    log_failure("export catalog", export_inner(store, format, now))
}

fn export_inner(store: &Store, format: ExportFormat, now: DateTime<Utc>) -> Result<ExportArtifact> {
    let bytes = match format {
        ExportFormat::Snapshot => store.snapshot()?,
        ExportFormat::Document => {
            let conn = store.conn()?;
            let document = ExportDocument {
                products: products::list_products(&conn)?,
                export_date: now,
            };
            serde_json::to_vec_pretty(&document)
                .map_err(|e| Error::serialization(e.to_string()))?
        }
    };

    let artifact = ExportArtifact {
        file_name: format!(
            "inventory-export-{}.{}",
            now.format("%Y-%m-%d"),
            format.extension()
        ),
        content_type: format.content_type(),
        bytes,
    };
    tracing::info!(
        "Exported {} bytes as {} ({})",
        artifact.bytes.len(),
        format,
        artifact.file_name
    );
    Ok(artifact)
}

/// Whether `data` starts with the SQLite file header.
pub fn is_snapshot(data: &[u8]) -> bool {
    data.starts_with(SQLITE_MAGIC)
}

/// Replace the whole catalog with an exported artifact.
///
/// On any error the existing catalog is left as it was.
pub fn import(store: &mut Store, data: &[u8]) -> Result<ImportSummary> {
    log_failure("import catalog", import_inner(store, data))
}

fn import_inner(store: &mut Store, data: &[u8]) -> Result<ImportSummary> {
    if is_snapshot(data) {
        let report = store.restore(data)?;
        let count = {
            let conn = store.conn()?;
            products::list_products(&conn)?.len()
        };
        tracing::info!("Imported database snapshot with {} products", count);
        return Ok(ImportSummary {
            format: ExportFormat::Snapshot,
            products: count,
            schema: Some(report),
        });
    }

    let document: ImportDocument = serde_json::from_slice(data)
        .map_err(|e| Error::validation(format!("invalid import document: {}", e)))?;

    for (index, product) in document.products.iter().enumerate() {
        product
            .validate()
            .map_err(|e| Error::validation(format!("product {} in import: {}", index + 1, e)))?;
    }

    let conn = store.conn()?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    products::delete_all(&tx)?;
    // Documents list newest first; inserting oldest first keeps that order
    // when every row gets the same timestamp.
    for product in document.products.iter().rev() {
        let input = ProductInput {
            image_id: None,
            ..product.clone()
        };
        insert_record(&tx, &input)?;
    }
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    drop(conn);

    store.persist()?;
    tracing::info!("Imported {} products from document", document.products.len());
    Ok(ImportSummary {
        format: ExportFormat::Document,
        products: document.products.len(),
        schema: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("snapshot".parse::<ExportFormat>().unwrap(), ExportFormat::Snapshot);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Document);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_artifact_names() {
        let store = Store::open_memory().unwrap();

        let snapshot = export(&store, ExportFormat::Snapshot, now()).unwrap();
        assert_eq!(snapshot.file_name, "inventory-export-2024-05-17.db");
        assert_eq!(snapshot.content_type, "application/x-sqlite3");
        assert!(is_snapshot(&snapshot.bytes));

        let document = export(&store, ExportFormat::Document, now()).unwrap();
        assert_eq!(document.file_name, "inventory-export-2024-05-17.json");
        assert_eq!(document.content_type, "application/json");

        let parsed: serde_json::Value = serde_json::from_slice(&document.bytes).unwrap();
        assert_eq!(parsed["products"], serde_json::json!([]));
        assert_eq!(parsed["exportDate"], "2024-05-17T09:30:00Z");
    }

    #[test]
    fn test_document_round_trip_keeps_listing_order() {
        let source = Store::open_memory().unwrap();
        {
            let conn = source.conn().unwrap();
            for name in ["A", "B", "C"] {
                let input = ProductInput {
                    product_name: name.to_string(),
                    company_name: "Acme".to_string(),
                    product_quality: "A".to_string(),
                    quantity_bundle: 1,
                    purchase_price: 1.0,
                    wholesale_price: 1.0,
                    retail_price: 1.0,
                    ..Default::default()
                };
                insert_record(&conn, &input).unwrap();
            }
        }
        let names = |store: &Store| -> Vec<String> {
            let conn = store.conn().unwrap();
            products::list_products(&conn)
                .unwrap()
                .into_iter()
                .map(|p| p.product_name)
                .collect()
        };
        let before = names(&source);
        assert_eq!(before, vec!["C", "B", "A"]);

        let document = export(&source, ExportFormat::Document, now()).unwrap();
        let mut target = Store::open_memory().unwrap();
        import(&mut target, &document.bytes).unwrap();

        assert_eq!(names(&target), before);
    }

    #[test]
    fn test_garbage_import_is_rejected() {
        let mut store = Store::open_memory().unwrap();
        let err = import(&mut store, b"not json at all").unwrap_err();
        assert!(err.is_validation());
    }
}
