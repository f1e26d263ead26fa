//! Detection and rebuild of product tables written before schema versioning.
//!
//! Old generations stored products under different column names (`name`,
//! `category`, `mrp`, `dp`, ...). The rebuild copies every row into a shadow
//! table with the current layout, mapping each target column from whichever
//! legacy columns are present and substituting a fixed default otherwise.

use rusqlite::Connection;

use super::MigrationError;

/// Column names that only exist in superseded product layouts.
pub const LEGACY_COLUMNS: &[&str] = &[
    "name",
    "category",
    "gst",
    "tax",
    "master",
    "inner",
    "bundle",
    "mrp",
    "dp",
    "unit_price",
    "margin_price",
];

/// Columns a `products` table must have to be used without a rebuild.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "product_name",
    "company_name",
    "product_quality",
    "quantity_bundle",
    "purchase_price",
    "wholesale_price",
    "retail_price",
    "created_at",
];

const SHADOW_TABLE_SQL: &str = "CREATE TABLE products_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_name TEXT NOT NULL,
    company_name TEXT NOT NULL,
    product_quality TEXT NOT NULL,
    quantity_bundle INTEGER NOT NULL,
    purchase_price REAL NOT NULL,
    wholesale_price REAL NOT NULL,
    retail_price REAL NOT NULL,
    image_id TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

/// Shape of the live `products` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// No `products` table.
    Empty,
    /// Every required column and no legacy column.
    Current,
    /// A legacy column is present or a required one is missing; carries the
    /// full live column list.
    Legacy(Vec<String>),
}

/// What a legacy rebuild did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRebuild {
    /// Columns of the table that was replaced.
    pub legacy_columns: Vec<String>,
    /// Rows carried over, or `None` when the copy failed and the table was
    /// recreated empty.
    pub rows_copied: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    Integer,
    Real,
    Timestamp,
    Raw,
}

struct ColumnMapping {
    target: &'static str,
    candidates: &'static [&'static str],
    kind: Kind,
    default: &'static str,
}

/// Target columns in insert order. Defaults are carried over unchanged from
/// the previous generation's migration.
const PRODUCT_MAPPINGS: &[ColumnMapping] = &[
    ColumnMapping {
        target: "product_name",
        candidates: &["product_name", "name"],
        kind: Kind::Text,
        default: "'Unknown Product'",
    },
    ColumnMapping {
        target: "company_name",
        candidates: &["company_name", "company", "category"],
        kind: Kind::Text,
        default: "'Unknown Company'",
    },
    ColumnMapping {
        target: "product_quality",
        candidates: &["product_quality", "quality"],
        kind: Kind::Text,
        default: "'Standard'",
    },
    ColumnMapping {
        target: "quantity_bundle",
        candidates: &["quantity_bundle", "quantity", "bundle", "inner", "master"],
        kind: Kind::Integer,
        default: "1",
    },
    ColumnMapping {
        target: "purchase_price",
        candidates: &["purchase_price", "unit_price"],
        kind: Kind::Real,
        default: "0",
    },
    ColumnMapping {
        target: "wholesale_price",
        candidates: &["wholesale_price", "dp", "margin_price"],
        kind: Kind::Real,
        default: "0",
    },
    ColumnMapping {
        target: "retail_price",
        candidates: &["retail_price", "mrp"],
        kind: Kind::Real,
        default: "0",
    },
    ColumnMapping {
        target: "image_id",
        candidates: &["image_id"],
        kind: Kind::Raw,
        default: "NULL",
    },
    ColumnMapping {
        target: "created_at",
        candidates: &["created_at"],
        kind: Kind::Timestamp,
        default: "CURRENT_TIMESTAMP",
    },
    ColumnMapping {
        target: "updated_at",
        candidates: &[],
        kind: Kind::Timestamp,
        default: "CURRENT_TIMESTAMP",
    },
];

/// List the columns of a table, empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Classify the live `products` table by its column names.
pub fn detect_layout(conn: &Connection) -> rusqlite::Result<Layout> {
    let columns = table_columns(conn, "products")?;

    if columns.is_empty() {
        return Ok(Layout::Empty);
    }

    let has_legacy = columns
        .iter()
        .any(|c| LEGACY_COLUMNS.contains(&c.to_ascii_lowercase().as_str()));
    let has_required = REQUIRED_COLUMNS.iter().all(|r| has_column(&columns, r));

    if has_legacy || !has_required {
        Ok(Layout::Legacy(columns))
    } else {
        Ok(Layout::Current)
    }
}

fn has_column(columns: &[String], name: &str) -> bool {
    columns.iter().any(|c| c.eq_ignore_ascii_case(name))
}

fn candidate_expressions(mapping: &ColumnMapping, columns: &[String], categories: bool) -> Vec<String> {
    let mut exprs = Vec::new();

    for candidate in mapping.candidates {
        if !has_column(columns, candidate) {
            continue;
        }

        let col = format!("legacy.\"{}\"", candidate);

        // Normalized layouts stored a category id; resolve it to the name.
        if *candidate == "category" && categories {
            exprs.push(format!(
                "(SELECT NULLIF(TRIM(c.name), '') FROM categories c WHERE c.id = {col})"
            ));
        }

        exprs.push(match mapping.kind {
            Kind::Text => format!("NULLIF(TRIM(CAST({col} AS TEXT)), '')"),
            Kind::Integer => format!("CAST({col} AS INTEGER)"),
            Kind::Real => format!("CAST({col} AS REAL)"),
            Kind::Timestamp => format!("datetime({col})"),
            Kind::Raw => col,
        });
    }

    exprs
}

/// Build the `INSERT INTO products_new ... SELECT ... FROM products` statement
/// for the given live column set.
pub(crate) fn build_copy_sql(columns: &[String], categories: bool) -> String {
    let mut targets = Vec::new();
    let mut sources = Vec::new();

    if has_column(columns, "id") {
        targets.push("id".to_string());
        sources.push("legacy.\"id\"".to_string());
    }

    for mapping in PRODUCT_MAPPINGS {
        let exprs = candidate_expressions(mapping, columns, categories);
        let source = if exprs.is_empty() {
            mapping.default.to_string()
        } else {
            format!("COALESCE({}, {})", exprs.join(", "), mapping.default)
        };

        targets.push(mapping.target.to_string());
        sources.push(source);
    }

    format!(
        "INSERT INTO products_new ({}) SELECT {} FROM products AS legacy",
        targets.join(", "),
        sources.join(", ")
    )
}

fn categories_lookup_available(conn: &Connection) -> rusqlite::Result<bool> {
    let columns = table_columns(conn, "categories")?;
    Ok(has_column(&columns, "id") && has_column(&columns, "name"))
}

fn unmapped_columns(columns: &[String]) -> Vec<&str> {
    columns
        .iter()
        .filter(|c| {
            !c.eq_ignore_ascii_case("id")
                && !PRODUCT_MAPPINGS
                    .iter()
                    .any(|m| m.candidates.iter().any(|cand| c.eq_ignore_ascii_case(cand)))
        })
        .map(String::as_str)
        .collect()
}

/// Replace a legacy `products` table with one in the current layout.
///
/// Runs in a single transaction with foreign keys switched off, so dropping
/// the old table does not cascade into images or dynamic fields. When the row
/// copy fails the new table is left empty; when creating, dropping or
/// renaming fails the transaction rolls back and the legacy table survives.
pub fn rebuild_products(conn: &Connection, columns: &[String]) -> Result<LegacyRebuild, MigrationError> {
    conn.execute_batch("PRAGMA foreign_keys = OFF")?;

    let result = rebuild_in_transaction(conn, columns);

    if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON") {
        tracing::warn!("Failed to re-enable foreign keys after legacy rebuild: {}", e);
    }

    result
}

fn rebuild_in_transaction(conn: &Connection, columns: &[String]) -> Result<LegacyRebuild, MigrationError> {
    let fail = |e: rusqlite::Error| MigrationError::LegacyRebuild(e.to_string());

    let skipped = unmapped_columns(columns);
    if !skipped.is_empty() {
        tracing::warn!("Legacy columns without a current equivalent: {}", skipped.join(", "));
    }

    let tx = conn.unchecked_transaction().map_err(fail)?;

    tx.execute_batch("DROP TABLE IF EXISTS products_new").map_err(fail)?;
    tx.execute_batch(SHADOW_TABLE_SQL).map_err(fail)?;

    let categories = categories_lookup_available(&tx).unwrap_or(false);
    let copy_sql = build_copy_sql(columns, categories);

    let rows_copied = match tx.execute(&copy_sql, []) {
        Ok(rows) => {
            tracing::info!("Copied {} products into the current layout", rows);
            Some(rows)
        }
        Err(e) => {
            tracing::warn!("Could not copy legacy products, starting with an empty table: {}", e);
            None
        }
    };

    tx.execute_batch("DROP TABLE products").map_err(fail)?;
    tx.execute_batch("ALTER TABLE products_new RENAME TO products")
        .map_err(fail)?;

    tx.commit().map_err(fail)?;

    Ok(LegacyRebuild {
        legacy_columns: columns.to_vec(),
        rows_copied,
    })
}
