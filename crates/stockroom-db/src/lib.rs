//! Stockroom-DB: Database schema, migrations, storage backends and queries
//!
//! This crate provides the persistence layer for stockroom using SQLite with
//! rusqlite, either held in memory and persisted as a blob or opened from a
//! file through an r2d2 connection pool.
//!
//! # Modules
//!
//! - `blob` - Stores for the serialized database image
//! - `migrations` - Schema versioning, legacy layout rebuild and repair
//! - `models` - Rust models matching the database schema
//! - `queries` - Database query operations
//! - `store` - The store handle shared by repositories
//!
//! # Example
//!
//! ```
//! use stockroom_db::models::ProductInput;
//! use stockroom_db::queries::products;
//! use stockroom_db::store::Store;
//!
//! let store = Store::open_memory().unwrap();
//! let conn = store.conn().unwrap();
//!
//! let input = ProductInput {
//!     product_name: "Widget".into(),
//!     company_name: "Acme".into(),
//!     product_quality: "A".into(),
//!     quantity_bundle: 10,
//!     purchase_price: 5.0,
//!     wholesale_price: 7.0,
//!     retail_price: 9.99,
//!     ..Default::default()
//! };
//! let id = products::insert_product(&conn, &input).unwrap();
//! assert_eq!(products::get_product(&conn, id).unwrap().unwrap().product_name, "Widget");
//! ```

pub mod blob;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use store::{StorageMode, Store, StoreConn};
