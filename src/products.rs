//! Product repository.
//!
//! Validates input, runs each write in one transaction and persists the
//! store afterwards. Failures from the store are logged here before they are
//! returned.

use rusqlite::Connection;
use stockroom_common::{Error, ProductId, Result};
use stockroom_db::models::{Product, ProductInput, Stats};
use stockroom_db::queries::{dynamic_fields, images, products, stats};
use stockroom_db::Store;

use crate::log_failure;

/// Insert a product row and its dynamic fields on an open connection.
///
/// Dynamic fields that fail to insert are skipped.
pub(crate) fn insert_record(conn: &Connection, input: &ProductInput) -> Result<ProductId> {
    let id = products::insert_product(conn, input)?;
    let inserted = dynamic_fields::insert_fields(conn, id, &input.dynamic_fields);
    tracing::debug!("Inserted product {} with {} dynamic fields", id, inserted);
    Ok(id)
}

/// CRUD, listing and search over products.
pub struct ProductRepository<'a> {
    store: &'a Store,
}

impl<'a> ProductRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Create a product. Returns the stored record with its id.
    pub fn add_product(&self, input: &ProductInput) -> Result<Product> {
        input.validate()?;
        log_failure("add product", self.add_validated(input))
    }

    fn add_validated(&self, input: &ProductInput) -> Result<Product> {
        let conn = self.store.conn()?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let id = insert_record(&tx, input)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        let product = products::get_product(&conn, id)?
            .ok_or_else(|| Error::internal(format!("product {} vanished after insert", id)))?;
        drop(conn);

        self.store.persist()?;
        tracing::info!("Added product {}: {}", id, product.product_name);
        Ok(product)
    }

    /// Replace a product's fields and dynamic fields.
    ///
    /// The existing image reference is kept when `input` has none.
    pub fn update_product(&self, id: ProductId, input: &ProductInput) -> Result<Product> {
        input.validate()?;
        log_failure("update product", self.update_validated(id, input))
    }

    fn update_validated(&self, id: ProductId, input: &ProductInput) -> Result<Product> {
        let conn = self.store.conn()?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        if !products::update_product(&tx, id, input)? {
            return Err(Error::not_found(format!("product {}", id)));
        }
        dynamic_fields::replace_fields(&tx, id, &input.dynamic_fields)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        let product = products::get_product(&conn, id)?
            .ok_or_else(|| Error::internal(format!("product {} vanished after update", id)))?;
        drop(conn);

        self.store.persist()?;
        tracing::info!("Updated product {}", id);
        Ok(product)
    }

    /// Delete a product with its image and dynamic fields.
    ///
    /// Returns `false` when no product has this id.
    pub fn delete_product(&self, id: ProductId) -> Result<bool> {
        log_failure("delete product", self.delete_inner(id))
    }

    fn delete_inner(&self, id: ProductId) -> Result<bool> {
        let conn = self.store.conn()?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        images::delete_for_product(&tx, id)?;
        dynamic_fields::delete_for_product(&tx, id)?;
        let deleted = products::delete_product(&tx, id)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        drop(conn);

        if deleted {
            self.store.persist()?;
            tracing::info!("Deleted product {}", id);
        }
        Ok(deleted)
    }

    fn read<T>(&self, action: &str, query: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        log_failure(action, self.store.conn().and_then(|conn| query(&*conn)))
    }

    pub fn get_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        self.read("load product", |conn| products::get_product(conn, id))
    }

    /// All products, newest first.
    pub fn get_all(&self) -> Result<Vec<Product>> {
        self.read("list products", products::list_products)
    }

    /// Case-insensitive substring search over name, company and quality.
    pub fn search(&self, term: &str) -> Result<Vec<Product>> {
        self.read("search products", |conn| products::search_products(conn, term))
    }

    pub fn get_stats(&self) -> Result<Stats> {
        self.read("compute stats", stats::get_stats)
    }
}
