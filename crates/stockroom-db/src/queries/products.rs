//! Product database queries.
//!
//! Row-level operations on `products`. Dynamic fields are attached by the
//! list and get helpers so that callers always see complete records.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use stockroom_common::{Error, ImageId, ProductId, Result};

use crate::models::{parse_timestamp, Product, ProductInput};
use crate::queries::dynamic_fields;

const PRODUCT_COLUMNS: &str = "id, product_name, company_name, product_quality, quantity_bundle,
     purchase_price, wholesale_price, retail_price, image_id, created_at, updated_at";

/// Read a timestamp column written by `CURRENT_TIMESTAMP`.
///
/// `NULL` maps to the Unix epoch; text that is not a timestamp is a
/// conversion error.
pub(crate) fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(DateTime::<Utc>::UNIX_EPOCH),
        Some(text) => parse_timestamp(&text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("invalid timestamp {:?}", text).into(),
            )
        }),
    }
}

/// Parse a product from a database row, without dynamic fields.
///
/// Expects columns in the order of `PRODUCT_COLUMNS`.
fn parse_product_row(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: ProductId::from(row.get::<_, i64>(0)?),
        product_name: row.get(1)?,
        company_name: row.get(2)?,
        product_quality: row.get(3)?,
        quantity_bundle: row.get(4)?,
        purchase_price: row.get(5)?,
        wholesale_price: row.get(6)?,
        retail_price: row.get(7)?,
        image_id: row.get::<_, Option<String>>(8)?.map(ImageId::from),
        created_at: timestamp_column(row, 9)?,
        updated_at: timestamp_column(row, 10)?,
        dynamic_fields: Vec::new(),
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn attach_fields(conn: &Connection, mut products: Vec<Product>) -> Result<Vec<Product>> {
    for product in &mut products {
        product.dynamic_fields = dynamic_fields::list_for_product(conn, product.id)?;
    }
    Ok(products)
}

/// Insert a product row.
///
/// Timestamps are assigned by the store. Dynamic fields are not touched.
///
/// # Returns
///
/// * `Ok(ProductId)` - The generated id
/// * `Err(Error)` - If a database error occurs
pub fn insert_product(conn: &Connection, input: &ProductInput) -> Result<ProductId> {
    conn.execute(
        "INSERT INTO products (product_name, company_name, product_quality, quantity_bundle,
                               purchase_price, wholesale_price, retail_price, image_id)
         VALUES (:product_name, :company_name, :product_quality, :quantity_bundle,
                 :purchase_price, :wholesale_price, :retail_price, :image_id)",
        rusqlite::named_params! {
            ":product_name": &input.product_name,
            ":company_name": &input.company_name,
            ":product_quality": &input.product_quality,
            ":quantity_bundle": input.quantity_bundle,
            ":purchase_price": input.purchase_price,
            ":wholesale_price": input.wholesale_price,
            ":retail_price": input.retail_price,
            ":image_id": input.image_id.as_ref().map(|id| id.as_str()),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ProductId::from(conn.last_insert_rowid()))
}

/// Update the scalar columns of a product and bump `updated_at`.
///
/// `image_id` is only overwritten when the input carries one.
///
/// # Returns
///
/// * `Ok(true)` - If the product existed
/// * `Ok(false)` - If no product has this id
/// * `Err(Error)` - If a database error occurs
pub fn update_product(conn: &Connection, id: ProductId, input: &ProductInput) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE products SET
                product_name = :product_name,
                company_name = :company_name,
                product_quality = :product_quality,
                quantity_bundle = :quantity_bundle,
                purchase_price = :purchase_price,
                wholesale_price = :wholesale_price,
                retail_price = :retail_price,
                image_id = COALESCE(:image_id, image_id),
                updated_at = CURRENT_TIMESTAMP
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.get(),
                ":product_name": &input.product_name,
                ":company_name": &input.company_name,
                ":product_quality": &input.product_quality,
                ":quantity_bundle": input.quantity_bundle,
                ":purchase_price": input.purchase_price,
                ":wholesale_price": input.wholesale_price,
                ":retail_price": input.retail_price,
                ":image_id": input.image_id.as_ref().map(|id| id.as_str()),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(changed > 0)
}

/// Set or clear the product's image reference.
pub fn set_image_ref(conn: &Connection, id: ProductId, image_id: Option<&ImageId>) -> Result<()> {
    conn.execute(
        "UPDATE products SET image_id = :image_id WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.get(),
            ":image_id": image_id.map(|i| i.as_str()),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete a product row. Dependent rows are deleted by the caller.
///
/// # Returns
///
/// * `Ok(true)` - If a product was deleted
/// * `Ok(false)` - If no product has this id
/// * `Err(Error)` - If a database error occurs
pub fn delete_product(conn: &Connection, id: ProductId) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM products WHERE id = :id",
            rusqlite::named_params! { ":id": id.get() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(deleted > 0)
}

/// Remove every product along with its images and dynamic fields.
pub fn delete_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM images;
         DELETE FROM dynamic_fields;
         DELETE FROM products;",
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Whether a product with this id exists.
pub fn exists(conn: &Connection, id: ProductId) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM products WHERE id = :id",
            rusqlite::named_params! { ":id": id.get() },
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count > 0)
}

/// Get a product by id, with its dynamic fields in order.
///
/// # Returns
///
/// * `Ok(Some(Product))` - The product if found
/// * `Ok(None)` - If the product does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_product(conn: &Connection, id: ProductId) -> Result<Option<Product>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM products WHERE id = :id", PRODUCT_COLUMNS),
        rusqlite::named_params! { ":id": id.get() },
        parse_product_row,
    );

    match result {
        Ok(mut product) => {
            product.dynamic_fields = dynamic_fields::list_for_product(conn, product.id)?;
            Ok(Some(product))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all products, newest first.
pub fn list_products(conn: &Connection) -> Result<Vec<Product>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM products ORDER BY created_at DESC, id DESC",
            PRODUCT_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let products = stmt
        .query_map([], parse_product_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    attach_fields(conn, products)
}

/// Case-insensitive substring search over name, company and quality.
///
/// `%`, `_` and `\` in `term` match literally. Ordering matches
/// [`list_products`].
pub fn search_products(conn: &Connection, term: &str) -> Result<Vec<Product>> {
    let pattern = format!("%{}%", escape_like(term));

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM products
             WHERE product_name LIKE :pattern ESCAPE '\\'
                OR company_name LIKE :pattern ESCAPE '\\'
                OR product_quality LIKE :pattern ESCAPE '\\'
             ORDER BY created_at DESC, id DESC",
            PRODUCT_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let products = stmt
        .query_map(
            rusqlite::named_params! { ":pattern": pattern },
            parse_product_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    attach_fields(conn, products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::models::DynamicFieldInput;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn input(name: &str, company: &str) -> ProductInput {
        ProductInput {
            product_name: name.to_string(),
            company_name: company.to_string(),
            product_quality: "A".to_string(),
            quantity_bundle: 10,
            purchase_price: 5.0,
            wholesale_price: 7.0,
            retail_price: 9.99,
            image_id: None,
            dynamic_fields: vec![],
        }
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.product_name.as_str()).collect()
    }

    #[test]
    fn test_insert_and_get_product() {
        let conn = setup();
        let id = insert_product(&conn, &input("Widget", "Acme")).unwrap();

        let product = get_product(&conn, id).unwrap().unwrap();
        assert_eq!(product.id, id);
        assert_eq!(product.product_name, "Widget");
        assert_eq!(product.company_name, "Acme");
        assert_eq!(product.retail_price, 9.99);
        assert_eq!(product.image_id, None);
        assert!(product.created_at > DateTime::<Utc>::UNIX_EPOCH);
        assert!(product.dynamic_fields.is_empty());
    }

    #[test]
    fn test_get_missing_product() {
        let conn = setup();
        assert!(get_product(&conn, ProductId::from(42)).unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_image_ref_when_absent() {
        let conn = setup();
        let mut with_image = input("Widget", "Acme");
        with_image.image_id = Some(ImageId::from("img_1"));
        let id = insert_product(&conn, &with_image).unwrap();

        let mut changed = input("Widget v2", "Acme");
        changed.retail_price = 12.5;
        assert!(update_product(&conn, id, &changed).unwrap());

        let product = get_product(&conn, id).unwrap().unwrap();
        assert_eq!(product.product_name, "Widget v2");
        assert_eq!(product.retail_price, 12.5);
        assert_eq!(product.image_id, Some(ImageId::from("img_1")));

        assert!(!update_product(&conn, ProductId::from(999), &changed).unwrap());
    }

    #[test]
    fn test_set_image_ref() {
        let conn = setup();
        let id = insert_product(&conn, &input("Widget", "Acme")).unwrap();

        set_image_ref(&conn, id, Some(&ImageId::from("img_9"))).unwrap();
        assert_eq!(
            get_product(&conn, id).unwrap().unwrap().image_id,
            Some(ImageId::from("img_9"))
        );

        set_image_ref(&conn, id, None).unwrap();
        assert_eq!(get_product(&conn, id).unwrap().unwrap().image_id, None);
    }

    #[test]
    fn test_delete_product() {
        let conn = setup();
        let id = insert_product(&conn, &input("Widget", "Acme")).unwrap();

        assert!(delete_product(&conn, id).unwrap());
        assert!(!delete_product(&conn, id).unwrap());
        assert!(!exists(&conn, id).unwrap());
    }

    #[test]
    fn test_list_orders_newest_first() {
        let conn = setup();
        insert_product(&conn, &input("First", "Acme")).unwrap();
        insert_product(&conn, &input("Second", "Acme")).unwrap();
        conn.execute(
            "INSERT INTO products (product_name, company_name, product_quality, quantity_bundle,
                                   purchase_price, wholesale_price, retail_price, created_at)
             VALUES ('Ancient', 'Acme', 'A', 1, 1, 1, 1, '2001-01-01 00:00:00')",
            [],
        )
        .unwrap();

        let products = list_products(&conn).unwrap();
        assert_eq!(names(&products), vec!["Second", "First", "Ancient"]);
    }

    #[test]
    fn test_list_attaches_dynamic_fields() {
        let conn = setup();
        let id = insert_product(&conn, &input("Widget", "Acme")).unwrap();
        dynamic_fields::insert_fields(&conn, id, &[DynamicFieldInput::text("Colour", "Red")]);

        let products = list_products(&conn).unwrap();
        assert_eq!(products[0].dynamic_fields.len(), 1);
        assert_eq!(products[0].dynamic_fields[0].field_value, "Red");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let conn = setup();
        insert_product(&conn, &input("Widget", "Acme")).unwrap();
        insert_product(&conn, &input("Gadget", "Globex")).unwrap();

        assert_eq!(names(&search_products(&conn, "acme").unwrap()), vec!["Widget"]);
        assert_eq!(names(&search_products(&conn, "DGET").unwrap()), vec!["Gadget", "Widget"]);
        assert!(search_products(&conn, "zzz").unwrap().is_empty());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let conn = setup();
        insert_product(&conn, &input("100% Cotton", "Acme")).unwrap();
        insert_product(&conn, &input("1000 Cotton", "Acme")).unwrap();
        insert_product(&conn, &input("snake_case", "Acme")).unwrap();
        insert_product(&conn, &input("snakeXcase", "Acme")).unwrap();

        assert_eq!(names(&search_products(&conn, "100%").unwrap()), vec!["100% Cotton"]);
        assert_eq!(names(&search_products(&conn, "e_c").unwrap()), vec!["snake_case"]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_delete_all() {
        let conn = setup();
        let id = insert_product(&conn, &input("Widget", "Acme")).unwrap();
        dynamic_fields::insert_fields(&conn, id, &[DynamicFieldInput::text("Colour", "Red")]);

        delete_all(&conn).unwrap();
        assert!(list_products(&conn).unwrap().is_empty());
        let fields: i64 = conn
            .query_row("SELECT COUNT(*) FROM dynamic_fields", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fields, 0);
    }
}
