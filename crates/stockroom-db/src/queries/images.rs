//! Image database queries.
//!
//! Each product has at most one row in `images`; writers delete the prior
//! row before inserting a replacement.

use rusqlite::Connection;
use stockroom_common::{Error, ImageId, ProductId, Result};

use crate::models::{Image, NewImage};
use crate::queries::products::timestamp_column;

const IMAGE_COLUMNS: &str = "image_id, product_id, file_name, file_path, base64_data,
     original_name, file_size, mime_type, created_at";

/// Parse an image from a database row.
///
/// Expects columns in the order of `IMAGE_COLUMNS`.
fn parse_image_row(row: &rusqlite::Row) -> rusqlite::Result<Image> {
    Ok(Image {
        image_id: ImageId::from(row.get::<_, String>(0)?),
        product_id: ProductId::from(row.get::<_, i64>(1)?),
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        base64_data: row.get(4)?,
        original_name: row.get(5)?,
        file_size: row.get(6)?,
        mime_type: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

fn get_one(conn: &Connection, filter: &str, params: &[(&str, &dyn rusqlite::ToSql)]) -> Result<Option<Image>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM images WHERE {}", IMAGE_COLUMNS, filter),
        params,
        parse_image_row,
    );

    match result {
        Ok(image) => Ok(Some(image)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert a new image record.
///
/// # Arguments
///
/// * `conn` - Database connection
/// * `image` - Image to insert
///
/// # Returns
///
/// * `Ok(())` - The row was inserted
/// * `Err(Error)` - If a database error occurs, including a second image for
///   the same product
pub fn insert_image(conn: &Connection, image: &NewImage) -> Result<()> {
    conn.execute(
        "INSERT INTO images (image_id, product_id, file_name, file_path, base64_data,
                             original_name, file_size, mime_type)
         VALUES (:image_id, :product_id, :file_name, :file_path, :base64_data,
                 :original_name, :file_size, :mime_type)",
        rusqlite::named_params! {
            ":image_id": image.image_id.as_str(),
            ":product_id": image.product_id.get(),
            ":file_name": &image.file_name,
            ":file_path": &image.file_path,
            ":base64_data": &image.base64_data,
            ":original_name": &image.original_name,
            ":file_size": image.file_size,
            ":mime_type": &image.mime_type,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get the image of a product.
///
/// # Returns
///
/// * `Ok(Some(Image))` - The image if the product has one
/// * `Ok(None)` - If it has none
/// * `Err(Error)` - If a database error occurs
pub fn get_for_product(conn: &Connection, product_id: ProductId) -> Result<Option<Image>> {
    get_one(
        conn,
        "product_id = :product_id ORDER BY id DESC LIMIT 1",
        rusqlite::named_params! { ":product_id": product_id.get() },
    )
}

/// Get an image by its image id.
pub fn get_by_image_id(conn: &Connection, image_id: &ImageId) -> Result<Option<Image>> {
    get_one(
        conn,
        "image_id = :image_id",
        rusqlite::named_params! { ":image_id": image_id.as_str() },
    )
}

/// Delete the images of a product.
///
/// Returns the number of rows removed.
pub fn delete_for_product(conn: &Connection, product_id: ProductId) -> Result<usize> {
    conn.execute(
        "DELETE FROM images WHERE product_id = :product_id",
        rusqlite::named_params! { ":product_id": product_id.get() },
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Number of stored images.
pub fn count_images(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> (Connection, ProductId) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO products (product_name, company_name, product_quality, quantity_bundle,
                                   purchase_price, wholesale_price, retail_price)
             VALUES ('Widget', 'Acme', 'A', 1, 1, 1, 1)",
            [],
        )
        .unwrap();
        let id = ProductId::from(conn.last_insert_rowid());
        (conn, id)
    }

    fn new_image(product_id: ProductId, image_id: &str) -> NewImage {
        NewImage {
            image_id: ImageId::from(image_id),
            product_id,
            file_name: format!("product_{}_{}.png", product_id, image_id),
            file_path: format!("sale-data/product_{}_{}.png", product_id, image_id),
            base64_data: "data:image/jpeg;base64,AAAA".to_string(),
            original_name: "photo.png".to_string(),
            file_size: 2048,
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_image() {
        let (conn, product_id) = setup();
        insert_image(&conn, &new_image(product_id, "img_a")).unwrap();

        let by_product = get_for_product(&conn, product_id).unwrap().unwrap();
        assert_eq!(by_product.image_id.as_str(), "img_a");
        assert_eq!(by_product.file_size, 2048);

        let by_id = get_by_image_id(&conn, &ImageId::from("img_a")).unwrap().unwrap();
        assert_eq!(by_id, by_product);

        assert!(get_by_image_id(&conn, &ImageId::from("img_none")).unwrap().is_none());
    }

    #[test]
    fn test_second_image_needs_prior_delete() {
        let (conn, product_id) = setup();
        insert_image(&conn, &new_image(product_id, "img_a")).unwrap();
        assert!(insert_image(&conn, &new_image(product_id, "img_b")).is_err());

        assert_eq!(delete_for_product(&conn, product_id).unwrap(), 1);
        insert_image(&conn, &new_image(product_id, "img_b")).unwrap();
        assert_eq!(count_images(&conn).unwrap(), 1);
    }

    #[test]
    fn test_delete_for_product_is_idempotent() {
        let (conn, product_id) = setup();
        assert_eq!(delete_for_product(&conn, product_id).unwrap(), 0);
        assert!(get_for_product(&conn, product_id).unwrap().is_none());
    }

    #[test]
    fn test_images_cascade_with_product() {
        let (conn, product_id) = setup();
        insert_image(&conn, &new_image(product_id, "img_a")).unwrap();

        conn.execute("DELETE FROM products WHERE id = ?", [product_id.get()])
            .unwrap();
        assert_eq!(count_images(&conn).unwrap(), 0);
    }
}
