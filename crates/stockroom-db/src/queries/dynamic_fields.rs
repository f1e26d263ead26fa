//! Dynamic field queries.

use rusqlite::Connection;
use stockroom_common::{Error, ProductId, Result};

use crate::models::{DynamicField, DynamicFieldInput};

fn parse_field_row(row: &rusqlite::Row) -> rusqlite::Result<DynamicField> {
    Ok(DynamicField {
        id: row.get(0)?,
        field_name: row.get(1)?,
        field_value: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        field_type: row.get(3)?,
        field_order: row.get(4)?,
    })
}

/// Insert dynamic fields for a product.
///
/// `field_order` is the 1-based position in `fields`. Entries without a name
/// or value are skipped but still take their position. A row that fails to
/// insert is logged and skipped so the remaining fields are kept.
///
/// Returns the number of rows inserted.
pub fn insert_fields(conn: &Connection, product_id: ProductId, fields: &[DynamicFieldInput]) -> usize {
    let mut inserted = 0;

    for (index, field) in fields.iter().enumerate() {
        let Some((name, value, field_type)) = field.normalized() else {
            continue;
        };
        let order = index as i64 + 1;

        let result = conn.execute(
            "INSERT INTO dynamic_fields (product_id, field_name, field_value, field_type, field_order)
             VALUES (:product_id, :field_name, :field_value, :field_type, :field_order)",
            rusqlite::named_params! {
                ":product_id": product_id.get(),
                ":field_name": &name,
                ":field_value": &value,
                ":field_type": &field_type,
                ":field_order": order,
            },
        );

        match result {
            Ok(_) => inserted += 1,
            Err(e) => tracing::warn!(
                "Skipping dynamic field {:?} on product {}: {}",
                name,
                product_id,
                e
            ),
        }
    }

    inserted
}

/// Delete every dynamic field of a product.
pub fn delete_for_product(conn: &Connection, product_id: ProductId) -> Result<usize> {
    conn.execute(
        "DELETE FROM dynamic_fields WHERE product_id = :product_id",
        rusqlite::named_params! { ":product_id": product_id.get() },
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Replace a product's dynamic fields with `fields`.
///
/// Returns the number of rows inserted.
pub fn replace_fields(
    conn: &Connection,
    product_id: ProductId,
    fields: &[DynamicFieldInput],
) -> Result<usize> {
    delete_for_product(conn, product_id)?;
    Ok(insert_fields(conn, product_id, fields))
}

/// Dynamic fields of a product in `field_order`.
pub fn list_for_product(conn: &Connection, product_id: ProductId) -> Result<Vec<DynamicField>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, field_name, field_value, field_type, field_order
             FROM dynamic_fields
             WHERE product_id = :product_id
             ORDER BY field_order, id",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let fields = stmt
        .query_map(
            rusqlite::named_params! { ":product_id": product_id.get() },
            parse_field_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use serde_json::json;

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

    #[test]
    fn test_insert_assigns_one_based_order() {
        let (conn, id) = setup();
        let fields = vec![
            DynamicFieldInput::text("Colour", "Red"),
            DynamicFieldInput::text("Size", "XL").with_type("select"),
        ];

        assert_eq!(insert_fields(&conn, id, &fields), 2);

        let stored = list_for_product(&conn, id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].field_name, "Colour");
        assert_eq!(stored[0].field_order, 1);
        assert_eq!(stored[0].field_type, "text");
        assert_eq!(stored[1].field_order, 2);
        assert_eq!(stored[1].field_type, "select");
    }

    #[test]
    fn test_skipped_fields_keep_their_position() {
        let (conn, id) = setup();
        let no_value: DynamicFieldInput = serde_json::from_value(json!({"name": "Notes"})).unwrap();
        let fields = vec![
            DynamicFieldInput::text("", "orphan"),
            no_value,
            DynamicFieldInput::text("Origin", "Spain"),
        ];

        assert_eq!(insert_fields(&conn, id, &fields), 1);

        let stored = list_for_product(&conn, id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].field_name, "Origin");
        assert_eq!(stored[0].field_order, 3);
    }

    #[test]
    fn test_failed_insert_is_skipped() {
        let (conn, _) = setup();
        // No such product: the foreign key rejects every row.
        let inserted = insert_fields(
            &conn,
            ProductId::from(999),
            &[DynamicFieldInput::text("Colour", "Red")],
        );
        assert_eq!(inserted, 0);
    }

    #[test]
    fn test_replace_leaves_no_residue() {
        let (conn, id) = setup();
        insert_fields(
            &conn,
            id,
            &[
                DynamicFieldInput::text("Colour", "Red"),
                DynamicFieldInput::text("Size", "XL"),
            ],
        );

        let inserted = replace_fields(&conn, id, &[DynamicFieldInput::text("Weight", "2kg")]).unwrap();
        assert_eq!(inserted, 1);

        let stored = list_for_product(&conn, id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].field_name, "Weight");
        assert_eq!(stored[0].field_order, 1);

        replace_fields(&conn, id, &[]).unwrap();
        assert!(list_for_product(&conn, id).unwrap().is_empty());
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let (conn, id) = setup();
        let fields: Vec<DynamicFieldInput> = serde_json::from_value(json!([
            {"name": "Count", "value": 12, "type": "number"},
            {"name": "Fragile", "value": true, "type": "boolean"}
        ]))
        .unwrap();
        insert_fields(&conn, id, &fields);

        let values: Vec<String> = list_for_product(&conn, id)
            .unwrap()
            .into_iter()
            .map(|f| f.field_value)
            .collect();
        assert_eq!(values, vec!["12", "true"]);
    }
}
