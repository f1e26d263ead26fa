//! Catalog summary queries.

use rusqlite::Connection;
use stockroom_common::{Error, Result};

use crate::models::Stats;

/// Compute catalog statistics.
///
/// Every aggregate over zero rows is zero. The average retail price is
/// rounded to the nearest integer with halves going up, so -2.5 becomes -2.
pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (total_products, total_companies, average): (i64, i64, Option<f64>) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(DISTINCT company_name), AVG(retail_price) FROM products",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let total_images = crate::queries::images::count_images(conn)?;

    Ok(Stats {
        total_products,
        total_companies,
        average_retail_price: average.map(|avg| (avg + 0.5).floor() as i64).unwrap_or(0),
        total_images,
    })
}
