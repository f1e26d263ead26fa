//! Rust models matching the database schema.
//!
//! Stored records (`Product`, `DynamicField`, `Image`) mirror table rows.
//! Input types (`ProductInput`, `DynamicFieldInput`, `NewImage`) carry what a
//! caller supplies before the store assigns ids and timestamps.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_common::{Error, ImageId, ProductId, Result};

/// Field type recorded when the caller leaves it unset.
pub const DEFAULT_FIELD_TYPE: &str = "text";

/// Product record with its dynamic fields attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub product_name: String,
    pub company_name: String,
    pub product_quality: String,
    pub quantity_bundle: i64,
    pub purchase_price: f64,
    pub wholesale_price: f64,
    pub retail_price: f64,
    pub image_id: Option<ImageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "dynamicFields", default)]
    pub dynamic_fields: Vec<DynamicField>,
}

/// User-defined attribute stored against a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicField {
    pub id: i64,
    pub field_name: String,
    pub field_value: String,
    pub field_type: String,
    pub field_order: i64,
}

/// Product data supplied on create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductInput {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub product_quality: String,
    pub quantity_bundle: i64,
    pub purchase_price: f64,
    pub wholesale_price: f64,
    pub retail_price: f64,
    #[serde(default)]
    pub image_id: Option<ImageId>,
    #[serde(rename = "dynamicFields", default)]
    pub dynamic_fields: Vec<DynamicFieldInput>,
}

impl ProductInput {
    /// Check required fields before anything is written.
    ///
    /// Text fields must contain something other than whitespace and prices
    /// must be finite.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("product_name", &self.product_name),
            ("company_name", &self.company_name),
            ("product_quality", &self.product_quality),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "required fields are missing: {}",
                missing.join(", ")
            )));
        }

        let prices = [
            ("purchase_price", self.purchase_price),
            ("wholesale_price", self.wholesale_price),
            ("retail_price", self.retail_price),
        ];
        if let Some((name, value)) = prices.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::validation(format!(
                "{name} must be a finite number, got {value}"
            )));
        }

        Ok(())
    }
}

/// A dynamic field as supplied by the caller.
///
/// Accepts both the input spelling (`name`/`value`/`type`) and the stored
/// spelling (`field_name`/`field_value`/`field_type`), so exported documents
/// can be imported again.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DynamicFieldInput {
    #[serde(default, alias = "field_name")]
    pub name: String,
    #[serde(default, alias = "field_value")]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "type", default, alias = "field_type")]
    pub field_type: Option<String>,
}

impl DynamicFieldInput {
    /// A text field with a string value.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(serde_json::Value::String(value.into())),
            field_type: None,
        }
    }

    /// Set the field type tag.
    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    /// Trimmed name, stringified value and type tag, or `None` when the field
    /// has no usable name or no value and should be skipped.
    pub fn normalized(&self) -> Option<(String, String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }

        let value = match self.value.as_ref()? {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let field_type = self
            .field_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FIELD_TYPE)
            .to_string();

        Some((name.to_string(), value, field_type))
    }
}

/// Stored product image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub image_id: ImageId,
    pub product_id: ProductId,
    pub file_name: String,
    pub file_path: String,
    /// Encoded thumbnail as a `data:` URL.
    pub base64_data: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Image row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub image_id: ImageId,
    pub product_id: ProductId,
    pub file_name: String,
    pub file_path: String,
    pub base64_data: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// Catalog summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total_products: i64,
    /// Distinct `company_name` values.
    pub total_companies: i64,
    /// Mean retail price rounded to the nearest whole unit.
    pub average_retail_price: i64,
    pub total_images: i64,
}

/// Parse a timestamp as written by SQLite's `CURRENT_TIMESTAMP` or as RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget() -> ProductInput {
        ProductInput {
            product_name: "Widget".to_string(),
            company_name: "Acme".to_string(),
            product_quality: "A".to_string(),
            quantity_bundle: 10,
            purchase_price: 5.0,
            wholesale_price: 7.0,
            retail_price: 9.99,
            image_id: None,
            dynamic_fields: vec![],
        }
    }

    #[test]
    fn test_validate_accepts_complete_input() {
        assert!(widget().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_text() {
        let mut input = widget();
        input.company_name = "   ".to_string();
        input.product_quality = String::new();

        let err = input.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("company_name, product_quality"));
    }

    #[test]
    fn test_validate_rejects_non_finite_prices() {
        let mut input = widget();
        input.wholesale_price = f64::NAN;
        assert!(input.validate().unwrap_err().to_string().contains("wholesale_price"));

        let mut input = widget();
        input.retail_price = f64::INFINITY;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_dynamic_field_normalization() {
        let field = DynamicFieldInput::text("  Colour ", "Red");
        assert_eq!(
            field.normalized(),
            Some(("Colour".into(), "Red".into(), "text".into()))
        );

        let numeric: DynamicFieldInput =
            serde_json::from_value(json!({"name": "Weight", "value": 2.5, "type": "number"}))
                .unwrap();
        assert_eq!(
            numeric.normalized(),
            Some(("Weight".into(), "2.5".into(), "number".into()))
        );

        let empty_type = DynamicFieldInput::text("Size", "XL").with_type("");
        assert_eq!(empty_type.normalized().unwrap().2, "text");
    }

    #[test]
    fn test_dynamic_field_skipped_without_name_or_value() {
        assert_eq!(DynamicFieldInput::text(" ", "x").normalized(), None);

        let null_value: DynamicFieldInput =
            serde_json::from_value(json!({"name": "Notes", "value": null})).unwrap();
        assert_eq!(null_value.normalized(), None);

        let missing_value: DynamicFieldInput =
            serde_json::from_value(json!({"name": "Notes"})).unwrap();
        assert_eq!(missing_value.normalized(), None);
    }

    #[test]
    fn test_dynamic_field_accepts_stored_spelling() {
        let field: DynamicFieldInput = serde_json::from_value(json!({
            "field_name": "Origin",
            "field_value": "Spain",
            "field_type": "text",
            "field_order": 1
        }))
        .unwrap();
        assert_eq!(field.name, "Origin");
        assert_eq!(field.normalized().unwrap().1, "Spain");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let sqlite = parse_timestamp("2024-03-01 12:30:45").unwrap();
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:45+00:00");

        let iso = parse_timestamp("2024-03-01T12:30:45.250Z").unwrap();
        assert_eq!(iso.timestamp_millis() % 1000, 250);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
