//! Stockroom-Common: Shared ids and error types.
//!
//! This crate provides functionality used across stockroom:
//!
//! - **Typed IDs**: `ProductId` (store-assigned rowid) and `ImageId`
//!   (time-based id with a random suffix)
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use stockroom_common::{Error, ImageId, ProductId, Result};
//!
//! let product = ProductId::from(1);
//! let image = ImageId::generate();
//! assert!(image.as_str().starts_with("img_"));
//!
//! fn example(id: ProductId) -> Result<()> {
//!     Err(Error::not_found(format!("product {id}")))
//! }
//! assert!(example(product).is_err());
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
