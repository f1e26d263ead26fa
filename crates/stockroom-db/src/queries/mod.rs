//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - products: Product CRUD, listing and search
//! - dynamic_fields: Ordered user-defined attributes per product
//! - images: The single stored image per product
//! - stats: Catalog summary

pub mod dynamic_fields;
pub mod images;
pub mod products;
pub mod stats;
