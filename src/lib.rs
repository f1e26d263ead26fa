//! Stockroom - Inventory catalog persistence
//!
//! This library crate exposes the repositories, configuration and
//! export/import gateway used by the `stockroom` binary and integration tests.

pub mod config;
pub mod images;
pub mod inventory;
pub mod products;
pub mod transfer;

pub use inventory::Inventory;

use stockroom_common::{Error, Result};

/// Log storage failures of `action` before handing them to the caller.
pub(crate) fn log_failure<T>(action: &str, result: Result<T>) -> Result<T> {
    match &result {
        Err(e @ (Error::Database(_) | Error::Io(_) | Error::Internal(_))) => {
            tracing::error!("Failed to {}: {}", action, e);
        }
        Err(e) => tracing::debug!("Could not {}: {}", action, e),
        Ok(_) => {}
    }
    result
}
