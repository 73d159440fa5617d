// # Catalog Store Implementations
//
// This module provides implementations of the CatalogStore trait for
// different persistence strategies.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;
