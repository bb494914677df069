//! Inventory store boundary.
//!
//! Products and their append-only movement ledger, behind a trait with a
//! unit-of-work transaction so the ledger engine stays storage-agnostic.

pub mod filter;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use filter::{
    MovementFilter, MovementPage, MovementReport, MovementSummary, Pagination, ProductFilter,
    ProductSort, SortOrder,
};
pub use in_memory::{InMemoryInventoryStore, InMemoryTransaction};
pub use postgres::{PostgresInventoryStore, PostgresTransaction};
pub use r#trait::{InventoryStore, StockTransaction, StoreError};
