//! Infrastructure layer: inventory stores, the stock ledger engine, catalog and reporting services.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod query_service;
pub mod store;


pub use catalog::ProductCatalog;
pub use config::{ConfigError, InventoryConfig};
pub use error::{InventoryError, InventoryResult};
pub use ledger::{StockLedger, StockUpdate};
pub use query_service::{InventoryQueryService, StockReport, StockValue};
pub use store::{
    InMemoryInventoryStore, InventoryStore, MovementFilter, Pagination, PostgresInventoryStore,
    ProductFilter, StockTransaction, StoreError,
};
