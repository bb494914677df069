use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::ProductId;
use stockledger_inventory::{Movement, MovementType, Product};

use super::filter::{
    MovementFilter, MovementPage, MovementReport, MovementSummary, Pagination, ProductFilter,
};

/// Inventory store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// stock rules). Services translate them before they reach callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row matched the requested id/sku.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint (sku, barcode, id) rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A conflicting concurrent write was detected; the unit of work may be retried.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// The backend is temporarily unreachable (timeouts, pool exhaustion, IO).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Backend(String),
}

/// One atomic read-modify-write-append unit of work.
///
/// Every write made through a transaction becomes visible only on [`commit`];
/// dropping a transaction without committing discards all of its writes.
///
/// Implementations must:
/// - hold a lock on every product read through `product_for_update` until commit
///   or rollback, so concurrent transactions on the same product serialize
/// - never block transactions that touch other products
/// - apply the product write and the movement append together or not at all
///
/// [`commit`]: StockTransaction::commit
#[async_trait]
pub trait StockTransaction: Send {
    /// Read a product and lock it for the rest of the transaction.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError>;

    /// Overwrite the product's current stock. The product must have been locked first.
    async fn write_product_stock(
        &mut self,
        id: ProductId,
        new_stock: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Append an immutable movement record.
    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Durable storage for products and their append-only movement ledger.
///
/// Writes to `current_stock` only happen through [`InventoryStore::begin`].
/// The remaining methods are plain reads plus catalog writes that never touch stock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Tx: StockTransaction + 'static;

    /// Start a unit of work.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Insert a new product, optionally with its opening-balance movement, atomically.
    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&Movement>,
    ) -> Result<(), StoreError>;

    /// Persist catalog fields (everything except `id`, `sku`, `current_stock`,
    /// `is_active` and `created_at`) and return the stored row.
    async fn update_product(&self, product: &Product) -> Result<Product, StoreError>;

    /// Mark a product inactive and return the stored row.
    ///
    /// `updated_at` only moves when the product was still active.
    async fn deactivate_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError>;

    async fn find_all(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError>;

    /// Movements matching `filter`, newest first (ties: most recently appended first).
    async fn find_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError>;

    /// Totals per movement type over every movement matching `filter`.
    async fn summarize_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError>;

    /// `find_movements` and `summarize_movements` over the same snapshot.
    async fn movement_report(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementReport, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }

    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&Movement>,
    ) -> Result<(), StoreError> {
        (**self).insert_product(product, opening).await
    }

    async fn update_product(&self, product: &Product) -> Result<Product, StoreError> {
        (**self).update_product(product).await
    }

    async fn deactivate_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        (**self).deactivate_product(id, at).await
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_by_sku(sku).await
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_by_barcode(barcode).await
    }

    async fn find_all(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        (**self).find_all(filter).await
    }

    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).exists_active(id).await
    }

    async fn find_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        (**self).find_movements(filter, pagination).await
    }

    async fn summarize_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError> {
        (**self).summarize_movements(filter).await
    }

    async fn movement_report(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementReport, StoreError> {
        (**self).movement_report(filter, pagination).await
    }
}
