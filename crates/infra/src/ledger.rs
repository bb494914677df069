//! Stock ledger engine.
//!
//! Every stock change runs as one unit of work against the store:
//!
//! ```text
//! MovementRequest (validated)
//!   ↓
//! 1. begin, lock product row (product_for_update)
//!   ↓
//! 2. resolve effect (MovementType::resolve), reject negative stock
//!   ↓
//! 3. write current_stock + updated_at
//!   ↓
//! 4. append Movement { previous_stock, new_stock }
//!   ↓
//! 5. commit (or roll back everything)
//! ```
//!
//! A `StoreError::Concurrency` from any step restarts the whole unit of work, up
//! to `InventoryConfig::max_attempts` times. Every other failure is surfaced as is.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use stockledger_core::{ActorId, DomainError, MovementId, ProductId};
use stockledger_inventory::{Movement, MovementRequest, MovementType, Product};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::store::{InventoryStore, StockTransaction, StoreError};

/// Result of a successfully applied movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    /// Product as committed, with its new `current_stock`.
    pub product: Product,
    pub movement: Movement,
}

/// Failure of a single attempt, before classification.
#[derive(Debug)]
enum AttemptError {
    Domain(DomainError),
    Store(StoreError),
}

impl From<DomainError> for AttemptError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<AttemptError> for InventoryError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Domain(e) => e.into(),
            AttemptError::Store(e) => e.into(),
        }
    }
}

/// Applies movements to products through an [`InventoryStore`].
#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
    config: InventoryConfig,
}

impl<S> StockLedger<S>
where
    S: InventoryStore,
{
    pub fn new(store: S, config: InventoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Apply one movement atomically and return the updated product with the new movement.
    ///
    /// The request is validated before any transaction starts. On error neither
    /// the product nor its ledger has changed.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            movement_type = %request.movement_type,
            quantity = request.quantity,
            actor_id = %request.actor_id
        ),
        err
    )]
    pub async fn apply_movement(&self, request: MovementRequest) -> InventoryResult<StockUpdate> {
        let request = request.validated()?;
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_apply(&request).await {
                Ok(update) => {
                    info!(
                        movement_id = %update.movement.id,
                        previous_stock = update.movement.previous_stock,
                        new_stock = update.movement.new_stock,
                        attempt,
                        "stock movement applied"
                    );
                    return Ok(update);
                }
                Err(AttemptError::Store(StoreError::Concurrency(msg))) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %msg, "concurrent modification, retrying movement");
                    tokio::time::sleep(self.config.retry_backoff(attempt)).await;
                }
                Err(AttemptError::Store(StoreError::Concurrency(msg))) => {
                    return Err(InventoryError::Conflict(format!(
                        "concurrent modification not resolved after {attempt} attempts: {msg}"
                    )));
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    async fn try_apply(&self, request: &MovementRequest) -> Result<StockUpdate, AttemptError> {
        let mut tx = self.store.begin().await?;
        match apply_in(&mut tx, request).await {
            Ok(update) => {
                tx.commit().await?;
                Ok(update)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "failed to roll back stock transaction");
                }
                Err(err)
            }
        }
    }

    /// Receive goods (`IN`).
    pub async fn stock_in(
        &self,
        product_id: ProductId,
        quantity: i64,
        actor_id: impl Into<ActorId>,
        reference: Option<String>,
        unit_cost: Option<Decimal>,
    ) -> InventoryResult<StockUpdate> {
        let mut request = MovementRequest::new(product_id, MovementType::In, quantity, actor_id)
            .with_reason("Stock in");
        request.reference = reference;
        request.unit_cost = unit_cost;
        self.apply_movement(request).await
    }

    /// Issue goods (`OUT`).
    pub async fn stock_out(
        &self,
        product_id: ProductId,
        quantity: i64,
        actor_id: impl Into<ActorId>,
        reference: Option<String>,
    ) -> InventoryResult<StockUpdate> {
        let mut request = MovementRequest::new(product_id, MovementType::Out, quantity, actor_id)
            .with_reason("Stock out");
        request.reference = reference;
        self.apply_movement(request).await
    }

    /// Set stock to a counted absolute quantity (`ADJUSTMENT`).
    pub async fn stock_adjustment(
        &self,
        product_id: ProductId,
        new_quantity: i64,
        actor_id: impl Into<ActorId>,
        reason: Option<String>,
    ) -> InventoryResult<StockUpdate> {
        let request =
            MovementRequest::new(product_id, MovementType::Adjustment, new_quantity, actor_id)
                .with_reason(reason.unwrap_or_else(|| "Stock adjustment".to_string()));
        self.apply_movement(request).await
    }

    /// Record one leg of a transfer as a signed delta (`TRANSFER`).
    pub async fn transfer(
        &self,
        product_id: ProductId,
        delta: i64,
        actor_id: impl Into<ActorId>,
        reference: Option<String>,
    ) -> InventoryResult<StockUpdate> {
        let mut request = MovementRequest::new(product_id, MovementType::Transfer, delta, actor_id)
            .with_reason("Transfer");
        request.reference = reference;
        self.apply_movement(request).await
    }
}

/// Steps 1-4 of the unit of work; the caller commits or rolls back.
async fn apply_in<T>(tx: &mut T, request: &MovementRequest) -> Result<StockUpdate, AttemptError>
where
    T: StockTransaction,
{
    let mut product = tx.product_for_update(request.product_id).await?;
    product.ensure_active()?;

    let change = request
        .movement_type
        .resolve(product.current_stock, request.quantity)?;

    // Keep a product's ledger timestamps monotonic even if the wall clock steps back.
    let now = Utc::now().max(product.updated_at);

    tx.write_product_stock(product.id, change.new_stock, now).await?;
    let movement = Movement::record(MovementId::new(), request, change, now);
    tx.append_movement(&movement).await?;

    product.current_stock = change.new_stock;
    product.updated_at = now;
    Ok(StockUpdate { product, movement })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::store::{
        InMemoryInventoryStore, InMemoryTransaction, MovementFilter, MovementPage, MovementReport,
        MovementSummary, Pagination, ProductFilter,
    };
    use stockledger_inventory::NewProduct;

    /// Switches flipped by tests to inject store failures.
    #[derive(Debug, Default)]
    struct Faults {
        fail_append: AtomicBool,
        unavailable: AtomicBool,
        commit_conflicts: AtomicU32,
        begins: AtomicU32,
    }

    /// In-memory store wrapper that injects faults into transactions.
    #[derive(Clone, Default)]
    struct FaultyStore {
        inner: InMemoryInventoryStore,
        faults: Arc<Faults>,
    }

    struct FaultyTx {
        inner: InMemoryTransaction,
        faults: Arc<Faults>,
    }

    #[async_trait]
    impl StockTransaction for FaultyTx {
        async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError> {
            self.inner.product_for_update(id).await
        }

        async fn write_product_stock(
            &mut self,
            id: ProductId,
            new_stock: i64,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.write_product_stock(id, new_stock, at).await
        }

        async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
            if self.faults.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.append_movement(movement).await
        }

        async fn commit(self) -> Result<(), StoreError> {
            let pending = self.faults.commit_conflicts.load(Ordering::SeqCst);
            if pending > 0 {
                self.faults.commit_conflicts.store(pending - 1, Ordering::SeqCst);
                self.inner.rollback().await?;
                return Err(StoreError::Concurrency("could not serialize access".to_string()));
            }
            self.inner.commit().await
        }

        async fn rollback(self) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl InventoryStore for FaultyStore {
        type Tx = FaultyTx;

        async fn begin(&self) -> Result<Self::Tx, StoreError> {
            self.faults.begins.fetch_add(1, Ordering::SeqCst);
            if self.faults.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("pool timed out".to_string()));
            }
            Ok(FaultyTx {
                inner: self.inner.begin().await?,
                faults: self.faults.clone(),
            })
        }

        async fn insert_product(&self, product: &Product, opening: Option<&Movement>) -> Result<(), StoreError> {
            self.inner.insert_product(product, opening).await
        }

        async fn update_product(&self, product: &Product) -> Result<Product, StoreError> {
            self.inner.update_product(product).await
        }

        async fn deactivate_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
            self.inner.deactivate_product(id, at).await
        }

        async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
            self.inner.find_by_sku(sku).await
        }

        async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
            self.inner.find_by_barcode(barcode).await
        }

        async fn find_all(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
            self.inner.find_all(filter).await
        }

        async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
            self.inner.exists_active(id).await
        }

        async fn find_movements(
            &self,
            filter: &MovementFilter,
            pagination: Pagination,
        ) -> Result<MovementPage, StoreError> {
            self.inner.find_movements(filter, pagination).await
        }

        async fn summarize_movements(
            &self,
            filter: &MovementFilter,
        ) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError> {
            self.inner.summarize_movements(filter).await
        }

        async fn movement_report(
            &self,
            filter: &MovementFilter,
            pagination: Pagination,
        ) -> Result<MovementReport, StoreError> {
            self.inner.movement_report(filter, pagination).await
        }
    }

    fn config() -> InventoryConfig {
        InventoryConfig {
            retry_backoff_ms: 1,
            ..InventoryConfig::default()
        }
    }

    async fn seed<S: InventoryStore>(store: &S, sku: &str, stock: i64) -> Product {
        let now = Utc::now();
        let input = NewProduct::new(sku, "Mouse Wireless", Decimal::new(5990, 2)).with_initial_stock(stock);
        let product = Product::create(ProductId::new(), input, now).unwrap();
        let opening = (stock > 0)
            .then(|| Movement::opening_balance(MovementId::new(), product.id, stock, None, ActorId::system(), now));
        store.insert_product(&product, opening.as_ref()).await.unwrap();
        product
    }

    async fn history<S: InventoryStore>(store: &S, id: ProductId) -> Vec<Movement> {
        store
            .find_movements(&MovementFilter::for_product(id), Pagination::default())
            .await
            .unwrap()
            .movements
    }

    #[tokio::test]
    async fn out_movement_records_previous_and_new_stock() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 25).await;
        let ledger = StockLedger::new(store.clone(), config());

        let update = ledger.stock_out(product.id, 5, "alice", None).await.unwrap();
        assert_eq!(update.product.current_stock, 20);
        assert_eq!(update.movement.movement_type, MovementType::Out);
        assert_eq!(update.movement.quantity, 5);
        assert_eq!(update.movement.previous_stock, 25);
        assert_eq!(update.movement.new_stock, 20);
        assert_eq!(update.movement.reason.as_deref(), Some("Stock out"));
        assert_eq!(update.movement.actor_id, ActorId::new("alice"));

        let stored = store.find_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(stored, update.product);
        store.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_product_and_history_unchanged() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 20).await;
        let ledger = StockLedger::new(store.clone(), config());
        let before = history(&store, product.id).await;

        let err = ledger.stock_out(product.id, 30, "alice", None).await.unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                available: 20,
                requested: 30
            }
        );

        assert_eq!(store.find_by_id(product.id).await.unwrap().unwrap().current_stock, 20);
        assert_eq!(history(&store, product.id).await, before);
    }

    #[tokio::test]
    async fn adjustment_sets_absolute_value() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 25).await;
        let ledger = StockLedger::new(store.clone(), config());

        let update = ledger.stock_adjustment(product.id, 7, "auditor", None).await.unwrap();
        assert_eq!(update.product.current_stock, 7);
        assert_eq!(update.movement.previous_stock, 25);
        assert_eq!(update.movement.new_stock, 7);
        assert_eq!(update.movement.quantity, 18);
        assert_eq!(update.movement.reason.as_deref(), Some("Stock adjustment"));

        let update = ledger
            .stock_adjustment(product.id, 40, "auditor", Some("Cycle count".to_string()))
            .await
            .unwrap();
        assert_eq!(update.product.current_stock, 40);
        assert_eq!(update.movement.reason.as_deref(), Some("Cycle count"));
        store.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn transfer_applies_signed_delta() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 10).await;
        let ledger = StockLedger::new(store.clone(), config());

        let update = ledger
            .transfer(product.id, -4, "alice", Some("TR-9".to_string()))
            .await
            .unwrap();
        assert_eq!(update.product.current_stock, 6);
        assert_eq!(update.movement.quantity, 4);
        assert_eq!(update.movement.reason.as_deref(), Some("Transfer"));
        assert_eq!(update.movement.reference.as_deref(), Some("TR-9"));

        let err = ledger.transfer(product.id, -7, "alice", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { available: 6, requested: 7 }));
    }

    #[tokio::test]
    async fn stock_in_keeps_reference_and_unit_cost() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 0).await;
        let ledger = StockLedger::new(store.clone(), config());

        let update = ledger
            .stock_in(product.id, 12, "bob", Some("PO-42".to_string()), Some(Decimal::new(3500, 2)))
            .await
            .unwrap();
        assert_eq!(update.product.current_stock, 12);
        assert_eq!(update.movement.reason.as_deref(), Some("Stock in"));
        assert_eq!(update.movement.reference.as_deref(), Some("PO-42"));
        assert_eq!(update.movement.unit_cost, Some(Decimal::new(3500, 2)));
        store.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_any_transaction() {
        let store = FaultyStore::default();
        let product = seed(&store, "MW001", 5).await;
        let ledger = StockLedger::new(store.clone(), config());

        let err = ledger.stock_in(product.id, 0, "alice", None, None).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidMovement(_)));

        let err = ledger.stock_adjustment(product.id, -1, "alice", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidMovement(_)));

        let err = ledger
            .stock_out(product.id, 1, "alice", Some("x".repeat(51)))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        assert_eq!(store.faults.begins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let ledger = StockLedger::new(InMemoryInventoryStore::new(), config());
        let err = ledger.stock_in(ProductId::new(), 1, "alice", None, None).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn inactive_product_rejects_movements() {
        let store = InMemoryInventoryStore::new();
        let product = seed(&store, "MW001", 5).await;
        store.deactivate_product(product.id, Utc::now()).await.unwrap();

        let ledger = StockLedger::new(store.clone(), config());
        let err = ledger.stock_in(product.id, 1, "alice", None, None).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
        assert_eq!(history(&store, product.id).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_append_rolls_back_stock_write() {
        let store = FaultyStore::default();
        let product = seed(&store, "MW001", 25).await;
        store.faults.fail_append.store(true, Ordering::SeqCst);
        let ledger = StockLedger::new(store.clone(), config());

        let err = ledger.stock_out(product.id, 5, "alice", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::Storage(_)));

        assert_eq!(store.find_by_id(product.id).await.unwrap().unwrap().current_stock, 25);
        assert_eq!(history(&store, product.id).await.len(), 1);
        store.inner.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn commit_conflicts_are_retried() {
        let store = FaultyStore::default();
        let product = seed(&store, "MW001", 25).await;
        store.faults.commit_conflicts.store(2, Ordering::SeqCst);
        let ledger = StockLedger::new(store.clone(), config());

        let update = ledger.stock_out(product.id, 5, "alice", None).await.unwrap();
        assert_eq!(update.product.current_stock, 20);
        assert_eq!(store.faults.begins.load(Ordering::SeqCst), 3);
        assert_eq!(history(&store, product.id).await.len(), 2);
        store.inner.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_conflict() {
        let store = FaultyStore::default();
        let product = seed(&store, "MW001", 25).await;
        store.faults.commit_conflicts.store(10, Ordering::SeqCst);
        let ledger = StockLedger::new(store.clone(), config());

        let err = ledger.stock_out(product.id, 5, "alice", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
        assert_eq!(store.faults.begins.load(Ordering::SeqCst), 3);
        assert_eq!(store.find_by_id(product.id).await.unwrap().unwrap().current_stock, 25);
    }

    #[tokio::test]
    async fn unavailable_store_is_transient_and_not_retried() {
        let store = FaultyStore::default();
        let product = seed(&store, "MW001", 25).await;
        store.faults.unavailable.store(true, Ordering::SeqCst);
        let ledger = StockLedger::new(store.clone(), config());

        let err = ledger.stock_out(product.id, 5, "alice", None).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.faults.begins.load(Ordering::SeqCst), 1);
    }
}
