use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as ProductLock, OwnedMutexGuard};

use stockledger_core::ProductId;
use stockledger_inventory::{Movement, MovementType, Product};

use super::filter::{
    MovementFilter, MovementPage, MovementReport, MovementSummary, Pagination, ProductFilter,
};
use super::r#trait::{InventoryStore, StockTransaction, StoreError};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    /// Append order across all products.
    movements: Vec<Movement>,
}

impl State {
    fn movement_page(&self, filter: &MovementFilter, pagination: Pagination) -> MovementPage {
        let mut matching: Vec<Movement> = self
            .movements
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        // Stable sort keeps reverse append order for equal timestamps.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        MovementPage {
            movements: pagination.window(matching),
            total,
        }
    }

    fn movement_summary(&self, filter: &MovementFilter) -> BTreeMap<MovementType, MovementSummary> {
        let mut summary: BTreeMap<MovementType, MovementSummary> = BTreeMap::new();
        for m in self.movements.iter().filter(|m| filter.matches(m)) {
            let entry = summary.entry(m.movement_type).or_default();
            entry.total_quantity += m.quantity;
            entry.total_movements += 1;
        }
        summary
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    locks: Mutex<HashMap<ProductId, Arc<ProductLock<()>>>>,
}

impl Inner {
    fn lock_for(&self, id: ProductId) -> Result<Arc<ProductLock<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("lock table poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }

    /// Remove the lock entry of `id` once nobody holds or awaits it.
    ///
    /// Called after a lookup found no such product, so unknown ids do not
    /// accumulate entries.
    fn forget_lock(&self, id: ProductId) -> Result<(), StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("lock table poisoned".to_string()))?;
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Stock transactions take a per-product async mutex
/// (the equivalent of a row lock) and publish their writes under a single
/// state lock on commit, so readers never see a product without its movement.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventoryStore {
    inner: Arc<Inner>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk every product's ledger and check it against the stored stock.
    ///
    /// Each movement must continue from the previous one, and the last
    /// movement's `new_stock` must equal the product's `current_stock`
    /// (or the stock must be zero when there is no movement).
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        let state = self.inner.read()?;

        let mut last: HashMap<ProductId, &Movement> = HashMap::new();
        for m in &state.movements {
            if m.new_stock < 0 || m.previous_stock < 0 || m.quantity < 0 {
                return Err(StoreError::Backend(format!("movement {} has negative values", m.id)));
            }
            let expected_previous = last.get(&m.product_id).map_or(0, |prev| prev.new_stock);
            if m.previous_stock != expected_previous {
                return Err(StoreError::Backend(format!(
                    "movement {} starts at {} but ledger was at {}",
                    m.id, m.previous_stock, expected_previous
                )));
            }
            last.insert(m.product_id, m);
        }

        for product in state.products.values() {
            let ledger_stock = last.get(&product.id).map_or(0, |m| m.new_stock);
            if product.current_stock != ledger_stock {
                return Err(StoreError::Backend(format!(
                    "product {} holds {} but its ledger ends at {}",
                    product.id, product.current_stock, ledger_stock
                )));
            }
        }
        Ok(())
    }
}

/// Unit of work over [`InMemoryInventoryStore`].
///
/// Writes are buffered until commit; product locks are released when the
/// transaction is committed, rolled back or dropped.
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    guards: HashMap<ProductId, OwnedMutexGuard<()>>,
    stock_writes: HashMap<ProductId, (i64, DateTime<Utc>)>,
    movements: Vec<Movement>,
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("locked", &self.guards.keys().collect::<Vec<_>>())
            .field("stock_writes", &self.stock_writes)
            .field("movements", &self.movements.len())
            .finish()
    }
}

impl InMemoryTransaction {
    fn ensure_locked(&self, id: ProductId) -> Result<(), StoreError> {
        if self.guards.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "product {id} is not locked by this transaction"
            )))
        }
    }

    /// Check that buffered movements chain from the stored stock to the buffered stock.
    fn check_chain(&self, state: &State) -> Result<(), StoreError> {
        for (id, (new_stock, _)) in &self.stock_writes {
            let stored = state
                .products
                .get(id)
                .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;

            let mut running = stored.current_stock;
            for m in self.movements.iter().filter(|m| m.product_id == *id) {
                if m.previous_stock != running {
                    return Err(StoreError::Backend(format!(
                        "movement {} starts at {} but product {id} is at {running}",
                        m.id, m.previous_stock
                    )));
                }
                running = m.new_stock;
            }
            if running != *new_stock {
                return Err(StoreError::Backend(format!(
                    "product {id} written as {new_stock} but its movements end at {running}"
                )));
            }
        }

        if let Some(orphan) = self
            .movements
            .iter()
            .find(|m| !self.stock_writes.contains_key(&m.product_id))
        {
            return Err(StoreError::Backend(format!(
                "movement {} appended without a stock write",
                orphan.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError> {
        if !self.guards.contains_key(&id) {
            let lock = self.inner.lock_for(id)?;
            let guard = lock.lock_owned().await;
            self.guards.insert(id, guard);
        }

        let found = self.inner.read()?.products.get(&id).cloned();
        let Some(mut product) = found else {
            drop(self.guards.remove(&id));
            self.inner.forget_lock(id)?;
            return Err(StoreError::NotFound(format!("product {id}")));
        };

        if let Some((stock, at)) = self.stock_writes.get(&id) {
            product.current_stock = *stock;
            product.updated_at = *at;
        }
        Ok(product)
    }

    async fn write_product_stock(
        &mut self,
        id: ProductId,
        new_stock: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.ensure_locked(id)?;
        if new_stock < 0 {
            return Err(StoreError::Backend(format!(
                "negative stock {new_stock} rejected for product {id}"
            )));
        }
        self.stock_writes.insert(id, (new_stock, at));
        Ok(())
    }

    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        self.ensure_locked(movement.product_id)?;
        if self.movements.iter().any(|m| m.id == movement.id) {
            return Err(StoreError::UniqueViolation(format!("movement {}", movement.id)));
        }
        self.movements.push(movement.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.inner.write()?;
        self.check_chain(&state)?;

        for (id, (stock, at)) in &self.stock_writes {
            if let Some(product) = state.products.get_mut(id) {
                product.current_stock = *stock;
                product.updated_at = *at;
            }
        }
        state.movements.extend(self.movements.iter().cloned());
        drop(state);

        // Product locks are released as `self.guards` drops here.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTransaction {
            inner: self.inner.clone(),
            guards: HashMap::new(),
            stock_writes: HashMap::new(),
            movements: Vec::new(),
        })
    }

    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&Movement>,
    ) -> Result<(), StoreError> {
        if let Some(m) = opening {
            if m.product_id != product.id
                || m.previous_stock != 0
                || m.new_stock != product.current_stock
            {
                return Err(StoreError::Backend(
                    "opening movement does not match the product's stock".to_string(),
                ));
            }
        } else if product.current_stock != 0 {
            return Err(StoreError::Backend(
                "product with stock requires an opening movement".to_string(),
            ));
        }

        let mut state = self.inner.write()?;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::UniqueViolation(format!("product id {}", product.id)));
        }
        for existing in state.products.values() {
            if existing.sku == product.sku {
                return Err(StoreError::UniqueViolation(format!("sku {}", product.sku)));
            }
            if product.barcode.is_some() && existing.barcode == product.barcode {
                return Err(StoreError::UniqueViolation("barcode".to_string()));
            }
        }

        state.products.insert(product.id, product.clone());
        if let Some(m) = opening {
            state.movements.push(m.clone());
        }
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<Product, StoreError> {
        // Serialize with stock transactions on the same product, like a row lock would.
        let guard = self.inner.lock_for(product.id)?.lock_owned().await;

        let result = {
            let mut state = self.inner.write()?;
            if product.barcode.is_some()
                && state
                    .products
                    .values()
                    .any(|p| p.id != product.id && p.barcode == product.barcode)
            {
                return Err(StoreError::UniqueViolation("barcode".to_string()));
            }

            state.products.get_mut(&product.id).map(|stored| {
                stored.name = product.name.clone();
                stored.description = product.description.clone();
                stored.barcode = product.barcode.clone();
                stored.unit = product.unit.clone();
                stored.min_stock = product.min_stock;
                stored.max_stock = product.max_stock;
                stored.price = product.price;
                stored.cost = product.cost;
                stored.updated_at = product.updated_at;
                stored.clone()
            })
        };

        drop(guard);
        match result {
            Some(stored) => Ok(stored),
            None => {
                self.inner.forget_lock(product.id)?;
                Err(StoreError::NotFound(format!("product {}", product.id)))
            }
        }
    }

    async fn deactivate_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        let guard = self.inner.lock_for(id)?.lock_owned().await;

        let result = {
            let mut state = self.inner.write()?;
            state.products.get_mut(&id).map(|stored| {
                if stored.is_active {
                    stored.deactivate(at);
                }
                stored.clone()
            })
        };

        drop(guard);
        match result {
            Some(stored) => Ok(stored),
            None => {
                self.inner.forget_lock(id)?;
                Err(StoreError::NotFound(format!("product {id}")))
            }
        }
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read()?.products.get(&id).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let state = self.inner.read()?;
        Ok(state.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let state = self.inner.read()?;
        Ok(state
            .products
            .values()
            .find(|p| p.barcode.as_deref() == Some(barcode))
            .cloned())
    }

    async fn find_all(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = {
            let state = self.inner.read()?;
            state
                .products
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect()
        };
        filter.sort(&mut products);

        Ok(match filter.pagination {
            Some(page) => page.window(products),
            None => products,
        })
    }

    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        let state = self.inner.read()?;
        Ok(state.products.get(&id).is_some_and(|p| p.is_active))
    }

    async fn find_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        Ok(self.inner.read()?.movement_page(filter, pagination))
    }

    async fn summarize_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError> {
        Ok(self.inner.read()?.movement_summary(filter))
    }

    async fn movement_report(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementReport, StoreError> {
        let state = self.inner.read()?;
        Ok(MovementReport {
            page: state.movement_page(filter, pagination),
            summary: state.movement_summary(filter),
        })
    }
}
