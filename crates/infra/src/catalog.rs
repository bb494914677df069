//! Product catalog: the stock-relevant part of the product lifecycle.

use chrono::Utc;
use tracing::{info, instrument};

use stockledger_core::{ActorId, MovementId, ProductId};
use stockledger_inventory::{Movement, NewProduct, Product, ProductUpdate};

use crate::error::{InventoryError, InventoryResult};
use crate::store::{InventoryStore, ProductFilter};

/// Creates, edits and deactivates products.
///
/// Stock is only set here once, at creation, together with its opening movement.
/// Afterwards every change goes through [`StockLedger`](crate::StockLedger).
#[derive(Debug, Clone)]
pub struct ProductCatalog<S> {
    store: S,
}

impl<S> ProductCatalog<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a product; positive initial stock is seeded with an `IN` movement.
    #[instrument(skip(self, input, actor_id), fields(sku = %input.sku), err)]
    pub async fn create_product(
        &self,
        input: NewProduct,
        actor_id: impl Into<ActorId>,
    ) -> InventoryResult<Product> {
        let input = input.validated()?;

        if self.store.find_by_sku(&input.sku).await?.is_some() {
            return Err(InventoryError::Conflict(format!("sku {} already exists", input.sku)));
        }
        if let Some(barcode) = input.barcode.as_deref() {
            if self.store.find_by_barcode(barcode).await?.is_some() {
                return Err(InventoryError::Conflict(format!("barcode {barcode} already exists")));
            }
        }

        let now = Utc::now();
        let product = Product::create(ProductId::new(), input, now)?;
        let opening = (product.current_stock > 0).then(|| {
            Movement::opening_balance(
                MovementId::new(),
                product.id,
                product.current_stock,
                product.cost,
                actor_id.into(),
                now,
            )
        });

        self.store.insert_product(&product, opening.as_ref()).await?;
        info!(product_id = %product.id, initial_stock = product.current_stock, "product created");
        Ok(product)
    }

    /// Apply catalog edits. `sku`, `current_stock` and `is_active` are never changed here.
    #[instrument(skip(self, update), fields(product_id = %id), err)]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> InventoryResult<Product> {
        let mut product = self.get_product(id).await?;

        if let Some(barcode) = update.new_barcode() {
            if let Some(other) = self.store.find_by_barcode(barcode).await? {
                if other.id != id {
                    return Err(InventoryError::Conflict(format!("barcode {barcode} already exists")));
                }
            }
        }

        product.apply_update(update, Utc::now())?;
        Ok(self.store.update_product(&product).await?)
    }

    pub async fn get_product(&self, id: ProductId) -> InventoryResult<Product> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("product {id}")))
    }

    pub async fn find_by_sku(&self, sku: &str) -> InventoryResult<Product> {
        self.store
            .find_by_sku(sku.trim())
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("product with sku {sku}")))
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> InventoryResult<Vec<Product>> {
        Ok(self.store.find_all(filter).await?)
    }

    /// Logical delete. Already inactive products are returned unchanged.
    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn deactivate_product(&self, id: ProductId) -> InventoryResult<Product> {
        let product = self.get_product(id).await?;
        if !product.is_active {
            return Ok(product);
        }
        let stored = self.store.deactivate_product(id, Utc::now()).await?;
        info!("product deactivated");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::{InMemoryInventoryStore, MovementFilter, Pagination};
    use stockledger_inventory::MovementType;

    fn catalog() -> (InMemoryInventoryStore, ProductCatalog<InMemoryInventoryStore>) {
        let store = InMemoryInventoryStore::new();
        (store.clone(), ProductCatalog::new(store))
    }

    fn mouse() -> NewProduct {
        NewProduct::new("MW001", "Mouse Wireless", Decimal::new(5990, 2))
            .with_initial_stock(25)
            .with_thresholds(Some(10), Some(100))
    }

    #[tokio::test]
    async fn create_seeds_opening_movement() {
        let (store, catalog) = catalog();
        let product = catalog.create_product(mouse(), "admin").await.unwrap();

        let page = store
            .find_movements(&MovementFilter::for_product(product.id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let opening = &page.movements[0];
        assert_eq!(opening.movement_type, MovementType::In);
        assert_eq!(opening.previous_stock, 0);
        assert_eq!(opening.new_stock, 25);
        assert_eq!(opening.reason.as_deref(), Some("Initial stock"));
        store.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn create_without_stock_has_empty_history() {
        let (store, catalog) = catalog();
        let product = catalog
            .create_product(mouse().with_initial_stock(0), "admin")
            .await
            .unwrap();
        let page = store
            .find_movements(&MovementFilter::for_product(product.id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        store.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn duplicate_sku_or_barcode_is_conflict() {
        let (_, catalog) = catalog();
        catalog
            .create_product(mouse().with_barcode("7891234567890"), "admin")
            .await
            .unwrap();

        let err = catalog.create_product(mouse(), "admin").await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let mut other = mouse().with_barcode("7891234567890");
        other.sku = "KB001".to_string();
        let err = catalog.create_product(other, "admin").await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_input_is_validation_error() {
        let (_, catalog) = catalog();
        let mut input = mouse();
        input.name = "M".to_string();
        let err = catalog.create_product(input, "admin").await.unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[tokio::test]
    async fn update_changes_catalog_fields_only() {
        let (_, catalog) = catalog();
        let product = catalog.create_product(mouse(), "admin").await.unwrap();

        let update = ProductUpdate {
            name: Some("Mouse Wireless Pro".to_string()),
            price: Some(Decimal::new(6990, 2)),
            ..ProductUpdate::default()
        };
        let updated = catalog.update_product(product.id, update).await.unwrap();
        assert_eq!(updated.name, "Mouse Wireless Pro");
        assert_eq!(updated.price, Decimal::new(6990, 2));
        assert_eq!(updated.sku, "MW001");
        assert_eq!(updated.current_stock, 25);
        assert!(updated.updated_at >= product.updated_at);
    }

    #[tokio::test]
    async fn update_rejects_barcode_of_another_product() {
        let (_, catalog) = catalog();
        catalog
            .create_product(mouse().with_barcode("111"), "admin")
            .await
            .unwrap();
        let mut other = mouse();
        other.sku = "KB001".to_string();
        let keyboard = catalog.create_product(other, "admin").await.unwrap();

        let update = ProductUpdate {
            barcode: Some("111".to_string()),
            ..ProductUpdate::default()
        };
        let err = catalog.update_product(keyboard.id, update).await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookups_report_not_found() {
        let (_, catalog) = catalog();
        assert!(matches!(
            catalog.get_product(ProductId::new()).await,
            Err(InventoryError::NotFound(_))
        ));
        assert!(matches!(
            catalog.find_by_sku("NOPE01").await,
            Err(InventoryError::NotFound(_))
        ));
        assert!(matches!(
            catalog.deactivate_product(ProductId::new()).await,
            Err(InventoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deactivate_is_logical_and_idempotent() {
        let (store, catalog) = catalog();
        let product = catalog.create_product(mouse(), "admin").await.unwrap();

        let deactivated = catalog.deactivate_product(product.id).await.unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(deactivated.current_stock, 25);
        assert!(!store.exists_active(product.id).await.unwrap());

        let again = catalog.deactivate_product(product.id).await.unwrap();
        assert_eq!(again, deactivated);

        let found = catalog.find_by_sku("MW001").await.unwrap();
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn rename_racing_deactivation_keeps_product_inactive() {
        let (store, catalog) = catalog();
        let product = catalog.create_product(mouse(), "admin").await.unwrap();

        // A rename that read the product before the deactivation committed.
        let mut stale = catalog.get_product(product.id).await.unwrap();
        catalog.deactivate_product(product.id).await.unwrap();
        let rename = ProductUpdate {
            name: Some("Mouse Wireless Pro".to_string()),
            ..ProductUpdate::default()
        };
        stale.apply_update(rename.clone(), Utc::now()).unwrap();
        store.update_product(&stale).await.unwrap();

        let stored = catalog.get_product(product.id).await.unwrap();
        assert_eq!(stored.name, "Mouse Wireless Pro");
        assert!(!stored.is_active);

        let renamed = catalog.update_product(product.id, rename).await.unwrap();
        assert!(!renamed.is_active);
        assert!(!store.exists_active(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_active_products() {
        let (_, catalog) = catalog();
        let mouse = catalog.create_product(mouse(), "admin").await.unwrap();
        let mut kb = NewProduct::new("KB001", "Keyboard", Decimal::new(29990, 2));
        kb.initial_stock = 8;
        catalog.create_product(kb, "admin").await.unwrap();
        catalog.deactivate_product(mouse.id).await.unwrap();

        let active = catalog.list_products(&ProductFilter::active()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sku, "KB001");

        let all = catalog.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
