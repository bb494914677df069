//! Read-only inventory reporting.
//!
//! Nothing here takes locks; each query reads one consistent store snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockledger_core::ProductId;
use stockledger_inventory::{Movement, MovementType, Product};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::store::{
    InventoryStore, MovementFilter, MovementReport, MovementSummary, Pagination, ProductFilter,
};

/// Totals over active products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockValue {
    pub total_items: i64,
    pub total_value: Decimal,
}

/// Filtered movement listing plus per-type totals over the whole filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    pub movements: Vec<Movement>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
    pub summary: BTreeMap<MovementType, MovementSummary>,
}

#[derive(Debug, Clone)]
pub struct InventoryQueryService<S> {
    store: S,
    config: InventoryConfig,
}

impl<S> InventoryQueryService<S>
where
    S: InventoryStore,
{
    pub fn new(store: S, config: InventoryConfig) -> Self {
        Self { store, config }
    }

    /// Active products at or below their reorder threshold, lowest stock first.
    ///
    /// `threshold_override` replaces every product's threshold; otherwise each
    /// product's `min_stock` applies, falling back to the configured default.
    #[instrument(skip(self), err)]
    pub async fn low_stock(&self, threshold_override: Option<i64>) -> InventoryResult<Vec<Product>> {
        if threshold_override.is_some_and(|t| t < 0) {
            return Err(InventoryError::Validation("threshold cannot be negative".to_string()));
        }

        let mut products: Vec<Product> = self
            .store
            .find_all(&ProductFilter::active())
            .await?
            .into_iter()
            .filter(|p| match threshold_override {
                Some(threshold) => p.current_stock <= threshold,
                None => p.is_low_stock(self.config.low_stock_threshold),
            })
            .collect();

        products.sort_by(|a, b| {
            a.current_stock
                .cmp(&b.current_stock)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        Ok(products)
    }

    /// Units on hand and their value at list price, over active products.
    #[instrument(skip(self), err)]
    pub async fn stock_value(&self) -> InventoryResult<StockValue> {
        let products = self.store.find_all(&ProductFilter::active()).await?;
        let total_items = products.iter().map(|p| p.current_stock).sum();
        let total_value = products.iter().map(Product::stock_value).sum();
        Ok(StockValue {
            total_items,
            total_value,
        })
    }

    /// Most recent movements of one product, newest first.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn history(&self, product_id: ProductId, limit: Option<u32>) -> InventoryResult<Vec<Movement>> {
        if self.store.find_by_id(product_id).await?.is_none() {
            return Err(InventoryError::not_found(format!("product {product_id}")));
        }
        let page = self
            .store
            .find_movements(
                &MovementFilter::for_product(product_id),
                Pagination::first(self.config.history_limit(limit)),
            )
            .await?;
        Ok(page.movements)
    }

    #[instrument(skip(self), err)]
    pub async fn report(
        &self,
        filter: MovementFilter,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> InventoryResult<StockReport> {
        if let (Some(after), Some(before)) = (filter.created_after, filter.created_before) {
            if after > before {
                return Err(InventoryError::Validation(
                    "date range start is after its end".to_string(),
                ));
            }
        }

        let pagination = self.config.pagination(limit, offset);
        let MovementReport { page, summary } =
            self.store.movement_report(&filter, pagination).await?;

        let shown = u64::from(pagination.offset) + page.movements.len() as u64;
        Ok(StockReport {
            has_more: shown < page.total,
            movements: page.movements,
            total: page.total,
            pagination,
            summary,
        })
    }
}
