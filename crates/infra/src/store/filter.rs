//! Filter and pagination types shared by every store implementation.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, ProductId};
use stockledger_inventory::{Movement, MovementType, Product};

/// Pagination parameters for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    /// Apply this window to an already ordered iterator.
    pub fn window<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Filter criteria for movement listings and summaries.
///
/// Date bounds are inclusive; either may be given alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub actor_id: Option<ActorId>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, movement: &Movement) -> bool {
        self.product_id.is_none_or(|id| movement.product_id == id)
            && self.actor_id.as_ref().is_none_or(|a| &movement.actor_id == a)
            && self.movement_type.is_none_or(|t| movement.movement_type == t)
            && self.created_after.is_none_or(|after| movement.created_at >= after)
            && self.created_before.is_none_or(|before| movement.created_at <= before)
    }
}

/// One page of movements, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<Movement>,
    /// Number of movements matching the filter across all pages.
    pub total: u64,
}

/// Per-type aggregate over a movement filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSummary {
    pub total_quantity: i64,
    pub total_movements: u64,
}

/// A page of movements and the per-type totals of the same filter, read from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReport {
    pub page: MovementPage,
    pub summary: BTreeMap<MovementType, MovementSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductSort {
    Name,
    Sku,
    CurrentStock,
    #[default]
    CreatedAt,
}

impl ProductSort {
    /// Column name in the relational schema.
    pub fn column(self) -> &'static str {
        match self {
            ProductSort::Name => "name",
            ProductSort::Sku => "sku",
            ProductSort::CurrentStock => "current_stock",
            ProductSort::CreatedAt => "created_at",
        }
    }

    fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            ProductSort::Name => a.name.cmp(&b.name),
            ProductSort::Sku => a.sku.cmp(&b.sku),
            ProductSort::CurrentStock => a.current_stock.cmp(&b.current_stock),
            ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter criteria for product listings. Defaults to newest first, unpaginated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductFilter {
    pub is_active: Option<bool>,
    /// Case-insensitive substring match over name, sku and barcode.
    pub search: Option<String>,
    pub sort: ProductSort,
    pub order: SortOrder,
    pub pagination: Option<Pagination>,
}

impl ProductFilter {
    pub fn active() -> Self {
        Self {
            is_active: Some(true),
            ..Self::default()
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.is_active.is_some_and(|active| product.is_active != active) {
            return false;
        }
        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.sku.to_lowercase().contains(&term)
                    || product
                        .barcode
                        .as_deref()
                        .is_some_and(|b| b.to_lowercase().contains(&term))
            }
        }
    }

    /// Order products per `sort`/`order`, ties broken by id for stable pages.
    pub fn sort(&self, products: &mut [Product]) {
        products.sort_by(|a, b| {
            let ord = self.sort.compare(a, b);
            let ord = match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });
    }
}
