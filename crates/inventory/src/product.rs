use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId};

/// Unit of measure applied when none is given.
pub const DEFAULT_UNIT: &str = "UN";

/// Decimal places kept for prices and costs.
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound for prices and costs (ten integer digits).
pub const MONEY_LIMIT: i64 = 10_000_000_000;

/// A stocked product as persisted by the inventory store.
///
/// `current_stock` is only ever changed by the stock ledger, together with a
/// [`Movement`](crate::Movement) describing the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub unit: String,
    pub current_stock: i64,
    /// Reorder threshold; `None` falls back to the configured default.
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Build a new active product from validated input.
    pub fn create(id: ProductId, input: NewProduct, at: DateTime<Utc>) -> DomainResult<Self> {
        let input = input.validated()?;
        Ok(Self {
            id,
            sku: input.sku,
            name: input.name,
            description: input.description,
            barcode: input.barcode,
            unit: input.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            current_stock: input.initial_stock,
            min_stock: input.min_stock,
            max_stock: input.max_stock,
            price: input.price,
            cost: input.cost,
            is_active: true,
            created_at: at,
            updated_at: at,
        })
    }

    /// Threshold at or below which this product counts as low on stock.
    pub fn low_stock_threshold(&self, default_threshold: i64) -> i64 {
        self.min_stock.unwrap_or(default_threshold)
    }

    pub fn is_low_stock(&self, default_threshold: i64) -> bool {
        self.current_stock <= self.low_stock_threshold(default_threshold)
    }

    /// On-hand value at list price (exact decimal arithmetic).
    pub fn stock_value(&self) -> Decimal {
        Decimal::from(self.current_stock) * self.price
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Apply catalog changes. Never touches `sku` or `current_stock`.
    pub fn apply_update(&mut self, update: ProductUpdate, at: DateTime<Utc>) -> DomainResult<()> {
        let update = update.validated()?;

        let min_stock = update.min_stock.or(self.min_stock);
        let max_stock = update.max_stock.or(self.max_stock);
        check_thresholds(min_stock, max_stock)?;

        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = non_empty(description);
        }
        if let Some(barcode) = update.barcode {
            self.barcode = non_empty(barcode);
        }
        if let Some(unit) = update.unit {
            self.unit = unit;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if update.cost.is_some() {
            self.cost = update.cost;
        }
        self.min_stock = min_stock;
        self.max_stock = max_stock;
        self.updated_at = at;
        Ok(())
    }

    /// Logical deletion. Movement history stays attached.
    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = at;
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub max_stock: Option<i64>,
    #[serde(default)]
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            description: None,
            barcode: None,
            unit: None,
            price,
            cost: None,
            min_stock: None,
            max_stock: None,
            initial_stock: 0,
        }
    }

    pub fn with_initial_stock(mut self, initial_stock: i64) -> Self {
        self.initial_stock = initial_stock;
        self
    }

    pub fn with_thresholds(mut self, min_stock: Option<i64>, max_stock: Option<i64>) -> Self {
        self.min_stock = min_stock;
        self.max_stock = max_stock;
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Trim and check every field.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.sku = self.sku.trim().to_string();
        self.name = self.name.trim().to_string();
        self.description = self.description.and_then(non_empty);
        self.barcode = self.barcode.and_then(non_empty);
        self.unit = self.unit.and_then(non_empty);

        check_sku(&self.sku)?;
        check_name(&self.name)?;
        check_optional_len("description", self.description.as_deref(), 500)?;
        check_optional_len("barcode", self.barcode.as_deref(), 50)?;
        check_optional_len("unit", self.unit.as_deref(), 10)?;
        check_price(self.price)?;
        check_cost(self.cost)?;
        check_thresholds(self.min_stock, self.max_stock)?;

        if self.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        Ok(self)
    }
}

/// Partial catalog update. `Some("")` clears description or barcode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub unit: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
}

impl ProductUpdate {
    pub fn validated(mut self) -> DomainResult<Self> {
        self.name = self.name.map(|n| n.trim().to_string());
        self.barcode = self.barcode.map(|b| b.trim().to_string());
        self.unit = self.unit.map(|u| u.trim().to_string());

        if let Some(name) = &self.name {
            check_name(name)?;
        }
        check_optional_len("description", self.description.as_deref(), 500)?;
        check_optional_len("barcode", self.barcode.as_deref(), 50)?;
        if let Some(unit) = &self.unit {
            if unit.is_empty() || unit.chars().count() > 10 {
                return Err(DomainError::validation("unit must be 1-10 characters"));
            }
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        check_cost(self.cost)?;
        check_thresholds(self.min_stock, self.max_stock)?;
        Ok(self)
    }

    /// Barcode this update would assign, if any.
    pub fn new_barcode(&self) -> Option<&str> {
        self.barcode.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn check_sku(sku: &str) -> DomainResult<()> {
    let len = sku.chars().count();
    if !(3..=20).contains(&len) {
        return Err(DomainError::validation("sku must be 3-20 characters"));
    }
    if !sku.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation("sku must be alphanumeric"));
    }
    Ok(())
}

fn check_name(name: &str) -> DomainResult<()> {
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(DomainError::validation("name must be 2-100 characters"));
    }
    Ok(())
}

fn check_optional_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Positive amount with at most [`MONEY_SCALE`] significant decimals, below [`MONEY_LIMIT`].
pub(crate) fn check_money(field: &str, value: Decimal) -> DomainResult<()> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must be positive")));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{field} cannot have more than {MONEY_SCALE} decimal places"
        )));
    }
    if value >= Decimal::from(MONEY_LIMIT) {
        return Err(DomainError::validation(format!("{field} must be below {MONEY_LIMIT}")));
    }
    Ok(())
}

fn check_price(price: Decimal) -> DomainResult<()> {
    check_money("price", price)
}

fn check_cost(cost: Option<Decimal>) -> DomainResult<()> {
    match cost {
        Some(c) => check_money("cost", c),
        None => Ok(()),
    }
}

fn check_thresholds(min_stock: Option<i64>, max_stock: Option<i64>) -> DomainResult<()> {
    if min_stock.is_some_and(|m| m < 0) || max_stock.is_some_and(|m| m < 0) {
        return Err(DomainError::validation("stock thresholds cannot be negative"));
    }
    if let (Some(min), Some(max)) = (min_stock, max_stock) {
        if max < min {
            return Err(DomainError::validation("max stock cannot be below min stock"));
        }
    }
    Ok(())
}
