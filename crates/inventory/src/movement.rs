use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, DomainError, DomainResult, MovementId, ProductId};

use crate::product::check_money;

/// Maximum length of a movement `reason` annotation.
pub const MAX_REASON_LEN: usize = 200;

/// Maximum length of a movement `reference` annotation.
pub const MAX_REFERENCE_LEN: usize = 50;

/// Kind of stock movement. Determines how `quantity` affects current stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Goods received: `+quantity`.
    In,
    /// Goods issued: `-quantity`, never below zero.
    Out,
    /// Stock counted: set to `quantity` (absolute target).
    Adjustment,
    /// Transfer leg: `+quantity` where `quantity` is a signed delta.
    Transfer,
    /// Shrinkage or damage: `-quantity`, never below zero.
    Loss,
    /// Customer return: `+quantity`.
    Return,
}

impl MovementType {
    pub const ALL: [MovementType; 6] = [
        MovementType::In,
        MovementType::Out,
        MovementType::Adjustment,
        MovementType::Transfer,
        MovementType::Loss,
        MovementType::Return,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Loss => "LOSS",
            MovementType::Return => "RETURN",
        }
    }

    /// Check that `quantity` is acceptable for this movement type.
    pub fn check_quantity(self, quantity: i64) -> DomainResult<()> {
        match self {
            MovementType::In | MovementType::Out | MovementType::Loss | MovementType::Return => {
                if quantity <= 0 {
                    return Err(DomainError::invalid_movement(format!(
                        "{} quantity must be positive (got {quantity})",
                        self.as_str()
                    )));
                }
            }
            MovementType::Adjustment => {
                if quantity < 0 {
                    return Err(DomainError::invalid_movement(format!(
                        "adjustment target cannot be negative (got {quantity})"
                    )));
                }
            }
            MovementType::Transfer => {
                if quantity == 0 {
                    return Err(DomainError::invalid_movement("transfer delta cannot be zero"));
                }
                if quantity == i64::MIN {
                    return Err(DomainError::invalid_movement("transfer delta out of range"));
                }
            }
        }
        Ok(())
    }

    /// Compute the stock change this movement produces on `available` units.
    ///
    /// This is the whole effect table: nothing else in the ledger decides how a
    /// movement moves stock.
    pub fn resolve(self, available: i64, quantity: i64) -> DomainResult<StockChange> {
        self.check_quantity(quantity)?;

        let overflow = || DomainError::invalid_movement("quantity overflows stock counter");

        let new_stock = match self {
            MovementType::In | MovementType::Return => {
                available.checked_add(quantity).ok_or_else(overflow)?
            }
            MovementType::Out | MovementType::Loss => {
                let next = available.checked_sub(quantity).ok_or_else(overflow)?;
                if next < 0 {
                    return Err(DomainError::insufficient_stock(available, quantity));
                }
                next
            }
            MovementType::Adjustment => quantity,
            MovementType::Transfer => {
                let next = available.checked_add(quantity).ok_or_else(overflow)?;
                if next < 0 {
                    let requested = quantity.checked_neg().ok_or_else(overflow)?;
                    return Err(DomainError::insufficient_stock(available, requested));
                }
                next
            }
        };

        Ok(StockChange {
            previous_stock: available,
            new_stock,
        })
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::invalid_movement(format!("invalid movement type: {s}")))
    }
}

/// Resolved before/after stock of a single movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl StockChange {
    /// Signed effect on stock (`new - previous`).
    pub fn delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }

    /// Non-negative magnitude recorded on the movement.
    pub fn magnitude(&self) -> i64 {
        self.delta().abs()
    }
}

/// A validated request to move stock for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub product_id: ProductId,
    /// Positive amount for IN/OUT/LOSS/RETURN, absolute target for ADJUSTMENT,
    /// signed delta for TRANSFER.
    pub quantity: i64,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub actor_id: ActorId,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
}

impl MovementRequest {
    pub fn new(
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
        actor_id: impl Into<ActorId>,
    ) -> Self {
        Self {
            product_id,
            quantity,
            movement_type,
            actor_id: actor_id.into(),
            reason: None,
            reference: None,
            unit_cost: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Normalize blank annotations to `None` and check annotation limits and quantity rules.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.reason = normalize(self.reason);
        self.reference = normalize(self.reference);

        if let Some(reason) = &self.reason {
            if reason.chars().count() > MAX_REASON_LEN {
                return Err(DomainError::validation(format!(
                    "reason cannot exceed {MAX_REASON_LEN} characters"
                )));
            }
        }
        if let Some(reference) = &self.reference {
            if reference.chars().count() > MAX_REFERENCE_LEN {
                return Err(DomainError::validation(format!(
                    "reference cannot exceed {MAX_REFERENCE_LEN} characters"
                )));
            }
        }
        if let Some(cost) = self.unit_cost {
            check_money("unit cost", cost)?;
        }

        self.movement_type.check_quantity(self.quantity)?;
        Ok(self)
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Immutable record of one stock quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Magnitude of the change (`|newStock - previousStock|`).
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub actor_id: ActorId,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Build the ledger entry for a resolved request.
    pub fn record(
        id: MovementId,
        request: &MovementRequest,
        change: StockChange,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id: request.product_id,
            movement_type: request.movement_type,
            quantity: change.magnitude(),
            previous_stock: change.previous_stock,
            new_stock: change.new_stock,
            reason: request.reason.clone(),
            reference: request.reference.clone(),
            unit_cost: request.unit_cost,
            actor_id: request.actor_id.clone(),
            created_at,
        }
    }

    /// Seed entry for a product created with positive on-hand stock.
    pub fn opening_balance(
        id: MovementId,
        product_id: ProductId,
        quantity: i64,
        unit_cost: Option<Decimal>,
        actor_id: ActorId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            movement_type: MovementType::In,
            quantity,
            previous_stock: 0,
            new_stock: quantity,
            reason: Some("Initial stock".to_string()),
            reference: None,
            unit_cost,
            actor_id,
            created_at,
        }
    }

    /// Signed effect of this movement on stock.
    pub fn delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }

    /// Whether this entry may directly follow `previous` in the same product's ledger.
    pub fn follows(&self, previous: &Movement) -> bool {
        self.product_id == previous.product_id && self.previous_stock == previous.new_stock
    }
}
