//! Inventory domain module.
//!
//! This crate contains the stock rules for products and their movement ledger,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod movement;
pub mod product;

pub use movement::{
    MAX_REASON_LEN, MAX_REFERENCE_LEN, Movement, MovementRequest, MovementType, StockChange,
};
pub use product::{DEFAULT_UNIT, MONEY_LIMIT, MONEY_SCALE, NewProduct, Product, ProductUpdate};
