//! # larder-core: Pure Business Logic for Larder
//!
//! This crate is the **heart** of the Larder inventory ledger. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Collaborators (UI, OCR intake, spreadsheet import)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ money /   │  │  recipe   │  │expiration │  │   │
//! │  │   │  Product  │  │ quantity  │  │ cost +    │  │ derived   │  │   │
//! │  │   │  Movement │  │ integers  │  │feasibility│  │ lot state │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    larder-db (Database Layer)                   │   │
//! │  │        SQLite ledger, engines, repositories, migrations         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockMovement, Dish, Bill, lots...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`quantity`] - Physical quantity type in milli-units (no floating point!)
//! - [`recipe`] - Recipe feasibility and cost rollup math
//! - [`expiration`] - Derived best-before lot classification
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Math**: Prices are cents (i64), quantities are milli-units
//!    (i64, 1 kg = 1000) so ledger sums are exact
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::quantity::Quantity;
//! use larder_core::money::Money;
//!
//! // 2 kg of an ingredient priced at €3.00/kg
//! let needed = Quantity::from_whole(2);
//! let price = Money::from_cents(300);
//!
//! assert_eq!(needed.cost_at(price).cents(), 600); // €6.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod expiration;
pub mod money;
pub mod quantity;
pub mod recipe;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use larder_core::Money` instead of
// `use larder_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use recipe::{CostRollup, IngredientLine, Shortage};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum units of a dish in a single sale.
///
/// ## Business Reason
/// Prevents accidental over-recording (e.g., typing 300 covers instead of 30).
pub const MAX_SALE_QUANTITY: i64 = 999;

/// Maximum length of a product, dish, or supplier name.
pub const MAX_NAME_LEN: usize = 200;
