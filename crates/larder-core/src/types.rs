//! # Domain Types
//!
//! Core domain types for the Larder inventory ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│ StockMovement   │   │      Dish       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  signed qty     │   │  id (UUID)      │       │
//! │  │  quantity_milli │   │  balance_after  │   │  is_active      │       │
//! │  │  unit / price   │   │  type + source  │   │  RecipeIngredient│      │
//! │  └───────▲─────────┘   └─────────────────┘   └────────┬────────┘       │
//! │          │                                            │                │
//! │          │        ┌─────────────────┐   ┌─────────────▼───┐            │
//! │          ├────────│ ExpirationLot   │   │      Sale       │            │
//! │          │        │  status machine │   │  + ingredient   │            │
//! │          │        └─────────────────┘   │    snapshot     │            │
//! │          │        ┌─────────────────┐   └─────────────────┘            │
//! │          └────────│ Bill / BillLine │ ── Supplier                      │
//! │                   └─────────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an immutable `id` (UUID v4) used for relations; names
//! are human-readable and mutable.
//!
//! ## Storage Convention
//! Raw integer fields mirror database columns (`quantity_milli`,
//! `unit_price_cents`); helper methods wrap them in [`Quantity`] / [`Money`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Unit
// =============================================================================

/// Measurement unit for a product: mass, volume, or count.
///
/// A closed set on purpose. Recipe quantities are expressed in the
/// referenced product's unit; there is no conversion layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Mass (kilograms).
    Kg,
    /// Volume (liters).
    L,
    /// Count (pieces).
    Piece,
}

impl Unit {
    /// Returns the canonical lowercase label stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::L => "l",
            Unit::Piece => "piece",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" => Ok(Unit::Kg),
            "l" => Ok(Unit::L),
            "piece" => Ok(Unit::Piece),
            other => Err(format!("unknown unit: {other}")),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A trackable or non-trackable inventory item.
///
/// Owned exclusively by the product store; `quantity_milli` is mutated only
/// through ledger-producing operations (plus the documented first-import
/// bypass, which sets `initial_quantity_milli` instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name; also the upsert-by-name key (exact, case-sensitive).
    pub name: String,

    /// Current on-hand quantity in milli-units.
    pub quantity_milli: i64,

    /// Quantity at creation time. Invariant 1:
    /// `quantity_milli == initial_quantity_milli + Σ(movement quantities)`.
    pub initial_quantity_milli: i64,

    /// Measurement unit.
    pub unit: Unit,

    /// Latest purchase price per whole unit, in cents (last write wins).
    pub unit_price_cents: Option<i64>,

    /// Reorder threshold in milli-units; at or below flags low stock.
    pub par_level_milli: Option<i64>,

    /// Whether stock levels are tracked for this product.
    pub trackable: bool,

    /// A prepared product built from other products via a bill of materials.
    pub is_composite: bool,

    /// Output of one batch of a composite product, in milli-units.
    pub yield_milli: Option<i64>,

    /// Optional free-form category (e.g. "dairy").
    pub category: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the current quantity.
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    /// Returns the unit price, if one has been recorded.
    #[inline]
    pub fn unit_price(&self) -> Option<Money> {
        self.unit_price_cents.map(Money::from_cents)
    }

    /// Checks whether stock is at or below the par (reorder) level.
    pub fn is_low_stock(&self) -> bool {
        match self.par_level_milli {
            Some(par) if self.trackable => self.quantity_milli <= par,
            _ => false,
        }
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Stock received (bill confirmation, sale reversal).
    Inbound,
    /// Stock depleted (recipe deduction).
    Outbound,
    /// Manual count correction (physical count, waste).
    Adjustment,
}

/// What caused a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum MovementSource {
    /// Manual adjustment by a user.
    Manual,
    /// Ingredient depletion from a recorded dish sale.
    RecipeDeduction,
    /// Compensation from a sale update or deletion.
    SaleReversal,
    /// Line item from a confirmed supplier bill.
    BillReceipt,
}

/// One immutable, signed entry in the audit ledger.
///
/// Never edited after insert; mistakes are superseded by further
/// compensating entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The product whose quantity changed.
    pub product_id: String,

    /// Direction of the change.
    pub movement_type: MovementType,

    /// Signed change in milli-units (negative = depletion).
    pub quantity_milli: i64,

    /// Product quantity immediately after this movement was applied.
    pub balance_after_milli: i64,

    /// What caused the movement.
    pub source: MovementSource,

    /// Free-text reason ("physical count", "spoilage"...).
    pub reason: Option<String>,

    /// Link to the sale that caused this movement, if any.
    pub sale_id: Option<String>,

    /// Link to the bill that caused this movement, if any.
    pub bill_id: Option<String>,

    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Returns the signed quantity change.
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    /// Returns the balance snapshot taken after the movement.
    #[inline]
    pub fn balance_after(&self) -> Quantity {
        Quantity::from_milli(self.balance_after_milli)
    }
}

// =============================================================================
// Dish & Recipe
// =============================================================================

/// A menu dish with a weighted ingredient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Dish {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Inactive dishes cannot be sold.
    pub is_active: bool,

    /// Optional selling price per unit, in cents.
    pub selling_price_cents: Option<i64>,

    /// When the dish was created.
    pub created_at: DateTime<Utc>,

    /// When the dish was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A weighted link from a dish to a base product: how much one unit of the
/// dish consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RecipeIngredient {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The dish this ingredient belongs to.
    pub dish_id: String,

    /// The consumed product.
    pub product_id: String,

    /// Quantity consumed per unit of the dish, in milli-units.
    pub quantity_milli: i64,

    /// Unit the quantity is expressed in (the product's unit).
    pub unit: Unit,
}

/// Same shape as [`RecipeIngredient`] but attached to a composite product:
/// what one batch of the prepared product consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompositeIngredient {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The composite (prepared) product.
    pub composite_id: String,

    /// The consumed base product.
    pub product_id: String,

    /// Quantity consumed per batch, in milli-units.
    pub quantity_milli: i64,

    /// Unit the quantity is expressed in (the base product's unit).
    pub unit: Unit,
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded dish sale.
///
/// Creating one produces exactly one outbound movement per recipe
/// ingredient, scaled by `quantity_sold`, in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The dish that was sold.
    pub dish_id: String,

    /// Units sold.
    pub quantity_sold: i64,

    /// Business date of the sale.
    pub sale_date: NaiveDate,

    /// Optional free-text notes.
    pub notes: Option<String>,

    /// When the sale was recorded.
    pub created_at: DateTime<Utc>,

    /// When the sale was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Per-ingredient delta frozen onto the sale at record time.
///
/// Update and delete compensate from this snapshot, never from the live
/// recipe, so a recipe edited after the sale cannot skew the reversal math.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleIngredient {
    /// The sale this snapshot row belongs to.
    pub sale_id: String,

    /// The depleted product.
    pub product_id: String,

    /// Quantity depleted per unit sold, in milli-units, as of record time.
    pub quantity_milli_per_unit: i64,
}

// =============================================================================
// Bill & Supplier
// =============================================================================

/// Bill lifecycle; the transition pending → processed is one-way and
/// happens at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Awaiting review/confirmation.
    Pending,
    /// Confirmed; line items have been applied as inbound movements.
    Processed,
}

/// A supplier delivery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bill {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Resolved supplier, set on confirmation.
    pub supplier_id: Option<String>,

    /// Document date, set on confirmation.
    pub bill_date: Option<NaiveDate>,

    /// Document total in cents, set on confirmation.
    pub total_cents: Option<i64>,

    /// Lifecycle status.
    pub status: BillStatus,

    /// When the bill was created.
    pub created_at: DateTime<Utc>,

    /// When the bill was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A persisted bill line item (written at confirmation time).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillLine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The bill this line belongs to.
    pub bill_id: String,

    /// Resolved product (always set once confirmed).
    pub product_id: String,

    /// Raw description as it appeared on the document.
    pub name: String,

    /// Received quantity in milli-units.
    pub quantity_milli: i64,

    /// Unit the quantity is expressed in.
    pub unit: Unit,

    /// Purchase price per whole unit, in cents.
    pub unit_price_cents: Option<i64>,

    /// Line total in cents.
    pub total_cents: Option<i64>,
}

/// A supplier, upserted by exact name match (case-sensitive, first writer
/// wins the canonical row).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Canonical supplier name.
    pub name: String,

    /// When the supplier was first seen.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expiration Lot (DLC)
// =============================================================================

/// Stored lot status. One-directional:
/// active → {consumed | discarded}, both terminal.
///
/// "Expired" is **not** a stored status; it is derived at read time by
/// [`crate::expiration::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum LotStatus {
    /// Initial state; the lot is on the shelf.
    Active,
    /// Used up in the kitchen.
    Consumed,
    /// Thrown away.
    Discarded,
}

impl LotStatus {
    /// Returns the canonical lowercase label stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Active => "active",
            LotStatus::Consumed => "consumed",
            LotStatus::Discarded => "discarded",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-time classification combining stored status and expiration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotCondition {
    /// Active and not past its date.
    Active,
    /// Still stored as active but the expiration date has passed.
    Expired,
    /// Terminal: consumed.
    Consumed,
    /// Terminal: discarded.
    Discarded,
}

/// A dated, quantity-bearing best-before tracking record for a batch of a
/// product. Independent of the product's aggregate quantity; references the
/// product store by identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExpirationLot {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The tracked product.
    pub product_id: String,

    /// Best-before date.
    pub expiration_date: NaiveDate,

    /// Lot quantity in milli-units.
    pub quantity_milli: i64,

    /// Unit the quantity is expressed in.
    pub unit: Unit,

    /// Stored state machine status.
    pub status: LotStatus,

    /// Optional batch number from the packaging.
    pub batch_number: Option<String>,

    /// Optional supplier the lot came from.
    pub supplier_id: Option<String>,

    /// When the lot was registered.
    pub created_at: DateTime<Utc>,

    /// When the lot was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ExpirationLot {
    /// Returns the lot quantity.
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_round_trip() {
        for unit in [Unit::Kg, Unit::L, Unit::Piece] {
            assert_eq!(unit.as_str().parse::<Unit>().unwrap(), unit);
        }
        assert!("KG".parse::<Unit>().is_ok());
        assert!("bushel".parse::<Unit>().is_err());
    }

    #[test]
    fn test_low_stock_flagging() {
        let mut product = sample_product();
        product.par_level_milli = Some(5000);

        product.quantity_milli = 4000;
        assert!(product.is_low_stock());

        product.quantity_milli = 5000;
        assert!(product.is_low_stock()); // at par counts as low

        product.quantity_milli = 5001;
        assert!(!product.is_low_stock());

        // Non-trackable products never flag
        product.quantity_milli = 0;
        product.trackable = false;
        assert!(!product.is_low_stock());
    }

    fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            name: "Flour".to_string(),
            quantity_milli: 10000,
            initial_quantity_milli: 10000,
            unit: Unit::Kg,
            unit_price_cents: Some(120),
            par_level_milli: None,
            trackable: true,
            is_composite: false,
            yield_milli: None,
            category: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
