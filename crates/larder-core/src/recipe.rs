//! # Recipe Math
//!
//! Pure feasibility and cost-rollup logic for dishes and composite
//! (prepared) products.
//!
//! ## How It Fits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Recipe Graph Reads                                 │
//! │                                                                         │
//! │  larder-db resolves a dish / composite product into [IngredientLine]   │
//! │  (product id, name, required per unit, available, optional price)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  THIS MODULE (pure):                                                    │
//! │  ├── shortages()       every deficient ingredient, not just the first  │
//! │  ├── can_fulfill()     true iff shortages is empty                     │
//! │  ├── max_units()       floor(min(available / required))                │
//! │  ├── dish_cost()       Σ required × price, flags missing prices        │
//! │  └── composite_cost()  (Σ batch cost) / yield, forced to 0 on any      │
//! │                        missing price                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Missing-Price Policy
//! Both rollups report `has_missing_prices`. They differ in the number they
//! return alongside the flag:
//! - `dish_cost` returns the **partial sum** (missing prices contribute 0)
//! - `composite_cost` forces the whole result to **zero** - a prepared
//!   product's unit cost is either right or absent, never optimistic
//!
//! Callers decide whether to suppress the partial number.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::quantity::{Quantity, MILLI_PER_UNIT};

// =============================================================================
// View Structs
// =============================================================================

/// One resolved ingredient of a dish or composite product.
///
/// Built by the database layer from a recipe/products join; all math here
/// stays pure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct IngredientLine {
    /// The consumed product.
    pub product_id: String,

    /// Product name, carried for shortage messages.
    pub name: String,

    /// Quantity consumed per unit produced, in milli-units.
    pub required_milli: i64,

    /// Product's current on-hand quantity, in milli-units.
    pub available_milli: i64,

    /// Product's unit price in cents, if recorded.
    pub unit_price_cents: Option<i64>,
}

/// A deficient ingredient: how much a sale needs vs. what is on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    /// The deficient product.
    pub product_id: String,

    /// Product name for the user-facing message.
    pub name: String,

    /// Total quantity the operation needs.
    pub required: Quantity,

    /// Quantity currently on hand.
    pub available: Quantity,
}

/// Result of a cost rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRollup {
    /// Rolled-up cost in cents.
    pub cost: Money,

    /// True when at least one ingredient had no recorded price.
    pub has_missing_prices: bool,
}

impl CostRollup {
    /// A zero rollup with the given flag.
    pub const fn zero(has_missing_prices: bool) -> Self {
        CostRollup {
            cost: Money::zero(),
            has_missing_prices,
        }
    }
}

// =============================================================================
// Feasibility
// =============================================================================

/// Collects **all** deficient ingredients for producing `multiplier` units.
///
/// Does not stop at the first deficiency: the caller reports every shortage
/// in one failure.
pub fn shortages(lines: &[IngredientLine], multiplier: i64) -> Vec<Shortage> {
    lines
        .iter()
        .filter_map(|line| {
            let required = line.required_milli * multiplier;
            if required > line.available_milli {
                Some(Shortage {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    required: Quantity::from_milli(required),
                    available: Quantity::from_milli(line.available_milli),
                })
            } else {
                None
            }
        })
        .collect()
}

/// True iff every ingredient's required quantity × multiplier is covered by
/// current stock.
pub fn can_fulfill(lines: &[IngredientLine], multiplier: i64) -> bool {
    shortages(lines, multiplier).is_empty()
}

/// How many units are currently makeable:
/// `floor(min over ingredients of available / required)`.
///
/// ## Edge Cases
/// - An empty recipe can make nothing: returns 0
/// - Ingredients with `required == 0` don't constrain the result
/// - Negative availability counts as 0
pub fn max_units(lines: &[IngredientLine]) -> i64 {
    let mut constrained = false;
    let mut min_units = i64::MAX;

    for line in lines {
        if line.required_milli <= 0 {
            continue;
        }
        constrained = true;
        let units = line.available_milli.max(0) / line.required_milli;
        min_units = min_units.min(units);
    }

    if constrained {
        min_units
    } else {
        0
    }
}

// =============================================================================
// Cost Rollups
// =============================================================================

/// Cost of one unit of a dish: Σ over ingredients of required × unit price.
///
/// Missing prices contribute 0 to the sum and set `has_missing_prices`.
pub fn dish_cost(lines: &[IngredientLine]) -> CostRollup {
    let mut cost = Money::zero();
    let mut has_missing_prices = false;

    for line in lines {
        match line.unit_price_cents {
            Some(price) => {
                cost += Quantity::from_milli(line.required_milli).cost_at(Money::from_cents(price));
            }
            None => has_missing_prices = true,
        }
    }

    CostRollup {
        cost,
        has_missing_prices,
    }
}

/// Cost of one whole unit of a composite product's output:
/// (Σ over batch ingredients of quantity × price) / yield.
///
/// If **any** ingredient lacks a price the whole result is forced to zero
/// with the flag set - never report an optimistic partial price for a
/// prepared product.
pub fn composite_cost(lines: &[IngredientLine], yield_milli: i64) -> CostRollup {
    if yield_milli <= 0 {
        return CostRollup::zero(false);
    }

    let mut batch_cost = Money::zero();
    for line in lines {
        match line.unit_price_cents {
            Some(price) => {
                batch_cost +=
                    Quantity::from_milli(line.required_milli).cost_at(Money::from_cents(price));
            }
            None => return CostRollup::zero(true),
        }
    }

    // Per whole output unit, rounded half up
    let per_unit = (batch_cost.cents() as i128 * MILLI_PER_UNIT as i128
        + yield_milli as i128 / 2)
        / yield_milli as i128;

    CostRollup {
        cost: Money::from_cents(per_unit as i64),
        has_missing_prices: false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, required: i64, available: i64, price: Option<i64>) -> IngredientLine {
        IngredientLine {
            product_id: id.to_string(),
            name: id.to_string(),
            required_milli: required,
            available_milli: available,
            unit_price_cents: price,
        }
    }

    #[test]
    fn test_shortages_collects_every_deficiency() {
        let lines = vec![
            line("beef", 2000, 4000, None),   // needs 6, has 4
            line("pasta", 500, 10000, None),  // needs 1.5, has 10 → fine
            line("tomato", 1000, 200, None),  // needs 3, has 0.2
        ];
        let result = shortages(&lines, 3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].product_id, "beef");
        assert_eq!(result[0].required.milli(), 6000);
        assert_eq!(result[0].available.milli(), 4000);
        assert_eq!(result[1].product_id, "tomato");

        assert!(!can_fulfill(&lines, 3));
        assert!(can_fulfill(&lines[..2].to_vec(), 2));
    }

    #[test]
    fn test_exact_stock_is_sufficient() {
        let lines = vec![line("beef", 2000, 6000, None)];
        assert!(can_fulfill(&lines, 3));
        assert!(!can_fulfill(&lines, 4));
    }

    #[test]
    fn test_max_units() {
        let lines = vec![
            line("beef", 2000, 10000, None), // 5 portions
            line("pasta", 500, 1600, None),  // 3 portions (floor)
        ];
        assert_eq!(max_units(&lines), 3);

        // Empty recipe makes nothing
        assert_eq!(max_units(&[]), 0);

        // Zero-required lines don't constrain
        let lines = vec![line("salt", 0, 0, None), line("beef", 2000, 4000, None)];
        assert_eq!(max_units(&lines), 2);

        // Negative stock clamps to zero portions
        let lines = vec![line("beef", 2000, -500, None)];
        assert_eq!(max_units(&lines), 0);
    }

    #[test]
    fn test_dish_cost_partial_sum_with_flag() {
        // 1.5 kg at €2.00 + 0.5 kg at €4.00 = €3.00 + €2.00 = €5.00
        let lines = vec![
            line("beef", 1500, 0, Some(200)),
            line("butter", 500, 0, Some(400)),
        ];
        let rollup = dish_cost(&lines);
        assert_eq!(rollup.cost.cents(), 500);
        assert!(!rollup.has_missing_prices);

        // Clearing one price keeps the partial sum but raises the flag
        let lines = vec![
            line("beef", 1500, 0, Some(200)),
            line("butter", 500, 0, None),
        ];
        let rollup = dish_cost(&lines);
        assert_eq!(rollup.cost.cents(), 300);
        assert!(rollup.has_missing_prices);
    }

    /// Scenario: "Sauce" yields 2 kg from 1 kg of A (€3/kg) + 1 kg of B
    /// (€2/kg) → €2.50/kg. Clearing B's price forces 0 + flag.
    #[test]
    fn test_composite_cost_and_missing_price_policy() {
        let lines = vec![
            line("a", 1000, 0, Some(300)),
            line("b", 1000, 0, Some(200)),
        ];
        let rollup = composite_cost(&lines, 2000);
        assert_eq!(rollup.cost.cents(), 250);
        assert!(!rollup.has_missing_prices);

        let lines = vec![line("a", 1000, 0, Some(300)), line("b", 1000, 0, None)];
        let rollup = composite_cost(&lines, 2000);
        assert!(rollup.cost.is_zero());
        assert!(rollup.has_missing_prices);
    }

    #[test]
    fn test_composite_cost_degenerate_yield() {
        let lines = vec![line("a", 1000, 0, Some(300))];
        let rollup = composite_cost(&lines, 0);
        assert!(rollup.cost.is_zero());
        assert!(!rollup.has_missing_prices);
    }
}
