//! # Error Types
//!
//! Domain-specific error types for larder-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  larder-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  larder-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - Core | Db, returned by engines                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller surfaces     │
//! │  the failure reason verbatim to the end user                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity, id, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::recipe::Shortage;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// Ledger operations return them as tagged results; callers surface the
/// message to the end user.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation failed (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity (dish, product, bill, lot...) does not resolve.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation target exists but is disabled.
    ///
    /// ## When This Occurs
    /// - Recording a sale for a deactivated dish
    /// - Restocking a soft-deleted product
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// Not enough stock to fulfil a sale.
    ///
    /// Carries **every** deficient ingredient, not just the first one, so
    /// the user can fix the whole order in one pass.
    ///
    /// ## User Workflow
    /// ```text
    /// recordSale(Lasagna, 3)
    ///      │
    ///      ▼
    /// Check each ingredient: beef needs 6 kg, has 4 kg
    ///                        tomato needs 1.5 kg, has 0.2 kg
    ///      │
    ///      ▼
    /// InsufficientInventory { shortages: [beef, tomato] }
    ///      │
    ///      ▼
    /// UI lists both shortages; no quantity changed
    /// ```
    #[error("Insufficient inventory: {}", format_shortages(shortages))]
    InsufficientInventory { shortages: Vec<Shortage> },

    /// A bill was already confirmed; pending → processed happens at most once.
    #[error("Bill {id} is already processed")]
    AlreadyProcessed { id: String },

    /// Best-before lot state machine violation.
    ///
    /// ## When This Occurs
    /// - Consuming a discarded lot
    /// - Discarding an already consumed lot
    #[error("Lot {id} is {current}, only active lots can transition")]
    InvalidTransition { id: String, current: String },

    /// A ledger write lost a race against another writer of the same product.
    ///
    /// The quantity observed at validation time no longer matched at write
    /// time. The caller may retry the whole operation.
    #[error("Concurrent update lost on product {product_id}")]
    ConcurrencyConflict { product_id: String },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an Inactive error for a given entity type and id.
    pub fn inactive(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::Inactive {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Formats a shortage list for the InsufficientInventory message.
fn format_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(|s| {
            format!(
                "{} (needed {}, available {})",
                s.name, s.required, s.available
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, unknown unit).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate product name on import).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;

    #[test]
    fn test_insufficient_inventory_lists_every_shortage() {
        let err = CoreError::InsufficientInventory {
            shortages: vec![
                Shortage {
                    product_id: "p1".to_string(),
                    name: "Beef".to_string(),
                    required: Quantity::from_milli(6000),
                    available: Quantity::from_milli(4000),
                },
                Shortage {
                    product_id: "p2".to_string(),
                    name: "Tomato".to_string(),
                    required: Quantity::from_milli(1500),
                    available: Quantity::from_milli(200),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("Beef (needed 6, available 4)"));
        assert!(msg.contains("Tomato (needed 1.5, available 0.2)"));
    }

    #[test]
    fn test_error_messages() {
        let err = CoreError::not_found("Dish", "d-42");
        assert_eq!(err.to_string(), "Dish not found: d-42");

        let err = CoreError::AlreadyProcessed {
            id: "b-1".to_string(),
        };
        assert_eq!(err.to_string(), "Bill b-1 is already processed");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
