//! # Validation Module
//!
//! Input validation utilities for Larder.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Collaborators (UI, OCR review screen)                        │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation before any mutation   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / UNIQUE / foreign key constraints                       │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_NAME_LEN, MAX_SALE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity name (product, dish, supplier).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most [`MAX_NAME_LEN`] characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a physical quantity in milli-units (lot size, line item,
/// recipe weight).
///
/// ## Rules
/// - Must be positive (> 0); direction is carried by the movement type,
///   never by the sign of an input quantity
pub fn validate_quantity_milli(field: &str, milli: i64) -> ValidationResult<()> {
    if milli <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a count-reconciliation quantity (may be zero, never negative).
pub fn validate_counted_milli(field: &str, milli: i64) -> ValidationResult<()> {
    if milli < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of dish units in a sale.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_SALE_QUANTITY`]
pub fn validate_sale_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity sold".to_string(),
        });
    }

    if qty > MAX_SALE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity sold".to_string(),
            min: 1,
            max: MAX_SALE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative; zero is allowed (donated goods)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Tomato sauce").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity_milli() {
        assert!(validate_quantity_milli("quantity", 1).is_ok());
        assert!(validate_quantity_milli("quantity", 2500).is_ok());
        assert!(validate_quantity_milli("quantity", 0).is_err());
        assert!(validate_quantity_milli("quantity", -100).is_err());

        // Counted quantities may be zero (empty shelf)
        assert!(validate_counted_milli("counted", 0).is_ok());
        assert!(validate_counted_milli("counted", -1).is_err());
    }

    #[test]
    fn test_validate_sale_quantity() {
        assert!(validate_sale_quantity(1).is_ok());
        assert!(validate_sale_quantity(999).is_ok());
        assert!(validate_sale_quantity(0).is_err());
        assert!(validate_sale_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
