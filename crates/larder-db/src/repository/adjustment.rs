//! # Adjustment Engine
//!
//! Manual count reconciliation: the user states what is actually on the
//! shelf and the engine writes the signed difference to the ledger.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   adjust(product, counted, reason)                      │
//! │                                                                         │
//! │  stored 6.0 kg, counted 4.5 kg  →  adjustment of -1.5 kg               │
//! │  stored 6.0 kg, counted 7.0 kg  →  adjustment of +1.0 kg               │
//! │  stored 6.0 kg, counted 6.0 kg  →  no movement at all (None)           │
//! │                                                                         │
//! │  A counted quantity of zero is a legitimate empty shelf, not an        │
//! │  input error.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{apply_movement, NewMovement};
use larder_core::{validation, CoreError, MovementSource, MovementType, Product, StockMovement};

/// Engine for manual stock corrections (physical counts, spoilage, waste).
///
/// ## Usage
/// ```rust,ignore
/// // Physical count found 4.5 kg on the shelf
/// let movement = db
///     .adjustments()
///     .adjust(&flour.id, 4_500, Some("physical count"))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct AdjustmentEngine {
    pool: SqlitePool,
}

impl AdjustmentEngine {
    /// Creates a new AdjustmentEngine.
    pub fn new(pool: SqlitePool) -> Self {
        AdjustmentEngine { pool }
    }

    /// Reconciles a product to a counted quantity.
    ///
    /// Returns the adjustment movement, or `None` when the count matches
    /// the stored quantity (a no-op writes nothing).
    ///
    /// ## Errors
    /// * `Validation` - counted quantity is negative
    /// * `NotFound` / `Inactive` - product missing or soft-deleted
    pub async fn adjust(
        &self,
        product_id: &str,
        counted_milli: i64,
        reason: Option<&str>,
    ) -> LedgerResult<Option<StockMovement>> {
        validation::validate_counted_milli("counted quantity", counted_milli)?;

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::Core(CoreError::not_found("Product", product_id)))?;
        if !product.is_active {
            return Err(LedgerError::Core(CoreError::inactive(
                "Product", product_id,
            )));
        }

        let delta = counted_milli - product.quantity_milli;
        if delta == 0 {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let movement = apply_movement(
            &mut *tx,
            NewMovement {
                product_id,
                movement_type: MovementType::Adjustment,
                quantity_milli: delta,
                source: MovementSource::Manual,
                reason,
                sale_id: None,
                bill_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            delta,
            reason = reason.unwrap_or("-"),
            "Stock adjusted"
        );

        Ok(Some(movement))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use larder_core::Unit;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_downward_count_writes_negative_adjustment() {
        let db = test_db().await;
        let flour = db
            .products()
            .insert(NewProduct::base("Flour", 6_000, Unit::Kg))
            .await
            .unwrap();

        let movement = db
            .adjustments()
            .adjust(&flour.id, 4_500, Some("physical count"))
            .await
            .unwrap()
            .expect("count differs, movement expected");

        assert_eq!(movement.quantity_milli, -1_500);
        assert_eq!(movement.balance_after_milli, 4_500);
        assert_eq!(movement.movement_type, MovementType::Adjustment);
        assert_eq!(movement.source, MovementSource::Manual);
        assert_eq!(movement.reason.as_deref(), Some("physical count"));

        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.quantity_milli, 4_500);
    }

    #[tokio::test]
    async fn test_matching_count_is_a_noop() {
        let db = test_db().await;
        let flour = db
            .products()
            .insert(NewProduct::base("Flour", 6_000, Unit::Kg))
            .await
            .unwrap();

        let movement = db.adjustments().adjust(&flour.id, 6_000, None).await.unwrap();
        assert!(movement.is_none());
        assert_eq!(db.movements().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counting_to_zero_empties_the_shelf() {
        let db = test_db().await;
        let milk = db
            .products()
            .insert(NewProduct::base("Milk", 2_000, Unit::L))
            .await
            .unwrap();

        let movement = db
            .adjustments()
            .adjust(&milk.id, 0, Some("spoilage"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(movement.quantity_milli, -2_000);

        let milk = db.products().get_by_id(&milk.id).await.unwrap();
        assert_eq!(milk.quantity_milli, 0);
        assert!(db.movements().verify_balance().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_count_rejected() {
        let db = test_db().await;
        let milk = db
            .products()
            .insert(NewProduct::base("Milk", 2_000, Unit::L))
            .await
            .unwrap();

        let err = db.adjustments().adjust(&milk.id, -1, None).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_product_cannot_be_adjusted() {
        let db = test_db().await;
        let milk = db
            .products()
            .insert(NewProduct::base("Milk", 2_000, Unit::L))
            .await
            .unwrap();
        db.products().deactivate(&milk.id).await.unwrap();

        let err = db.adjustments().adjust(&milk.id, 0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Inactive { .. })));
    }
}
