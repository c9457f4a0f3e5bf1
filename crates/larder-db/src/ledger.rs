//! # Stock-Movement Ledger
//!
//! The single write path for product quantities.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       apply_movement()                                  │
//! │                                                                         │
//! │  1. Read the product's current quantity        ─┐                       │
//! │  2. Compute balance-after = current + signed Δ  │ one unit of work,     │
//! │  3. Compare-and-swap the product quantity       │ on the caller's       │
//! │  4. Insert the movement row with the balance   ─┘ transaction           │
//! │                                                                         │
//! │  Invariant: quantity == initial + Σ(signed movement quantities)         │
//! │                                                                         │
//! │  No other code path may update products.quantity_milli.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Compare-And-Swap?
//! The sufficiency check in the engines is check-then-act: read quantity,
//! compare, then write. Under concurrent callers on the same product that
//! pattern loses updates unless the write is keyed on the quantity observed
//! at read time. The CAS here:
//!
//! ```sql
//! UPDATE products SET quantity_milli = ?new
//! WHERE id = ?id AND quantity_milli = ?observed
//! ```
//!
//! affects zero rows when another writer got in between, which surfaces as
//! [`CoreError::ConcurrencyConflict`]. The caller's transaction then rolls
//! back and the whole operation can be retried.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use larder_core::{CoreError, MovementSource, MovementType, StockMovement};

/// A movement to be applied. Quantity is signed: negative depletes.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub product_id: &'a str,
    pub movement_type: MovementType,
    /// Signed change in milli-units.
    pub quantity_milli: i64,
    pub source: MovementSource,
    pub reason: Option<&'a str>,
    pub sale_id: Option<&'a str>,
    pub bill_id: Option<&'a str>,
}

/// Applies one movement: CAS-updates the product quantity and appends the
/// ledger row with the post-mutation balance.
///
/// Runs on a borrowed connection so multi-ingredient operations can batch
/// several applications into one transaction.
///
/// ## Errors
/// * `NotFound` - the product does not exist
/// * `ConcurrencyConflict` - another writer changed the quantity between
///   the read and the write
pub async fn apply_movement(
    conn: &mut SqliteConnection,
    movement: NewMovement<'_>,
) -> LedgerResult<StockMovement> {
    let observed: Option<i64> =
        sqlx::query_scalar("SELECT quantity_milli FROM products WHERE id = ?1")
            .bind(movement.product_id)
            .fetch_optional(&mut *conn)
            .await?;

    let observed = observed
        .ok_or_else(|| LedgerError::Core(CoreError::not_found("Product", movement.product_id)))?;

    let balance_after = observed + movement.quantity_milli;
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products SET
            quantity_milli = ?2,
            updated_at = ?3
        WHERE id = ?1 AND quantity_milli = ?4
        "#,
    )
    .bind(movement.product_id)
    .bind(balance_after)
    .bind(now)
    .bind(observed)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::Core(CoreError::ConcurrencyConflict {
            product_id: movement.product_id.to_string(),
        }));
    }

    let row = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: movement.product_id.to_string(),
        movement_type: movement.movement_type,
        quantity_milli: movement.quantity_milli,
        balance_after_milli: balance_after,
        source: movement.source,
        reason: movement.reason.map(str::to_string),
        sale_id: movement.sale_id.map(str::to_string),
        bill_id: movement.bill_id.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity_milli, balance_after_milli,
            source, reason, sale_id, bill_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&row.id)
    .bind(&row.product_id)
    .bind(row.movement_type)
    .bind(row.quantity_milli)
    .bind(row.balance_after_milli)
    .bind(row.source)
    .bind(&row.reason)
    .bind(&row.sale_id)
    .bind(&row.bill_id)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %row.product_id,
        quantity = row.quantity_milli,
        balance_after = row.balance_after_milli,
        source = ?row.source,
        "Movement applied"
    );

    Ok(row)
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

    fn adjustment(product_id: &str, quantity_milli: i64) -> NewMovement<'_> {
        NewMovement {
            product_id,
            movement_type: MovementType::Adjustment,
            quantity_milli,
            source: MovementSource::Manual,
            reason: None,
            sale_id: None,
            bill_id: None,
        }
    }

    #[tokio::test]
    async fn test_missing_product_is_rejected() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = apply_movement(&mut conn, adjustment("no-such-id", 500))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_stale_quantity_write_is_rejected() {
        let db = test_db().await;
        let flour = db
            .products()
            .insert(NewProduct::base("Flour", 5_000, Unit::Kg))
            .await
            .unwrap();

        // A competing writer changing the quantity between the read and
        // the keyed write makes that write hit zero rows; suppress the
        // update to stand in for the interleaved writer
        sqlx::query(
            "CREATE TEMP TRIGGER quantity_race BEFORE UPDATE OF quantity_milli ON products \
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_movement(&mut conn, adjustment(&flour.id, -1_000))
            .await
            .unwrap_err();
        drop(conn);

        assert!(matches!(
            err,
            LedgerError::Core(CoreError::ConcurrencyConflict { .. })
        ));

        // Neither side of the movement landed
        sqlx::query("DROP TRIGGER quantity_race")
            .execute(db.pool())
            .await
            .unwrap();
        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.quantity_milli, 5_000);
        assert_eq!(db.movements().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_balance_snapshot_follows_each_application() {
        let db = test_db().await;
        let flour = db
            .products()
            .insert(NewProduct::base("Flour", 5_000, Unit::Kg))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let first = apply_movement(&mut conn, adjustment(&flour.id, -1_500))
            .await
            .unwrap();
        let second = apply_movement(&mut conn, adjustment(&flour.id, 2_000))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(first.balance_after_milli, 3_500);
        assert_eq!(second.balance_after_milli, 5_500);

        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.quantity_milli, 5_500);
    }
}
