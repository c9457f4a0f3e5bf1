//! # Movement Repository
//!
//! Read side of the stock-movement ledger. Writes happen only through
//! [`crate::ledger::apply_movement`]; this repository never inserts,
//! updates, or deletes ledger rows.

use sqlx::SqlitePool;

use crate::error::DbResult;
use larder_core::StockMovement;

/// A product whose on-hand quantity disagrees with its ledger.
///
/// An empty report means invariant holds:
/// `quantity == initial_quantity + Σ(movement quantities)`.
#[derive(Debug, Clone)]
pub struct BalanceMismatch {
    pub product_id: String,
    pub name: String,
    /// initial_quantity + Σ(movements), in milli-units.
    pub expected_milli: i64,
    /// Stored quantity_milli.
    pub actual_milli: i64,
}

/// Repository for ledger history queries.
///
/// ## Usage
/// ```rust,ignore
/// let history = db.movements().for_product(&flour.id).await?;
/// let drift = db.movements().verify_balance().await?;
/// assert!(drift.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Full movement history for a product, oldest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Movements caused by a sale (deductions and reversals), oldest first.
    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Movements caused by a confirmed bill, oldest first.
    pub async fn for_bill(&self, bill_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE bill_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Counts all ledger rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Cross-checks every product against its ledger.
    ///
    /// Diagnostic query for periodic audits; a non-empty result means a
    /// write bypassed the ledger (or a bug in it).
    pub async fn verify_balance(&self) -> DbResult<Vec<BalanceMismatch>> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                p.id,
                p.name,
                p.initial_quantity_milli + COALESCE(SUM(m.quantity_milli), 0) AS expected,
                p.quantity_milli AS actual
            FROM products p
            LEFT JOIN stock_movements m ON m.product_id = p.id
            GROUP BY p.id
            HAVING expected != actual
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, expected_milli, actual_milli)| BalanceMismatch {
                product_id,
                name,
                expected_milli,
                actual_milli,
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
