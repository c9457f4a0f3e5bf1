//! # Sale Engine
//!
//! Records dish sales and depletes ingredient stock through the ledger.
//!
//! ## Record Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_sale(dish, qty)                             │
//! │                                                                         │
//! │  1. Dish must exist and be active                                      │
//! │  2. BEGIN                                                               │
//! │  3. Resolve recipe → check EVERY ingredient                            │
//! │       any shortage? → InsufficientInventory (all of them) + ROLLBACK   │
//! │  4. INSERT sale row                                                    │
//! │  5. INSERT sale_ingredients snapshot (per-unit deltas, frozen)         │
//! │  6. One outbound movement per ingredient (CAS write path)              │
//! │  7. COMMIT - all movements or none                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Snapshot
//! Update and delete compensate from the `sale_ingredients` snapshot taken
//! at record time, never from the live recipe. Editing a recipe between a
//! sale and its reversal therefore cannot leak or fabricate stock.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::ledger::{apply_movement, NewMovement};
use larder_core::{
    recipe, validation, CoreError, Dish, IngredientLine, MovementSource, MovementType, Sale,
    SaleIngredient,
};

/// Engine for sale recording, update and reversal.
///
/// ## Usage
/// ```rust,ignore
/// let sale = db.sales().record_sale(&dish.id, 3, date, None).await?;
/// db.sales().update_sale(&sale.id, 5, None, None).await?;
/// db.sales().delete_sale(&sale.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleEngine {
    pool: SqlitePool,
}

impl SaleEngine {
    /// Creates a new SaleEngine.
    pub fn new(pool: SqlitePool) -> Self {
        SaleEngine { pool }
    }

    /// Records a sale of `quantity_sold` units of a dish.
    ///
    /// All-or-nothing: if any ingredient is short, the error lists every
    /// shortage and no quantity changes. A dish with an empty recipe
    /// records with zero movements.
    pub async fn record_sale(
        &self,
        dish_id: &str,
        quantity_sold: i64,
        sale_date: NaiveDate,
        notes: Option<&str>,
    ) -> LedgerResult<Sale> {
        validation::validate_sale_quantity(quantity_sold)?;

        let dish = self.fetch_dish(dish_id).await?;
        if !dish.is_active {
            return Err(LedgerError::Core(CoreError::inactive("Dish", dish_id)));
        }

        let mut tx = self.pool.begin().await?;

        let lines = recipe_lines(&mut *tx, dish_id).await?;
        let shortages = recipe::shortages(&lines, quantity_sold);
        if !shortages.is_empty() {
            return Err(LedgerError::Core(CoreError::InsufficientInventory {
                shortages,
            }));
        }

        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sales (id, dish_id, quantity_sold, sale_date, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&sale_id)
        .bind(dish_id)
        .bind(quantity_sold)
        .bind(sale_date)
        .bind(notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &lines {
            // Freeze the per-unit delta; reversals read this, not the recipe
            sqlx::query(
                r#"
                INSERT INTO sale_ingredients (sale_id, product_id, quantity_milli_per_unit)
                VALUES (?1, ?2, ?3)
                "#,
            )
            .bind(&sale_id)
            .bind(&line.product_id)
            .bind(line.required_milli)
            .execute(&mut *tx)
            .await?;

            apply_movement(
                &mut *tx,
                NewMovement {
                    product_id: &line.product_id,
                    movement_type: MovementType::Outbound,
                    quantity_milli: -(line.required_milli * quantity_sold),
                    source: MovementSource::RecipeDeduction,
                    reason: None,
                    sale_id: Some(&sale_id),
                    bill_id: None,
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            dish_id = %dish_id,
            quantity_sold,
            ingredients = lines.len(),
            "Sale recorded"
        );

        self.get_by_id(&sale_id).await
    }

    /// Changes a sale's quantity (and optionally date/notes), compensating
    /// stock from the frozen ingredient snapshot.
    ///
    /// - More units: further depletion, checked against live stock with the
    ///   same all-or-nothing shortage listing as recording
    /// - Fewer units: stock flows back as reversal movements
    /// - Same units: only the descriptive fields change
    pub async fn update_sale(
        &self,
        sale_id: &str,
        quantity_sold: i64,
        sale_date: Option<NaiveDate>,
        notes: Option<&str>,
    ) -> LedgerResult<Sale> {
        validation::validate_sale_quantity(quantity_sold)?;

        let existing = self.get_by_id(sale_id).await?;
        let delta = quantity_sold - existing.quantity_sold;

        let mut tx = self.pool.begin().await?;

        let snapshot = snapshot_lines(&mut *tx, sale_id).await?;

        if delta > 0 {
            // Additional depletion must clear the same sufficiency bar
            let lines = snapshot_as_ingredient_lines(&mut *tx, &snapshot).await?;
            let shortages = recipe::shortages(&lines, delta);
            if !shortages.is_empty() {
                return Err(LedgerError::Core(CoreError::InsufficientInventory {
                    shortages,
                }));
            }
        }

        for entry in &snapshot {
            let change = entry.quantity_milli_per_unit * delta;
            if change == 0 {
                continue;
            }
            let (movement_type, source) = if delta > 0 {
                (MovementType::Outbound, MovementSource::RecipeDeduction)
            } else {
                (MovementType::Inbound, MovementSource::SaleReversal)
            };
            apply_movement(
                &mut *tx,
                NewMovement {
                    product_id: &entry.product_id,
                    movement_type,
                    quantity_milli: -change,
                    source,
                    reason: None,
                    sale_id: Some(sale_id),
                    bill_id: None,
                },
            )
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE sales SET
                quantity_sold = ?2,
                sale_date = COALESCE(?3, sale_date),
                notes = COALESCE(?4, notes),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(quantity_sold)
        .bind(sale_date)
        .bind(notes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(sale_id = %sale_id, delta, "Sale updated");
        self.get_by_id(sale_id).await
    }

    /// Deletes a sale and restores every ingredient from the snapshot.
    ///
    /// The ledger rows keep their `sale_id` reference: the audit trail
    /// outlives the sale.
    pub async fn delete_sale(&self, sale_id: &str) -> LedgerResult<()> {
        let existing = self.get_by_id(sale_id).await?;

        let mut tx = self.pool.begin().await?;

        let snapshot = snapshot_lines(&mut *tx, sale_id).await?;

        for entry in &snapshot {
            apply_movement(
                &mut *tx,
                NewMovement {
                    product_id: &entry.product_id,
                    movement_type: MovementType::Inbound,
                    quantity_milli: entry.quantity_milli_per_unit * existing.quantity_sold,
                    source: MovementSource::SaleReversal,
                    reason: None,
                    sale_id: Some(sale_id),
                    bill_id: None,
                },
            )
            .await?;
        }

        sqlx::query("DELETE FROM sale_ingredients WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = %sale_id, "Sale deleted, stock restored");
        Ok(())
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Sale> {
        sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id).into())
    }

    /// Lists sales within a date range, newest first.
    pub async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE sale_date >= ?1 AND sale_date <= ?2
            ORDER BY sale_date DESC, created_at DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    /// The frozen per-unit ingredient deltas of a sale.
    pub async fn snapshot(&self, sale_id: &str) -> LedgerResult<Vec<SaleIngredient>> {
        let rows = sqlx::query_as::<_, SaleIngredient>(
            "SELECT * FROM sale_ingredients WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn fetch_dish(&self, dish_id: &str) -> LedgerResult<Dish> {
        sqlx::query_as::<_, Dish>("SELECT * FROM dishes WHERE id = ?1")
            .bind(dish_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::Core(CoreError::not_found("Dish", dish_id)))
    }
}

/// Resolves the live recipe on the transaction's connection, so the
/// availability read and the CAS writes see one consistent state.
async fn recipe_lines(
    conn: &mut SqliteConnection,
    dish_id: &str,
) -> LedgerResult<Vec<IngredientLine>> {
    let lines = sqlx::query_as::<_, IngredientLine>(
        r#"
        SELECT
            r.product_id,
            p.name,
            r.quantity_milli AS required_milli,
            p.quantity_milli AS available_milli,
            p.unit_price_cents
        FROM recipe_ingredients r
        JOIN products p ON p.id = r.product_id
        WHERE r.dish_id = ?1
        ORDER BY p.name
        "#,
    )
    .bind(dish_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// Loads a sale's frozen snapshot on the transaction's connection.
async fn snapshot_lines(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> LedgerResult<Vec<SaleIngredient>> {
    let rows = sqlx::query_as::<_, SaleIngredient>(
        "SELECT * FROM sale_ingredients WHERE sale_id = ?1",
    )
    .bind(sale_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Joins snapshot deltas with live availability for the sufficiency check
/// on an upward quantity change.
async fn snapshot_as_ingredient_lines(
    conn: &mut SqliteConnection,
    snapshot: &[SaleIngredient],
) -> LedgerResult<Vec<IngredientLine>> {
    let mut lines = Vec::with_capacity(snapshot.len());
    for entry in snapshot {
        let row: Option<(String, i64, Option<i64>)> = sqlx::query_as(
            "SELECT name, quantity_milli, unit_price_cents FROM products WHERE id = ?1",
        )
        .bind(&entry.product_id)
        .fetch_optional(&mut *conn)
        .await?;
        let (name, available_milli, unit_price_cents) = row.ok_or_else(|| {
            LedgerError::Core(CoreError::not_found("Product", &entry.product_id))
        })?;

        lines.push(IngredientLine {
            product_id: entry.product_id.clone(),
            name,
            required_milli: entry.quantity_milli_per_unit,
            available_milli,
            unit_price_cents,
        });
    }
    Ok(lines)
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

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn burger_setup(db: &Database) -> (String, String, String) {
        let beef = db
            .products()
            .insert(NewProduct::base("Beef", 4_000, Unit::Kg))
            .await
            .unwrap();
        let bun = db
            .products()
            .insert(NewProduct::base("Bun", 20_000, Unit::Piece))
            .await
            .unwrap();
        let dish = db.recipes().create_dish("Burger", Some(950)).await.unwrap();
        db.recipes()
            .set_ingredient(&dish.id, &beef.id, 200)
            .await
            .unwrap();
        db.recipes()
            .set_ingredient(&dish.id, &bun.id, 1_000)
            .await
            .unwrap();
        (dish.id, beef.id, bun.id)
    }

    #[tokio::test]
    async fn test_record_sale_depletes_each_ingredient() {
        let db = test_db().await;
        let (dish_id, beef_id, bun_id) = burger_setup(&db).await;

        let sale = db
            .sales()
            .record_sale(&dish_id, 3, date("2026-08-20"), None)
            .await
            .unwrap();
        assert_eq!(sale.quantity_sold, 3);

        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000 - 600);
        let bun = db.products().get_by_id(&bun_id).await.unwrap();
        assert_eq!(bun.quantity_milli, 20_000 - 3_000);

        let movements = db.movements().for_sale(&sale.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements
            .iter()
            .all(|m| m.source == MovementSource::RecipeDeduction));
    }

    #[tokio::test]
    async fn test_shortage_rejects_whole_sale_and_lists_all() {
        let db = test_db().await;
        let (dish_id, beef_id, bun_id) = burger_setup(&db).await;

        // 4 kg beef supports 20 burgers; 21 must fail without any change
        let err = db
            .sales()
            .record_sale(&dish_id, 21, date("2026-08-20"), None)
            .await
            .unwrap_err();

        match err {
            LedgerError::Core(CoreError::InsufficientInventory { shortages }) => {
                assert_eq!(shortages.len(), 2); // beef AND buns both short
                assert!(shortages.iter().any(|s| s.name == "Beef"));
                assert!(shortages.iter().any(|s| s.name == "Bun"));
            }
            other => panic!("expected InsufficientInventory, got {other:?}"),
        }

        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000);
        let bun = db.products().get_by_id(&bun_id).await.unwrap();
        assert_eq!(bun.quantity_milli, 20_000);
        assert_eq!(db.movements().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_restores_stock_exactly() {
        let db = test_db().await;
        let (dish_id, beef_id, _) = burger_setup(&db).await;

        let sale = db
            .sales()
            .record_sale(&dish_id, 5, date("2026-08-20"), None)
            .await
            .unwrap();
        db.sales().delete_sale(&sale.id).await.unwrap();

        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000);

        // Deduction and reversal both stay in the audit trail
        let movements = db.movements().for_sale(&sale.id).await.unwrap();
        assert_eq!(movements.len(), 4);

        assert!(db.sales().get_by_id(&sale.id).await.is_err());
        assert!(db.movements().verify_balance().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_compensates_only_the_delta() {
        let db = test_db().await;
        let (dish_id, beef_id, _) = burger_setup(&db).await;

        let sale = db
            .sales()
            .record_sale(&dish_id, 5, date("2026-08-20"), None)
            .await
            .unwrap();

        // 5 → 2: 3 portions of beef flow back
        db.sales().update_sale(&sale.id, 2, None, None).await.unwrap();
        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000 - 400);

        // 2 → 4: 2 more portions deplete
        db.sales().update_sale(&sale.id, 4, None, None).await.unwrap();
        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000 - 800);
    }

    #[tokio::test]
    async fn test_reversal_uses_snapshot_not_live_recipe() {
        let db = test_db().await;
        let (dish_id, beef_id, _) = burger_setup(&db).await;

        let sale = db
            .sales()
            .record_sale(&dish_id, 5, date("2026-08-20"), None)
            .await
            .unwrap();

        // Recipe edited after the sale: beef portion doubles
        db.recipes()
            .set_ingredient(&dish_id, &beef_id, 400)
            .await
            .unwrap();

        // The frozen snapshot still reads 200/unit
        let frozen = db.sales().snapshot(&sale.id).await.unwrap();
        assert_eq!(frozen.len(), 2);
        let beef_entry = frozen
            .iter()
            .find(|s| s.product_id == beef_id)
            .expect("beef in snapshot");
        assert_eq!(beef_entry.quantity_milli_per_unit, 200);

        // Deletion must restore the 200/unit frozen at record time
        db.sales().delete_sale(&sale.id).await.unwrap();
        let beef = db.products().get_by_id(&beef_id).await.unwrap();
        assert_eq!(beef.quantity_milli, 4_000);
    }

    #[tokio::test]
    async fn test_inactive_dish_cannot_be_sold() {
        let db = test_db().await;
        let (dish_id, _, _) = burger_setup(&db).await;
        db.recipes().deactivate_dish(&dish_id).await.unwrap();

        let err = db
            .sales()
            .record_sale(&dish_id, 1, date("2026-08-20"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Inactive { .. })));
    }

    #[tokio::test]
    async fn test_empty_recipe_sale_records_no_movements() {
        let db = test_db().await;
        let dish = db.recipes().create_dish("Tap Water", None).await.unwrap();

        let sale = db
            .sales()
            .record_sale(&dish.id, 2, date("2026-08-20"), Some("table 4"))
            .await
            .unwrap();

        assert_eq!(db.movements().for_sale(&sale.id).await.unwrap().len(), 0);
    }
}
