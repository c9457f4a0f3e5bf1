//! # Replenishment Engine
//!
//! Supplier bills: the inbound side of the ledger.
//!
//! ## Confirmation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                confirm_bill(bill, supplier, lines)                      │
//! │                                                                         │
//! │  1. Bill must exist and still be pending                               │
//! │  2. Upsert supplier by exact name (first writer wins the row)          │
//! │  3. Per line: resolve to a product                                     │
//! │       mapped id    → that product, as-is                               │
//! │       known name   → the existing row, quantity and price untouched    │
//! │       unknown name → create with zero stock                            │
//! │  4. BEGIN                                                               │
//! │  5. Flip pending → processed, keyed on the pending status              │
//! │       zero rows hit? → AlreadyProcessed (someone else confirmed)       │
//! │  6. Persist lines, overwrite prices (last write wins), one inbound     │
//! │     movement per line (CAS write path)                                 │
//! │  7. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Product and supplier upserts run before the movement transaction: they
//! are idempotent by name, so a crash between steps 3 and 7 leaves at worst
//! some zero-stock products behind and the bill safely pending. Price
//! overwrites happen inside the transaction: a confirmation that loses the
//! status race (or fails mid-line) rolls back without touching prices.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::ledger::{apply_movement, NewMovement};
use crate::repository::product::ProductRepository;
use larder_core::{
    validation, Bill, BillLine, BillStatus, CoreError, MovementSource, MovementType, Supplier,
    Unit,
};

/// One line item of a bill under review (typically OCR output a human has
/// corrected).
#[derive(Debug, Clone)]
pub struct BillLineInput {
    /// Existing product the review screen mapped this line to. When set,
    /// the document name stays a label only; no product is created.
    pub product_id: Option<String>,
    /// Product name as it appears on the document; the upsert key for
    /// unmapped lines.
    pub name: String,
    /// Received quantity in milli-units.
    pub quantity_milli: i64,
    pub unit: Unit,
    /// Purchase price per whole unit, in cents.
    pub unit_price_cents: Option<i64>,
    /// Line total in cents.
    pub total_cents: Option<i64>,
}

/// Engine for supplier bills and their confirmation.
///
/// ## Usage
/// ```rust,ignore
/// let bill = db.bills().create_bill().await?;
/// // ... review screen fills in the lines ...
/// db.bills()
///     .confirm_bill(&bill.id, "Metro", date, lines)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ReplenishmentEngine {
    pool: SqlitePool,
}

impl ReplenishmentEngine {
    /// Creates a new ReplenishmentEngine.
    pub fn new(pool: SqlitePool) -> Self {
        ReplenishmentEngine { pool }
    }

    /// Creates an empty pending bill (the intake shell a review screen
    /// attaches lines to).
    pub async fn create_bill(&self) -> LedgerResult<Bill> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO bills (id, supplier_id, bill_date, total_cents, status, created_at, updated_at)
            VALUES (?1, NULL, NULL, NULL, 'pending', ?2, ?2)
            "#,
        )
        .bind(&id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, "Pending bill created");
        self.get_by_id(&id).await
    }

    /// Confirms a pending bill: resolves the supplier and every line to a
    /// product, then applies one inbound movement per line.
    ///
    /// Confirming twice is rejected with `AlreadyProcessed`; the stock from
    /// the first confirmation stands.
    ///
    /// The supplier and the bill date are required here: the review screen
    /// collects both before handing over. The bill total is the sum of the
    /// line totals that are present.
    pub async fn confirm_bill(
        &self,
        bill_id: &str,
        supplier_name: &str,
        bill_date: NaiveDate,
        lines: Vec<BillLineInput>,
    ) -> LedgerResult<Bill> {
        let bill = self.get_by_id(bill_id).await?;
        if bill.status == BillStatus::Processed {
            return Err(LedgerError::Core(CoreError::AlreadyProcessed {
                id: bill_id.to_string(),
            }));
        }

        for line in &lines {
            validation::validate_name("line name", &line.name)?;
            validation::validate_quantity_milli("line quantity", line.quantity_milli)?;
            if let Some(price) = line.unit_price_cents {
                validation::validate_price_cents(price)?;
            }
        }

        let supplier = self.upsert_supplier(supplier_name).await?;

        // Resolve lines to products up front; idempotent, no price writes
        let products = ProductRepository::new(self.pool.clone());
        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            let product = match &line.product_id {
                Some(id) => products.get_by_id(id).await?,
                None => products.upsert_by_name(&line.name, line.unit, None).await?,
            };
            resolved.push((product.id, line));
        }

        let total_cents = resolved
            .iter()
            .filter_map(|(_, line)| line.total_cents)
            .reduce(|a, b| a + b);

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Status flip keyed on 'pending' makes double confirmation lose
        let flipped = sqlx::query(
            r#"
            UPDATE bills SET
                status = 'processed',
                supplier_id = ?2,
                bill_date = ?3,
                total_cents = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(bill_id)
        .bind(&supplier.id)
        .bind(bill_date)
        .bind(total_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            return Err(LedgerError::Core(CoreError::AlreadyProcessed {
                id: bill_id.to_string(),
            }));
        }

        for (product_id, line) in &resolved {
            sqlx::query(
                r#"
                INSERT INTO bill_lines (
                    id, bill_id, product_id, name, quantity_milli, unit,
                    unit_price_cents, total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(bill_id)
            .bind(product_id)
            .bind(line.name.trim())
            .bind(line.quantity_milli)
            .bind(line.unit)
            .bind(line.unit_price_cents)
            .bind(line.total_cents)
            .execute(&mut *tx)
            .await?;

            // Last write wins, but only once the confirmation is committed
            if let Some(price) = line.unit_price_cents {
                sqlx::query(
                    "UPDATE products SET unit_price_cents = ?2, updated_at = ?3 WHERE id = ?1",
                )
                .bind(product_id)
                .bind(price)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }

            apply_movement(
                &mut *tx,
                NewMovement {
                    product_id,
                    movement_type: MovementType::Inbound,
                    quantity_milli: line.quantity_milli,
                    source: MovementSource::BillReceipt,
                    reason: None,
                    sale_id: None,
                    bill_id: Some(bill_id),
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            bill_id = %bill_id,
            supplier = %supplier.name,
            lines = resolved.len(),
            "Bill confirmed"
        );

        self.get_by_id(bill_id).await
    }

    /// Gets a bill by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Bill> {
        sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Bill", id).into())
    }

    /// Lists bills still awaiting confirmation, oldest first.
    pub async fn pending_bills(&self) -> LedgerResult<Vec<Bill>> {
        let bills = sqlx::query_as::<_, Bill>(
            "SELECT * FROM bills WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bills)
    }

    /// Persisted line items of a confirmed bill.
    pub async fn lines(&self, bill_id: &str) -> LedgerResult<Vec<BillLine>> {
        let lines =
            sqlx::query_as::<_, BillLine>("SELECT * FROM bill_lines WHERE bill_id = ?1")
                .bind(bill_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(lines)
    }

    /// Finds or creates a supplier by exact name (case-sensitive).
    pub async fn upsert_supplier(&self, name: &str) -> LedgerResult<Supplier> {
        validation::validate_name("supplier name", name)?;

        if let Some(existing) =
            sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
        {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO suppliers (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&id)
            .bind(name.trim())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(supplier)
    }

    /// Lists all suppliers sorted by name.
    pub async fn suppliers(&self) -> LedgerResult<Vec<Supplier>> {
        let suppliers =
            sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(suppliers)
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

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn line(name: &str, quantity_milli: i64, unit: Unit, price: Option<i64>) -> BillLineInput {
        BillLineInput {
            product_id: None,
            name: name.to_string(),
            quantity_milli,
            unit,
            unit_price_cents: price,
            total_cents: price.map(|p| p * quantity_milli / 1000),
        }
    }

    #[tokio::test]
    async fn test_confirm_restocks_known_and_creates_unknown() {
        let db = test_db().await;
        let mut flour = NewProduct::base("Flour", 2_000, Unit::Kg);
        flour.unit_price_cents = Some(100);
        let flour = db.products().insert(flour).await.unwrap();

        let bill = db.bills().create_bill().await.unwrap();
        let confirmed = db
            .bills()
            .confirm_bill(
                &bill.id,
                "Metro",
                date("2026-08-18"),
                vec![
                    line("Flour", 10_000, Unit::Kg, Some(120)),
                    line("Saffron", 5, Unit::Kg, Some(900_000)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(confirmed.status, BillStatus::Processed);
        assert!(confirmed.supplier_id.is_some());

        // Known product: quantity grows, price is replaced
        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.quantity_milli, 12_000);
        assert_eq!(flour.unit_price_cents, Some(120));

        // Unknown product: created, stocked entirely through the ledger
        let saffron = db
            .products()
            .get_by_name("Saffron")
            .await
            .unwrap()
            .expect("created on confirmation");
        assert_eq!(saffron.quantity_milli, 5);
        assert_eq!(saffron.initial_quantity_milli, 0);

        let movements = db.movements().for_bill(&bill.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements
            .iter()
            .all(|m| m.source == MovementSource::BillReceipt));
        assert!(db.movements().verify_balance().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mapped_line_restocks_the_mapped_product() {
        let db = test_db().await;
        let mut tomato = NewProduct::base("Tomato", 3_000, Unit::Kg);
        tomato.unit_price_cents = Some(250);
        let tomato = db.products().insert(tomato).await.unwrap();

        // Document description differs; the review screen mapped it by id
        let bill = db.bills().create_bill().await.unwrap();
        db.bills()
            .confirm_bill(
                &bill.id,
                "Metro",
                date("2026-08-18"),
                vec![BillLineInput {
                    product_id: Some(tomato.id.clone()),
                    name: "Frs tomate 5kg".to_string(),
                    quantity_milli: 5_000,
                    unit: Unit::Kg,
                    unit_price_cents: Some(290),
                    total_cents: Some(1_450),
                }],
            )
            .await
            .unwrap();

        let tomato = db.products().get_by_id(&tomato.id).await.unwrap();
        assert_eq!(tomato.quantity_milli, 8_000);
        assert_eq!(tomato.unit_price_cents, Some(290));

        // No duplicate product under the document wording
        assert!(db
            .products()
            .get_by_name("Frs tomate 5kg")
            .await
            .unwrap()
            .is_none());

        // The document wording survives on the persisted line
        let lines = db.bills().lines(&bill.id).await.unwrap();
        assert_eq!(lines[0].name, "Frs tomate 5kg");
        assert_eq!(lines[0].product_id, tomato.id);
    }

    #[tokio::test]
    async fn test_lost_confirmation_race_leaves_prices_untouched() {
        let db = test_db().await;
        let mut flour = NewProduct::base("Flour", 2_000, Unit::Kg);
        flour.unit_price_cents = Some(100);
        let flour = db.products().insert(flour).await.unwrap();

        let bill = db.bills().create_bill().await.unwrap();

        // A competing confirmation can land between the status check and
        // the guarded flip; suppress the flip to stand in for losing that
        // race, so the guarded update hits zero rows
        sqlx::query(
            "CREATE TEMP TRIGGER confirm_race BEFORE UPDATE OF status ON bills \
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .bills()
            .confirm_bill(
                &bill.id,
                "Metro",
                date("2026-08-18"),
                vec![line("Flour", 10_000, Unit::Kg, Some(999))],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::AlreadyProcessed { .. })
        ));

        // The losing confirmation left no trace: price, stock, ledger
        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.unit_price_cents, Some(100));
        assert_eq!(flour.quantity_milli, 2_000);
        assert_eq!(db.movements().count().await.unwrap(), 0);

        // Once the contention clears, the same bill confirms cleanly
        sqlx::query("DROP TRIGGER confirm_race")
            .execute(db.pool())
            .await
            .unwrap();
        db.bills()
            .confirm_bill(
                &bill.id,
                "Metro",
                date("2026-08-18"),
                vec![line("Flour", 10_000, Unit::Kg, Some(999))],
            )
            .await
            .unwrap();
        let flour = db.products().get_by_id(&flour.id).await.unwrap();
        assert_eq!(flour.unit_price_cents, Some(999));
        assert_eq!(flour.quantity_milli, 12_000);
    }

    #[tokio::test]
    async fn test_double_confirmation_is_rejected() {
        let db = test_db().await;
        let bill = db.bills().create_bill().await.unwrap();
        let lines = vec![line("Milk", 6_000, Unit::L, Some(90))];

        db.bills()
            .confirm_bill(&bill.id, "Metro", date("2026-08-18"), lines.clone())
            .await
            .unwrap();

        let err = db
            .bills()
            .confirm_bill(&bill.id, "Metro", date("2026-08-18"), lines)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::AlreadyProcessed { .. })
        ));

        // Stock from the first confirmation stands, unchanged
        let milk = db.products().get_by_name("Milk").await.unwrap().unwrap();
        assert_eq!(milk.quantity_milli, 6_000);
    }

    #[tokio::test]
    async fn test_supplier_upsert_reuses_exact_name() {
        let db = test_db().await;
        let engine = db.bills();

        let first = engine.upsert_supplier("Metro").await.unwrap();
        let again = engine.upsert_supplier("Metro").await.unwrap();
        assert_eq!(first.id, again.id);

        // Case differs → different supplier
        let other = engine.upsert_supplier("metro").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_pending_listing_and_line_persistence() {
        let db = test_db().await;
        let engine = db.bills();

        let open = engine.create_bill().await.unwrap();
        let done = engine.create_bill().await.unwrap();
        engine
            .confirm_bill(
                &done.id,
                "Metro",
                date("2026-08-18"),
                vec![line("Eggs", 30_000, Unit::Piece, Some(25))],
            )
            .await
            .unwrap();

        let pending = engine.pending_bills().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open.id);

        let lines = engine.lines(&done.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "Eggs");
        assert_eq!(lines[0].quantity_milli, 30_000);
    }
}
