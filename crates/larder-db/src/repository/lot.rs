//! # Expiration Lot Repository
//!
//! Best-before (DLC) tracking per delivered batch.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │     stored status                      derived condition (read time)   │
//! │                                                                         │
//! │        active ───consume──► consumed       active + date >= today      │
//! │          │                                       → Active              │
//! │          └───────discard──► discarded      active + date <  today      │
//! │                                                  → Expired             │
//! │     (terminal states never transition)     consumed / discarded        │
//! │                                                  → as stored           │
//! │                                                                         │
//! │  "expired" is never written to the database; crossing midnight         │
//! │  reclassifies lots without touching a single row.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lots track dates for food safety, independently of the product's
//! aggregate quantity; consuming or discarding a lot does not write to the
//! movement ledger.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use larder_core::{
    expiration, validation, CoreError, ExpirationLot, LotCondition, LotStatus, Unit,
};

/// Fields needed to register a lot.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub product_id: String,
    pub expiration_date: NaiveDate,
    pub quantity_milli: i64,
    pub unit: Unit,
    pub batch_number: Option<String>,
    pub supplier_id: Option<String>,
}

/// A lot joined with its derived condition as of a given day.
#[derive(Debug, Clone)]
pub struct LotView {
    pub lot: ExpirationLot,
    pub condition: LotCondition,
}

/// What happened to an entry of a batch save.
#[derive(Debug)]
pub struct BatchFailure {
    /// Index into the submitted batch.
    pub index: usize,
    pub error: LedgerError,
}

/// Outcome of a batch save: entries apply independently, in order, stopping
/// at the first failure. Lots created before the failure stay created.
#[derive(Debug)]
pub struct BatchOutcome {
    pub created: Vec<ExpirationLot>,
    pub failure: Option<BatchFailure>,
}

impl BatchOutcome {
    /// True when every entry applied.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Repository for best-before lots.
///
/// ## Usage
/// ```rust,ignore
/// let lot = db.lots().create(new_lot).await?;
/// db.lots().consume(&lot.id).await?;
///
/// let today = chrono::Utc::now().date_naive();
/// let board = db.lots().list(today).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    /// Creates a new LotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Registers a lot in the `active` state.
    ///
    /// A date already in the past is accepted: the lot simply reads back
    /// as Expired (late data entry is normal after a weekend).
    pub async fn create(&self, new: NewLot) -> LedgerResult<ExpirationLot> {
        validation::validate_quantity_milli("lot quantity", new.quantity_milli)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
            .bind(&new.product_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(LedgerError::Core(CoreError::not_found(
                "Product",
                &new.product_id,
            )));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO expiration_lots (
                id, product_id, expiration_date, quantity_milli, unit,
                status, batch_number, supplier_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.product_id)
        .bind(new.expiration_date)
        .bind(new.quantity_milli)
        .bind(new.unit)
        .bind(&new.batch_number)
        .bind(&new.supplier_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, product_id = %new.product_id, "Lot registered");
        self.get_by_id(&id).await
    }

    /// Saves a batch of lots, applying each entry independently in order
    /// and stopping at the first failure.
    ///
    /// Lots created before the failing entry stay on the books; the
    /// outcome reports which entry failed and why, so the submitter can
    /// fix that entry and resubmit the remainder.
    pub async fn create_batch(&self, batch: Vec<NewLot>) -> BatchOutcome {
        let mut created = Vec::with_capacity(batch.len());

        for (index, new) in batch.into_iter().enumerate() {
            match self.create(new).await {
                Ok(lot) => created.push(lot),
                Err(error) => {
                    warn!(index, %error, "Batch lot save stopped");
                    return BatchOutcome {
                        created,
                        failure: Some(BatchFailure { index, error }),
                    };
                }
            }
        }

        BatchOutcome {
            created,
            failure: None,
        }
    }

    /// Marks an active lot as consumed.
    pub async fn consume(&self, id: &str) -> LedgerResult<ExpirationLot> {
        self.transition(id, LotStatus::Consumed).await
    }

    /// Marks an active lot as discarded.
    pub async fn discard(&self, id: &str) -> LedgerResult<ExpirationLot> {
        self.transition(id, LotStatus::Discarded).await
    }

    /// Gets a lot by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<ExpirationLot> {
        sqlx::query_as::<_, ExpirationLot>("SELECT * FROM expiration_lots WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::Core(CoreError::not_found("Lot", id)))
    }

    /// Lots of one product with conditions derived as of `today`, soonest
    /// expiry first.
    pub async fn lots_for_product(
        &self,
        product_id: &str,
        today: NaiveDate,
    ) -> LedgerResult<Vec<LotView>> {
        let lots = sqlx::query_as::<_, ExpirationLot>(
            r#"
            SELECT * FROM expiration_lots
            WHERE product_id = ?1
            ORDER BY expiration_date, created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(classify_all(lots, today))
    }

    /// Every lot with conditions derived as of `today`, soonest expiry
    /// first. The expiration board.
    pub async fn list(&self, today: NaiveDate) -> LedgerResult<Vec<LotView>> {
        let lots = sqlx::query_as::<_, ExpirationLot>(
            "SELECT * FROM expiration_lots ORDER BY expiration_date, created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(classify_all(lots, today))
    }

    /// Active lots expiring within `days` of `today` (still-edible stock
    /// to use first), plus those already expired.
    pub async fn expiring_soon(
        &self,
        today: NaiveDate,
        days: i64,
    ) -> LedgerResult<Vec<LotView>> {
        let horizon = today + chrono::Duration::days(days);
        let lots = sqlx::query_as::<_, ExpirationLot>(
            r#"
            SELECT * FROM expiration_lots
            WHERE status = 'active' AND expiration_date <= ?1
            ORDER BY expiration_date, created_at
            "#,
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;
        Ok(classify_all(lots, today))
    }

    /// The state-machine edge: only `active` rows move, and only once.
    async fn transition(&self, id: &str, to: LotStatus) -> LedgerResult<ExpirationLot> {
        let result = sqlx::query(
            r#"
            UPDATE expiration_lots SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing lot from an illegal transition
            let current = self.get_by_id(id).await?;
            return Err(LedgerError::Core(CoreError::InvalidTransition {
                id: id.to_string(),
                current: current.status.to_string(),
            }));
        }

        info!(id = %id, to = %to, "Lot transitioned");
        self.get_by_id(id).await
    }
}

fn classify_all(lots: Vec<ExpirationLot>, today: NaiveDate) -> Vec<LotView> {
    lots.into_iter()
        .map(|lot| {
            let condition = expiration::classify(lot.status, lot.expiration_date, today);
            LotView { lot, condition }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
