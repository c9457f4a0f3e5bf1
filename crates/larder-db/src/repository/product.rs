//! # Product Repository
//!
//! Database operations for the product store.
//!
//! ## Key Operations
//! - CRUD with soft delete
//! - Upsert-by-name (exact, case-sensitive match)
//! - Bulk import with starting quantities
//! - Low-stock listing against par levels
//!
//! ## The Quantity Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  This repository NEVER writes products.quantity_milli.                  │
//! │                                                                         │
//! │  insert / bulk_import   set initial_quantity_milli (and the matching   │
//! │                         starting quantity) exactly once, at creation   │
//! │  update                 writes every descriptive column, skips the     │
//! │                         quantity pair                                  │
//! │  everything after that  goes through ledger::apply_movement            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, LedgerResult};
use larder_core::{validation, Product, Unit};

/// Fields needed to create a product. Everything else takes its default.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    /// Starting on-hand quantity in milli-units; becomes both the current
    /// and the initial quantity.
    pub initial_quantity_milli: i64,
    pub unit: Unit,
    pub unit_price_cents: Option<i64>,
    pub par_level_milli: Option<i64>,
    pub trackable: bool,
    pub is_composite: bool,
    pub yield_milli: Option<i64>,
    pub category: Option<String>,
}

impl NewProduct {
    /// A plain trackable base product with no price or par level.
    pub fn base(name: impl Into<String>, initial_quantity_milli: i64, unit: Unit) -> Self {
        NewProduct {
            name: name.into(),
            initial_quantity_milli,
            unit,
            unit_price_cents: None,
            par_level_milli: None,
            trackable: true,
            is_composite: false,
            yield_milli: None,
            category: None,
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let flour = repo.insert(NewProduct::base("Flour", 10_000, Unit::Kg)).await?;
/// let found = repo.get_by_name("Flour").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// The starting quantity is written to both `quantity_milli` and
    /// `initial_quantity_milli`, which anchors the ledger invariant
    /// without a synthetic opening movement.
    ///
    /// ## Errors
    /// * `Validation` - empty name, over-long name, negative quantity
    /// * `UniqueViolation` - a product with this name already exists
    pub async fn insert(&self, new: NewProduct) -> LedgerResult<Product> {
        validation::validate_name("name", &new.name)?;
        validation::validate_counted_milli("initial_quantity", new.initial_quantity_milli)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, quantity_milli, initial_quantity_milli, unit,
                unit_price_cents, par_level_milli, trackable, is_composite,
                yield_milli, category, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)
            "#,
        )
        .bind(&id)
        .bind(new.name.trim())
        .bind(new.initial_quantity_milli)
        .bind(new.unit)
        .bind(new.unit_price_cents)
        .bind(new.par_level_milli)
        .bind(new.trackable)
        .bind(new.is_composite)
        .bind(new.yield_milli)
        .bind(&new.category)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, name = %new.name, "Product inserted");
        self.get_by_id(&id).await
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id).into())
    }

    /// Gets a product by its exact name (case-sensitive).
    ///
    /// Returns `Ok(None)` on a miss; callers usually branch on it (the
    /// upsert path, bill line resolution).
    pub async fn get_by_name(&self, name: &str) -> LedgerResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self) -> LedgerResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Updates a product's descriptive fields.
    ///
    /// Deliberately does NOT write `quantity_milli` or
    /// `initial_quantity_milli`: quantities change only through the
    /// movement ledger.
    pub async fn update(&self, product: &Product) -> LedgerResult<Product> {
        validation::validate_name("name", &product.name)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                unit = ?3,
                unit_price_cents = ?4,
                par_level_milli = ?5,
                trackable = ?6,
                is_composite = ?7,
                yield_milli = ?8,
                category = ?9,
                is_active = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(product.name.trim())
        .bind(product.unit)
        .bind(product.unit_price_cents)
        .bind(product.par_level_milli)
        .bind(product.trackable)
        .bind(product.is_composite)
        .bind(product.yield_milli)
        .bind(&product.category)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id).into());
        }

        self.get_by_id(&product.id).await
    }

    /// Records a new purchase price for a product (last write wins).
    pub async fn set_unit_price(&self, id: &str, unit_price_cents: i64) -> LedgerResult<()> {
        validation::validate_price_cents(unit_price_cents)?;

        let result = sqlx::query(
            "UPDATE products SET unit_price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(unit_price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id).into());
        }
        Ok(())
    }

    /// Soft-deletes a product. Its ledger history stays intact.
    pub async fn deactivate(&self, id: &str) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id).into());
        }

        debug!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Finds or creates a product by exact name.
    ///
    /// ## Semantics
    /// - Match found: update the unit price if one is given (last write
    ///   wins) and return the existing row. Quantity is untouched.
    /// - No match: create the product with zero starting quantity; the
    ///   caller (typically bill confirmation) supplies stock through the
    ///   ledger afterwards.
    pub async fn upsert_by_name(
        &self,
        name: &str,
        unit: Unit,
        unit_price_cents: Option<i64>,
    ) -> LedgerResult<Product> {
        if let Some(existing) = self.get_by_name(name).await? {
            if let Some(price) = unit_price_cents {
                self.set_unit_price(&existing.id, price).await?;
                return self.get_by_id(&existing.id).await;
            }
            return Ok(existing);
        }

        self.insert(NewProduct {
            name: name.to_string(),
            initial_quantity_milli: 0,
            unit,
            unit_price_cents,
            par_level_milli: None,
            trackable: true,
            is_composite: false,
            yield_milli: None,
            category: None,
        })
        .await
    }

    /// Imports a batch of products in one transaction.
    ///
    /// All-or-nothing: a duplicate name or invalid row rolls the whole
    /// import back. Returns the number of products created.
    pub async fn bulk_import(&self, rows: Vec<NewProduct>) -> LedgerResult<usize> {
        for row in &rows {
            validation::validate_name("name", &row.name)?;
            validation::validate_counted_milli("initial_quantity", row.initial_quantity_milli)?;
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let count = rows.len();

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO products (
                    id, name, quantity_milli, initial_quantity_milli, unit,
                    unit_price_cents, par_level_milli, trackable, is_composite,
                    yield_milli, category, is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(row.name.trim())
            .bind(row.initial_quantity_milli)
            .bind(row.unit)
            .bind(row.unit_price_cents)
            .bind(row.par_level_milli)
            .bind(row.trackable)
            .bind(row.is_composite)
            .bind(row.yield_milli)
            .bind(&row.category)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count, "Bulk import committed");
        Ok(count)
    }

    /// Lists active trackable products at or below their par level.
    pub async fn low_stock(&self) -> LedgerResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND trackable = 1
              AND par_level_milli IS NOT NULL
              AND quantity_milli <= par_level_milli
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Counts all products (active and inactive).
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
