//! # Recipe Graph
//!
//! Dishes, their weighted ingredient lists, and composite (prepared)
//! product bills of materials. The feasibility and cost math itself is
//! pure and lives in `larder_core::recipe`; this repository resolves the
//! graph into [`IngredientLine`] rows and delegates.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Two Graphs, One Shape                          │
//! │                                                                         │
//! │  Dish ──recipe_ingredients──► Product          (per unit sold)         │
//! │  Composite Product ──composite_ingredients──► Product (per batch)      │
//! │                                                                         │
//! │  Both resolve to Vec<IngredientLine>:                                   │
//! │    (product_id, name, required_milli, available_milli, price?)          │
//! │  and feed the same pure math in larder-core.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, LedgerError, LedgerResult};
use larder_core::{
    recipe, validation, CoreError, CostRollup, Dish, IngredientLine, RecipeIngredient,
};

/// Repository for dishes, recipes and composite compositions.
///
/// ## Usage
/// ```rust,ignore
/// let graph = db.recipes();
/// let dish = graph.create_dish("Bolognese", Some(1450)).await?;
/// graph.set_ingredient(&dish.id, &beef.id, 200).await?;
///
/// let makeable = graph.max_units(&dish.id).await?;
/// let cost = graph.dish_cost(&dish.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct RecipeGraph {
    pool: SqlitePool,
}

impl RecipeGraph {
    /// Creates a new RecipeGraph.
    pub fn new(pool: SqlitePool) -> Self {
        RecipeGraph { pool }
    }

    // =========================================================================
    // Dishes
    // =========================================================================

    /// Creates a dish with an empty recipe.
    pub async fn create_dish(
        &self,
        name: &str,
        selling_price_cents: Option<i64>,
    ) -> LedgerResult<Dish> {
        validation::validate_name("name", name)?;
        if let Some(price) = selling_price_cents {
            validation::validate_price_cents(price)?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO dishes (id, name, is_active, selling_price_cents, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?4, ?4)
            "#,
        )
        .bind(&id)
        .bind(name.trim())
        .bind(selling_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, name = %name, "Dish created");
        self.get_dish(&id).await
    }

    /// Gets a dish by ID.
    pub async fn get_dish(&self, id: &str) -> LedgerResult<Dish> {
        sqlx::query_as::<_, Dish>("SELECT * FROM dishes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Dish", id).into())
    }

    /// Lists active dishes sorted by name.
    pub async fn list_dishes(&self) -> LedgerResult<Vec<Dish>> {
        let dishes =
            sqlx::query_as::<_, Dish>("SELECT * FROM dishes WHERE is_active = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(dishes)
    }

    /// Updates a dish's name, price and active flag.
    pub async fn update_dish(&self, dish: &Dish) -> LedgerResult<Dish> {
        validation::validate_name("name", &dish.name)?;

        let result = sqlx::query(
            r#"
            UPDATE dishes SET
                name = ?2, selling_price_cents = ?3, is_active = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&dish.id)
        .bind(dish.name.trim())
        .bind(dish.selling_price_cents)
        .bind(dish.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Dish", &dish.id).into());
        }
        self.get_dish(&dish.id).await
    }

    /// Soft-deletes a dish. Past sales keep pointing at it.
    pub async fn deactivate_dish(&self, id: &str) -> LedgerResult<()> {
        let result =
            sqlx::query("UPDATE dishes SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Dish", id).into());
        }
        Ok(())
    }

    // =========================================================================
    // Recipe edges
    // =========================================================================

    /// Sets how much of a product one unit of a dish consumes.
    ///
    /// Upserts the (dish, product) edge; the quantity is expressed in the
    /// product's own unit. Zero or negative quantities are rejected -
    /// remove the edge instead.
    pub async fn set_ingredient(
        &self,
        dish_id: &str,
        product_id: &str,
        quantity_milli: i64,
    ) -> LedgerResult<()> {
        validation::validate_quantity_milli("quantity", quantity_milli)?;

        // The edge carries the product's unit
        let unit: Option<String> = sqlx::query_scalar("SELECT unit FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        let unit =
            unit.ok_or_else(|| LedgerError::Core(CoreError::not_found("Product", product_id)))?;

        // Dish must exist for a sensible error before the FK fires
        self.get_dish(dish_id).await?;

        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (id, dish_id, product_id, quantity_milli, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (dish_id, product_id)
            DO UPDATE SET quantity_milli = excluded.quantity_milli
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(dish_id)
        .bind(product_id)
        .bind(quantity_milli)
        .bind(&unit)
        .execute(&self.pool)
        .await?;

        debug!(dish_id = %dish_id, product_id = %product_id, quantity_milli, "Ingredient set");
        Ok(())
    }

    /// Removes a (dish, product) edge. Missing edges are a no-op.
    pub async fn remove_ingredient(&self, dish_id: &str, product_id: &str) -> LedgerResult<()> {
        sqlx::query("DELETE FROM recipe_ingredients WHERE dish_id = ?1 AND product_id = ?2")
            .bind(dish_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Raw recipe edges for a dish.
    pub async fn ingredients(&self, dish_id: &str) -> LedgerResult<Vec<RecipeIngredient>> {
        let rows = sqlx::query_as::<_, RecipeIngredient>(
            "SELECT * FROM recipe_ingredients WHERE dish_id = ?1",
        )
        .bind(dish_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sets how much of a base product one batch of a composite product
    /// consumes.
    pub async fn set_composite_ingredient(
        &self,
        composite_id: &str,
        product_id: &str,
        quantity_milli: i64,
    ) -> LedgerResult<()> {
        validation::validate_quantity_milli("quantity", quantity_milli)?;

        let unit: Option<String> = sqlx::query_scalar("SELECT unit FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        let unit =
            unit.ok_or_else(|| LedgerError::Core(CoreError::not_found("Product", product_id)))?;

        let is_composite: Option<bool> =
            sqlx::query_scalar("SELECT is_composite FROM products WHERE id = ?1")
                .bind(composite_id)
                .fetch_optional(&self.pool)
                .await?;
        match is_composite {
            None => {
                return Err(LedgerError::Core(CoreError::not_found(
                    "Product",
                    composite_id,
                )))
            }
            Some(false) => {
                return Err(larder_core::ValidationError::InvalidFormat {
                    field: "composite_id".to_string(),
                    reason: "product is not composite".to_string(),
                }
                .into())
            }
            Some(true) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO composite_ingredients (id, composite_id, product_id, quantity_milli, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (composite_id, product_id)
            DO UPDATE SET quantity_milli = excluded.quantity_milli
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(composite_id)
        .bind(product_id)
        .bind(quantity_milli)
        .bind(&unit)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Resolved views
    // =========================================================================

    /// Resolves a dish's recipe into lines carrying live availability and
    /// prices.
    pub async fn recipe_lines(&self, dish_id: &str) -> LedgerResult<Vec<IngredientLine>> {
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
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Resolves a composite product's bill of materials, per batch.
    pub async fn composite_lines(&self, composite_id: &str) -> LedgerResult<Vec<IngredientLine>> {
        let lines = sqlx::query_as::<_, IngredientLine>(
            r#"
            SELECT
                c.product_id,
                p.name,
                c.quantity_milli AS required_milli,
                p.quantity_milli AS available_milli,
                p.unit_price_cents
            FROM composite_ingredients c
            JOIN products p ON p.id = c.product_id
            WHERE c.composite_id = ?1
            ORDER BY p.name
            "#,
        )
        .bind(composite_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    // =========================================================================
    // Feasibility & cost
    // =========================================================================

    /// Whether `quantity` units of the dish can be made from current stock.
    pub async fn can_fulfill(&self, dish_id: &str, quantity: i64) -> LedgerResult<bool> {
        let lines = self.recipe_lines(dish_id).await?;
        Ok(recipe::can_fulfill(&lines, quantity))
    }

    /// How many units of the dish current stock supports.
    pub async fn max_units(&self, dish_id: &str) -> LedgerResult<i64> {
        let lines = self.recipe_lines(dish_id).await?;
        Ok(recipe::max_units(&lines))
    }

    /// Ingredient cost of one unit of the dish.
    ///
    /// Partial sum with `has_missing_prices` raised when an ingredient has
    /// no recorded price.
    pub async fn dish_cost(&self, dish_id: &str) -> LedgerResult<CostRollup> {
        let lines = self.recipe_lines(dish_id).await?;
        Ok(recipe::dish_cost(&lines))
    }

    /// Cost of one whole output unit of a composite product.
    ///
    /// Forced to zero (flag raised) if any batch ingredient lacks a price.
    pub async fn composite_cost(&self, composite_id: &str) -> LedgerResult<CostRollup> {
        let yield_milli: Option<Option<i64>> =
            sqlx::query_scalar("SELECT yield_milli FROM products WHERE id = ?1")
                .bind(composite_id)
                .fetch_optional(&self.pool)
                .await?;
        let yield_milli = yield_milli
            .ok_or_else(|| LedgerError::Core(CoreError::not_found("Product", composite_id)))?
            .unwrap_or(0);

        let lines = self.composite_lines(composite_id).await?;
        Ok(recipe::composite_cost(&lines, yield_milli))
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
    async fn test_set_ingredient_upserts_edge() {
        let db = test_db().await;
        let beef = db
            .products()
            .insert(NewProduct::base("Beef", 4_000, Unit::Kg))
            .await
            .unwrap();
        let dish = db.recipes().create_dish("Burger", None).await.unwrap();

        db.recipes()
            .set_ingredient(&dish.id, &beef.id, 200)
            .await
            .unwrap();
        db.recipes()
            .set_ingredient(&dish.id, &beef.id, 250)
            .await
            .unwrap();

        let edges = db.recipes().ingredients(&dish.id).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].quantity_milli, 250);
        assert_eq!(edges[0].unit, Unit::Kg);
    }

    #[tokio::test]
    async fn test_feasibility_and_max_units() {
        let db = test_db().await;
        let beef = db
            .products()
            .insert(NewProduct::base("Beef", 4_000, Unit::Kg))
            .await
            .unwrap();
        let bun = db
            .products()
            .insert(NewProduct::base("Bun", 10_000, Unit::Piece))
            .await
            .unwrap();
        let dish = db.recipes().create_dish("Burger", Some(950)).await.unwrap();
        let graph = db.recipes();
        graph.set_ingredient(&dish.id, &beef.id, 200).await.unwrap();
        graph.set_ingredient(&dish.id, &bun.id, 1_000).await.unwrap();

        // 4 kg beef / 0.2 kg each = 20; 10 buns = 10 → beef is not limiting
        assert_eq!(graph.max_units(&dish.id).await.unwrap(), 10);
        assert!(graph.can_fulfill(&dish.id, 10).await.unwrap());
        assert!(!graph.can_fulfill(&dish.id, 11).await.unwrap());
    }

    #[tokio::test]
    async fn test_dish_cost_reflects_live_prices() {
        let db = test_db().await;
        let mut beef = NewProduct::base("Beef", 0, Unit::Kg);
        beef.unit_price_cents = Some(1_000); // €10/kg
        let beef = db.products().insert(beef).await.unwrap();
        let salt = db
            .products()
            .insert(NewProduct::base("Salt", 0, Unit::Kg))
            .await
            .unwrap();

        let dish = db.recipes().create_dish("Steak", None).await.unwrap();
        let graph = db.recipes();
        graph.set_ingredient(&dish.id, &beef.id, 300).await.unwrap();

        let rollup = graph.dish_cost(&dish.id).await.unwrap();
        assert_eq!(rollup.cost.cents(), 300); // 0.3 kg × €10
        assert!(!rollup.has_missing_prices);

        // Unpriced ingredient keeps the partial sum and raises the flag
        graph.set_ingredient(&dish.id, &salt.id, 10).await.unwrap();
        let rollup = graph.dish_cost(&dish.id).await.unwrap();
        assert_eq!(rollup.cost.cents(), 300);
        assert!(rollup.has_missing_prices);
    }

    #[tokio::test]
    async fn test_composite_cost_divides_by_yield() {
        let db = test_db().await;
        let mut tomato = NewProduct::base("Tomato", 0, Unit::Kg);
        tomato.unit_price_cents = Some(300);
        let tomato = db.products().insert(tomato).await.unwrap();
        let mut onion = NewProduct::base("Onion", 0, Unit::Kg);
        onion.unit_price_cents = Some(200);
        let onion = db.products().insert(onion).await.unwrap();

        let mut sauce = NewProduct::base("Tomato Sauce", 0, Unit::L);
        sauce.is_composite = true;
        sauce.yield_milli = Some(2_000);
        let sauce = db.products().insert(sauce).await.unwrap();

        let graph = db.recipes();
        graph
            .set_composite_ingredient(&sauce.id, &tomato.id, 1_000)
            .await
            .unwrap();
        graph
            .set_composite_ingredient(&sauce.id, &onion.id, 1_000)
            .await
            .unwrap();

        // (€3 + €2) per 2 l batch = €2.50 per liter
        let rollup = graph.composite_cost(&sauce.id).await.unwrap();
        assert_eq!(rollup.cost.cents(), 250);
        assert!(!rollup.has_missing_prices);

        // Clearing a price forces the whole result to zero
        let mut onion = db.products().get_by_id(&onion.id).await.unwrap();
        onion.unit_price_cents = None;
        db.products().update(&onion).await.unwrap();

        let rollup = graph.composite_cost(&sauce.id).await.unwrap();
        assert!(rollup.cost.is_zero());
        assert!(rollup.has_missing_prices);
    }

    #[tokio::test]
    async fn test_composite_edge_requires_composite_flag() {
        let db = test_db().await;
        let plain = db
            .products()
            .insert(NewProduct::base("Flour", 0, Unit::Kg))
            .await
            .unwrap();
        let other = db
            .products()
            .insert(NewProduct::base("Water", 0, Unit::L))
            .await
            .unwrap();

        let err = db
            .recipes()
            .set_composite_ingredient(&plain.id, &other.id, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(_)));
    }
}
