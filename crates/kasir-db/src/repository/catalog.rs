//! # Catalog Repository
//!
//! Key-by-id lookups over the menu: outlets, items, variants, modifiers,
//! recipes and ingredients.
//!
//! Checkout only READS the catalog through this repository. Stock columns
//! are written exclusively by [`super::stock::StockRepository`] so that
//! every stock change has a ledger row next to it.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::{Ingredient, Item, Modifier, Money, Outlet, Recipe, Variant};

const ITEM_COLUMNS: &str = "id, outlet_id, name, price, price_gofood, price_grabfood, \
     price_shopeefood, track_stock, stock, min_stock, is_active, created_at, updated_at";

const INGREDIENT_COLUMNS: &str =
    "id, outlet_id, name, unit, stock, cost_per_unit, min_stock, updated_at";

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Outlets
    // =========================================================================

    pub async fn get_outlet(&self, id: &str) -> DbResult<Option<Outlet>> {
        let outlet = sqlx::query_as::<_, Outlet>(
            "SELECT id, tenant_id, name, created_at FROM outlets WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outlet)
    }

    pub async fn insert_outlet(&self, outlet: &Outlet) -> DbResult<()> {
        debug!(id = %outlet.id, tenant_id = %outlet.tenant_id, "Inserting outlet");

        sqlx::query("INSERT INTO outlets (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&outlet.id)
            .bind(&outlet.tenant_id)
            .bind(&outlet.name)
            .bind(outlet.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Fetches the given items restricted to one outlet.
    ///
    /// Ids that don't exist, or belong to another outlet, are simply absent
    /// from the result; the caller turns that into `ItemNotFound`.
    pub async fn get_items_in_outlet(&self, outlet_id: &str, ids: &[String]) -> DbResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM items WHERE outlet_id = "));
        qb.push_bind(outlet_id);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let items = qb.build_query_as::<Item>().fetch_all(&self.pool).await?;
        Ok(items)
    }

    pub async fn insert_item(&self, item: &Item) -> DbResult<()> {
        debug!(id = %item.id, name = %item.name, "Inserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                id, outlet_id, name, price,
                price_gofood, price_grabfood, price_shopeefood,
                track_stock, stock, min_stock, is_active,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.outlet_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.price_gofood)
        .bind(item.price_grabfood)
        .bind(item.price_shopeefood)
        .bind(item.track_stock)
        .bind(item.stock)
        .bind(item.min_stock)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts items (used by the seed binary to avoid duplicate seeding).
    pub async fn count_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Variants & Modifiers
    // =========================================================================

    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            "SELECT id, item_id, name, price_adjust FROM variants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    pub async fn insert_variant(&self, variant: &Variant) -> DbResult<()> {
        sqlx::query("INSERT INTO variants (id, item_id, name, price_adjust) VALUES (?1, ?2, ?3, ?4)")
            .bind(&variant.id)
            .bind(&variant.item_id)
            .bind(&variant.name)
            .bind(variant.price_adjust)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetches modifiers by id within one outlet.
    pub async fn get_modifiers_in_outlet(
        &self,
        outlet_id: &str,
        ids: &[String],
    ) -> DbResult<Vec<Modifier>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, outlet_id, name, price FROM modifiers WHERE outlet_id = ",
        );
        qb.push_bind(outlet_id);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let modifiers = qb.build_query_as::<Modifier>().fetch_all(&self.pool).await?;
        Ok(modifiers)
    }

    pub async fn insert_modifier(&self, modifier: &Modifier) -> DbResult<()> {
        sqlx::query("INSERT INTO modifiers (id, outlet_id, name, price) VALUES (?1, ?2, ?3, ?4)")
            .bind(&modifier.id)
            .bind(&modifier.outlet_id)
            .bind(&modifier.name)
            .bind(modifier.price)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Recipes & Ingredients
    // =========================================================================

    /// Recipe edges of an item, read inside the caller's unit of work.
    pub async fn recipes_for_item(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
    ) -> DbResult<Vec<Recipe>> {
        let recipes = sqlx::query_as::<_, Recipe>(
            "SELECT id, item_id, ingredient_id, quantity FROM recipes WHERE item_id = ?1 ORDER BY rowid",
        )
        .bind(item_id)
        .fetch_all(conn)
        .await?;

        Ok(recipes)
    }

    pub async fn insert_recipe(&self, recipe: &Recipe) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO recipes (id, item_id, ingredient_id, quantity) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&recipe.id)
        .bind(&recipe.item_id)
        .bind(&recipe.ingredient_id)
        .bind(recipe.quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_ingredient(&self, id: &str) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    /// Same as [`Self::get_ingredient`], inside the caller's unit of work.
    pub async fn get_ingredient_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(ingredient)
    }

    pub async fn insert_ingredient(&self, ingredient: &Ingredient) -> DbResult<()> {
        debug!(id = %ingredient.id, name = %ingredient.name, "Inserting ingredient");

        sqlx::query(
            r#"
            INSERT INTO ingredients (
                id, outlet_id, name, unit, stock, cost_per_unit, min_stock, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&ingredient.id)
        .bind(&ingredient.outlet_id)
        .bind(&ingredient.name)
        .bind(&ingredient.unit)
        .bind(ingredient.stock)
        .bind(ingredient.cost_per_unit)
        .bind(ingredient.min_stock)
        .bind(ingredient.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records the latest purchase price of an ingredient.
    pub async fn update_ingredient_cost(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        cost_per_unit: Money,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE ingredients SET cost_per_unit = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(cost_per_unit)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kasir_core::Quantity;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        for (id, tenant) in [("o1", "t1"), ("o2", "t2")] {
            db.catalog()
                .insert_outlet(&Outlet {
                    id: id.to_string(),
                    tenant_id: tenant.to_string(),
                    name: format!("Outlet {id}"),
                    created_at: now,
                })
                .await
                .unwrap();
        }
        db
    }

    fn item(id: &str, outlet: &str) -> Item {
        let now = Utc::now();
        Item {
            id: id.to_string(),
            outlet_id: outlet.to_string(),
            name: id.to_uppercase(),
            price: Money::from_major(15_000),
            price_gofood: Some(Money::from_major(18_000)),
            price_grabfood: None,
            price_shopeefood: None,
            track_stock: true,
            stock: Quantity::from_units(7),
            min_stock: Quantity::from_units(2),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_item_roundtrip_keeps_money_and_quantity() {
        let db = setup().await;
        db.catalog().insert_item(&item("teh", "o1")).await.unwrap();

        let loaded = db.catalog().get_item("teh").await.unwrap().unwrap();
        assert_eq!(loaded.price, Money::from_major(15_000));
        assert_eq!(loaded.price_gofood, Some(Money::from_major(18_000)));
        assert_eq!(loaded.price_grabfood, None);
        assert_eq!(loaded.stock, Quantity::from_units(7));
        assert!(loaded.track_stock);
    }

    #[tokio::test]
    async fn test_items_filtered_by_outlet() {
        let db = setup().await;
        db.catalog().insert_item(&item("teh", "o1")).await.unwrap();
        db.catalog().insert_item(&item("kopi", "o2")).await.unwrap();

        let ids = vec!["teh".to_string(), "kopi".to_string(), "ghost".to_string()];
        let found = db.catalog().get_items_in_outlet("o1", &ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "teh");

        assert!(db.catalog().get_items_in_outlet("o1", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recipes_read_inside_unit_of_work() {
        let db = setup().await;
        db.catalog().insert_item(&item("nasi", "o1")).await.unwrap();
        db.catalog()
            .insert_recipe(&Recipe {
                id: "r1".to_string(),
                item_id: "nasi".to_string(),
                ingredient_id: "beras".to_string(),
                quantity: Quantity::from_thousandths(150),
            })
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let recipes = db.catalog().recipes_for_item(&mut tx, "nasi").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].quantity, Quantity::from_thousandths(150));
    }

    #[tokio::test]
    async fn test_modifiers_in_outlet() {
        let db = setup().await;
        db.catalog()
            .insert_modifier(&Modifier {
                id: "keju".to_string(),
                outlet_id: "o1".to_string(),
                name: "Extra Keju".to_string(),
                price: Money::from_major(3_000),
            })
            .await
            .unwrap();

        let ids = vec!["keju".to_string()];
        assert_eq!(db.catalog().get_modifiers_in_outlet("o1", &ids).await.unwrap().len(), 1);
        assert!(db.catalog().get_modifiers_in_outlet("o2", &ids).await.unwrap().is_empty());
    }
}
