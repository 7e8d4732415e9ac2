//! Shared fixtures for engine tests: one in-memory database with a tenant
//! `t1` owning outlet `o1`, and a foreign tenant `t2` owning `o2`.

use chrono::Utc;

use kasir_core::{
    Ingredient, Item, Modifier, Money, Outlet, PaymentInput, Quantity, Recipe, ResourceKind,
    Variant,
};
use kasir_db::{Database, DbConfig};

use crate::config::EngineConfig;
use crate::context::{ActorRole, TenantContext};
use crate::engine::Engine;

pub(crate) struct Fixture {
    pub engine: Engine,
    pub db: Database,
    pub cashier: TenantContext,
    pub manager: TenantContext,
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default()).await
}

pub(crate) async fn fixture_with(config: EngineConfig) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    for (id, tenant) in [("o1", "t1"), ("o2", "t2")] {
        db.catalog()
            .insert_outlet(&Outlet {
                id: id.to_string(),
                tenant_id: tenant.to_string(),
                name: format!("Outlet {id}"),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    Fixture {
        engine: Engine::new(db.clone(), config),
        db,
        cashier: TenantContext::new("t1", "kasir-1", ActorRole::Cashier),
        manager: TenantContext::new("t1", "manager-1", ActorRole::Manager),
    }
}

pub(crate) fn cash(major: i64) -> PaymentInput {
    PaymentInput::new("cash", Money::from_major(major))
}

impl Fixture {
    /// Tracked item in `o1`.
    pub async fn item(&self, id: &str, price_major: i64, stock_units: i64) -> Item {
        self.item_in("o1", id, price_major, stock_units, true).await
    }

    pub async fn untracked_item(&self, id: &str, price_major: i64) -> Item {
        self.item_in("o1", id, price_major, 0, false).await
    }

    pub async fn item_in(
        &self,
        outlet_id: &str,
        id: &str,
        price_major: i64,
        stock_units: i64,
        track_stock: bool,
    ) -> Item {
        let now = Utc::now();
        let item = Item {
            id: id.to_string(),
            outlet_id: outlet_id.to_string(),
            name: format!("Item {id}"),
            price: Money::from_major(price_major),
            price_gofood: None,
            price_grabfood: None,
            price_shopeefood: None,
            track_stock,
            stock: Quantity::from_units(stock_units),
            min_stock: Quantity::from_units(2),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.catalog().insert_item(&item).await.unwrap();
        item
    }

    pub async fn ingredient(&self, id: &str, stock: Quantity, cost_major: i64) -> Ingredient {
        let ingredient = Ingredient {
            id: id.to_string(),
            outlet_id: "o1".to_string(),
            name: format!("Ingredient {id}"),
            unit: "gram".to_string(),
            stock,
            cost_per_unit: Money::from_major(cost_major),
            min_stock: Quantity::from_units(10),
            updated_at: Utc::now(),
        };
        self.db.catalog().insert_ingredient(&ingredient).await.unwrap();
        ingredient
    }

    pub async fn recipe(&self, item_id: &str, ingredient_id: &str, per_unit: Quantity) {
        self.db
            .catalog()
            .insert_recipe(&Recipe {
                id: format!("{item_id}-{ingredient_id}"),
                item_id: item_id.to_string(),
                ingredient_id: ingredient_id.to_string(),
                quantity: per_unit,
            })
            .await
            .unwrap();
    }

    pub async fn variant(&self, id: &str, item_id: &str, adjust_major: i64) {
        self.db
            .catalog()
            .insert_variant(&Variant {
                id: id.to_string(),
                item_id: item_id.to_string(),
                name: format!("Variant {id}"),
                price_adjust: Money::from_major(adjust_major),
            })
            .await
            .unwrap();
    }

    pub async fn modifier(&self, id: &str, price_major: i64) {
        self.db
            .catalog()
            .insert_modifier(&Modifier {
                id: id.to_string(),
                outlet_id: "o1".to_string(),
                name: format!("Modifier {id}"),
                price: Money::from_major(price_major),
            })
            .await
            .unwrap();
    }

    pub async fn stock(&self, kind: ResourceKind, id: &str) -> Quantity {
        self.db.stock().current_stock(kind, id).await.unwrap().unwrap()
    }

    pub async fn item_stock(&self, id: &str) -> Quantity {
        self.stock(ResourceKind::Item, id).await
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}
