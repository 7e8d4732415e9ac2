//! # Demo Data Seeder
//!
//! Populates a database with one cafe outlet: menu items, a size variant,
//! modifiers, ingredients and the recipes that link them.
//!
//! ## Usage
//! ```bash
//! cargo run -p kasir-db --bin seed
//!
//! # Specify database path and tenant
//! cargo run -p kasir-db --bin seed -- --db ./data/kasir.db --tenant tenant-demo
//! ```
//!
//! ## Generated Data
//! - Coffee drinks (tracked per cup, recipe-driven ingredient usage)
//! - Food (tracked per portion)
//! - Aggregator prices on a few items (GoFood, GrabFood, ShopeeFood)

use chrono::Utc;
use std::env;
use tracing::info;
use uuid::Uuid;

use kasir_core::{Ingredient, Item, Modifier, Money, Outlet, Quantity, Recipe, Variant};
use kasir_db::{Database, DbConfig};

/// (name, price in rupiah, starting stock, recipe as (ingredient, thousandths))
type MenuRow = (&'static str, i64, i64, &'static [(&'static str, i64)]);

const MENU: &[MenuRow] = &[
    ("Kopi Susu", 25_000, 50, &[("Espresso Beans", 18_000), ("Fresh Milk", 150_000), ("Palm Sugar", 20_000)]),
    ("Americano", 22_000, 50, &[("Espresso Beans", 18_000)]),
    ("Cafe Latte", 30_000, 40, &[("Espresso Beans", 18_000), ("Fresh Milk", 200_000)]),
    ("Es Teh Manis", 10_000, 80, &[("Palm Sugar", 15_000)]),
    ("Roti Bakar", 18_000, 25, &[]),
    ("Nasi Goreng", 35_000, 20, &[]),
];

/// (name, unit, starting stock in thousandths, cost per unit in rupiah)
const INGREDIENTS: &[(&str, &str, i64, i64)] = &[
    ("Espresso Beans", "gram", 2_000_000, 300),
    ("Fresh Milk", "ml", 10_000_000, 20),
    ("Palm Sugar", "gram", 1_500_000, 40),
];

const MODIFIERS: &[(&str, i64)] = &[("Extra Shot", 5_000), ("Oat Milk", 8_000), ("Less Sugar", 0)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./kasir_dev.db");
    let mut tenant_id = String::from("tenant-demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir Demo Data Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./kasir_dev.db)");
                println!("  -t, --tenant <ID>    Tenant id for the outlet (default: tenant-demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let catalog = db.catalog();

    let existing = catalog.count_items().await?;
    if existing > 0 {
        info!(existing, "Database already has items, skipping seed");
        return Ok(());
    }

    let now = Utc::now();
    let outlet = Outlet {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.clone(),
        name: "Kasir Demo Cafe".to_string(),
        created_at: now,
    };
    catalog.insert_outlet(&outlet).await?;

    let mut ingredient_ids = Vec::with_capacity(INGREDIENTS.len());
    for (name, unit, stock, cost) in INGREDIENTS {
        let ingredient = Ingredient {
            id: Uuid::new_v4().to_string(),
            outlet_id: outlet.id.clone(),
            name: name.to_string(),
            unit: unit.to_string(),
            stock: Quantity::from_thousandths(*stock),
            cost_per_unit: Money::from_major(*cost),
            min_stock: Quantity::from_thousandths(stock / 10),
            updated_at: now,
        };
        catalog.insert_ingredient(&ingredient).await?;
        ingredient_ids.push((*name, ingredient.id));
    }

    let mut seeded = 0;
    for (idx, (name, price, stock, recipe)) in MENU.iter().enumerate() {
        // every other item is also sold through the delivery apps, marked up
        let marked_up = (idx % 2 == 0).then(|| Money::from_major(price + price / 5));

        let item = Item {
            id: Uuid::new_v4().to_string(),
            outlet_id: outlet.id.clone(),
            name: name.to_string(),
            price: Money::from_major(*price),
            price_gofood: marked_up,
            price_grabfood: marked_up,
            price_shopeefood: marked_up,
            track_stock: true,
            stock: Quantity::from_units(*stock),
            min_stock: Quantity::from_units(5),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_item(&item).await?;

        for (ingredient_name, thousandths) in recipe.iter() {
            let Some((_, ingredient_id)) = ingredient_ids.iter().find(|(n, _)| n == ingredient_name)
            else {
                continue;
            };
            catalog
                .insert_recipe(&Recipe {
                    id: Uuid::new_v4().to_string(),
                    item_id: item.id.clone(),
                    ingredient_id: ingredient_id.clone(),
                    quantity: Quantity::from_thousandths(*thousandths),
                })
                .await?;
        }

        if !recipe.is_empty() {
            catalog
                .insert_variant(&Variant {
                    id: Uuid::new_v4().to_string(),
                    item_id: item.id.clone(),
                    name: "Large".to_string(),
                    price_adjust: Money::from_major(5_000),
                })
                .await?;
        }

        seeded += 1;
    }

    for (name, price) in MODIFIERS {
        catalog
            .insert_modifier(&Modifier {
                id: Uuid::new_v4().to_string(),
                outlet_id: outlet.id.clone(),
                name: name.to_string(),
                price: Money::from_major(*price),
            })
            .await?;
    }

    info!(
        db = %db_path,
        outlet_id = %outlet.id,
        tenant_id = %tenant_id,
        items = seeded,
        ingredients = INGREDIENTS.len(),
        modifiers = MODIFIERS.len(),
        "Seed complete"
    );

    Ok(())
}
