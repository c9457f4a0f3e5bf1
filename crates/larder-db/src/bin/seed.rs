//! # Seed Data Generator
//!
//! Populates the database with a small working pantry for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p larder-db --bin seed
//!
//! # Specify database path
//! cargo run -p larder-db --bin seed -- --db ./data/larder.db
//! ```
//!
//! ## Generated Data
//! - A shelf of base products with prices and par levels
//! - A composite tomato sauce with its bill of materials
//! - Two dishes with recipes
//! - One confirmed supplier bill (restocks through the ledger)
//! - A few recorded sales and best-before lots

use std::env;

use chrono::{Duration, Utc};
use larder_core::Unit;
use larder_db::{BillLineInput, Database, DbConfig, NewLot, NewProduct};

/// name, starting quantity (milli), unit, price (cents), par level (milli)
const PANTRY: &[(&str, i64, Unit, i64, i64)] = &[
    ("Flour", 25_000, Unit::Kg, 120, 5_000),
    ("Beef Mince", 8_000, Unit::Kg, 1_150, 2_000),
    ("Tomato", 6_000, Unit::Kg, 290, 2_000),
    ("Onion", 4_000, Unit::Kg, 160, 1_000),
    ("Olive Oil", 5_000, Unit::L, 850, 1_000),
    ("Milk", 12_000, Unit::L, 95, 4_000),
    ("Butter", 3_000, Unit::Kg, 780, 500),
    ("Spaghetti", 10_000, Unit::Kg, 210, 3_000),
    ("Parmesan", 2_000, Unit::Kg, 1_890, 500),
    ("Burger Bun", 60_000, Unit::Piece, 35, 20_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder_db=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./larder_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Larder Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./larder_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Larder Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Base products
    let rows = PANTRY
        .iter()
        .map(|&(name, quantity, unit, price, par)| NewProduct {
            name: name.to_string(),
            initial_quantity_milli: quantity,
            unit,
            unit_price_cents: Some(price),
            par_level_milli: Some(par),
            trackable: true,
            is_composite: false,
            yield_milli: None,
            category: None,
        })
        .collect::<Vec<_>>();
    let imported = db.products().bulk_import(rows).await?;
    println!("✓ Imported {} base products", imported);

    let products = db.products();
    let tomato = products.get_by_name("Tomato").await?.ok_or("Tomato not seeded")?.id;
    let onion = products.get_by_name("Onion").await?.ok_or("Onion not seeded")?.id;
    let oil = products.get_by_name("Olive Oil").await?.ok_or("Olive Oil not seeded")?.id;
    let beef = products.get_by_name("Beef Mince").await?.ok_or("Beef Mince not seeded")?.id;
    let spaghetti = products.get_by_name("Spaghetti").await?.ok_or("Spaghetti not seeded")?.id;
    let parmesan = products.get_by_name("Parmesan").await?.ok_or("Parmesan not seeded")?.id;
    let bun = products.get_by_name("Burger Bun").await?.ok_or("Burger Bun not seeded")?.id;

    // Composite: 2 l of sauce per batch
    let mut sauce = NewProduct::base("Tomato Sauce", 2_000, Unit::L);
    sauce.is_composite = true;
    sauce.yield_milli = Some(2_000);
    let sauce = products.insert(sauce).await?;
    db.recipes()
        .set_composite_ingredient(&sauce.id, &tomato, 1_500)
        .await?;
    db.recipes()
        .set_composite_ingredient(&sauce.id, &onion, 300)
        .await?;
    db.recipes()
        .set_composite_ingredient(&sauce.id, &oil, 100)
        .await?;
    let rollup = db.recipes().composite_cost(&sauce.id).await?;
    println!("✓ Composite \"Tomato Sauce\" at {} per liter", rollup.cost);

    // Dishes
    let bolognese = db.recipes().create_dish("Spaghetti Bolognese", Some(1_450)).await?;
    db.recipes().set_ingredient(&bolognese.id, &spaghetti, 120).await?;
    db.recipes().set_ingredient(&bolognese.id, &beef, 180).await?;
    db.recipes().set_ingredient(&bolognese.id, &sauce.id, 150).await?;
    db.recipes().set_ingredient(&bolognese.id, &parmesan, 20).await?;

    let burger = db.recipes().create_dish("House Burger", Some(1_150)).await?;
    db.recipes().set_ingredient(&burger.id, &beef, 200).await?;
    db.recipes().set_ingredient(&burger.id, &bun, 1_000).await?;
    println!("✓ Created 2 dishes with recipes");

    // A confirmed delivery
    let bill = db.bills().create_bill().await?;
    let today = Utc::now().date_naive();
    db.bills()
        .confirm_bill(
            &bill.id,
            "Metro Cash & Carry",
            today - Duration::days(2),
            vec![
                BillLineInput {
                    product_id: Some(beef.clone()),
                    name: "Beef Mince".to_string(),
                    quantity_milli: 5_000,
                    unit: Unit::Kg,
                    unit_price_cents: Some(1_090),
                    total_cents: Some(5_450),
                },
                BillLineInput {
                    product_id: None,
                    name: "Basil".to_string(),
                    quantity_milli: 300,
                    unit: Unit::Kg,
                    unit_price_cents: Some(2_400),
                    total_cents: Some(720),
                },
            ],
        )
        .await?;
    println!("✓ Confirmed 1 supplier bill (2 lines)");

    // Sales over the last days
    for (days_ago, qty) in [(2, 6), (1, 4), (0, 3)] {
        db.sales()
            .record_sale(&bolognese.id, qty, today - Duration::days(days_ago), None)
            .await?;
    }
    db.sales().record_sale(&burger.id, 8, today, None).await?;
    println!("✓ Recorded 4 sales");

    // Best-before lots
    let outcome = db
        .lots()
        .create_batch(vec![
            NewLot {
                product_id: products.get_by_name("Milk").await?.ok_or("Milk not seeded")?.id,
                expiration_date: today + Duration::days(4),
                quantity_milli: 6_000,
                unit: Unit::L,
                batch_number: Some("L-2608-A".to_string()),
                supplier_id: None,
            },
            NewLot {
                product_id: beef.clone(),
                expiration_date: today + Duration::days(2),
                quantity_milli: 5_000,
                unit: Unit::Kg,
                batch_number: None,
                supplier_id: None,
            },
        ])
        .await;
    println!("✓ Registered {} best-before lots", outcome.created.len());

    // Sanity: the ledger must balance
    let drift = db.movements().verify_balance().await?;
    if drift.is_empty() {
        println!("✓ Ledger balances for every product");
    } else {
        for m in &drift {
            eprintln!(
                "✗ {} off-balance: expected {}, stored {}",
                m.name, m.expected_milli, m.actual_milli
            );
        }
    }

    let low = db.products().low_stock().await?;
    println!();
    println!("Low-stock products: {}", low.len());
    for p in &low {
        println!("  {} at {}", p.name, p.quantity());
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
