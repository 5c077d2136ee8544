//! # Seed Data Generator
//!
//! Populates the database with a toy catalog, a couple of promo codes and a
//! few expenses for development.
//!
//! ## Usage
//! ```bash
//! # Generate 60 products (default)
//! cargo run -p toyshop-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p toyshop-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p toyshop-db --bin seed -- --db ./data/toyshop.db
//! ```
//!
//! ## Generated Data
//! - Products across five categories, each with an age-range variant
//! - Price: 1,500 - 29,500, cost at 45-70% of price
//! - Stock: 0 - 24, low-stock threshold 3
//! - Promo codes `WELCOME10` (10%, min 5,000) and `TOYS2000` (fixed 2,000)
//! - One stock and one marketing expense per category

use chrono::{Duration, Utc};
use std::env;
use toyshop_core::{DiscountType, ExpenseCategory, Product};
use toyshop_db::repository::product::generate_product_id;
use toyshop_db::repository::promo::new_promo_code;
use toyshop_db::{Database, DbConfig, NewExpense};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "building",
        &[
            "Brick Castle",
            "Space Station Kit",
            "Wooden Blocks",
            "Marble Run",
            "Magnetic Tiles",
            "Train Set",
        ],
    ),
    (
        "plush",
        &[
            "Teddy Bear",
            "Plush Elephant",
            "Sleepy Bunny",
            "Dino Buddy",
            "Unicorn Pillow",
            "Panda Cub",
        ],
    ),
    (
        "outdoor",
        &[
            "Kite",
            "Jump Rope",
            "Water Blaster",
            "Bubble Wand",
            "Soccer Ball",
            "Scooter",
        ],
    ),
    (
        "puzzles",
        &[
            "Jigsaw 100pc",
            "Jigsaw 500pc",
            "Rubik Cube",
            "Shape Sorter",
            "Memory Cards",
            "Tangram Set",
        ],
    ),
    (
        "electronic",
        &[
            "Robot Dog",
            "RC Car",
            "Walkie Talkies",
            "Karaoke Mic",
            "Coding Robot",
            "Drone Mini",
        ],
    ),
];

/// Age-range variants for products, with their price addon
const AGE_RANGES: &[(&str, i64)] = &[("3+", 0), ("6+", 1_500)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./toyshop_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Toyshop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./toyshop_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Toyshop Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
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

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let mut first_of_category: Vec<(String, Product)> = Vec::new();

    'outer: for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (age_idx, (age, addon)) in AGE_RANGES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 100 + name_idx * 10 + age_idx;
                let product = generate_product(category, name, age, *addon, seed);

                match db.products().insert(&product).await {
                    Ok(p) => {
                        if !first_of_category.iter().any(|(c, _)| c == category) {
                            first_of_category.push((category.to_string(), p));
                        }
                    }
                    Err(e) => {
                        eprintln!("Failed to insert {}: {}", product.name, e);
                        continue;
                    }
                }

                generated += 1;
            }
        }
    }

    println!("✓ Generated {} products", generated);

    println!();
    println!("Generating promo codes...");

    let mut welcome = new_promo_code("WELCOME10", DiscountType::Percentage, 10.0);
    welcome.min_order_amount = 5_000;
    welcome.max_discount = Some(5_000);
    welcome.starts_at = Utc::now() - Duration::days(1);
    db.promo_codes().insert(&welcome).await?;

    let mut fixed = new_promo_code("TOYS2000", DiscountType::Fixed, 2_000.0);
    fixed.usage_limit = Some(100);
    fixed.starts_at = Utc::now() - Duration::days(1);
    fixed.expires_at = Some(Utc::now() + Duration::days(30));
    db.promo_codes().insert(&fixed).await?;

    println!("✓ Generated 2 promo codes");

    println!();
    println!("Generating expenses...");

    let today = Utc::now().date_naive();
    let mut expenses = 0;
    for (category, product) in &first_of_category {
        db.expenses()
            .create(NewExpense {
                product_id: Some(product.id.clone()),
                category: ExpenseCategory::Stock,
                description: format!("Restock {}", product.name),
                amount: product.cost_price * 10,
                quantity: Some(10),
                expense_date: today,
            })
            .await?;

        db.expenses()
            .create(NewExpense {
                product_id: None,
                category: ExpenseCategory::Marketing,
                description: format!("Ads for {} toys", category),
                amount: 7_500,
                quantity: None,
                expense_date: today,
            })
            .await?;

        expenses += 2;
    }

    println!("✓ Generated {} expenses", expenses);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, age: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    // 1,500 - 28,000 base, in steps of 500
    let base_price = 1_500 + ((seed * 7) % 54) as i64 * 500;
    let price = base_price + price_addon;

    // 45-70% of price
    let cost_pct = 45 + (seed % 26) as i64;
    let cost_price = price * cost_pct / 100;

    Product {
        id: generate_product_id(),
        name: format!("{} ({})", name, age),
        category: category.to_string(),
        price,
        cost_price,
        stock_quantity: (seed % 25) as i64,
        min_stock_alert: 3,
        total_sold: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
