//! # Expiry Sweep
//!
//! Deactivates discounts and promotions whose validity window has ended.
//! Intended to run on a schedule (cron or a supervisor timer); pricing
//! also re-checks windows on read, so a missed run only delays the flag
//! flip, it never lets an expired code apply.
//!
//! ## Usage
//! ```bash
//! cargo run -p meridian-db --bin sweep -- --db ./data/meridian.db
//! ```

use chrono::Utc;
use std::env;

use meridian_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./meridian_dev.db");

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
                println!("Meridian POS Expiry Sweep");
                println!();
                println!("Usage: sweep [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./meridian_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🧹 Meridian POS Expiry Sweep");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    let now = Utc::now();

    let discounts = db.discounts().deactivate_expired(now).await?;
    let promotions = db.promotions().deactivate_expired(now).await?;

    println!("✓ Deactivated {} expired discounts", discounts);
    println!("✓ Deactivated {} expired promotions", promotions);

    db.close().await;
    Ok(())
}
