use crate::services::{ScreenerClient, StockUpdater};
use crate::utils::get_data_dir;
use std::sync::Arc;

pub async fn run() {
    let data_dir = get_data_dir();

    let directory = match ScreenerClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to build symbol directory client: {}", e);
            return;
        }
    };
    let updater = StockUpdater::new(&data_dir, directory);

    println!("🔄 Running incremental update...");
    match updater.incremental_update().await {
        Ok(report) => {
            println!("✅ Added {} new listings (version {})", report.total_added, report.version);
            for (market, count) in &report.added_per_market {
                println!("   {} {}", market, count);
            }
        }
        Err(e) => {
            eprintln!("❌ Incremental update failed: {}", e);
        }
    }
}
