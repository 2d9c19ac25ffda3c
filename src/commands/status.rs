use crate::services::{ScreenerClient, StockUpdater};
use crate::utils::get_data_dir;
use std::sync::Arc;

pub async fn run() {
    let directory = match ScreenerClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to build symbol directory client: {}", e);
            return;
        }
    };
    let updater = StockUpdater::new(&get_data_dir(), directory);

    match updater.stats().await {
        Ok(stats) => {
            println!("📊 Snapshot version {} ({} listings)", stats.version, stats.total);
            println!("   Last updated: {}", stats.last_updated.to_rfc3339());
            for (market, count) in &stats.total_by_market {
                println!("   {}: {}", market, count);
            }
            for (category, count) in &stats.total_by_category {
                println!("   {}: {}", category, count);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to read snapshot stats: {}", e);
        }
    }
}
