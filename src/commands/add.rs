use crate::services::{ScreenerClient, StockUpdater};
use crate::utils::get_data_dir;
use std::sync::Arc;

pub async fn run(symbol: &str, name: &str, market: &str, category: &str) {
    let directory = match ScreenerClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to build symbol directory client: {}", e);
            return;
        }
    };
    let updater = StockUpdater::new(&get_data_dir(), directory);

    match updater.add_one(symbol, name, market, category).await {
        Ok(report) => {
            println!(
                "✅ Added {} ({}) to {} as {} — snapshot version {}",
                report.symbol, name, report.market, report.category, report.version
            );
        }
        Err(e) => {
            eprintln!("❌ Failed to add {}: {}", symbol, e);
        }
    }
}
