use crate::server::{self, AppState};
use crate::services::{
    IndicatorCache, LoaderConfig, ScreenerClient, StockDataLoader, StockRepository, StockUpdater,
};
use crate::utils::get_data_dir;
use std::sync::Arc;

pub async fn run(port: u16) {
    println!("🚀 Starting stockboard server on port {}", port);

    let data_dir = get_data_dir();
    println!("📁 Snapshot directory: {}", data_dir.display());

    let loader = StockDataLoader::new(LoaderConfig::default());
    let repository = Arc::new(StockRepository::open_or_empty(loader));

    let stats = repository.stats().await;
    println!("✅ Universe loaded:");
    println!("   📈 Listings: {}", stats.total);
    println!("   🏷️  Version:  {}", stats.version);

    let directory = match ScreenerClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to build symbol directory client: {}", e);
            return;
        }
    };
    let updater = Arc::new(StockUpdater::new(&data_dir, directory));
    let indicators = Arc::new(IndicatorCache::with_standard_engine());

    let app_state = AppState {
        repository,
        indicators,
        updater,
    };

    if let Err(e) = server::serve(app_state, port).await {
        eprintln!("❌ Server error: {}", e);
    }
}
