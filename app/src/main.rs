mod config;
mod error;
mod logging;
mod models;
mod rest;
mod sensor;
mod store;

use config::CONFIG;
use tracing::{error, info};

#[tokio::main]
pub async fn main() {
    logging::init();

    let stores = match store::Stores::connect(&CONFIG).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed connecting stores: {}", e);
            return;
        }
    };
    let observer = sensor::ConcurrentObserver::new(stores);
    info!("Stores ready: {:?}", observer.backends());

    rest::dispatch_server_daemon(observer).await;
}
