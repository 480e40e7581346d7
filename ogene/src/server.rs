use std::future::Future;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::lookup::GoogleLookupClient;
use crate::router;
use crate::store::{MemoryEventStore, PostgresEventStore};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let lookup = GoogleLookupClient::new(config.maps_base_url, config.maps_api_key)
        .expect("failed to create lookup client");

    let app = if config.memory_store {
        router::router(MemoryEventStore::new(), lookup, config.export_prometheus)
    } else {
        let url = config
            .database_url
            .as_deref()
            .expect("DATABASE_URL is required unless MEMORY_STORE is set");
        let store = PostgresEventStore::new(url)
            .await
            .expect("failed to connect to the event store");
        router::router(store, lookup, config.export_prometheus)
    };

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
