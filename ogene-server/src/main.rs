use envconfig::Envconfig;

use ogene::config::Config;
use ogene::server::serve;
use tokio::net::TcpListener;
use tokio::signal;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    let listener = TcpListener::bind(config.address)
        .await
        .expect("could not bind the listen address");

    serve(config, listener, shutdown()).await
}
