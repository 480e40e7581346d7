pub mod api;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod geo;
pub mod handlers;
pub mod identity;
pub mod lookup;
pub mod prometheus;
pub mod realtime;
pub mod router;
pub mod server;
pub mod store;
pub mod ws;
