use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    /// Keep event records in process memory instead of Postgres. Handy
    /// for local development; everything is lost on restart.
    #[envconfig(default = "false")]
    pub memory_store: bool,

    /// Required unless `MEMORY_STORE` is set.
    pub database_url: Option<String>,

    pub maps_api_key: String,
    #[envconfig(default = "https://maps.googleapis.com")]
    pub maps_base_url: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}
