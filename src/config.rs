use std::net::SocketAddr;

use serde::Deserialize;
use url::Url;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to. Defaults to 127.0.0.1:8000.
    pub listen_address: Option<SocketAddr>,
    /// Database connection string, e.g. `sqlite://data/greenconnect.db`.
    #[serde(default = "default_db")]
    pub db: String,
    /// GreenOracle upstream configuration.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Optional metrics exporter configuration.
    pub metrics: Option<MetricConfig>,
    /// Test mode. Disables outbound calls to the generative-language API.
    #[serde(default)]
    pub test: bool,
}

fn default_db() -> String {
    "sqlite://data/greenconnect.db".to_owned()
}

#[derive(Deserialize, Debug, Clone)]
pub struct OracleConfig {
    /// API key for the generative-language endpoint. The Oracle route returns
    /// an error payload when this is unset.
    pub api_key: Option<String>,
    /// Base URL of the generative-language API.
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: Url,
    /// Model identifier passed to the upstream API.
    #[serde(default = "default_oracle_model")]
    pub model: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
        }
    }
}

fn default_oracle_endpoint() -> Url {
    Url::parse("https://generativelanguage.googleapis.com/v1beta/")
        .expect("default oracle endpoint should parse")
}

fn default_oracle_model() -> String {
    "gemini-pro".to_owned()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    /// Push metrics to a Prometheus push gateway.
    PrometheusPush(PrometheusConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusConfig {
    /// URL of the push gateway.
    pub url: String,
}
