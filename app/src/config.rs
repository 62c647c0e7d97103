use once_cell::sync::Lazy;
use std::env;

/// Process wide settings, read once from the environment (and `.env`).
///
/// A missing store url selects the in-memory adapter for that store.
pub struct Config {
    server_port: u16,
    database_url: Option<String>,
    timescale_url: Option<String>,
    mongodb_url: Option<String>,
    mongodb_database: String,
    elasticsearch_url: Option<String>,
    search_index: String,
    cassandra_nodes: Vec<String>,
    redis_url: Option<String>,
    otel_stdout: bool,
}

impl Config {
    pub fn from_env() -> Self {
        // unparsable ports fall back to the default as well
        let server_port = optional_var("SERVER_PORT")
            .and_then(|port| port.trim().parse::<u16>().ok())
            .unwrap_or(8000);
        let cassandra_nodes = optional_var("CASSANDRA_NODES")
            .map(|nodes| {
                nodes
                    .split(',')
                    .map(|s| s.trim().to_owned())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Config {
            server_port,
            database_url: optional_var("DATABASE_URL"),
            timescale_url: optional_var("TIMESCALE_URL"),
            mongodb_url: optional_var("MONGODB_URL"),
            mongodb_database: optional_var("MONGODB_DATABASE").unwrap_or_else(|| "sensors".to_owned()),
            elasticsearch_url: optional_var("ELASTICSEARCH_URL"),
            search_index: optional_var("SEARCH_INDEX").unwrap_or_else(|| "sensors".to_owned()),
            cassandra_nodes,
            redis_url: optional_var("REDIS_URL"),
            otel_stdout: optional_var("OTEL_STDOUT").is_some(),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    pub fn timescale_url(&self) -> Option<&str> {
        self.timescale_url.as_deref()
    }

    pub fn mongodb_url(&self) -> Option<&str> {
        self.mongodb_url.as_deref()
    }

    pub fn mongodb_database(&self) -> &str {
        &self.mongodb_database
    }

    pub fn elasticsearch_url(&self) -> Option<&str> {
        self.elasticsearch_url.as_deref()
    }

    pub fn search_index(&self) -> &str {
        &self.search_index
    }

    pub fn cassandra_nodes(&self) -> &[String] {
        &self.cassandra_nodes
    }

    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    pub fn otel_stdout(&self) -> bool {
        self.otel_stdout
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv::dotenv().ok();
    Config::from_env()
});
