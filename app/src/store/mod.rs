//! Capability interfaces for every backend a sensor is projected into.
//!
//! The observers only see these traits. Each backend either has a live
//! adapter (PostgreSQL, TimescaleDB and the feature gated MongoDB,
//! Elasticsearch, Cassandra and Redis clients) or falls back to the
//! in-memory adapter when no url is configured.

use crate::config::Config;
use crate::error::StoreError;
use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use senser_core::query::{Bucket, GeoBox, SearchDescriptor};
use senser_core::{
    BatteryLevel, BucketRow, NewSensor, SearchDocument, Sensor, SensorDataMessage,
    TemperatureStats, TypeQuantity,
};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "cassandra")]
mod cassandra;
#[cfg(feature = "elasticsearch")]
mod elastic;
pub mod memory;
#[cfg(feature = "mongodb")]
mod mongo;
mod postgres;
#[cfg(feature = "redis")]
mod redis_cache;


/// Relational store, source of truth for sensor identity
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    fn backend(&self) -> &'static str;
    /// Assigns the id, `StoreError::DuplicateName` if the name is taken
    async fn insert(&self, sensor: NewSensor) -> Result<Sensor, StoreError>;
    async fn get(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError>;
    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Sensor>, StoreError>;
    /// Returns the removed row
    async fn delete(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError>;
    /// Number of registered sensors, doubles as reachability probe
    async fn count(&self) -> Result<i64, StoreError>;
}

/// Document store holding the full sensor record for geo lookups
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> &'static str;
    async fn insert(&self, sensor: &Sensor) -> Result<(), StoreError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError>;
    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError>;
    /// All documents inside the box, bounds inclusive
    async fn find_within(&self, area: GeoBox) -> Result<Vec<Sensor>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    pub document: SearchDocument,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    fn backend(&self) -> &'static str;
    async fn index(&self, document: &SearchDocument) -> Result<(), StoreError>;
    /// At most `limit` hits after skipping the best `offset`, best match first
    async fn search(
        &self,
        query: &SearchDescriptor,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;
}

/// Wide-column tables with append-only facts used for aggregates
#[async_trait]
pub trait AggregateStore: Send + Sync {
    fn backend(&self) -> &'static str;
    async fn append_quantity(&self, sensor_id: i32, kind: &str) -> Result<(), StoreError>;
    async fn append_temperature(&self, sensor_id: i32, temperature: f64)
        -> Result<(), StoreError>;
    async fn append_battery(
        &self,
        sensor_id: i32,
        battery_level: Option<f64>,
    ) -> Result<(), StoreError>;
    async fn temperature_stats(&self) -> Result<Vec<TemperatureStats>, StoreError>;
    async fn quantity_by_type(&self) -> Result<Vec<TypeQuantity>, StoreError>;
    /// Most recent battery row of every sensor
    async fn latest_batteries(&self) -> Result<Vec<BatteryLevel>, StoreError>;
}

/// Key-value cache holding only the latest reading per sensor
#[async_trait]
pub trait ReadingCache: Send + Sync {
    fn backend(&self) -> &'static str;
    async fn get(&self, sensor_id: i32) -> Result<Option<SensorDataMessage>, StoreError>;
    async fn set(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError>;
    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    fn backend(&self) -> &'static str;
    /// Overwrites all metrics of an existing (id, last_seen) row
    async fn upsert(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError>;
    /// Averages per window, ascending by window start
    async fn bucketed(
        &self,
        sensor_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: Bucket,
    ) -> Result<Vec<BucketRow>, StoreError>;
}

/// One handle per backend, shared by all requests
#[derive(Clone)]
pub struct Stores {
    pub registry: Arc<dyn SensorRegistry>,
    pub documents: Arc<dyn DocumentStore>,
    pub search: Arc<dyn SearchIndex>,
    pub aggregates: Arc<dyn AggregateStore>,
    pub cache: Arc<dyn ReadingCache>,
    pub timeseries: Arc<dyn TimeSeriesStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Stores {
            registry: Arc::new(memory::MemoryRegistry::new()),
            documents: Arc::new(memory::MemoryDocuments::new()),
            search: Arc::new(memory::MemorySearchIndex::new()),
            aggregates: Arc::new(memory::MemoryAggregates::new()),
            cache: Arc::new(memory::MemoryCache::new()),
            timeseries: Arc::new(memory::MemoryTimeSeries::new()),
        }
    }

    /// Connects every configured backend, the rest stays in memory
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let mut stores = Stores::in_memory();

        if let Some(url) = config.database_url() {
            let conn = models::establish_db_connection(url).await?;
            models::migrate_registry(&conn).await?;
            stores.registry = Arc::new(postgres::PgRegistry::new(conn));
        }
        if let Some(url) = config.timescale_url() {
            let conn = models::establish_db_connection(url).await?;
            models::migrate_timeseries(&conn).await?;
            stores.timeseries = Arc::new(postgres::PgTimeSeries::new(conn));
        }
        if let Some(documents) = connect_documents(config).await? {
            stores.documents = documents;
        }
        if let Some(search) = connect_search(config).await? {
            stores.search = search;
        }
        if let Some(aggregates) = connect_aggregates(config).await? {
            stores.aggregates = aggregates;
        }
        if let Some(cache) = connect_cache(config).await? {
            stores.cache = cache;
        }

        for (store, backend) in stores.backends() {
            info!(store = store, backend = backend, "Store ready");
        }
        Ok(stores)
    }

    pub fn backends(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("registry", self.registry.backend()),
            ("documents", self.documents.backend()),
            ("search", self.search.backend()),
            ("aggregates", self.aggregates.backend()),
            ("cache", self.cache.backend()),
            ("timeseries", self.timeseries.backend()),
        ]
    }
}

#[cfg(not(all(
    feature = "mongodb",
    feature = "elasticsearch",
    feature = "cassandra",
    feature = "redis"
)))]
fn feature_disabled(var: &str, feature: &str) {
    warn!(
        "{} is set but the {} feature is disabled, using memory",
        var, feature
    );
}

#[cfg(feature = "mongodb")]
async fn connect_documents(config: &Config) -> Result<Option<Arc<dyn DocumentStore>>, StoreError> {
    match config.mongodb_url() {
        Some(url) => {
            let store = mongo::MongoDocuments::connect(url, config.mongodb_database()).await?;
            Ok(Some(Arc::new(store)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "mongodb"))]
async fn connect_documents(config: &Config) -> Result<Option<Arc<dyn DocumentStore>>, StoreError> {
    if config.mongodb_url().is_some() {
        feature_disabled("MONGODB_URL", "mongodb");
    }
    Ok(None)
}

#[cfg(feature = "elasticsearch")]
async fn connect_search(config: &Config) -> Result<Option<Arc<dyn SearchIndex>>, StoreError> {
    match config.elasticsearch_url() {
        Some(url) => {
            let index = elastic::ElasticSearchIndex::connect(url, config.search_index()).await?;
            Ok(Some(Arc::new(index)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "elasticsearch"))]
async fn connect_search(config: &Config) -> Result<Option<Arc<dyn SearchIndex>>, StoreError> {
    if config.elasticsearch_url().is_some() {
        feature_disabled("ELASTICSEARCH_URL", "elasticsearch");
    }
    Ok(None)
}

#[cfg(feature = "cassandra")]
async fn connect_aggregates(
    config: &Config,
) -> Result<Option<Arc<dyn AggregateStore>>, StoreError> {
    if config.cassandra_nodes().is_empty() {
        return Ok(None);
    }
    let store = cassandra::CassandraAggregates::connect(config.cassandra_nodes()).await?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "cassandra"))]
async fn connect_aggregates(
    config: &Config,
) -> Result<Option<Arc<dyn AggregateStore>>, StoreError> {
    if !config.cassandra_nodes().is_empty() {
        feature_disabled("CASSANDRA_NODES", "cassandra");
    }
    Ok(None)
}

#[cfg(feature = "redis")]
async fn connect_cache(config: &Config) -> Result<Option<Arc<dyn ReadingCache>>, StoreError> {
    match config.redis_url() {
        Some(url) => Ok(Some(Arc::new(redis_cache::RedisCache::connect(url).await?))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_cache(config: &Config) -> Result<Option<Arc<dyn ReadingCache>>, StoreError> {
    if config.redis_url().is_some() {
        feature_disabled("REDIS_URL", "redis");
    }
    Ok(None)
}
