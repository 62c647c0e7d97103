use super::ConcurrentObserver;
use crate::error::ObserverError;
use senser_core::query::{DataQuery, GeoBox, SearchDescriptor};
use senser_core::{
    round_to_cents, BucketRow, LowBatterySensor, Sensor, SensorSnapshot, SensorTemperature,
    SensorsResponse, TemperatureValues, TypeQuantity,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hits fetched per search page, at least
const SEARCH_WINDOW: usize = 10;

/// Answer of the data endpoint, depends on the query parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataResponse {
    /// Cached reading merged with the sensor identity, `null` if nothing
    /// was recorded yet
    Latest(Option<SensorSnapshot>),
    Buckets(Vec<BucketRow>),
}

/// Picks one backend per read request
pub struct QueryObserver {
    inner: Arc<ConcurrentObserver>,
}

impl Clone for QueryObserver {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl QueryObserver {
    pub fn new(inner: Arc<ConcurrentObserver>) -> Self {
        QueryObserver { inner }
    }

    /// Time-series buckets when `from`, `to` and `bucket` are all given,
    /// the cached latest reading otherwise
    #[tracing::instrument(skip(self))]
    pub async fn data(
        &self,
        sensor_id: i32,
        from: Option<&str>,
        to: Option<&str>,
        bucket: Option<&str>,
    ) -> Result<DataResponse, ObserverError> {
        let sensor = self.inner.existing(sensor_id).await?;
        let stores = &self.inner.stores;

        match DataQuery::from_params(from, to, bucket)? {
            DataQuery::Bucketed { from, to, bucket } => {
                let rows = stores.timeseries.bucketed(sensor_id, from, to, bucket).await?;
                debug!(sensor_id = sensor_id, rows = rows.len(), "Bucketed query");
                Ok(DataResponse::Buckets(rows))
            }
            DataQuery::Latest => {
                let snapshot = stores.cache.get(sensor_id).await?.map(|data| SensorSnapshot {
                    id: sensor.id,
                    name: sensor.name,
                    data: Some(data),
                });
                Ok(DataResponse::Latest(snapshot))
            }
        }
    }

    /// Bounding box around the center, not a circle
    #[tracing::instrument(skip(self))]
    pub async fn near(
        &self,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Vec<SensorSnapshot>, ObserverError> {
        let stores = &self.inner.stores;
        let area = GeoBox::around(latitude, longitude, radius);

        let mut nears = Vec::new();
        for document in stores.documents.find_within(area).await? {
            let sensor = match stores.registry.get_by_name(&document.name).await? {
                Some(sensor) => sensor,
                None => {
                    warn!(name = document.name.as_str(), "Document without registry entry");
                    continue;
                }
            };
            let data = stores.cache.get(sensor.id).await?;
            nears.push(SensorSnapshot {
                id: sensor.id,
                name: sensor.name,
                data,
            });
        }
        Ok(nears)
    }

    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        size: usize,
        search_type: &str,
    ) -> Result<Vec<Sensor>, ObserverError> {
        let stores = &self.inner.stores;
        let descriptor = SearchDescriptor::parse(query, search_type)?;
        let window = size.max(SEARCH_WINDOW);

        let mut found = Vec::with_capacity(size);
        let mut offset = 0;
        while found.len() < size {
            let hits = stores.search.search(&descriptor, offset, window).await?;
            let exhausted = hits.len() < window;
            offset += hits.len();

            for hit in hits {
                if found.len() >= size {
                    break;
                }
                // deleted sensors stay in the index
                match stores.registry.get_by_name(&hit.document.name).await? {
                    Some(sensor) => found.push(sensor),
                    None => debug!(name = hit.document.name.as_str(), "Skipped orphaned hit"),
                }
            }
            if exhausted {
                break;
            }
        }
        Ok(found)
    }

    #[tracing::instrument(skip(self))]
    pub async fn temperature_values(
        &self,
    ) -> Result<SensorsResponse<SensorTemperature>, ObserverError> {
        let stats = self.inner.stores.aggregates.temperature_stats().await?;

        let mut sensors = Vec::with_capacity(stats.len());
        for row in stats.iter() {
            if let Some(sensor) = self.profile(row.id).await? {
                sensors.push(SensorTemperature {
                    sensor,
                    values: TemperatureValues::from(row),
                });
            }
        }
        Ok(sensors.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn quantity_by_type(&self) -> Result<SensorsResponse<TypeQuantity>, ObserverError> {
        let quantities = self.inner.stores.aggregates.quantity_by_type().await?;
        Ok(quantities.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn low_battery(&self) -> Result<SensorsResponse<LowBatterySensor>, ObserverError> {
        let batteries = self.inner.stores.aggregates.latest_batteries().await?;

        let mut sensors = Vec::new();
        for battery in batteries.iter().filter(|b| b.is_low()) {
            let level = match battery.battery_level {
                Some(level) => level,
                None => continue,
            };
            if let Some(sensor) = self.profile(battery.id).await? {
                sensors.push(LowBatterySensor {
                    sensor,
                    battery_level: round_to_cents(level),
                });
            }
        }
        Ok(sensors.into())
    }

    /// Document projection of a registered sensor, the registry row if
    /// the projection is missing. `None` for ids only the aggregates know.
    async fn profile(&self, sensor_id: i32) -> Result<Option<Sensor>, ObserverError> {
        let stores = &self.inner.stores;
        let sensor = match stores.registry.get(sensor_id).await? {
            Some(sensor) => sensor,
            None => {
                warn!(sensor_id = sensor_id, "Aggregate row of removed sensor");
                return Ok(None);
            }
        };

        match stores.documents.get_by_name(&sensor.name).await? {
            Some(document) => Ok(Some(Sensor {
                id: sensor.id,
                ..document
            })),
            None => Ok(Some(sensor)),
        }
    }
}
