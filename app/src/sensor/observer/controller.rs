use super::{ConcurrentObserver, FanoutStep};
use crate::error::{ObserverError, StoreError};
use senser_core::{NewSensor, Sensor, SensorDataMessage};
use std::sync::Arc;
use tracing::info;

/// Registry reads and every write that fans out to the projections
pub struct SensorObserver {
    inner: Arc<ConcurrentObserver>,
}

impl Clone for SensorObserver {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl SensorObserver {
    pub fn new(inner: Arc<ConcurrentObserver>) -> Self {
        SensorObserver { inner }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Sensor>, ObserverError> {
        Ok(self.inner.stores.registry.list(skip, limit).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, sensor_id: i32) -> Result<Sensor, ObserverError> {
        self.inner.existing(sensor_id).await
    }

    /// registry -> document -> search -> quantity
    #[tracing::instrument(skip(self, new_sensor), fields(name = %new_sensor.name))]
    pub async fn create(&self, new_sensor: NewSensor) -> Result<Sensor, ObserverError> {
        let stores = &self.inner.stores;
        if stores.registry.get_by_name(&new_sensor.name).await?.is_some() {
            return Err(ObserverError::DuplicateName(new_sensor.name));
        }
        let sensor = stores.registry.insert(new_sensor).await?;
        let sensor_id = sensor.id;

        self.inner
            .step(FanoutStep::Document, sensor_id, stores.documents.insert(&sensor))
            .await?;
        self.inner
            .step(
                FanoutStep::Search,
                sensor_id,
                stores.search.index(&sensor.search_document()),
            )
            .await?;
        self.inner
            .step(
                FanoutStep::Quantity,
                sensor_id,
                stores.aggregates.append_quantity(sensor_id, &sensor.kind),
            )
            .await?;

        info!(sensor_id = sensor_id, "Registered new sensor");
        Ok(sensor)
    }

    /// Search and aggregate projections stay behind
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, sensor_id: i32) -> Result<Sensor, ObserverError> {
        let stores = &self.inner.stores;
        self.inner.existing(sensor_id).await?;

        let sensor = self
            .inner
            .step(FanoutStep::Registry, sensor_id, stores.registry.delete(sensor_id))
            .await?
            .ok_or(ObserverError::SensorNotFound(sensor_id))?;
        self.inner
            .step(FanoutStep::Document, sensor_id, stores.documents.delete(sensor_id))
            .await?;
        self.inner
            .step(FanoutStep::Cache, sensor_id, stores.cache.delete(sensor_id))
            .await?;

        info!(sensor_id = sensor_id, "Removed sensor");
        Ok(sensor)
    }

    /// timeseries -> temperature -> battery -> cache, answers with the
    /// reading read back from the cache
    #[tracing::instrument(skip(self, data))]
    pub async fn record(
        &self,
        sensor_id: i32,
        data: SensorDataMessage,
    ) -> Result<SensorDataMessage, ObserverError> {
        let stores = &self.inner.stores;
        self.inner.existing(sensor_id).await?;

        self.inner
            .step(
                FanoutStep::TimeSeries,
                sensor_id,
                stores.timeseries.upsert(sensor_id, &data),
            )
            .await?;
        if let Some(temperature) = data.temperature {
            self.inner
                .step(
                    FanoutStep::Temperature,
                    sensor_id,
                    stores.aggregates.append_temperature(sensor_id, temperature),
                )
                .await?;
        }
        // appended even without a level
        self.inner
            .step(
                FanoutStep::Battery,
                sensor_id,
                stores.aggregates.append_battery(sensor_id, data.battery_level),
            )
            .await?;

        self.inner
            .step(FanoutStep::Cache, sensor_id, stores.cache.set(sensor_id, &data))
            .await?;
        let cached = self
            .inner
            .step(FanoutStep::Cache, sensor_id, stores.cache.get(sensor_id))
            .await?;
        cached.ok_or_else(|| {
            StoreError::backend(stores.cache.backend(), "reading missing after write").into()
        })
    }
}
