use super::{SensorRegistry, TimeSeriesStore};
use crate::error::StoreError;
use crate::models::{sensor, sensor_data};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use senser_core::query::Bucket;
use senser_core::{BucketRow, NewSensor, Sensor, SensorDataMessage};
use sqlx::PgPool;

pub struct PgRegistry {
    conn: PgPool,
}

impl PgRegistry {
    pub fn new(conn: PgPool) -> Self {
        PgRegistry { conn }
    }
}

#[async_trait]
impl SensorRegistry for PgRegistry {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, new_sensor: NewSensor) -> Result<Sensor, StoreError> {
        match sensor::insert(&self.conn, &new_sensor).await {
            Ok(dao) => Ok(dao.into()),
            Err(e) if e.is_unique_violation() => Err(StoreError::DuplicateName(new_sensor.name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError> {
        Ok(sensor::get(&self.conn, sensor_id).await?.map(Sensor::from))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError> {
        Ok(sensor::get_by_name(&self.conn, name)
            .await?
            .map(Sensor::from))
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Sensor>, StoreError> {
        let daos = sensor::read(&self.conn, skip, limit).await?;
        Ok(daos.into_iter().map(Sensor::from).collect())
    }

    async fn delete(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError> {
        Ok(sensor::delete(&self.conn, sensor_id)
            .await?
            .map(Sensor::from))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(sensor::count(&self.conn).await?)
    }
}

pub struct PgTimeSeries {
    conn: PgPool,
}

impl PgTimeSeries {
    pub fn new(conn: PgPool) -> Self {
        PgTimeSeries { conn }
    }
}

#[async_trait]
impl TimeSeriesStore for PgTimeSeries {
    fn backend(&self) -> &'static str {
        "timescaledb"
    }

    async fn upsert(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError> {
        sensor_data::upsert(&self.conn, sensor_id, data).await?;
        Ok(())
    }

    async fn bucketed(
        &self,
        sensor_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: Bucket,
    ) -> Result<Vec<BucketRow>, StoreError> {
        let daos = sensor_data::get_bucketed(&self.conn, sensor_id, from, to, bucket).await?;
        Ok(daos.into_iter().map(BucketRow::from).collect())
    }
}
