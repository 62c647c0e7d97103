use super::ReadingCache;
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use senser_core::SensorDataMessage;

const BACKEND: &str = "redis";

/// Latest reading per sensor id, stored as json
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::backend(BACKEND, e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(RedisCache { conn })
    }
}

#[async_trait]
impl ReadingCache for RedisCache {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, sensor_id: i32) -> Result<Option<SensorDataMessage>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(sensor_id)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|source| StoreError::Payload {
                backend: BACKEND,
                source,
            })
    }

    async fn set(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError> {
        let raw = serde_json::to_string(data).map_err(|source| StoreError::Payload {
            backend: BACKEND,
            source,
        })?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(sensor_id, raw)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))
    }

    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(sensor_id)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))
    }
}
