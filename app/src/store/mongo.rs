use super::DocumentStore;
use crate::error::StoreError;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use senser_core::query::GeoBox;
use senser_core::Sensor;

const BACKEND: &str = "mongodb";

pub struct MongoDocuments {
    collection: Collection<Sensor>,
}

impl MongoDocuments {
    pub async fn connect(url: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        let db = client.database(database);
        db.run_command(doc! {"ping": 1})
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        Ok(MongoDocuments {
            collection: db.collection::<Sensor>("sensors"),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoDocuments {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, sensor: &Sensor) -> Result<(), StoreError> {
        self.collection
            .insert_one(sensor)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError> {
        self.collection
            .find_one(doc! {"name": name})
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))
    }

    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError> {
        self.collection
            .delete_one(doc! {"id": sensor_id})
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn find_within(&self, area: GeoBox) -> Result<Vec<Sensor>, StoreError> {
        let filter = doc! {
            "latitude": {"$gte": area.min_latitude, "$lte": area.max_latitude},
            "longitude": {"$gte": area.min_longitude, "$lte": area.max_longitude},
        };
        let cursor = self
            .collection
            .find(filter)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))
    }
}
