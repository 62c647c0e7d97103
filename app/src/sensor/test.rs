use super::observer::router::DataResponse;
use super::*;
use crate::error::{ObserverError, StoreError};
use crate::store::{DocumentStore, ReadingCache, Stores};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use senser_core::error::QueryError;
use senser_core::query::GeoBox;
use senser_core::{NewSensor, Sensor, SensorDataMessage};
use std::sync::Arc;

fn build_observers(stores: Stores) -> (SensorObserver, QueryObserver) {
    let inner = ConcurrentObserver::new(stores);
    (SensorObserver::new(inner.clone()), QueryObserver::new(inner))
}

fn new_sensor(name: &str, kind: &str, latitude: f64, longitude: f64) -> NewSensor {
    NewSensor {
        name: name.to_owned(),
        latitude,
        longitude,
        kind: kind.to_owned(),
        mac_address: "00:00:00:00:00:00".to_owned(),
        manufacturer: "Dummy".to_owned(),
        model: "Dummy Temp".to_owned(),
        serie_number: "0000 0000 0000 0000".to_owned(),
        firmware_version: "1.0".to_owned(),
        description: format!("Sensor de {} model Dummy del fabricant Dummy", kind),
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn reading(temperature: Option<f64>, battery_level: Option<f64>, last_seen: DateTime<Utc>) -> SensorDataMessage {
    SensorDataMessage {
        temperature,
        humidity: Some(50.0),
        velocity: None,
        battery_level,
        last_seen,
    }
}

#[tokio::test]
async fn test_create_sensor() {
    // prepare
    let (sensors, _) = build_observers(Stores::in_memory());

    // execute
    let first = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    let second = sensors
        .create(new_sensor("S2", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    // validate
    assert_ne!(first.id, second.id);
    assert_eq!(Sensor::from_new(first.id, new_sensor("S1", "Temperatura", 1.0, 1.0)), first);
    assert_eq!(first, sensors.get(first.id).await.unwrap());
}

#[tokio::test]
async fn test_create_duplicate_name() {
    let stores = Stores::in_memory();
    let (sensors, _) = build_observers(stores.clone());
    sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    let res = sensors
        .create(new_sensor("S1", "Velocitat", 2.0, 2.0))
        .await;

    assert!(matches!(res, Err(ObserverError::DuplicateName(_))));
    // no projection of the rejected sensor
    let quantity = stores.aggregates.quantity_by_type().await.unwrap();
    assert_eq!(1, quantity.len());
    assert_eq!("Temperatura", quantity[0].kind);
}

#[tokio::test]
async fn test_create_projects_sensor() {
    let stores = Stores::in_memory();
    let (sensors, _) = build_observers(stores.clone());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    let document = stores.documents.get_by_name("S1").await.unwrap();
    assert_eq!(Some(sensor.clone()), document);

    let query = senser_core::query::SearchDescriptor::parse(r#"{"name":"S1"}"#, "match").unwrap();
    let hits = stores.search.search(&query, 0, 10).await.unwrap();
    assert_eq!(vec![sensor.search_document()], hits.into_iter().map(|h| h.document).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_unknown_sensor() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let unknown = 42;

    let res = sensors.get(unknown).await;
    assert!(matches!(res, Err(ObserverError::SensorNotFound(42))));
    let res = sensors.delete(unknown).await;
    assert!(matches!(res, Err(ObserverError::SensorNotFound(42))));
    let res = sensors.record(unknown, reading(Some(1.0), None, t0())).await;
    assert!(matches!(res, Err(ObserverError::SensorNotFound(42))));
    let res = queries.data(unknown, None, None, None).await;
    assert!(matches!(res, Err(ObserverError::SensorNotFound(42))));
}

#[tokio::test]
async fn test_delete_sensor() {
    let stores = Stores::in_memory();
    let (sensors, queries) = build_observers(stores.clone());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    sensors
        .record(sensor.id, reading(Some(21.0), Some(0.1), t0()))
        .await
        .unwrap();

    let deleted = sensors.delete(sensor.id).await.unwrap();

    assert_eq!(sensor, deleted);
    assert!(matches!(
        sensors.get(sensor.id).await,
        Err(ObserverError::SensorNotFound(_))
    ));
    assert!(stores.documents.get_by_name("S1").await.unwrap().is_none());
    assert!(stores.cache.get(sensor.id).await.unwrap().is_none());

    // search and aggregate rows are left behind, queries skip them
    assert_eq!(1, stores.aggregates.temperature_stats().await.unwrap().len());
    assert!(queries
        .search(r#"{"name":"S1"}"#, 10, "match")
        .await
        .unwrap()
        .is_empty());
    assert!(queries.temperature_values().await.unwrap().sensors.is_empty());
    assert!(queries.low_battery().await.unwrap().sensors.is_empty());
}

#[tokio::test]
async fn test_record_data() {
    let stores = Stores::in_memory();
    let (sensors, queries) = build_observers(stores.clone());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    let first = reading(Some(1.0), Some(1.0), t0());
    let second = reading(Some(3.0), None, t0() + chrono::Duration::hours(1));
    assert_eq!(first, sensors.record(sensor.id, first.clone()).await.unwrap());
    assert_eq!(second, sensors.record(sensor.id, second.clone()).await.unwrap());

    // both rows are kept, the cache only holds the latest
    let rows = stores
        .timeseries
        .bucketed(sensor.id, t0(), t0() + chrono::Duration::hours(1), senser_core::query::Bucket::Hour)
        .await
        .unwrap();
    assert_eq!(2, rows.len());
    assert_eq!(Some(second), stores.cache.get(sensor.id).await.unwrap());

    // battery row is appended without a level as well
    let batteries = stores.aggregates.latest_batteries().await.unwrap();
    assert_eq!(None, batteries[0].battery_level);
    assert!(queries.low_battery().await.unwrap().sensors.is_empty());
}

#[tokio::test]
async fn test_data_latest_and_bucketed() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    // nothing cached yet
    let res = queries.data(sensor.id, None, None, None).await.unwrap();
    assert_eq!(DataResponse::Latest(None), res);

    let data = reading(Some(1.0), Some(1.0), t0());
    sensors.record(sensor.id, data.clone()).await.unwrap();

    let res = queries.data(sensor.id, None, None, None).await.unwrap();
    let json = serde_json::to_value(&res).unwrap();
    assert_eq!(sensor.id as i64, json["id"]);
    assert_eq!("S1", json["name"]);
    assert_eq!(1.0, json["temperature"]);
    assert_eq!(1.0, json["battery_level"]);

    // incomplete range falls back to the cache
    let res = queries
        .data(sensor.id, Some("2020-01-01"), None, Some("day"))
        .await
        .unwrap();
    assert!(matches!(res, DataResponse::Latest(Some(_))));

    let res = queries
        .data(
            sensor.id,
            Some("2020-01-01T00:00:00.000Z"),
            Some("2020-01-01T00:00:00.000Z"),
            Some("day"),
        )
        .await
        .unwrap();
    match res {
        DataResponse::Buckets(rows) => {
            assert_eq!(1, rows.len());
            assert_eq!(t0(), rows[0].bucket_start);
            assert_eq!(Some(1.0), rows[0].temperature);
        }
        other => panic!("Expected buckets, got {:?}", other),
    }
}

#[tokio::test]
async fn test_data_daily_buckets() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    for (hours, temperature) in [(0, 1.0), (6, 3.0), (24, 10.0)] {
        let data = reading(Some(temperature), None, t0() + chrono::Duration::hours(hours));
        sensors.record(sensor.id, data).await.unwrap();
    }

    let res = queries
        .data(sensor.id, Some("2020-01-01"), Some("2020-01-02"), Some("day"))
        .await
        .unwrap();

    let rows = match res {
        DataResponse::Buckets(rows) => rows,
        other => panic!("Expected buckets, got {:?}", other),
    };
    let temperatures: Vec<Option<f64>> = rows.iter().map(|r| r.temperature).collect();
    assert_eq!(vec![Some(2.0), Some(10.0)], temperatures);
    assert!(rows[0].bucket_start < rows[1].bucket_start);
}

#[tokio::test]
async fn test_data_invalid_query() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    let res = queries
        .data(sensor.id, Some("2020-01-01"), Some("2020-01-02"), Some("minute"))
        .await;
    assert!(matches!(
        res,
        Err(ObserverError::Query(QueryError::InvalidBucket(_)))
    ));

    let res = queries
        .data(sensor.id, Some("yesterday"), Some("2020-01-02"), Some("day"))
        .await;
    assert!(matches!(
        res,
        Err(ObserverError::Query(QueryError::InvalidDate(_)))
    ));
}

#[tokio::test]
async fn test_near() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let s1 = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    let s2 = sensors
        .create(new_sensor("S2", "Velocitat", 1.5, 0.5))
        .await
        .unwrap();
    sensors
        .create(new_sensor("S3", "Velocitat", 10.0, 10.0))
        .await
        .unwrap();
    sensors
        .record(s1.id, reading(Some(1.0), Some(1.0), t0()))
        .await
        .unwrap();

    let nears = queries.near(1.0, 1.0, 0.5).await.unwrap();

    assert_eq!(2, nears.len());
    assert_eq!((s1.id, Some(1.0)), (nears[0].id, nears[0].data.as_ref().and_then(|d| d.temperature)));
    // no cached reading, identity only
    assert_eq!(s2.id, nears[1].id);
    let json = serde_json::to_value(&nears[1]).unwrap();
    assert_eq!(serde_json::json!({"id": s2.id, "name": "S2"}), json);
}

#[tokio::test]
async fn test_search() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    sensors
        .create(new_sensor("Sensor Temperatura 1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    for name in ["Velocitat 1", "Velocitat 2"] {
        sensors
            .create(new_sensor(name, "Velocitat", 1.0, 1.0))
            .await
            .unwrap();
    }

    let names = |found: Vec<Sensor>| found.into_iter().map(|s| s.name).collect::<Vec<_>>();
    assert_eq!(
        vec!["Velocitat 1", "Velocitat 2"],
        names(queries.search(r#"{"name":"Veloci"}"#, 10, "prefix").await.unwrap())
    );
    assert_eq!(
        vec!["Velocitat 1"],
        names(queries.search(r#"{"name":"Velocidad 1"}"#, 10, "similar").await.unwrap())
    );
    assert_eq!(
        1,
        queries
            .search(r#"{"type":"Velocitat"}"#, 1, "match")
            .await
            .unwrap()
            .len()
    );

    let res = queries.search("not json", 10, "match").await;
    assert!(matches!(
        res,
        Err(ObserverError::Query(QueryError::InvalidSearchQuery(_)))
    ));
}

#[tokio::test]
async fn test_search_skips_orphans_without_counting() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let first = sensors
        .create(new_sensor("Velocitat 1", "Velocitat", 1.0, 1.0))
        .await
        .unwrap();
    sensors
        .create(new_sensor("Velocitat 2", "Velocitat", 1.0, 1.0))
        .await
        .unwrap();
    sensors.delete(first.id).await.unwrap();

    let found = queries
        .search(r#"{"type":"Velocitat"}"#, 1, "match")
        .await
        .unwrap();
    assert_eq!(1, found.len());
    assert_eq!("Velocitat 2", found[0].name);
}

#[tokio::test]
async fn test_search_pages_past_orphans() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let mut created = Vec::new();
    for i in 0..11 {
        let name = format!("Velocitat {}", i);
        created.push(sensors.create(new_sensor(&name, "Velocitat", 1.0, 1.0)).await.unwrap());
    }
    // a whole page of orphans ahead of the only live sensor
    for sensor in created.iter().take(10) {
        sensors.delete(sensor.id).await.unwrap();
    }

    let found = queries
        .search(r#"{"type":"Velocitat"}"#, 1, "match")
        .await
        .unwrap();
    assert_eq!(1, found.len());
    assert_eq!("Velocitat 10", found[0].name);

    let found = queries
        .search(r#"{"type":"Velocitat"}"#, 5, "match")
        .await
        .unwrap();
    assert_eq!(1, found.len());
}

#[tokio::test]
async fn test_aggregates() {
    let (sensors, queries) = build_observers(Stores::in_memory());
    let s1 = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();
    let s2 = sensors
        .create(new_sensor("S2", "Velocitat", 1.0, 1.0))
        .await
        .unwrap();
    let s3 = sensors
        .create(new_sensor("S3", "Velocitat", 1.0, 1.0))
        .await
        .unwrap();

    for (i, t) in [10.0, 20.0, 30.0].into_iter().enumerate() {
        let last_seen = t0() + chrono::Duration::hours(i as i64);
        sensors
            .record(s1.id, reading(Some(t), Some(0.9), last_seen))
            .await
            .unwrap();
    }
    sensors
        .record(s2.id, reading(None, Some(0.1234), t0()))
        .await
        .unwrap();
    sensors
        .record(s3.id, reading(None, Some(0.1), t0()))
        .await
        .unwrap();
    sensors
        .record(s3.id, reading(None, Some(0.2), t0() + chrono::Duration::hours(1)))
        .await
        .unwrap();

    let temperatures = queries.temperature_values().await.unwrap();
    assert_eq!(1, temperatures.sensors.len());
    let values = &temperatures.sensors[0].values;
    assert_eq!(s1, temperatures.sensors[0].sensor);
    assert_eq!(
        (10.0, 30.0, 20.0),
        (values.min_temperature, values.max_temperature, values.average_temperature)
    );

    let quantity = queries.quantity_by_type().await.unwrap();
    let pairs: Vec<(String, i64)> = quantity
        .sensors
        .into_iter()
        .map(|q| (q.kind, q.quantity))
        .collect();
    assert_eq!(
        vec![("Temperatura".to_owned(), 1), ("Velocitat".to_owned(), 2)],
        pairs
    );

    // latest level decides, 0.2 is not low
    let low = queries.low_battery().await.unwrap();
    assert_eq!(1, low.sensors.len());
    assert_eq!(s2, low.sensors[0].sensor);
    assert_eq!(0.12, low.sensors[0].battery_level);

    let json = serde_json::to_value(&low).unwrap();
    assert_eq!("S2", json["sensors"][0]["name"]);
    assert_eq!(0.12, json["sensors"][0]["battery_level"]);
}

/// Document store that is always down
struct BrokenDocuments;

#[async_trait]
impl DocumentStore for BrokenDocuments {
    fn backend(&self) -> &'static str {
        "broken"
    }

    async fn insert(&self, _sensor: &Sensor) -> Result<(), StoreError> {
        Err(StoreError::backend("broken", "connection refused"))
    }

    async fn get_by_name(&self, _name: &str) -> Result<Option<Sensor>, StoreError> {
        Err(StoreError::backend("broken", "connection refused"))
    }

    async fn delete(&self, _sensor_id: i32) -> Result<(), StoreError> {
        Err(StoreError::backend("broken", "connection refused"))
    }

    async fn find_within(&self, _area: GeoBox) -> Result<Vec<Sensor>, StoreError> {
        Err(StoreError::backend("broken", "connection refused"))
    }
}

#[tokio::test]
async fn test_partial_failure_is_not_rolled_back() {
    let mut stores = Stores::in_memory();
    stores.documents = Arc::new(BrokenDocuments);
    let (sensors, _) = build_observers(stores.clone());

    let res = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await;

    // registry keeps the sensor, later steps never ran
    match res {
        Err(err @ ObserverError::Store(_)) => assert!(!err.is_user()),
        other => panic!("Expected store error, got {:?}", other),
    }
    let registered = stores.registry.get_by_name("S1").await.unwrap();
    assert!(registered.is_some());
    assert!(stores.aggregates.quantity_by_type().await.unwrap().is_empty());

    // the name stays taken
    let res = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await;
    assert!(matches!(res, Err(ObserverError::DuplicateName(_))));
}

/// Accepts every write, never has anything to read back
struct ForgetfulCache;

#[async_trait]
impl ReadingCache for ForgetfulCache {
    fn backend(&self) -> &'static str {
        "forgetful"
    }

    async fn get(&self, _sensor_id: i32) -> Result<Option<SensorDataMessage>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _sensor_id: i32, _data: &SensorDataMessage) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _sensor_id: i32) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_record_lost_cache_write() {
    let mut stores = Stores::in_memory();
    stores.cache = Arc::new(ForgetfulCache);
    let (sensors, _) = build_observers(stores.clone());
    let sensor = sensors
        .create(new_sensor("S1", "Temperatura", 1.0, 1.0))
        .await
        .unwrap();

    let res = sensors
        .record(sensor.id, reading(Some(1.0), Some(1.0), t0()))
        .await;

    match res {
        Err(err @ ObserverError::Store(StoreError::Backend { .. })) => {
            assert!(!err.is_user());
            assert!(err.to_string().contains("reading missing after write"));
        }
        other => panic!("Expected store error, got {:?}", other),
    }
    // earlier steps already committed
    let rows = stores
        .timeseries
        .bucketed(sensor.id, t0(), t0(), senser_core::query::Bucket::Day)
        .await
        .unwrap();
    assert_eq!(1, rows.len());
}
