//! Process local adapters, used when a backend url is not configured and
//! by the test suite.

use super::{
    AggregateStore, DocumentStore, ReadingCache, SearchHit, SearchIndex, SensorRegistry,
    TimeSeriesStore,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use senser_core::query::{Bucket, GeoBox, SearchDescriptor, SearchKind};
use senser_core::{
    BatteryLevel, BucketRow, NewSensor, SearchDocument, Sensor, SensorDataMessage,
    TemperatureStats, TypeQuantity,
};
use std::collections::{BTreeMap, HashMap};

const BACKEND: &str = "memory";

/*
 * Registry
 */

pub struct MemoryRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    next_id: i32,
    sensors: BTreeMap<i32, Sensor>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        MemoryRegistry {
            inner: RwLock::new(RegistryInner {
                next_id: 1,
                sensors: BTreeMap::new(),
            }),
        }
    }
}

#[async_trait]
impl SensorRegistry for MemoryRegistry {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, sensor: NewSensor) -> Result<Sensor, StoreError> {
        let mut inner = self.inner.write();
        if inner.sensors.values().any(|s| s.name == sensor.name) {
            return Err(StoreError::DuplicateName(sensor.name));
        }
        let id = inner.next_id;
        inner.next_id += 1;

        let sensor = Sensor::from_new(id, sensor);
        inner.sensors.insert(id, sensor.clone());
        Ok(sensor)
    }

    async fn get(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError> {
        Ok(self.inner.read().sensors.get(&sensor_id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.sensors.values().find(|s| s.name == name).cloned())
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Sensor>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .sensors
            .values()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, sensor_id: i32) -> Result<Option<Sensor>, StoreError> {
        Ok(self.inner.write().sensors.remove(&sensor_id))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().sensors.len() as i64)
    }
}

/*
 * Documents
 */

pub struct MemoryDocuments {
    documents: RwLock<Vec<Sensor>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        MemoryDocuments {
            documents: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, sensor: &Sensor) -> Result<(), StoreError> {
        self.documents.write().push(sensor.clone());
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Sensor>, StoreError> {
        let documents = self.documents.read();
        Ok(documents.iter().find(|s| s.name == name).cloned())
    }

    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        if let Some(pos) = documents.iter().position(|s| s.id == sensor_id) {
            documents.remove(pos);
        }
        Ok(())
    }

    async fn find_within(&self, area: GeoBox) -> Result<Vec<Sensor>, StoreError> {
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .filter(|s| area.contains(s.latitude, s.longitude))
            .cloned()
            .collect())
    }
}

/*
 * Search
 */

/// Mimics the index mapping: `name` and `type` are keywords,
/// `description` is analyzed text
pub struct MemorySearchIndex {
    documents: RwLock<Vec<SearchDocument>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        MemorySearchIndex {
            documents: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn index(&self, document: &SearchDocument) -> Result<(), StoreError> {
        self.documents.write().push(document.clone());
        Ok(())
    }

    async fn search(
        &self,
        query: &SearchDescriptor,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if let SearchKind::Other(op) = &query.kind {
            return Err(StoreError::backend(
                BACKEND,
                format!("unsupported search operator {}", op),
            ));
        }
        let terms = query.terms();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read();
        let mut hits: Vec<SearchHit> = documents
            .iter()
            .filter_map(|document| {
                // every term has to hit
                let mut score = 0.0;
                for (field, term) in terms.iter() {
                    let value = document.field(field)?;
                    score += score_field(&query.kind, field, value, term)?;
                }
                Some(SearchHit {
                    score,
                    document: document.clone(),
                })
            })
            .collect();
        // stable, equal scores keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }
}

fn is_text_field(field: &str) -> bool {
    field == "description"
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn score_field(kind: &SearchKind, field: &str, value: &str, term: &str) -> Option<f64> {
    if !is_text_field(field) {
        return score_token(kind, value, term);
    }

    let tokens = tokenize(value);
    match kind {
        SearchKind::Match => {
            let matched = tokenize(term)
                .iter()
                .filter(|t| tokens.contains(t))
                .count();
            (matched > 0).then_some(matched as f64)
        }
        // term level queries see the analyzed tokens, the term itself is not analyzed
        _ => tokens
            .iter()
            .filter_map(|token| score_token(kind, token, term))
            .max_by(f64::total_cmp),
    }
}

fn score_token(kind: &SearchKind, value: &str, term: &str) -> Option<f64> {
    match kind {
        SearchKind::Match => (value == term).then_some(1.0),
        SearchKind::Prefix => value.starts_with(term).then_some(1.0),
        SearchKind::Fuzzy => {
            let distance = levenshtein(value, term);
            let len = term.chars().count();
            if distance > auto_fuzziness(len) {
                return None;
            }
            Some(1.0 - distance as f64 / len.max(1) as f64)
        }
        SearchKind::Other(_) => None,
    }
}

/// Edit distance allowed for a term of the given length (AUTO)
fn auto_fuzziness(len: usize) -> usize {
    match len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { prev } else { prev + 1 };
            prev = row[j + 1];
            row[j + 1] = cost.min(row[j] + 1).min(prev + 1);
        }
    }
    row[b.len()]
}

/*
 * Aggregates
 */

pub struct MemoryAggregates {
    inner: RwLock<AggregateTables>,
}

#[derive(Default)]
struct AggregateTables {
    quantity: Vec<(String, i32)>,
    temperature: Vec<(i32, f64)>,
    battery: Vec<(i32, Option<f64>)>,
}

impl MemoryAggregates {
    pub fn new() -> Self {
        MemoryAggregates {
            inner: RwLock::new(AggregateTables::default()),
        }
    }
}

#[async_trait]
impl AggregateStore for MemoryAggregates {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn append_quantity(&self, sensor_id: i32, kind: &str) -> Result<(), StoreError> {
        self.inner.write().quantity.push((kind.to_owned(), sensor_id));
        Ok(())
    }

    async fn append_temperature(
        &self,
        sensor_id: i32,
        temperature: f64,
    ) -> Result<(), StoreError> {
        self.inner.write().temperature.push((sensor_id, temperature));
        Ok(())
    }

    async fn append_battery(
        &self,
        sensor_id: i32,
        battery_level: Option<f64>,
    ) -> Result<(), StoreError> {
        self.inner.write().battery.push((sensor_id, battery_level));
        Ok(())
    }

    async fn temperature_stats(&self) -> Result<Vec<TemperatureStats>, StoreError> {
        let inner = self.inner.read();
        let mut grouped: BTreeMap<i32, (f64, f64, f64, usize)> = BTreeMap::new();
        for (id, t) in inner.temperature.iter() {
            let entry = grouped.entry(*id).or_insert((*t, *t, 0.0, 0));
            entry.0 = entry.0.min(*t);
            entry.1 = entry.1.max(*t);
            entry.2 += *t;
            entry.3 += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|(id, (min, max, sum, count))| TemperatureStats {
                id,
                min,
                max,
                avg: sum / count as f64,
            })
            .collect())
    }

    async fn quantity_by_type(&self) -> Result<Vec<TypeQuantity>, StoreError> {
        let inner = self.inner.read();
        let mut grouped: BTreeMap<&str, i64> = BTreeMap::new();
        for (kind, _) in inner.quantity.iter() {
            *grouped.entry(kind.as_str()).or_insert(0) += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|(kind, quantity)| TypeQuantity {
                kind: kind.to_owned(),
                quantity,
            })
            .collect())
    }

    async fn latest_batteries(&self) -> Result<Vec<BatteryLevel>, StoreError> {
        let inner = self.inner.read();
        let mut latest: BTreeMap<i32, Option<f64>> = BTreeMap::new();
        for (id, level) in inner.battery.iter() {
            latest.insert(*id, *level);
        }
        Ok(latest
            .into_iter()
            .map(|(id, battery_level)| BatteryLevel { id, battery_level })
            .collect())
    }
}

/*
 * Cache
 */

/// Holds the serialized reading, like the key-value backend would
pub struct MemoryCache {
    entries: RwLock<HashMap<i32, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ReadingCache for MemoryCache {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, sensor_id: i32) -> Result<Option<SensorDataMessage>, StoreError> {
        let entries = self.entries.read();
        match entries.get(&sensor_id) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| StoreError::Payload {
                    backend: BACKEND,
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn set(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError> {
        let raw = serde_json::to_string(data).map_err(|source| StoreError::Payload {
            backend: BACKEND,
            source,
        })?;
        self.entries.write().insert(sensor_id, raw);
        Ok(())
    }

    async fn delete(&self, sensor_id: i32) -> Result<(), StoreError> {
        self.entries.write().remove(&sensor_id);
        Ok(())
    }
}

/*
 * Time series
 */

pub struct MemoryTimeSeries {
    rows: RwLock<BTreeMap<(i32, DateTime<Utc>), SensorDataMessage>>,
}

impl MemoryTimeSeries {
    pub fn new() -> Self {
        MemoryTimeSeries {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }
}

#[derive(Default)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryTimeSeries {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn upsert(&self, sensor_id: i32, data: &SensorDataMessage) -> Result<(), StoreError> {
        self.rows
            .write()
            .insert((sensor_id, data.last_seen), data.clone());
        Ok(())
    }

    async fn bucketed(
        &self,
        sensor_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: Bucket,
    ) -> Result<Vec<BucketRow>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let rows = self.rows.read();
        let mut buckets: BTreeMap<DateTime<Utc>, [Average; 3]> = BTreeMap::new();
        for ((_, last_seen), data) in rows.range((sensor_id, from)..=(sensor_id, to)) {
            let avg = buckets.entry(bucket.align(*last_seen)).or_default();
            avg[0].push(data.velocity);
            avg[1].push(data.temperature);
            avg[2].push(data.humidity);
        }
        Ok(buckets
            .into_iter()
            .map(|(bucket_start, [velocity, temperature, humidity])| BucketRow {
                id: sensor_id,
                bucket_start,
                velocity: velocity.value(),
                temperature: temperature.value(),
                humidity: humidity.value(),
            })
            .collect())
    }
}
