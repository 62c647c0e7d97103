use super::AggregateStore;
use crate::error::StoreError;
use async_trait::async_trait;
use cdrs_tokio::authenticators::NoneAuthenticatorProvider;
use cdrs_tokio::cluster::session::{Session, SessionBuilder, TcpSessionBuilder};
use cdrs_tokio::cluster::{NodeTcpConfigBuilder, TcpConnectionManager};
use cdrs_tokio::frame::Envelope;
use cdrs_tokio::load_balancing::RoundRobinLoadBalancingStrategy;
use cdrs_tokio::query_values;
use cdrs_tokio::transport::TransportTcp;
use cdrs_tokio::types::rows::Row;
use cdrs_tokio::types::IntoRustByName;
use senser_core::{BatteryLevel, TemperatureStats, TypeQuantity};
use std::sync::Arc;
use tracing::info;

const BACKEND: &str = "cassandra";

type CassandraSession = Session<
    TransportTcp,
    TcpConnectionManager,
    RoundRobinLoadBalancingStrategy<TransportTcp, TcpConnectionManager>,
>;

// Readings are append-only, a timeuuid keeps every row of a sensor
const SCHEMA: [&str; 4] = [
    "CREATE KEYSPACE IF NOT EXISTS sensor WITH REPLICATION = \
        { 'class': 'SimpleStrategy', 'replication_factor': 1 }",
    "CREATE TABLE IF NOT EXISTS sensor.temperature \
        (id int, recorded_at timeuuid, temperature double, PRIMARY KEY (id, recorded_at))",
    "CREATE TABLE IF NOT EXISTS sensor.quantity \
        (type text, id int, PRIMARY KEY (type, id))",
    "CREATE TABLE IF NOT EXISTS sensor.battery \
        (id int, recorded_at timeuuid, battery_level double, PRIMARY KEY (id, recorded_at)) \
        WITH CLUSTERING ORDER BY (recorded_at DESC)",
];

pub struct CassandraAggregates {
    session: CassandraSession,
}

impl CassandraAggregates {
    pub async fn connect(nodes: &[String]) -> Result<Self, StoreError> {
        let mut config = NodeTcpConfigBuilder::new()
            .with_authenticator_provider(Arc::new(NoneAuthenticatorProvider));
        for node in nodes {
            config = config.with_contact_point(node.as_str().into());
        }
        let config = config
            .build()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        let session = TcpSessionBuilder::new(RoundRobinLoadBalancingStrategy::new(), config)
            .build()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        for stmt in SCHEMA {
            session
                .query(stmt)
                .await
                .map_err(|e| StoreError::backend(BACKEND, e))?;
        }
        info!(nodes = nodes.len(), "Cassandra schema ready");
        Ok(CassandraAggregates { session })
    }

    async fn rows(&self, stmt: &str) -> Result<Vec<Row>, StoreError> {
        let envelope = self
            .session
            .query(stmt)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        into_rows(envelope)
    }
}

fn into_rows(envelope: Envelope) -> Result<Vec<Row>, StoreError> {
    let body = envelope
        .response_body()
        .map_err(|e| StoreError::backend(BACKEND, e))?;
    Ok(body.into_rows().unwrap_or_default())
}

fn column<T>(row: &Row, name: &str) -> Result<T, StoreError>
where
    Row: IntoRustByName<T>,
{
    row.get_r_by_name(name)
        .map_err(|e| StoreError::backend(BACKEND, e))
}

#[async_trait]
impl AggregateStore for CassandraAggregates {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn append_quantity(&self, sensor_id: i32, kind: &str) -> Result<(), StoreError> {
        self.session
            .query_with_values(
                "INSERT INTO sensor.quantity (type, id) VALUES (?, ?)",
                query_values!(kind.to_owned(), sensor_id),
            )
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn append_temperature(
        &self,
        sensor_id: i32,
        temperature: f64,
    ) -> Result<(), StoreError> {
        self.session
            .query_with_values(
                "INSERT INTO sensor.temperature (id, recorded_at, temperature) VALUES (?, now(), ?)",
                query_values!(sensor_id, temperature),
            )
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn append_battery(
        &self,
        sensor_id: i32,
        battery_level: Option<f64>,
    ) -> Result<(), StoreError> {
        self.session
            .query_with_values(
                "INSERT INTO sensor.battery (id, recorded_at, battery_level) VALUES (?, now(), ?)",
                query_values!(sensor_id, battery_level),
            )
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn temperature_stats(&self) -> Result<Vec<TemperatureStats>, StoreError> {
        let rows = self
            .rows(
                "SELECT id, min(temperature) AS min_temp, max(temperature) AS max_temp, \
                    avg(temperature) AS avg_temp \
                FROM sensor.temperature GROUP BY id",
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TemperatureStats {
                    id: column(row, "id")?,
                    min: column(row, "min_temp")?,
                    max: column(row, "max_temp")?,
                    avg: column(row, "avg_temp")?,
                })
            })
            .collect()
    }

    async fn quantity_by_type(&self) -> Result<Vec<TypeQuantity>, StoreError> {
        let rows = self
            .rows("SELECT type, count(*) AS quantity FROM sensor.quantity GROUP BY type")
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TypeQuantity {
                    kind: column(row, "type")?,
                    quantity: column(row, "quantity")?,
                })
            })
            .collect()
    }

    async fn latest_batteries(&self) -> Result<Vec<BatteryLevel>, StoreError> {
        let rows = self
            .rows("SELECT id, battery_level FROM sensor.battery PER PARTITION LIMIT 1")
            .await?;
        rows.iter()
            .map(|row| {
                let battery_level: Option<f64> = row
                    .get_by_name("battery_level")
                    .map_err(|e| StoreError::backend(BACKEND, e))?;
                Ok(BatteryLevel {
                    id: column(row, "id")?,
                    battery_level,
                })
            })
            .collect()
    }
}
