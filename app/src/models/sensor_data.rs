use chrono::{DateTime, Utc};
use senser_core::query::Bucket;
use senser_core::{BucketRow, SensorDataMessage};

#[cfg(test)]
use super::CountRecord;
use crate::error::DBError;

#[derive(sqlx::FromRow)]
pub struct BucketDao {
    pub(crate) id: i32,
    pub(crate) bucket_start: DateTime<Utc>,
    pub(crate) velocity: Option<f64>,
    pub(crate) temperature: Option<f64>,
    pub(crate) humidity: Option<f64>,
}

impl From<BucketDao> for BucketRow {
    fn from(val: BucketDao) -> Self {
        BucketRow {
            id: val.id,
            bucket_start: val.bucket_start,
            velocity: val.velocity,
            temperature: val.temperature,
            humidity: val.humidity,
        }
    }
}

/// Insert-or-update keyed by (id, last_seen), every metric column
/// is overwritten by the new reading
pub async fn upsert(
    conn: &sqlx::PgPool,
    sensor_id: i32,
    dto: &SensorDataMessage,
) -> Result<(), DBError> {
    sql_stmnt!(
        r#"INSERT INTO sensor_data
            (id, temperature, humidity, velocity, battery_level, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id, last_seen) DO UPDATE
            SET temperature = EXCLUDED.temperature,
                humidity = EXCLUDED.humidity,
                velocity = EXCLUDED.velocity,
                battery_level = EXCLUDED.battery_level"#,
        sensor_id,
        dto.temperature,
        dto.humidity,
        dto.velocity,
        dto.battery_level,
        dto.last_seen
    )
    .execute(conn)
    .await?;
    Ok(())
}

// READ sensor_data, averaged per bucket
pub async fn get_bucketed(
    conn: &sqlx::PgPool,
    sensor_id: i32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    bucket: Bucket,
) -> Result<Vec<BucketDao>, DBError> {
    Ok(sql_stmnt!(
        BucketDao,
        r#"SELECT id,
                time_bucket($2::text::interval, last_seen) AS bucket_start,
                AVG(velocity) AS velocity,
                AVG(temperature) AS temperature,
                AVG(humidity) AS humidity
            FROM sensor_data
            WHERE id = $1 AND last_seen >= $3 AND last_seen <= $4
            GROUP BY id, bucket_start
            ORDER BY bucket_start ASC"#,
        sensor_id,
        bucket.interval(),
        from,
        to
    )
    .fetch_all(conn)
    .await?)
}

#[cfg(test)]
pub async fn count(conn: &sqlx::PgPool, sensor_id: i32) -> Result<i64, DBError> {
    let rows = sql_stmnt!(
        CountRecord,
        "SELECT count(*) as count FROM sensor_data WHERE id = $1",
        sensor_id
    )
    .fetch_one(conn)
    .await?;
    Ok(rows.count())
}
