use super::CountRecord;
use crate::error::DBError;
use senser_core::{NewSensor, Sensor};

#[derive(sqlx::FromRow, Debug)]
pub struct SensorDao {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    #[sqlx(rename = "type")]
    pub(crate) kind: String,
    pub(crate) mac_address: String,
    pub(crate) manufacturer: String,
    pub(crate) model: String,
    pub(crate) serie_number: String,
    pub(crate) firmware_version: String,
    pub(crate) description: String,
}

impl From<SensorDao> for Sensor {
    fn from(val: SensorDao) -> Self {
        Sensor {
            id: val.id,
            name: val.name,
            latitude: val.latitude,
            longitude: val.longitude,
            kind: val.kind,
            mac_address: val.mac_address,
            manufacturer: val.manufacturer,
            model: val.model,
            serie_number: val.serie_number,
            firmware_version: val.firmware_version,
            description: val.description,
        }
    }
}

/// Fails with a unique violation if the name is taken
pub async fn insert(conn: &sqlx::PgPool, sensor: &NewSensor) -> Result<SensorDao, DBError> {
    Ok(sql_stmnt!(
        SensorDao,
        r#"INSERT INTO sensors
            (name, latitude, longitude, type, mac_address, manufacturer, model, serie_number, firmware_version, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *"#,
        &sensor.name,
        sensor.latitude,
        sensor.longitude,
        &sensor.kind,
        &sensor.mac_address,
        &sensor.manufacturer,
        &sensor.model,
        &sensor.serie_number,
        &sensor.firmware_version,
        &sensor.description
    )
    .fetch_one(conn)
    .await?)
}

pub async fn get(conn: &sqlx::PgPool, sensor_id: i32) -> Result<Option<SensorDao>, DBError> {
    Ok(
        sql_stmnt!(SensorDao, "SELECT * FROM sensors WHERE id = $1", sensor_id)
            .fetch_optional(conn)
            .await?,
    )
}

pub async fn get_by_name(conn: &sqlx::PgPool, name: &str) -> Result<Option<SensorDao>, DBError> {
    Ok(
        sql_stmnt!(SensorDao, "SELECT * FROM sensors WHERE name = $1", name)
            .fetch_optional(conn)
            .await?,
    )
}

/// READ sensors, in insertion order
pub async fn read(conn: &sqlx::PgPool, skip: i64, limit: i64) -> Result<Vec<SensorDao>, DBError> {
    Ok(sql_stmnt!(
        SensorDao,
        "SELECT * FROM sensors ORDER BY id ASC OFFSET $1 LIMIT $2",
        skip,
        limit
    )
    .fetch_all(conn)
    .await?)
}

pub async fn count(conn: &sqlx::PgPool) -> Result<i64, DBError> {
    let rows = sql_stmnt!(CountRecord, "SELECT count(*) as count FROM sensors")
        .fetch_one(conn)
        .await?;
    Ok(rows.count())
}

pub async fn delete(conn: &sqlx::PgPool, remove_id: i32) -> Result<Option<SensorDao>, DBError> {
    Ok(sql_stmnt!(
        SensorDao,
        "DELETE FROM sensors WHERE id = $1 RETURNING *",
        remove_id
    )
    .fetch_optional(conn)
    .await?)
}
