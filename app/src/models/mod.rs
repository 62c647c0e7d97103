use crate::error::DBError;

// Statements are checked at runtime, the database only exists once
// the gateway is deployed.
macro_rules! sql_stmnt {
    ($ret:ident, $stmt:expr) => {
        sqlx::query_as::<_, $ret>($stmt)
    };
    ($stmt:expr) => {
        sqlx::query($stmt)
    };
    ($ret:ident, $stmt:expr, $($bind:expr),*) => {
        sqlx::query_as::<_, $ret>($stmt)$(.bind($bind))*
    };
    ($stmt:expr, $($bind:expr),*) => {
        sqlx::query($stmt)$(.bind($bind))*
    };
}

pub async fn establish_db_connection(database_url: &str) -> Result<sqlx::PgPool, DBError> {
    Ok(sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?)
}

/// Registry and time-series may share a database, so each migrator
/// tolerates the migrations applied by the other one.
pub async fn migrate_registry(conn: &sqlx::PgPool) -> Result<(), DBError> {
    let mut migrator = sqlx::migrate!("./migrations/registry");
    migrator.set_ignore_missing(true);
    migrator.run(conn).await?;
    Ok(())
}

pub async fn migrate_timeseries(conn: &sqlx::PgPool) -> Result<(), DBError> {
    let mut migrator = sqlx::migrate!("./migrations/timeseries");
    migrator.set_ignore_missing(true);
    migrator.run(conn).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
pub(crate) struct CountRecord {
    pub count: Option<i64>,
}

impl CountRecord {
    pub fn count(self) -> i64 {
        self.count.unwrap_or(0)
    }
}

pub mod sensor;
pub mod sensor_data;
