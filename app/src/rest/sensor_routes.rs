use super::build_response;
use super::query::{DataQuery, NearQuery, PageQuery, SearchQuery};
use crate::sensor::{ConcurrentObserver, QueryObserver, SensorObserver};
use senser_core::{NewSensor, SensorDataMessage};
use std::sync::Arc;
use warp::Filter;

const JSON_LIMIT: u64 = 16 * 1024;

pub fn routes(
    observer: &Arc<ConcurrentObserver>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let sensors = SensorObserver::new(observer.clone());
    let queries = QueryObserver::new(observer.clone());

    // static segments first, ids are matched last
    near(queries.clone())
        .or(search(queries.clone()))
        .or(temperature_values(queries.clone()))
        .or(quantity_by_type(queries.clone()))
        .or(low_battery(queries.clone()))
        .or(list_sensors(sensors.clone()))
        .or(create_sensor(sensors.clone()))
        .or(get_sensor(sensors.clone()))
        .or(delete_sensor(sensors.clone()))
        .or(record_data(sensors))
        .or(get_data(queries))
}

/// GET /sensors?skip&limit
///
/// Registered sensors in insertion order
#[utoipa::path(
    get,
    path = "/sensors",
    tag = "sensors",
    params(
        ("skip" = Option<u32>, Query, description = "Sensors to skip, default 0"),
        ("limit" = Option<u32>, Query, description = "Page size, default 100"),
    ),
    responses(
        (status = 200, description = "Page of sensors", body = [Sensor]),
        (status = 400, description = "Negative or malformed paging parameters"),
    )
)]
fn list_sensors(
    observer: SensorObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors"))
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and_then(|observer: SensorObserver, page: PageQuery| async move {
            let resp = observer
                .list(i64::from(page.skip), i64::from(page.limit))
                .await;
            build_response(resp)
        })
        .boxed()
}

/// POST /sensors
///
/// Registers the sensor and projects it into every store
#[utoipa::path(
    post,
    path = "/sensors",
    tag = "sensors",
    request_body = NewSensor,
    responses(
        (status = 200, description = "Registered sensor with its id", body = Sensor),
        (status = 400, description = "Sensor with same name already registered"),
    )
)]
fn create_sensor(
    observer: SensorObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors"))
        .and(warp::post())
        .and(warp::body::content_length_limit(JSON_LIMIT))
        .and(warp::body::json())
        .and_then(|observer: SensorObserver, body: NewSensor| async move {
            let resp = observer.create(body).await;
            build_response(resp)
        })
        .boxed()
}

/// GET /sensors/:id
#[utoipa::path(
    get,
    path = "/sensors/{sensor_id}",
    tag = "sensors",
    params(("sensor_id" = i32, Path, description = "Registry id")),
    responses(
        (status = 200, description = "Registered sensor", body = Sensor),
        (status = 404, description = "Sensor not found"),
    )
)]
fn get_sensor(
    observer: SensorObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / i32))
        .and(warp::get())
        .and_then(|observer: SensorObserver, sensor_id: i32| async move {
            let resp = observer.get(sensor_id).await;
            build_response(resp)
        })
        .boxed()
}

/// DELETE /sensors/:id
///
/// Returns the removed sensor. Search and aggregate rows are kept.
#[utoipa::path(
    delete,
    path = "/sensors/{sensor_id}",
    tag = "sensors",
    params(("sensor_id" = i32, Path, description = "Registry id")),
    responses(
        (status = 200, description = "Removed sensor", body = Sensor),
        (status = 404, description = "Sensor not found"),
    )
)]
fn delete_sensor(
    observer: SensorObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / i32))
        .and(warp::delete())
        .and_then(|observer: SensorObserver, sensor_id: i32| async move {
            let resp = observer.delete(sensor_id).await;
            build_response(resp)
        })
        .boxed()
}

/// POST /sensors/:id/data
///
/// Records a reading, answers with the cached copy
#[utoipa::path(
    post,
    path = "/sensors/{sensor_id}/data",
    tag = "sensors",
    params(("sensor_id" = i32, Path, description = "Registry id")),
    request_body = SensorDataMessage,
    responses(
        (status = 200, description = "Reading as stored in the cache", body = SensorDataMessage),
        (status = 404, description = "Sensor not found"),
    )
)]
fn record_data(
    observer: SensorObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / i32 / "data"))
        .and(warp::post())
        .and(warp::body::content_length_limit(JSON_LIMIT))
        .and(warp::body::json())
        .and_then(
            |observer: SensorObserver, sensor_id: i32, body: SensorDataMessage| async move {
                let resp = observer.record(sensor_id, body).await;
                build_response(resp)
            },
        )
        .boxed()
}

/// GET /sensors/:id/data?from&to&bucket
///
/// Latest cached reading, or averaged buckets if the whole range is given
#[utoipa::path(
    get,
    path = "/sensors/{sensor_id}/data",
    tag = "sensors",
    params(
        ("sensor_id" = i32, Path, description = "Registry id"),
        ("from" = Option<String>, Query, description = "Range start, RFC 3339 or date"),
        ("to" = Option<String>, Query, description = "Range end, inclusive"),
        ("bucket" = Option<String>, Query, description = "year, month, week, day or hour"),
    ),
    responses(
        (status = 200, description = "Latest reading or bucket rows", body = [BucketRow]),
        (status = 400, description = "Invalid bucket size or date"),
        (status = 404, description = "Sensor not found"),
    )
)]
fn get_data(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / i32 / "data"))
        .and(warp::get())
        .and(warp::query::<DataQuery>())
        .and_then(
            |observer: QueryObserver, sensor_id: i32, query: DataQuery| async move {
                let resp = observer
                    .data(
                        sensor_id,
                        query.from.as_deref(),
                        query.to.as_deref(),
                        query.bucket.as_deref(),
                    )
                    .await;
                build_response(resp)
            },
        )
        .boxed()
}

/// GET /sensors/near?latitude&longitude&radius
#[utoipa::path(
    get,
    path = "/sensors/near",
    tag = "sensors",
    params(
        ("latitude" = f64, Query, description = "Center latitude"),
        ("longitude" = f64, Query, description = "Center longitude"),
        ("radius" = f64, Query, description = "Half the side of the bounding box"),
    ),
    responses((status = 200, description = "Sensors in the box with their latest reading"))
)]
fn near(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / "near"))
        .and(warp::get())
        .and(warp::query::<NearQuery>())
        .and_then(|observer: QueryObserver, query: NearQuery| async move {
            let resp = observer
                .near(query.latitude, query.longitude, query.radius)
                .await;
            build_response(resp)
        })
        .boxed()
}

/// GET /sensors/search?query&size&search_type
#[utoipa::path(
    get,
    path = "/sensors/search",
    tag = "sensors",
    params(
        ("query" = String, Query, description = "Json object of field and term"),
        ("size" = Option<usize>, Query, description = "Maximum hits, default 10"),
        ("search_type" = Option<String>, Query, description = "match, prefix, similar, ..."),
    ),
    responses(
        (status = 200, description = "Matching sensors, best first", body = [Sensor]),
        (status = 400, description = "Invalid search query"),
    )
)]
fn search(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / "search"))
        .and(warp::get())
        .and(warp::query::<SearchQuery>())
        .and_then(|observer: QueryObserver, query: SearchQuery| async move {
            let resp = observer
                .search(&query.query, query.size, &query.search_type)
                .await;
            build_response(resp)
        })
        .boxed()
}

/// GET /sensors/temperature/values
#[utoipa::path(
    get,
    path = "/sensors/temperature/values",
    tag = "aggregates",
    responses((status = 200, description = "Min, max and average temperature per sensor"))
)]
fn temperature_values(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / "temperature" / "values"))
        .and(warp::get())
        .and_then(|observer: QueryObserver| async move {
            let resp = observer.temperature_values().await;
            build_response(resp)
        })
        .boxed()
}

/// GET /sensors/quantity_by_type
#[utoipa::path(
    get,
    path = "/sensors/quantity_by_type",
    tag = "aggregates",
    responses((status = 200, description = "Registered sensors per type"))
)]
fn quantity_by_type(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / "quantity_by_type"))
        .and(warp::get())
        .and_then(|observer: QueryObserver| async move {
            let resp = observer.quantity_by_type().await;
            build_response(resp)
        })
        .boxed()
}

/// GET /sensors/low_battery
#[utoipa::path(
    get,
    path = "/sensors/low_battery",
    tag = "aggregates",
    responses((status = 200, description = "Sensors whose latest battery level is below 20%"))
)]
fn low_battery(
    observer: QueryObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("sensors" / "low_battery"))
        .and(warp::get())
        .and_then(|observer: QueryObserver| async move {
            let resp = observer.low_battery().await;
            build_response(resp)
        })
        .boxed()
}
