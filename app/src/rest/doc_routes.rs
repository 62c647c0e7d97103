use super::sensor_routes;
use senser_core::{BucketRow, NewSensor, Sensor, SensorDataMessage, TemperatureValues, TypeQuantity};
use utoipa::OpenApi;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    info(title = "Senser", description = "Sensor telemetry gateway"),
    paths(
        sensor_routes::list_sensors,
        sensor_routes::create_sensor,
        sensor_routes::get_sensor,
        sensor_routes::delete_sensor,
        sensor_routes::record_data,
        sensor_routes::get_data,
        sensor_routes::near,
        sensor_routes::search,
        sensor_routes::temperature_values,
        sensor_routes::quantity_by_type,
        sensor_routes::low_battery,
    ),
    components(schemas(
        Sensor,
        NewSensor,
        SensorDataMessage,
        BucketRow,
        TemperatureValues,
        TypeQuantity
    )),
    tags(
        (name = "sensors", description = "Registry, readings and lookups"),
        (name = "aggregates", description = "Per sensor and per type statistics"),
    )
)]
pub struct ApiDoc;

pub fn routes() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api = ApiDoc::openapi();
    warp::path!("api" / "doc" / "api.json")
        .and(warp::get())
        .map(move || warp::reply::json(&api))
        .boxed()
}
