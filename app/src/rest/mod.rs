use crate::config::CONFIG;
use crate::error::ObserverError;
use crate::sensor::ConcurrentObserver;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

mod doc_routes;
mod metric_routes;
mod query;
mod sensor_routes;


#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorDto {
    pub detail: String,
}

pub fn routes(
    observer: &Arc<ConcurrentObserver>,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    sensor_routes::routes(observer)
        .or(metric_routes::routes(observer))
        .or(doc_routes::routes())
        .recover(handle_rejection)
        .with(warp::trace(|info| {
            info_span!(
                "request",
                method = %info.method(),
                path = %info.path(),
                request_id = %uuid::Uuid::new_v4(),
            )
        }))
}

/// Starts the webserver, returns after Ctrl-C
pub async fn dispatch_server_daemon(observer: Arc<ConcurrentObserver>) {
    let port = CONFIG.server_port();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed listening for shutdown signal: {}", e);
        }
        info!("Shutting down webserver");
    };

    match warp::serve(routes(&observer)).try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown)
    {
        Ok((addr, server)) => {
            info!("Starting webserver at: {}", addr);
            server.await;
        }
        Err(e) => error!("Failed binding port {}: {}", port, e),
    }
}

fn error_reply(status: StatusCode, detail: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorDto { detail }), status).into_response()
}

pub(crate) fn build_response<T: Serialize>(
    resp: Result<T, ObserverError>,
) -> Result<Response, Rejection> {
    match resp {
        Ok(data) => Ok(warp::reply::json(&data).into_response()),
        Err(err) if err.is_user() => {
            warn!("{}", err);
            let status = match err {
                ObserverError::SensorNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            Ok(error_reply(status, err.to_string()))
        }
        Err(err) => {
            error!("{}", err);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_owned(),
            ))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_owned())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_owned())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".to_owned())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_owned(),
        )
    };
    Ok(error_reply(status, detail))
}
