use super::build_response;
use crate::sensor::ConcurrentObserver;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use warp::Filter;

pub fn routes(
    observer: &Arc<ConcurrentObserver>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    root().or(health(observer.clone()))
}

fn root() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and_then(|| async move {
            let ret = dto::RootDto {
                name: "Senser",
                version: env!("CARGO_PKG_VERSION"),
                core_version: senser_core::CORE_VERSION,
            };
            build_response(Ok(ret))
        })
        .boxed()
}

fn health(
    observer: Arc<ConcurrentObserver>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::path!("api" / "health"))
        .and(warp::get())
        .and_then(|observer: Arc<ConcurrentObserver>| async move {
            let (registry_state, sensor_count) = match observer.sensor_count().await {
                Ok(count) => ("reachable".to_owned(), Some(count)),
                Err(e) => {
                    error!("Registry unreachable: {}", e);
                    (e.to_string(), None)
                }
            };
            let ret = dto::HealthyDto {
                healthy: sensor_count.is_some(),
                registry_state,
                sensor_count,
                backends: observer.backends().into_iter().collect(),
            };
            build_response(Ok(ret))
        })
        .boxed()
}

mod dto {
    use super::BTreeMap;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    pub struct RootDto {
        pub name: &'static str,
        pub version: &'static str,
        pub core_version: &'static str,
    }

    #[derive(Debug, Serialize)]
    pub struct HealthyDto {
        pub healthy: bool,
        pub registry_state: String,
        pub sensor_count: Option<i64>,
        pub backends: BTreeMap<&'static str, &'static str>,
    }
}
