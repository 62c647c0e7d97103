use crate::error::{ObserverError, StoreError};
use crate::store::Stores;
use senser_core::Sensor;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

pub mod controller;
pub mod router;

/// Every store a write touches, in fan-out order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutStep {
    Registry,
    Document,
    Search,
    Quantity,
    TimeSeries,
    Temperature,
    Battery,
    Cache,
}

impl FanoutStep {
    pub fn name(&self) -> &'static str {
        match self {
            FanoutStep::Registry => "registry",
            FanoutStep::Document => "document",
            FanoutStep::Search => "search",
            FanoutStep::Quantity => "quantity",
            FanoutStep::TimeSeries => "timeseries",
            FanoutStep::Temperature => "temperature",
            FanoutStep::Battery => "battery",
            FanoutStep::Cache => "cache",
        }
    }
}

pub struct ConcurrentObserver {
    pub(crate) stores: Stores,
}

impl Debug for ConcurrentObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentObserver")
            .field("backends", &self.stores.backends())
            .finish()
    }
}

impl ConcurrentObserver {
    pub fn new(stores: Stores) -> Arc<Self> {
        Arc::new(ConcurrentObserver { stores })
    }

    pub fn backends(&self) -> Vec<(&'static str, &'static str)> {
        self.stores.backends()
    }

    pub async fn sensor_count(&self) -> Result<i64, StoreError> {
        self.stores.registry.count().await
    }

    /// Registry lookup every cross-store operation starts with
    pub(crate) async fn existing(&self, sensor_id: i32) -> Result<Sensor, ObserverError> {
        self.stores
            .registry
            .get(sensor_id)
            .await?
            .ok_or(ObserverError::SensorNotFound(sensor_id))
    }

    /// Runs a single fan-out step. Nothing is rolled back on failure,
    /// the log line is what an operator reconciles the stores with.
    pub(crate) async fn step<T, F>(
        &self,
        step: FanoutStep,
        sensor_id: i32,
        op: F,
    ) -> Result<T, ObserverError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match op.await {
            Ok(value) => {
                debug!(sensor_id = sensor_id, step = step.name(), "Fan-out step done");
                Ok(value)
            }
            Err(e) => {
                error!(
                    sensor_id = sensor_id,
                    step = step.name(),
                    "Fan-out step failed, stores diverged: {}",
                    e
                );
                Err(e.into())
            }
        }
    }
}
