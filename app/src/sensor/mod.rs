pub mod observer;

#[cfg(test)]
mod test;

pub use observer::controller::SensorObserver;
pub use observer::router::QueryObserver;
pub use observer::ConcurrentObserver;
