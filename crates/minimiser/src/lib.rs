//! Forecast caching and optimisation engine.
//!
//! Keeps a periodically rebuilt snapshot of every carbon-intensity forecast
//! for the configured regions and answers "when and where is it greenest"
//! queries over it, or directly against the source when caching is off.
//! [`server`] exposes the same queries over HTTP.

pub mod cache;
pub mod catalog;
pub mod context;
pub mod optimizer;
pub mod persist;
pub mod query;
pub mod server;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod fixture;

pub use cache::SnapshotCache;
pub use catalog::{CachedValue, Operation, OperationParam};
pub use context::AppContext;
pub use optimizer::{
    ForecastAccess, LocatedPoint, LocatedWindowCost, LocationOption, Optimizer, Selection,
    TimeRange, WindowCost,
};
pub use query::{QueryFacade, QueryParams};
pub use snapshot::Snapshot;
