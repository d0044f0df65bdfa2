//! Rate limiting logic and state management.

mod admin;
mod context;
mod gate;
mod limiter;
mod store;

pub use admin::{DimensionStats, GateStats};
pub use context::RequestContext;
pub use gate::{CompositeGate, GatePolicies, RateLimiterRegistry};
pub use limiter::{Decision, Dimension, DimensionLimiter, DimensionPolicy};
pub use store::{CounterEntry, WindowCounterStore};
