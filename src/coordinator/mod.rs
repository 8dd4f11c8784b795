//! Caller-facing request API
//!
//! - `RequestCoordinator` - Splits requests, dedups against pending names and
//!   issues prompts through the lifecycle anchor
//! - `ResultAggregator` - Shapes the answers of one request (per capability,
//!   merged, or all-granted)

mod aggregator;
mod coordinator;

pub use aggregator::{ResultAggregator, ResultStream};
pub use coordinator::RequestCoordinator;
