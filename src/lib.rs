//! # consul-traffic
//!
//! Client-side traffic steering for RPC clients backed by Consul.
//!
//! The crate has two halves that meet at the connection-management runtime
//! of the RPC client:
//!
//! - **Resolution** (`discovery`): a `ConsulResolver` runs blocking health
//!   queries for one service, turns each answer into a sorted, deduplicated
//!   `AddressList`, and hands changed lists to the runtime through
//!   `AddressSink`.
//! - **Picking** (`load_balancing`): once the runtime has ready connections
//!   for those addresses, `PriorityPickerBuilder` snapshots them into a
//!   `PriorityPicker`, which chooses a connection per call from the
//!   `x-traffic-tag` call metadata, falling back to round robin.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use consul_traffic::{AddressList, ConsulResolverBuilder, PriorityPickerBuilder};
//!
//! let (tx, mut rx) = tokio::sync::watch::channel(AddressList::default());
//! let resolver = ConsulResolverBuilder::new()
//!     .build("consul://127.0.0.1:8500/billing?wait=30s&healthy=true", Arc::new(tx))?;
//!
//! // Later, with ready connections keyed by their resolved address:
//! let picker = PriorityPickerBuilder::new().build(ready_connections);
//! let conn = picker.pick(request.metadata())?;
//! ```

/// Error types, configuration and the shared data model
pub mod core;

/// Consul watch loop, address normalization and propagation
pub mod discovery;

/// Tag-priority connection picking
pub mod load_balancing;

/// Logging setup and metric names
pub mod observability;

pub use self::core::config::TrafficConfig;
pub use self::core::error::{TrafficError, TrafficResult};
pub use self::core::types::{Address, AddressList, QueryMeta, QueryOptions, ServiceEntry};
pub use discovery::{AddressSink, ConsulClient, ConsulResolver, ConsulResolverBuilder, ServiceQuery, Target};
pub use load_balancing::{PriorityPicker, PriorityPickerBuilder, PriorityTagSet, SharedPicker, TRAFFIC_TAG_KEY};
