pub mod consul;
pub mod normalize;
pub mod propagator;
pub mod resolver;
pub mod target;
pub mod watcher;

pub use consul::{ConsulClient, ServiceQuery};
pub use normalize::{normalize, ChangeFilter};
pub use propagator::{propagate, AddressSink};
pub use resolver::{ConsulResolver, ConsulResolverBuilder};
pub use target::{Target, SCHEME};
pub use watcher::watch_service;
