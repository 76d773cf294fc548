//! Metric names emitted by the resolver and the picker.
//!
//! Recording goes through the `metrics` facade; installing an exporter is up
//! to the embedding application.

use metrics::{describe_counter, describe_gauge, Unit};

pub const DISCOVERY_QUERIES: &str = "consul_resolver_queries_total";
pub const DISCOVERY_QUERY_ERRORS: &str = "consul_resolver_query_errors_total";
pub const ADDRESS_UPDATES: &str = "consul_resolver_updates_total";
pub const ADDRESS_UPDATE_ERRORS: &str = "consul_resolver_update_errors_total";
pub const RESOLVED_ADDRESSES: &str = "consul_resolver_addresses";
pub const PICKS: &str = "traffic_picker_picks_total";
pub const PICK_NO_CONNECTION: &str = "traffic_picker_no_connection_total";

/// Register descriptions for every metric this crate emits
pub fn describe_metrics() {
    describe_counter!(DISCOVERY_QUERIES, Unit::Count, "Blocking health queries issued against Consul");
    describe_counter!(DISCOVERY_QUERY_ERRORS, Unit::Count, "Blocking health queries that failed");
    describe_counter!(ADDRESS_UPDATES, Unit::Count, "Address lists delivered to the connection runtime");
    describe_counter!(ADDRESS_UPDATE_ERRORS, Unit::Count, "Address lists the connection runtime rejected");
    describe_gauge!(RESOLVED_ADDRESSES, Unit::Count, "Addresses in the most recent list per service");
    describe_counter!(PICKS, Unit::Count, "Connections picked, by strategy");
    describe_counter!(PICK_NO_CONNECTION, Unit::Count, "Picks that found no ready connection");
}
