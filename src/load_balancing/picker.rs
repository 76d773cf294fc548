//! # Priority Picker
//!
//! Per-call connection selection driven by the `x-traffic-tag` metadata.
//!
//! ## Selection
//!
//! 1. No priority tags on the call: round robin over the ready connections.
//! 2. Otherwise every connection scores the sum of the weights of the tags it
//!    advertises. The highest score wins; on a tie the connection that comes
//!    first in build order is kept.
//! 3. If no connection scores above zero, the call falls back to round robin
//!    instead of failing.
//!
//! A picker is an immutable snapshot. The runtime builds a new one whenever
//! its ready set changes and swaps it in (see `SharedPicker`). The only
//! mutable state is the round-robin cursor, advanced with a single atomic
//! `fetch_add`.

use metrics::counter;
use std::sync::atomic::{AtomicU32, Ordering};
use tonic::metadata::MetadataMap;
use tracing::debug;

use crate::core::error::{TrafficError, TrafficResult};
use crate::core::types::Address;
use crate::load_balancing::tags::PriorityTagSet;
use crate::observability::metrics::{PICKS, PICK_NO_CONNECTION};

/// Name the picker registers under with the connection runtime
pub const BALANCER_NAME: &str = "traffic_tag";

/// A ready connection and the tags its address advertised at build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry<C> {
    pub conn: C,
    pub tags: Vec<String>,
}

/// Immutable selection table for one ready set
#[derive(Debug)]
pub struct PriorityPicker<C> {
    entries: Vec<ConnectionEntry<C>>,
    next: AtomicU32,
}

impl<C: Clone> PriorityPicker<C> {
    /// Create a picker whose round-robin cursor starts at `start`
    pub fn new(entries: Vec<ConnectionEntry<C>>, start: u32) -> Self {
        Self {
            entries,
            next: AtomicU32::new(start),
        }
    }

    /// Pick a connection for a call carrying `metadata`
    pub fn pick(&self, metadata: &MetadataMap) -> TrafficResult<C> {
        self.pick_with_tags(&PriorityTagSet::from_metadata(metadata))
    }

    /// Pick a connection for an already extracted tag set
    pub fn pick_with_tags(&self, tags: &PriorityTagSet) -> TrafficResult<C> {
        if tags.is_empty() {
            return self.pick_round_robin();
        }

        match self.pick_by_priority(tags) {
            Some((index, score)) => {
                counter!(PICKS, "strategy" => "priority").increment(1);
                debug!(index, score, "Picked connection by traffic tag priority");
                Ok(self.entries[index].conn.clone())
            }
            None => {
                debug!(requested = tags.len(), "No connection matches requested traffic tags, using round robin");
                self.pick_round_robin()
            }
        }
    }

    /// Index and score of the best connection, if any scores above zero
    fn pick_by_priority(&self, tags: &PriorityTagSet) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let score = tags.score(&entry.tags);
            let current = best.map_or(0, |(_, s)| s);
            if score > current {
                best = Some((index, score));
            }
        }
        best
    }

    fn pick_round_robin(&self) -> TrafficResult<C> {
        if self.entries.is_empty() {
            counter!(PICK_NO_CONNECTION).increment(1);
            return Err(TrafficError::NoConnectionAvailable);
        }

        let cursor = self.next.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let index = cursor as usize % self.entries.len();
        counter!(PICKS, "strategy" => "round_robin").increment(1);
        debug!(index, "Picked connection by round robin");
        Ok(self.entries[index].conn.clone())
    }

    pub fn entries(&self) -> &[ConnectionEntry<C>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds pickers from the runtime's ready connections
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityPickerBuilder;

impl PriorityPickerBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        BALANCER_NAME
    }

    /// Snapshot `ready` into a new picker
    ///
    /// Build order follows the iteration order of `ready`. The cursor starts
    /// at a random position so that many pickers built at once do not all
    /// send their first call to the same connection.
    pub fn build<C, I>(&self, ready: I) -> PriorityPicker<C>
    where
        C: Clone,
        I: IntoIterator<Item = (C, Address)>,
    {
        let entries: Vec<_> = ready
            .into_iter()
            .map(|(conn, address)| ConnectionEntry {
                conn,
                tags: address.tags,
            })
            .collect();

        debug!(connections = entries.len(), "Built traffic tag picker");
        PriorityPicker::new(entries, rand::random())
    }
}
