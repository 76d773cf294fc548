//! Call-scoped priority tags.
//!
//! A call asks for preferred backends through the `x-traffic-tag` metadata
//! key, a comma-separated list ordered from most to least important:
//!
//! ```text
//! x-traffic-tag: canary, eu-west, ssd
//! ```
//!
//! The i-th of N tags weighs `2^(N-1-i)`, so any tag outweighs all tags
//! listed after it combined.

use std::collections::HashMap;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};

use crate::core::error::{TrafficError, TrafficResult};

/// Outgoing metadata key carrying the priority tags
pub const TRAFFIC_TAG_KEY: &str = "x-traffic-tag";

/// Tags beyond this many are dropped
pub const MAX_PRIORITY_TAGS: usize = 16;

/// Tag name to weight for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityTagSet {
    weights: HashMap<String, u16>,
}

impl PriorityTagSet {
    /// Build from raw header values, each possibly holding several tags
    pub fn parse<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tags: Vec<&str> = values
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .take(MAX_PRIORITY_TAGS)
            .collect();

        let n = tags.len();
        let mut weights = HashMap::with_capacity(n);
        for (i, tag) in tags.into_iter().enumerate() {
            // A repeated tag keeps the weight of its last position
            weights.insert(tag.to_string(), 1u16 << (n - 1 - i));
        }
        Self { weights }
    }

    /// Extract the tags from a call's outgoing metadata
    ///
    /// Values that are not valid ASCII are ignored.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        Self::parse(
            metadata
                .get_all(TRAFFIC_TAG_KEY)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
    }

    pub fn weight(&self, tag: &str) -> u16 {
        self.weights.get(tag).copied().unwrap_or(0)
    }

    /// Sum of the weights of `tags`; unknown tags count for nothing
    pub fn score<S: AsRef<str>>(&self, tags: &[S]) -> u32 {
        tags.iter().map(|tag| u32::from(self.weight(tag.as_ref()))).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }
}

/// Attach priority tags to a call's outgoing metadata, highest priority first
///
/// Every tag must be visible ASCII without commas; otherwise nothing is
/// attached.
pub fn attach_traffic_tags<S: AsRef<str>>(metadata: &mut MetadataMap, tags: &[S]) -> TrafficResult<()> {
    if let Some(bad) = tags.iter().map(|tag| tag.as_ref()).find(|tag| !is_valid_tag(tag)) {
        return Err(TrafficError::config(format!("Invalid traffic tag: {:?}", bad)));
    }

    let joined = tags.iter().map(|tag| tag.as_ref()).collect::<Vec<&str>>().join(",");
    let value: MetadataValue<Ascii> = joined
        .parse()
        .map_err(|_| TrafficError::config(format!("Invalid traffic tags: {}", joined)))?;
    metadata.insert(TRAFFIC_TAG_KEY, value);
    Ok(())
}

fn is_valid_tag(tag: &str) -> bool {
    tag.bytes().all(|b| b == b' ' || (b.is_ascii_graphic() && b != b','))
}
