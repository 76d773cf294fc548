//! # Address Normalization
//!
//! Turns the raw entries of one query into a canonical `AddressList` and
//! filters out lists that did not change since the last one accepted.
//! The output is sorted and deduplicated, so reordering upstream never shows
//! up as churn downstream.

use crate::core::types::{Address, AddressList, ServiceEntry};

/// Map entries to a sorted, deduplicated address list of at most `limit`
/// addresses (0 = no limit)
pub fn normalize(entries: &[ServiceEntry], limit: usize) -> AddressList {
    let mut list: AddressList = entries
        .iter()
        .map(|entry| Address {
            addr: entry.addr(),
            tags: entry.service.tags.clone(),
        })
        .collect();
    list.truncate(limit);
    list
}

/// Remembers the last accepted list and rejects exact repeats
#[derive(Debug, Default)]
pub struct ChangeFilter {
    last: Option<AddressList>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the list if it differs from the previous one
    ///
    /// The first list is always accepted, even when empty.
    pub fn observe(&mut self, list: AddressList) -> Option<AddressList> {
        if self.last.as_ref() == Some(&list) {
            return None;
        }
        self.last = Some(list.clone());
        Some(list)
    }

    /// Forget the last list so the next one is accepted unconditionally
    pub fn reset(&mut self) {
        self.last = None;
    }
}
