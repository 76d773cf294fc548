//! Build-then-publish slot for the current picker.
//!
//! Calls grab the current `Arc<PriorityPicker>` and keep using it even if a
//! rebuild is published meanwhile; a picker is never modified after it has
//! been published.

use parking_lot::RwLock;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

use crate::core::error::TrafficResult;
use crate::load_balancing::picker::PriorityPicker;

#[derive(Debug)]
pub struct SharedPicker<C> {
    current: RwLock<Arc<PriorityPicker<C>>>,
}

impl<C: Clone> SharedPicker<C> {
    pub fn new(picker: PriorityPicker<C>) -> Self {
        Self {
            current: RwLock::new(Arc::new(picker)),
        }
    }

    /// A slot holding a picker with no connections
    pub fn empty() -> Self {
        Self::new(PriorityPicker::new(Vec::new(), 0))
    }

    /// Snapshot used by one call
    pub fn current(&self) -> Arc<PriorityPicker<C>> {
        self.current.read().clone()
    }

    /// Swap in a fully built picker, returning the one it replaces
    pub fn publish(&self, picker: PriorityPicker<C>) -> Arc<PriorityPicker<C>> {
        std::mem::replace(&mut *self.current.write(), Arc::new(picker))
    }

    /// Pick from the current snapshot
    pub fn pick(&self, metadata: &MetadataMap) -> TrafficResult<C> {
        self.current().pick(metadata)
    }
}
