//! # State Propagator
//!
//! Single consumer of the poller's channel. Every address list received is
//! handed to the connection-management runtime through `AddressSink`, in
//! order and one at a time. A rejected update is logged and counted and the
//! propagator keeps going. A delivery still pending at cancellation is
//! abandoned.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::error::{TrafficError, TrafficResult};
use crate::core::types::AddressList;
use crate::observability::metrics::{ADDRESS_UPDATES, ADDRESS_UPDATE_ERRORS};

/// Receiver of resolved address sets, implemented by the connection runtime
#[async_trait]
pub trait AddressSink: Send + Sync {
    /// Replace the runtime's address set with `addresses`
    async fn update_addresses(&self, addresses: AddressList) -> TrafficResult<()>;
}

/// Publishes the latest list to `watch` receivers
#[async_trait]
impl AddressSink for watch::Sender<AddressList> {
    async fn update_addresses(&self, addresses: AddressList) -> TrafficResult<()> {
        self.send(addresses)
            .map_err(|_| TrafficError::consumer_update("all address receivers dropped"))
    }
}

/// Forward every list from `input` to `sink` until cancelled or the channel closes
pub async fn propagate(
    cancel: CancellationToken,
    sink: Arc<dyn AddressSink>,
    mut input: mpsc::Receiver<AddressList>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = input.recv() => next,
        };
        let Some(addresses) = next else {
            break;
        };

        let count = addresses.len();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = sink.update_addresses(addresses) => result,
        };
        match result {
            Ok(()) => {
                counter!(ADDRESS_UPDATES).increment(1);
                debug!(addresses = count, "Delivered address update");
            }
            Err(err) => {
                counter!(ADDRESS_UPDATE_ERRORS).increment(1);
                error!(error = %err, addresses = count, "Couldn't update client connection");
            }
        }
    }

    info!("Address propagation stopped");
}
