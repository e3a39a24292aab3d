//! Recovery protocol against the external persistence collaborator.
//!
//! Ordering guarantees no update is missed and none is lost to a race
//! between subscription and snapshot:
//! 1. subscribe to the live update stream
//! 2. request the point-in-time latest state
//! 3. updates arriving in between sit buffered in the subscription
//!    channel
//! 4. apply the snapshot, then replay the buffered updates
//! 5. signal completion

use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::info;

use omx_core::ExecutionReport;

use crate::error::GatewayResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// External source-of-truth supplying the latest order state.
pub trait PersistenceClient: Send + Sync {
    /// Subscribe to the live update stream. Must be called before
    /// `latest_state`; the returned channel buffers updates until they
    /// are replayed.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionReport>;

    /// Point-in-time latest state of every outstanding order, as
    /// replayable execution reports.
    fn latest_state(&self) -> BoxFuture<'_, GatewayResult<Vec<ExecutionReport>>>;
}

/// Run the subscribe → snapshot → replay protocol, feeding every
/// report into `apply` in order. Returns the number of reports fed.
pub async fn run_recovery_protocol(
    client: &dyn PersistenceClient,
    mut apply: impl FnMut(ExecutionReport),
) -> GatewayResult<usize> {
    let mut live = client.subscribe();
    let snapshot = client.latest_state().await?;

    let snapshot_len = snapshot.len();
    for report in snapshot {
        apply(report);
    }

    // Whatever arrived between subscribe and the snapshot response sat
    // buffered in the channel; replay it now.
    let mut buffered = 0usize;
    while let Ok(report) = live.try_recv() {
        apply(report);
        buffered += 1;
    }

    info!(snapshot_len, buffered, "Recovery replay complete");
    Ok(snapshot_len + buffered)
}
