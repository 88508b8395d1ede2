use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Broadcast, BroadcastResult, Broadcaster, BroadcasterError};

/// Discards every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

#[async_trait]
impl Broadcaster for NoopBroadcaster {
    fn hook(&self, _broadcast: Broadcast) {}

    async fn broadcast(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<BroadcastResult>, BroadcasterError> {
        Ok(Vec::new())
    }
}
