//! The seam between transports and the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::Envelope;

/// Consumer of inbound envelopes.
///
/// Transports hand every envelope they receive to an `UpdateSink` and await
/// it. `process` never fails: malformed content is logged and skipped by the
/// implementation, so one bad envelope cannot stop a batch.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn process(&self, envelope: Envelope);
}

#[async_trait]
impl<T: UpdateSink + ?Sized> UpdateSink for Arc<T> {
    async fn process(&self, envelope: Envelope) {
        (**self).process(envelope).await
    }
}

/// Shared, type-erased sink.
pub type BoxedSink = Arc<dyn UpdateSink>;
