//! Media-plane boundary.
//!
//! The orchestrator only tells this collaborator that a participant joined or
//! left; actual transport/producer/consumer negotiation lives elsewhere.
//! Opaque signaling payloads are relayed by the session without touching this
//! trait.

use crate::types::ConnectionId;
use async_trait::async_trait;

#[async_trait]
pub trait MediaPlane: Send + Sync {
    async fn participant_joined(&self, id: &ConnectionId, name: &str);
    async fn participant_left(&self, id: &ConnectionId);
}

/// Default implementation for deployments without an SFU (and for tests).
pub struct NullMediaPlane;

#[async_trait]
impl MediaPlane for NullMediaPlane {
    async fn participant_joined(&self, id: &ConnectionId, name: &str) {
        tracing::debug!("media plane: participant {} ({}) joined", name, id);
    }

    async fn participant_left(&self, id: &ConnectionId) {
        tracing::debug!("media plane: participant {} left", id);
    }
}
