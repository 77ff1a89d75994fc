//! `MessageBroadcaster` implementation backed by the hub.
//!
//! Each event is encoded exactly once; the same frame is then shared by
//! every member of the room. If encoding fails nothing is sent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::chat::ChatMessage;
use crate::domain::foundation::{ProblemId, PublicUser, Timestamp};
use crate::ports::{BroadcastError, MessageBroadcaster};

use super::hub::Hub;
use super::messages::{
    CompletedPayload, MessageType, OutboundEnvelope, ReviewedPayload, SubmittedPayload,
    TestedPayload, UserMessagePayload,
};

/// Broadcasts domain events into hub rooms keyed by problem.
#[derive(Clone)]
pub struct HubBroadcaster {
    hub: Arc<Hub>,
}

impl HubBroadcaster {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    async fn deliver<P: Serialize + Send>(
        &self,
        problem_id: &ProblemId,
        kind: MessageType,
        payload: P,
    ) -> Result<(), BroadcastError> {
        let frame = OutboundEnvelope::broadcast(kind, payload).encode()?;
        let delivered = self.hub.broadcast_to_room(problem_id, frame).await;
        tracing::debug!(%problem_id, ?kind, delivered, "event broadcast");
        Ok(())
    }
}

#[async_trait]
impl MessageBroadcaster for HubBroadcaster {
    async fn broadcast_user_message(&self, message: &ChatMessage) -> Result<(), BroadcastError> {
        self.deliver(
            &message.problem_id,
            MessageType::User,
            UserMessagePayload::from(message),
        )
        .await
    }

    async fn broadcast_submitted(
        &self,
        problem_id: &ProblemId,
        submitter: &PublicUser,
        submitted_at: Timestamp,
    ) -> Result<(), BroadcastError> {
        let payload = SubmittedPayload {
            problem_id,
            submitter,
            submitted_at,
        };
        self.deliver(problem_id, MessageType::Submitted, payload).await
    }

    async fn broadcast_reviewed(
        &self,
        problem_id: &ProblemId,
        reviewer: &PublicUser,
        decision: &str,
        reviewed_at: Timestamp,
    ) -> Result<(), BroadcastError> {
        let payload = ReviewedPayload {
            problem_id,
            reviewer,
            decision,
            reviewed_at,
        };
        self.deliver(problem_id, MessageType::Reviewed, payload).await
    }

    async fn broadcast_tested(
        &self,
        problem_id: &ProblemId,
        tester: &PublicUser,
        status: &str,
        tested_at: Timestamp,
    ) -> Result<(), BroadcastError> {
        let payload = TestedPayload {
            problem_id,
            tester,
            status,
            tested_at,
        };
        self.deliver(problem_id, MessageType::Tested, payload).await
    }

    async fn broadcast_completed(
        &self,
        problem_id: &ProblemId,
        completed_by: &PublicUser,
        completed_at: Timestamp,
    ) -> Result<(), BroadcastError> {
        let payload = CompletedPayload {
            problem_id,
            completed_by,
            completed_at,
        };
        self.deliver(problem_id, MessageType::Completed, payload).await
    }
}
