//! MessageBroadcaster port - live notifications into problem rooms.
//!
//! The submission, review and test workflows call one method per event
//! kind. They never see rooms, connections or wire formats.
//!
//! Delivery is best-effort: a member whose send buffer is full misses the
//! event and nobody is told. The only failure a caller can observe is the
//! event not serializing, in which case nothing was sent to anyone.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::chat::ChatMessage;
use crate::domain::foundation::{ProblemId, PublicUser, Timestamp};

/// Errors surfaced to broadcasting callers.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fans out domain events to everyone focused on a problem.
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    /// A chat message was posted.
    async fn broadcast_user_message(&self, message: &ChatMessage) -> Result<(), BroadcastError>;

    /// A solution was submitted for review.
    async fn broadcast_submitted(
        &self,
        problem_id: &ProblemId,
        submitter: &PublicUser,
        submitted_at: Timestamp,
    ) -> Result<(), BroadcastError>;

    /// A reviewer recorded a decision (e.g. "approved", "rejected").
    async fn broadcast_reviewed(
        &self,
        problem_id: &ProblemId,
        reviewer: &PublicUser,
        decision: &str,
        reviewed_at: Timestamp,
    ) -> Result<(), BroadcastError>;

    /// A tester reported a status (e.g. "passed", "failed").
    async fn broadcast_tested(
        &self,
        problem_id: &ProblemId,
        tester: &PublicUser,
        status: &str,
        tested_at: Timestamp,
    ) -> Result<(), BroadcastError>;

    /// The problem finished its review pipeline.
    async fn broadcast_completed(
        &self,
        problem_id: &ProblemId,
        completed_by: &PublicUser,
        completed_at: Timestamp,
    ) -> Result<(), BroadcastError>;
}
