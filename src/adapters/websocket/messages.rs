//! WebSocket message types for the problem discussion hub.
//!
//! Defines the protocol between server and connected clients:
//! - Client → Server: `{action, payload, request_id}` envelopes
//! - Server → Client: `{type, payload, request_id?}` envelopes; `request_id`
//!   is echoed on acks and errors, absent on broadcasts

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::chat::{Attachment, ChatMessage};
use crate::domain::foundation::{ChatMessageId, ProblemId, PublicUser, Timestamp};

/// A pre-serialized outbound frame, shared between all recipients of a fan-out.
pub type Frame = Arc<str>;

/// Inbound action that moves a connection into a problem's room.
pub const SET_ACTIVE_PROBLEM_CHAT: &str = "set-active-problem-chat";

/// Inbound action that takes a connection out of its current room.
pub const CLEAR_ACTIVE_PROBLEM_CHAT: &str = "clear-active-problem-chat";

// ============================================
// Client → Server Messages
// ============================================

/// Envelope around every client request.
///
/// `payload` stays generic here; its schema is only known to the handler
/// registered for `action`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub request_id: String,
}

/// Payload of `set-active-problem-chat`, also echoed in its ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusPayload {
    pub problem_id: ProblemId,
}

// ============================================
// Server → Client Messages
// ============================================

/// Closed set of outbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Request succeeded.
    Ack,
    /// Request failed.
    Error,
    /// Chat message posted by a user.
    User,
    /// Solution submitted.
    Submitted,
    /// Review decision recorded.
    Reviewed,
    /// Test run finished.
    Tested,
    /// Review pipeline completed.
    Completed,
}

/// Closed set of error codes reported back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidPayload,
    InternalServerError,
    UnknownAction,
}

impl ErrorCode {
    /// Human-readable text sent alongside the code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPayload => "invalid payload",
            ErrorCode::InternalServerError => "internal server error",
            ErrorCode::UnknownAction => "unknown action",
        }
    }
}

/// Envelope around every server message.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope<P> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<P: Serialize> OutboundEnvelope<P> {
    /// Server-initiated event, no correlation id.
    pub fn broadcast(kind: MessageType, payload: P) -> Self {
        Self {
            kind,
            payload,
            request_id: None,
        }
    }

    /// Reply to a client request.
    ///
    /// An empty `request_id` (client sent none) is left out of the frame.
    pub fn reply(kind: MessageType, payload: P, request_id: &str) -> Self {
        Self {
            kind,
            payload,
            request_id: (!request_id.is_empty()).then(|| request_id.to_string()),
        }
    }

    /// Serialize once into a frame that can be enqueued on many connections.
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

/// Payload of `error` messages.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: &'static str,
}

impl From<ErrorCode> for ErrorPayload {
    fn from(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.message(),
        }
    }
}

/// Payload of `user` messages.
#[derive(Debug, Clone, Serialize)]
pub struct UserMessagePayload<'a> {
    pub id: ChatMessageId,
    pub problem_id: &'a ProblemId,
    pub sender: &'a PublicUser,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<&'a Attachment>,
    pub sent_at: Timestamp,
}

impl<'a> From<&'a ChatMessage> for UserMessagePayload<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            id: message.id,
            problem_id: &message.problem_id,
            sender: &message.sender,
            content: &message.content,
            attachment: message.attachment.as_ref(),
            sent_at: message.sent_at,
        }
    }
}

/// Payload of `submitted` messages.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedPayload<'a> {
    pub problem_id: &'a ProblemId,
    pub submitter: &'a PublicUser,
    pub submitted_at: Timestamp,
}

/// Payload of `reviewed` messages.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedPayload<'a> {
    pub problem_id: &'a ProblemId,
    pub reviewer: &'a PublicUser,
    pub decision: &'a str,
    pub reviewed_at: Timestamp,
}

/// Payload of `tested` messages.
#[derive(Debug, Clone, Serialize)]
pub struct TestedPayload<'a> {
    pub problem_id: &'a ProblemId,
    pub tester: &'a PublicUser,
    pub status: &'a str,
    pub tested_at: Timestamp,
}

/// Payload of `completed` messages.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedPayload<'a> {
    pub problem_id: &'a ProblemId,
    pub completed_by: &'a PublicUser,
    pub completed_at: Timestamp,
}
