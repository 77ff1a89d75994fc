//! Transport-level errors. All of them end the connection.

use std::io;

use axum::extract::ws::close_code;
use thiserror::Error;

/// Errors that terminate a connection's read or write loop.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Malformed envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Peer closed with unexpected status {0}")]
    AbnormalClose(u16),

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Ping timed out")]
    PingTimeout,

    #[error("Peer silent for {0:?}")]
    PongTimeout(std::time::Duration),
}

impl ConnectionError {
    /// True for the peer simply going away (reset, broken pipe, EOF).
    ///
    /// These end the connection like any other error but are not worth an
    /// error-level log line.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::Transport(err) => io_kind(err).is_some_and(|kind| {
                matches!(
                    kind,
                    io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::UnexpectedEof
                )
            }),
            _ => false,
        }
    }

    /// Close status to send to the peer when this error ends the connection.
    pub fn close_code(&self) -> u16 {
        match self {
            ConnectionError::FrameTooLarge { .. } => close_code::SIZE,
            ConnectionError::Decode(_) => close_code::INVALID,
            _ => close_code::ERROR,
        }
    }
}

fn io_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_is_a_disconnect() {
        let err = ConnectionError::Transport(axum::Error::new(io::Error::from(
            io::ErrorKind::ConnectionReset,
        )));
        assert!(err.is_disconnect());
        assert_eq!(err.close_code(), close_code::ERROR);
    }

    #[test]
    fn protocol_violations_are_not_disconnects() {
        let err = ConnectionError::FrameTooLarge {
            size: 10,
            limit: 5,
        };
        assert!(!err.is_disconnect());
        assert_eq!(err.close_code(), close_code::SIZE);

        let decode = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(
            ConnectionError::from(decode).close_code(),
            close_code::INVALID
        );
    }
}
