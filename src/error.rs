//! # Error Types
//!
//! Error handling for the bridge.
//!
//! This module defines every error variant that can surface while encoding,
//! decoding, transporting or applying update frames.
//!
//! ## Error Categories
//! - **Frame Errors**: `CorruptFrame` for any decode-time validation failure,
//!   `OversizedFrame` when an outgoing message would not fit the wire limits
//! - **Channel Errors**: `ChannelClosed`, `Io`, `NotConnected`, `QueueFull`
//! - **Lifecycle Errors**: `Canceled`, `Timeout`
//! - **Setup Errors**: `ConfigError`, `Pairing`, `LockPoisoned`
//!
//! `CorruptFrame` and `Io` abandon the current connection and reconnect.
//! `ChannelClosed` reconnects without being reported as a failure.
//! `Canceled` stops the session for good.
//!
//! ## Example Usage
//! ```rust
//! use spatial_voice_bridge::core::frame::UpdateMessage;
//! use spatial_voice_bridge::error::BridgeError;
//! use tracing::warn;
//!
//! fn handle(bytes: &[u8]) {
//!     match UpdateMessage::decode(bytes) {
//!         Ok(msg) => println!("{} participants", msg.existing.len()),
//!         Err(e @ BridgeError::CorruptFrame(_)) => warn!(error = %e, "Dropping connection"),
//!         Err(e) => warn!(error = %e, "Unexpected decode failure"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame validation errors
    pub const ERR_BAD_MAGIC: &str = "version magic does not match";
    pub const ERR_TRUNCATED_HEADER: &str = "buffer shorter than the fixed header";
    pub const ERR_LENGTH_MISMATCH: &str = "declared frame length does not match section sizes";
    pub const ERR_BUFFER_MISMATCH: &str = "buffer length does not match declared frame length";
    pub const ERR_OVERSIZED_FRAME: &str = "declared frame length exceeds maximum frame size";
    pub const ERR_NEGATIVE_COUNT: &str = "negative section count";
    pub const ERR_ADDED_WITHOUT_RECORDS: &str = "added section has bytes but no records";
    pub const ERR_ADDED_SECTION_OVERRUN: &str = "added records overrun the added section";
    pub const ERR_ADDED_SECTION_UNDERRUN: &str = "added records did not consume the added section";
    pub const ERR_BAD_NAME_LENGTH: &str = "invalid participant name length";
    pub const ERR_TRUNCATED_STREAM: &str = "stream ended in the middle of a frame";
}

/// BridgeError is the error type for every bridge operation
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Operation canceled")]
    Canceled,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Write queue full")]
    QueueFull,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pairing error: {0}")]
    Pairing(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,
}

impl BridgeError {
    /// Shorthand for a frame validation failure with a static reason.
    pub fn corrupt(reason: &str) -> Self {
        BridgeError::CorruptFrame(reason.to_string())
    }

    /// Whether the session should tear down and attempt a fresh connection.
    pub fn is_reconnectable(&self) -> bool {
        !matches!(self, BridgeError::Canceled | BridgeError::ConfigError(_))
    }

    /// Clean closure is expected during peer shutdown and is not a failure.
    pub fn is_expected_closure(&self) -> bool {
        match self {
            BridgeError::ChannelClosed => true,
            BridgeError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for BridgeError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        BridgeError::LockPoisoned
    }
}

/// Type alias for Results using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_policy() {
        assert!(BridgeError::corrupt("x").is_reconnectable());
        assert!(BridgeError::ChannelClosed.is_reconnectable());
        assert!(BridgeError::Io(io::Error::other("boom")).is_reconnectable());
        assert!(!BridgeError::Canceled.is_reconnectable());
        assert!(!BridgeError::ConfigError("bad".into()).is_reconnectable());
    }

    #[test]
    fn test_expected_closure() {
        assert!(BridgeError::ChannelClosed.is_expected_closure());
        assert!(BridgeError::Io(io::ErrorKind::BrokenPipe.into()).is_expected_closure());
        assert!(!BridgeError::corrupt("x").is_expected_closure());
    }
}
