//! # Spatial Voice Bridge
//!
//! Carries per-tick participant positions and radio connectivity from a
//! game process to a voice-chat client so voice playback can be placed in
//! 3D and gated by in-game antennas.
//!
//! ## Layout
//! - [`core`]: wire frames, stream codec, listener-frame math
//! - [`graph`]: antenna relay reachability with ownership filtering
//! - [`registry`]: participants keyed by stable account id
//! - [`pairing`]: voice client <-> account id side channel
//! - [`pipeline`]: per-tick producer and frame consumer
//! - [`transport`]: local byte stream, session state, reconnect tasks
//! - [`bridge`]: game and voice context objects for the host entry points
//!
//! ## Data Flow
//! ```text
//! GameWorld -> registry sync -> relay refresh -> link bits -> listener frame
//!           -> UpdateMessage::encode -> writer task -> pipe
//! pipe -> reader task -> FrameCodec -> UpdateConsumer -> VoiceHost
//! ```

pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod pairing;
pub mod pipeline;
pub mod registry;
pub mod transport;
pub mod utils;

pub use crate::bridge::{GameBridge, VoiceBridge};
pub use crate::config::BridgeConfig;
pub use crate::core::frame::{AccountId, UpdateMessage};
pub use crate::error::{BridgeError, Result};
pub use crate::graph::ConnectivityGraph;
pub use crate::registry::ParticipantRegistry;
