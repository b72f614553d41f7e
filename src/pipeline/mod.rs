//! # Update Pipeline
//!
//! Once per game tick the producer syncs the player registry, refreshes a
//! throttled share of relay sets, derives link bits, moves positions into
//! the listener frame and hands one encoded frame to the transport. On the
//! voice side the consumer decodes each frame and applies it to the voice
//! host.
//!
//! ## Components
//! - **Host**: capability traits for the game and voice runtimes
//! - **Throttle**: round-robin budget for relay recomputation
//! - **Producer**: game-side tick
//! - **Consumer**: voice-side frame application and pairing
//! - **Memory**: in-memory hosts used by tests and benchmarks

pub mod consumer;
pub mod host;
pub mod memory;
pub mod producer;
pub mod throttle;

pub use consumer::UpdateConsumer;
pub use host::{ClientId, CommandTarget, GameWorld, PlayerInfo, VoiceHost};
pub use producer::{FrameSink, UpdateProducer};
pub use throttle::RelayScheduler;
