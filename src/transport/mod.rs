//! # Transport Layer
//!
//! Moves encoded frames between the game and voice processes over one
//! local byte stream per direction.
//!
//! ## Components
//! - **Pipe**: Windows named pipes, Unix domain sockets, in-memory duplex
//! - **Session**: connect/read/write with cancellation and the `LinkState` machine
//! - **Backoff**: bounded exponential reconnect delay with jitter
//! - **Driver**: writer and reader tasks that reconnect after failures
//!
//! ## State Machine
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> ...
//!                      \______________\________> Shutdown (canceled)
//! ```

pub mod backoff;
pub mod driver;
pub mod pipe;
pub mod session;

pub use backoff::Backoff;
pub use driver::{frame_channel, run_reader, run_writer, FrameHandler, FrameSender};
pub use pipe::{memory_pair, LocalPipe, PipeEndpoint, PipeStream, Role};
pub use session::{LinkState, LinkStatus, TransportSession};
