//! # Core Wire Components
//!
//! Frame layout, stream codec and the math shared by both sides.
//!
//! ## Components
//! - **Frame**: fixed header plus existing/removed/added sections
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Math**: vector aliases and the listener reference-frame transform
//!
//! ## Wire Format
//! ```text
//! [Header(60)] [Existing(24*n)] [Removed(8*n)] [Added(variable)]
//! ```
//!
//! ## Safety
//! - Maximum frame size: 1 MiB
//! - Magic bits prevent accidental misinterpretation
//! - Every length is cross-checked before allocation

pub mod codec;
pub mod frame;
pub mod math;
