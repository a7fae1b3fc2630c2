//! Device transport adapters.
//!
//! The control engine is transport-agnostic: it talks to a [`TransportAdapter`]
//! and nothing else. Two thin adapters are provided:
//! - [`BridgeTransport`] — Unix-domain socket to the local wireless-bridge
//!   daemon that owns the short-range link to the device.
//! - [`RelayTransport`] — TCP connection to a remote relay that forwards
//!   command frames to the device and notifications back.
//!
//! Both adapters carry opaque device frames over a small magic+length stream
//! framing; neither interprets the payloads.

pub mod error;
pub mod framing;
pub mod stream;
pub mod traits;

#[cfg(unix)]
mod bridge;
mod relay;

#[cfg(unix)]
pub use bridge::BridgeTransport;
pub use error::{Result, TransportError};
pub use framing::{decode_frame, encode_frame, HEADER_SIZE, MAGIC, MAX_FRAME_PAYLOAD};
pub use relay::RelayTransport;
pub use traits::TransportAdapter;
