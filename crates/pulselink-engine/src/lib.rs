//! Transport-agnostic streaming control engine.
//!
//! This is the core value-add layer of pulselink. One [`DeviceController`]
//! per active transport session drives the device's 100ms command cadence:
//! - [`store`] — per-channel frame sequences with decoupled transmission
//!   lookahead and authoritative playback cursors
//! - [`negotiator`] — at-most-one in-flight strength change, correlated by a
//!   rotating 4-bit sequence number
//! - [`scheduler`] — the drift-compensated send loop
//! - [`controller`] — the facade gluing state, scheduler, and transport
//!
//! The engine never owns a socket; it is parameterized over
//! [`pulselink_transport::TransportAdapter`].

pub mod controller;
pub mod device;
pub mod error;
pub mod events;
pub mod negotiator;
pub mod scheduler;
pub mod store;

pub use controller::DeviceController;
pub use device::{DeviceState, LimitParams};
pub use error::{EngineError, Result};
pub use events::{EngineObserver, FramesEvent, NoopObserver};
pub use negotiator::{OutgoingSelection, PendingSeq, StrengthNegotiator};
pub use scheduler::SessionConfig;
pub use store::{ChannelFrame, ChannelStateStore, PlaybackMode};
