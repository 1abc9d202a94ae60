//! # Realtime Session Relay
//!
//! One relay session pairs a client WebSocket with an outbound connection to
//! the upstream realtime AI endpoint and forwards frames both ways while
//! enforcing the invariants neither side can enforce alone: configuration
//! never reaches the upstream before its readiness signal, audio plays back
//! in arrival order, transcript deltas merge into one message per turn, and
//! closing one side always closes the other.
//!
//! ## Module layout (leaves first):
//! - [`message`]: frame classification and synthesis
//! - [`handshake`]: readiness latch + ordered pending buffer
//! - [`queue`]: FIFO audio playback queue
//! - [`transcript`]: per-turn transcript accumulation
//! - [`router`]: upstream frame routing over queue/transcript
//! - [`core`]: the session state machine tying the above together
//! - [`upstream`]: outbound connection task
//! - [`session`]: the client-facing WebSocket actor

pub mod core;
pub mod handshake;
pub mod message;
pub mod queue;
pub mod router;
pub mod session;
pub mod transcript;
pub mod upstream;
