//! Minimal STOMP wire protocol support for talking to ActiveMQ.
//!
//! Only the client-side subset the statistics exchange needs is implemented:
//! CONNECT/CONNECTED, SUBSCRIBE, SEND, MESSAGE, ERROR, DISCONNECT, plus EOL
//! heartbeats in both directions.

pub mod codec;
pub mod errors;
pub mod frame;

pub use codec::StompCodec;
pub use errors::FrameError;
pub use frame::{Frame, OutboundFrame, command};
