//! Pulseboard viewer library
//!
//! The client half of the dashboard: a stream transport that keeps a
//! long-lived connection to the server, a reconciler that mirrors every
//! product counter, and a cue scheduler that plays exactly one sound per
//! genuinely new increment.

pub mod audio;
pub mod cues;
pub mod reconciler;
pub mod transport;

pub use cues::{CuePlayer, CueScheduler};
pub use reconciler::{Applied, ConnectionState, IncrementNotice, Reconciler};
pub use transport::{FrameParser, StreamTransport, TransportError};
