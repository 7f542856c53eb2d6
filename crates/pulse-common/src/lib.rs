//! Shared wire model for Pulseboard
//!
//! Everything both halves of the dashboard agree on lives here: the stream
//! event types the server emits, the tolerant decoder the viewer applies to
//! inbound payloads, and the numeric normalization that funnels every wire
//! encoding of a counter into one integer domain.

pub mod events;
pub mod numeric;

pub use events::{decode_event, StreamEvent, WireEvent};
pub use numeric::normalize_count;
