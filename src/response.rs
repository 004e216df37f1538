//! Turning stream bytes into events: framing JSON values out of the body, remembering which
//! tweets have already been seen, and classifying each value.
mod decoder;
mod dedup;
mod dispatch;

pub use decoder::{DecodeErr, Decoder};
pub use dedup::{Dedup, SharedDedup};
pub use dispatch::dispatch;
