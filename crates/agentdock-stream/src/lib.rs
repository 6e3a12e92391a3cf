//! agentdock-stream: turns a raw newline-delimited record batch, or one
//! live-delivered record, into ordered message state with streamed
//! tool-call fragments accumulated per content block.
//!
//! `SessionStream` is a pure state machine; `live` wraps it in the
//! subscription pump task.

pub mod accumulate;
pub mod live;
pub mod metrics;
pub mod parse;
pub mod session;

pub use agentdock_core::record;
pub use agentdock_core::types;
