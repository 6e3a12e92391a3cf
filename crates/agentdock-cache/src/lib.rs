//! agentdock-cache: eventually-consistent view of what output each run
//! has produced so far, independent of whether its tab is mounted.
//! The background poller reconciles cached state against the external
//! "what is actually still running" query to self-heal from missed
//! termination events.

pub mod cache;
pub mod poller;

pub use agentdock_core::types;
