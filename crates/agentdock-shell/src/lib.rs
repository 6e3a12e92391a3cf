//! agentdock-shell: composition root. Wires the tab store, output cache,
//! background poller and per-run live listeners over an injected backend.

pub mod shell;

pub use agentdock_core::types;
