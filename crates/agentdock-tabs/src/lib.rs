//! agentdock-tabs: single source of truth for which logical views exist,
//! their order, and which one has focus. Owns the navigation-history
//! stack and the custom-title side-store binding.

pub mod focus;
pub mod store;
pub mod titles;

pub use agentdock_core::types;
