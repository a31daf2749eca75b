//! Session store implementations for Chainloom.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;
