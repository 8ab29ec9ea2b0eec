//! Scheduler backends.

pub mod memory;

pub use memory::InMemoryScheduler;
