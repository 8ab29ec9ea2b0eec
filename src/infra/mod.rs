//! Infrastructure adapters, including the reference in-memory scheduler.

pub mod scheduler;

pub use scheduler::InMemoryScheduler;
