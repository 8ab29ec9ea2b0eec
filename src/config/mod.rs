//! Configuration models for accounts and the reconciler.

pub mod scheduler;

pub use scheduler::{ReconcilerConfig, SchedulerConfig, CONFIG_ENV, CONFIG_PATH_ENV};
