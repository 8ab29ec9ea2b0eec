//! # Prometheus Quota Scheduler
//!
//! Quota-based task prioritization and worker reconciliation for a shared worker fleet.
//!
//! This library decides, for a pool of pending task requests and a pool of quota accounts
//! with banked balances, which request each idle worker should run next. It keeps a
//! centrally computed decision and an intermittently polling worker fleet consistent
//! despite network delay, retries, and missed acknowledgements.
//!
//! ## Core Problem Solved
//!
//! A scheduler that hands work to polling workers has to survive an unreliable link:
//!
//! - **Lost replies**: A worker may poll, never receive its assignment, and poll again
//! - **Retries**: The RPC layer delivers acknowledgements at least once
//! - **Fairness**: Accounts pay for priority with banked quota, and no single account
//!   may fan out across the whole fleet
//! - **Clock skew**: Poll times can arrive out of order relative to queued decisions
//!
//! ## Key Features
//!
//! - **Priority Engine**: Ranks pending requests by best paid band, FIFO within a band
//! - **Fan-out Demotion**: Forces requests beyond an account's concurrency ceiling into
//!   the free bucket
//! - **Reconciler**: Queues one decision per worker until it is reaped and acknowledged,
//!   so decisions are neither lost nor duplicated
//! - **Ack Timeouts**: Optionally expires decisions whose acknowledgement never arrived
//! - **Audit Trail**: Records every assignment, re-offer, acknowledgement and expiry
//!
//! ## Priority Engine
//!
//! ```rust,ignore
//! use prometheus_quota_scheduler::config::SchedulerConfig;
//! use prometheus_quota_scheduler::core::{prioritize_requests, Priority, State};
//!
//! let list = prioritize_requests(&state, &SchedulerConfig::default())?;
//! for item in list.for_priority(Priority::new(0)) {
//!     println!("{} from {}", item.request.id, item.request.account_id);
//! }
//! ```
//!
//! ## Reconciler
//!
//! ```rust,ignore
//! use prometheus_quota_scheduler::core::{Reconciler, ReapingWorker};
//! use prometheus_quota_scheduler::infra::InMemoryScheduler;
//!
//! let reconciler = Reconciler::new(config.reconciler.clone())?;
//! let mut scheduler = InMemoryScheduler::new(config.clone())?;
//!
//! // Workers poll; decisions are queued until acknowledged.
//! let assignments = reconciler.reap(&mut scheduler, &workers, now)?;
//! reconciler.update_tasks(&updates);
//! ```
//!
//! ## Logging
//!
//! Every component logs through `tracing`. Embedders with no subscriber of their
//! own can call [`util::init_tracing`], which honors `RUST_LOG` and otherwise
//! logs this crate at `info`.
//!
//! For complete examples, see:
//! - `tests/reconciler_test.rs` - Reap, acknowledgement and cancellation flows
//! - `tests/priority_engine_test.rs` - Ordering and fan-out scenarios

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: accounts, priority engine, reconciler.
pub mod core;
/// Configuration models for accounts and the reconciler.
pub mod config;
/// Infrastructure adapters, including the reference in-memory scheduler.
pub mod infra;
/// Runtime adapters and the service-facing API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
