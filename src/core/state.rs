//! Scheduler-wide state: identifiers, pending requests, running tasks and balances.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::account::{Balance, Priority};
use crate::util::clock::WireTimestamp;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Quota account identifier.
    AccountId
);
string_id!(
    /// Unique task request identifier.
    RequestId
);
string_id!(
    /// Worker (bot) identifier.
    WorkerId
);

/// Provisionable labels a worker offers or a request requires.
pub type LabelSet = BTreeSet<String>;

/// A pending unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier.
    pub id: RequestId,
    /// Owning account.
    pub account_id: AccountId,
    /// Time the request entered the queue.
    pub enqueue_time: WireTimestamp,
    /// Labels a worker must offer to run this request.
    #[serde(default)]
    pub labels: LabelSet,
}

impl Request {
    /// Request with no label requirements.
    pub fn new(
        id: impl Into<RequestId>,
        account_id: impl Into<AccountId>,
        enqueue_time: WireTimestamp,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            enqueue_time,
            labels: LabelSet::new(),
        }
    }

    /// Attach label requirements.
    #[must_use]
    pub fn with_labels<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// A task currently executing on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Running {
    /// Worker executing the task.
    pub worker_id: WorkerId,
    /// Labels the worker offered when it took the task.
    #[serde(default)]
    pub worker_labels: LabelSet,
    /// Request the task originated from.
    pub request: Request,
    /// Band the task was dispatched at.
    pub priority: Priority,
}

/// Snapshot consumed by the priority engine. Mutated only by the scheduling engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Banked quota per account.
    #[serde(default)]
    pub balances: BTreeMap<AccountId, Balance>,
    /// Pending requests keyed by id.
    #[serde(default)]
    pub queued_requests: BTreeMap<RequestId, Request>,
    /// Tasks currently running.
    #[serde(default)]
    pub running: Vec<Running>,
}

impl State {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pending request.
    pub fn add_request(&mut self, request: Request) {
        self.queued_requests.insert(request.id.clone(), request);
    }

    /// Set an account's balance.
    pub fn set_balance(&mut self, account_id: impl Into<AccountId>, balance: Balance) {
        self.balances.insert(account_id.into(), balance);
    }

    /// Running tasks owned by an account.
    pub fn running_for(&self, account_id: &AccountId) -> usize {
        self.running
            .iter()
            .filter(|r| &r.request.account_id == account_id)
            .count()
    }

    /// Task running on a worker, if any.
    pub fn running_on(&self, worker_id: &WorkerId) -> Option<&Running> {
        self.running.iter().find(|r| &r.worker_id == worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_replaces_by_id() {
        let mut state = State::new();
        state.add_request(Request::new("r1", "a1", WireTimestamp::new(1, 0)));
        state.add_request(Request::new("r1", "a2", WireTimestamp::new(2, 0)));
        assert_eq!(state.queued_requests.len(), 1);
        assert_eq!(state.queued_requests[&RequestId::new("r1")].account_id.as_str(), "a2");
    }

    #[test]
    fn test_running_for_counts_by_account() {
        let mut state = State::new();
        for (worker, account) in [("w1", "a1"), ("w2", "a1"), ("w3", "a2")] {
            state.running.push(Running {
                worker_id: WorkerId::new(worker),
                worker_labels: LabelSet::new(),
                request: Request::new(format!("r-{worker}"), account, WireTimestamp::new(0, 0)),
                priority: Priority::new(0),
            });
        }
        assert_eq!(state.running_for(&AccountId::new("a1")), 2);
        assert_eq!(state.running_for(&AccountId::new("a3")), 0);
        assert!(state.running_on(&WorkerId::new("w3")).is_some());
    }

    #[test]
    fn test_state_deserializes_with_defaults() {
        let state: State = serde_json::from_str("{}").unwrap();
        assert!(state.balances.is_empty());
        assert!(state.running.is_empty());
    }
}
