//! In-memory scheduling engine driven by the priority engine.
//!
//! Matching is deliberately simple: requests are taken in priority order and
//! given to the first idle worker (by id) whose labels cover the request's
//! labels. Paid requests left over may preempt a strictly lower-priority task
//! on a compatible busy worker. Quota accrual is not modelled; balances are
//! whatever the caller sets.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::SchedulerConfig;
use crate::core::{
    prioritize_requests, AccountId, Balance, DispatchState, LabelSet, Priority, Request,
    RequestId, Running, Scheduler, SchedulerAssignment, SchedulerError, State, WorkerId,
};

/// Where a scheduled request is going.
struct Match {
    worker_id: WorkerId,
    worker_labels: LabelSet,
    task_to_abort: Option<RequestId>,
}

/// Decision ready to apply to the state.
struct Decision {
    request: Request,
    priority: Priority,
    target: Match,
}

/// Scheduler keeping its state in memory.
#[derive(Debug, Clone)]
pub struct InMemoryScheduler {
    config: SchedulerConfig,
    state: State,
    idle: BTreeMap<WorkerId, LabelSet>,
    now: Option<DateTime<Utc>>,
}

impl InMemoryScheduler {
    /// Create a scheduler with an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            config,
            state: State::new(),
            idle: BTreeMap::new(),
            now: None,
        })
    }

    /// Current state snapshot.
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Last time accepted by [`Scheduler::update_time`].
    pub const fn now(&self) -> Option<DateTime<Utc>> {
        self.now
    }

    /// Workers currently registered as idle.
    pub fn idle_workers(&self) -> impl Iterator<Item = &WorkerId> {
        self.idle.keys()
    }

    /// Queue a request.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTimestamp`] if its enqueue time cannot
    /// be converted; the request is not queued.
    pub fn add_request(&mut self, request: Request) -> Result<(), SchedulerError> {
        request.enqueue_time.to_datetime()?;
        tracing::debug!(request = %request.id, account = %request.account_id, "request queued");
        self.state.add_request(request);
        Ok(())
    }

    /// Drop a pending request, returning it if it was queued.
    pub fn cancel_request(&mut self, request_id: &RequestId) -> Option<Request> {
        self.state.queued_requests.remove(request_id)
    }

    /// Set an account's balance.
    pub fn set_balance(&mut self, account_id: impl Into<AccountId>, balance: Balance) {
        self.state.set_balance(account_id, balance);
    }

    /// Record a task already running on a worker, e.g. after a restart.
    pub fn add_running(&mut self, running: Running) {
        self.idle.remove(&running.worker_id);
        self.state.running.retain(|r| r.worker_id != running.worker_id);
        self.state.running.push(running);
    }

    fn plan(&mut self) -> Result<Vec<Decision>, SchedulerError> {
        let mut list = prioritize_requests(&self.state, &self.config)?;
        let mut matches: HashMap<RequestId, Match> = HashMap::new();

        for item in list.iter_mut() {
            let found = self
                .idle
                .iter()
                .find(|(_, labels)| item.request.labels.is_subset(labels))
                .map(|(id, labels)| (id.clone(), labels.clone()));
            let Some((worker_id, worker_labels)) = found else {
                continue;
            };
            self.idle.remove(&worker_id);
            item.mark_scheduled();
            matches.insert(
                item.request.id.clone(),
                Match {
                    worker_id,
                    worker_labels,
                    task_to_abort: None,
                },
            );
        }

        let mut preempted: HashSet<&WorkerId> = HashSet::new();
        for item in list.iter_mut() {
            if !item.is_pending() || item.priority.is_free_bucket() {
                continue;
            }
            let victim = self
                .state
                .running
                .iter()
                .filter(|r| r.priority > item.priority && !preempted.contains(&r.worker_id))
                .filter(|r| item.request.labels.is_subset(&r.worker_labels))
                .max_by_key(|r| r.priority);
            let Some(victim) = victim else {
                continue;
            };
            preempted.insert(&victim.worker_id);
            item.mark_scheduled();
            matches.insert(
                item.request.id.clone(),
                Match {
                    worker_id: victim.worker_id.clone(),
                    worker_labels: victim.worker_labels.clone(),
                    task_to_abort: Some(victim.request.id.clone()),
                },
            );
        }

        let mut decisions = Vec::with_capacity(matches.len());
        for item in list.iter_mut() {
            if item.state() != DispatchState::Scheduled {
                continue;
            }
            if let Some(target) = matches.remove(&item.request.id) {
                item.consume();
                decisions.push(Decision {
                    request: item.request.clone(),
                    priority: item.priority,
                    target,
                });
            }
        }
        Ok(decisions)
    }

    fn apply(&mut self, decision: Decision) -> SchedulerAssignment {
        let Decision {
            request,
            priority,
            target,
        } = decision;
        self.state.queued_requests.remove(&request.id);

        if target.task_to_abort.is_some() {
            if let Some(pos) = self
                .state
                .running
                .iter()
                .position(|r| r.worker_id == target.worker_id)
            {
                let victim = self.state.running.swap_remove(pos);
                tracing::info!(
                    worker = %target.worker_id,
                    aborted = %victim.request.id,
                    request = %request.id,
                    "preempting running task"
                );
                self.state.add_request(victim.request);
            }
        }

        let assignment = SchedulerAssignment {
            worker_id: target.worker_id.clone(),
            request_id: request.id.clone(),
            task_to_abort: target.task_to_abort,
            priority,
        };
        self.state.running.push(Running {
            worker_id: target.worker_id,
            worker_labels: target.worker_labels,
            request,
            priority,
        });
        assignment
    }
}

impl Scheduler for InMemoryScheduler {
    fn update_time(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        if let Some(previous) = self.now {
            if now < previous {
                return Err(SchedulerError::TimeRegression {
                    previous,
                    requested: now,
                });
            }
        }
        self.now = Some(now);
        Ok(())
    }

    fn mark_idle(&mut self, worker_id: &WorkerId, labels: &LabelSet) {
        // An idle worker is no longer running whatever it had.
        self.state.running.retain(|r| &r.worker_id != worker_id);
        self.idle.insert(worker_id.clone(), labels.clone());
    }

    fn requeue(&mut self, worker_id: &WorkerId, request_id: &RequestId) -> bool {
        let Some(pos) = self
            .state
            .running
            .iter()
            .position(|r| &r.worker_id == worker_id && &r.request.id == request_id)
        else {
            return false;
        };
        let running = self.state.running.swap_remove(pos);
        tracing::info!(
            worker = %worker_id,
            request = %request_id,
            "unacknowledged request returned to queue"
        );
        self.state.add_request(running.request);
        true
    }

    fn run_once(&mut self) -> Vec<SchedulerAssignment> {
        let decisions = match self.plan() {
            Ok(decisions) => decisions,
            Err(e) => {
                tracing::error!(error = %e, "scheduling pass failed");
                return Vec::new();
            }
        };
        let assignments: Vec<SchedulerAssignment> =
            decisions.into_iter().map(|d| self.apply(d)).collect();
        tracing::info!(
            assigned = assignments.len(),
            pending = self.state.queued_requests.len(),
            idle = self.idle.len(),
            "run_once complete"
        );
        assignments
    }
}
