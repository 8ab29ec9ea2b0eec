//! Priority engine: ranks pending requests into a dispatch order.
//!
//! Ranking happens in three steps:
//!
//! 1. Every request starts at the best band its account can pay for.
//! 2. A stable sort by `(priority, enqueue time)` establishes FIFO order within bands.
//! 3. A fan-out pass walks that order and demotes requests beyond their account's
//!    concurrency ceiling to the free bucket, then the list is re-sorted with the
//!    same comparator.
//!
//! Demotion depends on position in the FIFO order, which is why the first sort
//! has to happen before it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::SchedulerConfig;
use crate::core::account::{best_priority_for, Priority};
use crate::core::error::SchedulerError;
use crate::core::state::{AccountId, Request, State};

/// Lifecycle of a ranked request while a caller consumes the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    /// Ranked, not yet acted on.
    Pending,
    /// Matched to a worker during the current pass.
    Scheduled,
    /// Handed off; later consumers must skip it.
    Consumed,
}

/// A pending request with its computed band.
#[derive(Debug, Clone)]
pub struct PrioritizedRequest<'a> {
    /// Computed band.
    pub priority: Priority,
    /// The ranked request.
    pub request: &'a Request,
    /// Parsed enqueue time used for FIFO ordering.
    pub enqueue_time: DateTime<Utc>,
    state: DispatchState,
}

impl<'a> PrioritizedRequest<'a> {
    fn new(request: &'a Request, priority: Priority) -> Result<Self, SchedulerError> {
        Ok(Self {
            priority,
            request,
            enqueue_time: request.enqueue_time.to_datetime()?,
            state: DispatchState::Pending,
        })
    }

    /// Current dispatch state.
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    /// `Pending -> Scheduled`. Returns false if the request was not pending.
    pub fn mark_scheduled(&mut self) -> bool {
        if self.state == DispatchState::Pending {
            self.state = DispatchState::Scheduled;
            true
        } else {
            false
        }
    }

    /// `Scheduled -> Consumed`. Returns false if the request was not scheduled.
    pub fn consume(&mut self) -> bool {
        if self.state == DispatchState::Scheduled {
            self.state = DispatchState::Consumed;
            true
        } else {
            false
        }
    }

    /// True while no consumer has acted on this request.
    pub fn is_pending(&self) -> bool {
        self.state == DispatchState::Pending
    }
}

/// Requests sorted most-important first.
#[derive(Debug, Clone, Default)]
pub struct PriorityList<'a> {
    items: Vec<PrioritizedRequest<'a>>,
}

impl<'a> PriorityList<'a> {
    /// Sorted items.
    pub fn as_slice(&self) -> &[PrioritizedRequest<'a>] {
        &self.items
    }

    /// Iterate in dispatch order.
    pub fn iter(&self) -> std::slice::Iter<'_, PrioritizedRequest<'a>> {
        self.items.iter()
    }

    /// Iterate mutably, for advancing dispatch state. Priorities must not be changed.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PrioritizedRequest<'a>> {
        self.items.iter_mut()
    }

    /// Number of ranked requests.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the list.
    pub fn into_vec(self) -> Vec<PrioritizedRequest<'a>> {
        self.items
    }

    /// Distinct bands present, ascending.
    pub fn priorities(&self) -> Vec<Priority> {
        let mut bands: Vec<Priority> = self.items.iter().map(|i| i.priority).collect();
        bands.dedup();
        bands
    }

    /// Contiguous run of requests at exactly `priority`. Empty if the band is absent.
    pub fn for_priority(&self, priority: Priority) -> &[PrioritizedRequest<'a>] {
        let len = self.items.len();
        let start = self
            .items
            .iter()
            .position(|i| i.priority >= priority)
            .unwrap_or(len);
        let end = self.items[start..]
            .iter()
            .position(|i| i.priority > priority)
            .map_or(len, |offset| start + offset);
        &self.items[start..end]
    }
}

impl<'l, 'a> IntoIterator for &'l PriorityList<'a> {
    type Item = &'l PrioritizedRequest<'a>;
    type IntoIter = std::slice::Iter<'l, PrioritizedRequest<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Rank every pending request in `state`.
///
/// The output holds each pending request exactly once, sorted by
/// `(priority, enqueue time)`. Accounts without a balance entry rank in the
/// free bucket; accounts with a non-zero `max_fanout` have requests beyond
/// that ceiling (counting running tasks first) demoted to the free bucket.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTimestamp`] if any request carries an
/// enqueue time that cannot be converted.
pub fn prioritize_requests<'a>(
    state: &'a State,
    config: &SchedulerConfig,
) -> Result<PriorityList<'a>, SchedulerError> {
    let mut items = state
        .queued_requests
        .values()
        .map(|request| {
            let priority = best_priority_for(state.balances.get(&request.account_id));
            PrioritizedRequest::new(request, priority)
        })
        .collect::<Result<Vec<_>, _>>()?;

    sort_for_dispatch(&mut items);
    let demoted = demote_beyond_fanout(&mut items, state, config);
    if demoted > 0 {
        sort_for_dispatch(&mut items);
    }

    tracing::debug!(
        requests = items.len(),
        demoted,
        "prioritized pending requests"
    );
    Ok(PriorityList { items })
}

fn sort_for_dispatch(items: &mut [PrioritizedRequest<'_>]) {
    items.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.enqueue_time.cmp(&b.enqueue_time))
    });
}

/// Force requests past an account's fan-out ceiling into the free bucket.
/// Returns the number of requests whose band changed.
fn demote_beyond_fanout(
    items: &mut [PrioritizedRequest<'_>],
    state: &State,
    config: &SchedulerConfig,
) -> usize {
    let mut in_flight: HashMap<&AccountId, u32> = state
        .balances
        .keys()
        .map(|account| (account, 0))
        .collect();
    for running in &state.running {
        if let Some(count) = in_flight.get_mut(&running.request.account_id) {
            *count += 1;
        }
    }

    let mut demoted = 0;
    for item in items.iter_mut() {
        let request = item.request;
        let account = &request.account_id;
        let Some(limit) = config.max_fanout(account) else {
            continue;
        };
        let count = in_flight.entry(account).or_insert(0);
        if *count >= limit && !item.priority.is_free_bucket() {
            tracing::trace!(
                request = %request.id,
                account = %account,
                limit,
                "demoting request beyond fan-out"
            );
            item.priority = Priority::FREE_BUCKET;
            demoted += 1;
        }
        *count += 1;
    }
    demoted
}
