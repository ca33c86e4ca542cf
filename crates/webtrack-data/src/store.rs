//! In-memory holder for one analysis run's parsed events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use webtrack_core::models::Event;

/// Every event of one user, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBatch {
    pub userid: String,
    pub events: Vec<Event>,
}

/// Every parsed [`Event`] of one run, in input order.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Split into per-user batches, ordered by user id.
    pub fn partition_by_user(&self) -> Vec<UserBatch> {
        partition_by_user(&self.events)
    }
}

/// Split `events` into per-user batches ordered by user id. Each batch keeps
/// input order.
pub fn partition_by_user(events: &[Event]) -> Vec<UserBatch> {
    let mut groups: BTreeMap<&str, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.userid.as_str())
            .or_default()
            .push(event.clone());
    }
    groups
        .into_iter()
        .map(|(userid, events)| UserBatch {
            userid: userid.to_string(),
            events,
        })
        .collect()
}

impl From<Vec<Event>> for EventStore {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl Extend<Event> for EventStore {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}
