//! Session reconstruction.
//!
//! Groups [`Event`]s by their exact `(userid, url, tabid)` key into
//! timestamp-ordered [`Session`]s.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;
use webtrack_core::error::Result;
use webtrack_core::models::{Event, Session, SessionKey};

/// Every session of a batch, plus a per-user index over them.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    pub sessions: HashMap<SessionKey, Session>,
    pub by_user: BTreeMap<String, BTreeSet<SessionKey>>,
}

impl SessionIndex {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Sessions of `userid`, ordered by key.
    pub fn sessions_for(&self, userid: &str) -> Vec<&Session> {
        self.by_user
            .get(userid)
            .map(|keys| keys.iter().filter_map(|k| self.sessions.get(k)).collect())
            .unwrap_or_default()
    }

    /// Consume the index, yielding every session ordered by key.
    pub fn into_sorted_sessions(self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.into_values().collect();
        sessions.sort_by(|a, b| a.key.cmp(&b.key));
        sessions
    }
}

/// Stateless session builder.
pub struct SessionBuilder;

impl SessionBuilder {
    /// Group `events` into sessions.
    ///
    /// Within a session, events are sorted by timestamp with ties kept in
    /// input order.
    pub fn build(events: &[Event]) -> Result<SessionIndex> {
        let mut groups: HashMap<SessionKey, Vec<Event>> = HashMap::new();
        for event in events {
            groups
                .entry(event.session_key())
                .or_default()
                .push(event.clone());
        }

        let mut index = SessionIndex::default();
        for (key, group) in groups {
            let session = Session::from_events(key.clone(), group)?;
            index
                .by_user
                .entry(key.userid.clone())
                .or_default()
                .insert(key.clone());
            index.sessions.insert(key, session);
        }

        debug!(
            "SessionBuilder: {} sessions for {} users from {} events",
            index.sessions.len(),
            index.by_user.len(),
            events.len()
        );
        Ok(index)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
