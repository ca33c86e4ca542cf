use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Status code carried by every tab-activity log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The tab was closed. Terminal; never part of a download.
    Closed = 0,
    /// A download started in the tab.
    Started = 1,
    /// A download finished in the tab.
    Finished = 2,
}

impl TryFrom<i64> for Status {
    type Error = TrackerError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Status::Closed),
            1 => Ok(Status::Started),
            2 => Ok(Status::Finished),
            other => Err(TrackerError::InvalidStatus(other)),
        }
    }
}

impl From<Status> for i64 {
    fn from(status: Status) -> Self {
        status as i64
    }
}

/// A single normalised tab-activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Identifier of the user who produced the event.
    pub userid: String,
    /// Browser tab identifier.
    pub tabid: i64,
    /// URL the tab was pointed at.
    pub url: String,
    /// What happened.
    pub status: Status,
}

impl Event {
    pub fn new(
        timestamp: i64,
        userid: impl Into<String>,
        tabid: i64,
        url: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            timestamp,
            userid: userid.into(),
            tabid,
            url: url.into(),
            status,
        }
    }

    /// The session this event belongs to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            userid: self.userid.clone(),
            url: self.url.clone(),
            tabid: self.tabid,
        }
    }
}

/// Structural identity of a session: `(userid, url, tabid)`.
///
/// Two events belong to the same session iff their keys compare equal. The
/// `Hash` impl only serves map lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub userid: String,
    pub url: String,
    pub tabid: i64,
}

impl SessionKey {
    pub fn new(userid: impl Into<String>, url: impl Into<String>, tabid: i64) -> Self {
        Self {
            userid: userid.into(),
            url: url.into(),
            tabid,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.userid, self.url, self.tabid)
    }
}

/// All events sharing one [`SessionKey`], ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    /// Sorted ascending by timestamp; equal timestamps keep input order.
    pub events: Vec<Event>,
    /// Timestamp of the earliest event.
    pub start: i64,
    /// Timestamp of the latest event.
    pub end: i64,
}

impl Session {
    /// Build a session from its events, sorting them (stably) by timestamp.
    ///
    /// Fails with [`TrackerError::InvalidState`] when `events` is empty, or
    /// when an event's key does not match `key`.
    pub fn from_events(key: SessionKey, mut events: Vec<Event>) -> Result<Self> {
        if let Some(stray) = events
            .iter()
            .find(|e| e.userid != key.userid || e.url != key.url || e.tabid != key.tabid)
        {
            return Err(TrackerError::InvalidState(format!(
                "event {} does not belong to session {}",
                stray.session_key(),
                key
            )));
        }

        events.sort_by_key(|e| e.timestamp);

        let (start, end) = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                return Err(TrackerError::InvalidState(format!(
                    "session {} has no events",
                    key
                )))
            }
        };

        Ok(Self {
            key,
            events,
            start,
            end,
        })
    }

    pub fn url(&self) -> &str {
        &self.key.url
    }

    /// `end - start` in milliseconds.
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}

/// One matched Started → Finished pair inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub session: SessionKey,
    /// The `Started` event.
    pub start: Event,
    /// The `Finished` event.
    pub end: Event,
    /// `end.timestamp - start.timestamp` in milliseconds.
    pub duration: i64,
}

impl Download {
    /// Pair two events into a download.
    ///
    /// Returns `None` unless `start` is `Started`, `end` is `Finished`, and
    /// `start.timestamp <= end.timestamp`.
    pub fn new(session: SessionKey, start: Event, end: Event) -> Option<Self> {
        if start.status != Status::Started
            || end.status != Status::Finished
            || start.timestamp > end.timestamp
        {
            return None;
        }
        let duration = end.timestamp - start.timestamp;
        Some(Self {
            session,
            start,
            end,
            duration,
        })
    }

    pub fn start_ts(&self) -> i64 {
        self.start.timestamp
    }

    pub fn end_ts(&self) -> i64 {
        self.end.timestamp
    }

    pub fn url(&self) -> &str {
        &self.session.url
    }
}

/// A maximal chain of transitively overlapping downloads for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    /// The download that opened the chain.
    pub anchor: Download,
    /// Everything in between, sorted by start ascending.
    pub members: Vec<Download>,
    /// The download with the greatest end; closes the chain.
    pub terminator: Download,
    /// `terminator.end - anchor.start` in milliseconds.
    pub duration: i64,
    /// `members[0].start - anchor.start`, undefined without members.
    pub time_before_overlap_starts: Option<i64>,
    /// URL of the first member, i.e. the one that created the overlap.
    pub overlapping_url: Option<String>,
    /// URLs of anchor, members and terminator, in order of first appearance.
    pub unique_urls: Vec<String>,
}

impl Overlap {
    pub fn new(anchor: Download, mut members: Vec<Download>, terminator: Download) -> Self {
        members.sort_by_key(|d| d.start_ts());

        let duration = terminator.end_ts() - anchor.start_ts();
        let time_before_overlap_starts = members.first().map(|m| m.start_ts() - anchor.start_ts());
        let overlapping_url = members.first().map(|m| m.url().to_string());

        let mut unique_urls: Vec<String> = Vec::new();
        for download in std::iter::once(&anchor)
            .chain(members.iter())
            .chain(std::iter::once(&terminator))
        {
            if !unique_urls.iter().any(|u| u == download.url()) {
                unique_urls.push(download.url().to_string());
            }
        }

        Self {
            anchor,
            members,
            terminator,
            duration,
            time_before_overlap_starts,
            overlapping_url,
            unique_urls,
        }
    }

    /// Number of distinct URLs involved in the chain.
    pub fn num_urls(&self) -> usize {
        self.unique_urls.len()
    }

    /// Number of downloads in the chain, anchor and terminator included.
    pub fn num_downloads(&self) -> usize {
        self.members.len() + 2
    }
}
