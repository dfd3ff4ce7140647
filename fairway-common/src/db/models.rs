//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Golfer classification used when sending invitations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Preferred,
    Backup,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Preferred => "preferred",
            Tier::Backup => "backup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "preferred" => Some(Tier::Preferred),
            "backup" => Some(Tier::Backup),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Golfer {
    pub id: i64,
    pub name: String,
    /// Canonical `+1XXXXXXXXXX`
    pub phone: String,
    pub active: bool,
    pub tier: Option<Tier>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Open,
    Closed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Open => "open",
            EventStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(EventStatus::Open),
            "closed" => Some(EventStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub date: NaiveDate,
    pub course: String,
    pub tee_times: Vec<String>,
    pub capacity: u32,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Event {
    /// `Sun Nov 30 at Red`
    pub fn headline(&self) -> String {
        format!("{} at {}", self.date.format("%a %b %-d"), self.course)
    }
}

/// Event attributes supplied by an announcement or the dashboard
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub date: NaiveDate,
    pub course: String,
    pub tee_times: Vec<String>,
    pub capacity: u32,
}

/// A response either holds a position or it does not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseStatus {
    In { position: u32 },
    Out,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::In { .. } => "in",
            ResponseStatus::Out => "out",
        }
    }

    pub fn position(&self) -> Option<u32> {
        match self {
            ResponseStatus::In { position } => Some(*position),
            ResponseStatus::Out => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub event_id: i64,
    pub golfer_id: i64,
    #[serde(flatten)]
    pub status: ResponseStatus,
    pub responded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A capacity-consuming slot brought by a hosting golfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: i64,
    pub event_id: i64,
    pub host_golfer_id: i64,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

/// Where a position-holding entry lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Slot {
    Response { response_id: i64, golfer_id: i64 },
    Guest { guest_id: i64, host_golfer_id: i64 },
}

impl Slot {
    /// The golfer reachable for this slot (the host for a guest)
    pub fn contact_golfer_id(&self) -> i64 {
        match self {
            Slot::Response { golfer_id, .. } => *golfer_id,
            Slot::Guest { host_golfer_id, .. } => *host_golfer_id,
        }
    }
}

/// A positioned entry from either the responses or the guests table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedSlot {
    pub slot: Slot,
    pub position: u32,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
