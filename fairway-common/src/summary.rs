//! Roster summaries
//!
//! Derives the four disjoint views of an event (confirmed, waitlist, out,
//! no response) from stored state. The result serializes for the dashboard
//! and renders as a condensed SMS block.

use crate::db::models::{Event, Golfer, ResponseStatus, Slot};
use crate::db::{events, golfers, responses};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Golfer,
    Guest,
}

/// One position-holding entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub position: u32,
    /// Golfer name, or `<host>'s guest`
    pub name: String,
    pub kind: EntryKind,
    /// The golfer, or the host for a guest
    pub golfer_id: i64,
}

/// A golfer listed without a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonEntry {
    pub golfer_id: i64,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterSummary {
    pub event: Event,
    pub confirmed: Vec<RosterEntry>,
    pub waitlist: Vec<RosterEntry>,
    pub out: Vec<PersonEntry>,
    pub no_response: Vec<PersonEntry>,
}

impl RosterSummary {
    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    /// Names in confirmed position order, guests included
    pub fn roster_names(&self) -> Vec<String> {
        self.confirmed.iter().map(|e| e.name.clone()).collect()
    }

    /// Golfers holding a confirmed slot themselves, in position order
    pub fn confirmed_golfer_ids(&self) -> Vec<i64> {
        self.confirmed
            .iter()
            .filter(|e| e.kind == EntryKind::Golfer)
            .map(|e| e.golfer_id)
            .collect()
    }

    /// Condensed text for SMS
    ///
    /// Confirmed always renders (as `None` when empty); the other buckets
    /// are left out when empty.
    pub fn to_sms_text(&self) -> String {
        let mut lines = vec![self.event.headline()];
        if !self.event.tee_times.is_empty() {
            lines.push(format!("Tee times: {}", self.event.tee_times.join(", ")));
        }

        lines.push(String::new());
        lines.push(format!(
            "Confirmed ({}/{}):",
            self.confirmed.len(),
            self.event.capacity
        ));
        if self.confirmed.is_empty() {
            lines.push("None".to_string());
        } else {
            for entry in &self.confirmed {
                lines.push(format!("{}. {}", entry.position, entry.name));
            }
        }

        if !self.waitlist.is_empty() {
            lines.push(format!("Waitlist ({}):", self.waitlist.len()));
            for (rank, entry) in self.waitlist.iter().enumerate() {
                lines.push(format!("{}. {}", rank + 1, entry.name));
            }
        }

        if !self.out.is_empty() {
            lines.push(format!("Out ({}): {}", self.out.len(), join_names(&self.out)));
        }

        if !self.no_response.is_empty() {
            lines.push(format!(
                "No response ({}): {}",
                self.no_response.len(),
                join_names(&self.no_response)
            ));
        }

        lines.join("\n")
    }
}

fn join_names(people: &[PersonEntry]) -> String {
    people
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the summary for an event inside one read transaction
pub async fn build_summary(pool: &SqlitePool, event_id: i64) -> Result<RosterSummary> {
    let mut tx = pool.begin().await?;
    let summary = summarize(&mut tx, event_id).await?;
    tx.rollback().await?;
    Ok(summary)
}

/// Build the summary on an existing connection
pub async fn summarize(conn: &mut SqliteConnection, event_id: i64) -> Result<RosterSummary> {
    let event = events::get_event(conn, event_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))?;

    let everyone: HashMap<i64, Golfer> = golfers::list_golfers(conn, true)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();
    let name_of = |id: i64| {
        everyone
            .get(&id)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| format!("golfer #{}", id))
    };

    let mut confirmed = Vec::new();
    let mut waitlist = Vec::new();
    for positioned in responses::positioned_slots(conn, event.id).await? {
        let entry = match positioned.slot {
            Slot::Response { golfer_id, .. } => RosterEntry {
                position: positioned.position,
                name: name_of(golfer_id),
                kind: EntryKind::Golfer,
                golfer_id,
            },
            Slot::Guest { host_golfer_id, .. } => RosterEntry {
                position: positioned.position,
                name: format!("{}'s guest", name_of(host_golfer_id)),
                kind: EntryKind::Guest,
                golfer_id: host_golfer_id,
            },
        };
        if entry.position <= event.capacity {
            confirmed.push(entry);
        } else {
            waitlist.push(entry);
        }
    }

    let replies = responses::list_responses(conn, event.id).await?;
    let responded: HashSet<i64> = replies.iter().map(|r| r.golfer_id).collect();

    let out = replies
        .iter()
        .filter(|r| r.status == ResponseStatus::Out)
        .filter_map(|r| everyone.get(&r.golfer_id))
        .map(person)
        .collect();

    let mut no_response: Vec<PersonEntry> = everyone
        .values()
        .filter(|g| g.active && !responded.contains(&g.id))
        .map(person)
        .collect();
    no_response.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.golfer_id.cmp(&b.golfer_id))
    });

    Ok(RosterSummary {
        event,
        confirmed,
        waitlist,
        out,
        no_response,
    })
}

fn person(golfer: &Golfer) -> PersonEntry {
    PersonEntry {
        golfer_id: golfer.id,
        name: golfer.name.clone(),
        phone: golfer.phone.clone(),
    }
}
