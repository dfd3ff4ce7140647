//! Allocation engine
//!
//! The single authority for roster positions. Responses and guests share one
//! 1-based position space per event:
//!
//! - position <= capacity is confirmed, anything above is waitlisted
//!   (waitlist rank = position - capacity)
//! - a new entrant always takes the roster's high-water mark + 1, so freed
//!   positions are never handed to newcomers
//! - only [`promote`] lowers a waitlisted position, and only when a
//!   confirmed golfer drops out; it fills the lowest vacancy, not
//!   necessarily the one just freed, and moves at most one entry
//!
//! Counts and positions are recomputed from the database on every mutation.
//! Mutations for one event are serialized by a per-event lock and run in a
//! single transaction, so concurrent readers never observe half an update.
//!
//! Mutations return the notifications they would send; callers choose
//! whether to dispatch them.

use crate::db::models::{Event, Golfer, NewEvent, PositionedSlot, ResponseStatus, Slot};
use crate::db::{events, golfers, responses};
use crate::notify::Notification;
use crate::parser::{Reply, MAX_GUESTS};
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Where an entry sits relative to capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", rename_all = "lowercase")]
pub enum Placement {
    Confirmed { position: u32 },
    Waitlisted { position: u32, rank: u32 },
    Out,
}

impl Placement {
    /// Classify a position against capacity
    pub fn for_position(position: u32, capacity: u32) -> Self {
        if position <= capacity {
            Placement::Confirmed { position }
        } else {
            Placement::Waitlisted {
                position,
                rank: position - capacity,
            }
        }
    }

    pub fn position(&self) -> Option<u32> {
        match self {
            Placement::Confirmed { position } | Placement::Waitlisted { position, .. } => Some(*position),
            Placement::Out => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Placement::Confirmed { .. })
    }
}

/// What a reply changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    Joined,
    AlreadyIn,
    GuestsUpdated { from: u32, to: u32 },
    Left { released_guests: u32 },
    AlreadyOut,
}

/// A waitlisted entry moved into a confirmed slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Promotion {
    pub slot: Slot,
    pub from_position: u32,
    pub to_position: u32,
}

impl Promotion {
    pub fn is_guest(&self) -> bool {
        matches!(self.slot, Slot::Guest { .. })
    }
}

/// Result of [`AllocationEngine::record_response`]
#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutcome {
    pub event_id: i64,
    pub golfer_id: i64,
    pub placement: Placement,
    pub guests: u32,
    pub change: Change,
    /// Confirmation text for the golfer
    pub message: String,
    pub promotion: Option<Promotion>,
    /// Side-effect messages the caller may dispatch
    pub notifications: Vec<Notification>,
}

/// A golfer's own standing for an event
#[derive(Debug, Clone, Serialize)]
pub struct GolferStatus {
    pub event_id: i64,
    pub golfer_id: i64,
    /// `None` when the golfer has not replied
    pub placement: Option<Placement>,
    pub guests: Vec<Placement>,
}

/// Per-event async locks
#[derive(Debug, Default)]
pub struct EventLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl EventLocks {
    /// Wait for exclusive access to one event's roster
    pub async fn lock(&self, event_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(event_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Roster allocation engine
#[derive(Clone)]
pub struct AllocationEngine {
    db: SqlitePool,
    locks: Arc<EventLocks>,
    /// Serializes opening and closing events
    lifecycle: Arc<tokio::sync::Mutex<()>>,
}

impl AllocationEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: Arc::new(EventLocks::default()),
            lifecycle: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// The open event, if any
    pub async fn current_event(&self) -> Result<Option<Event>> {
        let mut conn = self.db.acquire().await?;
        events::current_open_event(&mut conn).await
    }

    /// Open a new event, force-closing any prior open one in the same
    /// transaction
    pub async fn open_event(&self, new: &NewEvent) -> Result<Event> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut tx = self.db.begin().await?;
        let event = events::open_event(&mut tx, new).await?;
        tx.commit().await?;
        Ok(event)
    }

    /// Close an event; false if it was not open
    pub async fn close_event(&self, event_id: i64) -> Result<bool> {
        let _lifecycle = self.lifecycle.lock().await;
        let _roster = self.locks.lock(event_id).await;
        let mut conn = self.db.acquire().await?;
        events::close_event(&mut conn, event_id).await
    }

    /// Record an IN/OUT reply for a golfer
    ///
    /// The event must exist; whether it is still open is the caller's call.
    /// More than [`MAX_GUESTS`] guests is [`Error::InvalidInput`].
    pub async fn record_response(&self, golfer: &Golfer, event_id: i64, reply: Reply) -> Result<ResponseOutcome> {
        if let Reply::In { guests } = reply {
            if guests > MAX_GUESTS {
                return Err(Error::InvalidInput(format!(
                    "at most {} guests allowed, got {}",
                    MAX_GUESTS, guests
                )));
            }
        }

        let _roster = self.locks.lock(event_id).await;
        let mut tx = self.db.begin().await?;

        let event = events::get_event(&mut tx, event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))?;

        let outcome = match reply {
            Reply::In { guests } => record_in(&mut tx, &event, golfer, guests).await?,
            Reply::Out => record_out(&mut tx, &event, golfer).await?,
        };

        tx.commit().await?;

        debug!(
            "Recorded {:?} for {} on event {}: {:?}",
            reply, golfer.name, event_id, outcome.change
        );
        Ok(outcome)
    }

    /// A golfer's own response and guests for an event
    pub async fn status_for(&self, golfer: &Golfer, event_id: i64) -> Result<GolferStatus> {
        let mut tx = self.db.begin().await?;

        let event = events::get_event(&mut tx, event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))?;

        let placement = responses::get_response(&mut tx, event_id, golfer.id)
            .await?
            .map(|r| match r.status {
                ResponseStatus::In { position } => Placement::for_position(position, event.capacity),
                ResponseStatus::Out => Placement::Out,
            });

        let guests = responses::guests_for_host(&mut tx, event_id, golfer.id)
            .await?
            .iter()
            .map(|g| Placement::for_position(g.position, event.capacity))
            .collect();

        tx.rollback().await?;

        Ok(GolferStatus {
            event_id,
            golfer_id: golfer.id,
            placement,
            guests,
        })
    }
}

/// Handle an IN reply inside the event's transaction
async fn record_in(
    conn: &mut SqliteConnection,
    event: &Event,
    golfer: &Golfer,
    requested_guests: u32,
) -> Result<ResponseOutcome> {
    let now = Utc::now();
    let previous = responses::get_response(conn, event.id, golfer.id).await?;

    let (position, joined) = match previous.map(|r| r.status) {
        Some(ResponseStatus::In { position }) => (position, false),
        _ => {
            let position = responses::max_position(conn, event.id).await? + 1;
            responses::upsert_response(conn, event.id, golfer.id, ResponseStatus::In { position }, now).await?;
            (position, true)
        }
    };

    let existing = responses::guests_for_host(conn, event.id, golfer.id).await?;
    let before = existing.len() as u32;

    if requested_guests > before {
        for _ in before..requested_guests {
            let next = responses::max_position(conn, event.id).await? + 1;
            responses::insert_guest(conn, event.id, golfer.id, next, now).await?;
        }
    } else if requested_guests < before {
        // Highest positions (most recently added) go first; no renumbering
        for guest in existing.iter().rev().take((before - requested_guests) as usize) {
            responses::delete_guest(conn, guest.id).await?;
        }
    }

    let guests = responses::guests_for_host(conn, event.id, golfer.id).await?;
    let waitlisted_guests = guests.iter().filter(|g| g.position > event.capacity).count() as u32;

    let placement = Placement::for_position(position, event.capacity);
    let change = if joined {
        Change::Joined
    } else if requested_guests == before {
        Change::AlreadyIn
    } else {
        Change::GuestsUpdated {
            from: before,
            to: requested_guests,
        }
    };

    if joined {
        info!(
            "{} is in for event {} at #{} with {} guest(s)",
            golfer.name, event.id, position, requested_guests
        );
    }

    let message = in_message(event, placement, change, requested_guests, waitlisted_guests);

    Ok(ResponseOutcome {
        event_id: event.id,
        golfer_id: golfer.id,
        placement,
        guests: requested_guests,
        change,
        message,
        promotion: None,
        notifications: Vec::new(),
    })
}

/// Handle an OUT reply inside the event's transaction
async fn record_out(conn: &mut SqliteConnection, event: &Event, golfer: &Golfer) -> Result<ResponseOutcome> {
    let now = Utc::now();
    let previous = responses::get_response(conn, event.id, golfer.id).await?;
    responses::upsert_response(conn, event.id, golfer.id, ResponseStatus::Out, now).await?;

    let vacated = match previous.map(|r| r.status) {
        Some(ResponseStatus::In { position }) => Some(position),
        _ => None,
    };

    let Some(vacated) = vacated else {
        return Ok(ResponseOutcome {
            event_id: event.id,
            golfer_id: golfer.id,
            placement: Placement::Out,
            guests: 0,
            change: Change::AlreadyOut,
            message: format!("Got it, you're out for {}.", event.headline()),
            promotion: None,
            notifications: Vec::new(),
        });
    };

    let released = responses::delete_guests_for_host(conn, event.id, golfer.id).await? as u32;
    info!(
        "{} dropped out of event {} (was #{}, released {} guest(s))",
        golfer.name, event.id, vacated, released
    );

    let promotion = if vacated <= event.capacity {
        promote(conn, event).await?
    } else {
        None
    };

    let mut notifications = Vec::new();
    if let Some(promotion) = &promotion {
        if let Some(notice) = promotion_notice(conn, event, promotion).await? {
            notifications.push(notice);
        }
    }

    let mut message = format!("Got it, you're out for {}.", event.headline());
    if released > 0 {
        message.push_str(&format!(" Your {} released.", guest_noun(released)));
    }

    Ok(ResponseOutcome {
        event_id: event.id,
        golfer_id: golfer.id,
        placement: Placement::Out,
        guests: 0,
        change: Change::Left {
            released_guests: released,
        },
        message,
        promotion,
        notifications,
    })
}

/// Move the lowest waitlisted entry into the lowest free confirmed slot
///
/// Returns `None` when nobody is waiting or no slot at or below capacity is
/// free. Never moves more than one entry.
pub async fn promote(conn: &mut SqliteConnection, event: &Event) -> Result<Option<Promotion>> {
    let Some(candidate) = responses::lowest_waitlisted(conn, event.id, event.capacity).await? else {
        return Ok(None);
    };

    let taken: BTreeSet<u32> = responses::positioned_slots(conn, event.id)
        .await?
        .iter()
        .map(|s| s.position)
        .filter(|p| *p <= event.capacity)
        .collect();

    let Some(vacancy) = first_vacancy(&taken, event.capacity) else {
        return Ok(None);
    };

    let PositionedSlot { slot, position } = candidate;
    match slot {
        Slot::Response { response_id, .. } => {
            responses::set_response_position(conn, response_id, vacancy).await?;
        }
        Slot::Guest { guest_id, .. } => {
            responses::set_guest_position(conn, guest_id, vacancy).await?;
        }
    }

    info!(
        "Promoted {:?} on event {} from #{} to #{}",
        slot, event.id, position, vacancy
    );

    Ok(Some(Promotion {
        slot,
        from_position: position,
        to_position: vacancy,
    }))
}

/// Lowest position in `1..=capacity` not in `taken`
pub fn first_vacancy(taken: &BTreeSet<u32>, capacity: u32) -> Option<u32> {
    (1..=capacity).find(|p| !taken.contains(p))
}

/// Notice for a promoted entry
///
/// A promoted guest has no phone of its own, so the host is told instead.
async fn promotion_notice(
    conn: &mut SqliteConnection,
    event: &Event,
    promotion: &Promotion,
) -> Result<Option<Notification>> {
    let Some(contact) = golfers::get_golfer(conn, promotion.slot.contact_golfer_id()).await? else {
        return Ok(None);
    };

    let body = if promotion.is_guest() {
        format!(
            "Good news! A spot opened up for {}. Your guest is now confirmed (#{} of {}).",
            event.headline(),
            promotion.to_position,
            event.capacity
        )
    } else {
        format!(
            "Good news! A spot opened up for {}. You're off the waitlist and confirmed (#{} of {}).",
            event.headline(),
            promotion.to_position,
            event.capacity
        )
    };

    Ok(Some(Notification::new(contact.phone, body)))
}

fn guest_noun(count: u32) -> String {
    if count == 1 {
        "1 guest was".to_string()
    } else {
        format!("{} guests were", count)
    }
}

fn in_message(event: &Event, placement: Placement, change: Change, guests: u32, waitlisted_guests: u32) -> String {
    let standing = match placement {
        Placement::Confirmed { position } => format!("You're #{} of {}.", position, event.capacity),
        Placement::Waitlisted { rank, .. } => format!(
            "You're #{} on the waitlist. We'll text you if a spot opens.",
            rank
        ),
        Placement::Out => String::new(),
    };

    let guest_text = match (guests, waitlisted_guests) {
        (0, _) => String::new(),
        (1, 0) => " Plus 1 guest.".to_string(),
        (n, 0) => format!(" Plus {} guests.", n),
        (n, w) => format!(" Plus {} guest(s), {} on the waitlist.", n, w),
    };

    match change {
        Change::AlreadyIn => format!("You're already in for {}. {}{}", event.headline(), standing, guest_text),
        Change::GuestsUpdated { .. } => {
            let guest_text = if guests == 0 { " No guests.".to_string() } else { guest_text };
            format!("Updated for {}. {}{}", event.headline(), standing, guest_text)
        }
        _ => match placement {
            Placement::Waitlisted { .. } => {
                format!("Waitlisted for {}. {}{}", event.headline(), standing, guest_text)
            }
            _ => format!("You're in for {}! {}{}", event.headline(), standing, guest_text),
        },
    }
}
