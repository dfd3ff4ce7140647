//! Event persistence
//!
//! The "current event" is a query for the single row with status `open`,
//! never cached state. Opening a new event closes any open one first.

use super::models::{Event, EventStatus, NewEvent};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use tracing::info;

const EVENT_COLUMNS: &str = "id, event_date, course, tee_times, capacity, status, created_at, closed_at";

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let tee_times: String = row.try_get("tee_times")?;
    let status: String = row.try_get("status")?;

    Ok(Event {
        id: row.try_get("id")?,
        date: row.try_get("event_date")?,
        course: row.try_get("course")?,
        tee_times: serde_json::from_str(&tee_times)
            .map_err(|e| Error::Internal(format!("Invalid tee_times JSON: {}", e)))?,
        capacity: row.try_get("capacity")?,
        status: EventStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Invalid event status: {}", status)))?,
        created_at: row.try_get("created_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

pub async fn get_event(conn: &mut SqliteConnection, id: i64) -> Result<Option<Event>> {
    let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(event_from_row).transpose()
}

/// The open event, if any
pub async fn current_open_event(conn: &mut SqliteConnection) -> Result<Option<Event>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM events WHERE status = 'open' ORDER BY id DESC LIMIT 1",
        EVENT_COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(event_from_row).transpose()
}

/// Close every open event, returning how many were closed
pub async fn close_open_events(conn: &mut SqliteConnection) -> Result<u64> {
    let closed = sqlx::query("UPDATE events SET status = 'closed', closed_at = ? WHERE status = 'open'")
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(closed)
}

/// Close one event; returns false if it was already closed
pub async fn close_event(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let closed = sqlx::query(
        "UPDATE events SET status = 'closed', closed_at = ? WHERE id = ? AND status = 'open'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if closed > 0 {
        info!("Closed event {}", id);
    }
    Ok(closed > 0)
}

/// Insert a new open event after force-closing any prior open one
///
/// Run inside a transaction so the close and the insert land together.
pub async fn open_event(conn: &mut SqliteConnection, new: &NewEvent) -> Result<Event> {
    if new.course.trim().is_empty() {
        return Err(Error::InvalidInput("course cannot be empty".to_string()));
    }
    if new.tee_times.is_empty() {
        return Err(Error::InvalidInput("at least one tee time is required".to_string()));
    }
    if new.capacity == 0 {
        return Err(Error::InvalidInput("capacity must be at least 1".to_string()));
    }

    let closed = close_open_events(conn).await?;
    if closed > 0 {
        info!("Force-closed {} open event(s) before opening a new one", closed);
    }

    let tee_times = serde_json::to_string(&new.tee_times)
        .map_err(|e| Error::Internal(format!("Failed to encode tee times: {}", e)))?;

    let id = sqlx::query(
        r#"
        INSERT INTO events (event_date, course, tee_times, capacity, status, created_at)
        VALUES (?, ?, ?, ?, 'open', ?)
        "#,
    )
    .bind(new.date)
    .bind(new.course.trim())
    .bind(tee_times)
    .bind(new.capacity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!("Opened event {} for {} at {}", id, new.date, new.course.trim());

    get_event(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("event {} vanished after insert", id)))
}
