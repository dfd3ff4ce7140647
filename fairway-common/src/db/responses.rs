//! Response and guest persistence
//!
//! Responses and guests share one position space per event. The queries here
//! only read and write rows; position rules live in the allocation engine.

use super::models::{Guest, PositionedSlot, Response, ResponseStatus, Slot};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

const RESPONSE_COLUMNS: &str = "id, event_id, golfer_id, status, position, responded_at, updated_at";
const GUEST_COLUMNS: &str = "id, event_id, host_golfer_id, position, created_at";

fn response_from_row(row: &SqliteRow) -> Result<Response> {
    let status: String = row.try_get("status")?;
    let position: Option<u32> = row.try_get("position")?;

    let status = match (status.as_str(), position) {
        ("in", Some(position)) => ResponseStatus::In { position },
        ("out", None) => ResponseStatus::Out,
        (other, position) => {
            return Err(Error::Internal(format!(
                "Inconsistent response row: status={} position={:?}",
                other, position
            )))
        }
    };

    Ok(Response {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        golfer_id: row.try_get("golfer_id")?,
        status,
        responded_at: row.try_get("responded_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn guest_from_row(row: &SqliteRow) -> Result<Guest> {
    Ok(Guest {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        host_golfer_id: row.try_get("host_golfer_id")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Responses
// ============================================================================

pub async fn get_response(
    conn: &mut SqliteConnection,
    event_id: i64,
    golfer_id: i64,
) -> Result<Option<Response>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM responses WHERE event_id = ? AND golfer_id = ?",
        RESPONSE_COLUMNS
    ))
    .bind(event_id)
    .bind(golfer_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(response_from_row).transpose()
}

/// All responses for an event in insertion order
pub async fn list_responses(conn: &mut SqliteConnection, event_id: i64) -> Result<Vec<Response>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM responses WHERE event_id = ? ORDER BY responded_at, id",
        RESPONSE_COLUMNS
    ))
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(response_from_row).collect()
}

/// Insert or update the golfer's single response for the event
///
/// `responded_at` keeps the time of the first reply.
pub async fn upsert_response(
    conn: &mut SqliteConnection,
    event_id: i64,
    golfer_id: i64,
    status: ResponseStatus,
    now: DateTime<Utc>,
) -> Result<Response> {
    sqlx::query(
        r#"
        INSERT INTO responses (event_id, golfer_id, status, position, responded_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_id, golfer_id) DO UPDATE SET
            status = excluded.status,
            position = excluded.position,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(event_id)
    .bind(golfer_id)
    .bind(status.as_str())
    .bind(status.position())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    get_response(conn, event_id, golfer_id)
        .await?
        .ok_or_else(|| Error::Internal("response vanished after upsert".to_string()))
}

pub async fn set_response_position(conn: &mut SqliteConnection, response_id: i64, position: u32) -> Result<()> {
    sqlx::query("UPDATE responses SET position = ?, updated_at = ? WHERE id = ? AND status = 'in'")
        .bind(position)
        .bind(Utc::now())
        .bind(response_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// ============================================================================
// Guests
// ============================================================================

/// One host's guests, lowest position first
pub async fn guests_for_host(
    conn: &mut SqliteConnection,
    event_id: i64,
    host_golfer_id: i64,
) -> Result<Vec<Guest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE event_id = ? AND host_golfer_id = ? ORDER BY position, id",
        GUEST_COLUMNS
    ))
    .bind(event_id)
    .bind(host_golfer_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(guest_from_row).collect()
}

pub async fn insert_guest(
    conn: &mut SqliteConnection,
    event_id: i64,
    host_golfer_id: i64,
    position: u32,
    now: DateTime<Utc>,
) -> Result<Guest> {
    let id = sqlx::query(
        "INSERT INTO guests (event_id, host_golfer_id, position, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(event_id)
    .bind(host_golfer_id)
    .bind(position)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Guest {
        id,
        event_id,
        host_golfer_id,
        position,
        created_at: now,
    })
}

pub async fn delete_guest(conn: &mut SqliteConnection, guest_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM guests WHERE id = ?")
        .bind(guest_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Remove every guest a host brought to the event
pub async fn delete_guests_for_host(
    conn: &mut SqliteConnection,
    event_id: i64,
    host_golfer_id: i64,
) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM guests WHERE event_id = ? AND host_golfer_id = ?")
        .bind(event_id)
        .bind(host_golfer_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(deleted)
}

pub async fn set_guest_position(conn: &mut SqliteConnection, guest_id: i64, position: u32) -> Result<()> {
    sqlx::query("UPDATE guests SET position = ? WHERE id = ?")
        .bind(position)
        .bind(guest_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// ============================================================================
// Combined position space
// ============================================================================

const POSITIONED_UNION: &str = r#"
    SELECT 'response' AS kind, id, golfer_id AS owner_id, position, responded_at AS stamp
    FROM responses WHERE event_id = ?1 AND status = 'in'
    UNION ALL
    SELECT 'guest' AS kind, id, host_golfer_id AS owner_id, position, created_at AS stamp
    FROM guests WHERE event_id = ?1
"#;

fn positioned_from_row(row: &SqliteRow) -> Result<PositionedSlot> {
    let kind: String = row.try_get("kind")?;
    let id: i64 = row.try_get("id")?;
    let owner_id: i64 = row.try_get("owner_id")?;

    let slot = match kind.as_str() {
        "response" => Slot::Response {
            response_id: id,
            golfer_id: owner_id,
        },
        _ => Slot::Guest {
            guest_id: id,
            host_golfer_id: owner_id,
        },
    };

    Ok(PositionedSlot {
        slot,
        position: row.try_get("position")?,
    })
}

/// Every occupied position, ascending, ties by insertion time
pub async fn positioned_slots(conn: &mut SqliteConnection, event_id: i64) -> Result<Vec<PositionedSlot>> {
    let rows = sqlx::query(&format!(
        "SELECT kind, id, owner_id, position FROM ({}) ORDER BY position ASC, stamp ASC",
        POSITIONED_UNION
    ))
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(positioned_from_row).collect()
}

/// Highest occupied position, 0 when the roster is empty
pub async fn max_position(conn: &mut SqliteConnection, event_id: i64) -> Result<u32> {
    let max: Option<u32> = sqlx::query_scalar(&format!(
        "SELECT MAX(position) FROM ({})",
        POSITIONED_UNION
    ))
    .bind(event_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max.unwrap_or(0))
}

/// The lowest-positioned entry beyond capacity, ties by insertion time
pub async fn lowest_waitlisted(
    conn: &mut SqliteConnection,
    event_id: i64,
    capacity: u32,
) -> Result<Option<PositionedSlot>> {
    let row = sqlx::query(&format!(
        "SELECT kind, id, owner_id, position FROM ({}) WHERE position > ?2 ORDER BY position ASC, stamp ASC LIMIT 1",
        POSITIONED_UNION
    ))
    .bind(event_id)
    .bind(capacity)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(positioned_from_row).transpose()
}
