//! Golfer persistence
//!
//! Phone numbers are unique across active and inactive golfers; a
//! soft-deleted golfer keeps their number until reactivated or renumbered.

use super::models::{Golfer, Tier};
use crate::phone::normalize_phone;
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use tracing::info;

const GOLFER_COLUMNS: &str = "id, name, phone, active, tier, created_at, updated_at";

fn golfer_from_row(row: &SqliteRow) -> Result<Golfer> {
    let tier: Option<String> = row.try_get("tier")?;
    Ok(Golfer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        active: row.try_get("active")?,
        tier: tier.as_deref().and_then(Tier::parse),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// List golfers ordered by name
pub async fn list_golfers(conn: &mut SqliteConnection, include_inactive: bool) -> Result<Vec<Golfer>> {
    let sql = if include_inactive {
        format!("SELECT {} FROM golfers ORDER BY name COLLATE NOCASE, id", GOLFER_COLUMNS)
    } else {
        format!(
            "SELECT {} FROM golfers WHERE active = 1 ORDER BY name COLLATE NOCASE, id",
            GOLFER_COLUMNS
        )
    };

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(golfer_from_row).collect()
}

pub async fn get_golfer(conn: &mut SqliteConnection, id: i64) -> Result<Option<Golfer>> {
    let row = sqlx::query(&format!("SELECT {} FROM golfers WHERE id = ?", GOLFER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(golfer_from_row).transpose()
}

/// Find a golfer (active or not) by canonical phone
pub async fn find_by_phone(conn: &mut SqliteConnection, phone: &str) -> Result<Option<Golfer>> {
    let row = sqlx::query(&format!("SELECT {} FROM golfers WHERE phone = ?", GOLFER_COLUMNS))
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(golfer_from_row).transpose()
}

/// Find an active golfer by canonical phone
pub async fn find_active_by_phone(conn: &mut SqliteConnection, phone: &str) -> Result<Option<Golfer>> {
    Ok(find_by_phone(conn, phone).await?.filter(|g| g.active))
}

/// Insert a golfer; `phone` must already be canonical
pub async fn insert_golfer(
    conn: &mut SqliteConnection,
    name: &str,
    phone: &str,
    tier: Option<Tier>,
) -> Result<Golfer> {
    if find_by_phone(conn, phone).await?.is_some() {
        return Err(Error::DuplicatePhone(phone.to_string()));
    }

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO golfers (name, phone, active, tier, created_at, updated_at) VALUES (?, ?, 1, ?, ?, ?)",
    )
    .bind(name)
    .bind(phone)
    .bind(tier.map(|t| t.as_str()))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    get_golfer(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("golfer {} vanished after insert", id)))
}

/// Changes applied by [`update_golfer`]; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct GolferUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub tier: Option<Option<Tier>>,
    pub active: Option<bool>,
}

/// Update a golfer
///
/// A new phone is normalized and must not belong to another golfer.
pub async fn update_golfer(conn: &mut SqliteConnection, id: i64, update: GolferUpdate) -> Result<Golfer> {
    let mut golfer = get_golfer(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("golfer {}", id)))?;

    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("name cannot be empty".to_string()));
        }
        golfer.name = name;
    }

    if let Some(raw) = update.phone {
        let phone = normalize_phone(&raw)
            .ok_or_else(|| Error::InvalidInput(format!("invalid phone number: {}", raw)))?;
        if let Some(other) = find_by_phone(conn, &phone).await? {
            if other.id != id {
                return Err(Error::DuplicatePhone(phone));
            }
        }
        golfer.phone = phone;
    }

    if let Some(tier) = update.tier {
        golfer.tier = tier;
    }
    if let Some(active) = update.active {
        golfer.active = active;
    }

    sqlx::query(
        "UPDATE golfers SET name = ?, phone = ?, tier = ?, active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&golfer.name)
    .bind(&golfer.phone)
    .bind(golfer.tier.map(|t| t.as_str()))
    .bind(golfer.active)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    get_golfer(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("golfer {}", id)))
}

/// Soft-delete a golfer
pub async fn deactivate_golfer(conn: &mut SqliteConnection, id: i64) -> Result<Golfer> {
    update_golfer(
        conn,
        id,
        GolferUpdate {
            active: Some(false),
            ..Default::default()
        },
    )
    .await
}

/// Outcome of [`register_golfer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(Golfer),
    /// A soft-deleted golfer with the same phone was brought back
    Reactivated(Golfer),
}

impl Registration {
    pub fn golfer(&self) -> &Golfer {
        match self {
            Registration::Created(g) | Registration::Reactivated(g) => g,
        }
    }
}

/// Register a golfer from raw input (manager `ADD` or dashboard)
///
/// The phone is accepted with 10 or 11 digits. An active golfer already
/// holding the number is a [`Error::DuplicatePhone`]; an inactive one is
/// reactivated under the new name.
pub async fn register_golfer(
    conn: &mut SqliteConnection,
    name: &str,
    raw_phone: &str,
    tier: Option<Tier>,
) -> Result<Registration> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()));
    }
    let phone = normalize_phone(raw_phone)
        .ok_or_else(|| Error::InvalidInput(format!("invalid phone number: {}", raw_phone)))?;

    match find_by_phone(conn, &phone).await? {
        Some(existing) if existing.active => Err(Error::DuplicatePhone(phone)),
        Some(existing) => {
            let golfer = update_golfer(
                conn,
                existing.id,
                GolferUpdate {
                    name: Some(name.to_string()),
                    active: Some(true),
                    tier: tier.map(Some),
                    ..Default::default()
                },
            )
            .await?;
            info!("Reactivated golfer {} ({})", golfer.name, golfer.phone);
            Ok(Registration::Reactivated(golfer))
        }
        None => {
            let golfer = insert_golfer(conn, name, &phone, tier).await?;
            info!("Registered golfer {} ({})", golfer.name, golfer.phone);
            Ok(Registration::Created(golfer))
        }
    }
}
