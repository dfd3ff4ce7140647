//! Inbound SMS handling
//!
//! Every inbound text produces exactly one reply string. Texts from a
//! manager number are commands; everything else is a golfer reply. Internal
//! failures are logged and answered with a generic message.

use crate::AppState;
use fairway_common::db::golfers::{self, Registration};
use fairway_common::db::models::{Event, Golfer, NewEvent, Tier};
use fairway_common::notify::{DeliveryReport, Notification};
use fairway_common::parser::{parse_manager_command, parse_reply, Announcement, ManagerCommand};
use fairway_common::phone::{display_phone, normalize_phone};
use fairway_common::summary::{build_summary, RosterSummary};
use fairway_common::{Error, Result};
use tracing::{debug, error, info};

pub const NOT_REGISTERED: &str =
    "Sorry, this number isn't registered for golf. Ask the organizer to add you.";
pub const REPLY_PROMPT: &str = "Reply IN or OUT (you can add guests, e.g. \"in +1\").";
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again.";
pub const NO_OPEN_EVENT: &str = "No open event.";

const HELP_TEXT: &str = "Commands:\n\
Golf M-D-YYYY / course / times: new event\n\
STATUS: current roster\n\
CLOSED: final roster and close\n\
LIST: registered golfers\n\
ADD name phone: register a golfer\n\
HELP: this list";

/// Produce the reply for one inbound text
pub async fn handle_inbound(state: &AppState, from: &str, body: &str) -> String {
    match route_inbound(state, from, body).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Failed to handle text from {}: {}", from, e);
            GENERIC_FAILURE.to_string()
        }
    }
}

async fn route_inbound(state: &AppState, from: &str, body: &str) -> Result<String> {
    let Some(phone) = normalize_phone(from) else {
        debug!("Unparseable sender number: {}", from);
        return Ok(NOT_REGISTERED.to_string());
    };
    let text = body.trim();

    let golfer = {
        let mut conn = state.db.acquire().await?;
        golfers::find_active_by_phone(&mut conn, &phone).await?
    };

    if state.config.is_manager(&phone) {
        // A manager who also plays answers IN/OUT like everyone else
        if let (Some(golfer), Some(_)) = (&golfer, parse_reply(text)) {
            return handle_golfer_text(state, golfer, text).await;
        }
        return handle_manager_text(state, &phone, text).await;
    }

    match golfer {
        Some(golfer) => handle_golfer_text(state, &golfer, text).await,
        None => {
            info!("Text from unregistered number {}", phone);
            Ok(NOT_REGISTERED.to_string())
        }
    }
}

async fn handle_golfer_text(state: &AppState, golfer: &Golfer, text: &str) -> Result<String> {
    let Some(event) = state.engine.current_event().await? else {
        let forwarded = format!("{}: {}", golfer.name, text);
        let report = state
            .dispatcher
            .broadcast(&state.config.manager_phones, &forwarded)
            .await;
        info!(
            "No open event; forwarded text from {} to managers ({})",
            golfer.name,
            report.summary()
        );
        return Ok(
            "There's no open golf event right now. Your message was passed to the organizer."
                .to_string(),
        );
    };

    let Some(reply) = parse_reply(text) else {
        debug!("Unrecognized reply from {}: {:?}", golfer.name, text);
        return Ok(REPLY_PROMPT.to_string());
    };

    let outcome = state.engine.record_response(golfer, event.id, reply).await?;
    if !outcome.notifications.is_empty() {
        state.dispatcher.send_bulk(&outcome.notifications).await;
    }

    Ok(outcome.message)
}

async fn handle_manager_text(state: &AppState, phone: &str, text: &str) -> Result<String> {
    let command = parse_manager_command(text);
    debug!("Manager {} sent {:?}", phone, command);

    match command {
        ManagerCommand::Announce(announcement) => {
            let (event, report) = announce(state, &announcement).await?;
            Ok(format!(
                "Event created: {}\nTee times: {}\nInvitations {}.",
                event.headline(),
                event.tee_times.join(", "),
                report.summary()
            ))
        }
        ManagerCommand::Status => match state.engine.current_event().await? {
            Some(event) => Ok(build_summary(&state.db, event.id).await?.to_sms_text()),
            None => Ok(NO_OPEN_EVENT.to_string()),
        },
        ManagerCommand::Close => match state.engine.current_event().await? {
            Some(event) => {
                state.engine.close_event(event.id).await?;
                let summary = build_summary(&state.db, event.id).await?;
                Ok(format!("Closed. Final roster:\n{}", summary.to_sms_text()))
            }
            None => Ok(NO_OPEN_EVENT.to_string()),
        },
        ManagerCommand::List => {
            let mut conn = state.db.acquire().await?;
            let active = golfers::list_golfers(&mut conn, false).await?;
            Ok(golfer_listing(&active))
        }
        ManagerCommand::Add { name, phone } => add_golfer(state, &name, &phone).await,
        ManagerCommand::Help => Ok(HELP_TEXT.to_string()),
        ManagerCommand::Unrecognized => {
            Ok("Unrecognized command. Text HELP for the list of commands.".to_string())
        }
    }
}

async fn add_golfer(state: &AppState, name: &str, raw_phone: &str) -> Result<String> {
    let mut conn = state.db.acquire().await?;
    match golfers::register_golfer(&mut conn, name, raw_phone, None).await {
        Ok(Registration::Created(golfer)) => Ok(format!(
            "Added {} ({}).",
            golfer.name,
            display_phone(&golfer.phone)
        )),
        Ok(Registration::Reactivated(golfer)) => Ok(format!(
            "Reactivated {} ({}).",
            golfer.name,
            display_phone(&golfer.phone)
        )),
        Err(Error::DuplicatePhone(phone)) => {
            let holder = golfers::find_by_phone(&mut conn, &phone)
                .await?
                .map(|g| g.name)
                .unwrap_or_default();
            Ok(format!(
                "{} is already registered to {}.",
                display_phone(&phone),
                holder
            ))
        }
        Err(Error::InvalidInput(msg)) => Ok(format!("Could not add golfer: {}.", msg)),
        Err(e) => Err(e),
    }
}

fn golfer_listing(active: &[Golfer]) -> String {
    if active.is_empty() {
        return "No golfers registered.".to_string();
    }

    let mut lines = vec![format!("Golfers ({}):", active.len())];
    lines.extend(
        active
            .iter()
            .map(|g| format!("{} {}", g.name, display_phone(&g.phone))),
    );
    lines.join("\n")
}

/// Create the event for an announcement and invite every active golfer
///
/// Invitations go out preferred tier first, then backup, then untiered.
pub async fn announce(state: &AppState, announcement: &Announcement) -> Result<(Event, DeliveryReport)> {
    let event = state
        .engine
        .open_event(&NewEvent {
            date: announcement.date,
            course: announcement.course.clone(),
            tee_times: announcement.tee_times.clone(),
            capacity: state.config.capacity,
        })
        .await?;

    let report = invite(state, &event, announcement.note.as_deref()).await?;
    Ok((event, report))
}

/// Send the invitation for `event` to every active golfer
pub async fn invite(state: &AppState, event: &Event, note: Option<&str>) -> Result<DeliveryReport> {
    let mut invitees = {
        let mut conn = state.db.acquire().await?;
        golfers::list_golfers(&mut conn, false).await?
    };
    invitees.sort_by_key(|g| tier_rank(g.tier));

    let body = format!(
        "Golf {}\nTee times: {}\n{}",
        event.headline(),
        event.tee_times.join(", "),
        note.unwrap_or("Reply IN or OUT")
    );
    let notifications: Vec<Notification> = invitees
        .iter()
        .map(|g| Notification::new(g.phone.as_str(), body.as_str()))
        .collect();

    let report = state.dispatcher.send_bulk(&notifications).await;
    info!("Invitations for event {} {}", event.id, report.summary());
    Ok(report)
}

fn tier_rank(tier: Option<Tier>) -> u8 {
    match tier {
        Some(Tier::Preferred) => 0,
        Some(Tier::Backup) => 1,
        None => 2,
    }
}

/// Close the event, then send the final roster to managers and confirmed
/// golfers
///
/// Closing first means no reply can land after the roster is read.
pub async fn close_out(state: &AppState, event: &Event) -> Result<(RosterSummary, DeliveryReport)> {
    state.engine.close_event(event.id).await?;
    let summary = build_summary(&state.db, event.id).await?;
    let text = summary.to_sms_text();

    let mut recipients = state.config.manager_phones.clone();
    {
        let mut conn = state.db.acquire().await?;
        for golfer_id in summary.confirmed_golfer_ids() {
            if let Some(golfer) = golfers::get_golfer(&mut conn, golfer_id).await? {
                if !recipients.contains(&golfer.phone) {
                    recipients.push(golfer.phone);
                }
            }
        }
    }

    let report = state.dispatcher.broadcast(&recipients, &text).await;
    info!("Closed out event {}: summary {}", event.id, report.summary());

    Ok((summary, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        let mut tiers = vec![None, Some(Tier::Backup), Some(Tier::Preferred), None];
        tiers.sort_by_key(|t| tier_rank(*t));
        assert_eq!(
            tiers,
            vec![Some(Tier::Preferred), Some(Tier::Backup), None, None]
        );
    }
}
