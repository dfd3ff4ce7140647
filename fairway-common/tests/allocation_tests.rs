//! Allocation engine integration tests
//!
//! Run against an in-memory roster store, except the concurrency tests,
//! which need a file database so several connections really overlap.

use chrono::NaiveDate;
use fairway_common::allocation::{AllocationEngine, Change, Placement};
use fairway_common::db::golfers::insert_golfer;
use fairway_common::db::init::{init_database, init_memory_database};
use fairway_common::db::models::{Event, Golfer, NewEvent, Slot};
use fairway_common::db::responses;
use fairway_common::parser::{Reply, MAX_GUESTS};
use fairway_common::summary::{build_summary, EntryKind};
use fairway_common::Error;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tempfile::TempDir;

struct Roster {
    engine: AllocationEngine,
    event: Event,
    golfers: Vec<Golfer>,
}

impl Roster {
    /// Golfer `n` is 1-based, matching G1..Gn
    fn g(&self, n: usize) -> &Golfer {
        &self.golfers[n - 1]
    }

    async fn reply(&self, n: usize, reply: Reply) -> fairway_common::allocation::ResponseOutcome {
        self.engine
            .record_response(self.g(n), self.event.id, reply)
            .await
            .unwrap()
    }

    async fn position_of(&self, n: usize) -> Option<u32> {
        let mut conn = self.engine.pool().acquire().await.unwrap();
        responses::get_response(&mut conn, self.event.id, self.g(n).id)
            .await
            .unwrap()
            .and_then(|r| r.status.position())
    }
}

async fn roster(golfer_count: usize, capacity: u32) -> Roster {
    roster_on(init_memory_database().await.unwrap(), golfer_count, capacity).await
}

/// Same roster on a file database with a multi-connection pool
async fn file_roster(dir: &TempDir, golfer_count: usize, capacity: u32) -> Roster {
    let pool = init_database(&dir.path().join("fairway.db")).await.unwrap();
    roster_on(pool, golfer_count, capacity).await
}

async fn roster_on(pool: SqlitePool, golfer_count: usize, capacity: u32) -> Roster {
    let mut golfers = Vec::new();
    {
        let mut conn = pool.acquire().await.unwrap();
        for i in 1..=golfer_count {
            let phone = format!("+1555000{:04}", i);
            golfers.push(insert_golfer(&mut conn, &format!("G{}", i), &phone, None).await.unwrap());
        }
    }

    let engine = AllocationEngine::new(pool);
    let event = engine
        .open_event(&NewEvent {
            date: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
            course: "Red".to_string(),
            tee_times: vec!["8:08 AM".to_string(), "10:15 AM".to_string()],
            capacity,
        })
        .await
        .unwrap();

    Roster { engine, event, golfers }
}

const IN: Reply = Reply::In { guests: 0 };

#[tokio::test]
async fn test_sequential_ins_fill_positions_in_order() {
    let r = roster(5, 16).await;

    for n in 1..=5 {
        let outcome = r.reply(n, IN).await;
        assert_eq!(outcome.placement, Placement::Confirmed { position: n as u32 });
        assert_eq!(outcome.change, Change::Joined);
        assert!(outcome.message.contains(&format!("#{} of 16", n)));
    }
}

#[tokio::test]
async fn test_in_beyond_capacity_is_waitlisted_by_rank() {
    let r = roster(6, 4).await;

    for n in 1..=4 {
        r.reply(n, IN).await;
    }
    let fifth = r.reply(5, IN).await;
    let sixth = r.reply(6, IN).await;

    assert_eq!(fifth.placement, Placement::Waitlisted { position: 5, rank: 1 });
    assert_eq!(sixth.placement, Placement::Waitlisted { position: 6, rank: 2 });
    assert!(sixth.message.contains("#2 on the waitlist"));
}

#[tokio::test]
async fn test_seventeen_in_then_fifth_out_promotes_seventeenth() {
    let r = roster(17, 16).await;
    for n in 1..=17 {
        r.reply(n, IN).await;
    }

    let outcome = r.reply(5, Reply::Out).await;
    assert_eq!(outcome.placement, Placement::Out);

    let promotion = outcome.promotion.expect("G17 should be promoted");
    assert_eq!(promotion.from_position, 17);
    assert_eq!(promotion.to_position, 5);
    assert!(matches!(promotion.slot, Slot::Response { golfer_id, .. } if golfer_id == r.g(17).id));

    assert_eq!(outcome.notifications.len(), 1);
    assert_eq!(outcome.notifications[0].to, r.g(17).phone);
    assert!(outcome.notifications[0].body.contains("confirmed (#5 of 16)"));

    assert_eq!(r.position_of(17).await, Some(5));
    assert_eq!(r.position_of(5).await, None);

    let summary = build_summary(r.engine.pool(), r.event.id).await.unwrap();
    assert_eq!(summary.confirmed.len(), 16);
    assert!(summary.waitlist.is_empty());
    assert_eq!(summary.out.len(), 1);
    assert_eq!(summary.out[0].name, "G5");
    assert_eq!(summary.confirmed[4].name, "G17");
}

#[tokio::test]
async fn test_only_one_promotion_per_cancellation() {
    let r = roster(6, 3).await;
    for n in 1..=6 {
        r.reply(n, IN).await;
    }

    r.reply(2, Reply::Out).await;

    assert_eq!(r.position_of(4).await, Some(2));
    assert_eq!(r.position_of(5).await, Some(5));
    assert_eq!(r.position_of(6).await, Some(6));
}

#[tokio::test]
async fn test_waitlisted_out_does_not_promote() {
    let r = roster(5, 3).await;
    for n in 1..=5 {
        r.reply(n, IN).await;
    }

    let outcome = r.reply(4, Reply::Out).await;
    assert!(outcome.promotion.is_none());
    assert!(outcome.notifications.is_empty());
    assert_eq!(r.position_of(5).await, Some(5));
}

#[tokio::test]
async fn test_new_entrant_never_reuses_a_gap() {
    let r = roster(4, 8).await;
    for n in 1..=3 {
        r.reply(n, IN).await;
    }

    // Nobody waiting, so position 2 stays vacant
    let outcome = r.reply(2, Reply::Out).await;
    assert!(outcome.promotion.is_none());

    let late = r.reply(4, IN).await;
    assert_eq!(late.placement, Placement::Confirmed { position: 4 });
}

#[tokio::test]
async fn test_promotion_fills_lowest_vacancy_first() {
    let r = roster(5, 3).await;
    for n in 1..=3 {
        r.reply(n, IN).await;
    }
    // Leaves position 1 vacant with nobody waiting
    r.reply(1, Reply::Out).await;

    r.reply(4, IN).await;
    r.reply(5, IN).await;
    assert_eq!(r.position_of(4).await, Some(4));

    // Position 3 frees up, but the lowest vacancy is 1
    let outcome = r.reply(3, Reply::Out).await;
    let promotion = outcome.promotion.expect("G4 should be promoted");
    assert_eq!(promotion.to_position, 1);
    assert_eq!(r.position_of(4).await, Some(1));
    assert_eq!(r.position_of(5).await, Some(5));
}

#[tokio::test]
async fn test_in_with_guests_takes_consecutive_positions() {
    let r = roster(1, 16).await;

    let outcome = r.reply(1, Reply::In { guests: 2 }).await;
    assert_eq!(outcome.placement, Placement::Confirmed { position: 1 });
    assert_eq!(outcome.guests, 2);
    assert!(outcome.message.contains("Plus 2 guests"));

    let mut conn = r.engine.pool().acquire().await.unwrap();
    let guests = responses::guests_for_host(&mut conn, r.event.id, r.g(1).id)
        .await
        .unwrap();
    drop(conn);
    let positions: Vec<u32> = guests.iter().map(|g| g.position).collect();
    assert_eq!(positions, vec![2, 3]);

    let summary = build_summary(r.engine.pool(), r.event.id).await.unwrap();
    assert_eq!(summary.confirmed.len(), 3);
    assert_eq!(summary.confirmed[1].name, "G1's guest");
    assert_eq!(summary.confirmed[1].kind, EntryKind::Guest);
}

#[tokio::test]
async fn test_repeat_in_is_idempotent() {
    let r = roster(2, 16).await;
    r.reply(1, IN).await;
    r.reply(2, IN).await;

    let again = r.reply(1, IN).await;
    assert_eq!(again.change, Change::AlreadyIn);
    assert_eq!(again.placement, Placement::Confirmed { position: 1 });
    assert!(again.message.starts_with("You're already in"));
    assert_eq!(r.position_of(1).await, Some(1));
}

#[tokio::test]
async fn test_reducing_guests_removes_highest_without_promotion() {
    let r = roster(4, 4).await;
    r.reply(1, Reply::In { guests: 2 }).await; // 1, guests 2 3
    r.reply(2, IN).await; // 4
    r.reply(3, IN).await; // 5, waitlisted

    let outcome = r.reply(1, Reply::In { guests: 1 }).await;
    assert_eq!(outcome.change, Change::GuestsUpdated { from: 2, to: 1 });
    assert!(outcome.promotion.is_none());

    let mut conn = r.engine.pool().acquire().await.unwrap();
    let guests = responses::guests_for_host(&mut conn, r.event.id, r.g(1).id)
        .await
        .unwrap();
    drop(conn);
    assert_eq!(guests.len(), 1);
    assert_eq!(guests[0].position, 2);

    // The freed position 3 is not handed to the waitlist
    assert_eq!(r.position_of(3).await, Some(5));
}

#[tokio::test]
async fn test_out_releases_guests_and_promotes_one() {
    let r = roster(3, 3).await;
    r.reply(1, Reply::In { guests: 1 }).await; // 1, guest 2
    r.reply(2, IN).await; // 3
    r.reply(3, IN).await; // 4, waitlisted

    let outcome = r.reply(1, Reply::Out).await;
    assert_eq!(outcome.change, Change::Left { released_guests: 1 });
    assert!(outcome.message.contains("1 guest was released"));

    let promotion = outcome.promotion.expect("G3 should be promoted");
    assert_eq!(promotion.to_position, 1);
    assert_eq!(r.position_of(3).await, Some(1));
}

#[tokio::test]
async fn test_promoted_guest_notifies_host() {
    let r = roster(3, 2).await;
    r.reply(1, IN).await; // 1
    r.reply(2, IN).await; // 2
    r.reply(3, Reply::In { guests: 1 }).await; // 3, guest 4

    // G3 is promoted first; the guest stays waitlisted
    let first = r.reply(1, Reply::Out).await;
    let promotion = first.promotion.unwrap();
    assert!(!promotion.is_guest());

    let second = r.reply(2, Reply::Out).await;
    let promotion = second.promotion.expect("guest should be promoted");
    assert!(promotion.is_guest());
    assert_eq!(promotion.to_position, 2);
    assert_eq!(second.notifications.len(), 1);
    assert_eq!(second.notifications[0].to, r.g(3).phone);
    assert!(second.notifications[0].body.contains("Your guest is now confirmed"));
}

#[tokio::test]
async fn test_out_without_prior_in() {
    let r = roster(1, 16).await;

    let outcome = r.reply(1, Reply::Out).await;
    assert_eq!(outcome.change, Change::AlreadyOut);
    assert!(outcome.promotion.is_none());

    let summary = build_summary(r.engine.pool(), r.event.id).await.unwrap();
    assert_eq!(summary.out.len(), 1);
    assert!(summary.no_response.is_empty());
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let r = roster(1, 16).await;
    let result = r.engine.record_response(r.g(1), 9999, IN).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_opening_new_event_closes_previous() {
    let r = roster(1, 16).await;

    let next = r
        .engine
        .open_event(&NewEvent {
            date: NaiveDate::from_ymd_opt(2025, 12, 7).unwrap(),
            course: "Blue".to_string(),
            tee_times: vec!["9:00 AM".to_string()],
            capacity: 16,
        })
        .await
        .unwrap();

    let current = r.engine.current_event().await.unwrap().unwrap();
    assert_eq!(current.id, next.id);
    assert_ne!(current.id, r.event.id);

    assert!(r.engine.close_event(next.id).await.unwrap());
    assert!(!r.engine.close_event(next.id).await.unwrap());
    assert!(r.engine.current_event().await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_for_reports_guests() {
    let r = roster(2, 2).await;
    r.reply(1, IN).await;
    r.reply(2, Reply::In { guests: 1 }).await;

    let status = r.engine.status_for(r.g(2), r.event.id).await.unwrap();
    assert_eq!(status.placement, Some(Placement::Confirmed { position: 2 }));
    assert_eq!(status.guests, vec![Placement::Waitlisted { position: 3, rank: 1 }]);

    let nobody = r.engine.status_for(r.g(1), r.event.id).await.unwrap();
    assert_eq!(nobody.placement, Some(Placement::Confirmed { position: 1 }));
    assert!(nobody.guests.is_empty());
}

/// Every occupied position for the event, ascending
async fn occupied_positions(r: &Roster) -> Vec<u32> {
    let mut conn = r.engine.pool().acquire().await.unwrap();
    responses::positioned_slots(&mut conn, r.event.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.position)
        .collect()
}

#[tokio::test]
async fn test_guest_limit_is_enforced() {
    let r = roster(2, 16).await;

    for guests in [MAX_GUESTS + 1, 500, u32::MAX] {
        let result = r.engine.record_response(r.g(1), r.event.id, Reply::In { guests }).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))), "{} guests", guests);
    }
    assert_eq!(r.position_of(1).await, None);
    assert!(occupied_positions(&r).await.is_empty());

    let outcome = r.reply(1, Reply::In { guests: MAX_GUESTS }).await;
    assert_eq!(outcome.guests, MAX_GUESTS);
    assert_eq!(occupied_positions(&r).await, vec![1, 2, 3, 4]);

    // A rejected update leaves the existing entry alone
    let result = r.engine.record_response(r.g(1), r.event.id, Reply::In { guests: 9 }).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(occupied_positions(&r).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_waitlisted_behind_vacancy_is_not_told_full() {
    let r = roster(4, 3).await;
    for n in 1..=3 {
        r.reply(n, IN).await;
    }
    r.reply(2, Reply::Out).await;

    // Position 2 is vacant but the newcomer still lands past capacity
    let late = r.reply(4, IN).await;
    assert_eq!(late.placement, Placement::Waitlisted { position: 4, rank: 1 });
    assert_eq!(
        late.message,
        "Waitlisted for Sun Nov 30 at Red. You're #1 on the waitlist. We'll text you if a spot opens."
    );
    assert!(!late.message.contains("full"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ins_get_unique_positions() {
    let dir = TempDir::new().unwrap();
    let r = file_roster(&dir, 10, 16).await;

    let handles: Vec<_> = (1..=10)
        .map(|n| {
            let engine = r.engine.clone();
            let golfer = r.g(n).clone();
            let event_id = r.event.id;
            tokio::spawn(async move { engine.record_response(&golfer, event_id, IN).await })
        })
        .collect();

    let mut positions = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        positions.push(outcome.placement.position().unwrap());
    }
    positions.sort_unstable();
    assert_eq!(positions, (1..=10).collect::<Vec<u32>>());
    assert_eq!(occupied_positions(&r).await, positions);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_racing_new_entrants_promotes_once() {
    let dir = TempDir::new().unwrap();
    let r = file_roster(&dir, 12, 4).await;

    // G1..G4 confirmed, G5 and G6 waitlisted
    for n in 1..=6 {
        r.reply(n, IN).await;
    }

    let cancel = {
        let engine = r.engine.clone();
        let golfer = r.g(1).clone();
        let event_id = r.event.id;
        tokio::spawn(async move { engine.record_response(&golfer, event_id, Reply::Out).await })
    };
    let entrants: Vec<_> = (7..=12)
        .map(|n| {
            let engine = r.engine.clone();
            let golfer = r.g(n).clone();
            let event_id = r.event.id;
            tokio::spawn(async move { engine.record_response(&golfer, event_id, IN).await })
        })
        .collect();

    let cancelled = cancel.await.unwrap().unwrap();
    let promotion = cancelled.promotion.expect("G5 should be promoted");
    assert_eq!((promotion.from_position, promotion.to_position), (5, 1));

    let mut entrant_positions = Vec::new();
    for handle in entrants {
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.promotion.is_none());
        entrant_positions.push(outcome.placement.position().unwrap());
    }
    entrant_positions.sort_unstable();
    assert_eq!(entrant_positions, (7..=12).collect::<Vec<u32>>());

    let occupied = occupied_positions(&r).await;
    let unique: HashSet<u32> = occupied.iter().copied().collect();
    assert_eq!(unique.len(), occupied.len());
    assert_eq!(occupied.iter().filter(|&&p| p <= 4).count(), 4);

    assert_eq!(r.position_of(1).await, None);
    assert_eq!(r.position_of(5).await, Some(1));
    assert_eq!(r.position_of(6).await, Some(6));
}
