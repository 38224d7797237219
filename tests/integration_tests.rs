//! Integration tests for the rumble lobby service
//!
//! These drive the command handler end to end: join, ready, start, leave,
//! finish and cancel, checking replies, published events and registry state.

mod fixtures;

use rumble_lobby::metrics::MetricsCollector;
use rumble_lobby::types::{CloseReason, MatchStatus, RumbleEvent, Team};
use rumble_lobby::{CommandHandler, MatchRegistry, RumbleCommand};
use std::sync::Arc;
use std::time::Duration;

use fixtures::{
    create_test_system, finish, join, leave, player_ids, ready, start, status,
    FailingEventPublisher,
};

#[tokio::test]
async fn test_complete_rumble_workflow() {
    let (handler, registry, publisher) = create_test_system();
    let players = player_ids("p", 4);

    for player in &players {
        assert!(handler.handle(join("guild", player)).await.ok);
    }

    let view = registry.view("guild").await.unwrap();
    assert_eq!(view.red_count, 2);
    assert_eq!(view.blue_count, 2);
    assert!(!view.can_start);

    // Three of four ready is not enough
    for player in &players[..3] {
        assert!(handler.handle(ready("guild", player)).await.ok);
    }
    let reply = handler.handle(start("guild")).await;
    assert!(!reply.ok);
    assert!(reply.message.contains("1 player"));
    assert_eq!(publisher.count_events_of_type("MatchStarting"), 0);

    assert!(handler.handle(ready("guild", &players[3])).await.ok);
    let reply = handler.handle(start("guild")).await;
    assert!(reply.ok);

    let roster = reply.roster.unwrap();
    assert_eq!(roster.teams.len(), 4);
    assert_eq!(roster.members(Team::Red).len(), 2);
    assert_eq!(roster.members(Team::Blue).len(), 2);

    let events = publisher.get_published_events();
    match &events[0] {
        RumbleEvent::MatchStarting(event) => assert_eq!(event.roster, roster),
        other => panic!("expected MatchStarting, got {:?}", other),
    }

    // No late joiners, no ready toggles once started
    let reply = handler.handle(join("guild", "late")).await;
    assert_eq!(reply.error.as_deref(), Some("wrong_status"));
    let reply = handler.handle(ready("guild", &players[0])).await;
    assert_eq!(reply.error.as_deref(), Some("wrong_status"));

    assert!(handler.handle(finish("guild")).await.ok);
    assert!(registry.view("guild").await.is_none());

    // The next join opens a fresh lobby
    assert!(handler.handle(join("guild", "p_0")).await.ok);
    let fresh = registry.view("guild").await.unwrap();
    assert_eq!(fresh.status, MatchStatus::Waiting);
    assert_ne!(fresh.match_id, roster.match_id);
}

#[tokio::test]
async fn test_uneven_teams_block_start() {
    let (handler, _registry, _publisher) = create_test_system();

    for player in player_ids("p", 3) {
        handler.handle(join("guild", &player)).await;
        handler.handle(ready("guild", &player)).await;
    }

    let reply = handler.handle(start("guild")).await;
    assert!(!reply.ok);
    assert_eq!(reply.error.as_deref(), Some("not_ready"));
    assert!(reply.message.to_lowercase().contains("even"));
}

#[tokio::test]
async fn test_start_without_lobby() {
    let (handler, _registry, _publisher) = create_test_system();

    let reply = handler.handle(start("nowhere")).await;
    assert!(!reply.ok);
    assert_eq!(reply.error.as_deref(), Some("not_found"));

    let reply = handler.handle(status("nowhere")).await;
    assert_eq!(reply.error.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn test_empty_lobby_cannot_start() {
    let (handler, registry, _publisher) = create_test_system();
    registry.get_or_create("guild").await;

    let reply = handler.handle(start("guild")).await;
    assert_eq!(reply.error.as_deref(), Some("not_ready"));
}

#[tokio::test]
async fn test_unready_leaves_lobby_blocked() {
    let (handler, _registry, _publisher) = create_test_system();
    for player in ["alice", "bob"] {
        handler.handle(join("guild", player)).await;
        handler.handle(ready("guild", player)).await;
    }

    let reply = handler.handle(ready("guild", "bob")).await;
    assert!(reply.ok);
    assert!(reply.message.contains("no longer ready"));
    assert!(!reply.view.unwrap().can_start);

    assert!(!handler.handle(start("guild")).await.ok);
}

#[tokio::test]
async fn test_leave_rebalances_future_joins() {
    let (handler, registry, _publisher) = create_test_system();
    for player in ["a", "b", "c", "d"] {
        handler.handle(join("guild", player)).await;
    }

    // a and c are RED; removing both leaves RED short
    handler.handle(leave("guild", "a")).await;
    handler.handle(leave("guild", "c")).await;

    handler.handle(join("guild", "e")).await;
    let view = registry.view("guild").await.unwrap();
    let e = view.players.iter().find(|p| p.player_id == "e").unwrap();
    assert_eq!(e.team, Team::Red);
}

#[tokio::test]
async fn test_leave_unknown_player() {
    let (handler, registry, publisher) = create_test_system();
    handler.handle(join("guild", "alice")).await;

    let reply = handler.handle(leave("guild", "ghost")).await;
    assert_eq!(reply.error.as_deref(), Some("not_member"));
    assert_eq!(registry.active_count(), 1);
    assert!(publisher.get_published_events().is_empty());
}

#[tokio::test]
async fn test_forfeit_keeps_match_running() {
    let (handler, registry, publisher) = create_test_system();
    for player in ["alice", "bob"] {
        handler.handle(join("guild", player)).await;
        handler.handle(ready("guild", player)).await;
    }
    assert!(handler.handle(start("guild")).await.ok);

    handler.handle(leave("guild", "alice")).await;
    handler.handle(leave("guild", "bob")).await;

    // Nobody left, but the match is still in progress until finished
    let view = registry.view("guild").await.unwrap();
    assert_eq!(view.status, MatchStatus::InProgress);
    assert_eq!(view.player_count(), 0);
    assert_eq!(publisher.count_events_of_type("PlayerLeftMatch"), 2);

    let forfeits: Vec<_> = publisher
        .get_published_events()
        .into_iter()
        .filter_map(|event| match event {
            RumbleEvent::PlayerLeftMatch(left) => Some(left),
            _ => None,
        })
        .collect();
    assert!(forfeits.iter().all(|left| left.departure.forced_forfeit));
    assert_eq!(forfeits[1].remaining_players, 0);

    assert!(handler.handle(finish("guild")).await.ok);
}

#[tokio::test]
async fn test_finish_requires_in_progress() {
    let (handler, registry, _publisher) = create_test_system();
    handler.handle(join("guild", "alice")).await;

    let reply = handler.handle(finish("guild")).await;
    assert_eq!(reply.error.as_deref(), Some("not_in_progress"));
    assert_eq!(registry.active_count(), 1);
}

#[tokio::test]
async fn test_cancel_in_progress_match() {
    let (handler, registry, publisher) = create_test_system();
    for player in ["alice", "bob"] {
        handler.handle(join("guild", player)).await;
        handler.handle(ready("guild", player)).await;
    }
    handler.handle(start("guild")).await;

    let reply = handler
        .handle(RumbleCommand::Cancel {
            server_id: "guild".to_string(),
        })
        .await;
    assert!(reply.ok);
    assert_eq!(registry.active_count(), 0);

    let closed = publisher
        .get_published_events()
        .into_iter()
        .find_map(|event| match event {
            RumbleEvent::MatchClosed(closed) => Some(closed),
            _ => None,
        })
        .unwrap();
    assert_eq!(closed.reason, CloseReason::Abandoned);
}

#[tokio::test]
async fn test_servers_are_isolated() {
    let (handler, registry, _publisher) = create_test_system();

    for player in ["alice", "bob"] {
        handler.handle(join("one", player)).await;
        handler.handle(ready("one", player)).await;
    }
    handler.handle(join("two", "alice")).await;

    assert!(handler.handle(start("one")).await.ok);

    let two = registry.view("two").await.unwrap();
    assert_eq!(two.status, MatchStatus::Waiting);
    assert_eq!(two.player_count(), 1);
    assert_eq!(registry.active_count(), 2);
}

#[tokio::test]
async fn test_sweep_leaves_running_matches() {
    let (handler, registry, publisher) = create_test_system();
    for player in ["alice", "bob"] {
        handler.handle(join("busy", player)).await;
        handler.handle(ready("busy", player)).await;
    }
    handler.handle(start("busy")).await;
    registry.get_or_create("quiet").await;

    assert_eq!(handler.sweep(Duration::ZERO).await, 1);
    assert!(registry.view("busy").await.is_some());
    assert!(registry.view("quiet").await.is_none());
    assert_eq!(publisher.count_events_of_type("MatchClosed"), 1);
}

#[tokio::test]
async fn test_publish_failures_do_not_fail_commands() {
    let registry = Arc::new(MatchRegistry::new());
    let publisher = Arc::new(FailingEventPublisher::new());
    let handler = CommandHandler::new(
        registry.clone(),
        publisher.clone(),
        Arc::new(MetricsCollector::new().unwrap()),
    );

    for player in ["alice", "bob"] {
        handler.handle(join("guild", player)).await;
        handler.handle(ready("guild", player)).await;
    }

    assert!(handler.handle(start("guild")).await.ok);
    assert!(handler.handle(finish("guild")).await.ok);
    assert_eq!(publisher.attempts(), 2);
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn test_registry_stats_track_lifecycle() {
    let (handler, registry, _publisher) = create_test_system();
    for player in ["alice", "bob"] {
        handler.handle(join("guild", player)).await;
        handler.handle(ready("guild", player)).await;
    }
    handler.handle(start("guild")).await;
    handler.handle(finish("guild")).await;

    handler.handle(join("other", "carol")).await;
    handler.handle(leave("other", "carol")).await;

    let stats = registry.stats().await;
    assert_eq!(stats.matches_created, 2);
    assert_eq!(stats.matches_started, 1);
    assert_eq!(stats.matches_finished, 1);
    assert_eq!(stats.matches_reaped, 1);
    assert_eq!(stats.active_matches, 0);
}
