//! Concurrency tests for the match registry
//!
//! Many tasks hammer the registry at once; these check that per-server
//! serialization keeps every lobby invariant intact and that servers never
//! wait on each other.

mod fixtures;

use futures::future::join_all;
use rumble_lobby::types::{MatchStatus, Team};
use rumble_lobby::MatchRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{fill_ready, player_ids};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_yields_one_match() {
    let registry = Arc::new(MatchRegistry::new());

    let tasks = (0..50).map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.get_or_create("guild").await.match_id })
    });

    let ids: HashSet<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    assert_eq!(ids.len(), 1);
    assert_eq!(registry.active_count(), 1);
    assert_eq!(registry.stats().await.matches_created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_stay_balanced() {
    let registry = Arc::new(MatchRegistry::new());
    let players = player_ids("p", 100);

    let tasks = players.iter().cloned().map(|player| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.join_player("guild", &player).await })
    });

    let teams: Vec<Team> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap())
        .collect();

    assert_eq!(teams.iter().filter(|team| **team == Team::Red).count(), 50);

    let view = registry.view("guild").await.unwrap();
    assert_eq!(view.player_count(), 100);
    assert_eq!(view.red_count, 50);
    assert_eq!(view.blue_count, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_concurrent_joins_admit_once() {
    let registry = Arc::new(MatchRegistry::new());

    let tasks = (0..20).map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.join("guild", "alice").await })
    });

    let admitted = join_all(tasks)
        .await
        .into_iter()
        .filter(|result| *result.as_ref().unwrap())
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(registry.view("guild").await.unwrap().player_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_servers_do_not_block_each_other() {
    let registry = Arc::new(MatchRegistry::new());
    registry.join("slow", "alice").await;
    registry.join("fast", "bob").await;

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    // Hold the slow server's lock from a blocking closure
    let blocker = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry
                .with_match("slow", move |_rumble| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv_timeout(Duration::from_secs(5)).unwrap();
                })
                .await
                .unwrap();
        })
    };

    tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();

    let fast = tokio::time::timeout(Duration::from_secs(1), registry.join_player("fast", "carol"))
        .await
        .expect("other server should not wait on the held lock");
    assert_eq!(fast.unwrap(), Team::Red);

    release_tx.send(()).unwrap();
    blocker.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_racing_leave_keeps_invariants() {
    for round in 0..25 {
        let registry = Arc::new(MatchRegistry::new());
        let server = format!("guild_{}", round);
        let players = player_ids("p", 4);
        fill_ready(&registry, &server, &players).await;

        let starter = {
            let registry = registry.clone();
            let server = server.clone();
            tokio::spawn(async move { registry.start(&server).await })
        };
        let leaver = {
            let registry = registry.clone();
            let server = server.clone();
            tokio::spawn(async move { registry.remove_player(&server, "p_3").await })
        };

        let started = starter.await.unwrap();
        let left = leaver.await.unwrap().unwrap();
        let view = registry.view(&server).await.unwrap();

        match started {
            // Start won: the leave forfeited a running match
            Ok(roster) => {
                assert_eq!(roster.teams.len(), 4);
                assert!(left.departure.forced_forfeit);
                assert_eq!(view.status, MatchStatus::InProgress);
            }
            // Leave won: three players cannot make even teams
            Err(_) => {
                assert!(!left.departure.forced_forfeit);
                assert_eq!(view.status, MatchStatus::Waiting);
                assert_eq!(view.player_count(), 3);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_starts_admit_one() {
    let registry = Arc::new(MatchRegistry::new());
    fill_ready(&registry, "guild", &player_ids("p", 2)).await;

    let tasks = (0..10).map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.start("guild").await.is_ok() })
    });

    let started = join_all(tasks)
        .await
        .into_iter()
        .filter(|result| *result.as_ref().unwrap())
        .count();

    assert_eq!(started, 1);
    assert_eq!(registry.stats().await.matches_started, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_racing_last_leave_is_never_lost() {
    for round in 0..25 {
        let registry = Arc::new(MatchRegistry::new());
        let server = format!("guild_{}", round);
        registry.join(&server, "alice").await;

        let leaver = {
            let registry = registry.clone();
            let server = server.clone();
            tokio::spawn(async move { registry.leave(&server, "alice").await })
        };
        let joiner = {
            let registry = registry.clone();
            let server = server.clone();
            tokio::spawn(async move { registry.join_player(&server, "bob").await })
        };

        assert!(leaver.await.unwrap());
        assert!(joiner.await.unwrap().is_ok());

        // Whichever lobby bob landed in must still be registered
        let view = registry.view(&server).await.unwrap();
        assert!(view.players.iter().any(|p| p.player_id == "bob"));
    }
}
