//! Presence transitions: derived status, persisted mirror and the
//! once-per-transition broadcast guarantee.

mod common;

use common::{status_events, TestHarness};
use pretty_assertions::assert_eq;
use room_chat::domain::PresenceStatus;

#[tokio::test]
async fn first_connection_broadcasts_online_exactly_once() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);

    let (_c1, _rx1, first) = h.connect(1);
    assert!(first);
    h.presence.on_connection_added(1, first).await.unwrap();

    // A second tab does not re-announce.
    let (_c2, _rx2, first) = h.connect(1);
    assert!(!first);
    h.presence.on_connection_added(1, first).await.unwrap();

    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![PresenceStatus::Online]
    );
    assert_eq!(h.users.status_of(1), Some(PresenceStatus::Online));
}

#[tokio::test]
async fn only_the_last_disconnect_broadcasts_offline() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);

    let (c1, _rx1, first) = h.connect(1);
    h.presence.on_connection_added(1, first).await.unwrap();
    let (c2, _rx2, _) = h.connect(1);

    let (_, last) = h.registry.unregister(&c1.session_id).unwrap();
    assert!(!last);
    h.presence.on_connection_removed(1, last).await.unwrap();

    let (_, last) = h.registry.unregister(&c2.session_id).unwrap();
    assert!(last);
    h.presence.on_connection_removed(1, last).await.unwrap();

    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![PresenceStatus::Online, PresenceStatus::Offline]
    );
    assert_eq!(h.users.status_of(1), Some(PresenceStatus::Offline));
}

#[tokio::test]
async fn game_signal_overrides_online() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);

    let (_c1, _rx1, first) = h.connect(1);
    h.presence.on_connection_added(1, first).await.unwrap();

    h.presence.on_game_started(1).await.unwrap();
    assert_eq!(h.presence.status_of(1), PresenceStatus::InGame);

    h.presence.on_game_ended(1).await.unwrap();
    assert_eq!(h.presence.status_of(1), PresenceStatus::Online);

    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![
            PresenceStatus::Online,
            PresenceStatus::InGame,
            PresenceStatus::Online
        ]
    );
}

#[tokio::test]
async fn duplicate_game_signals_broadcast_once() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);
    let (_c1, _rx1, first) = h.connect(1);
    h.presence.on_connection_added(1, first).await.unwrap();
    status_events(&mut observer_rx, 1);

    h.presence.on_game_started(1).await.unwrap();
    h.presence.on_game_started(1).await.unwrap();
    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![PresenceStatus::InGame]
    );

    h.presence.on_game_ended(1).await.unwrap();
    h.presence.on_game_ended(1).await.unwrap();
    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![PresenceStatus::Online]
    );
}

#[tokio::test]
async fn game_end_while_disconnected_resolves_to_offline() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);

    let (c1, _rx1, first) = h.connect(1);
    h.presence.on_connection_added(1, first).await.unwrap();
    h.presence.on_game_started(1).await.unwrap();

    // The game signal keeps the user In-Game across the disconnect.
    let (_, last) = h.registry.unregister(&c1.session_id).unwrap();
    h.presence.on_connection_removed(1, last).await.unwrap();
    assert_eq!(h.presence.status_of(1), PresenceStatus::InGame);

    h.presence.on_game_ended(1).await.unwrap();
    assert_eq!(h.presence.status_of(1), PresenceStatus::Offline);

    assert_eq!(
        status_events(&mut observer_rx, 1),
        vec![
            PresenceStatus::Online,
            PresenceStatus::InGame,
            PresenceStatus::InGame,
            PresenceStatus::Offline
        ]
    );
}

#[tokio::test]
async fn status_queries_never_broadcast() {
    let h = TestHarness::new();
    let (_observer, mut observer_rx, _) = h.connect(9);

    assert_eq!(h.presence.status_of(42), PresenceStatus::Offline);
    assert!(status_events(&mut observer_rx, 42).is_empty());
}
