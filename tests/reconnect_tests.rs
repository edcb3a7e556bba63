//! Reconnect supervision tests.
//!
//! These tests verify:
//! - failed opens are retried with the original endpoint and headers
//! - an unexpected close triggers a fresh session
//! - `disconnect()` cancels pending retries
//! - exhausted policies stop retrying
//! - a broker that never answers CONNECT is treated as a failed transport

mod common;

use common::*;
use std::time::Duration;
use stomp_socket::{AckMode, FixedInterval, SessionStatus, StompEvent, TransportError};

fn is_error(event: &StompEvent) -> bool {
    matches!(event, StompEvent::Error { .. })
}

#[tokio::test]
async fn reconnects_after_two_failed_opens() {
    let (client, mut events, mut broker) = client(config());
    broker.fail_next(2);
    client.connect().await.unwrap();

    assert!(is_error(&next_event(&mut events).await));
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 1 }
    );
    assert!(is_error(&next_event(&mut events).await));
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 2 }
    );
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);

    let mut conn = broker.next_connection().await;
    let connect = conn.recv_frame().await;
    assert_eq!(connect.get_header("login"), Some("guest"));
    assert_eq!(connect.get_header("accept-version"), Some("1.2"));
    conn.send_frame(stomp_socket::Frame::new("CONNECTED")).await;
    assert!(matches!(
        next_event(&mut events).await,
        StompEvent::Connected { .. }
    ));

    assert_eq!(broker.attempts(), 3);
    assert!(broker.urls().iter().all(|u| u == "ws://broker.test/ws"));
    assert!(client.is_connected());
}

#[tokio::test]
async fn unexpected_close_starts_fresh_session() {
    let (client, mut events, mut broker, conn) = connected(config()).await;
    let (handler, mut rx) = recorder();
    client.subscribe("/topic/a", AckMode::Auto, handler).await.unwrap();

    conn.close(None).await;
    assert_eq!(next_event(&mut events).await, StompEvent::Disconnected);
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 1 }
    );

    let (conn, connect) = broker.accept().await;
    assert_eq!(connect.get_header("login"), Some("guest"));
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);
    assert!(matches!(
        next_event(&mut events).await,
        StompEvent::Connected { .. }
    ));
    // Subscriptions do not survive the old session.
    assert_eq!(client.status(), SessionStatus::Connected);
    conn.send_message("/topic/a", "1", "after reconnect").await;
    conn.send_text("\n").await;
    wait_for(&mut events, |e| *e == StompEvent::Ping).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn close_with_error_reports_error_first() {
    let (_client, mut events, _broker, conn) = connected(config()).await;
    conn.close(Some(TransportError::Io("reset by peer".into()))).await;
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Error {
            message: "io: reset by peer".into(),
            detail: None
        }
    );
    assert_eq!(next_event(&mut events).await, StompEvent::Disconnected);
}

#[tokio::test]
async fn attempt_counter_resets_after_connected() {
    let (client, mut events, mut broker) = client(config());
    broker.fail_next(1);
    client.connect().await.unwrap();
    wait_for(&mut events, |e| *e == StompEvent::Reconnecting { attempt: 1 }).await;
    let (conn, _) = broker.accept().await;
    wait_for(&mut events, |e| matches!(e, StompEvent::Connected { .. })).await;

    conn.close(None).await;
    wait_for(&mut events, |e| *e == StompEvent::Disconnected).await;
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 1 }
    );
}

#[tokio::test]
async fn disconnect_cancels_pending_retries() {
    let (client, mut events, mut broker) = client(config());
    broker.fail_next(usize::MAX);
    client.connect().await.unwrap();
    wait_for(&mut events, |e| *e == StompEvent::Reconnecting { attempt: 1 }).await;

    client.disconnect().await.unwrap();
    let attempts = broker.attempts();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(broker.attempts(), attempts);
    assert!(broker.no_connection_within(Duration::from_millis(10)).await);
    assert_eq!(client.status(), SessionStatus::Disconnected);

    // No transport was open, so there is nothing to report as torn down.
    while let Some(event) = events.try_next() {
        assert_ne!(event, StompEvent::Disconnected);
    }
}

#[tokio::test]
async fn exhausted_policy_stops() {
    let config = config().reconnect_policy(FixedInterval::new(Duration::from_millis(10), Some(2)));
    let (client, mut events, broker) = client(config);
    broker.fail_next(usize::MAX);
    client.connect().await.unwrap();

    assert!(is_error(&next_event(&mut events).await));
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 1 }
    );
    assert!(is_error(&next_event(&mut events).await));
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 2 }
    );
    assert!(is_error(&next_event(&mut events).await));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(broker.attempts(), 3);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn no_reconnect_policy_stays_down() {
    let (_client, mut events, mut broker, conn) = connected(config().no_reconnect()).await;
    conn.close(None).await;
    assert_eq!(next_event(&mut events).await, StompEvent::Disconnected);
    assert!(broker.no_connection_within(Duration::from_millis(100)).await);
    assert_eq!(broker.attempts(), 1);
}

#[tokio::test]
async fn connect_after_exhaustion_starts_again() {
    let config = config().reconnect_policy(FixedInterval::new(Duration::from_millis(5), Some(0)));
    let (client, mut events, mut broker) = client(config);
    broker.fail_next(1);
    client.connect().await.unwrap();
    assert!(is_error(&next_event(&mut events).await));
    assert!(broker.no_connection_within(Duration::from_millis(50)).await);

    client.connect().await.unwrap();
    let _ = broker.accept().await;
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);
}

#[tokio::test]
async fn unanswered_connect_times_out_and_retries() {
    let config = config().handshake_timeout(Duration::from_millis(50));
    let (client, mut events, mut broker) = client(config);
    client.connect().await.unwrap();

    let mut conn = broker.next_connection().await;
    assert_eq!(conn.recv_frame().await.command, "CONNECT");
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);
    assert_eq!(client.status(), SessionStatus::SocketOpen);

    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Error {
            message: "io: handshake timeout".into(),
            detail: None
        }
    );
    assert_eq!(next_event(&mut events).await, StompEvent::Disconnected);
    assert!(conn.is_closed());
    assert_eq!(
        next_event(&mut events).await,
        StompEvent::Reconnecting { attempt: 1 }
    );

    let _ = broker.accept().await;
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);
    assert!(matches!(
        next_event(&mut events).await,
        StompEvent::Connected { .. }
    ));
}
