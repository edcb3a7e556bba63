//! Unit tests for `heart-beat` header parsing and negotiation.

use stomp_socket::{negotiate_heartbeats, parse_heartbeat_header};
use std::time::Duration;

// =============================================================================
// parse_heartbeat_header
// =============================================================================

#[test]
fn parse_standard_pair() {
    assert_eq!(parse_heartbeat_header("10000,10000"), (10000, 10000));
    assert_eq!(parse_heartbeat_header("5000,15000"), (5000, 15000));
}

#[test]
fn parse_trims_whitespace() {
    assert_eq!(parse_heartbeat_header(" 10000 , 2000 "), (10000, 2000));
    assert_eq!(parse_heartbeat_header("\t5000\t,\t5000\t"), (5000, 5000));
}

#[test]
fn parse_missing_or_invalid_fields_default_to_zero() {
    assert_eq!(parse_heartbeat_header("10000"), (10000, 0));
    assert_eq!(parse_heartbeat_header("10000,"), (10000, 0));
    assert_eq!(parse_heartbeat_header(",10000"), (0, 10000));
    assert_eq!(parse_heartbeat_header(""), (0, 0));
    assert_eq!(parse_heartbeat_header("abc,xyz"), (0, 0));
    assert_eq!(parse_heartbeat_header("-5,100"), (0, 100));
}

#[test]
fn parse_ignores_extra_fields() {
    assert_eq!(parse_heartbeat_header("1,2,3"), (1, 2));
}

// =============================================================================
// negotiate_heartbeats
// =============================================================================

#[test]
fn negotiate_all_zero_disables_both() {
    assert_eq!(negotiate_heartbeats(0, 0, 0, 0), (None, None));
}

#[test]
fn negotiate_takes_max_of_each_pair() {
    let (out, inc) = negotiate_heartbeats(5000, 15000, 3000, 20000);
    // outgoing: max(client cx, server sy), incoming: max(client cy, server sx)
    assert_eq!(out, Some(Duration::from_millis(20000)));
    assert_eq!(inc, Some(Duration::from_millis(15000)));
}

#[test]
fn negotiate_server_zero_disables() {
    assert_eq!(negotiate_heartbeats(10000, 10000, 0, 0), (None, None));
}

#[test]
fn negotiate_client_zero_disables() {
    assert_eq!(negotiate_heartbeats(0, 0, 10000, 10000), (None, None));
}

#[test]
fn negotiate_outgoing_only() {
    let (out, inc) = negotiate_heartbeats(10000, 0, 0, 4000);
    assert_eq!(out, Some(Duration::from_millis(10000)));
    assert_eq!(inc, None);
}

#[test]
fn negotiate_incoming_only() {
    let (out, inc) = negotiate_heartbeats(0, 10000, 8000, 0);
    assert_eq!(out, None);
    assert_eq!(inc, Some(Duration::from_millis(10000)));
}

#[test]
fn negotiate_one_millisecond() {
    let (out, inc) = negotiate_heartbeats(1, 1, 1, 1);
    assert_eq!(out, Some(Duration::from_millis(1)));
    assert_eq!(inc, Some(Duration::from_millis(1)));
}
