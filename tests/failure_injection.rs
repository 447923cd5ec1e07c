//! Backends that are down, malformed or misbehaving.

use std::sync::Arc;

use l7_balancer::load_balancer::{BackendId, LeastLoadedRouter, RoutingStrategy};

mod common;

#[test]
fn empty_strategy_closes_client_without_bytes() {
    let balancer = common::start_balancer(Arc::new(LeastLoadedRouter::new()), 2);
    assert!(common::send_request(balancer.local_addr(), b"GET / HTTP/1.1\n\n").is_empty());
    balancer.stop().unwrap();
}

#[test]
fn malformed_backend_address_yields_nothing_and_keeps_load() {
    let router = Arc::new(LeastLoadedRouter::new());
    let bad = BackendId::from("badaddress");
    router.add_server(bad.clone());
    let balancer = common::start_balancer(router.clone(), 2);

    for _ in 0..3 {
        assert!(common::send_request(balancer.local_addr(), b"GET / HTTP/1.1\n\n").is_empty());
    }
    // Never relieved: the head was never relayed.
    assert_eq!(router.load_of(&bad), Some(3));
    balancer.stop().unwrap();
}

#[test]
fn dead_backend_does_not_poison_the_balancer() {
    let live = common::start_direct_backend();
    let dead = common::dead_address();

    let router = Arc::new(LeastLoadedRouter::new());
    router.add_server(BackendId::from(dead.to_string()));
    router.add_server(BackendId::from(live.local_addr().to_string()));
    let balancer = common::start_balancer(router.clone(), 2);

    let dead_id = BackendId::from(dead.to_string());

    // First pick is the dead backend: connect fails, client sees EOF.
    assert!(common::send_request(balancer.local_addr(), b"k\n\n").is_empty());
    assert_eq!(router.load_of(&dead_id), Some(1));

    // The dead backend keeps its load, so the live one now wins every time.
    for _ in 0..3 {
        let response = common::get(balancer.local_addr(), "k");
        assert!(response.ends_with(&format!("Hello from the server {}\n", live.local_addr().port())));
    }
    assert_eq!(router.load_of(&dead_id), Some(1));

    balancer.stop().unwrap();
    live.stop().unwrap();
}

#[test]
fn backend_closing_without_reply_gives_empty_response() {
    let silent = common::start_silent_backend();
    let router = Arc::new(LeastLoadedRouter::new());
    let id = BackendId::from(silent.to_string());
    router.add_server(id.clone());
    let balancer = common::start_balancer(router.clone(), 2);

    assert!(common::send_request(balancer.local_addr(), b"GET / HTTP/1.1\n\n").is_empty());
    // Relief depends on whether the head write raced the backend's close.
    assert!(matches!(router.load_of(&id), Some(0) | Some(1)));
    balancer.stop().unwrap();
}

#[test]
fn client_hanging_up_early_is_harmless() {
    let live = common::start_direct_backend();
    let router = Arc::new(LeastLoadedRouter::new());
    router.add_server(BackendId::from(live.local_addr().to_string()));
    let balancer = common::start_balancer(router, 1);

    assert!(common::send_request(balancer.local_addr(), b"").is_empty());
    let response = common::get(balancer.local_addr(), "GET / HTTP/1.1");
    assert!(response.starts_with("HTTP/1.1 200 OK\n"));

    balancer.stop().unwrap();
    live.stop().unwrap();
}
