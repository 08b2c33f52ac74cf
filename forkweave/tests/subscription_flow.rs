//! Subscribe/unsubscribe propagation across the split topology.

mod common;

use common::*;

use forkweave::dispatcher::NodeRole;
use forkweave::{Flow, FrameKind, PeerEvent, RoutedEvent, SENDER_DISPATCHER};
use forkweave_tunnel::wire::envelope_for_event;

fn subscribe_env(nonce: u64, f: forkweave::ForkId) -> forkweave::Envelope {
    envelope_for_event(&PeerEvent::Subscribe {
        nonce,
        fork: f,
        forks: vec![f],
    })
}

fn unsubscribe_env(nonce: u64, f: forkweave::ForkId) -> forkweave::Envelope {
    envelope_for_event(&PeerEvent::Unsubscribe {
        nonce,
        fork: f,
        forks: vec![f],
    })
}

#[test]
fn root_forwards_first_and_last_child_subscription_only() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let _a = attach_child(&harness, 1);
    let _b = attach_child(&harness, 2);
    let f = fork(0xaa);

    // A subscribes: the 0 -> 1 transition goes upstream.
    child_frame(&harness, 1, subscribe_env(7, f));
    let routed = recv(&harness.peer_rx);
    assert_eq!(routed.flow, Flow::Up);
    assert_eq!(routed.sender, SENDER_DISPATCHER);
    match routed.event {
        PeerEvent::Subscribe { nonce, forks, .. } => {
            assert_eq!(nonce, 7);
            assert_eq!(forks, vec![f]);
        }
        other => panic!("expected subscribe, got {other:?}"),
    }

    // B subscribes to the same key: no second upstream subscribe.
    child_frame(&harness, 2, subscribe_env(7, f));
    expect_quiet(&harness.peer_rx);

    // A unsubscribes: one holder remains, nothing upstream.
    child_frame(&harness, 1, unsubscribe_env(7, f));
    expect_quiet(&harness.peer_rx);

    // B unsubscribes: 1 -> 0 goes upstream.
    child_frame(&harness, 2, unsubscribe_env(7, f));
    let routed = recv(&harness.peer_rx);
    match routed.event {
        PeerEvent::Unsubscribe { forks, .. } => assert_eq!(forks, vec![f]),
        other => panic!("expected unsubscribe, got {other:?}"),
    }
}

#[test]
fn fork_node_relays_child_subscriptions_upstream_once() {
    let harness = spawn(NodeRole::Fork, &[], StubChain::default());
    let parent_rx = attach_parent(&harness);
    // Attaching the parent re-registers RPC interest.
    assert_eq!(recv(&parent_rx).kind, FrameKind::Sub);

    let _a = attach_child(&harness, 1);
    let _b = attach_child(&harness, 2);
    let f = fork(0xbb);

    child_frame(&harness, 1, subscribe_env(7, f));
    let up = recv(&parent_rx);
    assert_eq!(up.kind, FrameKind::Subscribe);
    assert_eq!(up.fork, f);

    // Second child holder: nothing further upstream.
    child_frame(&harness, 2, subscribe_env(7, f));
    expect_quiet(&parent_rx);

    child_frame(&harness, 2, unsubscribe_env(7, f));
    expect_quiet(&parent_rx);
    child_frame(&harness, 1, unsubscribe_env(7, f));
    assert_eq!(recv(&parent_rx).kind, FrameKind::Unsubscribe);
}

#[test]
fn fork_node_counts_local_subscriptions_separately() {
    let harness = spawn(NodeRole::Fork, &[], StubChain::default());
    let parent_rx = attach_parent(&harness);
    assert_eq!(recv(&parent_rx).kind, FrameKind::Sub);

    let f = fork(0xcc);
    let subscribe = PeerEvent::Subscribe {
        nonce: 3,
        fork: f,
        forks: vec![f],
    };

    // First local subscription goes up.
    harness
        .local_tx
        .send(RoutedEvent::new(subscribe.clone()))
        .unwrap();
    assert_eq!(recv(&parent_rx).kind, FrameKind::Subscribe);

    // A repeat from another local consumer is absorbed.
    harness.local_tx.send(RoutedEvent::new(subscribe)).unwrap();
    expect_quiet(&parent_rx);
}

#[test]
fn unsubscribe_of_unknown_key_is_not_fatal() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let _a = attach_child(&harness, 1);
    let f = fork(0xdd);

    child_frame(&harness, 1, unsubscribe_env(9, f));
    expect_quiet(&harness.peer_rx);

    // The dispatcher is still alive and routing.
    child_frame(&harness, 1, subscribe_env(9, f));
    let routed = recv(&harness.peer_rx);
    assert!(matches!(routed.event, PeerEvent::Subscribe { .. }));
}
