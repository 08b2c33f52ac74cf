//! Root-side fan-out, topic control and active-peer replay.

mod common;

use common::*;

use bytes::Bytes;
use forkweave::dispatcher::{ChainUpdate, NodeRole};
use forkweave::{Envelope, FrameKind, Hash256, Inv, InvKind, PeerEvent, RoutedEvent, NONCE_LOCAL};
use forkweave_tunnel::wire::{decode_added, decode_event, encode_topic};

#[test]
fn inv_from_the_peer_net_reaches_every_child() {
    let f = fork(0x61);
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let a = attach_child(&harness, 1);
    let b = attach_child(&harness, 2);
    assert_eq!(recv(&a).kind, FrameKind::Active); // replay
    assert_eq!(recv(&b).kind, FrameKind::Active);

    let inv = PeerEvent::Inv {
        nonce: 42,
        fork: f,
        inv: vec![Inv {
            kind: InvKind::Block,
            hash: h256(9),
        }],
    };
    harness.local_tx.send(RoutedEvent::new(inv.clone())).unwrap();

    for rx in [&a, &b] {
        let envelope = recv(rx);
        assert_eq!(envelope.kind, FrameKind::Inv);
        assert_eq!(envelope.nonce, 42);
        assert_eq!(decode_event(&envelope.payload).unwrap(), inv);
    }
}

#[test]
fn fresh_child_gets_the_cached_peer_set_in_order() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());

    for nonce in [3u64, 1, 2] {
        harness
            .local_tx
            .send(RoutedEvent::new(PeerEvent::Active {
                nonce,
                services: 1,
            }))
            .unwrap();
    }
    // One peer leaves again.
    harness
        .local_tx
        .send(RoutedEvent::new(PeerEvent::Deactive {
            nonce: 1,
            services: 1,
        }))
        .unwrap();

    // Give the dispatcher a beat to absorb the lifecycle events, then
    // attach: replay must precede any live traffic.
    std::thread::sleep(std::time::Duration::from_millis(100));
    let child = attach_child(&harness, 7);

    let first = recv(&child);
    let second = recv(&child);
    assert_eq!(first.kind, FrameKind::Active);
    assert_eq!(second.kind, FrameKind::Active);
    assert_eq!((first.nonce, second.nonce), (3, 2));
    expect_quiet(&child);
}

#[test]
fn empty_cache_synthesizes_the_local_peer() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let child = attach_child(&harness, 1);

    let envelope = recv(&child);
    assert_eq!(envelope.kind, FrameKind::Active);
    assert_eq!(envelope.nonce, NONCE_LOCAL);
    match decode_event(&envelope.payload).unwrap() {
        PeerEvent::Active { nonce, services } => {
            assert_eq!(nonce, NONCE_LOCAL);
            assert_eq!(services, 1);
        }
        other => panic!("expected active, got {other:?}"),
    }
}

#[test]
fn unknown_topic_subscription_is_answered_with_nosub() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let child = attach_child(&harness, 1);
    assert_eq!(recv(&child).kind, FrameKind::Active);

    child_frame(
        &harness,
        1,
        Envelope::new(FrameKind::Sub, 77, Hash256::ZERO, encode_topic("bogus")),
    );
    let reply = recv(&child);
    assert_eq!(reply.kind, FrameKind::NoSub);
    assert_eq!(reply.nonce, 77);

    child_frame(
        &harness,
        1,
        Envelope::new(FrameKind::Sub, 78, Hash256::ZERO, encode_topic("all-block")),
    );
    let reply = recv(&child);
    assert_eq!(reply.kind, FrameKind::Ready);
    assert_eq!(reply.nonce, 78);
}

#[test]
fn chain_updates_reach_topic_subscribers_only() {
    let f = fork(0x71);
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let subscribed = attach_child(&harness, 1);
    let silent = attach_child(&harness, 2);
    assert_eq!(recv(&subscribed).kind, FrameKind::Active);
    assert_eq!(recv(&silent).kind, FrameKind::Active);

    child_frame(
        &harness,
        1,
        Envelope::new(FrameKind::Sub, 5, Hash256::ZERO, encode_topic("all-block")),
    );
    assert_eq!(recv(&subscribed).kind, FrameKind::Ready);

    harness
        .update_tx
        .send(ChainUpdate::Block {
            fork: f,
            hash: h256(1),
            raw: Bytes::from_static(b"raw-block"),
        })
        .unwrap();

    let push = recv(&subscribed);
    assert_eq!(push.kind, FrameKind::Added);
    assert_eq!(push.nonce, 5);
    let record = decode_added(&push.payload).unwrap();
    assert_eq!(record.topic, "all-block");
    assert_eq!(record.fork, f);
    assert_eq!(&record.object[..], b"raw-block");

    expect_quiet(&silent);
}

#[test]
fn local_origin_data_on_fork_node_goes_to_children() {
    let f = fork(0x81);
    let harness = spawn(NodeRole::Fork, &[f], StubChain::default());
    let parent_rx = attach_parent(&harness);
    assert_eq!(recv(&parent_rx).kind, FrameKind::Sub);
    let child = attach_child(&harness, 3);
    assert_eq!(recv(&child).kind, FrameKind::Active);

    // Locally produced inventory is a broadcast, not an upstream send.
    let inv = PeerEvent::Inv {
        nonce: NONCE_LOCAL,
        fork: f,
        inv: vec![],
    };
    harness.local_tx.send(RoutedEvent::new(inv)).unwrap();
    assert_eq!(recv(&child).kind, FrameKind::Inv);
    expect_quiet(&parent_rx);

    // Remote-solicited inventory goes upstream instead.
    let inv = PeerEvent::Inv {
        nonce: 12,
        fork: f,
        inv: vec![],
    };
    harness.local_tx.send(RoutedEvent::new(inv)).unwrap();
    assert_eq!(recv(&parent_rx).kind, FrameKind::Inv);
    expect_quiet(&child);
}

#[test]
fn dispatcher_ignores_its_own_echo() {
    let harness = spawn(NodeRole::Root, &[], StubChain::default());
    let child = attach_child(&harness, 1);
    assert_eq!(recv(&child).kind, FrameKind::Active);

    let event = PeerEvent::Inv {
        nonce: 2,
        fork: fork(0x91),
        inv: vec![],
    };
    let echoed = RoutedEvent::down(event, forkweave::SENDER_DISPATCHER);
    harness.local_tx.send(echoed).unwrap();
    expect_quiet(&child);
}
