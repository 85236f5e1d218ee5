//! Fan-out and delivery behaviour.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use roomcast_core::{ConnectionId, ErrorCode, JoinStatus, RoomcastError};
use roomcast_gateway::realtime::{ChannelConnection, ConnHandle, Connection, Deliverable, Hub, IdSlot, Payload};

struct Peer {
    handle: ConnHandle,
    rx: mpsc::Receiver<Payload>,
}

impl Peer {
    fn new() -> Self {
        let (c, rx) = ChannelConnection::channel(64);
        Self { handle: c, rx }
    }

    fn drain(&mut self) -> Vec<Payload> {
        let mut out = Vec::new();
        while let Ok(p) = self.rx.try_recv() {
            out.push(p);
        }
        out
    }
}

/// Registered but write-only from the hub's point of view: no sink.
#[derive(Default)]
struct Mute {
    slot: IdSlot,
}

impl Connection for Mute {
    fn id_slot(&self) -> &IdSlot {
        &self.slot
    }

    fn deliverable(&self) -> Option<&dyn Deliverable> {
        None
    }
}

fn text(s: &str) -> Payload {
    Payload::text(s)
}

#[test]
fn end_to_end_room_scenario() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let mut b = Peer::new();
    let a1 = hub.add_connection(&a.handle, None);
    let b1 = hub.add_connection(&b.handle, None);

    assert_eq!(hub.join_group("room1", a1), JoinStatus::Ok);
    assert_eq!(hub.join_group("room1", b1), JoinStatus::Ok);
    assert!(hub.bind_identity("u1", a1).is_bound());

    let report = hub.send_to_group("room1", text("hi"), &[], &[]);
    assert_eq!(report.delivered, 2);
    assert!(report.is_clean());
    assert_eq!(a.drain(), vec![text("hi")]);
    assert_eq!(b.drain(), vec![text("hi")]);

    assert!(hub.close_connection(&a.handle));
    assert_eq!(hub.members_of("room1"), vec![b1]);
    assert!(!hub.identities().contains(&"u1".to_string()));
}

#[test]
fn send_to_group_honours_identity_exclusion() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let mut b = Peer::new();
    let mut c = Peer::new();
    let a1 = hub.add_connection(&a.handle, None);
    let b1 = hub.add_connection(&b.handle, None);
    let c1 = hub.add_connection(&c.handle, None);
    for id in [a1, b1, c1] {
        hub.join_group("g", id);
    }
    hub.bind_identity("muted", a1);
    hub.bind_identity("muted", b1);

    let report = hub.send_to_group("g", text("m"), &["muted"], &[]);
    assert_eq!(report.attempted, 1);
    assert!(a.drain().is_empty());
    assert!(b.drain().is_empty());
    assert_eq!(c.drain(), vec![text("m")]);
}

#[test]
fn send_to_group_honours_connection_exclusion() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let mut b = Peer::new();
    let a1 = hub.add_connection(&a.handle, None);
    let b1 = hub.add_connection(&b.handle, None);
    hub.join_group("g", a1);
    hub.join_group("g", b1);

    hub.send_to_group("g", text("x"), &[], &[a1]);
    assert!(a.drain().is_empty());
    assert_eq!(b.drain().len(), 1);

    let report = hub.send_to_group("missing", text("x"), &[], &[]);
    assert_eq!(report.attempted, 0);
}

#[test]
fn send_to_identity_reaches_every_device_except_excluded() {
    let hub = Hub::new();
    let mut phone = Peer::new();
    let mut laptop = Peer::new();
    let mut other = Peer::new();
    let p = hub.add_connection(&phone.handle, None);
    let l = hub.add_connection(&laptop.handle, None);
    hub.add_connection(&other.handle, None);
    hub.bind_identity("u", p);
    hub.bind_identity("u", l);

    let report = hub.send_to_identity("u", text("all"), &[]);
    assert_eq!(report.delivered, 2);
    hub.send_to_identity("u", text("not phone"), &[p]);

    assert_eq!(phone.drain(), vec![text("all")]);
    assert_eq!(laptop.drain(), vec![text("all"), text("not phone")]);
    assert!(other.drain().is_empty());
    assert_eq!(hub.send_to_identity("nobody", text("x"), &[]).attempted, 0);
}

#[test]
fn send_to_connection_resolves_id() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let id = hub.add_connection(&a.handle, None);

    assert!(hub.send_to_connection(&id, text("1")).unwrap());
    assert!(hub.send_to_connection(&id, text("2")).unwrap());
    assert!(!hub.send_to_connection(&ConnectionId::random(), text("x")).unwrap());
    assert_eq!(a.drain(), vec![text("1"), text("2")]);
}

#[test]
fn send_to_client_prefers_identity() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let mut b = Peer::new();
    let a1 = hub.add_connection(&a.handle, None);
    let b1 = hub.add_connection(&b.handle, None);
    hub.bind_identity("u", b1);

    hub.send_to_client(&a1, text("direct"), None, &[]);
    hub.send_to_client(&a1, text("via identity"), Some("u"), &[]);

    assert_eq!(a.drain(), vec![text("direct")]);
    assert_eq!(b.drain(), vec![text("via identity")]);
}

#[test]
fn broadcast_skips_excluded() {
    let hub = Hub::new();
    let mut peers: Vec<Peer> = (0..4).map(|_| Peer::new()).collect();
    let ids: Vec<_> = peers.iter().map(|p| hub.add_connection(&p.handle, None)).collect();

    let report = hub.broadcast(Payload::binary(vec![1u8, 2, 3]), &[ids[0], ids[3]]);
    assert_eq!(report.delivered, 2);
    let counts: Vec<usize> = peers.iter_mut().map(|p| p.drain().len()).collect();
    assert_eq!(counts, vec![0, 1, 1, 0]);
}

#[test]
fn broadcast_once_per_group_picks_one_member_each() {
    let hub = Hub::new();
    let mut peers: Vec<Peer> = (0..5).map(|_| Peer::new()).collect();
    let ids: Vec<_> = peers.iter().map(|p| hub.add_connection(&p.handle, None)).collect();
    for id in &ids[0..3] {
        hub.join_group("big", *id);
    }
    hub.join_group("solo", ids[3]);

    for _ in 0..20 {
        let report = hub.broadcast_once_per_group(text("ping"));
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
    }

    let counts: Vec<usize> = peers.iter_mut().map(|p| p.drain().len()).collect();
    assert_eq!(counts[0] + counts[1] + counts[2], 20);
    assert_eq!(counts[3], 20);
    assert_eq!(counts[4], 0);
}

#[test]
fn broadcast_once_to_group_delivers_at_most_once() {
    let hub = Hub::new();
    let mut a = Peer::new();
    let mut b = Peer::new();
    hub.join_group("g", hub.add_connection(&a.handle, None));
    hub.join_group("g", hub.add_connection(&b.handle, None));

    assert_eq!(hub.broadcast_once_to_group("g", text("x")).delivered, 1);
    assert_eq!(a.drain().len() + b.drain().len(), 1);
    assert_eq!(hub.broadcast_once_to_group("empty", text("x")).attempted, 0);
}

#[test]
fn send_to_random_on_empty_hub() {
    let hub = Hub::new();
    assert!(!hub.send_to_random(text("x")).unwrap());
    let mut a = Peer::new();
    hub.add_connection(&a.handle, None);
    assert!(hub.send_to_random(text("x")).unwrap());
    assert_eq!(a.drain().len(), 1);
}

#[test]
fn missing_capability_is_a_hard_fault_that_does_not_abort_fanout() {
    let hub = Hub::new();
    let mute: ConnHandle = Arc::new(Mute::default());
    let mut ok = Peer::new();
    let m = hub.add_connection(&mute, None);
    let o = hub.add_connection(&ok.handle, None);
    hub.join_group("g", m);
    hub.join_group("g", o);

    let report = hub.send_to_group("g", text("x"), &[], &[]);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    let faults: Vec<_> = report.hard_faults().collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].0, m);
    assert_eq!(ok.drain().len(), 1);

    let err = hub.send_to_connection(&m, text("x")).unwrap_err();
    assert_eq!(err, RoomcastError::NoDeliveryCapability(m));
    assert_eq!(err.code(), ErrorCode::NoDeliveryCapability);
}

#[test]
fn full_queue_is_a_soft_failure() {
    let hub = Hub::new();
    let (c, mut rx) = ChannelConnection::channel(1);
    let handle: ConnHandle = c;
    let id = hub.add_connection(&handle, None);

    assert!(hub.broadcast(text("1"), &[]).is_clean());
    let report = hub.broadcast(text("2"), &[]);
    assert_eq!(report.failures, vec![(id, RoomcastError::QueueFull(id))]);
    assert_eq!(report.hard_faults().count(), 0);
    assert_eq!(rx.try_recv().unwrap(), text("1"));
}

#[test]
fn relay_enriches_with_connection_data() {
    let hub = Hub::new();
    let mut observer = Peer::new();
    hub.add_connection(&observer.handle, Some(json!({"role": "observer"})));
    let a = hub.add_connection(&Peer::new().handle, Some(json!({"cpu": 10})));
    let b = hub.add_connection(&Peer::new().handle, Some(json!({"cpu": 20})));
    hub.bind_identity("alice", a);
    hub.bind_identity("bob", b);

    let mut base = Map::new();
    base.insert("type".into(), json!("report"));

    let report = hub.relay_with_enrichment(&observer.handle, &base, &[], &["alice", "bob"]);
    assert_eq!(report.delivered, 2);
    let mut cpus: Vec<i64> = observer
        .drain()
        .into_iter()
        .map(|p| match p {
            Payload::Json(v) => {
                assert_eq!(v["type"], json!("report"));
                v["data"]["cpu"].as_i64().unwrap()
            }
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    cpus.sort();
    assert_eq!(cpus, vec![10, 20]);
}

#[test]
fn relay_filters_and_keeps_existing_data() {
    let hub = Hub::new();
    let mut observer = Peer::new();
    hub.add_connection(&observer.handle, None);
    let a = hub.add_connection(&Peer::new().handle, Some(json!(1)));
    let b = hub.add_connection(&Peer::new().handle, Some(json!(2)));
    hub.bind_identity("alice", a);
    hub.bind_identity("bob", b);

    let mut base = Map::new();
    base.insert("data".into(), json!({"fixed": true}));

    // Excluding bob leaves alice plus the unbound observer itself.
    let report = hub.relay_with_enrichment(&observer.handle, &base, &["bob"], &[]);
    assert_eq!(report.delivered, 2);
    for p in observer.drain() {
        assert_eq!(p, Payload::Json(json!({"data": {"fixed": true}})));
    }

    // Unbound observer has no data: enriched field is null.
    let report = hub.relay_with_enrichment(&observer.handle, &Map::new(), &["alice", "bob"], &[]);
    assert_eq!(report.delivered, 1);
    assert_eq!(observer.drain(), vec![Payload::Json(json!({"data": Value::Null}))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_during_fanout_keeps_indices_consistent() {
    let hub = Arc::new(Hub::new());
    let mut handles = Vec::new();
    for i in 0..64 {
        let (c, rx) = ChannelConnection::channel(1024);
        let h: ConnHandle = c;
        let id = hub.add_connection(&h, None);
        hub.join_group(if i % 2 == 0 { "even" } else { "odd" }, id);
        hub.join_group("all", id);
        hub.bind_identity(&format!("u{}", i % 8), id);
        handles.push((h, rx));
    }

    let closer = {
        let hub = Arc::clone(&hub);
        let victims: Vec<ConnHandle> = handles.iter().step_by(2).map(|(h, _)| Arc::clone(h)).collect();
        tokio::spawn(async move {
            for h in victims {
                hub.close_connection(&h);
                tokio::task::yield_now().await;
            }
        })
    };
    let sender = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            for _ in 0..50 {
                hub.send_to_group("all", Payload::text("tick"), &[], &[]);
                hub.broadcast_once_per_group(Payload::text("once"));
                tokio::task::yield_now().await;
            }
        })
    };
    closer.await.unwrap();
    sender.await.unwrap();

    assert_eq!(hub.connection_count(), 32);
    assert!(!hub.group_ids().contains(&"even".to_string()));
    for id in hub.members_of("all") {
        assert!(hub.is_connection_online(&id));
    }
    for identity in hub.identities() {
        for id in hub.connections_of(&identity) {
            assert_eq!(hub.identity_of(&id), Some(identity.clone()));
        }
    }
    assert_eq!(hub.bound_connection_count(), 32);
}
