use std::io::{Read, Write};
use std::net::TcpListener as StdTcpListener;
use std::time::Duration;

use net_selector::{ManualClock, PlaintextChannelBuilder, Selector, SelectorConfig, Send, SystemClock};

fn new_selector() -> Selector {
    Selector::new(
        SelectorConfig::default(),
        Box::new(PlaintextChannelBuilder),
        Box::new(SystemClock),
    )
    .unwrap()
}

fn poll_until(selector: &mut Selector, mut done: impl FnMut(&Selector) -> bool) {
    for _ in 0..200 {
        if done(selector) {
            return;
        }
        selector.poll(Duration::from_millis(50)).unwrap();
    }
    panic!("condition never became true within the poll budget");
}

#[test]
fn connect_to_a_loopback_listener_completes_immediately() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("peer", addr, None, None).unwrap();

    poll_until(&mut selector, |s| !s.connected().is_empty());
    assert_eq!(selector.connected(), &["peer".into()]);
    assert!(selector.is_channel_ready(&"peer".into()));
}

#[test]
fn sends_to_two_destinations_complete_independently() {
    let listener_a = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let listener_b = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr_a = listener_a.local_addr().unwrap();
    let addr_b = listener_b.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("a", addr_a, None, None).unwrap();
    selector.connect("b", addr_b, None, None).unwrap();
    poll_until(&mut selector, |s| s.connected().len() == 2);

    selector.send(Send::new("a", b"hello-a".to_vec())).unwrap();
    selector.send(Send::new("b", b"hello-b".to_vec())).unwrap();

    poll_until(&mut selector, |s| s.completed_sends().len() == 2);

    let (mut server_a, _) = listener_a.accept().unwrap();
    let (mut server_b, _) = listener_b.accept().unwrap();

    let mut buf = [0u8; 4 + 7];
    server_a.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[4..], b"hello-a");

    server_b.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[4..], b"hello-b");
}

#[test]
fn a_second_send_to_the_same_connection_before_the_first_completes_is_rejected() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("peer", addr, None, None).unwrap();
    poll_until(&mut selector, |s| !s.connected().is_empty());

    // A large payload so the first send is unlikely to finish before the
    // second is attempted, exercising the one-in-flight-per-connection rule.
    let big = vec![0u8; 8 * 1024 * 1024];
    selector.send(Send::new("peer", big)).unwrap();

    let err = selector.send(Send::new("peer", b"too soon".to_vec()));
    assert!(err.is_err());
}

#[test]
fn send_to_an_unknown_connection_id_fails() {
    let mut selector = new_selector();
    let err = selector.send(Send::new("nobody", b"hi".to_vec()));
    assert!(err.is_err());
}

#[test]
fn disconnect_is_reported_when_the_peer_closes() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("peer", addr, None, None).unwrap();
    poll_until(&mut selector, |s| !s.connected().is_empty());

    let (server, _) = listener.accept().unwrap();
    drop(server);

    poll_until(&mut selector, |s| !s.disconnected().is_empty());
    assert_eq!(selector.disconnected()[0].0, "peer".into());
}

#[test]
fn wakeup_unblocks_a_blocking_poll() {
    let selector = new_selector();
    selector.wakeup().unwrap();
}

#[test]
fn round_trip_send_and_echoed_receive_are_byte_for_byte_equal() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("peer", addr, None, None).unwrap();
    poll_until(&mut selector, |s| !s.connected().is_empty());

    let (mut server, _) = listener.accept().unwrap();

    let payload = b"echo-me".to_vec();
    selector.send(Send::new("peer", payload.clone())).unwrap();
    poll_until(&mut selector, |s| !s.completed_sends().is_empty());
    assert_eq!(selector.completed_sends()[0].destination(), "peer");

    let mut framed = vec![0u8; 4 + payload.len()];
    server.read_exact(&mut framed).unwrap();
    server.write_all(&framed).unwrap();

    poll_until(&mut selector, |s| !s.completed_receives().is_empty());
    let (id, receive) = &selector.completed_receives()[0];
    assert_eq!(id, &"peer".into());
    assert_eq!(receive.payload().unwrap(), &payload[..]);
}

#[test]
fn a_muted_channel_retains_receives_until_unmuted() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut selector = new_selector();
    selector.connect("peer", addr, None, None).unwrap();
    poll_until(&mut selector, |s| !s.connected().is_empty());
    let (mut server, _) = listener.accept().unwrap();

    selector.mute(&"peer".into()).unwrap();

    let mut framed = Vec::new();
    framed.extend_from_slice(&5u32.to_be_bytes());
    framed.extend_from_slice(b"hello");
    server.write_all(&framed).unwrap();

    // Several polls while muted: the frame arrives and is staged, but must
    // never surface through completed_receives().
    for _ in 0..5 {
        selector.poll(Duration::from_millis(20)).unwrap();
        assert!(selector.completed_receives().is_empty());
    }

    selector.unmute(&"peer".into()).unwrap();
    poll_until(&mut selector, |s| !s.completed_receives().is_empty());
    let (id, receive) = &selector.completed_receives()[0];
    assert_eq!(id, &"peer".into());
    assert_eq!(receive.payload().unwrap(), b"hello");
}

#[test]
fn register_drives_an_already_connected_socket() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let client = std::net::TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    let server = net_selector::tcp::TcpStream::new(server).unwrap();

    let mut selector = new_selector();
    selector.register("accepted", server).unwrap();
    assert!(selector.is_channel_ready(&"accepted".into()));

    let mut framed = Vec::new();
    framed.extend_from_slice(&2u32.to_be_bytes());
    framed.extend_from_slice(b"hi");
    (&client).write_all(&framed).unwrap();

    poll_until(&mut selector, |s| !s.completed_receives().is_empty());
    let (id, receive) = &selector.completed_receives()[0];
    assert_eq!(id, &"accepted".into());
    assert_eq!(receive.payload().unwrap(), b"hi");
}

#[test]
fn idle_connection_is_reaped_exactly_once_after_the_threshold() {
    let listener_a = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let listener_b = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr_a = listener_a.local_addr().unwrap();
    let addr_b = listener_b.local_addr().unwrap();

    let clock = std::sync::Arc::new(ManualClock::new());

    struct ArcClock(std::sync::Arc<ManualClock>);
    impl net_selector::Clock for ArcClock {
        fn now(&self) -> std::time::Instant {
            self.0.now()
        }
    }

    let mut selector = Selector::new(
        SelectorConfig {
            idle_timeout: Duration::from_millis(10),
            ..SelectorConfig::default()
        },
        Box::new(PlaintextChannelBuilder),
        Box::new(ArcClock(clock.clone())),
    )
    .unwrap();

    selector.connect("a", addr_a, None, None).unwrap();
    poll_until(&mut selector, |s| !s.connected().is_empty());
    clock.advance(Duration::from_millis(5));

    selector.connect("b", addr_b, None, None).unwrap();
    poll_until(&mut selector, |s| s.connected().len() == 2);

    // t=12ms: "a" (last touched at t=0) has been idle past the 10ms
    // threshold; "b" (touched at t=5) has not.
    clock.advance(Duration::from_millis(7));
    selector.poll(Duration::from_millis(1)).unwrap();
    assert_eq!(selector.disconnected().len(), 1);
    assert_eq!(selector.disconnected()[0].0, "a".into());

    // t=17ms: "b" now crosses its own 10ms-since-last-touch threshold.
    clock.advance(Duration::from_millis(5));
    selector.poll(Duration::from_millis(1)).unwrap();
    assert_eq!(selector.disconnected().len(), 1);
    assert_eq!(selector.disconnected()[0].0, "b".into());
}
