//! End-to-end tests: a real WebSocket server on an ephemeral port, driven by
//! `tokio-tungstenite` clients that play the part of phones.
//!
//! # Purpose
//!
//! These tests exercise the host through the same surface a phone uses:
//!
//! - The happy path: a press and a release reach the virtual keyboard.
//! - Disconnects: a phone that vanishes mid-press has its keys released, and
//!   so does one that goes silent without closing its socket.
//! - Sharing: two phones holding the same key keep it down until both let go,
//!   even when their layouts spell that key differently.
//! - Rejections: malformed URLs get HTTP 400, unknown layouts get Close 1008.
//! - Fatal errors: a failing keyboard halts every session and the server
//!   returns an error.
//!
//! The virtual keyboard is a [`RecordingKeyboard`], so assertions look at the
//! exact sequence of key transitions the OS would have seen.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    protocol::frame::coding::CloseCode, Error as WsError, Message,
};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use padlink_core::{Item, KeyId, PlayerToken};
use padlink_host::application::{KeyMultiplexer, SessionManager};
use padlink_host::domain::HostConfig;
use padlink_host::infrastructure::key_device::RecordingKeyboard;
use padlink_host::infrastructure::layout_store::InMemoryLayoutStore;
use padlink_host::infrastructure::serve;
use padlink_host::infrastructure::ws_server::LAYOUT_REJECTED_REASON;

type Phone = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Harness ───────────────────────────────────────────────────────────────────

struct Host {
    addr: SocketAddr,
    keyboard: Arc<RecordingKeyboard>,
    manager: Arc<SessionManager>,
    running: Arc<AtomicBool>,
    server: JoinHandle<anyhow::Result<()>>,
}

/// Settings for tests that do not care about liveness.  The test phones
/// never read, so they never answer pings; the timeout must outlast every test.
fn patient_config() -> HostConfig {
    HostConfig {
        halt_poll_interval: Duration::from_millis(20),
        ping_interval: Duration::from_secs(5),
        liveness_timeout: Duration::from_secs(60),
        ..HostConfig::default()
    }
}

/// Settings that give up on a silent phone within a fraction of a second.
fn impatient_config() -> HostConfig {
    HostConfig {
        halt_poll_interval: Duration::from_millis(20),
        ping_interval: Duration::from_millis(50),
        liveness_timeout: Duration::from_millis(300),
        ..HostConfig::default()
    }
}

impl Host {
    async fn start() -> Self {
        Self::start_with(patient_config()).await
    }

    async fn start_with(config: HostConfig) -> Self {
        let player_two = PlayerToken::for_player(NonZeroU32::new(2).unwrap());
        let store = InMemoryLayoutStore::new()
            .with_layout(
                "Arrows",
                vec![
                    Item::new("up-btn", "ArrowUp"),
                    Item::new("down-btn", "ArrowDown"),
                    Item::new("unbound", ""),
                ],
            )
            .with_layout("Menu", vec![Item::new("ok", "Enter")])
            .with_layout(
                "Jump",
                vec![Item::new("jump", "a").with_keybind(player_two, "A")],
            )
            .with_layout("Empty", vec![]);

        let keyboard = Arc::new(RecordingKeyboard::new());
        let mux = Arc::new(KeyMultiplexer::new(keyboard.clone()));
        let manager = Arc::new(SessionManager::new(Arc::new(store), mux));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let server = {
            let manager = Arc::clone(&manager);
            let running = Arc::clone(&running);
            tokio::spawn(async move { serve(listener, manager, running, &config).await })
        };

        Self {
            addr,
            keyboard,
            manager,
            running,
            server,
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.addr, path_and_query)
    }

    async fn connect(&self, path_and_query: &str) -> Phone {
        let (ws, _response) = connect_async(self.url(path_and_query))
            .await
            .expect("handshake must succeed");
        ws
    }

    /// Connects and waits until the session is registered.
    async fn join(&self, player: u32, layout: &str) -> Phone {
        let before = self.manager.registry().len();
        let ws = self.connect(&format!("/ws/{player}?layout={layout}")).await;
        let registry = Arc::clone(self.manager.registry());
        wait_until("session registered", || registry.len() > before).await;
        ws
    }

    async fn stop(self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server must stop")
            .expect("server task must not panic")
    }
}

async fn press(ws: &mut Phone, item: &str) {
    send(ws, item, "down").await;
}

async fn release(ws: &mut Phone, item: &str) {
    send(ws, item, "up").await;
}

async fn send(ws: &mut Phone, item: &str, action: &str) {
    let text = format!(r#"{{"itemId":"{item}","action":"{action}"}}"#);
    ws.send(Message::Text(text)).await.unwrap();
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for: {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_events(keyboard: &RecordingKeyboard, count: usize) -> Vec<(KeyId, bool)> {
    wait_until("key transitions", || keyboard.events().len() >= count).await;
    keyboard.events()
}

fn down(key: &str) -> (KeyId, bool) {
    (KeyId::from(key), true)
}

fn up(key: &str) -> (KeyId, bool) {
    (KeyId::from(key), false)
}

/// Reads frames until a Close frame (or the end of the stream) arrives.
async fn read_close(ws: &mut Phone) -> Option<(CloseCode, String)> {
    let read = async {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Close(Some(frame))) => {
                    return Some((frame.code, frame.reason.to_string()));
                }
                Ok(Message::Close(None)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("close frame must arrive")
}

// ── Key flow ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_press_and_release_reach_the_keyboard() {
    // Arrange
    let host = Host::start().await;
    let mut phone = host.join(1, "Arrows").await;

    // Act
    press(&mut phone, "up-btn").await;
    release(&mut phone, "up-btn").await;

    // Assert
    let events = wait_for_events(&host.keyboard, 2).await;
    assert_eq!(events, vec![down("ArrowUp"), up("ArrowUp")]);

    phone.close(None).await.unwrap();
    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_abrupt_disconnect_releases_held_keys() {
    // Arrange: press and vanish without a Close frame
    let host = Host::start().await;
    let mut phone = host.join(1, "Arrows").await;
    press(&mut phone, "down-btn").await;
    wait_for_events(&host.keyboard, 1).await;

    // Act
    drop(phone);

    // Assert: a compensating release, and the session is gone
    let events = wait_for_events(&host.keyboard, 2).await;
    assert_eq!(events, vec![down("ArrowDown"), up("ArrowDown")]);
    let registry = Arc::clone(host.manager.registry());
    wait_until("session removed", || registry.is_empty()).await;

    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_shared_key_stays_down_until_last_holder_releases() {
    // Arrange
    let host = Host::start().await;
    let mut first = host.join(1, "Menu").await;
    let mut second = host.join(2, "Menu").await;

    // Act: both press, first releases
    press(&mut first, "ok").await;
    wait_for_events(&host.keyboard, 1).await;
    press(&mut second, "ok").await;
    let registry = Arc::clone(host.manager.registry());
    let mux = Arc::clone(host.manager.multiplexer());
    wait_until("second hold counted", || mux.count(&KeyId::from("Enter")) == 2).await;
    release(&mut first, "ok").await;
    wait_until("first release counted", || mux.count(&KeyId::from("Enter")) == 1).await;

    // Assert: only one "down" so far
    assert_eq!(host.keyboard.events(), vec![down("Enter")]);

    // Act: second releases
    release(&mut second, "ok").await;

    // Assert
    let events = wait_for_events(&host.keyboard, 2).await;
    assert_eq!(events, vec![down("Enter"), up("Enter")]);
    assert_eq!(registry.len(), 2);

    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_spellings_of_one_key_share_a_hold() {
    // Arrange: player 1 is bound to "a", player 2 to "A"
    let host = Host::start().await;
    let mut first = host.join(1, "Jump").await;
    let mut second = host.join(2, "Jump").await;
    let mux = Arc::clone(host.manager.multiplexer());

    // Act: both press, first releases
    press(&mut first, "jump").await;
    wait_for_events(&host.keyboard, 1).await;
    press(&mut second, "jump").await;
    wait_until("second hold counted", || mux.count(&KeyId::from("A")) == 2).await;
    release(&mut first, "jump").await;
    wait_until("first release counted", || mux.count(&KeyId::from("a")) == 1).await;

    // Assert: the key is still down
    assert_eq!(host.keyboard.events(), vec![down("a")]);

    // Act: second releases
    release(&mut second, "jump").await;

    // Assert: lifted with the spelling it went down with
    let events = wait_for_events(&host.keyboard, 2).await;
    assert_eq!(events, vec![down("a"), up("a")]);

    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_unbound_and_unknown_items_are_ignored() {
    // Arrange
    let host = Host::start().await;
    let mut phone = host.join(1, "Arrows").await;

    // Act: noise, then a real press so we know the noise was processed
    press(&mut phone, "unbound").await;
    press(&mut phone, "no-such-item").await;
    phone.send(Message::Text("not json".to_string())).await.unwrap();
    phone.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    press(&mut phone, "up-btn").await;

    // Assert: the session survived and only the real press arrived
    let events = wait_for_events(&host.keyboard, 1).await;
    assert_eq!(events, vec![down("ArrowUp")]);
    assert_eq!(host.manager.registry().len(), 1);

    drop(phone);
    assert!(host.stop().await.is_ok());
}

// ── Liveness ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_silent_phone_is_dropped_and_its_keys_released() {
    // Arrange: press, then never read or write again (socket stays open)
    let host = Host::start_with(impatient_config()).await;
    let mut phone = host.join(1, "Arrows").await;
    press(&mut phone, "up-btn").await;
    wait_for_events(&host.keyboard, 1).await;

    // Act: wait out the liveness timeout
    let events = wait_for_events(&host.keyboard, 2).await;

    // Assert
    assert_eq!(events, vec![down("ArrowUp"), up("ArrowUp")]);
    let registry = Arc::clone(host.manager.registry());
    wait_until("session removed", || registry.is_empty()).await;

    drop(phone);
    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_phone_answering_pings_stays_connected() {
    // Arrange: the client stack answers pings while it reads
    let host = Host::start_with(impatient_config()).await;
    let mut phone = host.join(1, "Arrows").await;
    press(&mut phone, "up-btn").await;
    wait_for_events(&host.keyboard, 1).await;
    let reader = tokio::spawn(async move {
        while let Some(Ok(_)) = phone.next().await {}
    });

    // Act: stay quiet for several timeouts
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    // Assert: still registered, key still held
    assert_eq!(host.manager.registry().len(), 1);
    assert_eq!(host.keyboard.events(), vec![down("ArrowUp")]);

    assert!(host.stop().await.is_ok());
    reader.abort();
}

// ── Rejections ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_urls_are_rejected_with_bad_request() {
    let host = Host::start().await;

    for path in ["/ws/abc?layout=Arrows", "/ws/0?layout=Arrows", "/ws/1", "/other/1?layout=Arrows"] {
        // Act
        let result = connect_async(host.url(path)).await;

        // Assert
        match result {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), 400, "path: {path}");
            }
            Err(e) => panic!("expected HTTP 400 for {path}, got {e}"),
            Ok(_) => panic!("expected HTTP 400 for {path}, got an upgrade"),
        }
    }
    assert!(host.manager.registry().is_empty());

    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_unknown_layout_is_closed_with_policy_code() {
    // Arrange / Act
    let host = Host::start().await;
    let mut phone = host.connect("/ws/1?layout=Nope").await;

    // Assert
    let (code, reason) = read_close(&mut phone).await.expect("close frame");
    assert_eq!(u16::from(code), 1008);
    assert_eq!(reason, LAYOUT_REJECTED_REASON);
    assert!(host.manager.registry().is_empty());

    assert!(host.stop().await.is_ok());
}

#[tokio::test]
async fn test_empty_layout_is_closed_with_policy_code() {
    let host = Host::start().await;
    let mut phone = host.connect("/ws/3?layout=Empty").await;

    let (code, _) = read_close(&mut phone).await.expect("close frame");
    assert_eq!(code, CloseCode::Policy);

    assert!(host.stop().await.is_ok());
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_graceful_stop_releases_keys_and_closes_phones() {
    // Arrange
    let host = Host::start().await;
    let mut phone = host.join(1, "Arrows").await;
    press(&mut phone, "up-btn").await;
    wait_for_events(&host.keyboard, 1).await;
    let keyboard = Arc::clone(&host.keyboard);

    // Act
    let reader = tokio::spawn(async move { read_close(&mut phone).await });
    let result = host.stop().await;

    // Assert
    assert!(result.is_ok());
    assert!(keyboard.pressed_keys().is_empty());
    let (code, _) = reader.await.unwrap().expect("close frame");
    assert_eq!(code, CloseCode::Away);
}

#[tokio::test]
async fn test_device_failure_halts_every_session() {
    // Arrange: two phones, one holding a key
    let host = Host::start().await;
    let mut holder = host.join(1, "Arrows").await;
    let mut bystander = host.join(2, "Menu").await;
    press(&mut holder, "up-btn").await;
    wait_for_events(&host.keyboard, 1).await;

    // Act: the keyboard breaks, then the next press hits it
    host.keyboard.set_failing(true);
    press(&mut holder, "down-btn").await;

    // Assert: the server stops on its own with an error
    let result = tokio::time::timeout(Duration::from_secs(10), host.server)
        .await
        .expect("server must halt")
        .expect("server task must not panic");
    assert!(result.is_err());
    assert!(host.manager.fatal_error().is_some());
    assert!(host.manager.registry().is_empty());

    let (code, _) = read_close(&mut bystander).await.expect("close frame");
    assert_eq!(code, CloseCode::Away);
}
