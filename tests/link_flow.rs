//! Integration tests for the supervisor → session → alarm flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guardlink_desktop::alarm::AlarmSink;
use guardlink_desktop::config::LinkConfig;
use guardlink_desktop::link::mock::ScriptedTransport;
use guardlink_desktop::link::{LinkContext, ReconnectSupervisor, SessionEvent};
use guardlink_desktop::storage::DeviceStore;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;

struct CountingSink(AtomicUsize);

impl AlarmSink for CountingSink {
    fn trigger(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_link_config() -> LinkConfig {
    LinkConfig {
        reconnect_delay_ms: 10,
        ..LinkConfig::default()
    }
}

async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

async fn wait_for_streaming(event_rx: &mut mpsc::Receiver<SessionEvent>) {
    loop {
        match timeout(Duration::from_secs(5), event_rx.recv()).await {
            Ok(Some(SessionEvent::Streaming { .. })) => return,
            Ok(Some(_)) => {}
            _ => panic!("never reached streaming"),
        }
    }
}

#[tokio::test]
async fn supervisor_recovers_from_failures_and_triple_press_raises_alarm() {
    let dir = tempdir().unwrap();
    let store = Arc::new(DeviceStore::open(dir.path()).unwrap());
    store
        .set_last_device("AA:BB:CC:DD:EE:FF", Some("GuardLink Band"))
        .unwrap();

    let transport = ScriptedTransport::failing_first(2);
    let alarm = Arc::new(CountingSink(AtomicUsize::new(0)));
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let ctx = Arc::new(LinkContext {
        transport: transport.clone(),
        store: store.clone(),
        alarm: alarm.clone(),
        events: event_tx,
        link: fast_link_config(),
    });

    let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
    let run = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run().await }
    });

    // Two refused attempts, then the third connects.
    wait_for_streaming(&mut event_rx).await;
    assert_eq!(transport.connect_attempts(), 3);
    assert!(store.is_connected());

    // A burst of three presses raises the alarm exactly once.
    transport.send_chunk(b"P\nP\nP\n");
    assert!(wait_until(Duration::from_secs(5), || {
        alarm.0.load(Ordering::SeqCst) == 1
    })
    .await);

    // One more press opens a fresh window; no second alarm.
    transport.send_chunk(b"P\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alarm.0.load(Ordering::SeqCst), 1);

    supervisor.stop();
    timeout(Duration::from_secs(5), run)
        .await
        .expect("supervisor did not stop")
        .unwrap();
    assert!(!store.is_connected());

    // Nothing fires once the service is down.
    transport.send_chunk(b"P\nP\nP\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alarm.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn marker_frame_raises_alarm_and_remote_close_is_retried() {
    let dir = tempdir().unwrap();
    let store = Arc::new(DeviceStore::open(dir.path()).unwrap());
    store.set_last_device("AA:BB:CC:DD:EE:FF", None).unwrap();

    let transport = ScriptedTransport::new();
    let alarm = Arc::new(CountingSink(AtomicUsize::new(0)));
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let ctx = Arc::new(LinkContext {
        transport: transport.clone(),
        store: store.clone(),
        alarm: alarm.clone(),
        events: event_tx,
        link: fast_link_config(),
    });

    let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
    let run = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run().await }
    });

    wait_for_streaming(&mut event_rx).await;

    // Firmware-aggregated gesture: one marker frame fires immediately.
    transport.send_chunk(b"TRIPLE_PRESS_ACTION\n");
    assert!(wait_until(Duration::from_secs(5), || {
        alarm.0.load(Ordering::SeqCst) == 1
    })
    .await);

    // Remote drop is an ordinary failure: the supervisor reconnects.
    transport.close_remote();
    wait_for_streaming(&mut event_rx).await;
    assert!(transport.connect_attempts() >= 2);

    supervisor.stop();
    timeout(Duration::from_secs(5), run)
        .await
        .expect("supervisor did not stop")
        .unwrap();
}
