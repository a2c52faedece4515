//! Channel engine integration tests: cadence, fetch coordination, fan-out.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use transmitter::morse::SampleSource;
use transmitter::{Channel, ChannelRegistry, Message, MessageStore, Subscriber, ToneGenerator};

const RATE: u32 = 8000;
const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Store that always returns the same message list.
struct FixedStore {
    messages: Vec<Message>,
}

#[async_trait]
impl MessageStore for FixedStore {
    async fn messages_for_channel(&self, _channel_id: &str) -> Result<Vec<Message>> {
        Ok(self.messages.clone())
    }
}

/// Store that succeeds once, then fails on every later query.
struct FlakyStore {
    messages: Vec<Message>,
    queried: Mutex<bool>,
}

impl FlakyStore {
    fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            queried: Mutex::new(false),
        }
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn messages_for_channel(&self, _channel_id: &str) -> Result<Vec<Message>> {
        let mut queried = self.queried.lock();
        if *queried {
            anyhow::bail!("store unavailable");
        }
        *queried = true;
        Ok(self.messages.clone())
    }
}

fn test_channel(store: Arc<dyn MessageStore>) -> Channel {
    Channel::new("/lobby", RATE, WRITE_TIMEOUT, store)
}

fn subscriber(capacity: usize) -> (Subscriber, mpsc::Receiver<Vec<u8>>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel(capacity);
    let connected = Arc::new(AtomicBool::new(true));
    (
        Subscriber::new("peer", tx, Arc::clone(&connected)),
        rx,
        connected,
    )
}

/// Expected frame bytes for a message, starting at sample `offset`.
fn expected_frame(message: &Message, offset: usize, len: usize) -> Vec<u8> {
    let mut generator = ToneGenerator::new(message, RATE);
    for _ in 0..offset {
        generator.next_sample();
    }
    (0..len)
        .map(|_| {
            let sample = generator.next_sample() / 8.0;
            ((sample + 1.0) / 2.0 * 255.0).round() as u8
        })
        .collect()
}

#[tokio::test]
async fn first_tick_waits_for_fetch_and_sends_a_full_frame() {
    let message = Message::new("E", 20, 600);
    let channel = test_channel(Arc::new(FixedStore {
        messages: vec![message.clone()],
    }));
    let (sub, mut rx, _connected) = subscriber(4);
    channel.add_subscriber(sub);

    channel.tick().await;

    let frame = rx.try_recv().expect("first tick should deliver a frame");
    assert_eq!(frame.len(), RATE as usize);
    assert_eq!(frame, expected_frame(&message, 0, RATE as usize));
}

#[tokio::test]
async fn second_tick_continues_the_tone_without_discontinuity() {
    let message = Message::new("E", 20, 600);
    let channel = test_channel(Arc::new(FixedStore {
        messages: vec![message.clone()],
    }));
    let (sub, mut rx, _connected) = subscriber(4);
    channel.add_subscriber(sub);

    channel.tick().await;
    channel.tick().await;

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first, expected_frame(&message, 0, RATE as usize));
    // the tone picks up exactly where the previous frame stopped
    assert_eq!(second, expected_frame(&message, RATE as usize, RATE as usize));
}

#[tokio::test]
async fn store_failure_keeps_stale_mixer_state() {
    let message = Message::new("E", 20, 600);
    let channel = test_channel(Arc::new(FlakyStore::new(vec![message.clone()])));
    let (sub, mut rx, _connected) = subscriber(8);
    channel.add_subscriber(sub);

    // First tick: successful fetch. Later ticks: the store fails, the
    // previous message set keeps playing.
    for _ in 0..4 {
        channel.tick().await;
        // let the in-flight query finish so the next tick harvests it
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for i in 0..4 {
        let frame = rx.try_recv().expect("every tick should deliver a frame");
        assert_eq!(frame, expected_frame(&message, i * RATE as usize, RATE as usize));
    }
}

#[tokio::test]
async fn empty_channel_skips_rendering() {
    let channel = test_channel(Arc::new(FixedStore { messages: vec![] }));
    let (sub, rx, connected) = subscriber(4);
    channel.add_subscriber(sub);

    // Subscriber goes away: receiver dropped, liveness flag cleared.
    drop(rx);
    connected.store(false, std::sync::atomic::Ordering::Relaxed);

    // This tick prunes the dead subscriber...
    channel.tick().await;
    assert_eq!(channel.subscriber_count(), 0);

    // ...and later ticks skip quietly with nobody listening.
    channel.tick().await;
    channel.tick().await;
    assert_eq!(channel.subscriber_count(), 0);
}

#[tokio::test]
async fn slow_subscriber_is_cancelled_without_delaying_others() {
    let message = Message::new("E", 20, 600);
    let channel = test_channel(Arc::new(FixedStore {
        messages: vec![message.clone()],
    }));

    // A stuck subscriber: queue of one, already full, never drained.
    let (stuck_tx, _stuck_rx) = mpsc::channel::<Vec<u8>>(1);
    stuck_tx.try_send(vec![0]).unwrap();
    let stuck = Subscriber::new("stuck", stuck_tx, Arc::new(AtomicBool::new(true)));
    channel.add_subscriber(stuck);

    let (good, mut good_rx, _connected) = subscriber(4);
    channel.add_subscriber(good);

    let started = Instant::now();
    channel.tick().await;
    let elapsed = started.elapsed();

    // The stuck write is cancelled at the shared deadline; the healthy
    // subscriber still gets its frame and the tick finishes promptly.
    let frame = good_rx.try_recv().expect("healthy subscriber should receive the frame");
    assert_eq!(frame.len(), RATE as usize);
    assert!(
        elapsed < Duration::from_secs(1),
        "tick blocked on a stuck subscriber: {elapsed:?}"
    );
}

#[tokio::test]
async fn registry_creates_one_channel_per_id() {
    let store: Arc<dyn MessageStore> = Arc::new(FixedStore { messages: vec![] });
    let registry = ChannelRegistry::new(store, RATE, WRITE_TIMEOUT);

    let (a, _rx_a, _ca) = subscriber(4);
    let (b, _rx_b, _cb) = subscriber(4);
    registry.subscribe("lobby", a);
    registry.subscribe("lobby", b);
    assert_eq!(registry.channel_count(), 1);
    assert_eq!(registry.subscriber_count(), 2);

    let (c, _rx_c, _cc) = subscriber(4);
    registry.subscribe("tower", c);
    assert_eq!(registry.channel_count(), 2);
    assert_eq!(registry.subscriber_count(), 3);
}
