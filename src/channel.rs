//! Per-channel broadcast engine: fixed-cadence fetch → render → fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::morse::message::Message;
use crate::morse::mixer::Mixer;
use crate::morse::SampleSource;
use crate::store::MessageStore;

/// Cadence of the broadcast loop: one second of audio per tick.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One connected client, as seen by a channel.
///
/// The transport owns the socket; the channel only observes the liveness
/// flag and queues frames. A subscriber observed dead is pruned from the
/// set, never closed from here.
pub struct Subscriber {
    peer: String,
    tx: mpsc::Sender<Vec<u8>>,
    connected: Arc<AtomicBool>,
}

impl Subscriber {
    pub fn new(peer: impl Into<String>, tx: mpsc::Sender<Vec<u8>>, connected: Arc<AtomicBool>) -> Self {
        Self {
            peer: peer.into(),
            tx,
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// State touched only inside a tick. The surrounding mutex makes ticks for
/// one channel mutually exclusive.
struct TickState {
    mixer: Mixer,
    fetch: Option<JoinHandle<anyhow::Result<Vec<Message>>>>,
    first_run: bool,
}

/// One broadcast group bound to a channel id.
pub struct Channel {
    id: String,
    sample_rate: u32,
    write_timeout: Duration,
    store: Arc<dyn MessageStore>,
    /// Own lock: subscriber-add may race with an in-progress tick.
    subscribers: Mutex<Vec<Subscriber>>,
    state: tokio::sync::Mutex<TickState>,
}

impl Channel {
    pub fn new(
        id: impl Into<String>,
        sample_rate: u32,
        write_timeout: Duration,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            id: id.into(),
            sample_rate,
            write_timeout,
            store,
            subscribers: Mutex::new(Vec::new()),
            state: tokio::sync::Mutex::new(TickState {
                mixer: Mixer::new(sample_rate),
                fetch: None,
                first_run: true,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Safe to call concurrently with an in-progress tick.
    pub fn add_subscriber(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.lock();
        info!(channel = %self.id, peer = %subscriber.peer, "subscriber joined");
        subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drive the channel at the fixed cadence. Never returns; an empty
    /// channel keeps ticking but skips rendering.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One cycle of fetch coordination, render and fan-out. All failures are
    /// logged and contained here; nothing propagates to the driver.
    pub async fn tick(&self) {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        // Single-flight refresh of the desired message set.
        if state.fetch.is_none() {
            let store = Arc::clone(&self.store);
            let id = self.id.clone();
            state.fetch = Some(tokio::spawn(async move {
                store.messages_for_channel(&id).await
            }));
        }

        // The very first tick waits for the query so the first frame carries
        // real data; afterwards only completed queries are harvested and a
        // still-pending one leaves the mixer untouched.
        let harvest = state.first_run || state.fetch.as_ref().is_some_and(|f| f.is_finished());
        if harvest {
            if let Some(fetch) = state.fetch.take() {
                match fetch.await {
                    Ok(Ok(messages)) => {
                        state.mixer.sync(&messages);
                        state.first_run = false;
                    }
                    Ok(Err(e)) => warn!(channel = %self.id, error = %e, "message fetch failed"),
                    Err(e) => warn!(channel = %self.id, error = %e, "message fetch task failed"),
                }
            }
        }

        if self.subscribers.lock().is_empty() {
            debug!(channel = %self.id, "no subscribers");
            return;
        }

        // One second of unsigned 8-bit audio.
        let mut frame = vec![0u8; self.sample_rate as usize];
        for byte in frame.iter_mut() {
            let sample = state.mixer.next_sample();
            *byte = ((sample + 1.0) / 2.0 * 255.0).round() as u8;
        }

        self.send_frame(frame).await;
        debug!(channel = %self.id, elapsed = ?started.elapsed(), "tick complete");
    }

    /// Prune dead subscribers, then write the frame to every remaining one
    /// concurrently. All writes share one deadline; a timeout or failure on
    /// one subscriber never affects the others or the tick itself.
    async fn send_frame(&self, frame: Vec<u8>) {
        let targets: Vec<(String, mpsc::Sender<Vec<u8>>)> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| {
                if s.is_connected() {
                    true
                } else {
                    info!(channel = %self.id, peer = %s.peer, "pruning dead subscriber");
                    false
                }
            });
            subscribers
                .iter()
                .map(|s| (s.peer.clone(), s.tx.clone()))
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        let deadline = Instant::now() + self.write_timeout;
        let id = self.id.as_str();
        let sends = targets.into_iter().map(|(peer, tx)| {
            let frame = frame.clone();
            async move {
                match time::timeout_at(deadline, tx.send(frame)).await {
                    Ok(Ok(())) => debug!(channel = %id, peer = %peer, "frame queued"),
                    Ok(Err(_)) => warn!(channel = %id, peer = %peer, "subscriber queue closed"),
                    Err(_) => warn!(channel = %id, peer = %peer, "frame write timed out"),
                }
            }
        });
        join_all(sends).await;
    }
}

/// All live channels, keyed by channel id. A channel is created (and its
/// cadence loop spawned) when its first subscriber arrives.
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<Channel>>,
    store: Arc<dyn MessageStore>,
    sample_rate: u32,
    write_timeout: Duration,
}

impl ChannelRegistry {
    pub fn new(store: Arc<dyn MessageStore>, sample_rate: u32, write_timeout: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            store,
            sample_rate,
            write_timeout,
        }
    }

    /// Attach a subscriber to a channel, creating it on first use.
    pub fn subscribe(&self, channel_id: &str, subscriber: Subscriber) -> Arc<Channel> {
        let channel = self
            .channels
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                info!(channel = %channel_id, "creating channel");
                let channel = Arc::new(Channel::new(
                    channel_id,
                    self.sample_rate,
                    self.write_timeout,
                    Arc::clone(&self.store),
                ));
                tokio::spawn(Arc::clone(&channel).run());
                channel
            })
            .clone();
        channel.add_subscriber(subscriber);
        channel
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.channels.iter().map(|c| c.subscriber_count()).sum()
    }
}
