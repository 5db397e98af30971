//! Speaking-level indicator.
//!
//! While a card's participant holds the floor a ticker samples a
//! [`LevelMeter`] and stores a level in `0..=3`. Everyone else reads 0.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

pub const MAX_LEVEL: u8 = 3;

/// Source of speaking levels for a peer.
pub trait LevelMeter: Send + Sync {
    /// Level in `0..=MAX_LEVEL`.
    fn sample(&self, peer_id: &str) -> u8;
}

/// Placeholder animation: a uniformly random level each tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLevels;

impl LevelMeter for RandomLevels {
    fn sample(&self, _peer_id: &str) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_LEVEL)
    }
}

/// Real audio level in `0.0..=1.0` for a peer, when the media layer has one.
pub trait AudioLevels: Send + Sync {
    fn level(&self, peer_id: &str) -> Option<f32>;
}

/// Discretizes a real audio level into the indicator's steps.
pub struct MeteredLevels<A> {
    source: A,
}

impl<A: AudioLevels> MeteredLevels<A> {
    pub fn new(source: A) -> Self {
        Self { source }
    }
}

impl<A: AudioLevels> LevelMeter for MeteredLevels<A> {
    fn sample(&self, peer_id: &str) -> u8 {
        self.source
            .level(peer_id)
            .filter(|l| l.is_finite())
            .map(|l| (l.clamp(0.0, 1.0) * MAX_LEVEL as f32).round() as u8)
            .unwrap_or(0)
    }
}

/// Ticker owned by a card. Dropping it stops the ticker.
pub struct SpeakingIndicator {
    peer_id: String,
    meter: Arc<dyn LevelMeter>,
    tick: Duration,
    level: Arc<AtomicU8>,
    ticker: Option<JoinHandle<()>>,
}

impl SpeakingIndicator {
    pub fn new(peer_id: impl Into<String>, meter: Arc<dyn LevelMeter>, tick: Duration) -> Self {
        Self {
            peer_id: peer_id.into(),
            meter,
            tick,
            level: Arc::new(AtomicU8::new(0)),
            ticker: None,
        }
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start or stop ticking. Stopping resets the level to 0.
    pub fn set_active(&mut self, active: bool) {
        match (active, self.ticker.is_some()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    fn start(&mut self) {
        let peer_id = self.peer_id.clone();
        let meter = Arc::clone(&self.meter);
        let level = Arc::clone(&self.level);
        let tick = self.tick;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                level.store(meter.sample(&peer_id).min(MAX_LEVEL), Ordering::Relaxed);
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.level.store(0, Ordering::Relaxed);
    }
}

impl Drop for SpeakingIndicator {
    fn drop(&mut self) {
        self.stop();
    }
}
