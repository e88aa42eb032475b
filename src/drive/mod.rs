//! Fixed-period transmission loop
//!
//! Each tick samples the input, runs the encoder and sends the resulting
//! frame if the negotiation is ready. Frames computed while not ready are
//! published locally and dropped; stale frames are never queued.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::control::{CommandEncoder, ControlFrame};
use crate::error::AppError;
use crate::input::InputSource;
use crate::transport::{Transport, WireMessage};
use crate::utils::LogThrottler;
use crate::{debug_throttled, warn_throttled};

/// Default tick period (ms)
pub const DEFAULT_TICK_MS: u64 = 10;
/// Accepted tick period range (ms)
pub const MIN_TICK_MS: u64 = 1;
pub const MAX_TICK_MS: u64 = 1000;

/// Whether control frames may be sent
pub trait ReadinessGate: Send + Sync {
    fn is_ready(&self) -> bool;
}

/// Gate that is always open or always closed
pub struct StaticGate(pub bool);

impl ReadinessGate for StaticGate {
    fn is_ready(&self) -> bool {
        self.0
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    /// Not ready; the frame was computed and discarded
    Withheld,
    /// The transport refused the frame
    Dropped,
}

/// Loop counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub sent: u64,
    pub withheld: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct LoopCounters {
    ticks: AtomicU64,
    sent: AtomicU64,
    withheld: AtomicU64,
    dropped: AtomicU64,
}

impl LoopCounters {
    fn record(&self, outcome: TickOutcome) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::Sent => &self.sent,
            TickOutcome::Withheld => &self.withheld,
            TickOutcome::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoopStats {
        LoopStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            withheld: self.withheld.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of a running loop's counters
#[derive(Clone)]
pub struct StatsHandle(Arc<LoopCounters>);

impl StatsHandle {
    pub fn snapshot(&self) -> LoopStats {
        self.0.snapshot()
    }
}

pub struct TransmissionLoop {
    input: Box<dyn InputSource>,
    encoder: CommandEncoder,
    gate: Arc<dyn ReadinessGate>,
    transport: Arc<dyn Transport>,
    period: Duration,
    frames: watch::Sender<ControlFrame>,
    counters: Arc<LoopCounters>,
    throttler: LogThrottler,
}

impl TransmissionLoop {
    pub fn new(
        input: Box<dyn InputSource>,
        encoder: CommandEncoder,
        gate: Arc<dyn ReadinessGate>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (frames, _) = watch::channel(ControlFrame::neutral(encoder.config().frame_layout));
        Self {
            input,
            encoder,
            gate,
            transport,
            period: Duration::from_millis(DEFAULT_TICK_MS),
            frames,
            counters: Arc::new(LoopCounters::default()),
            throttler: LogThrottler::default(),
        }
    }

    /// Set the tick period, clamped to 1..=1000 ms
    pub fn with_period_ms(mut self, period_ms: u64) -> Self {
        self.period = Duration::from_millis(period_ms.clamp(MIN_TICK_MS, MAX_TICK_MS));
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn encoder(&self) -> &CommandEncoder {
        &self.encoder
    }

    /// Most recent frame, whether sent or not
    pub fn subscribe_frames(&self) -> watch::Receiver<ControlFrame> {
        self.frames.subscribe()
    }

    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle(self.counters.clone())
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickOutcome {
        let sample = self.input.sample();
        let frame = self.encoder.sample(&sample);
        self.frames.send_replace(frame);

        let outcome = if !self.gate.is_ready() {
            debug_throttled!(
                self.throttler,
                "not_ready",
                "{}, control frame withheld",
                AppError::TransportNotReady
            );
            TickOutcome::Withheld
        } else {
            match self.transport.send(WireMessage::Command(frame.to_bytes())) {
                Ok(()) => {
                    self.throttler.clear("transport_send");
                    self.throttler.clear("not_ready");
                    TickOutcome::Sent
                }
                Err(e) => {
                    warn_throttled!(self.throttler, "transport_send", "Control frame dropped: {}", e);
                    TickOutcome::Dropped
                }
            }
        };

        self.counters.record(outcome);
        outcome
    }

    /// Tick at the configured period until cancelled
    ///
    /// Overrunning ticks are skipped, not queued.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopStats {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Transmission loop started ({} ms period)", self.period.as_millis());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if self.tick() == TickOutcome::Sent && self.counters.sent.load(Ordering::Relaxed) == 1 {
                        debug!("First control frame sent");
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            "Transmission loop stopped: {} ticks, {} sent, {} withheld, {} dropped",
            stats.ticks, stats.sent, stats.withheld, stats.dropped
        );
        stats
    }
}
