/// Relay orchestrator: receive → validate → dedup → forward.
///
/// One call to [`RelayNode::handle_frame`] walks a single inbound frame
/// through the relay state machine:
///
/// ```text
/// Idle → Receiving → Validating ─┬─ unknown kind ──────────────→ Dropped → Idle
///                                └→ DedupCheck ─┬─ seen recently → Dropped → Idle
///                                               └→ Forwarding ─────────────→ Idle
/// ```
///
/// A message is recorded in the dedup cache *before* it is sent, so a copy
/// that echoes back during the pre-send jitter is already a duplicate.
///
/// The jitter delay before a long-range send is a blocking wait on the
/// node's only execution context: nothing else is received or serviced
/// until it ends.
use embedded_hal::delay::DelayNs;
use heapless::Vec;
use rand_core::RngCore;

use crate::comm::read_frame;
use crate::dedup::DedupCache;
use crate::defaults::{
    CACHE_CAPACITY, DEDUPE_WINDOW_MS, DISTANCE_THRESHOLD_M, JITTER_MAX_MS, JITTER_MIN_MS,
    RECEIVER_LAT, RECEIVER_LNG,
};
use crate::geo::{distance_m, select_transport, Transport};
use crate::protocol::{decode, TelemetryMessage, WireRecord, VERSION};

/// Outbound radio access. Implemented by the firmware over ESP-NOW and the
/// LoRa modem; the relay never retries a failed send.
pub trait RadioLink {
    fn send(&mut self, transport: Transport, payload: &[u8]) -> Result<(), SendError>;
}

/// Why a transmission did not go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Transceiver busy
    Busy,
    /// Peer or modem rejected the frame
    Nak,
    /// Bus or driver error
    Io,
}

/// Why an inbound frame was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Kind prefix is neither FIRE nor QUAKE
    Malformed,
    /// Same text forwarded within the dedup window
    Duplicate,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Malformed => "malformed",
            DropReason::Duplicate => "duplicate",
        }
    }
}

/// Relay parameters, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    pub receiver_lat: f64,
    pub receiver_lng: f64,
    /// Origins closer than this go out on the short-range link.
    pub distance_threshold_m: f64,
    pub dedupe_window_ms: u64,
    pub cache_capacity: usize,
    /// Pick the link by distance. When false every message goes long range.
    pub hybrid_routing: bool,
    pub jitter_min_ms: u32,
    pub jitter_max_ms: u32,
}

impl RelayConfig {
    pub const fn new() -> Self {
        Self {
            receiver_lat: RECEIVER_LAT,
            receiver_lng: RECEIVER_LNG,
            distance_threshold_m: DISTANCE_THRESHOLD_M,
            dedupe_window_ms: DEDUPE_WINDOW_MS,
            cache_capacity: CACHE_CAPACITY,
            hybrid_routing: true,
            jitter_min_ms: JITTER_MIN_MS,
            jitter_max_ms: JITTER_MAX_MS,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Named relay states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Receiving,
    Validating,
    DedupCheck,
    Dropped,
    Forwarding,
}

/// Cumulative counters. Observability only; they never steer the flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u32,
    pub invalid: u32,
    pub duplicates: u32,
    pub forwarded_short: u32,
    pub forwarded_long: u32,
    pub send_failures: u32,
}

/// Result of one frame's trip through the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayOutcome {
    Forwarded {
        transport: Transport,
        /// Set when hybrid routing measured the distance
        distance_m: Option<f64>,
    },
    SendFailed {
        transport: Transport,
        error: SendError,
    },
    Dropped(DropReason),
}

/// The bounded record that was processed, with what happened to it.
#[derive(Debug, Clone)]
pub struct RelayStep {
    pub record: WireRecord,
    pub outcome: RelayOutcome,
}

impl RelayStep {
    /// Telemetry line describing this step.
    pub fn telemetry(&self, ts: u32) -> TelemetryMessage<'_> {
        match self.outcome {
            RelayOutcome::Forwarded {
                transport,
                distance_m,
            } => TelemetryMessage::Forward {
                msg: self.record.as_str(),
                link: transport.as_str(),
                dist_m: distance_m,
                ts,
            },
            RelayOutcome::SendFailed { .. } => TelemetryMessage::Drop {
                msg: self.record.as_str(),
                reason: "send_failed",
                ts,
            },
            RelayOutcome::Dropped(reason) => TelemetryMessage::Drop {
                msg: self.record.as_str(),
                reason: reason.as_str(),
                ts,
            },
        }
    }
}

/// Relay node state: dedup cache, counters and the current state.
pub struct RelayNode<R> {
    config: RelayConfig,
    cache: DedupCache,
    stats: RelayStats,
    state: RelayState,
    trace: Vec<RelayState, 6>,
    rng: R,
}

impl<R: RngCore> RelayNode<R> {
    /// `rng` supplies the pre-send jitter.
    pub fn new(config: RelayConfig, rng: R) -> Self {
        Self {
            cache: DedupCache::new(config.cache_capacity, config.dedupe_window_ms),
            config,
            stats: RelayStats::default(),
            state: RelayState::Idle,
            trace: Vec::new(),
            rng,
        }
    }

    /// Process one complete inbound frame and return to `Idle`.
    pub fn handle_frame<L: RadioLink, D: DelayNs>(
        &mut self,
        frame: &[u8],
        now_ms: u64,
        link: &mut L,
        delay: &mut D,
    ) -> RelayStep {
        self.trace.clear();
        self.transition(RelayState::Receiving);
        let record = read_frame(frame);
        self.stats.received = self.stats.received.wrapping_add(1);

        self.transition(RelayState::Validating);
        let Some(msg) = decode(&record) else {
            self.stats.invalid = self.stats.invalid.wrapping_add(1);
            log::warn!("Dropping malformed frame: {}", record.as_str());
            return self.discard(record, DropReason::Malformed);
        };

        self.transition(RelayState::DedupCheck);
        if self.cache.is_duplicate(&record, now_ms) {
            self.stats.duplicates = self.stats.duplicates.wrapping_add(1);
            log::info!("Duplicate suppressed: {}", record.as_str());
            return self.discard(record, DropReason::Duplicate);
        }
        self.cache.record(&record, now_ms);

        self.transition(RelayState::Forwarding);
        let (transport, distance) = if self.config.hybrid_routing {
            let d = distance_m(
                msg.latitude,
                msg.longitude,
                self.config.receiver_lat,
                self.config.receiver_lng,
            );
            (select_transport(d, self.config.distance_threshold_m), Some(d))
        } else {
            (Transport::LongRange, None)
        };

        if transport == Transport::LongRange {
            let jitter = self.jitter_ms();
            log::debug!("Holding {} ms before long-range send", jitter);
            delay.delay_ms(jitter);
        }

        let outcome = match link.send(transport, record.as_bytes()) {
            Ok(()) => {
                match transport {
                    Transport::ShortRange => {
                        self.stats.forwarded_short = self.stats.forwarded_short.wrapping_add(1)
                    }
                    Transport::LongRange => {
                        self.stats.forwarded_long = self.stats.forwarded_long.wrapping_add(1)
                    }
                }
                match distance {
                    Some(d) => log::info!(
                        "Forwarded {} via {} ({:.1} m)",
                        record.as_str(),
                        transport.as_str(),
                        d
                    ),
                    None => log::info!("Forwarded {} via {}", record.as_str(), transport.as_str()),
                }
                RelayOutcome::Forwarded {
                    transport,
                    distance_m: distance,
                }
            }
            Err(error) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                log::warn!("{} send failed: {:?}", transport.as_str(), error);
                RelayOutcome::SendFailed { transport, error }
            }
        };

        self.transition(RelayState::Idle);
        RelayStep { record, outcome }
    }

    fn discard(&mut self, record: WireRecord, reason: DropReason) -> RelayStep {
        self.transition(RelayState::Dropped);
        self.transition(RelayState::Idle);
        RelayStep {
            record,
            outcome: RelayOutcome::Dropped(reason),
        }
    }

    fn transition(&mut self, next: RelayState) {
        log::trace!("relay: {:?} -> {:?}", self.state, next);
        self.state = next;
        let _ = self.trace.push(next);
    }

    /// Uniform in `jitter_min_ms..=jitter_max_ms`.
    fn jitter_ms(&mut self) -> u32 {
        let min = self.config.jitter_min_ms;
        let span = self.config.jitter_max_ms.saturating_sub(min).saturating_add(1);
        min + self.rng.next_u32() % span
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// States visited while handling the most recent frame.
    pub fn trace(&self) -> &[RelayState] {
        &self.trace
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Periodic status line.
    pub fn status(&self, uptime_secs: u32) -> TelemetryMessage<'static> {
        TelemetryMessage::Status {
            role: "relay",
            received: self.stats.received,
            fwd_short: self.stats.forwarded_short,
            fwd_long: self.stats.forwarded_long,
            duplicates: self.stats.duplicates,
            invalid: self.stats.invalid,
            send_failures: self.stats.send_failures,
            uptime: uptime_secs,
            version: VERSION,
        }
    }
}
