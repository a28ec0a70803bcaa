/// Receiver-side alarm timing.
///
/// The receiver switches its buzzer and LED on when a valid alert arrives
/// and off again once `duration_ms` has passed without a newer alert. The
/// main loop polls [`Alarm::poll`] every iteration as part of housekeeping.
use crate::defaults::ALARM_DURATION_MS;
use crate::protocol::{decode, AlertMessage, TelemetryMessage, VERSION};

#[derive(Debug, Clone, Copy)]
pub struct AlarmConfig {
    pub duration_ms: u64,
}

impl AlarmConfig {
    pub const fn new() -> Self {
        Self {
            duration_ms: ALARM_DURATION_MS,
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Alarm {
    config: AlarmConfig,
    active_until: Option<u64>,
    last: Option<AlertMessage>,
    received: u32,
    invalid: u32,
}

impl Alarm {
    pub const fn new(config: AlarmConfig) -> Self {
        Self {
            config,
            active_until: None,
            last: None,
            received: 0,
            invalid: 0,
        }
    }

    /// Handle an inbound record. Invalid kinds are counted and ignored;
    /// a valid alert (re)starts the alarm window.
    pub fn on_record(&mut self, text: &str, now_ms: u64) -> Option<AlertMessage> {
        self.received = self.received.wrapping_add(1);
        let Some(msg) = decode(text) else {
            self.invalid = self.invalid.wrapping_add(1);
            log::warn!("Ignoring malformed alert: {}", text);
            return None;
        };
        log::info!(
            "{} alert from {:.6},{:.6} (mag {:.2})",
            msg.kind.as_str(),
            msg.latitude,
            msg.longitude,
            msg.magnitude
        );
        self.active_until = Some(now_ms + self.config.duration_ms);
        self.last = Some(msg);
        Some(msg)
    }

    /// Whether the buzzer/LED should be on at `now_ms`. Clears the alarm
    /// once its window has passed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.active_until {
            Some(until) if now_ms < until => true,
            Some(_) => {
                self.active_until = None;
                log::debug!("Alarm cleared");
                false
            }
            None => false,
        }
    }

    /// Most recent valid alert, kept after the alarm clears.
    pub fn last_alert(&self) -> Option<&AlertMessage> {
        self.last.as_ref()
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn invalid(&self) -> u32 {
        self.invalid
    }

    /// Periodic status line for the receiver role.
    pub fn status(&self, uptime_secs: u32) -> TelemetryMessage<'static> {
        TelemetryMessage::Status {
            role: "receiver",
            received: self.received,
            fwd_short: 0,
            fwd_long: 0,
            duplicates: 0,
            invalid: self.invalid,
            send_failures: 0,
            uptime: uptime_secs,
            version: VERSION,
        }
    }
}
