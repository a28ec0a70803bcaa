/// Seismic detection: low-pass filter plus sliding-window vote.
///
/// Each accelerometer tick is reduced to a gravity-compensated magnitude,
/// smoothed by a first-order exponential filter, and turned into a vote
/// (`filtered > threshold`). A quake is raised when enough of the last
/// [`QUAKE_WINDOW`] votes agree and the cooldown since the previous quake
/// has elapsed. The window is never cleared, so sustained shaking re-fires
/// once per cooldown period.
///
/// A single spike mostly decays through the filter before it can collect
/// enough votes; shaking has to last several ticks to trigger.
use crate::defaults::{
    QUAKE_CALIBRATION_SAMPLES, QUAKE_COOLDOWN_MS, QUAKE_FILTER_ALPHA, QUAKE_MIN_VOTES,
    QUAKE_VOTE_THRESHOLD_G, QUAKE_WINDOW, STANDARD_GRAVITY,
};

/// One 3-axis accelerometer reading in g. `z` is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelSample {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Build a sample from a reading in m/s².
    pub fn from_ms2(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: x / STANDARD_GRAVITY,
            y: y / STANDARD_GRAVITY,
            z: z / STANDARD_GRAVITY,
        }
    }

    /// Remove 1 g from the vertical axis.
    pub fn gravity_compensated(&self) -> Self {
        Self {
            x: self.x,
            y: self.y,
            z: self.z - 1.0,
        }
    }

    /// Euclidean norm of the vector.
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}

/// Seismic detector tuning.
#[derive(Debug, Clone, Copy)]
pub struct SeismicConfig {
    /// Weight of the newest sample in the low-pass filter (0..=1).
    pub alpha: f32,
    /// Filtered magnitude (g) that counts as a "shaking" vote.
    pub vote_threshold: f32,
    /// Votes out of the window needed to raise an alert.
    pub min_votes: u8,
    /// Minimum gap between two alerts.
    pub cooldown_ms: u64,
    /// Startup samples averaged to seed the filter (0 = seed at 0).
    pub calibration_samples: u16,
}

impl SeismicConfig {
    pub const fn new() -> Self {
        Self {
            alpha: QUAKE_FILTER_ALPHA,
            vote_threshold: QUAKE_VOTE_THRESHOLD_G,
            min_votes: QUAKE_MIN_VOTES,
            cooldown_ms: QUAKE_COOLDOWN_MS,
            calibration_samples: QUAKE_CALIBRATION_SAMPLES,
        }
    }
}

impl Default for SeismicConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A quake detection, carrying the filtered magnitude that raised it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuakeTrigger {
    pub magnitude: f32,
}

/// Filter + vote state. Owned by the sensor node, updated once per tick.
pub struct SignalConditioner {
    config: SeismicConfig,
    filtered: f32,
    window: [bool; QUAKE_WINDOW],
    write_index: usize,
    last_alert_at: Option<u64>,
    calibration_left: u16,
    calibration_sum: f32,
}

impl SignalConditioner {
    pub const fn new(config: SeismicConfig) -> Self {
        Self {
            config,
            filtered: 0.0,
            window: [false; QUAKE_WINDOW],
            write_index: 0,
            last_alert_at: None,
            calibration_left: config.calibration_samples,
            calibration_sum: 0.0,
        }
    }

    /// Feed one raw accelerometer sample (gravity still included).
    pub fn update(&mut self, sample: AccelSample, now_ms: u64) -> Option<QuakeTrigger> {
        let raw = sample.gravity_compensated().magnitude();
        self.update_magnitude(raw, now_ms)
    }

    /// Feed one gravity-compensated magnitude in g.
    ///
    /// Non-finite readings are discarded so one bad sample cannot poison
    /// the filter.
    pub fn update_magnitude(&mut self, raw: f32, now_ms: u64) -> Option<QuakeTrigger> {
        if !raw.is_finite() {
            log::warn!("Discarding non-finite accelerometer magnitude: {}", raw);
            return None;
        }

        if self.calibration_left > 0 {
            self.calibrate(raw);
            return None;
        }

        let alpha = self.config.alpha;
        self.filtered = alpha * raw + (1.0 - alpha) * self.filtered;

        self.window[self.write_index] = self.filtered > self.config.vote_threshold;
        self.write_index = (self.write_index + 1) % QUAKE_WINDOW;

        if self.shake_count() < self.config.min_votes || !self.cooled_down(now_ms) {
            return None;
        }

        self.last_alert_at = Some(now_ms);
        log::info!(
            "Quake detected: filtered={:.3}g votes={}/{}",
            self.filtered,
            self.shake_count(),
            QUAKE_WINDOW
        );
        Some(QuakeTrigger {
            magnitude: self.filtered,
        })
    }

    fn calibrate(&mut self, raw: f32) {
        self.calibration_sum += raw;
        self.calibration_left -= 1;
        if self.calibration_left == 0 {
            self.filtered = self.calibration_sum / self.config.calibration_samples as f32;
            log::info!("Seismic baseline calibrated: {:.3}g", self.filtered);
        }
    }

    fn cooled_down(&self, now_ms: u64) -> bool {
        match self.last_alert_at {
            Some(at) => now_ms.saturating_sub(at) > self.config.cooldown_ms,
            None => true,
        }
    }

    /// Number of "shaking" votes in the current window.
    pub fn shake_count(&self) -> u8 {
        self.window.iter().filter(|&&v| v).count() as u8
    }

    /// Current low-pass filter output.
    pub fn filtered(&self) -> f32 {
        self.filtered
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration_left > 0
    }
}
