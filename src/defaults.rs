/// Compiled-in defaults for detection and relay behavior.
///
/// Every runtime config struct (`SeismicConfig`, `FireConfig`,
/// `RelayConfig`, `SensorConfig`, `AlarmConfig`) is built from these.
/// Nodes construct their config once at startup and never change it.

// ── Seismic detection ──────────────────────────────────────────────

/// Low-pass filter coefficient applied to each new raw magnitude.
pub const QUAKE_FILTER_ALPHA: f32 = 0.5;

/// Filtered magnitude (g) above which a sample votes "shaking".
pub const QUAKE_VOTE_THRESHOLD_G: f32 = 0.12;

/// Number of votes kept in the sliding window.
pub const QUAKE_WINDOW: usize = 10;

/// Votes in the window required to raise a quake alert.
pub const QUAKE_MIN_VOTES: u8 = 4;

/// Minimum time between two quake alerts.
pub const QUAKE_COOLDOWN_MS: u64 = 5000;

/// Samples averaged at startup to seed the filter. 0 disables calibration.
pub const QUAKE_CALIBRATION_SAMPLES: u16 = 10;

/// Accelerometer polling period (≈100 Hz).
pub const SAMPLE_PERIOD_MS: u64 = 10;

/// Standard gravity, for m/s² → g conversion.
pub const STANDARD_GRAVITY: f32 = 9.806_65;

// ── Fire detection ─────────────────────────────────────────────────

/// Leaky counter value at which a fire alert is raised.
pub const FIRE_MIN_COUNT: u32 = 3;

/// Minimum time between two fire alerts.
pub const FIRE_COOLDOWN_MS: u64 = 5000;

/// Magnitude carried by every fire alert.
pub const FIRE_MAGNITUDE: f32 = 1.0;

// ── Relay ──────────────────────────────────────────────────────────

/// Receiver node position (decimal degrees).
pub const RECEIVER_LAT: f64 = 30.768_900;
pub const RECEIVER_LNG: f64 = 76.575_200;

/// Origins closer than this to the receiver use the short-range link.
pub const DISTANCE_THRESHOLD_M: f64 = 50.0;

/// Identical messages seen within this window are dropped.
pub const DEDUPE_WINDOW_MS: u64 = 5000;

/// Ring slots in the dedup cache.
pub const CACHE_CAPACITY: usize = 10;

/// Upper bound for a configured cache capacity.
pub const MAX_CACHE_CAPACITY: usize = 32;

/// Random delay range before a long-range retransmission.
pub const JITTER_MIN_MS: u32 = 50;
pub const JITTER_MAX_MS: u32 = 150;

/// Periodic status report interval.
pub const REPORT_INTERVAL_MS: u64 = 10_000;

// ── Sensor node ────────────────────────────────────────────────────

/// Static coordinate used when the GPS has no fix.
pub const STATIC_LAT: f64 = 30.768_885;
pub const STATIC_LNG: f64 = 76.575_210;

// ── Receiver node ──────────────────────────────────────────────────

/// How long the buzzer/LED stay on after an alert.
pub const ALARM_DURATION_MS: u64 = 3000;
