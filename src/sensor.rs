/// Originating-node pipeline.
///
/// Once per tick the sensor node feeds the flame reading to the
/// [`FireDebouncer`] and the accelerometer reading to the
/// [`SignalConditioner`], then stamps any resulting alerts with the
/// current position. Position comes from the GPS when it has a fix and
/// from a configured static coordinate otherwise.
use heapless::Vec;

use crate::defaults::{FIRE_MAGNITUDE, STATIC_LAT, STATIC_LNG};
use crate::fire::{FireConfig, FireDebouncer};
use crate::protocol::{AlertKind, AlertMessage, TelemetryMessage, VERSION};
use crate::seismic::{AccelSample, SeismicConfig, SignalConditioner};

/// A GPS position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u32,
    pub valid: bool,
}

impl GpsFix {
    /// "No fix" sentinel.
    pub const NONE: GpsFix = GpsFix {
        latitude: 0.0,
        longitude: 0.0,
        satellites: 0,
        valid: false,
    };

    pub const fn new(latitude: f64, longitude: f64, satellites: u32) -> Self {
        Self {
            latitude,
            longitude,
            satellites,
            valid: true,
        }
    }
}

/// Everything the sample source hands over in one tick.
#[derive(Debug, Clone, Copy)]
pub struct SensorSample {
    pub accel: AccelSample,
    pub flame: bool,
    /// `None` on boards without a GPS receiver.
    pub gps: Option<GpsFix>,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorConfig {
    pub seismic: SeismicConfig,
    pub fire: FireConfig,
    /// Position reported while the GPS has no fix.
    pub static_lat: f64,
    pub static_lng: f64,
}

impl SensorConfig {
    pub const fn new() -> Self {
        Self {
            seismic: SeismicConfig::new(),
            fire: FireConfig::new(),
            static_lat: STATIC_LAT,
            static_lng: STATIC_LNG,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters reported by the sensor node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStats {
    pub fire_alerts: u32,
    pub quake_alerts: u32,
}

pub struct SensorNode {
    config: SensorConfig,
    fire: FireDebouncer,
    seismic: SignalConditioner,
    stats: SensorStats,
}

impl SensorNode {
    pub const fn new(config: SensorConfig) -> Self {
        Self {
            fire: FireDebouncer::new(config.fire),
            seismic: SignalConditioner::new(config.seismic),
            config,
            stats: SensorStats {
                fire_alerts: 0,
                quake_alerts: 0,
            },
        }
    }

    /// Run both detectors for one tick. Fire alerts come first.
    pub fn tick(&mut self, sample: &SensorSample, now_ms: u64) -> Vec<AlertMessage, 2> {
        let mut alerts = Vec::new();

        if self.fire.update(sample.flame, now_ms) {
            self.stats.fire_alerts = self.stats.fire_alerts.wrapping_add(1);
            let _ = alerts.push(self.stamp(AlertKind::Fire, FIRE_MAGNITUDE, sample.gps));
        }

        if let Some(trigger) = self.seismic.update(sample.accel, now_ms) {
            self.stats.quake_alerts = self.stats.quake_alerts.wrapping_add(1);
            let _ = alerts.push(self.stamp(AlertKind::Quake, trigger.magnitude, sample.gps));
        }

        alerts
    }

    /// Attach the best known position to an alert.
    fn stamp(&self, kind: AlertKind, magnitude: f32, gps: Option<GpsFix>) -> AlertMessage {
        let static_pos = AlertMessage::new(
            kind,
            self.config.static_lat,
            self.config.static_lng,
            magnitude,
        );
        match gps {
            Some(fix) if fix.valid => {
                AlertMessage::new(kind, fix.latitude, fix.longitude, magnitude)
                    .with_satellites(fix.satellites)
            }
            Some(_) => {
                log::debug!("GPS has no fix, using static position");
                static_pos
            }
            None => static_pos,
        }
    }

    pub fn stats(&self) -> SensorStats {
        self.stats
    }

    pub fn is_calibrating(&self) -> bool {
        self.seismic.is_calibrating()
    }

    /// Periodic status line. `received` counts alerts raised locally and
    /// `fwd_long` those handed to the radio, the only link a sensor uses.
    pub fn status(
        &self,
        sent: u32,
        send_failures: u32,
        uptime_secs: u32,
    ) -> TelemetryMessage<'static> {
        TelemetryMessage::Status {
            role: "sensor",
            received: self.stats.fire_alerts.wrapping_add(self.stats.quake_alerts),
            fwd_short: 0,
            fwd_long: sent,
            duplicates: 0,
            invalid: 0,
            send_failures,
            uptime: uptime_secs,
            version: VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    const STILL: AccelSample = AccelSample::new(0.0, 0.0, 1.0);
    const SHAKING: AccelSample = AccelSample::new(0.5, 0.0, 1.0);

    fn node() -> SensorNode {
        SensorNode::new(SensorConfig {
            seismic: SeismicConfig {
                calibration_samples: 0,
                ..SeismicConfig::new()
            },
            ..SensorConfig::new()
        })
    }

    fn sample(accel: AccelSample, flame: bool, gps: Option<GpsFix>) -> SensorSample {
        SensorSample { accel, flame, gps }
    }

    #[test]
    fn quiet_ticks_raise_nothing() {
        let mut n = node();
        for i in 0..100u64 {
            assert!(n.tick(&sample(STILL, false, None), i * 10).is_empty());
        }
        assert_eq!(n.stats(), SensorStats::default());
    }

    #[test]
    fn fire_uses_static_position_without_gps() {
        let mut n = node();
        let mut raised = Vec::<AlertMessage, 2>::new();
        for i in 0..3u64 {
            raised = n.tick(&sample(STILL, true, None), i * 10);
        }
        assert_eq!(raised.len(), 1);
        assert_eq!(
            encode(&raised[0]).as_str(),
            "FIRE,30.768885,76.575210,1.00"
        );
    }

    #[test]
    fn fire_uses_gps_fix_with_satellites() {
        let mut n = node();
        let fix = Some(GpsFix::new(12.5, -45.25, 8));
        let mut raised = Vec::<AlertMessage, 2>::new();
        for i in 0..3u64 {
            raised = n.tick(&sample(STILL, true, fix), i * 10);
        }
        assert_eq!(
            encode(&raised[0]).as_str(),
            "FIRE,12.500000,-45.250000,1.00,Sats:8"
        );
    }

    #[test]
    fn no_fix_sentinel_falls_back_to_static() {
        let mut n = node();
        let mut raised = Vec::<AlertMessage, 2>::new();
        for i in 0..3u64 {
            raised = n.tick(&sample(STILL, true, Some(GpsFix::NONE)), i * 10);
        }
        assert_eq!(raised[0].latitude, STATIC_LAT);
        assert_eq!(raised[0].satellites, None);
    }

    #[test]
    fn fire_and_quake_in_same_tick_fire_first() {
        let mut n = node();
        let mut raised = Vec::<AlertMessage, 2>::new();
        for i in 0..4u64 {
            raised = n.tick(&sample(SHAKING, i >= 1, None), i * 10);
        }
        assert_eq!(raised.len(), 2);
        assert_eq!(raised[0].kind, AlertKind::Fire);
        assert_eq!(raised[1].kind, AlertKind::Quake);
        assert_eq!(n.stats().fire_alerts, 1);
        assert_eq!(n.stats().quake_alerts, 1);
    }

    #[test]
    fn status_maps_sensor_counters() {
        let mut n = node();
        for i in 0..3u64 {
            n.tick(&sample(STILL, true, None), i * 10);
        }
        match n.status(1, 2, 60) {
            TelemetryMessage::Status {
                role,
                received,
                fwd_short,
                fwd_long,
                duplicates,
                invalid,
                send_failures,
                uptime,
                version,
            } => {
                assert_eq!(role, "sensor");
                // Alerts raised locally.
                assert_eq!(received, 1);
                // Sensors only transmit long range.
                assert_eq!(fwd_short, 0);
                assert_eq!(fwd_long, 1);
                assert_eq!(duplicates, 0);
                assert_eq!(invalid, 0);
                assert_eq!(send_failures, 2);
                assert_eq!(uptime, 60);
                assert_eq!(version, VERSION);
            }
            _ => panic!("expected status"),
        }
    }

    #[test]
    fn default_node_calibrates_first() {
        let n = SensorNode::new(SensorConfig::new());
        assert!(n.is_calibrating());
    }
}
