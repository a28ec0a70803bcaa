/// Flame sensor debouncing with a leaky counter.
///
/// The counter goes up on every tick the flame sensor reports fire and
/// down (never below zero) on every tick it does not. Intermittent
/// detections therefore accumulate credit and drain slowly, so short
/// sensor dropouts don't reset progress. Once the counter reaches the
/// threshold and the cooldown has passed, a fire alert is raised and the
/// counter restarts from zero.
use crate::defaults::{FIRE_COOLDOWN_MS, FIRE_MIN_COUNT};

#[derive(Debug, Clone, Copy)]
pub struct FireConfig {
    /// Counter value that raises an alert.
    pub min_count: u32,
    /// Minimum gap between two alerts.
    pub cooldown_ms: u64,
}

impl FireConfig {
    pub const fn new() -> Self {
        Self {
            min_count: FIRE_MIN_COUNT,
            cooldown_ms: FIRE_COOLDOWN_MS,
        }
    }
}

impl Default for FireConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FireDebouncer {
    config: FireConfig,
    count: u32,
    last_alert_at: Option<u64>,
}

impl FireDebouncer {
    pub const fn new(config: FireConfig) -> Self {
        Self {
            config,
            count: 0,
            last_alert_at: None,
        }
    }

    /// Feed one flame reading. Returns true when a fire alert should be sent.
    pub fn update(&mut self, flame_detected: bool, now_ms: u64) -> bool {
        if flame_detected {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = self.count.saturating_sub(1);
        }

        if self.count < self.config.min_count || !self.cooled_down(now_ms) {
            return false;
        }

        log::info!("Fire detected after {} ticks of credit", self.count);
        self.count = 0;
        self.last_alert_at = Some(now_ms);
        true
    }

    fn cooled_down(&self, now_ms: u64) -> bool {
        match self.last_alert_at {
            Some(at) => now_ms.saturating_sub(at) > self.config.cooldown_ms,
            None => true,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(d: &mut FireDebouncer, readings: &[u8], start_ms: u64) -> u32 {
        let mut alerts = 0;
        for (i, &r) in readings.iter().enumerate() {
            if d.update(r == 1, start_ms + i as u64 * 10) {
                alerts += 1;
            }
        }
        alerts
    }

    #[test]
    fn three_consecutive_detections_fire() {
        let mut d = FireDebouncer::new(FireConfig::new());
        assert!(!d.update(true, 0));
        assert!(!d.update(true, 10));
        assert!(d.update(true, 20));
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn counter_never_goes_negative() {
        let mut d = FireDebouncer::new(FireConfig::new());
        assert_eq!(feed(&mut d, &[0, 0, 0, 0], 0), 0);
        assert_eq!(d.count(), 0);
        assert_eq!(feed(&mut d, &[1, 1], 100), 0);
        assert_eq!(d.count(), 2);
    }

    #[test]
    fn intermittent_detections_accumulate() {
        let mut d = FireDebouncer::new(FireConfig::new());
        // +1 +1 -1 +1 -1 +1 → 1 2 1 2 1 2, then +1 → 3
        assert_eq!(feed(&mut d, &[1, 1, 0, 1, 0, 1], 0), 0);
        assert_eq!(d.count(), 2);
        assert!(d.update(true, 60));
    }

    #[test]
    fn count_matches_clipped_running_sum() {
        let mut d = FireDebouncer::new(FireConfig {
            min_count: u32::MAX,
            ..FireConfig::new()
        });
        let readings = [0u8, 1, 1, 0, 0, 0, 1, 0, 1, 1, 1, 0];
        let mut expected: i64 = 0;
        for (i, &r) in readings.iter().enumerate() {
            d.update(r == 1, i as u64);
            expected = if r == 1 { expected + 1 } else { (expected - 1).max(0) };
            assert_eq!(d.count() as i64, expected);
        }
    }

    #[test]
    fn cooldown_holds_credit_until_elapsed() {
        let mut d = FireDebouncer::new(FireConfig::new());
        assert_eq!(feed(&mut d, &[1, 1, 1], 0), 1);
        // Keep burning during cooldown: counter climbs but no alert.
        assert_eq!(feed(&mut d, &[1, 1, 1, 1, 1], 1000), 0);
        assert_eq!(d.count(), 5);
        // Alert at t=20, so t=5020 is still inside the window.
        assert!(!d.update(true, 5020));
        assert!(d.update(true, 5021));
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn no_flame_never_fires() {
        let mut d = FireDebouncer::new(FireConfig::new());
        assert_eq!(feed(&mut d, &[0; 50], 0), 0);
    }
}
