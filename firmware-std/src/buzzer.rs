//! Buzzer driver using ESP-IDF LEDC PWM.
//!
//! Drives a passive buzzer at the board-configured frequency. The receiver
//! loop switches it on and off to follow the alarm window.

use std::time::Duration;

use esp_idf_svc::hal::gpio::OutputPin;
use esp_idf_svc::hal::ledc::{
    config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution,
};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::units::Hertz;

use quakewatch::board;

pub struct Buzzer {
    channel: LedcDriver<'static>,
    max_duty: u32,
    on: bool,
}

impl Buzzer {
    pub fn new<T, C>(
        timer: impl Peripheral<P = T> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = impl OutputPin> + 'static,
    ) -> anyhow::Result<Self>
    where
        T: LedcTimer + 'static,
        C: LedcChannel<SpeedMode = T::SpeedMode> + 'static,
    {
        let timer_config = TimerConfig::new()
            .frequency(Hertz(board::BUZZER_FREQ_HZ))
            .resolution(Resolution::Bits8);

        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;
        let channel = LedcDriver::new(channel, timer_driver, pin)?;
        let max_duty = channel.get_max_duty();
        log::info!("Buzzer ready on GPIO{}", board::BUZZER_PIN);

        let mut buzzer = Self {
            channel,
            max_duty,
            on: false,
        };

        // Boot beep
        buzzer.set(true);
        std::thread::sleep(Duration::from_millis(200));
        buzzer.set(false);

        Ok(buzzer)
    }

    /// Sound or silence the buzzer. Repeated calls with the same state
    /// do not touch the peripheral.
    pub fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        let duty = if on { self.max_duty / 2 } else { 0 };
        if let Err(e) = self.channel.set_duty(duty) {
            log::warn!("Buzzer duty update failed: {:?}", e);
            return;
        }
        self.on = on;
    }
}
