//! QuakeWatch — ESP-IDF std firmware
//!
//! One binary per role, selected with a cargo feature:
//!
//! - `role-sensor`: samples the IMU and flame sensor, sends alerts long range.
//! - `role-relay`: deduplicates inbound alerts and forwards them over
//!   ESP-NOW or LoRa depending on distance to the receiver.
//! - `role-receiver`: sounds the buzzer and lights the LED on each alert.
//!
//! Every role runs a single cooperative loop. Telemetry is emitted on the
//! console as NDJSON through the `log` facade.

#[cfg(feature = "role-receiver")]
mod buzzer;
mod radio;
#[cfg(feature = "role-sensor")]
mod sensors;

use std::time::Instant;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, IOPin, Output, PinDriver, Pins};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{self, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use quakewatch::board;
use quakewatch::comm::{self, Interval};
use quakewatch::defaults::REPORT_INTERVAL_MS;
use quakewatch::protocol::{TelemetryBuffer, TelemetryMessage, MAX_TELEMETRY_LEN, VERSION};

use radio::Radios;

#[cfg(not(any(feature = "role-sensor", feature = "role-relay", feature = "role-receiver")))]
compile_error!("enable one of the role-sensor, role-relay or role-receiver features");

#[cfg(feature = "role-sensor")]
const ROLE: &str = "sensor";
#[cfg(feature = "role-relay")]
const ROLE: &str = "relay";
#[cfg(feature = "role-receiver")]
const ROLE: &str = "receiver";

type Led = PinDriver<'static, AnyIOPin, Output>;

// ── Board pins ───────────────────────────────────────────────────────
//
// The HAL hands out pins as typed fields, so `board_pins` names them
// directly. Keep each board's GPIO numbers in step with `quakewatch::board`.

struct BoardPins {
    led: AnyIOPin,
    #[allow(dead_code)]
    flame: AnyIOPin,
    #[allow(dead_code)]
    sda: AnyIOPin,
    #[allow(dead_code)]
    scl: AnyIOPin,
    lora_tx: AnyIOPin,
    lora_rx: AnyIOPin,
    #[allow(dead_code)]
    buzzer: AnyIOPin,
    /// Must be driven high to keep the board powered on battery.
    power_hold: Option<AnyIOPin>,
}

#[cfg(feature = "xiao")]
fn board_pins(pins: Pins) -> BoardPins {
    BoardPins {
        led: pins.gpio21.downgrade(),
        flame: pins.gpio2.downgrade(),
        sda: pins.gpio5.downgrade(),
        scl: pins.gpio6.downgrade(),
        lora_tx: pins.gpio43.downgrade(),
        lora_rx: pins.gpio44.downgrade(),
        buzzer: pins.gpio3.downgrade(),
        power_hold: None,
    }
}

#[cfg(feature = "m5stickc")]
fn board_pins(pins: Pins) -> BoardPins {
    BoardPins {
        led: pins.gpio19.downgrade(),
        flame: pins.gpio26.downgrade(),
        sda: pins.gpio21.downgrade(),
        scl: pins.gpio22.downgrade(),
        lora_tx: pins.gpio32.downgrade(),
        lora_rx: pins.gpio33.downgrade(),
        buzzer: pins.gpio2.downgrade(),
        power_hold: Some(pins.gpio4.downgrade()),
    }
}

// ── Clock and telemetry ──────────────────────────────────────────────

/// Monotonic time since boot.
struct Clock {
    boot: Instant,
}

impl Clock {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    /// Telemetry timestamp (wraps after ~49 days).
    fn ts(&self) -> u32 {
        (self.boot.elapsed().as_millis() & 0xFFFF_FFFF) as u32
    }

    fn uptime_secs(&self) -> u32 {
        self.boot.elapsed().as_secs() as u32
    }
}

/// Write one NDJSON telemetry line to the console.
fn emit(msg: &TelemetryMessage) {
    let mut buf = TelemetryBuffer::new();
    let _ = buf.resize_default(MAX_TELEMETRY_LEN);
    match comm::serialize_message(msg, &mut buf) {
        Some(len) => {
            buf.truncate(len);
            if let Ok(line) = core::str::from_utf8(&buf) {
                log::info!("{}", line.trim_end());
            }
        }
        None => log::warn!("Telemetry line too long, dropped"),
    }
}

/// Blink the LED forever. Used when the radios cannot be brought up.
fn fatal_blink(mut led: Led) -> ! {
    loop {
        let _ = led.toggle();
        FreeRtos::delay_ms(board::FATAL_BLINK_MS);
    }
}

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    let clock = Clock {
        boot: Instant::now(),
    };

    log::info!(
        "QuakeWatch v{} starting as {} on {} (std)",
        VERSION,
        ROLE,
        board::BOARD_NAME
    );

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let pins = board_pins(peripherals.pins);
    log::info!(
        "Pins: LED GPIO{}, flame GPIO{}, I2C GPIO{}/{}, LoRa TX/RX GPIO{}/{}",
        board::LED_PIN,
        board::FLAME_PIN,
        board::I2C_SDA_PIN,
        board::I2C_SCL_PIN,
        board::LORA_TX_PIN,
        board::LORA_RX_PIN
    );

    let _power_hold = match pins.power_hold {
        Some(pin) => {
            let mut p = PinDriver::output(pin)?;
            p.set_high()?;
            Some(p)
        }
        None => None,
    };

    // Active low; start dark.
    let mut led: Led = PinDriver::output(pins.led)?;
    led.set_high()?;

    // ── Radios ───────────────────────────────────────────────────────

    let uart = UartDriver::new(
        peripherals.uart1,
        pins.lora_tx,
        pins.lora_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::new().baudrate(Hertz(board::LORA_BAUD)),
    )?;

    let radios = match radio::init(peripherals.modem, uart, sys_loop, nvs) {
        Ok(r) => r,
        Err(e) => {
            log::error!("Radio init failed: {:?}", e);
            fatal_blink(led);
        }
    };

    // ── Role loop ────────────────────────────────────────────────────

    #[cfg(feature = "role-sensor")]
    let result = {
        use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
        use esp_idf_svc::hal::units::KiloHertz;

        let i2c = I2cDriver::new(
            peripherals.i2c0,
            pins.sda,
            pins.scl,
            &I2cConfig::new().baudrate(KiloHertz(400).into()),
        )?;
        let imu = sensors::Imu::new(i2c)?;
        let flame = sensors::FlameSensor::new(pins.flame)?;
        run_sensor(&clock, radios, imu, flame)
    };

    #[cfg(feature = "role-relay")]
    let result = run_relay(&clock, radios, led);

    #[cfg(feature = "role-receiver")]
    let result = {
        let buzzer = buzzer::Buzzer::new(
            peripherals.ledc.timer0,
            peripherals.ledc.channel0,
            pins.buzzer,
        )?;
        run_receiver(&clock, radios, led, buzzer)
    };

    result
}

// ── Sensor ───────────────────────────────────────────────────────────

#[cfg(feature = "role-sensor")]
fn run_sensor(
    clock: &Clock,
    mut radios: Radios,
    mut imu: sensors::Imu,
    flame: sensors::FlameSensor,
) -> anyhow::Result<()> {
    use quakewatch::defaults::SAMPLE_PERIOD_MS;
    use quakewatch::geo::Transport;
    use quakewatch::protocol::encode;
    use quakewatch::relay::RadioLink;
    use quakewatch::seismic::AccelSample;
    use quakewatch::sensor::{SensorConfig, SensorNode, SensorSample};

    let mut node = SensorNode::new(SensorConfig::new());
    let mut report = Interval::new(REPORT_INTERVAL_MS, clock.now_ms());
    let mut sent: u32 = 0;
    let mut send_failures: u32 = 0;

    log::info!("Calibrating accelerometer, keep the node still");

    loop {
        let now = clock.now_ms();

        let accel = match imu.read_accel() {
            Ok(a) => a,
            Err(e) => {
                log::warn!("IMU read failed: {:?}", e);
                AccelSample::new(0.0, 0.0, 1.0)
            }
        };
        let sample = SensorSample {
            accel,
            flame: flame.detected(),
            gps: None,
        };

        for alert in node.tick(&sample, now) {
            emit(&TelemetryMessage::alert(&alert, clock.ts()));
            let wire = encode(&alert);
            match radios.send(Transport::LongRange, wire.as_bytes()) {
                Ok(()) => sent = sent.wrapping_add(1),
                Err(e) => {
                    send_failures = send_failures.wrapping_add(1);
                    log::warn!("Alert send failed: {:?}", e);
                }
            }
        }

        // Sensors ignore inbound traffic; keep the modem buffer drained.
        while radios.poll().is_some() {}

        if report.poll(now) {
            emit(&node.status(sent, send_failures, clock.uptime_secs()));
        }

        FreeRtos::delay_ms(SAMPLE_PERIOD_MS as u32);
    }
}

// ── Relay ────────────────────────────────────────────────────────────

#[cfg(feature = "role-relay")]
fn run_relay(clock: &Clock, mut radios: Radios, mut led: Led) -> anyhow::Result<()> {
    use quakewatch::relay::{RelayConfig, RelayNode, RelayOutcome};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    let config = RelayConfig::new();
    log::info!(
        "Relay: receiver at {:.6},{:.6}, short range under {:.0} m",
        config.receiver_lat,
        config.receiver_lng,
        config.distance_threshold_m
    );

    let seed = unsafe { esp_idf_svc::sys::esp_random() } as u64;
    let mut node = RelayNode::new(config, SmallRng::seed_from_u64(seed));
    let mut delay = FreeRtos;
    let mut report = Interval::new(REPORT_INTERVAL_MS, clock.now_ms());

    loop {
        let now = clock.now_ms();

        if let Some(frame) = radios.poll() {
            let step = node.handle_frame(frame.as_bytes(), now, &mut radios, &mut delay);
            emit(&step.telemetry(clock.ts()));
            if matches!(step.outcome, RelayOutcome::Forwarded { .. }) {
                let _ = led.toggle();
            }
        }

        if report.poll(now) {
            emit(&node.status(clock.uptime_secs()));
        }

        FreeRtos::delay_ms(1);
    }
}

// ── Receiver ─────────────────────────────────────────────────────────

#[cfg(feature = "role-receiver")]
fn run_receiver(
    clock: &Clock,
    mut radios: Radios,
    mut led: Led,
    mut buzzer: buzzer::Buzzer,
) -> anyhow::Result<()> {
    use quakewatch::alarm::{Alarm, AlarmConfig};

    let mut alarm = Alarm::new(AlarmConfig::new());
    let mut report = Interval::new(REPORT_INTERVAL_MS, clock.now_ms());

    loop {
        let now = clock.now_ms();

        if let Some(frame) = radios.poll() {
            if let Some(alert) = alarm.on_record(&frame, now) {
                emit(&TelemetryMessage::alert(&alert, clock.ts()));
            }
        }

        let active = alarm.poll(now);
        buzzer.set(active);
        let _ = if active { led.set_low() } else { led.set_high() };

        if report.poll(now) {
            emit(&alarm.status(clock.uptime_secs()));
        }

        FreeRtos::delay_ms(1);
    }
}
