//! Sensor-node inputs: the MPU6050/MPU6886 accelerometer on I2C and the
//! flame sensor's digital output.

use esp_idf_svc::hal::delay::BLOCK;
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, PinDriver};
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::sys::EspError;

use quakewatch::seismic::AccelSample;

const MPU_ADDR: u8 = 0x68;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_ACCEL_XOUT_H: u8 = 0x3B;

/// Counts per g at the power-on ±2 g range.
const LSB_PER_G: f32 = 16384.0;

pub struct Imu {
    i2c: I2cDriver<'static>,
}

impl Imu {
    /// Wake the IMU out of sleep.
    pub fn new(mut i2c: I2cDriver<'static>) -> Result<Self, EspError> {
        i2c.write(MPU_ADDR, &[REG_PWR_MGMT_1, 0x00], BLOCK)?;
        log::info!("IMU awake at 0x{:02x}", MPU_ADDR);
        Ok(Self { i2c })
    }

    pub fn read_accel(&mut self) -> Result<AccelSample, EspError> {
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(MPU_ADDR, &[REG_ACCEL_XOUT_H], &mut raw, BLOCK)?;

        let axis = |hi: u8, lo: u8| i16::from_be_bytes([hi, lo]) as f32 / LSB_PER_G;
        Ok(AccelSample::new(
            axis(raw[0], raw[1]),
            axis(raw[2], raw[3]),
            axis(raw[4], raw[5]),
        ))
    }
}

/// Flame sensor module; the comparator output pulls low on flame.
pub struct FlameSensor {
    pin: PinDriver<'static, AnyIOPin, Input>,
}

impl FlameSensor {
    pub fn new(pin: AnyIOPin) -> Result<Self, EspError> {
        Ok(Self {
            pin: PinDriver::input(pin)?,
        })
    }

    pub fn detected(&self) -> bool {
        self.pin.is_low()
    }
}
