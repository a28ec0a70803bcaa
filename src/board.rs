/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags. The firmware's
/// `board_pins` takes the same GPIOs out of the HAL by name and must be
/// changed together with these numbers.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const LED_PIN: u8 = 21; // User LED, active low
    pub const FLAME_PIN: u8 = 2; // Flame sensor digital out, active low
    pub const I2C_SDA_PIN: u8 = 5; // MPU6050
    pub const I2C_SCL_PIN: u8 = 6;
    pub const LORA_TX_PIN: u8 = 43; // UART1 to LoRa modem RX
    pub const LORA_RX_PIN: u8 = 44;
    pub const BUZZER_PIN: u8 = 3;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(feature = "board-m5stickc")]
mod hw {
    pub const LED_PIN: u8 = 19; // Built-in red LED, active low
    pub const FLAME_PIN: u8 = 26; // Hat header
    pub const I2C_SDA_PIN: u8 = 21; // Internal MPU6886 bus
    pub const I2C_SCL_PIN: u8 = 22;
    pub const LORA_TX_PIN: u8 = 32; // Grove port
    pub const LORA_RX_PIN: u8 = 33;
    pub const BUZZER_PIN: u8 = 2;
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// Passive buzzer tone.
pub const BUZZER_FREQ_HZ: u32 = 2700;

/// LoRa modem UART baud rate.
pub const LORA_BAUD: u32 = 115200;

/// LED blink half-period while halted on a radio init failure.
pub const FATAL_BLINK_MS: u32 = 200;
