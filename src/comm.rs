/// Communication helpers shared by all node roles.
///
/// - Inbound radio payloads are copied into a bounded [`WireRecord`].
/// - The UART-attached LoRa modem speaks line-oriented text, accumulated
///   with [`LineReader`] and picked apart by [`parse_modem_rx`].
/// - Telemetry goes out on serial as newline-delimited JSON.

use crate::protocol::{TelemetryMessage, WireRecord, MAX_WIRE_LEN};

/// Serial baud rate
pub const SERIAL_BAUD: u32 = 115200;

/// Longest modem line (`+RCV=` header plus a full wire record).
pub const MAX_LINE_LEN: usize = 128;

/// Copy an inbound payload into a bounded record.
///
/// Reading stops at [`MAX_WIRE_LEN`] bytes even if more remain, and at the
/// first non-ASCII or NUL byte. Trailing CR/LF is dropped.
pub fn read_frame(payload: &[u8]) -> WireRecord {
    let mut record = WireRecord::new();
    for &byte in payload.iter().take(MAX_WIRE_LEN) {
        if byte == 0 || !byte.is_ascii() {
            break;
        }
        let _ = record.push(byte as char);
    }
    while record.ends_with('\n') || record.ends_with('\r') {
        record.pop();
    }
    record
}

/// Serialize a TelemetryMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &TelemetryMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

// ── Line reader ────────────────────────────────────────────────────

/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_LINE_LEN],
    pos: usize,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE_LEN],
            pos: 0,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            if self.pos > 0 {
                let line = &self.buf[..self.pos];
                self.pos = 0;
                Some(line)
            } else {
                None
            }
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: drop the partial line
            self.pos = 0;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

// ── LoRa modem lines ───────────────────────────────────────────────

/// Extract the payload from a modem receive line.
///
/// The modem reports packets as `+RCV=<addr>,<len>,<data>,<rssi>,<snr>`.
/// `data` may itself contain commas, so it is sliced by `len` rather than
/// split. Returns `None` for any other line or a truncated report.
pub fn parse_modem_rx(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(b"+RCV=")?;
    let addr_end = rest.iter().position(|&b| b == b',')?;
    let rest = &rest[addr_end + 1..];
    let len_end = rest.iter().position(|&b| b == b',')?;
    let len: usize = core::str::from_utf8(&rest[..len_end]).ok()?.trim().parse().ok()?;
    rest.get(len_end + 1..len_end + 1 + len)
}

/// Modem reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemReply {
    Ok,
    Err,
}

/// Classify a modem line as a command reply (`+OK` / `+ERR=<n>`).
pub fn parse_modem_reply(line: &[u8]) -> Option<ModemReply> {
    if line == b"+OK" {
        Some(ModemReply::Ok)
    } else if line.starts_with(b"+ERR") {
        Some(ModemReply::Err)
    } else {
        None
    }
}

// ── Periodic timer ─────────────────────────────────────────────────

/// Fires once per period on a monotonic millisecond clock. Polled from the
/// main loop for housekeeping such as status reports.
pub struct Interval {
    period_ms: u64,
    next_at: u64,
}

impl Interval {
    /// First tick is due one period after `start_ms`.
    pub const fn new(period_ms: u64, start_ms: u64) -> Self {
        Self {
            period_ms,
            next_at: start_ms + period_ms,
        }
    }

    /// True once per elapsed period. Missed periods are not replayed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_at {
            return false;
        }
        self.next_at = now_ms + self.period_ms;
        true
    }
}
