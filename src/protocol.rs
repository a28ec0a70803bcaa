/// Alert wire format and telemetry messages.
///
/// Alerts travel between nodes as short ASCII records:
///
/// ```text
/// KIND,LAT,LNG,EXTRA[,Sats:N]
/// FIRE,30.768885,76.575210,1.00
/// QUAKE,30.768885,76.575210,0.31,Sats:7
/// ```
///
/// Coordinates carry six decimals and the magnitude two, so a decoded
/// message matches the original only to that precision. Decoding is
/// permissive: only the kind prefix is validated, and missing or garbled
/// numeric fields come back as zero.
///
/// Telemetry (alerts raised, forward/drop decisions, periodic counters) is
/// emitted separately as newline-delimited JSON.
use core::fmt::Write;

use heapless::String;
use serde::Serialize;

/// Maximum encoded alert length in bytes.
pub const MAX_WIRE_LEN: usize = 80;

/// Owned, bounded alert record as it appears on the radio.
pub type WireRecord = String<MAX_WIRE_LEN>;

/// Largest magnitude the wire format carries (three integer digits).
pub const MAX_MAGNITUDE: f32 = 999.99;

/// Alert category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Fire,
    Quake,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Fire => "FIRE",
            AlertKind::Quake => "QUAKE",
        }
    }

    /// Classify a record by its leading characters.
    ///
    /// Only the prefix is compared, so `"FIREWORKS,..."` still reads as
    /// [`AlertKind::Fire`]. Anything else is invalid.
    pub fn from_prefix(text: &str) -> Option<Self> {
        if text.starts_with("FIRE") {
            Some(AlertKind::Fire)
        } else if text.starts_with("QUAKE") {
            Some(AlertKind::Quake)
        } else {
            None
        }
    }
}

/// A fire or quake event with its origin and strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f32,
    /// Satellites in view, only sent by GPS-equipped originators.
    pub satellites: Option<u32>,
}

impl AlertMessage {
    pub const fn new(kind: AlertKind, latitude: f64, longitude: f64, magnitude: f32) -> Self {
        Self {
            kind,
            latitude,
            longitude,
            magnitude,
            satellites: None,
        }
    }

    pub const fn with_satellites(mut self, satellites: u32) -> Self {
        self.satellites = Some(satellites);
        self
    }
}

/// Encode an alert into its wire form.
///
/// Coordinates are clamped to ±180 and the magnitude to ±999.99 so the
/// longest possible record stays well inside [`MAX_WIRE_LEN`].
pub fn encode(msg: &AlertMessage) -> WireRecord {
    let lat = msg.latitude.clamp(-180.0, 180.0);
    let lng = msg.longitude.clamp(-180.0, 180.0);
    let mag = msg.magnitude.clamp(-MAX_MAGNITUDE, MAX_MAGNITUDE);

    let mut out = WireRecord::new();
    // Worst case is 53 bytes, so these writes cannot overflow.
    let _ = write!(out, "{},{:.6},{:.6},{:.2}", msg.kind.as_str(), lat, lng, mag);
    if let Some(sats) = msg.satellites {
        let _ = write!(out, ",Sats:{}", sats);
    }
    out
}

/// Decode a wire record.
///
/// Returns `None` only when the kind prefix is unrecognized. Every other
/// problem (missing commas, unparseable numbers) leaves the affected
/// fields at zero.
pub fn decode(text: &str) -> Option<AlertMessage> {
    let kind = AlertKind::from_prefix(text)?;
    let mut msg = AlertMessage::new(kind, 0.0, 0.0, 0.0);

    let mut fields = text.split(',').skip(1);
    let Some(lat) = fields.next() else {
        return Some(msg);
    };
    msg.latitude = leading_number(lat);
    let Some(lng) = fields.next() else {
        return Some(msg);
    };
    msg.longitude = leading_number(lng);
    let Some(mag) = fields.next() else {
        return Some(msg);
    };
    msg.magnitude = leading_number(mag) as f32;
    if let Some(sats) = fields.next().and_then(|f| f.trim().strip_prefix("Sats:")) {
        msg.satellites = Some(sats.trim().parse().unwrap_or(0));
    }
    Some(msg)
}

/// Parse the numeric prefix of a field (`"12.5abc"` → 12.5,
/// `"1.2.3"` → 1.2), 0.0 if none.
fn leading_number(field: &str) -> f64 {
    let field = field.trim_start();
    let mut seen_dot = false;
    let mut end = field.len();
    for (i, c) in field.char_indices() {
        let numeric = match c {
            '0'..='9' => true,
            '-' | '+' => i == 0,
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            _ => false,
        };
        if !numeric {
            end = i;
            break;
        }
    }
    field[..end].parse().unwrap_or(0.0)
}

// ── Telemetry ──────────────────────────────────────────────────────

/// Messages a node reports on its serial console, one JSON object per line.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum TelemetryMessage<'a> {
    /// Detection raised on this node
    #[serde(rename = "alert")]
    Alert {
        kind: &'static str,
        lat: f64,
        lng: f64,
        mag: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        sats: Option<u32>,
        /// Uptime in milliseconds
        ts: u32,
    },
    /// Relay forwarded a message
    #[serde(rename = "forward")]
    Forward {
        msg: &'a str,
        /// "short" or "long"
        link: &'static str,
        /// Origin-to-receiver distance, when hybrid routing computed one
        #[serde(skip_serializing_if = "Option::is_none")]
        dist_m: Option<f64>,
        ts: u32,
    },
    /// Relay dropped a message
    #[serde(rename = "drop")]
    Drop {
        msg: &'a str,
        /// "malformed", "duplicate" or "send_failed"
        reason: &'static str,
        ts: u32,
    },
    /// Periodic counters
    #[serde(rename = "status")]
    Status {
        /// "sensor", "relay" or "receiver"
        role: &'static str,
        received: u32,
        fwd_short: u32,
        fwd_long: u32,
        duplicates: u32,
        invalid: u32,
        send_failures: u32,
        /// Uptime in seconds
        uptime: u32,
        version: &'static str,
    },
}

impl<'a> TelemetryMessage<'a> {
    /// Telemetry record for an alert raised or received at `ts`.
    pub fn alert(msg: &AlertMessage, ts: u32) -> Self {
        TelemetryMessage::Alert {
            kind: msg.kind.as_str(),
            lat: msg.latitude,
            lng: msg.longitude,
            mag: msg.magnitude,
            sats: msg.satellites,
            ts,
        }
    }
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized telemetry line
pub const MAX_TELEMETRY_LEN: usize = 256;

/// Buffer type for serialized telemetry lines
pub type TelemetryBuffer = heapless::Vec<u8, MAX_TELEMETRY_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    // ── Encoding ───────────────────────────────────────────────────

    #[test]
    fn encode_fire_alert() {
        let msg = AlertMessage::new(AlertKind::Fire, 30.768885, 76.575210, 1.0);
        assert_eq!(encode(&msg).as_str(), "FIRE,30.768885,76.575210,1.00");
    }

    #[test]
    fn encode_quake_with_satellites() {
        let msg = AlertMessage::new(AlertKind::Quake, -12.5, 130.25, 0.314).with_satellites(7);
        assert_eq!(
            encode(&msg).as_str(),
            "QUAKE,-12.500000,130.250000,0.31,Sats:7"
        );
    }

    #[test]
    fn longest_record_fits_buffer() {
        let msg = AlertMessage::new(AlertKind::Quake, -180.0, -180.0, -999.99)
            .with_satellites(u32::MAX);
        let wire = encode(&msg);
        assert_eq!(
            wire.as_str(),
            "QUAKE,-180.000000,-180.000000,-999.99,Sats:4294967295"
        );
        assert!(wire.len() <= MAX_WIRE_LEN);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let msg = AlertMessage::new(AlertKind::Fire, 500.0, -1e9, 123_456.0);
        assert_eq!(
            encode(&msg).as_str(),
            "FIRE,180.000000,-180.000000,999.99"
        );
    }

    // ── Decoding ───────────────────────────────────────────────────

    #[test]
    fn decode_full_record() {
        let msg = decode("QUAKE,30.768885,76.575210,0.42,Sats:9").unwrap();
        assert_eq!(msg.kind, AlertKind::Quake);
        assert!((msg.latitude - 30.768885).abs() < 1e-9);
        assert!((msg.longitude - 76.575210).abs() < 1e-9);
        assert!((msg.magnitude - 0.42).abs() < 1e-6);
        assert_eq!(msg.satellites, Some(9));
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        assert!(decode("SMOKE,1.0,2.0,3.0").is_none());
        assert!(decode("fire,1.0,2.0,3.0").is_none());
        assert!(decode("").is_none());
        assert!(decode("FIR").is_none());
    }

    #[test]
    fn decode_matches_kind_by_prefix_only() {
        let msg = decode("FIREWORKS,1.5,2.5,3.5").unwrap();
        assert_eq!(msg.kind, AlertKind::Fire);
        assert!((msg.latitude - 1.5).abs() < 1e-9);
        assert_eq!(decode("QUAKEY").unwrap().kind, AlertKind::Quake);
    }

    #[test]
    fn decode_missing_fields_are_zero() {
        let msg = decode("FIRE").unwrap();
        assert_eq!(msg, AlertMessage::new(AlertKind::Fire, 0.0, 0.0, 0.0));

        let msg = decode("QUAKE,12.25").unwrap();
        assert!((msg.latitude - 12.25).abs() < 1e-9);
        assert_eq!(msg.longitude, 0.0);
        assert_eq!(msg.magnitude, 0.0);
        assert_eq!(msg.satellites, None);
    }

    #[test]
    fn decode_garbage_numbers_are_zero() {
        let msg = decode("FIRE,abc,,x1").unwrap();
        assert_eq!(msg.latitude, 0.0);
        assert_eq!(msg.longitude, 0.0);
        assert_eq!(msg.magnitude, 0.0);
    }

    #[test]
    fn decode_takes_numeric_prefix() {
        let msg = decode("FIRE,12.5abc,-3.25\r,1.00\n").unwrap();
        assert!((msg.latitude - 12.5).abs() < 1e-9);
        assert!((msg.longitude + 3.25).abs() < 1e-9);
        assert!((msg.magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decode_stops_number_at_second_dot() {
        let msg = decode("QUAKE,1.2.3,-4.5.6,0.25.9").unwrap();
        assert!((msg.latitude - 1.2).abs() < 1e-9);
        assert!((msg.longitude + 4.5).abs() < 1e-9);
        assert!((msg.magnitude - 0.25).abs() < 1e-6);
    }

    #[test]
    fn decode_ignores_unrecognized_fifth_field() {
        let msg = decode("FIRE,1,2,3,extra").unwrap();
        assert_eq!(msg.satellites, None);
    }

    // ── Round trip ─────────────────────────────────────────────────

    #[test]
    fn round_trip_within_precision() {
        let cases = [
            AlertMessage::new(AlertKind::Fire, 90.0, 180.0, 999.99),
            AlertMessage::new(AlertKind::Quake, -90.0, -180.0, 0.0),
            AlertMessage::new(AlertKind::Quake, 45.1234567, -122.9876543, 3.14159)
                .with_satellites(12),
            AlertMessage::new(AlertKind::Fire, 0.0000004, 0.0, 0.004),
        ];
        for original in cases {
            let wire = encode(&original);
            let back = decode(&wire).unwrap();
            assert_eq!(back.kind, original.kind);
            assert!((back.latitude - original.latitude).abs() <= 5e-7, "{wire}");
            assert!((back.longitude - original.longitude).abs() <= 5e-7, "{wire}");
            assert!((back.magnitude - original.magnitude).abs() <= 5e-3, "{wire}");
            assert_eq!(back.satellites, original.satellites);
        }
    }

    // ── Telemetry serialization ────────────────────────────────────

    #[test]
    fn serialize_status_message() {
        let msg = TelemetryMessage::Status {
            role: "relay",
            received: 12,
            fwd_short: 3,
            fwd_long: 8,
            duplicates: 1,
            invalid: 0,
            send_failures: 0,
            uptime: 120,
            version: "0.1.0",
        };
        let mut buf = [0u8; 256];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""role":"relay""#));
        assert!(json.contains(r#""received":12"#));
        assert!(json.contains(r#""fwd_long":8"#));
        assert!(json.contains(r#""uptime":120"#));
    }

    #[test]
    fn serialize_alert_omits_missing_satellites() {
        let alert = AlertMessage::new(AlertKind::Fire, 1.0, 2.0, 1.0);
        let msg = TelemetryMessage::alert(&alert, 5000);
        let mut buf = [0u8; 256];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""type":"alert""#));
        assert!(json.contains(r#""kind":"FIRE""#));
        assert!(json.contains(r#""ts":5000"#));
        assert!(!json.contains("sats"));
    }

    #[test]
    fn serialize_drop_message() {
        let msg = TelemetryMessage::Drop {
            msg: "FIRE,1.000000,2.000000,1.00",
            reason: "duplicate",
            ts: 42,
        };
        let mut buf = [0u8; 256];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""type":"drop""#));
        assert!(json.contains(r#""msg":"FIRE,1.000000,2.000000,1.00""#));
        assert!(json.contains(r#""reason":"duplicate""#));
    }

    #[test]
    fn serialize_forward_without_distance() {
        let msg = TelemetryMessage::Forward {
            msg: "QUAKE,0.000000,0.000000,0.50",
            link: "long",
            dist_m: None,
            ts: 7,
        };
        let mut buf = [0u8; 256];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""link":"long""#));
        assert!(!json.contains("dist_m"));
    }

    // ── Version constant ───────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
