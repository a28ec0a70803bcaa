/// Distance-gated transport selection.
///
/// The relay measures the great-circle distance between the alert's origin
/// and the receiver, then picks the short-range link for nearby origins and
/// the long-range link for everything else.

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Outbound radio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Short-range peer-to-peer link (ESP-NOW)
    ShortRange,
    /// Long-range link (LoRa)
    LongRange,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::ShortRange => "short",
            Transport::LongRange => "long",
        }
    }
}

/// Haversine distance in meters between two points in decimal degrees.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let sin_dphi = libm::sin(d_phi / 2.0);
    let sin_dlambda = libm::sin(d_lambda / 2.0);
    let a = sin_dphi * sin_dphi + libm::cos(phi1) * libm::cos(phi2) * sin_dlambda * sin_dlambda;
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * libm::atan2(libm::sqrt(a), libm::sqrt(1.0 - a));
    EARTH_RADIUS_M * c
}

/// Short range strictly below the threshold, long range at or above it.
pub fn select_transport(distance_m: f64, threshold_m: f64) -> Transport {
    if distance_m < threshold_m {
        Transport::ShortRange
    } else {
        Transport::LongRange
    }
}
