use ydlidar_data::sample::ANGLE_Q6_FULL_TURN;

pub(crate) fn to_u16(a: u8, b: u8) -> u16 {
    ((a as u16) << 8) + (b as u16)
}

/// Little endian word from two consecutive wire bytes.
pub(crate) fn le_u16(low: u8, high: u8) -> u16 {
    to_u16(high, low)
}

/// Raw angle field (with check bit) to q6 degrees.
pub(crate) fn to_angle_q6(raw: u16) -> u16 {
    raw >> 1
}

/// Wraps any angle in q6 into `[0, 360)` degrees.
pub(crate) fn wrap_q6(angle: f64) -> f64 {
    angle.rem_euclid(f64::from(ANGLE_Q6_FULL_TURN))
}

/// Angle shift of triangulation devices, which see close objects at an
/// offset because the laser and the camera are apart. `distance_mm` must be
/// non zero. Result in degrees.
pub(crate) fn angle_correction(distance_mm: f64) -> f64 {
    (21.8 * (155.3 - distance_mm) / (155.3 * distance_mm))
        .atan()
        .to_degrees()
}

/// Applies the triangulation correction to a q6 angle.
pub(crate) fn correct_angle(angle_q6: f64, distance_mm: f64) -> f64 {
    if distance_mm == 0. {
        return angle_q6;
    }
    wrap_q6(angle_q6 + angle_correction(distance_mm) * 64.)
}

pub(crate) fn to_string(data: &[u8]) -> String {
    data.iter()
        .map(|e| format!("{:02X}", e))
        .collect::<Vec<_>>()
        .join(" ")
}
