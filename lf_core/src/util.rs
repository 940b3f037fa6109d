//! Small numeric helpers shared by the loop and its callers.

/// Convert a controller output to a wheel correction.
///
/// Truncates toward zero and saturates at the `i16` range; NaN maps to 0.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn correction_from_output(output: f64) -> i16 {
    output as i16
}

/// `(base - correction, base + correction)`, saturating.
#[inline]
pub fn differential(base_speed: i16, correction: i16) -> (i16, i16) {
    (
        base_speed.saturating_sub(correction),
        base_speed.saturating_add(correction),
    )
}
