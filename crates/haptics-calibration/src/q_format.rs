//! Fixed-point conversions for calibration words.

/// Fraction bits of the resonant frequency word.
pub const Q14_BIT_SHIFT: u32 = 14;
/// Fraction bits of the quality factor word.
pub const Q16_BIT_SHIFT: u32 = 16;

const F0_OFFSET_MODULUS: u32 = 1 << 24;

pub fn q14_to_f32(raw: u32) -> f32 {
    raw as f32 / (1u32 << Q14_BIT_SHIFT) as f32
}

pub fn q16_to_f32(raw: u32) -> f32 {
    raw as f32 / (1u32 << Q16_BIT_SHIFT) as f32
}

/// Convert a long-vibration frequency shift into the 24-bit F0 offset word.
///
/// Positive shifts map to `shift * 2^14`; negative shifts wrap to
/// `2^24 - |shift| * 2^14`.
pub fn f0_offset_from_shift(shift: i32) -> u32 {
    let magnitude = shift.unsigned_abs().saturating_mul(1 << Q14_BIT_SHIFT);
    match shift.signum() {
        1 => magnitude,
        -1 => F0_OFFSET_MODULUS.saturating_sub(magnitude),
        _ => 0,
    }
}
