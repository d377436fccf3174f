//! Open-wavetable bit packer.
//!
//! Fields are packed MSB first into a 24-bit accumulator. Each full group is
//! stored as a 32-bit big-endian DSP word with a zero top byte, so every
//! flush appends `[0x00, b2, b1, b0]` to the blob.
//!
//! Composed-effects header (one word):
//!
//! ```text
//! byte 0     1        2          3
//!      0x00  padding  nsections  repeat
//! ```
//!
//! PWLE header (52 bits, straddling three words):
//!
//! ```text
//! bytes 0-3   0x00 + 24-bit waveform length
//! bytes 4-7   0x00, repeat, 12-bit wait, nsections[7:4] in byte 7 bits 3:0
//! byte  9     nsections[3:0] in bits 7:4
//! ```

use haptics_errors::{HapticError, ValidationError};
use tracing::{debug, warn};

use crate::{Braking, PHYSICAL_SLOT_COUNT, WaveformFormat};

/// Maximum composed-effects blob size: `(254 + 1) * 8 + 4` bytes.
pub const COMPOSED_CAPACITY_BYTES: usize = 2044;
/// Maximum PWLE blob size.
pub const PWLE_CAPACITY_BYTES: usize = 2302;

/// Bits per accumulator group.
pub const WORD_BITS: u32 = 24;
/// Bytes appended per flushed group.
pub const STORAGE_WORD_BYTES: usize = 4;

/// Section limit of a composed blob (254 entries plus one leading delay).
pub const COMPOSED_SECTIONS_MAX: u32 = 255;
/// Section limit of a PWLE blob.
pub const PWLE_SECTIONS_MAX: u32 = 127;

/// Highest volume level a composed segment accepts.
pub const COMPOSED_VOL_LEVEL_MAX: u8 = 100;

/// Longest single PWLE segment.
pub const PWLE_DURATION_MAX_MS: u32 = 16383;
/// Device amplitude range of a PWLE segment.
pub const PWLE_LEVEL_MIN: f32 = -1.0;
/// Largest amplitude representable in the 12-bit two's complement field.
pub const PWLE_LEVEL_MAX: f32 = 0.999_511_8;
/// Lowest PWLE frequency.
pub const PWLE_FREQUENCY_MIN_HZ: f32 = 1.0;
/// Highest PWLE frequency.
pub const PWLE_FREQUENCY_MAX_HZ: f32 = 1000.0;

/// Largest value of the PWLE waveform length field, in milliseconds.
pub const PWLE_TOTAL_DURATION_MAX_MS: u32 = 0x7FFFF;
/// Marks the waveform length as precomputed (bit 23).
pub const WT_LEN_CALCD: u32 = 0x0080_0000;

/// Frequency and amplitude ramp across the segment.
pub const PWLE_FLAG_CHIRP: u8 = 0x8;
/// Closed-loop active braking.
pub const PWLE_FLAG_BRAKE: u8 = 0x4;
/// Back-EMF amplitude regulation; a 24-bit target follows the segment.
pub const PWLE_FLAG_AMP_REG: u8 = 0x2;

const PWLE_DELAY_SCALE: u32 = 4;
const PWLE_AMPLITUDE_SCALE: f32 = 2048.0;
const PWLE_FREQUENCY_SCALE: f32 = 4.0;

/// Result type for packer operations.
pub type PackResult<T = ()> = std::result::Result<T, PackError>;

/// Errors raised while packing a blob.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PackError {
    /// The next storage word does not fit the blob capacity.
    #[error("waveform needs {required} bytes but the buffer holds {capacity}")]
    OutOfSpace {
        /// Bytes the blob would occupy after the write
        required: usize,
        /// Fixed capacity of the blob
        capacity: usize,
    },

    /// A field value is outside its wire range.
    #[error("{field} value {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
        /// Lowest accepted value
        min: String,
        /// Highest accepted value
        max: String,
    },

    /// The operation belongs to the other waveform format.
    #[error("{operation} is not valid for a {format} blob")]
    WrongFormat {
        /// Rejected operation
        operation: &'static str,
        /// Format of the blob
        format: WaveformFormat,
    },

    /// `write` was asked for more than 32 bits.
    #[error("field width {0} exceeds 32 bits")]
    FieldTooWide(u32),

    /// A header patch targets bytes that have not been flushed yet.
    #[error("header patch needs {needed} bytes, blob holds {len}")]
    HeaderIncomplete {
        /// Bytes the patch touches
        needed: usize,
        /// Bytes currently in the blob
        len: usize,
    },
}

impl PackError {
    fn out_of_range<T: ToString>(field: &'static str, value: T, min: T, max: T) -> Self {
        PackError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

impl From<PackError> for HapticError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::OutOfSpace { required, capacity } => {
                HapticError::resource_exhausted("waveform buffer", required, capacity)
            }
            PackError::OutOfRange {
                field,
                value,
                min,
                max,
            } => HapticError::InvalidArgument(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            }),
            other => HapticError::InvalidArgument(ValidationError::constraint(other.to_string())),
        }
    }
}

/// One entry of a composed-effects blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeSegment {
    /// Volume level, 0-100.
    pub vol_level: u8,
    /// Physical slot index, at most 14.
    pub index: u8,
    pub repeat: u8,
    pub flags: u8,
    /// Silence after this segment before the next one starts.
    pub delay_ms: u16,
}

impl CompositeSegment {
    /// Silent segment used to encode a leading delay.
    pub const fn silence(delay_ms: u16) -> Self {
        Self {
            vol_level: 0,
            index: 0,
            repeat: 0,
            flags: 0,
            delay_ms,
        }
    }

    /// Segment that plays a physical slot once.
    pub const fn effect(vol_level: u8, index: u8, delay_ms: u16) -> Self {
        Self {
            vol_level,
            index,
            repeat: 0,
            flags: 0,
            delay_ms,
        }
    }
}

/// One already-quantized PWLE segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PwleSegment {
    /// Segment length in quarter milliseconds.
    pub delay: u16,
    /// 12-bit two's complement amplitude, full scale 2048.
    pub amplitude: u16,
    /// 12-bit frequency in quarter hertz.
    pub frequency: u16,
    /// Feature flags (`PWLE_FLAG_*`), low nibble only.
    pub flags: u8,
    /// 24-bit back-EMF target. Sets `PWLE_FLAG_AMP_REG` when present.
    pub vbemf_target: Option<u32>,
}

/// Owned, capacity-bounded open-wavetable blob.
///
/// The header is written on construction with placeholder counts. Callers
/// append segments, `flush`, then patch the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformBlob {
    format: WaveformFormat,
    bytes: Vec<u8>,
    capacity: usize,
    cache: u32,
    cache_bits: u32,
    full: bool,
}

impl WaveformBlob {
    /// Create a blob with the firmware capacity of `format`.
    pub fn new(format: WaveformFormat) -> PackResult<Self> {
        Self::with_capacity(format, format.capacity())
    }

    /// Create a blob bounded by an explicit capacity.
    pub fn with_capacity(format: WaveformFormat, capacity: usize) -> PackResult<Self> {
        let mut blob = Self {
            format,
            bytes: Vec::with_capacity(capacity),
            capacity,
            cache: 0,
            cache_bits: 0,
            full: false,
        };
        match format {
            WaveformFormat::ComposedEffects => {
                blob.write(8, 0)?; // padding
                blob.write(8, 0)?; // nsections
                blob.write(8, 0)?; // repeat
            }
            WaveformFormat::PwleEnvelope => {
                blob.write(24, 0)?; // waveform length
                blob.write(8, 0)?; // repeat
                blob.write(12, 0)?; // wait between repeats
                blob.write(8, 0)?; // nsections
            }
        }
        Ok(blob)
    }

    pub fn format(&self) -> WaveformFormat {
        self.format
    }

    /// Bytes emitted so far. Bits still in the accumulator are not counted.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bits waiting in the accumulator.
    pub fn pending_bits(&self) -> u32 {
        self.cache_bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Append the low `nbits` bits of `value`, MSB first.
    pub fn write(&mut self, nbits: u32, value: u32) -> PackResult {
        if nbits > 32 {
            return Err(PackError::FieldTooWide(nbits));
        }
        if self.full {
            return Err(self.out_of_space());
        }
        let value = if nbits == 32 {
            value
        } else {
            value & ((1u32 << nbits) - 1)
        };

        let mut remaining = nbits;
        while remaining > 0 {
            let take = remaining.min(WORD_BITS - self.cache_bits);
            let shift = remaining - take;
            let chunk = value.checked_shr(shift).unwrap_or(0) & ((1u32 << take) - 1);
            self.cache = (self.cache << take) | chunk;
            self.cache_bits += take;
            remaining = shift;

            if self.cache_bits == WORD_BITS {
                self.emit_word()?;
            }
        }
        Ok(())
    }

    /// Zero-pad the accumulator to the next group boundary.
    pub fn flush(&mut self) -> PackResult {
        if self.cache_bits == 0 {
            return Ok(());
        }
        self.write(WORD_BITS - self.cache_bits, 0)
    }

    /// Whether a write has already run past the capacity.
    ///
    /// A full blob rejects every further write.
    pub fn is_full(&self) -> bool {
        self.full
    }

    fn out_of_space(&self) -> PackError {
        PackError::OutOfSpace {
            required: self.bytes.len() + STORAGE_WORD_BYTES,
            capacity: self.capacity,
        }
    }

    fn emit_word(&mut self) -> PackResult {
        if self.bytes.len() + STORAGE_WORD_BYTES > self.capacity {
            let err = self.out_of_space();
            warn!(error = %err, format = %self.format, "waveform blob full");
            self.full = true;
            self.cache = 0;
            self.cache_bits = 0;
            return Err(err);
        }
        let word = self.cache & 0x00FF_FFFF;
        self.bytes.extend_from_slice(&word.to_be_bytes());
        self.cache = 0;
        self.cache_bits = 0;
        Ok(())
    }

    fn require_format(&self, format: WaveformFormat, operation: &'static str) -> PackResult {
        if self.format == format {
            Ok(())
        } else {
            Err(PackError::WrongFormat {
                operation,
                format: self.format,
            })
        }
    }

    /// Append one composed-effects entry (8/8/8/8/16 bits).
    pub fn write_composed_segment(&mut self, segment: &CompositeSegment) -> PackResult {
        self.require_format(WaveformFormat::ComposedEffects, "composed segment")?;
        if segment.vol_level > COMPOSED_VOL_LEVEL_MAX {
            return Err(PackError::out_of_range(
                "vol_level",
                segment.vol_level,
                0,
                COMPOSED_VOL_LEVEL_MAX,
            ));
        }
        if u16::from(segment.index) > PHYSICAL_SLOT_COUNT {
            return Err(PackError::out_of_range(
                "index",
                u16::from(segment.index),
                0,
                PHYSICAL_SLOT_COUNT,
            ));
        }
        self.write(8, u32::from(segment.vol_level))?;
        self.write(8, u32::from(segment.index))?;
        self.write(8, u32::from(segment.repeat))?;
        self.write(8, u32::from(segment.flags))?;
        self.write(16, u32::from(segment.delay_ms))
    }

    /// Append a quantized PWLE segment.
    pub fn write_pwle_segment(&mut self, segment: &PwleSegment) -> PackResult {
        self.require_format(WaveformFormat::PwleEnvelope, "pwle segment")?;
        let mut flags = segment.flags & 0x0F & !PWLE_FLAG_AMP_REG;
        if segment.vbemf_target.is_some() {
            flags |= PWLE_FLAG_AMP_REG;
        }
        self.write(16, u32::from(segment.delay))?;
        self.write(12, u32::from(segment.amplitude))?;
        self.write(12, u32::from(segment.frequency))?;
        self.write(8, u32::from(flags | 1) << 4)?;
        if let Some(target) = segment.vbemf_target {
            self.write(24, target)?;
        }
        Ok(())
    }

    /// Append a ramp that ends at `amplitude`/`frequency_hz` after `duration_ms`.
    pub fn write_pwle_active_segment(
        &mut self,
        duration_ms: u32,
        amplitude: f32,
        frequency_hz: f32,
        chirp: bool,
    ) -> PackResult {
        self.require_format(WaveformFormat::PwleEnvelope, "active segment")?;
        let delay = quantize_duration(duration_ms)?;
        if !(PWLE_LEVEL_MIN..=PWLE_LEVEL_MAX).contains(&amplitude) {
            return Err(PackError::out_of_range(
                "amplitude",
                amplitude,
                PWLE_LEVEL_MIN,
                PWLE_LEVEL_MAX,
            ));
        }
        let frequency = quantize_frequency(frequency_hz)?;
        let raw_amplitude = (amplitude * PWLE_AMPLITUDE_SCALE).round() as i32;
        let amplitude = (raw_amplitude.cast_unsigned() & 0x0FFF) as u16;

        self.write_pwle_segment(&PwleSegment {
            delay,
            amplitude,
            frequency,
            flags: if chirp { PWLE_FLAG_CHIRP } else { 0 },
            vbemf_target: None,
        })
    }

    /// Append a silent hold at the minimum frequency, braking if requested.
    pub fn write_pwle_braking_segment(&mut self, duration_ms: u32, braking: Braking) -> PackResult {
        self.require_format(WaveformFormat::PwleEnvelope, "braking segment")?;
        let delay = quantize_duration(duration_ms)?;
        let frequency = quantize_frequency(PWLE_FREQUENCY_MIN_HZ)?;
        self.write_pwle_segment(&PwleSegment {
            delay,
            amplitude: 0,
            frequency,
            flags: if braking.is_active() { PWLE_FLAG_BRAKE } else { 0 },
            vbemf_target: None,
        })
    }

    /// Patch the PWLE waveform length word (bytes 0-3).
    pub fn set_total_duration(&mut self, duration_ms: u32) -> PackResult {
        self.require_format(WaveformFormat::PwleEnvelope, "total duration")?;
        if duration_ms > PWLE_TOTAL_DURATION_MAX_MS {
            return Err(PackError::out_of_range(
                "total_duration_ms",
                duration_ms,
                0,
                PWLE_TOTAL_DURATION_MAX_MS,
            ));
        }
        // Length is counted in 0.125 ms ticks (8 kHz playback).
        let word = (duration_ms * 8) | WT_LEN_CALCD;
        let len = self.bytes.len();
        let header = self
            .bytes
            .get_mut(0..4)
            .ok_or(PackError::HeaderIncomplete { needed: 4, len })?;
        header.copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    /// Patch the section count in the header.
    pub fn set_section_count(&mut self, count: u32) -> PackResult {
        let len = self.bytes.len();
        match self.format {
            WaveformFormat::ComposedEffects => {
                if count > COMPOSED_SECTIONS_MAX {
                    debug!(count, "composed section count over limit");
                    return Err(PackError::out_of_range(
                        "section_count",
                        count,
                        0,
                        COMPOSED_SECTIONS_MAX,
                    ));
                }
                let slot = self
                    .bytes
                    .get_mut(2)
                    .ok_or(PackError::HeaderIncomplete { needed: 3, len })?;
                *slot = (count & 0xFF) as u8;
            }
            WaveformFormat::PwleEnvelope => {
                if count > PWLE_SECTIONS_MAX {
                    debug!(count, "pwle section count over limit");
                    return Err(PackError::out_of_range(
                        "section_count",
                        count,
                        0,
                        PWLE_SECTIONS_MAX,
                    ));
                }
                let (hi, lo) = pwle_section_nibbles(count);
                match self.bytes.get_mut(7..10) {
                    Some([b7, _, b9]) => {
                        *b7 = (*b7 & 0xF0) | hi;
                        *b9 = (*b9 & 0x0F) | (lo << 4);
                    }
                    _ => return Err(PackError::HeaderIncomplete { needed: 10, len }),
                }
            }
        }
        Ok(())
    }
}

fn pwle_section_nibbles(count: u32) -> (u8, u8) {
    let count = (count & 0xFF) as u8;
    (count >> 4, count & 0x0F)
}

fn quantize_duration(duration_ms: u32) -> PackResult<u16> {
    if duration_ms > PWLE_DURATION_MAX_MS {
        return Err(PackError::out_of_range(
            "duration_ms",
            duration_ms,
            0,
            PWLE_DURATION_MAX_MS,
        ));
    }
    u16::try_from(duration_ms * PWLE_DELAY_SCALE)
        .ok()
        .ok_or_else(|| PackError::out_of_range("duration_ms", duration_ms, 0, PWLE_DURATION_MAX_MS))
}

fn quantize_frequency(frequency_hz: f32) -> PackResult<u16> {
    if !(PWLE_FREQUENCY_MIN_HZ..=PWLE_FREQUENCY_MAX_HZ).contains(&frequency_hz) {
        return Err(PackError::out_of_range(
            "frequency_hz",
            frequency_hz,
            PWLE_FREQUENCY_MIN_HZ,
            PWLE_FREQUENCY_MAX_HZ,
        ));
    }
    let raw = (frequency_hz * PWLE_FREQUENCY_SCALE).round() as i32;
    Ok((raw.cast_unsigned() & 0x0FFF) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_writes_after_overflow_keep_failing() -> TestResult {
        let mut blob = WaveformBlob::with_capacity(WaveformFormat::ComposedEffects, 4)?;
        let overflow = PackError::OutOfSpace {
            required: 8,
            capacity: 4,
        };

        assert_eq!(blob.write(24, 0xAB_CDEF), Err(overflow.clone()));
        assert!(blob.is_full());
        assert_eq!(blob.pending_bits(), 0);

        assert_eq!(blob.write(32, 1), Err(overflow.clone()));
        assert_eq!(blob.write(1, 1), Err(overflow.clone()));
        assert_eq!(blob.flush(), Ok(()));
        assert_eq!(blob.as_bytes(), &[0, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_full_width_write_into_partial_word() -> TestResult {
        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        blob.write(8, 0x12)?;
        blob.write(32, 0x3456_789A)?;
        assert_eq!(blob.as_bytes(), &[0, 0, 0, 0, 0, 0x12, 0x34, 0x56]);
        assert_eq!(blob.pending_bits(), 16);
        Ok(())
    }

    #[test]
    fn test_composed_header_is_one_word() -> TestResult {
        let blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        assert_eq!(blob.as_bytes(), &[0, 0, 0, 0]);
        assert_eq!(blob.pending_bits(), 0);
        Ok(())
    }

    #[test]
    fn test_pwle_header_leaves_low_nibble_pending() -> TestResult {
        let blob = WaveformBlob::new(WaveformFormat::PwleEnvelope)?;
        assert_eq!(blob.len(), 8);
        assert_eq!(blob.pending_bits(), 4);
        Ok(())
    }

    #[test]
    fn test_write_masks_high_bits() -> TestResult {
        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        blob.write(8, 0x1AB)?;
        blob.write(16, 0xFFFF_1234)?;
        assert_eq!(blob.as_bytes().get(4..), Some(&[0x00, 0xAB, 0x12, 0x34][..]));
        Ok(())
    }

    #[test]
    fn test_write_rejects_wide_field() -> TestResult {
        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        assert_eq!(blob.write(33, 0), Err(PackError::FieldTooWide(33)));
        Ok(())
    }

    #[test]
    fn test_flush_is_noop_when_aligned() -> TestResult {
        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        blob.flush()?;
        assert_eq!(blob.len(), 4);
        Ok(())
    }

    #[test]
    fn test_wrong_format_is_rejected() -> TestResult {
        let mut composed = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        assert!(matches!(
            composed.write_pwle_braking_segment(10, Braking::None),
            Err(PackError::WrongFormat { .. })
        ));
        assert!(matches!(
            composed.set_total_duration(10),
            Err(PackError::WrongFormat { .. })
        ));

        let mut pwle = WaveformBlob::new(WaveformFormat::PwleEnvelope)?;
        assert!(matches!(
            pwle.write_composed_segment(&CompositeSegment::silence(10)),
            Err(PackError::WrongFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_pack_error_conversion() {
        let exhausted = HapticError::from(PackError::OutOfSpace {
            required: 2048,
            capacity: 2044,
        });
        assert_eq!(exhausted.kind(), haptics_errors::ErrorKind::ResourceExhausted);

        let range = HapticError::from(PackError::out_of_range("index", 15u16, 0, 14));
        assert_eq!(range.kind(), haptics_errors::ErrorKind::InvalidArgument);
    }
}
