use super::error::CompressionError;

/// Number of right shifts that bring `raw_range` channels down to at most
/// `display_range` channels: ceil(log2(raw_range / display_range)), or 0 when the raw
/// range already fits.
pub fn compression_shift(raw_range: u32, display_range: u32) -> Result<u32, CompressionError> {
    if raw_range == 0 || display_range == 0 {
        return Err(CompressionError::InvalidRange(raw_range, display_range));
    }
    let ratio = raw_range.div_ceil(display_range);
    if ratio <= 1 {
        Ok(0)
    } else {
        Ok(u32::BITS - (ratio - 1).leading_zeros())
    }
}

/// Compressor maps raw channels onto a coarser display range with a right shift.
///
/// The shift is computed once when a sort routine initializes and applied per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    shift: u32,
}

impl Compressor {
    pub fn new(raw_range: u32, display_range: u32) -> Result<Self, CompressionError> {
        Ok(Self {
            shift: compression_shift(raw_range, display_range)?,
        })
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    pub fn compress(&self, raw: i32) -> i32 {
        raw >> self.shift
    }
}
