use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Highest position an interval boundary can take (16 bits, position 0 is reserved).
pub const MAX_INTERVAL_POSITION: u32 = 0xFFFF;

/// Interval `[1, 1]` attached to every document that matches the
/// always-true zero-constraint list.
pub const ZERO_CONSTRAINT_INTERVAL: u32 = (1 << 16) | 1;

/// Packs an ordinary interval `[begin, end]` into a single `u32` word:
/// begin in the upper 16 bits, end in the lower 16 bits.
///
/// Boundaries are one-based; `begin <= end` always holds, so an ordinary
/// interval never has its upper half greater than its lower half reversed.
#[inline(always)]
pub fn from_boundaries(begin: u32, end: u32) -> u32 {
    assert!(
        begin >= 1 && begin <= end && end <= MAX_INTERVAL_POSITION,
        "invalid interval boundaries [{begin}, {end}]"
    );
    (begin << 16) | end
}

/// Packs the start of a z-star (negation) interval covering `(begin, end]`
/// with the halves swapped: end in the upper 16 bits, begin in the lower.
///
/// The swap is what distinguishes z-star words from ordinary ones: the upper
/// half is strictly greater than the lower half. `begin` may be zero here.
#[inline(always)]
pub fn from_zstar1_boundaries(begin: u32, end: u32) -> u32 {
    assert!(
        begin < end && end <= MAX_INTERVAL_POSITION,
        "invalid z-star interval boundaries [{begin}, {end}]"
    );
    (end << 16) | begin
}

/// Packs a z-star continuation: only the new end position, upper 16 bits zero.
#[inline(always)]
pub fn from_zstar2_boundary(end: u32) -> u32 {
    assert!(
        end >= 1 && end <= MAX_INTERVAL_POSITION,
        "invalid z-star continuation boundary {end}"
    );
    end
}

/// True for z-star start words: the packed upper half exceeds the lower half.
#[inline(always)]
pub fn is_zstar1(interval: u32) -> bool {
    (interval >> 16) > (interval & 0xFFFF)
}

/// True for z-star continuation words: the upper 16 bits are zero.
#[inline(always)]
pub fn is_zstar2(interval: u32) -> bool {
    (interval >> 16) == 0
}

/// Upper half of a packed interval word.
#[inline(always)]
pub fn begin(interval: u32) -> u32 {
    interval >> 16
}

/// Lower half of a packed interval word.
#[inline(always)]
pub fn end(interval: u32) -> u32 {
    interval & 0xFFFF
}

/// Merges a z-star start word with the continuation that follows it,
/// yielding the extended z-star interval: same begin, new end.
#[inline(always)]
pub fn combine_zstar(zstar1: u32, zstar2: u32) -> u32 {
    debug_assert!(is_zstar1(zstar1));
    debug_assert!(is_zstar2(zstar2));
    (zstar2 << 16) | (zstar1 & 0xFFFF)
}

/// Comparison mode stored in the top two bits of a bounds word.
///
/// The remaining 30 bits hold the operand(s); the fourth bit pattern (0b11)
/// is unused and treated as data corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum BoundsTest {
    /// `lo <= value_diff < hi`; lo in bits 16..30, hi in bits 0..16.
    Range = 0,
    /// `value_diff < operand`.
    LessThan = 1,
    /// `value_diff >= operand`.
    GreaterEqual = 2,
}

/// Encodes the bounds test `value_diff >= value`.
#[inline(always)]
pub fn bounds_greater_equal(value: u32) -> u32 {
    assert!(value < (1 << 30), "bounds operand {value} exceeds 30 bits");
    (2 << 30) | value
}

/// Encodes the bounds test `value_diff < value`.
#[inline(always)]
pub fn bounds_less_than(value: u32) -> u32 {
    assert!(value < (1 << 30), "bounds operand {value} exceeds 30 bits");
    (1 << 30) | value
}

/// Encodes the bounds test `lo <= value_diff < hi`.
#[inline(always)]
pub fn bounds_range(lo: u32, hi: u32) -> u32 {
    assert!(
        lo < (1 << 14) && lo < hi && hi <= 0xFFFF,
        "invalid bounds range [{lo}, {hi})"
    );
    (lo << 16) | hi
}

/// Evaluates a packed bounds word against the per-query value difference.
#[inline(always)]
pub fn bounds_match(bounds: u32, value_diff: i64) -> bool {
    match BoundsTest::from_u32(bounds >> 30).expect("invalid bounds test mode") {
        BoundsTest::Range => {
            let lo = i64::from((bounds >> 16) & 0x3FFF);
            let hi = i64::from(bounds & 0xFFFF);
            lo <= value_diff && value_diff < hi
        }
        BoundsTest::LessThan => value_diff < i64::from(bounds & 0x3FFF_FFFF),
        BoundsTest::GreaterEqual => value_diff >= i64::from(bounds & 0x3FFF_FFFF),
    }
}
