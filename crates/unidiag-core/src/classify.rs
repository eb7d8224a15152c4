//! Code point hazard classification.

use unicode_normalization::char::is_combining_mark;

use crate::hazard::{HazardSet, HazardTag};
use crate::scalar::{Scalar, BMP_END};

/// Code point ranges with general category Format (`Cf`), Unicode 15.
pub const FORMAT_RANGES: &[(u32, u32)] = &[
    (0x00AD, 0x00AD),
    (0x0600, 0x0605),
    (0x061C, 0x061C),
    (0x06DD, 0x06DD),
    (0x070F, 0x070F),
    (0x0890, 0x0891),
    (0x08E2, 0x08E2),
    (0x180E, 0x180E),
    (0x200B, 0x200F),
    (0x202A, 0x202E),
    (0x2060, 0x2064),
    (0x2066, 0x206F),
    (0xFEFF, 0xFEFF),
    (0xFFF9, 0xFFFB),
    (0x1_10BD, 0x1_10BD),
    (0x1_10CD, 0x1_10CD),
    (0x1_3430, 0x1_343F),
    (0x1_BCA0, 0x1_BCA3),
    (0x1_D173, 0x1_D17A),
    (0xE_0001, 0xE_0001),
    (0xE_0020, 0xE_007F),
];

/// Code point ranges with general category Private Use (`Co`).
pub const PRIVATE_USE_RANGES: &[(u32, u32)] = &[
    (0xE000, 0xF8FF),
    (0xF_0000, 0xF_FFFD),
    (0x10_0000, 0x10_FFFD),
];

fn in_ranges(table: &[(u32, u32)], value: u32) -> bool {
    table
        .binary_search_by(|&(start, end)| {
            if end < value {
                std::cmp::Ordering::Less
            } else if start > value {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Returns `true` for general category Format.
#[must_use]
pub fn is_format_char(value: u32) -> bool {
    in_ranges(FORMAT_RANGES, value)
}

/// Returns `true` for general category Private Use.
#[must_use]
pub fn is_private_use(value: u32) -> bool {
    in_ranges(PRIVATE_USE_RANGES, value)
}

/// Returns `true` for C0 controls other than tab, LF and CR, for DEL, and for C1 controls.
#[must_use]
pub const fn is_hazardous_control(value: u32) -> bool {
    matches!(value, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F..=0x9F)
}

/// Maps a scalar to every hazard tag that applies to it.
///
/// Pure and total. Decode-level tags (`Surrogate`, `Overlong`,
/// `InvalidByte`, `Truncated`) are never produced here because no
/// [`Scalar`] can carry them.
#[must_use]
pub fn classify(scalar: Scalar) -> HazardSet {
    let value = scalar.value();
    let mut tags = HazardSet::new();
    if value > BMP_END {
        tags.insert(HazardTag::OutsideBmp);
    }
    if is_combining_mark(scalar.as_char()) {
        tags.insert(HazardTag::CombiningMark);
    }
    if is_format_char(value) {
        tags.insert(HazardTag::FormatChar);
    }
    if is_private_use(value) {
        tags.insert(HazardTag::PrivateUse);
    }
    if is_hazardous_control(value) {
        tags.insert(HazardTag::ControlChar);
    }
    tags
}

/// Union of [`classify`] over every character of `text`.
#[must_use]
pub fn classify_str(text: &str) -> HazardSet {
    text.chars()
        .map(|c| classify(Scalar::from(c)))
        .fold(HazardSet::new(), HazardSet::union)
}
