//! Hazard tags and tag sets.
//!
//! Tags are declared in reporting priority order; the derived `Ord` and the
//! bit positions used by [`HazardSet`] both follow that order.

use std::fmt;

/// Reason a code point or byte sequence may break a transport or filesystem call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum HazardTag {
    /// Above `U+FFFF`; needs a surrogate pair in UTF-16.
    OutsideBmp = 0,
    /// General category Mark (`Mn`, `Mc`, `Me`).
    CombiningMark = 1,
    /// General category Format (`Cf`), e.g. zero-width and bidi controls.
    FormatChar = 2,
    /// General category Private Use (`Co`).
    PrivateUse = 3,
    /// C0 controls other than tab, line feed, carriage return; DEL; C1 controls.
    ControlChar = 4,
    /// Bytes encoding a UTF-16 surrogate.
    Surrogate = 5,
    /// Overlong byte encoding.
    Overlong = 6,
    /// Byte that cannot start or continue a sequence.
    InvalidByte = 7,
    /// Input ended in the middle of a sequence.
    Truncated = 8,
}

impl HazardTag {
    /// All tags, highest priority first.
    pub const ALL: [Self; 9] = [
        Self::OutsideBmp,
        Self::CombiningMark,
        Self::FormatChar,
        Self::PrivateUse,
        Self::ControlChar,
        Self::Surrogate,
        Self::Overlong,
        Self::InvalidByte,
        Self::Truncated,
    ];

    /// Position in the priority order; lower wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    /// Converts a priority index back into a tag.
    #[must_use]
    pub const fn from_u8(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::OutsideBmp),
            1 => Some(Self::CombiningMark),
            2 => Some(Self::FormatChar),
            3 => Some(Self::PrivateUse),
            4 => Some(Self::ControlChar),
            5 => Some(Self::Surrogate),
            6 => Some(Self::Overlong),
            7 => Some(Self::InvalidByte),
            8 => Some(Self::Truncated),
            _ => None,
        }
    }

    /// Tags produced by classifying decoded scalars rather than by decode failure.
    #[must_use]
    pub const fn is_scalar_level(self) -> bool {
        matches!(
            self,
            Self::OutsideBmp
                | Self::CombiningMark
                | Self::FormatChar
                | Self::PrivateUse
                | Self::ControlChar
        )
    }

    /// Stable short name used in logs and rendered reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OutsideBmp => "outside-bmp",
            Self::CombiningMark => "combining-mark",
            Self::FormatChar => "format-char",
            Self::PrivateUse => "private-use",
            Self::ControlChar => "control-char",
            Self::Surrogate => "surrogate",
            Self::Overlong => "overlong",
            Self::InvalidByte => "invalid-byte",
            Self::Truncated => "truncated",
        }
    }

    /// One-line explanation of why subjects with this tag tend to fail.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::OutsideBmp => {
                "characters above U+FFFF that need surrogate pairs (emoji, historic scripts)"
            }
            Self::CombiningMark => "combining diacritical marks (e.g. zalgo text)",
            Self::FormatChar => "invisible format characters (zero-width, bidi overrides)",
            Self::PrivateUse => "private-use code points with no standard meaning",
            Self::ControlChar => "control characters",
            Self::Surrogate => "UTF-16 surrogates encoded directly as UTF-8",
            Self::Overlong => "overlong UTF-8 encodings",
            Self::InvalidByte => "bytes that are not valid UTF-8",
            Self::Truncated => "sequences cut off in the middle of a character",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for HazardTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`HazardTag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(from = "Vec<HazardTag>", into = "Vec<HazardTag>")
)]
pub struct HazardSet(u16);

impl HazardSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Creates a set holding one tag.
    #[must_use]
    pub const fn single(tag: HazardTag) -> Self {
        Self(tag.bit())
    }

    /// Adds a tag.
    pub fn insert(&mut self, tag: HazardTag) {
        self.0 |= tag.bit();
    }

    /// Returns `true` if the tag is present.
    #[must_use]
    pub const fn contains(self, tag: HazardTag) -> bool {
        self.0 & tag.bit() != 0
    }

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when no tag is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of tags present.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Highest-priority tag present, used for single-bucket reporting.
    #[must_use]
    pub fn dominant(self) -> Option<HazardTag> {
        self.iter().next()
    }

    /// Iterates the tags in priority order.
    pub fn iter(self) -> impl Iterator<Item = HazardTag> {
        HazardTag::ALL
            .into_iter()
            .filter(move |tag| self.contains(*tag))
    }
}

impl std::ops::BitOrAssign for HazardSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<HazardTag> for HazardSet {
    fn from_iter<I: IntoIterator<Item = HazardTag>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl From<Vec<HazardTag>> for HazardSet {
    fn from(tags: Vec<HazardTag>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<HazardSet> for Vec<HazardTag> {
    fn from(set: HazardSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for HazardSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}
