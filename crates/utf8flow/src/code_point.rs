use core::fmt::{self, Write};

/// Largest value a Unicode scalar can take.
pub const MAX_CODE_POINT: u32 = 0x10_FFFF;

/// U+FFFD, emitted in place of malformed or out-of-range input.
pub const REPLACEMENT_CHARACTER: CodePoint = CodePoint(0xFFFD);

/// A Unicode code point in `0..=0x10FFFF`.
///
/// Unlike [`char`], a `CodePoint` may hold a surrogate (`0xD800..=0xDFFF`):
/// the decoder only enforces the upper bound, so surrogates encoded in the
/// input pass through the pipeline unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodePoint(u32);

impl CodePoint {
    /// Builds a code point, substituting [`REPLACEMENT_CHARACTER`] for values
    /// above [`MAX_CODE_POINT`].
    #[must_use]
    #[inline]
    pub const fn new(value: u32) -> Self {
        if value > MAX_CODE_POINT {
            REPLACEMENT_CHARACTER
        } else {
            Self(value)
        }
    }

    /// Like [`CodePoint::new`], but rejects out-of-range values instead of
    /// replacing them.
    #[must_use]
    pub const fn checked(value: u32) -> Option<Self> {
        if value > MAX_CODE_POINT {
            None
        } else {
            Some(Self(value))
        }
    }

    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_surrogate(self) -> bool {
        matches!(self.0, 0xD800..=0xDFFF)
    }

    /// The code point as a `char`, or `None` for surrogates.
    #[must_use]
    pub fn to_char(self) -> Option<char> {
        char::from_u32(self.0)
    }

    /// Number of bytes the UTF-8 form of this code point occupies.
    #[must_use]
    pub const fn utf8_len(self) -> usize {
        match self.0 {
            0..0x80 => 1,
            0x80..0x800 => 2,
            0x800..0x1_0000 => 3,
            _ => 4,
        }
    }
}

impl From<char> for CodePoint {
    fn from(c: char) -> Self {
        Self(c as u32)
    }
}

impl From<CodePoint> for u32 {
    fn from(cp: CodePoint) -> Self {
        cp.0
    }
}

/// Renders the scalar; surrogates render as U+FFFD since they have no `char`.
impl fmt::Display for CodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(self.to_char().unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for CodePoint {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;

        // Bias towards each length class so multi-byte forms show up often.
        let class = u8::arbitrary(g) % 4;
        let raw = u32::arbitrary(g);
        let value = match class {
            0 => raw % 0x80,
            1 => 0x80 + raw % (0x800 - 0x80),
            2 => 0x800 + raw % (0x1_0000 - 0x800),
            _ => 0x1_0000 + raw % (MAX_CODE_POINT + 1 - 0x1_0000),
        };
        Self(value)
    }
}
