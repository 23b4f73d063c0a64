//! Zigzag mapping between signed integers and unsigned codes.
//!
//! `0, -1, 1, -2, 2, ...` map to `0, 1, 2, 3, 4, ...` so residuals of small
//! magnitude get small codes regardless of sign. The transform is a bijection
//! over the full width of each type, including `MIN` (which maps to the
//! unsigned `MAX`).

/// Width-parameterized zigzag transform.
pub trait ZigZag: Copy {
    type Unsigned: Copy;

    fn zigzag(self) -> Self::Unsigned;

    fn unzigzag(code: Self::Unsigned) -> Self;
}

macro_rules! impl_zigzag {
    ($($signed:ty => $unsigned:ty),* $(,)?) => {
        $(
            impl ZigZag for $signed {
                type Unsigned = $unsigned;

                #[inline]
                fn zigzag(self) -> $unsigned {
                    // Shift on the unsigned bit pattern so the top bit falls off
                    // without signed overflow; the arithmetic right shift yields
                    // all-ones for negatives and all-zeros otherwise.
                    ((self as $unsigned) << 1) ^ ((self >> (<$signed>::BITS - 1)) as $unsigned)
                }

                #[inline]
                fn unzigzag(code: $unsigned) -> $signed {
                    ((code >> 1) as $signed) ^ (-((code & 1) as $signed))
                }
            }
        )*
    };
}

impl_zigzag!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
