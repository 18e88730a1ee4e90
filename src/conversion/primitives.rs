//! Primitive type implementations (bool, integers, floats).

use crate::error::Result;

use super::{FromText, invalid, text};

// === Boolean ===

impl FromText<'_> for bool {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        match bytes {
            b"t" | b"true" | b"TRUE" | b"T" | b"1" => Ok(true),
            b"f" | b"false" | b"FALSE" | b"F" | b"0" => Ok(false),
            _ => Err(invalid("boolean", bytes, "expected t or f")),
        }
    }
}

// === Integer types ===

macro_rules! impl_from_text_int {
    ($($ty:ty),+) => {
        $(
            impl FromText<'_> for $ty {
                fn from_text(bytes: &[u8]) -> Result<Self> {
                    text(bytes)?
                        .parse()
                        .map_err(|e| invalid(stringify!($ty), bytes, e))
                }
            }
        )+
    };
}

impl_from_text_int!(i16, i32, i64, u32);

// === Float types ===

macro_rules! impl_from_text_float {
    ($($ty:ident),+) => {
        $(
            impl FromText<'_> for $ty {
                fn from_text(bytes: &[u8]) -> Result<Self> {
                    match bytes {
                        b"NaN" => Ok($ty::NAN),
                        b"Infinity" => Ok($ty::INFINITY),
                        b"-Infinity" => Ok($ty::NEG_INFINITY),
                        _ => text(bytes)?
                            .parse()
                            .map_err(|e| invalid(stringify!($ty), bytes, e)),
                    }
                }
            }
        )+
    };
}

impl_from_text_float!(f32, f64);
