//! rust_decimal type implementations.

use rust_decimal::Decimal;

use crate::error::{Error, Result};

use super::{FromText, invalid, text};

impl FromText<'_> for Decimal {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        let s = text(bytes)?;
        if matches!(s, "NaN" | "Infinity" | "-Infinity") {
            return Err(Error::InvalidCast(format!(
                "{} cannot be represented as Decimal",
                s
            )));
        }
        Decimal::from_str_exact(s).map_err(|e| invalid("numeric", bytes, e))
    }
}
