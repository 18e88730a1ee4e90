//! String type implementations.

use crate::error::Result;

use super::{FromText, text};

impl<'a> FromText<'a> for &'a str {
    fn from_text(bytes: &'a [u8]) -> Result<Self> {
        text(bytes)
    }
}

impl FromText<'_> for String {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        text(bytes).map(str::to_owned)
    }
}
