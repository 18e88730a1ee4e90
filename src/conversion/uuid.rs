//! uuid type implementations.

use crate::error::Result;

use super::{FromText, invalid};

impl FromText<'_> for uuid::Uuid {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        uuid::Uuid::try_parse_ascii(bytes).map_err(|e| invalid("uuid", bytes, e))
    }
}
