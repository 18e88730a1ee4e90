//! Decoding of text-format column values.
//!
//! The simple query protocol returns every value as text, so decoders work
//! directly on the raw bytes of a column as they sit in the read buffer.
//! Nothing is allocated unless the target type owns its data.

mod primitives;
mod row;
mod string;

#[cfg(feature = "with-chrono")]
mod chrono;
#[cfg(feature = "with-rust-decimal")]
mod decimal;
#[cfg(feature = "with-uuid")]
mod uuid;

use crate::error::{Error, Result};
pub use row::FromRow;

/// Trait for decoding a text-format column value into a Rust type.
///
/// The lifetime lets implementations borrow from the read buffer, as `&str`
/// does.
pub trait FromText<'a>: Sized {
    /// Decode from NULL value.
    ///
    /// Default implementation returns [`Error::InvalidCast`]. Override for
    /// types that can represent NULL (like `Option<T>`).
    fn from_null() -> Result<Self> {
        Err(Error::InvalidCast("unexpected NULL value".into()))
    }

    /// Decode from text format bytes.
    fn from_text(bytes: &'a [u8]) -> Result<Self>;
}

/// Decode a column that may be NULL.
pub fn decode<'a, T: FromText<'a>>(value: Option<&'a [u8]>) -> Result<T> {
    match value {
        None => T::from_null(),
        Some(bytes) => T::from_text(bytes),
    }
}

/// View text bytes as `&str`.
pub(crate) fn text(bytes: &[u8]) -> Result<&str> {
    simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::InvalidCast(format!("invalid UTF-8: {}", e)))
}

/// Error for text that does not parse as `type_name`.
pub(crate) fn invalid(type_name: &str, bytes: &[u8], reason: impl std::fmt::Display) -> Error {
    Error::InvalidCast(format!(
        "invalid {} {:?}: {}",
        type_name,
        String::from_utf8_lossy(bytes),
        reason
    ))
}

// === Option<T> - NULL handling ===

impl<'a, T: FromText<'a>> FromText<'a> for Option<T> {
    fn from_null() -> Result<Self> {
        Ok(None)
    }

    fn from_text(bytes: &'a [u8]) -> Result<Self> {
        T::from_text(bytes).map(Some)
    }
}
