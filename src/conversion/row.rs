//! Row decoding traits and implementations.

use crate::error::{Error, Result};
use crate::state::result::ResultState;

use super::{FromText, decode};

/// Trait for decoding the current row into a Rust type.
pub trait FromRow<'a>: Sized {
    /// Decode the current row of `result`; `data` is the read buffer its
    /// spans point into.
    fn from_row(data: &'a [u8], result: &ResultState) -> Result<Self>;
}

/// Decode a single column value.
fn decode_column<'a, T: FromText<'a>>(
    data: &'a [u8],
    result: &ResultState,
    index: usize,
) -> Result<T> {
    decode(result.span(index)?.map(|range| &data[range]))
}

// === Tuple implementations ===

/// Implementation for empty tuple - used for statements that don't return rows
impl FromRow<'_> for () {
    fn from_row(_data: &[u8], _result: &ResultState) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_from_row_tuple {
    ($count:literal: $($idx:tt => $T:ident),+) => {
        impl<'a, $($T: FromText<'a>),+> FromRow<'a> for ($($T,)+) {
            fn from_row(data: &'a [u8], result: &ResultState) -> Result<Self> {
                if result.columns().len() < $count {
                    return Err(Error::InvalidCast(format!(
                        "not enough columns for tuple: {} < {}",
                        result.columns().len(),
                        $count
                    )));
                }
                Ok(($(
                    decode_column(data, result, $idx)?,
                )+))
            }
        }
    };
}

impl_from_row_tuple!(1: 0 => T1);
impl_from_row_tuple!(2: 0 => T1, 1 => T2);
impl_from_row_tuple!(3: 0 => T1, 1 => T2, 2 => T3);
impl_from_row_tuple!(4: 0 => T1, 1 => T2, 2 => T3, 3 => T4);
impl_from_row_tuple!(5: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5);
impl_from_row_tuple!(6: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6);
impl_from_row_tuple!(7: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7);
impl_from_row_tuple!(8: 0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8);
