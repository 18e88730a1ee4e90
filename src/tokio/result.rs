//! Forward-only cursor over a simple query response.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::conversion::{FromRow, FromText, decode};
use crate::error::{Error, Result};
use crate::state::result::{Column, Scan};

use super::conn::Conn;
use super::stream::ensure_buffered;

/// Rows of one query response, read straight out of the connection's buffer.
///
/// Values returned by the accessors borrow the stream, so none of them can be
/// held across the next [`ResultStream::advance`], which may move or
/// overwrite the bytes they point at.
///
/// Dropping the stream before [`ResultStream::advance`] returned `false`
/// leaves the rest of the response unread; the connection then refuses new
/// queries until [`Conn::drain`] is called.
pub struct ResultStream<'c, S> {
    conn: &'c mut Conn<S>,
}

impl<'c, S: AsyncRead + AsyncWrite + Unpin> ResultStream<'c, S> {
    pub(super) fn new(conn: &'c mut Conn<S>) -> Self {
        Self { conn }
    }

    /// Move to the next row.
    ///
    /// Returns `true` if a row is available and `false` once the response is
    /// complete. Messages that are already buffered are handled without
    /// suspending; the stream is only read when the next message is
    /// incomplete.
    ///
    /// An ErrorResponse from the server is reported as [`Error::Query`] after
    /// the response has been read to its end, so the connection stays usable.
    pub async fn advance(&mut self) -> Result<bool> {
        let conn = &mut *self.conn;
        if conn.is_broken {
            return Err(Error::ConnectionBroken);
        }

        loop {
            let scanned = conn.result.scan(
                conn.read_buf.data(),
                conn.read_buf.cursor(),
                &mut conn.session,
            );
            let (scan, cursor) = match scanned {
                Ok(v) => v,
                Err(e) => {
                    conn.is_broken = true;
                    return Err(e);
                }
            };
            conn.read_buf.set_cursor(cursor);

            match scan {
                Scan::Row => return Ok(true),
                Scan::Done => {
                    conn.pending = false;
                    return match conn.result.take_error() {
                        None => Ok(false),
                        Some(err) => {
                            if err.is_fatal() {
                                conn.is_broken = true;
                            }
                            Err(Error::Query(err))
                        }
                    };
                }
                Scan::Insufficient { needed } => {
                    conn.is_broken = true;
                    ensure_buffered(&mut conn.stream, &mut conn.read_buf, needed).await?;
                    conn.is_broken = false;
                }
            }
        }
    }

    /// Read the response to its end, discarding rows.
    pub async fn finish(&mut self) -> Result<()> {
        while self.advance().await? {}
        Ok(())
    }

    /// Columns of the current result set.
    ///
    /// Empty until the RowDescription has been read, i.e. before the first
    /// [`ResultStream::advance`].
    pub fn columns(&self) -> &[Column] {
        self.conn.result.columns()
    }

    /// Tag of the last completed command, e.g. `INSERT 0 3`.
    pub fn command_tag(&self) -> &str {
        self.conn.result.command_tag()
    }

    /// Row count reported by the last completed command.
    pub fn rows_affected(&self) -> Option<u64> {
        self.conn.result.rows_affected()
    }

    /// Raw text bytes of column `index` in the current row, `None` for NULL.
    pub fn raw(&self, index: usize) -> Result<Option<&[u8]>> {
        let data = self.conn.read_buf.data();
        Ok(self.conn.result.span(index)?.map(|range| &data[range]))
    }

    /// True if column `index` of the current row is NULL.
    pub fn is_null(&self, index: usize) -> Result<bool> {
        Ok(self.raw(index)?.is_none())
    }

    /// Decode column `index` of the current row.
    ///
    /// NULL fails with [`Error::InvalidCast`] unless `T` is an `Option`.
    pub fn get<'a, T: FromText<'a>>(&'a self, index: usize) -> Result<T> {
        decode(self.raw(index)?)
    }

    /// Decode the whole current row.
    pub fn row<'a, T: FromRow<'a>>(&'a self) -> Result<T> {
        if !self.conn.result.has_row() {
            return Err(Error::InvalidUsage("no current row".into()));
        }
        T::from_row(self.conn.read_buf.data(), &self.conn.result)
    }

    /// `int2` or any decimal integer text that fits in 16 bits.
    pub fn get_i16(&self, index: usize) -> Result<i16> {
        self.get(index)
    }

    /// Decimal integer text, e.g. an `int4` column.
    pub fn get_i32(&self, index: usize) -> Result<i32> {
        self.get(index)
    }

    /// Decimal integer text, e.g. an `int8` or `count(*)` column.
    pub fn get_i64(&self, index: usize) -> Result<i64> {
        self.get(index)
    }

    /// Decimal text, `NaN`, `Infinity` or `-Infinity`.
    pub fn get_f32(&self, index: usize) -> Result<f32> {
        self.get(index)
    }

    /// Like [`ResultStream::get_f32`], at double precision.
    pub fn get_f64(&self, index: usize) -> Result<f64> {
        self.get(index)
    }

    /// `t`/`f` as sent by the server; `true`/`false` and `1`/`0` also parse.
    pub fn get_bool(&self, index: usize) -> Result<bool> {
        self.get(index)
    }

    /// Borrow a text column without copying it out of the buffer.
    pub fn get_str(&self, index: usize) -> Result<&str> {
        self.get(index)
    }

    /// Copy a text column into a new `String`.
    pub fn get_string(&self, index: usize) -> Result<String> {
        self.get(index)
    }

    /// `timestamp`, `timestamptz` (as UTC) or `date` (at midnight).
    #[cfg(feature = "with-chrono")]
    pub fn get_datetime(&self, index: usize) -> Result<chrono::NaiveDateTime> {
        self.get(index)
    }

    /// `numeric` text; `NaN` and infinities fail with [`Error::InvalidCast`].
    #[cfg(feature = "with-rust-decimal")]
    pub fn get_decimal(&self, index: usize) -> Result<rust_decimal::Decimal> {
        self.get(index)
    }

    /// Hyphenated `uuid` text.
    #[cfg(feature = "with-uuid")]
    pub fn get_guid(&self, index: usize) -> Result<uuid::Uuid> {
        self.get(index)
    }
}
