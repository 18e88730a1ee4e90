//! Simple query response scanner.
//!
//! [`ResultState::scan`] walks the messages already resident in the read
//! buffer without doing any I/O. It stops at the first DataRow (a row is
//! available), at ReadyForQuery (the response is complete), or at the first
//! message whose header or payload has not fully arrived yet.

use std::ops::Range;

use crate::buffer::Cursor;
use crate::error::{Error, Result, ServerError};
use crate::protocol::backend::query::rows_affected;
use crate::protocol::backend::{BackendMessage, DataRow, RowDescription};
use crate::protocol::codec::{HEADER_LEN, read_header};
use crate::protocol::types::Oid;

use super::connection::Session;

/// Outcome of scanning the buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A DataRow was decoded and is now the current row.
    Row,
    /// ReadyForQuery was consumed; no more messages belong to this response.
    Done,
    /// The next message is incomplete. `needed` is the number of unread bytes
    /// (from the returned cursor) required to make progress.
    Insufficient { needed: usize },
}

/// Column metadata from RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type OID
    pub type_oid: Oid,
}

/// Per-query scanning state.
///
/// Row spans are absolute offsets into the read buffer and are only valid
/// until the buffer is next reserved or refilled.
#[derive(Debug, Default)]
pub struct ResultState {
    columns: Vec<Column>,
    offsets: Vec<usize>,
    /// Column lengths, -1 for NULL
    lengths: Vec<i32>,
    has_row: bool,
    complete: bool,
    command_tag: String,
    rows_affected: Option<u64>,
    error: Option<ServerError>,
}

impl ResultState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything about the previous response, keeping allocations.
    pub fn reset(&mut self) {
        self.columns.clear();
        self.offsets.clear();
        self.lengths.clear();
        self.has_row = false;
        self.complete = false;
        self.command_tag.clear();
        self.rows_affected = None;
        self.error = None;
    }

    /// Columns of the current result set.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// True while a DataRow is the current row.
    pub fn has_row(&self) -> bool {
        self.has_row
    }

    /// True once ReadyForQuery was consumed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Tag of the last CommandComplete, empty if none arrived.
    pub fn command_tag(&self) -> &str {
        &self.command_tag
    }

    /// Row count parsed from the last CommandComplete tag.
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// Take the ErrorResponse received during this response, if any.
    pub fn take_error(&mut self) -> Option<ServerError> {
        self.error.take()
    }

    /// Byte range of column `index` in the current row, `None` for NULL.
    pub fn span(&self, index: usize) -> Result<Option<Range<usize>>> {
        if !self.has_row {
            return Err(Error::InvalidUsage("no current row".into()));
        }
        let (Some(&offset), Some(&len)) = (self.offsets.get(index), self.lengths.get(index)) else {
            return Err(Error::InvalidUsage(format!(
                "column index {} out of range ({} columns)",
                index,
                self.lengths.len()
            )));
        };
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(offset..offset + len as usize))
    }

    /// Scan the unread region `cursor` of `data`.
    ///
    /// Returns the outcome and the cursor after every fully handled message.
    /// Protocol violations are returned as errors; an ErrorResponse is stored
    /// (see [`ResultState::take_error`]) and scanning continues to
    /// ReadyForQuery, except for FATAL errors which end the response at once.
    pub fn scan(
        &mut self,
        data: &[u8],
        mut cursor: Cursor,
        session: &mut Session,
    ) -> Result<(Scan, Cursor)> {
        self.has_row = false;
        if self.complete {
            return Ok((Scan::Done, cursor));
        }

        loop {
            let unread = &data[cursor.pos..cursor.len];
            let Some((type_byte, payload_len)) = read_header(unread)? else {
                return Ok((Scan::Insufficient { needed: HEADER_LEN }, cursor));
            };
            let frame_len = HEADER_LEN + payload_len;
            if unread.len() < frame_len {
                return Ok((Scan::Insufficient { needed: frame_len }, cursor));
            }

            let payload_start = cursor.pos + HEADER_LEN;
            let payload = &unread[HEADER_LEN..frame_len];
            cursor = cursor.advance(frame_len);

            match BackendMessage::parse(type_byte, payload)? {
                BackendMessage::RowDescription(desc) => self.set_columns(&desc),
                BackendMessage::DataRow(row) => {
                    self.set_row(&row, payload_start)?;
                    return Ok((Scan::Row, cursor));
                }
                BackendMessage::CommandComplete(complete) => {
                    self.command_tag.clear();
                    self.command_tag.push_str(complete.tag);
                    self.rows_affected = rows_affected(complete.tag);
                }
                BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ReadyForQuery(status) => {
                    session.transaction_status = status;
                    self.complete = true;
                    return Ok((Scan::Done, cursor));
                }
                BackendMessage::ErrorResponse(err) => {
                    let fatal = err.0.is_fatal();
                    tracing::debug!(error = %err.0, "query failed");
                    // First error wins; the server skips the rest of the query string.
                    self.error.get_or_insert(err.0);
                    if fatal {
                        self.complete = true;
                        return Ok((Scan::Done, cursor));
                    }
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!(notice = %notice.0, "server notice");
                }
                BackendMessage::ParameterStatus(param) => {
                    session.set_param(param.name, param.value);
                }
                BackendMessage::Other(type_byte) => {
                    tracing::trace!(type_byte = %(type_byte as char), payload_len, "skipping message");
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "Unexpected message in query response: {:?}",
                        other
                    )));
                }
            }
        }
    }

    fn set_columns(&mut self, desc: &RowDescription<'_>) {
        self.columns.clear();
        self.columns
            .extend(desc.fields().iter().map(|field| Column {
                name: field.name.to_string(),
                type_oid: field.type_oid(),
            }));
    }

    fn set_row(&mut self, row: &DataRow<'_>, payload_start: usize) -> Result<()> {
        self.offsets.clear();
        self.lengths.clear();
        for span in row.spans() {
            let (offset, len) = span?;
            self.offsets.push(payload_start + offset);
            self.lengths.push(len);
        }
        self.has_row = true;
        Ok(())
    }
}
