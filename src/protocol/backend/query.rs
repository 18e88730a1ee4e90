//! Query-related backend messages.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U16 as U16BE, U32 as U32BE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_cstr, read_i32, read_u16};
use crate::protocol::types::Oid;

/// Fixed-size tail of a field description (18 bytes).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct FieldDescriptionTail {
    /// Table OID (0 if not a table column)
    pub table_oid: U32BE,
    /// Column attribute number (0 if not a table column)
    pub column_id: I16BE,
    /// Data type OID
    pub type_oid: U32BE,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: I16BE,
    /// Type modifier (type-specific)
    pub type_modifier: I32BE,
    /// Format code (0=text, 1=binary)
    pub format: U16BE,
}

/// Field description within a RowDescription.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescription<'a> {
    /// Field name
    pub name: &'a str,
    /// Fixed-size metadata
    pub tail: &'a FieldDescriptionTail,
}

impl FieldDescription<'_> {
    /// Data type OID
    pub fn type_oid(&self) -> Oid {
        self.tail.type_oid.get()
    }
}

/// RowDescription message - describes the columns in a result set.
#[derive(Debug)]
pub struct RowDescription<'a> {
    fields: Vec<FieldDescription<'a>>,
}

impl<'a> RowDescription<'a> {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_fields, mut data) = read_u16(payload)?;
        let mut fields = Vec::with_capacity(num_fields as usize);

        for _ in 0..num_fields {
            let (name, rest) = read_cstr(data)?;
            let (tail, rest) = FieldDescriptionTail::ref_from_prefix(rest)
                .map_err(|e| Error::Protocol(format!("FieldDescription tail: {e:?}")))?;

            fields.push(FieldDescription { name, tail });
            data = rest;
        }

        Ok(Self { fields })
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get field descriptions.
    pub fn fields(&self) -> &[FieldDescription<'a>] {
        &self.fields
    }
}

/// DataRow message - contains a single row of data.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    /// Number of columns
    num_columns: u16,
    /// Column data (after the column count)
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Offset of the first column length field within the payload.
    pub const COLUMNS_OFFSET: usize = 2;

    /// Parse a DataRow message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_columns, columns_data) = read_u16(payload)?;
        Ok(Self {
            num_columns,
            columns_data,
        })
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Iterate over column spans.
    ///
    /// Each item is `(offset, length)` relative to the start of the DataRow
    /// payload, with `length == -1` for SQL NULL.
    pub fn spans(&self) -> DataRowSpans<'a> {
        DataRowSpans {
            remaining: self.columns_data,
            offset: Self::COLUMNS_OFFSET,
            columns_left: self.num_columns,
        }
    }
}

/// Iterator over column spans in a DataRow.
#[derive(Debug, Clone)]
pub struct DataRowSpans<'a> {
    remaining: &'a [u8],
    offset: usize,
    columns_left: u16,
}

impl Iterator for DataRowSpans<'_> {
    type Item = Result<(usize, i32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.columns_left == 0 {
            return None;
        }
        self.columns_left -= 1;

        let (len, rest) = match read_i32(self.remaining) {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        self.offset += 4;
        let value_offset = self.offset;

        if len == -1 {
            self.remaining = rest;
            return Some(Ok((value_offset, -1)));
        }
        if len < 0 || rest.len() < len as usize {
            self.columns_left = 0;
            return Some(Err(Error::Protocol(format!(
                "DataRow: column length {} exceeds remaining {} bytes",
                len,
                rest.len()
            ))));
        }

        self.remaining = &rest[len as usize..];
        self.offset += len as usize;
        Some(Ok((value_offset, len)))
    }
}

/// CommandComplete message - indicates successful completion of a command.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag (e.g., "SELECT 5", "INSERT 0 1", "UPDATE 10")
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (tag, _) = read_cstr(payload)?;
        Ok(Self { tag })
    }
}

/// Parse the number of rows affected from a command tag.
///
/// Returns `Some(count)` for commands like SELECT, INSERT, UPDATE, DELETE.
/// Returns `None` for other commands or parse failures.
pub fn rows_affected(tag: &str) -> Option<u64> {
    let mut parts = tag.split_whitespace();
    let command = parts.next()?;
    let count = match command {
        // "INSERT oid rows"
        "INSERT" => parts.nth(1)?,
        "SELECT" | "UPDATE" | "DELETE" | "COPY" | "MOVE" | "FETCH" | "MERGE" => parts.next()?,
        _ => return None,
    };
    count.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, type_oid: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0i16.to_be_bytes());
        out.extend_from_slice(&type_oid.to_be_bytes());
        out.extend_from_slice(&4i16.to_be_bytes());
        out.extend_from_slice(&(-1i32).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    #[test]
    fn row_description_fields() {
        let mut payload = 2u16.to_be_bytes().to_vec();
        payload.extend(field("id", 23));
        payload.extend(field("name", 25));

        let desc = RowDescription::parse(&payload).unwrap();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.fields()[0].name, "id");
        assert_eq!(desc.fields()[0].type_oid(), 23);
        assert_eq!(desc.fields()[1].name, "name");
        assert_eq!(desc.fields()[1].type_oid(), 25);
    }

    #[test]
    fn row_description_truncated() {
        let mut payload = 1u16.to_be_bytes().to_vec();
        payload.extend(field("id", 23));
        payload.truncate(payload.len() - 1);
        assert!(RowDescription::parse(&payload).is_err());
    }

    #[test]
    fn data_row_spans_with_null() {
        let mut payload = 3u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&1i32.to_be_bytes());
        payload.push(b'1');
        payload.extend_from_slice(&(-1i32).to_be_bytes());
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(b"ab");

        let row = DataRow::parse(&payload).unwrap();
        let spans: Vec<_> = row.spans().collect::<Result<_>>().unwrap();
        assert_eq!(spans, [(6, 1), (11, -1), (15, 2)]);
        assert_eq!(&payload[15..17], b"ab");
    }

    #[test]
    fn data_row_overrun() {
        let mut payload = 1u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&10i32.to_be_bytes());
        payload.extend_from_slice(b"short");
        let row = DataRow::parse(&payload).unwrap();
        assert!(row.spans().next().unwrap().is_err());
    }

    #[test]
    fn command_tags() {
        assert_eq!(rows_affected("SELECT 5"), Some(5));
        assert_eq!(rows_affected("INSERT 0 3"), Some(3));
        assert_eq!(rows_affected("UPDATE 10"), Some(10));
        assert_eq!(rows_affected("CREATE TABLE"), None);
        assert_eq!(CommandComplete::parse(b"DELETE 2\0").unwrap().tag, "DELETE 2");
    }
}
