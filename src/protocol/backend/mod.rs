//! PostgreSQL backend (server → client) messages.

pub mod auth;
pub mod error;
pub mod query;

pub use auth::{AuthenticationMessage, BackendKeyData, ParameterStatus, ReadyForQuery};
pub use error::{ErrorResponse, NoticeResponse};
pub use query::{CommandComplete, DataRow, FieldDescription, RowDescription};

use crate::error::{Error, Result};
use crate::protocol::types::TransactionStatus;

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication message
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
}

/// A backend message, parsed from its type byte and payload.
///
/// Payload-carrying variants borrow from the receive buffer. Message types this
/// client has no use for land in [`BackendMessage::Other`] and are skipped.
#[derive(Debug)]
pub enum BackendMessage<'a> {
    /// 'R'
    Authentication(AuthenticationMessage<'a>),
    /// 'K'
    BackendKeyData(BackendKeyData),
    /// 'S'
    ParameterStatus(ParameterStatus<'a>),
    /// 'Z'
    ReadyForQuery(TransactionStatus),
    /// 'T'
    RowDescription(RowDescription<'a>),
    /// 'D'
    DataRow(DataRow<'a>),
    /// 'C'
    CommandComplete(CommandComplete<'a>),
    /// 'I'
    EmptyQueryResponse,
    /// 'E'
    ErrorResponse(ErrorResponse),
    /// 'N'
    NoticeResponse(NoticeResponse),
    /// Any other type byte; the payload is skipped.
    Other(u8),
}

impl<'a> BackendMessage<'a> {
    /// Parse a message from its type byte and payload (the bytes after the length field).
    pub fn parse(type_byte: u8, payload: &'a [u8]) -> Result<Self> {
        Ok(match type_byte {
            msg_type::AUTHENTICATION => {
                BackendMessage::Authentication(AuthenticationMessage::parse(payload)?)
            }
            msg_type::BACKEND_KEY_DATA => {
                BackendMessage::BackendKeyData(*BackendKeyData::parse(payload)?)
            }
            msg_type::PARAMETER_STATUS => {
                BackendMessage::ParameterStatus(ParameterStatus::parse(payload)?)
            }
            msg_type::READY_FOR_QUERY => {
                let ready = ReadyForQuery::parse(payload)?;
                let status = ready.transaction_status().ok_or_else(|| {
                    Error::Protocol(format!(
                        "unknown transaction status {:?} in ReadyForQuery",
                        ready.status as char
                    ))
                })?;
                BackendMessage::ReadyForQuery(status)
            }
            msg_type::ROW_DESCRIPTION => {
                BackendMessage::RowDescription(RowDescription::parse(payload)?)
            }
            msg_type::DATA_ROW => BackendMessage::DataRow(DataRow::parse(payload)?),
            msg_type::COMMAND_COMPLETE => {
                BackendMessage::CommandComplete(CommandComplete::parse(payload)?)
            }
            msg_type::EMPTY_QUERY_RESPONSE => BackendMessage::EmptyQueryResponse,
            msg_type::ERROR_RESPONSE => BackendMessage::ErrorResponse(ErrorResponse::parse(payload)?),
            msg_type::NOTICE_RESPONSE => {
                BackendMessage::NoticeResponse(NoticeResponse::parse(payload)?)
            }
            other => BackendMessage::Other(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_are_skippable() {
        let msg = BackendMessage::parse(b'A', b"\x00\x00\x00\x01chan\0payload\0").unwrap();
        assert!(matches!(msg, BackendMessage::Other(b'A')));
    }

    #[test]
    fn ready_for_query_status() {
        let msg = BackendMessage::parse(b'Z', b"T").unwrap();
        assert!(matches!(
            msg,
            BackendMessage::ReadyForQuery(TransactionStatus::InTransaction)
        ));
        assert!(BackendMessage::parse(b'Z', b"").is_err());
        assert!(matches!(
            BackendMessage::parse(b'Z', b"Q"),
            Err(Error::Protocol(_))
        ));
    }
}
