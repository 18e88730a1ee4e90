//! Error types for wire-postgres.

use thiserror::Error;

/// Result type for wire-postgres operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Fields of an ErrorResponse or NoticeResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerError {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// Non-localized severity (same as severity but never translated)
    pub severity_non_localized: Option<String>,
    /// SQLSTATE error code (5 characters)
    pub code: Option<String>,
    /// Primary human-readable message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in query string (1-based)
    pub position: Option<u32>,
    /// Context/stack trace
    pub where_: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: Option<String>,
    /// Column name
    pub column: Option<String>,
    /// Constraint name
    pub constraint: Option<String>,
    /// Source routine name
    pub routine: Option<String>,
}

impl ServerError {
    /// The `'M'` field, or an empty string if the server omitted it.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Severity, preferring the non-localized form.
    pub fn severity(&self) -> Option<&str> {
        self.severity_non_localized
            .as_deref()
            .or(self.severity.as_deref())
    }

    /// Returns true for FATAL and PANIC errors, after which the server closes the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), Some("FATAL") | Some("PANIC"))
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())?;
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        Ok(())
    }
}

/// Error type for wire-postgres.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket could not be opened
    #[error("Connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Malformed frame, length or unexpected message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer closed the stream in the middle of a required read
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server asked for an authentication method this client does not speak
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuth(String),

    /// Bad credentials, SCRAM mismatch or an ErrorResponse during the handshake
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// ErrorResponse while executing a query
    #[error("Query failed: {0}")]
    Query(ServerError),

    /// NULL read through a non-null accessor, or text not parseable as the requested type
    #[error("Invalid cast: {0}")]
    InvalidCast(String),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Invalid usage (bad connection string, query while a response is pending, ...)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_)
            | Error::Connect(_)
            | Error::ConnectionClosed
            | Error::ConnectionBroken
            | Error::Protocol(_) => true,
            Error::Query(fields) => fields.is_fatal(),
            _ => false,
        }
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(fields) => fields.code.as_deref(),
            _ => None,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
