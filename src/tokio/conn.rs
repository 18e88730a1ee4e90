//! Asynchronous PostgreSQL connection.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::buffer::{Cursor, INITIAL_READ_CAPACITY, ReadBuffer};
use crate::buffer_pool::PooledBuffer;
use crate::conversion::FromRow;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::{BackendKeyData, BackendMessage};
use crate::protocol::frontend::{write_query, write_terminate};
use crate::protocol::types::TransactionStatus;
use crate::state::action::Action;
use crate::state::connection::{ConnectionStateMachine, Session};
use crate::state::result::ResultState;

use super::result::ResultStream;
use super::stream::{ensure_buffered, read_message, write_all};

/// Capacity reserved for outgoing messages.
const WRITE_CAPACITY: usize = 1024;

/// Asynchronous PostgreSQL connection.
///
/// One query may be in flight at a time: [`Conn::submit_query`] returns a
/// [`ResultStream`] that mutably borrows the connection until it is dropped.
///
/// Every I/O operation marks the connection broken before it suspends and
/// clears the mark once it completes. A future dropped mid-I/O (for example
/// by `tokio::time::timeout`) therefore leaves the connection broken, and
/// later calls fail with [`Error::ConnectionBroken`].
pub struct Conn<S = TcpStream> {
    pub(super) stream: S,
    pub(super) read_buf: ReadBuffer,
    write_buf: PooledBuffer,
    pub(super) session: Session,
    pub(super) result: ResultState,
    /// A submitted query whose ReadyForQuery has not been consumed yet
    pub(super) pending: bool,
    pub(super) is_broken: bool,
}

impl Conn<TcpStream> {
    /// Connect to a PostgreSQL server over TCP.
    pub async fn connect<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        if opts.host.is_empty() {
            return Err(Error::InvalidUsage("host is empty".into()));
        }

        let addr = format!("{}:{}", opts.host, opts.port);
        tracing::debug!(%addr, user = %opts.user, "connecting");
        let tcp = TcpStream::connect(&addr).await.map_err(Error::Connect)?;
        tcp.set_nodelay(true).map_err(Error::Connect)?;

        Self::connect_with_stream(tcp, opts).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Conn<S> {
    /// Run the startup handshake over an already open stream.
    pub async fn connect_with_stream(mut stream: S, opts: Opts) -> Result<Self> {
        let mut read_buf = ReadBuffer::new(&opts.buffer_pool, INITIAL_READ_CAPACITY);
        let mut write_buf = PooledBuffer::take(&opts.buffer_pool, WRITE_CAPACITY);
        let mut state_machine = ConnectionStateMachine::new(opts);

        let mut action = state_machine.start(&mut write_buf);
        loop {
            match action {
                Action::WriteAndReadMessage => write_all(&mut stream, &write_buf).await?,
                Action::ReadMessage => {}
                Action::Finished => break,
            }
            let (type_byte, payload) = read_message(&mut stream, &mut read_buf).await?;
            let msg = BackendMessage::parse(type_byte, &read_buf.data()[payload])?;
            action = state_machine.step(msg, &mut write_buf)?;
        }

        Ok(Self {
            stream,
            read_buf,
            write_buf,
            session: state_machine.into_session(),
            result: ResultState::new(),
            pending: false,
            is_broken: false,
        })
    }

    /// Get the backend key data for query cancellation.
    pub fn backend_key(&self) -> Option<&BackendKeyData> {
        self.session.backend_key.as_ref()
    }

    /// Get the connection ID (backend process ID).
    ///
    /// Returns 0 if the backend key data is not available.
    pub fn connection_id(&self) -> u32 {
        self.session.backend_key.as_ref().map_or(0, |k| k.process_id())
    }

    /// Get server parameters.
    pub fn server_params(&self) -> &[(String, String)] {
        &self.session.server_params
    }

    /// Look up one server parameter, e.g. `server_version`.
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.session.param(name)
    }

    /// Get the current transaction status.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.session.transaction_status
    }

    /// Check if currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.session.transaction_status.in_transaction()
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Check whether a response to an earlier query is still unread.
    pub fn has_pending_response(&self) -> bool {
        self.pending
    }

    /// Send a simple query and return a stream over its response.
    ///
    /// Nothing is read here; rows are pulled by [`ResultStream::advance`].
    pub async fn submit_query(&mut self, sql: &str) -> Result<ResultStream<'_, S>> {
        if self.is_broken {
            return Err(Error::ConnectionBroken);
        }
        if self.pending {
            return Err(Error::InvalidUsage(
                "previous query response not consumed; call drain() first".into(),
            ));
        }

        self.result.reset();
        self.write_buf.clear();
        write_query(&mut self.write_buf, sql);
        tracing::trace!(sql, "submitting query");

        self.pending = true;
        self.is_broken = true;
        write_all(&mut self.stream, &self.write_buf).await?;
        self.is_broken = false;

        Ok(ResultStream::new(self))
    }

    /// Make at least `n` unread bytes available in the read buffer.
    ///
    /// Completes without suspending if they already are.
    pub async fn ensure_buffered(&mut self, n: usize) -> Result<Cursor> {
        if self.is_broken {
            return Err(Error::ConnectionBroken);
        }
        self.is_broken = true;
        let cursor = ensure_buffered(&mut self.stream, &mut self.read_buf, n).await?;
        self.is_broken = false;
        Ok(cursor)
    }

    /// Consume the rest of a response left behind by a dropped [`ResultStream`].
    pub async fn drain(&mut self) -> Result<()> {
        if !self.pending {
            return Ok(());
        }
        ResultStream::new(self).finish().await
    }

    /// Execute a simple query and discard results.
    ///
    /// Returns the row count of the last command, if it reports one.
    pub async fn query_drop(&mut self, sql: &str) -> Result<Option<u64>> {
        let mut stream = self.submit_query(sql).await?;
        stream.finish().await?;
        Ok(stream.rows_affected())
    }

    /// Execute a simple query and return the first typed row.
    pub async fn query_first<T: for<'a> FromRow<'a>>(&mut self, sql: &str) -> Result<Option<T>> {
        let mut stream = self.submit_query(sql).await?;
        let first = if stream.advance().await? {
            Some(stream.row::<T>()?)
        } else {
            None
        };
        stream.finish().await?;
        Ok(first)
    }

    /// Execute a simple query and collect typed rows.
    pub async fn query_collect<T: for<'a> FromRow<'a>>(&mut self, sql: &str) -> Result<Vec<T>> {
        let mut stream = self.submit_query(sql).await?;
        let mut rows = Vec::new();
        while stream.advance().await? {
            rows.push(stream.row::<T>()?);
        }
        Ok(rows)
    }

    /// Close the connection gracefully.
    ///
    /// Sends Terminate on a best-effort basis; a failure to send it is
    /// logged and ignored. The socket is closed and the buffers go back to
    /// the pool when `self` is dropped.
    pub async fn close(mut self) {
        self.write_buf.clear();
        write_terminate(&mut self.write_buf);
        if let Err(e) = write_all(&mut self.stream, &self.write_buf).await {
            tracing::debug!(error = %e, "failed to send Terminate");
        }
    }
}
