//! A lean PostgreSQL wire protocol client.
//!
//! # Features
//!
//! - **Zero-copy rows**: column values are read straight out of the receive buffer
//! - **Sans-I/O state machines**: the handshake and response scanning do no I/O
//! - **Buffered fast path**: rows that already arrived are returned without suspending
//! - **Authentication**: cleartext, MD5 and SCRAM-SHA-256
//!
//! Only the simple query protocol is spoken; every value arrives as text.
//!
//! # Example
//!
//! ```no_run
//! use wire_postgres::tokio::Conn;
//!
//! # async fn run() -> wire_postgres::Result<()> {
//! let mut conn = Conn::connect("Host=localhost;Username=postgres;Password=secret").await?;
//!
//! let mut rows = conn.submit_query("SELECT 1 AS num, 'one' AS name").await?;
//! while rows.advance().await? {
//!     let num = rows.get_i32(0)?;
//!     let name = rows.get_str(1)?;
//!     println!("{num} {name}");
//! }
//!
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod buffer_pool;
pub mod conversion;
pub mod error;
pub mod opts;
pub mod protocol;
pub mod state;
pub mod tokio;

pub use buffer::Cursor;
pub use buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
pub use conversion::{FromRow, FromText};
pub use error::{Error, Result, ServerError};
pub use opts::Opts;
pub use protocol::types::{Oid, TransactionStatus};
pub use state::result::Column;
