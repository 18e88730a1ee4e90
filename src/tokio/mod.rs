//! Asynchronous PostgreSQL client using Tokio.

mod conn;
mod result;
mod stream;

pub use conn::Conn;
pub use result::ResultStream;
pub use stream::ensure_buffered;
