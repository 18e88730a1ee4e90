//! Wire format: framing primitives and the messages exchanged over a
//! simple-query session.
//!
//! Everything here works on byte slices and `Vec<u8>`; no I/O is done.

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod types;

pub use backend::BackendMessage;
pub use types::{Oid, TransactionStatus};
