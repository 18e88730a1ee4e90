//! Sans-I/O state machines for the PostgreSQL protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They consume parsed backend messages (or raw buffered bytes) and tell the
//! caller what to do next.

pub mod action;
pub mod connection;
pub mod result;

pub use action::Action;
pub use connection::{ConnectionState, ConnectionStateMachine, Session};
pub use result::{Column, ResultState, Scan};
