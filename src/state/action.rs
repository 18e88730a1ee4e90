//! Action types for state machine I/O requests.

/// Action requested by a state machine.
///
/// The caller performs the requested I/O and then feeds the next backend
/// message back into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write the pending write buffer to the server, then read a message.
    WriteAndReadMessage,

    /// Read the next message from the server.
    ReadMessage,

    /// The state machine has finished successfully.
    Finished,
}
