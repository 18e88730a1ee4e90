//! Messages the client sends.

pub mod auth;
pub mod simple;
pub mod startup;

pub use auth::{write_password, write_sasl_initial_response, write_sasl_response};
pub use simple::{write_query, write_terminate};
pub use startup::write_startup;

/// Type bytes of the frontend messages this client sends.
pub mod msg_type {
    /// PasswordMessage, SASLInitialResponse and SASLResponse share `p`
    pub const PASSWORD: u8 = b'p';
    pub const QUERY: u8 = b'Q';
    pub const TERMINATE: u8 = b'X';
}
