//! A small asynchronous SSH client on top of russh and tokio.
//!
//! The heart of this module is [`Client`]: connect, authenticate with a
//! private key file and open an interactive PTY shell.

pub mod authentication;
pub mod channel_manager;
pub mod connection;
pub mod error;

pub use authentication::{AuthMethod, ServerCheckMethod};
pub use channel_manager::interactive_terminal_modes;
pub use connection::{Client, ClientHandler};
pub use error::Error;

// Re-export russh types commonly used with this module
pub use russh::client::Config;
