pub mod cli;
pub mod config;
pub mod executor;
pub mod node;
pub mod security;
pub mod session;
pub mod shared;
pub mod ssh;
pub mod ui;
pub mod utils;

pub use cli::Cli;
pub use config::Settings;
pub use executor::{BatchOrchestrator, BatchStart, SessionOutcome};
pub use node::Host;
pub use security::Credentials;
pub use session::{SessionEvent, SessionHandle, SessionRegistry, SessionState};
pub use ssh::{Connector, SshConnector};
