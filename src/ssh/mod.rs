pub mod connector;
pub mod known_hosts;
pub mod tokio_client;

pub use connector::{ChannelEvent, Connector, PtyChannel, PtyConfig, SshConnector, Transport};
