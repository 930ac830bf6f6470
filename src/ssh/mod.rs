//! SSH transport layer: connection, session store, command execution.

pub mod client;
pub mod error;
pub mod exec;
pub mod store;

pub use error::GatewayError;
pub use store::{SessionPair, SessionStore};
