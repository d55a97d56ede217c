//! Connection lifecycle and session ownership

mod manager;

pub use manager::{ConnectError, ConnectionManager, DisconnectError, SessionEvent};
