//! Phoenix Channels v1 client over `tokio-tungstenite`.
//!
//! Handles heartbeats, channel join/leave, broadcast, presence tracking,
//! and auto-reconnect with backoff. Channels and tracked presence are
//! restored after every reconnect.

mod client;
mod connection;
mod handler;
mod types;

pub use client::RealtimeClient;
pub use types::{
    BroadcastConfig, ChannelConfig, PhoenixMessage, PresenceKeyConfig, RealtimeConfig,
    RealtimeEvent,
};
