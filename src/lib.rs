//! RadioWave transmitter
//!
//! Streams live, synthesized Morse-code audio to groups of WebSocket
//! subscribers. A SQLite store supplies the set of active messages per
//! broadcast channel; each channel renders one second of mixed 8-bit PCM
//! per tick and fans it out to every connected client.

pub mod channel;
pub mod config;
pub mod morse;
pub mod routing;
pub mod store;
pub mod websocket;

pub use channel::{Channel, ChannelRegistry, Subscriber};
pub use config::ServerConfig;
pub use morse::message::Message;
pub use morse::mixer::Mixer;
pub use morse::tone::ToneGenerator;
pub use store::{MessageStore, SqliteStore};
