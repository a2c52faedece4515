//! The value type a channel broadcasts: a text with its keying parameters.

use serde::{Deserialize, Serialize};

/// One active broadcast message.
///
/// Identity is by value across all three fields: two instances with the same
/// text, speed and pitch are the same message, and the active set of a channel
/// collapses duplicates. A message changed in any field is a different message
/// and restarts its tone from phase zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    /// Text to key.
    pub text: String,
    /// Keying speed in dots per minute.
    pub dpm: u32,
    /// Tone pitch in Hz.
    pub frequency: u32,
}

impl Message {
    pub fn new(text: impl Into<String>, dpm: u32, frequency: u32) -> Self {
        Self {
            text: text.into(),
            dpm,
            frequency,
        }
    }
}
