//! Dynamic multiplexer: many simultaneous tones, one sample stream.

use std::collections::HashMap;

use super::message::Message;
use super::tone::ToneGenerator;
use super::SampleSource;

/// Fixed divisor applied when summing tones so that up to this many
/// full-scale tones stay within [-1, 1]. More simultaneous messages than
/// this may clip; accepted, not corrected.
pub const MIX_HEADROOM: f64 = 8.0;

/// Owns one [`ToneGenerator`] per active [`Message`] and reconciles that set
/// against the desired message list supplied each cycle.
pub struct Mixer {
    rate: u32,
    generators: HashMap<Message, ToneGenerator>,
}

impl Mixer {
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            generators: HashMap::new(),
        }
    }

    /// Reconcile the active generator set against `desired`.
    ///
    /// New messages get a fresh generator at phase zero; vanished messages
    /// have theirs dropped. Messages present in both sets keep their
    /// generator untouched, so an unchanged tone continues seamlessly
    /// across cycles.
    pub fn sync(&mut self, desired: &[Message]) {
        self.generators.retain(|message, _| desired.contains(message));
        for message in desired {
            if !self.generators.contains_key(message) {
                self.generators
                    .insert(message.clone(), ToneGenerator::new(message, self.rate));
            }
        }
    }

    /// Whether any tone is currently active.
    pub fn is_active(&self) -> bool {
        !self.generators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Rewind every active generator to the start of its text.
    pub fn reset(&mut self) {
        for generator in self.generators.values_mut() {
            generator.reset();
        }
    }
}

impl SampleSource for Mixer {
    /// Advance every generator one sample and return the normalized sum.
    /// Silence (0.0) when no message is active.
    fn next_sample(&mut self) -> f64 {
        self.generators
            .values_mut()
            .map(|g| g.next_sample() / MIX_HEADROOM)
            .sum()
    }
}
