//! On/off-keyed sine generator for a single message.

use std::f64::consts::TAU;

use super::message::Message;
use super::{code_for, dot_samples, SampleSource, CHAR_GAP_UNITS, DASH_UNITS, SYMBOL_GAP_UNITS, WORD_GAP_UNITS};

#[derive(Debug, Clone, Copy)]
struct Segment {
    keyed: bool,
    samples: u64,
}

/// An unbounded, restartable stream of amplitude samples keying a message's
/// text in Morse code.
///
/// The text is compiled once into alternating on/off segments measured in
/// samples; the generator then advances exactly one sample per call. On
/// reaching the end of the text it loops, re-entering through an inter-word
/// gap. Characters outside the alphabet contribute an inter-word gap.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    segments: Vec<Segment>,
    /// Phase advance per sample, `2π · frequency / sample_rate`.
    step: f64,
    segment: usize,
    offset: u64,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(message: &Message, sample_rate: u32) -> Self {
        let dot = dot_samples(sample_rate, message.dpm).max(1);
        Self {
            segments: compile(&message.text, dot),
            step: TAU * f64::from(message.frequency) / f64::from(sample_rate.max(1)),
            segment: 0,
            offset: 0,
            phase: 0.0,
        }
    }

    /// Rewind to the start of the text.
    pub fn reset(&mut self) {
        self.segment = 0;
        self.offset = 0;
        self.phase = 0.0;
    }
}

impl SampleSource for ToneGenerator {
    fn next_sample(&mut self) -> f64 {
        let seg = self.segments[self.segment];
        let value = if seg.keyed { self.phase.sin() } else { 0.0 };

        self.phase = (self.phase + self.step) % TAU;
        self.offset += 1;
        if self.offset >= seg.samples {
            self.offset = 0;
            self.segment = (self.segment + 1) % self.segments.len();
        }
        value
    }
}

impl Iterator for ToneGenerator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_sample())
    }
}

/// Compile text into keying segments. `dot` is the dot duration in samples.
fn compile(text: &str, dot: u64) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for c in text.chars() {
        match code_for(c) {
            Some(code) => {
                for (i, symbol) in code.chars().enumerate() {
                    if i > 0 {
                        segments.push(Segment {
                            keyed: false,
                            samples: SYMBOL_GAP_UNITS * dot,
                        });
                    }
                    let units = if symbol == '-' { DASH_UNITS } else { 1 };
                    segments.push(Segment {
                        keyed: true,
                        samples: units * dot,
                    });
                }
                segments.push(Segment {
                    keyed: false,
                    samples: CHAR_GAP_UNITS * dot,
                });
            }
            // Spaces and unsupported characters both read as a word gap.
            None => widen_gap(&mut segments, WORD_GAP_UNITS * dot),
        }
    }

    // The stream loops; re-enter the text through a full word gap.
    widen_gap(&mut segments, WORD_GAP_UNITS * dot);
    segments
}

/// Extend the trailing off segment to at least `samples`, merging adjacent
/// gaps instead of stacking them.
fn widen_gap(segments: &mut Vec<Segment>, samples: u64) {
    match segments.last_mut() {
        Some(last) if !last.keyed => last.samples = last.samples.max(samples),
        _ => segments.push(Segment {
            keyed: false,
            samples,
        }),
    }
}
