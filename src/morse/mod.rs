//! Morse synthesis: alphabet, keying timing, and sample-stream building blocks.

pub mod message;
pub mod mixer;
pub mod tone;

/// A pull-based mono sample stream. One sample in [-1, 1] per call.
///
/// Implemented by a single keyed tone and by the composite mixer, so the
/// same contract nests uniformly.
pub trait SampleSource {
    fn next_sample(&mut self) -> f64;
}

/// Dash length in dot units.
pub const DASH_UNITS: u64 = 3;
/// Gap between symbols of one character, in dot units.
pub const SYMBOL_GAP_UNITS: u64 = 1;
/// Gap between characters, in dot units.
pub const CHAR_GAP_UNITS: u64 = 3;
/// Gap between words, in dot units. Also used for characters outside the
/// alphabet and for re-entering the text when the stream loops.
pub const WORD_GAP_UNITS: u64 = 7;

/// Duration of one dot in samples.
///
/// DPM is dots per minute, so one dot lasts `60 / dpm` seconds.
pub fn dot_samples(sample_rate: u32, dpm: u32) -> u64 {
    u64::from(sample_rate) * 60 / u64::from(dpm.max(1))
}

/// ITU Morse code for a character, dots and dashes, or `None` for anything
/// outside the supported alphabet (letters and digits).
pub fn code_for(c: char) -> Option<&'static str> {
    Some(match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    })
}
