//! Playback voice loaded from `.voice` files.
//!
//! A voice sets the waveform and envelope used by both the one-shot scale
//! run and the live keyboard.

use std::fs;
use std::path::Path;

/// Relative amplitudes of the harmonic partials 1..=5 before normalizing
const PARTIALS: [f64; 5] = [1.0, 0.25, 0.12, 0.06, 0.03];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    /// Sine plus four overtones
    Harmonic,
}

impl Waveform {
    /// (multiple of the fundamental, amplitude) pairs, amplitudes summing to 1.
    pub fn partials(self) -> Vec<(f64, f64)> {
        match self {
            Waveform::Sine => vec![(1.0, 1.0)],
            Waveform::Harmonic => {
                let sum: f64 = PARTIALS.iter().sum();
                PARTIALS
                    .iter()
                    .enumerate()
                    .map(|(k, a)| ((k + 1) as f64, a / sum))
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub waveform: Waveform,
    /// Attack time in seconds
    pub attack: f64,
    /// Pluck decay to silence, in seconds
    pub decay: f64,
    /// Release after a held key goes up, in seconds
    pub release: f64,
    /// Output gain (0.0..=1.0)
    pub gain: f64,
    /// Drone level relative to a note (0.0..=1.0)
    pub drone: f64,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            waveform: Waveform::Harmonic,
            attack: 0.005,
            decay: 2.2,
            release: 0.08,
            gain: 0.3,
            drone: 0.75,
        }
    }
}

#[derive(Debug)]
pub enum VoiceError {
    Io(std::io::Error),
    UnknownKey { line: usize, key: String },
    InvalidValue { line: usize, key: String, value: String },
}

impl std::fmt::Display for VoiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceError::Io(e) => write!(f, "reading voice file: {}", e),
            VoiceError::UnknownKey { line, key } => {
                write!(f, "line {}: unknown key '{}'", line, key)
            }
            VoiceError::InvalidValue { line, key, value } => {
                write!(f, "line {}: invalid {} '{}'", line, key, value)
            }
        }
    }
}

impl std::error::Error for VoiceError {}

/// Parse a single "key: value" line. Returns (key, value) or None.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Parse voice text.
///
/// Format (one per line, optional comments with #):
/// ```text
/// # pluck with overtones
/// waveform: harmonic
/// attack: 0.005
/// decay: 2.2
/// release: 0.08
/// gain: 0.3
/// drone: 0.75
/// ```
/// Missing keys keep their defaults.
pub fn parse(content: &str) -> Result<Voice, VoiceError> {
    let mut voice = Voice::default();

    for (line_idx, line) in content.lines().enumerate() {
        let line_num = line_idx + 1;
        let (key, value) = match parse_line(line) {
            Some(p) => p,
            None => continue,
        };
        let invalid = || VoiceError::InvalidValue {
            line: line_num,
            key: key.to_string(),
            value: value.to_string(),
        };
        let seconds = || {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(invalid)
        };
        match key {
            "waveform" => {
                voice.waveform = match value {
                    "sine" => Waveform::Sine,
                    "harmonic" => Waveform::Harmonic,
                    _ => return Err(invalid()),
                }
            }
            "attack" => voice.attack = seconds()?,
            "decay" => voice.decay = seconds()?,
            "release" => voice.release = seconds()?,
            "gain" => voice.gain = seconds()?.clamp(0.0, 1.0),
            "drone" => voice.drone = seconds()?.clamp(0.0, 1.0),
            _ => {
                return Err(VoiceError::UnknownKey {
                    line: line_num,
                    key: key.to_string(),
                });
            }
        }
    }

    Ok(voice)
}

/// Load a voice from a `.voice` file.
pub fn load(path: &Path) -> Result<Voice, VoiceError> {
    let content = fs::read_to_string(path).map_err(VoiceError::Io)?;
    parse(&content)
}

impl Voice {
    /// Envelope level `t` seconds into a pluck: linear attack, then an
    /// exponential fall reaching -80 dB at `decay`.
    pub fn pluck_level(&self, t: f64) -> f64 {
        if t < self.attack {
            return t / self.attack.max(f64::EPSILON);
        }
        if t >= self.decay {
            return 0.0;
        }
        let span = (self.decay - self.attack).max(f64::EPSILON);
        1e-4_f64.powf((t - self.attack) / span)
    }

    /// Pluck length in seconds
    pub fn pluck_length(&self) -> f64 {
        self.decay.max(self.attack)
    }
}
