use serde::Serialize;

use crate::scale::{SCALE_LEN, Scale};
use crate::tuning::{OCTAVE, Transposition, comma_to_freq};

/// Home row: the scale itself, tonic to octave
pub const MID_KEYS: [char; SCALE_LEN] = ['a', 's', 'd', 'f', 'g', 'h', 'j', 'k'];
/// Bottom row: degrees 0-6 an octave down
pub const BASS_KEYS: [char; SCALE_LEN - 1] = ['z', 'x', 'c', 'v', 'b', 'n', 'm'];
/// Top row: degrees 0-6 an octave up
pub const HIGH_KEYS: [char; SCALE_LEN - 1] = ['q', 'w', 'e', 'r', 't', 'y', 'u'];

/// Map a keyboard character to a (scale degree, octave shift) pair.
pub fn char_to_degree(c: char) -> Option<(usize, i32)> {
    let c = c.to_ascii_lowercase();
    if let Some(i) = MID_KEYS.iter().position(|&k| k == c) {
        return Some((i, 0));
    }
    if let Some(i) = BASS_KEYS.iter().position(|&k| k == c) {
        return Some((i, -1));
    }
    HIGH_KEYS.iter().position(|&k| k == c).map(|i| (i, 1))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyBinding {
    pub key: char,
    pub degree: usize,
    pub shift: i32,
    /// Transposed absolute position
    pub position: f64,
}

/// Key bindings for one rebuilt scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Keyboard {
    bindings: Vec<KeyBinding>,
}

impl Keyboard {
    pub fn new(scale: &Scale, transposition: Transposition) -> Self {
        let bindings = MID_KEYS
            .iter()
            .chain(BASS_KEYS.iter())
            .chain(HIGH_KEYS.iter())
            .filter_map(|&key| {
                let (degree, shift) = char_to_degree(key)?;
                Some(KeyBinding {
                    key,
                    degree,
                    shift,
                    position: transposition.apply(scale[degree]) + shift as f64 * OCTAVE,
                })
            })
            .collect();
        Self { bindings }
    }

    pub fn position(&self, key: char) -> Option<f64> {
        let key = key.to_ascii_lowercase();
        self.bindings
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.position)
    }

    pub fn freq(&self, key: char) -> Option<f64> {
        self.position(key).map(comma_to_freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAST: Scale = [0.0, 9.0, 15.5, 22.0, 31.0, 40.0, 46.5, 53.0];

    #[test]
    fn test_char_mapping() {
        assert_eq!(char_to_degree('a'), Some((0, 0)));
        assert_eq!(char_to_degree('k'), Some((7, 0)));
        assert_eq!(char_to_degree('z'), Some((0, -1)));
        assert_eq!(char_to_degree('U'), Some((6, 1)));
        assert_eq!(char_to_degree('i'), None);
        assert_eq!(char_to_degree('1'), None);
    }

    #[test]
    fn test_rows() {
        let kb = Keyboard::new(&RAST, Transposition::default());
        assert_eq!(kb.bindings.len(), 22);
        assert_eq!(kb.position('d'), Some(15.5));
        assert_eq!(kb.position('c'), Some(15.5 - 53.0));
        assert_eq!(kb.position('e'), Some(15.5 + 53.0));
        assert_eq!(kb.position('k'), Some(53.0));
        assert_eq!(kb.position('p'), None);
    }

    #[test]
    fn test_transposed() {
        let kb = Keyboard::new(&RAST, Transposition::new(9.0));
        assert_eq!(kb.position('a'), Some(9.0));
        assert_eq!(kb.position('k'), Some(62.0));
        assert_eq!(kb.position('z'), Some(-44.0));
        let f = kb.freq('a').unwrap();
        assert!((f - comma_to_freq(9.0)).abs() < 1e-9);
    }
}
