//! Position -> pitch name.

use crate::tuning::{DIATONIC, LABEL_EPS, Microtone, OCTAVE, PitchClass};

/// Octave number given to the tonic's own octave
pub const BASE_OCTAVE: i32 = 4;

/// Marker carried by every quarter-tone label
pub const HALF_MARKER: char = '½';

/// Sharps and flats, each a natural nudged by a diatonic step.
/// Checked in this order after the naturals.
const ACCIDENTALS: [(&str, PitchClass, f64); 7] = [
    ("D♭", PitchClass::C, DIATONIC),
    ("C♯", PitchClass::D, -DIATONIC),
    ("E♭", PitchClass::D, DIATONIC),
    ("F♯", PitchClass::G, -DIATONIC),
    ("G♭", PitchClass::F, DIATONIC),
    ("A♭", PitchClass::G, DIATONIC),
    ("B♭", PitchClass::A, DIATONIC),
];

/// Position folded into [0, 53)
pub fn residue(position: f64) -> f64 {
    ((position % OCTAVE) + OCTAVE) % OCTAVE
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < LABEL_EPS
}

/// Canonical pitch name of a position, octave-independent.
///
/// Unknown residues fall back to the comma count, e.g. `(17.0c)`.
pub fn label(position: f64) -> String {
    let rel = residue(position);

    if let Some(pc) = PitchClass::ALL.iter().find(|pc| close(rel, pc.commas())) {
        return pc.name().to_string();
    }

    for (name, natural, step) in ACCIDENTALS {
        if close(rel, natural.commas() + step) {
            return name.to_string();
        }
    }

    if let Some(m) = Microtone::ALL.iter().find(|m| close(rel, m.commas())) {
        return m.name();
    }

    format!("({:.1}c)", rel)
}

pub fn is_micro(label: &str) -> bool {
    label.contains(HALF_MARKER)
}

/// Octave shift of `position` relative to the octave starting at `tonic`.
pub fn octave_shift(position: f64, tonic: f64) -> i32 {
    ((position - tonic) / OCTAVE).round() as i32
}

/// Label with an octave number appended, e.g. `E♭½ (Rāst)4`.
pub fn label_with_octave(position: f64, tonic: f64) -> String {
    format!("{}{}", label(position), BASE_OCTAVE + octave_shift(position, tonic))
}
