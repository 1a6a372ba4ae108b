//! 53-EDO comma space: pitch-class tables, comma-to-frequency mapping and
//! the tonic transposition offset.
//!
//! Positions are absolute comma counts from C4. They are `f64` because the
//! quarter-tone variants sit on half-comma steps.

use serde::Serialize;

/// Commas per octave
pub const OCTAVE: f64 = 53.0;

/// Frequency of comma position 0 (C4)
pub const REFERENCE_FREQ: f64 = 260.77;

/// Chromatic semitone approximation (C -> C♯)
pub const CHROMATIC: f64 = 5.0;

/// Diatonic semitone approximation (C -> D♭)
pub const DIATONIC: f64 = 4.0;

/// Tolerance for structural comparisons (merging, dedup)
pub const MERGE_EPS: f64 = 1e-9;

/// Tolerance for matching a residue against a named pitch
pub const LABEL_EPS: f64 = 1e-6;

/// Natural pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 7] = [
        PitchClass::C,
        PitchClass::D,
        PitchClass::E,
        PitchClass::F,
        PitchClass::G,
        PitchClass::A,
        PitchClass::B,
    ];

    /// Comma offset within the octave (C=0, B=49)
    pub const fn commas(self) -> f64 {
        match self {
            PitchClass::C => 0.0,
            PitchClass::D => 9.0,
            PitchClass::E => 18.0,
            PitchClass::F => 22.0,
            PitchClass::G => 31.0,
            PitchClass::A => 40.0,
            PitchClass::B => 49.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::D => "D",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::G => "G",
            PitchClass::A => "A",
            PitchClass::B => "B",
        }
    }
}

/// Which way a quarter tone leans off the midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Half a comma low
    Bayati,
    /// Exact midpoint
    Rast,
    /// Half a comma high
    Sikah,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Bayati, Flavor::Rast, Flavor::Sikah];

    const fn shift(self) -> f64 {
        match self {
            Flavor::Bayati => -0.5,
            Flavor::Rast => 0.0,
            Flavor::Sikah => 0.5,
        }
    }

    fn display(self) -> &'static str {
        match self {
            Flavor::Bayati => "Bayātī",
            Flavor::Rast => "Rāst",
            Flavor::Sikah => "Sīkāh",
        }
    }
}

/// The two quarter-tone regions of the octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfFlat {
    /// Between D and F
    E,
    /// Between A and the octave C
    B,
}

/// A named quarter-tone pitch class, always derived from two naturals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Microtone {
    pub degree: HalfFlat,
    pub flavor: Flavor,
}

impl Microtone {
    pub const fn new(degree: HalfFlat, flavor: Flavor) -> Self {
        Self { degree, flavor }
    }

    /// All six, in labeling priority order.
    pub const ALL: [Microtone; 6] = [
        Microtone::new(HalfFlat::E, Flavor::Rast),
        Microtone::new(HalfFlat::E, Flavor::Bayati),
        Microtone::new(HalfFlat::E, Flavor::Sikah),
        Microtone::new(HalfFlat::B, Flavor::Rast),
        Microtone::new(HalfFlat::B, Flavor::Bayati),
        Microtone::new(HalfFlat::B, Flavor::Sikah),
    ];

    pub const fn commas(self) -> f64 {
        let mid = match self.degree {
            HalfFlat::E => midpoint(PitchClass::D.commas(), PitchClass::F.commas()),
            HalfFlat::B => midpoint(PitchClass::A.commas(), PitchClass::C.commas() + OCTAVE),
        };
        mid + self.flavor.shift()
    }

    pub fn name(self) -> String {
        let base = match self.degree {
            HalfFlat::E => "E♭½",
            HalfFlat::B => "B♭½",
        };
        format!("{} ({})", base, self.flavor.display())
    }
}

const fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Frequency in Hz of an absolute comma position.
pub fn comma_to_freq(position: f64) -> f64 {
    REFERENCE_FREQ * 2.0_f64.powf(position / OCTAVE)
}

/// Frequency relative to the reference (C4 = 1.0)
pub fn ratio(position: f64) -> f64 {
    comma_to_freq(position) / REFERENCE_FREQ
}

/// Offset applied to every position on its way to a frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transposition(f64);

impl Transposition {
    pub fn new(offset: f64) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> f64 {
        self.0
    }

    pub fn apply(self, position: f64) -> f64 {
        position + self.0
    }

    pub fn freq(self, position: f64) -> f64 {
        comma_to_freq(self.apply(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_frequency() {
        assert!((comma_to_freq(0.0) - 260.77).abs() < 1e-9);
    }

    #[test]
    fn test_octave_doubles() {
        assert!((comma_to_freq(53.0) - 2.0 * comma_to_freq(0.0)).abs() < 1e-9);
        assert!((comma_to_freq(-53.0) - comma_to_freq(0.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_classes_span_octave() {
        let commas: Vec<f64> = PitchClass::ALL.iter().map(|p| p.commas()).collect();
        assert!(commas.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(commas[0], 0.0);
        assert!(commas[6] < OCTAVE);
    }

    #[test]
    fn test_microtones_from_midpoints() {
        assert_eq!(Microtone::new(HalfFlat::E, Flavor::Rast).commas(), 15.5);
        assert_eq!(Microtone::new(HalfFlat::E, Flavor::Bayati).commas(), 15.0);
        assert_eq!(Microtone::new(HalfFlat::E, Flavor::Sikah).commas(), 16.0);
        assert_eq!(Microtone::new(HalfFlat::B, Flavor::Rast).commas(), 46.5);
        assert_eq!(Microtone::new(HalfFlat::B, Flavor::Sikah).commas(), 47.0);
    }

    #[test]
    fn test_microtone_names() {
        assert_eq!(Microtone::new(HalfFlat::E, Flavor::Sikah).name(), "E♭½ (Sīkāh)");
        assert_eq!(Microtone::new(HalfFlat::B, Flavor::Bayati).name(), "B♭½ (Bayātī)");
    }

    #[test]
    fn test_transposition() {
        let t = Transposition::default();
        assert_eq!(t.apply(31.0), 31.0);

        let t = Transposition::new(9.0);
        assert_eq!(t.apply(0.0), 9.0);
        assert!((t.freq(0.0) - comma_to_freq(9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ratio() {
        assert!((ratio(0.0) - 1.0).abs() < 1e-12);
        assert!((ratio(53.0) - 2.0).abs() < 1e-12);
    }
}
