//! Jins and maqam tables.
//!
//! Both registries are static, ordered, and looked up by exact name.

use serde::Serialize;

use crate::tuning::{Flavor, HalfFlat, Microtone, PitchClass};

/// A melodic fragment: comma offsets from its own root, with a label per step.
/// Labels starting with `T` stand for the root itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Jins {
    pub name: &'static str,
    pub offsets: &'static [f64],
    pub labels: &'static [&'static str],
}

/// A scale template: lower jins on the tonic, upper jins on a fixed anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Maqam {
    pub name: &'static str,
    pub tonic: f64,
    pub tonic_name: &'static str,
    pub lower: &'static str,
    pub upper_anchor: f64,
    pub upper_default: &'static str,
    pub upper_options: &'static [&'static str],
}

impl Maqam {
    pub fn allows(&self, upper: &str) -> bool {
        self.upper_options.contains(&upper)
    }

    pub fn lower_jins(&self) -> Result<&'static Jins, TheoryError> {
        jins(self.lower)
    }

    /// Resolve an upper jins, which must be one of this maqam's options.
    pub fn upper_jins(&self, name: &str) -> Result<&'static Jins, TheoryError> {
        if !self.allows(name) {
            return Err(TheoryError::UpperJinsNotAllowed {
                maqam: self.name.to_string(),
                jins: name.to_string(),
            });
        }
        jins(name)
    }
}

/// Theory-level failures
#[derive(Debug, Clone, PartialEq)]
pub enum TheoryError {
    UnknownJins(String),
    UnknownMaqam(String),
    UnknownTonic(String),
    UpperJinsNotAllowed { maqam: String, jins: String },
    /// The merge produced fewer than eight positions.
    IncompleteScale { maqam: String, upper: String, len: usize },
}

impl std::fmt::Display for TheoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TheoryError::UnknownJins(name) => write!(f, "unknown jins: {}", name),
            TheoryError::UnknownMaqam(name) => write!(f, "unknown maqam: {}", name),
            TheoryError::UnknownTonic(name) => write!(f, "unknown tonic: {}", name),
            TheoryError::UpperJinsNotAllowed { maqam, jins } => {
                write!(f, "{} does not take {} as its upper jins", maqam, jins)
            }
            TheoryError::IncompleteScale { maqam, upper, len } => write!(
                f,
                "{} with upper {} merges to {} positions, expected 8",
                maqam, upper, len
            ),
        }
    }
}

impl std::error::Error for TheoryError {}

pub static JINS: &[Jins] = &[
    Jins {
        name: "Rast",
        offsets: &[0.0, 9.0, 15.5, 22.0],
        labels: &["T", "2", "E♭½ (Rāst)", "4"],
    },
    Jins {
        name: "Bayati",
        offsets: &[0.0, 6.0, 13.0, 22.0],
        labels: &["T", "E♭½ (Bayātī)", "F", "G"],
    },
    Jins {
        name: "Sikah",
        offsets: &[0.0, 6.0, 15.0],
        labels: &["T (E♭½ Sīkāh)", "F", "G"],
    },
    Jins {
        name: "Hijaz",
        offsets: &[0.0, 4.0, 18.0, 22.0],
        labels: &["T", "E♭", "F♯", "G"],
    },
    Jins {
        name: "Kurd",
        offsets: &[0.0, 4.0, 13.0, 22.0],
        labels: &["T", "E♭", "F", "G"],
    },
    Jins {
        name: "Nahawand",
        offsets: &[0.0, 9.0, 13.0, 22.0],
        labels: &["T", "D", "E♭", "F"],
    },
    Jins {
        name: "Ajam",
        offsets: &[0.0, 9.0, 18.0, 22.0],
        labels: &["T", "D", "E", "F"],
    },
    Jins {
        name: "Saba",
        offsets: &[0.0, 6.0, 13.0, 18.0],
        labels: &["T", "E♭½ (Bayātī)", "F", "G♭"],
    },
];

const C: f64 = PitchClass::C.commas();
const D: f64 = PitchClass::D.commas();
const F: f64 = PitchClass::F.commas();
const G: f64 = PitchClass::G.commas();

pub static MAQAMAT: &[Maqam] = &[
    Maqam {
        name: "Rast on C",
        tonic: C,
        tonic_name: "C",
        lower: "Rast",
        upper_anchor: G,
        upper_default: "Rast",
        upper_options: &["Rast", "Bayati", "Hijaz", "Nahawand"],
    },
    Maqam {
        name: "Bayati on D",
        tonic: D,
        tonic_name: "D",
        lower: "Bayati",
        upper_anchor: G,
        upper_default: "Rast",
        upper_options: &["Rast", "Nahawand", "Hijaz"],
    },
    Maqam {
        name: "Nahawand on C",
        tonic: C,
        tonic_name: "C",
        lower: "Nahawand",
        upper_anchor: G,
        upper_default: "Nahawand",
        upper_options: &["Rast", "Bayati", "Hijaz", "Nahawand"],
    },
    Maqam {
        name: "Ajam on C",
        tonic: C,
        tonic_name: "C",
        lower: "Ajam",
        upper_anchor: G,
        upper_default: "Ajam",
        upper_options: &["Ajam"],
    },
    Maqam {
        name: "Kurd on D",
        tonic: D,
        tonic_name: "D",
        lower: "Kurd",
        upper_anchor: G,
        upper_default: "Kurd",
        upper_options: &["Kurd"],
    },
    Maqam {
        name: "Hijaz on D",
        tonic: D,
        tonic_name: "D",
        lower: "Hijaz",
        upper_anchor: G,
        upper_default: "Hijaz",
        upper_options: &["Hijaz"],
    },
    Maqam {
        name: "Saba on D",
        tonic: D,
        tonic_name: "D",
        lower: "Saba",
        upper_anchor: F,
        upper_default: "Hijaz",
        upper_options: &["Hijaz"],
    },
    Maqam {
        name: "Sikah on E♭½",
        tonic: Microtone::new(HalfFlat::E, Flavor::Sikah).commas(),
        tonic_name: "E♭½",
        lower: "Sikah",
        upper_anchor: G,
        upper_default: "Hijaz",
        upper_options: &["Hijaz"],
    },
];

pub fn jins(name: &str) -> Result<&'static Jins, TheoryError> {
    JINS.iter()
        .find(|j| j.name == name)
        .ok_or_else(|| TheoryError::UnknownJins(name.to_string()))
}

pub fn maqam(name: &str) -> Result<&'static Maqam, TheoryError> {
    MAQAMAT
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| TheoryError::UnknownMaqam(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jins_invariants() {
        for j in JINS {
            assert!((3..=4).contains(&j.offsets.len()), "{}", j.name);
            assert_eq!(j.offsets.len(), j.labels.len(), "{}", j.name);
            assert_eq!(j.offsets[0], 0.0, "{}", j.name);
            assert!(j.offsets.windows(2).all(|w| w[0] < w[1]), "{}", j.name);
            assert!(j.labels[0].starts_with('T'), "{}", j.name);
        }
    }

    #[test]
    fn test_maqam_invariants() {
        for m in MAQAMAT {
            assert!(!m.upper_options.is_empty(), "{}", m.name);
            assert!(m.allows(m.upper_default), "{}", m.name);
            assert!(m.lower_jins().is_ok(), "{}", m.name);
            for u in m.upper_options {
                assert!(jins(u).is_ok(), "{} -> {}", m.name, u);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(jins("Hijaz").unwrap().offsets, &[0.0, 4.0, 18.0, 22.0]);
        assert_eq!(maqam("Sikah on E♭½").unwrap().tonic, 16.0);
        assert_eq!(
            jins("Zanjaran"),
            Err(TheoryError::UnknownJins("Zanjaran".into()))
        );
        assert_eq!(
            maqam("rast on c"),
            Err(TheoryError::UnknownMaqam("rast on c".into()))
        );
    }

    #[test]
    fn test_upper_substitution_checked() {
        let m = maqam("Ajam on C").unwrap();
        assert!(m.upper_jins("Ajam").is_ok());
        assert_eq!(
            m.upper_jins("Hijaz"),
            Err(TheoryError::UpperJinsNotAllowed {
                maqam: "Ajam on C".into(),
                jins: "Hijaz".into()
            })
        );
    }

    #[test]
    fn test_registry_json() {
        let value = serde_json::to_value(maqam("Saba on D").unwrap()).unwrap();
        assert_eq!(value["lower"], "Saba");
        assert_eq!(value["upper_anchor"], 22.0);
        assert_eq!(value["upper_options"], serde_json::json!(["Hijaz"]));

        let value = serde_json::to_value(JINS).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(JINS.len()));
        assert_eq!(value[0]["labels"][2], "E♭½ (Rāst)");
    }

    #[test]
    fn test_unique_names() {
        for (i, a) in MAQAMAT.iter().enumerate() {
            assert!(MAQAMAT[i + 1..].iter().all(|b| b.name != a.name));
        }
        for (i, a) in JINS.iter().enumerate() {
            assert!(JINS[i + 1..].iter().all(|b| b.name != a.name));
        }
    }
}
