//! Rebuilding everything derived from the current selection.
//!
//! A [`Selection`] is an immutable value: maqam, upper jins and transposition.
//! [`rebuild`] turns it into a fresh [`Layout`] (scale notes, both jins note
//! lists across three octaves, and keyboard bindings). Nothing in a layout is
//! ever patched; any change of selection builds a new one.

use log::debug;
use serde::Serialize;

use crate::keyboard::Keyboard;
use crate::label::{BASE_OCTAVE, is_micro, label, label_with_octave, octave_shift};
use crate::scale::{self, Scale};
use crate::theory::{self, Jins, Maqam, TheoryError};
use crate::tuning::{OCTAVE, Transposition};

/// Octave shifts each jins is listed in
pub const OCTAVE_SHIFTS: [i32; 3] = [-1, 0, 1];

/// Listed jins notes outside this range are dropped.
pub const NOTE_RANGE: (f64, f64) = (-OCTAVE, 3.0 * OCTAVE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Lower,
    Upper,
    Scale,
}

impl Group {
    pub fn tag(self) -> char {
        match self {
            Group::Lower => 'L',
            Group::Upper => 'U',
            Group::Scale => 'S',
        }
    }
}

/// A labeled, playable position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub position: f64,
    pub label: String,
    pub is_tonic: bool,
    pub is_micro: bool,
    /// Unique within a layout
    pub key: String,
    /// Frequency after transposition
    pub freq: f64,
}

/// The current choice of maqam, upper jins and tonic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub maqam: &'static Maqam,
    pub upper: &'static Jins,
    pub transposition: Transposition,
}

impl Selection {
    /// `upper` defaults to the maqam's default upper jins.
    pub fn new(
        maqam: &str,
        upper: Option<&str>,
        transposition: Transposition,
    ) -> Result<Self, TheoryError> {
        let maqam = theory::maqam(maqam)?;
        let upper = maqam.upper_jins(upper.unwrap_or(maqam.upper_default))?;
        Ok(Self {
            maqam,
            upper,
            transposition,
        })
    }

    /// Switch maqam; the upper jins resets to the new maqam's default.
    pub fn with_maqam(self, name: &str) -> Result<Self, TheoryError> {
        Self::new(name, None, self.transposition)
    }

    pub fn with_upper(self, name: &str) -> Result<Self, TheoryError> {
        Ok(Self {
            upper: self.maqam.upper_jins(name)?,
            ..self
        })
    }

    pub fn with_transposition(self, transposition: Transposition) -> Self {
        Self {
            transposition,
            ..self
        }
    }

    /// The allowed upper jins after the current one, wrapping around.
    pub fn next_upper(self) -> Result<Self, TheoryError> {
        let options = self.maqam.upper_options;
        let i = options
            .iter()
            .position(|&u| u == self.upper.name)
            .map_or(0, |i| (i + 1) % options.len());
        self.with_upper(options[i])
    }

    pub fn scale(&self) -> Result<Scale, TheoryError> {
        scale::build(self.maqam, self.maqam.lower_jins()?, self.upper)
    }

    /// Transposed frequency of a drone for this maqam.
    pub fn drone_freq(&self, drone: Drone) -> f64 {
        let position = match drone {
            Drone::Tonic => self.maqam.tonic,
            Drone::Upper => self.maqam.upper_anchor,
        };
        self.transposition.freq(position)
    }
}

/// A held sine under the melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drone {
    /// On the maqam's tonic
    Tonic,
    /// On the upper jins anchor
    Upper,
}

impl Drone {
    pub const ALL: [Drone; 2] = [Drone::Tonic, Drone::Upper];

    pub fn name(self) -> &'static str {
        match self {
            Drone::Tonic => "tonic",
            Drone::Upper => "upper",
        }
    }
}

/// Everything the display and input layers need for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub maqam: &'static str,
    pub upper_jins: &'static str,
    pub transposition: Transposition,
    pub scale: Vec<Note>,
    pub lower: Vec<Note>,
    pub upper: Vec<Note>,
    pub keyboard: Keyboard,
}

/// A jins laid out from `root` in each of [`OCTAVE_SHIFTS`].
pub fn jins_notes(
    jins: &Jins,
    root: f64,
    root_name: &str,
    group: Group,
    tonic_first: bool,
    transposition: Transposition,
) -> Vec<Note> {
    let mut notes = Vec::with_capacity(OCTAVE_SHIFTS.len() * jins.offsets.len());
    for sh in OCTAVE_SHIFTS {
        for (i, (offset, step_label)) in jins.offsets.iter().zip(jins.labels).enumerate() {
            let position = root + offset + sh as f64 * OCTAVE;
            if position < NOTE_RANGE.0 || position > NOTE_RANGE.1 {
                continue;
            }
            let name = if step_label.starts_with('T') {
                root_name
            } else {
                *step_label
            };
            let label = format!("{}{}", name, BASE_OCTAVE + sh);
            notes.push(Note {
                position,
                is_tonic: tonic_first && sh == 0 && i == 0,
                is_micro: is_micro(&label),
                label,
                key: format!("{}:{}:{}:{}", group.tag(), jins.name, i, sh),
                freq: transposition.freq(position),
            });
        }
    }
    notes
}

/// The scale as notes, labeled by position.
pub fn scale_notes(selection: &Selection, scale: &Scale) -> Vec<Note> {
    let maqam = selection.maqam;
    scale
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let label = label_with_octave(position, maqam.tonic);
            Note {
                position,
                is_tonic: i == 0,
                is_micro: is_micro(&label),
                label,
                key: format!(
                    "{}:{}:{}:{}:{}:{:.3}",
                    Group::Scale.tag(),
                    maqam.lower,
                    selection.upper.name,
                    i,
                    octave_shift(position, maqam.tonic),
                    position
                ),
                freq: selection.transposition.freq(position),
            }
        })
        .collect()
}

/// Rebuild the whole layout for `selection`.
pub fn rebuild(selection: &Selection) -> Result<Layout, TheoryError> {
    let maqam = selection.maqam;
    let lower = maqam.lower_jins()?;
    let scale = selection.scale()?;

    debug!(
        "rebuild: {} / {} transposed {} -> {:?}",
        maqam.name,
        selection.upper.name,
        selection.transposition.offset(),
        scale
    );

    let upper_root_name = label(maqam.upper_anchor);
    Ok(Layout {
        maqam: maqam.name,
        upper_jins: selection.upper.name,
        transposition: selection.transposition,
        scale: scale_notes(selection, &scale),
        lower: jins_notes(
            lower,
            maqam.tonic,
            maqam.tonic_name,
            Group::Lower,
            true,
            selection.transposition,
        ),
        upper: jins_notes(
            selection.upper,
            maqam.upper_anchor,
            &upper_root_name,
            Group::Upper,
            false,
            selection.transposition,
        ),
        keyboard: Keyboard::new(&scale, selection.transposition),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::MAQAMAT;
    use crate::tuning::comma_to_freq;

    fn select(maqam: &str, upper: Option<&str>) -> Selection {
        Selection::new(maqam, upper, Transposition::default()).unwrap()
    }

    #[test]
    fn test_default_upper() {
        let sel = select("Bayati on D", None);
        assert_eq!(sel.upper.name, "Rast");
    }

    #[test]
    fn test_upper_must_be_allowed() {
        let err = Selection::new("Kurd on D", Some("Rast"), Transposition::default());
        assert_eq!(
            err,
            Err(TheoryError::UpperJinsNotAllowed {
                maqam: "Kurd on D".into(),
                jins: "Rast".into()
            })
        );
    }

    #[test]
    fn test_next_upper_wraps() {
        let sel = select("Bayati on D", None);
        let names: Vec<&str> = std::iter::successors(Some(sel), |s| s.next_upper().ok())
            .take(4)
            .map(|s| s.upper.name)
            .collect();
        assert_eq!(names, ["Rast", "Nahawand", "Hijaz", "Rast"]);
    }

    #[test]
    fn test_with_maqam_resets_upper() {
        let sel = select("Rast on C", Some("Hijaz")).with_transposition(Transposition::new(9.0));
        let sel = sel.with_maqam("Nahawand on C").unwrap();
        assert_eq!(sel.upper.name, "Nahawand");
        assert_eq!(sel.transposition.offset(), 9.0);
    }

    #[test]
    fn test_scale_notes_rast() {
        let layout = rebuild(&select("Rast on C", None)).unwrap();
        let labels: Vec<&str> = layout.scale.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            labels,
            ["C4", "D4", "E♭½ (Rāst)4", "F4", "G5", "A5", "B♭½ (Rāst)5", "C5"]
        );
        assert!(layout.scale[0].is_tonic);
        assert!(layout.scale[2].is_micro);
        assert_eq!(layout.scale[3].key, "S:Rast:Rast:3:0:22.000");
        assert!((layout.scale[7].freq - 2.0 * 260.77).abs() < 1e-9);
    }

    #[test]
    fn test_jins_notes_three_octaves() {
        let layout = rebuild(&select("Rast on C", None)).unwrap();
        assert_eq!(layout.lower.len(), 12);
        assert_eq!(layout.lower[0].label, "C3");
        assert_eq!(layout.lower[0].position, -53.0);
        assert_eq!(layout.lower[4].label, "C4");
        assert!(layout.lower[4].is_tonic);
        assert_eq!(layout.lower.iter().filter(|n| n.is_tonic).count(), 1);
        assert_eq!(layout.lower[6].label, "E♭½ (Rāst)4");
        assert_eq!(layout.lower[6].key, "L:Rast:2:0");

        assert_eq!(layout.upper[4].label, "G4");
        assert!(layout.upper.iter().all(|n| !n.is_tonic));
        assert_eq!(layout.upper[0].key, "U:Rast:0:-1");
    }

    #[test]
    fn test_sikah_root_label() {
        let layout = rebuild(&select("Sikah on E♭½", None)).unwrap();
        assert_eq!(layout.lower[3].label, "E♭½4");
        assert_eq!(layout.lower[3].position, 16.0);
        assert_eq!(layout.upper[5].label, "E♭4");
    }

    #[test]
    fn test_saba_upper_anchor_name() {
        let layout = rebuild(&select("Saba on D", None)).unwrap();
        assert_eq!(layout.upper[4].label, "F4");
        assert_eq!(layout.upper[4].position, 22.0);
    }

    #[test]
    fn test_note_range_clamp() {
        let jins = theory::jins("Hijaz").unwrap();
        let notes = jins_notes(jins, 150.0, "X", Group::Upper, false, Transposition::default());
        assert!(notes.iter().all(|n| n.position >= -53.0 && n.position <= 159.0));
        // 97 101 115 119 | 150 154 | nothing from the octave above
        assert_eq!(notes.len(), 6);
    }

    #[test]
    fn test_keys_unique() {
        for m in MAQAMAT {
            for upper in m.upper_options {
                let layout = rebuild(&select(m.name, Some(upper))).unwrap();
                let keys: Vec<&str> = layout
                    .scale
                    .iter()
                    .chain(&layout.lower)
                    .chain(&layout.upper)
                    .map(|n| n.key.as_str())
                    .collect();
                for (i, k) in keys.iter().enumerate() {
                    assert!(!keys[i + 1..].contains(k), "{} / {}: {}", m.name, upper, k);
                }
            }
        }
    }

    #[test]
    fn test_transposition_moves_frequencies_only() {
        let plain = rebuild(&select("Hijaz on D", None)).unwrap();
        let moved = rebuild(&select("Hijaz on D", None).with_transposition(Transposition::new(4.0)))
            .unwrap();
        for (a, b) in plain.scale.iter().zip(&moved.scale) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.label, b.label);
            assert!((b.freq - comma_to_freq(a.position + 4.0)).abs() < 1e-9);
        }
        assert_eq!(moved.keyboard.position('a'), Some(13.0));
    }

    #[test]
    fn test_lookup_by_key() {
        let layout = rebuild(&select("Kurd on D", None)).unwrap();
        let note = layout.lower.iter().find(|n| n.key == "L:Kurd:1:0").unwrap();
        assert_eq!(note.position, 13.0);
        assert_eq!(note.label, "E♭4");
    }

    #[test]
    fn test_drone_frequencies() {
        let sel = select("Saba on D", None);
        assert!((sel.drone_freq(Drone::Tonic) - comma_to_freq(9.0)).abs() < 1e-9);
        assert!((sel.drone_freq(Drone::Upper) - comma_to_freq(22.0)).abs() < 1e-9);

        let sel = select("Sikah on E♭½", None).with_transposition(Transposition::new(-16.0));
        assert!((sel.drone_freq(Drone::Tonic) - 260.77).abs() < 1e-9);
        assert!((sel.drone_freq(Drone::Upper) - comma_to_freq(15.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rebuild_is_pure() {
        let sel = select("Sikah on E♭½", Some("Hijaz"));
        assert_eq!(rebuild(&sel).unwrap(), rebuild(&sel).unwrap());
    }
}
