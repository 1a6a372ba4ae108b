//! Selectable tonics for transposition.

use serde::Serialize;

use crate::theory::TheoryError;
use crate::tuning::{CHROMATIC, DIATONIC, Flavor, HalfFlat, Microtone, PitchClass, Transposition};

/// One entry of the tonic picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TonicOption {
    pub name: String,
    pub position: f64,
}

impl TonicOption {
    fn new(name: impl Into<String>, position: f64) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }

    pub fn transposition(&self) -> Transposition {
        Transposition::new(self.position)
    }

    /// Offset from C4, e.g. `(+16 c from C4)`.
    pub fn info(&self) -> String {
        let sign = if self.position > 0.0 { "+" } else { "" };
        format!("({}{} c from C4)", sign, self.position)
    }
}

fn natural(pc: PitchClass) -> TonicOption {
    TonicOption::new(pc.name(), pc.commas())
}

fn half_flats(degree: HalfFlat) -> impl Iterator<Item = TonicOption> {
    Flavor::ALL.into_iter().map(move |flavor| {
        let m = Microtone::new(degree, flavor);
        TonicOption::new(m.name(), m.commas())
    })
}

/// All tonics in picker order, first occurrence of each name kept.
pub fn build_options() -> Vec<TonicOption> {
    use PitchClass::*;

    let mut tonics = vec![
        natural(C),
        TonicOption::new("C♯", C.commas() + CHROMATIC),
        TonicOption::new("D♭", C.commas() + DIATONIC),
        natural(D),
        TonicOption::new("E♭", E.commas() - DIATONIC),
    ];
    tonics.extend(half_flats(HalfFlat::E));
    tonics.extend([
        natural(E),
        natural(F),
        TonicOption::new("F♯", F.commas() + CHROMATIC),
        TonicOption::new("G♭", F.commas() + DIATONIC),
        natural(G),
        TonicOption::new("A♭", A.commas() - DIATONIC),
        natural(A),
    ]);
    tonics.extend(half_flats(HalfFlat::B));
    tonics.extend([TonicOption::new("B♭", B.commas() - DIATONIC), natural(B)]);

    let mut seen: Vec<String> = Vec::with_capacity(tonics.len());
    tonics.retain(|t| {
        if seen.contains(&t.name) {
            false
        } else {
            seen.push(t.name.clone());
            true
        }
    });
    tonics
}

/// Fold the display glyphs to plain ASCII so `Eb1/2 rast` finds `E♭½ (Rāst)`.
fn fold(name: &str) -> String {
    name.chars()
        .flat_map(|c| match c {
            '♭' => vec!['b'],
            '♯' => vec!['#'],
            '½' => "1/2".chars().collect(),
            'ā' => vec!['a'],
            'ī' => vec!['i'],
            '(' | ')' | ' ' => vec![],
            c => c.to_lowercase().collect(),
        })
        .collect()
}

/// Find a tonic by display name, exact or ASCII spelling.
pub fn find(name: &str) -> Result<TonicOption, TheoryError> {
    let options = build_options();
    if let Some(t) = options.iter().find(|t| t.name == name) {
        return Ok(t.clone());
    }
    let wanted = fold(name);
    options
        .into_iter()
        .find(|t| fold(&t.name) == wanted)
        .ok_or_else(|| TheoryError::UnknownTonic(name.to_string()))
}
