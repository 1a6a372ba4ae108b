//! One-octave scale assembly.
//!
//! The lower jins sits on the tonic and the upper jins on the maqam's fixed
//! anchor. Both are merged into a sorted position list, theory exceptions are
//! applied, and the result is trimmed to eight notes from tonic to octave.

use log::{debug, warn};

use crate::theory::{Jins, Maqam, TheoryError};
use crate::tuning::{MERGE_EPS, OCTAVE, PitchClass};

/// Notes per one-octave scale, both tonics included
pub const SCALE_LEN: usize = 8;

/// Eight strictly increasing positions, tonic first and octave last.
pub type Scale = [f64; SCALE_LEN];

/// What an exception does once its predicate matches.
#[derive(Debug, Clone, Copy)]
pub enum RuleAction {
    /// Replace the whole scale with these offsets from the tonic.
    Override(&'static [f64; SCALE_LEN]),
    /// Add this absolute position if it is missing and inside the octave.
    Inject(f64),
}

/// A named correction the generic merge cannot express.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionRule {
    pub name: &'static str,
    pub applies: fn(&Maqam, &Jins) -> bool,
    pub action: RuleAction,
}

/// Applied in order, between merge and trim.
pub static EXCEPTION_RULES: &[ExceptionRule] = &[
    // Saba drops the F♯ the Hijaz-on-F merge would produce.
    ExceptionRule {
        name: "saba-full-scale",
        applies: |m, _| m.lower == "Saba",
        action: RuleAction::Override(&[0.0, 6.0, 13.0, 17.0, 31.0, 35.0, 44.0, OCTAVE]),
    },
    // Natural D below the octave as leading tone.
    ExceptionRule {
        name: "sikah-hijaz-leading-tone",
        applies: |m, upper| m.lower == "Sikah" && upper.name == "Hijaz",
        action: RuleAction::Inject(PitchClass::D.commas() + OCTAVE),
    },
];

fn contains(list: &[f64], x: f64) -> bool {
    list.iter().any(|y| (y - x).abs() < MERGE_EPS)
}

fn dedup_sorted(list: &mut Vec<f64>) {
    list.sort_by(f64::total_cmp);
    list.dedup_by(|a, b| (*a - *b).abs() < MERGE_EPS);
}

/// Lower and upper jins laid out and merged, closed by the octave.
/// Sorted, deduplicated and limited to `[tonic, tonic + 53]`.
pub fn merge(maqam: &Maqam, lower: &Jins, upper: &Jins) -> Vec<f64> {
    let tonic = maqam.tonic;
    let octave = tonic + OCTAVE;

    let mut joined: Vec<f64> = lower.offsets.iter().map(|o| tonic + o).collect();
    let upper_abs: Vec<f64> = upper.offsets.iter().map(|o| maqam.upper_anchor + o).collect();

    // A shared root is only counted once.
    let skip = usize::from(contains(&joined, upper_abs[0]));
    for &x in &upper_abs[skip..] {
        if !contains(&joined, x) {
            joined.push(x);
        }
    }
    joined.push(octave);

    joined.retain(|&x| x >= tonic - MERGE_EPS && x <= octave + MERGE_EPS);
    dedup_sorted(&mut joined);
    joined
}

/// Keep the tonic, the next six positions up, and the octave.
pub fn trim(positions: &[f64], tonic: f64) -> Vec<f64> {
    if positions.len() <= SCALE_LEN {
        return positions.to_vec();
    }

    let octave = tonic + OCTAVE;
    let mut picked = vec![tonic];
    picked.extend(
        positions
            .iter()
            .copied()
            .filter(|&x| (x - tonic).abs() > MERGE_EPS && (x - octave).abs() > MERGE_EPS)
            .take(SCALE_LEN - 2),
    );
    picked.push(octave);

    dedup_sorted(&mut picked);
    picked.truncate(SCALE_LEN);
    picked
}

/// Build the one-octave scale for `maqam` with `upper` as its upper jins.
pub fn build(maqam: &Maqam, lower: &Jins, upper: &Jins) -> Result<Scale, TheoryError> {
    let rules: Vec<&ExceptionRule> = EXCEPTION_RULES
        .iter()
        .filter(|r| (r.applies)(maqam, upper))
        .collect();

    if let Some((rule, offsets)) = rules.iter().find_map(|r| match r.action {
        RuleAction::Override(offsets) => Some((r, offsets)),
        RuleAction::Inject(_) => None,
    }) {
        debug!("{}: applying {}", maqam.name, rule.name);
        return Ok(offsets.map(|o| maqam.tonic + o));
    }

    let mut positions = merge(maqam, lower, upper);
    let octave = maqam.tonic + OCTAVE;

    for rule in &rules {
        if let RuleAction::Inject(pos) = rule.action {
            let in_range = pos >= maqam.tonic - MERGE_EPS && pos <= octave + MERGE_EPS;
            if in_range && !contains(&positions, pos) {
                debug!("{}: applying {} at {}", maqam.name, rule.name, pos);
                positions.push(pos);
                positions.sort_by(f64::total_cmp);
            }
        }
    }

    let trimmed = trim(&positions, maqam.tonic);
    <Scale>::try_from(trimmed.as_slice()).map_err(|_| {
        warn!(
            "{} with upper {} merged to {} positions",
            maqam.name,
            upper.name,
            trimmed.len()
        );
        TheoryError::IncompleteScale {
            maqam: maqam.name.to_string(),
            upper: upper.name.to_string(),
            len: trimmed.len(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::{MAQAMAT, jins, maqam};

    fn build_named(maqam_name: &str, upper: &str) -> Scale {
        let m = maqam(maqam_name).unwrap();
        build(m, m.lower_jins().unwrap(), m.upper_jins(upper).unwrap()).unwrap()
    }

    fn assert_scale(actual: &Scale, expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_rast_on_c_fixture() {
        let scale = build_named("Rast on C", "Rast");
        assert_scale(&scale, &[0.0, 9.0, 15.5, 22.0, 31.0, 40.0, 46.5, 53.0]);
    }

    #[test]
    fn test_bayati_shared_root() {
        // G closes the lower jins and opens the upper one
        let scale = build_named("Bayati on D", "Rast");
        assert_scale(&scale, &[9.0, 15.0, 22.0, 31.0, 40.0, 46.5, 53.0, 62.0]);
    }

    #[test]
    fn test_upper_substitution_keeps_anchor() {
        let scale = build_named("Rast on C", "Hijaz");
        assert_scale(&scale, &[0.0, 9.0, 15.5, 22.0, 31.0, 35.0, 49.0, 53.0]);
        let scale = build_named("Rast on C", "Nahawand");
        assert_scale(&scale, &[0.0, 9.0, 15.5, 22.0, 31.0, 40.0, 44.0, 53.0]);
    }

    #[test]
    fn test_sikah_hijaz_injects_d() {
        let scale = build_named("Sikah on E♭½", "Hijaz");
        assert!(scale.iter().any(|&x| (x - 62.0).abs() < 1e-9));
        assert_scale(&scale, &[16.0, 22.0, 31.0, 35.0, 49.0, 53.0, 62.0, 69.0]);
    }

    #[test]
    fn test_sikah_without_rule_is_short() {
        let m = maqam("Sikah on E♭½").unwrap();
        let merged = merge(m, m.lower_jins().unwrap(), jins("Hijaz").unwrap());
        assert_eq!(merged.len(), 7);
    }

    #[test]
    fn test_saba_override() {
        let scale = build_named("Saba on D", "Hijaz");
        assert_scale(&scale, &[9.0, 15.0, 22.0, 26.0, 40.0, 44.0, 53.0, 62.0]);
    }

    #[test]
    fn test_saba_override_ignores_upper() {
        let m = maqam("Saba on D").unwrap();
        let lower = m.lower_jins().unwrap();
        for j in crate::theory::JINS {
            let scale = build(m, lower, j).unwrap();
            assert_scale(&scale, &[9.0, 15.0, 22.0, 26.0, 40.0, 44.0, 53.0, 62.0]);
        }
    }

    #[test]
    fn test_every_registered_combination() {
        for m in MAQAMAT {
            for upper in m.upper_options {
                let scale = build_named(m.name, upper);
                assert!((scale[0] - m.tonic).abs() < 1e-9, "{} / {}", m.name, upper);
                assert!(
                    (scale[SCALE_LEN - 1] - (m.tonic + OCTAVE)).abs() < 1e-9,
                    "{} / {}",
                    m.name,
                    upper
                );
                assert!(
                    scale.windows(2).all(|w| w[1] - w[0] > MERGE_EPS),
                    "{} / {}: {:?}",
                    m.name,
                    upper,
                    scale
                );
            }
        }
    }

    #[test]
    fn test_build_is_pure() {
        for m in MAQAMAT {
            let a = build_named(m.name, m.upper_default);
            let b = build_named(m.name, m.upper_default);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_trim_keeps_lowest_interior() {
        let positions = [0.0, 4.0, 9.0, 13.0, 15.5, 22.0, 31.0, 40.0, 46.5, 53.0];
        let trimmed = trim(&positions, 0.0);
        assert_eq!(trimmed, vec![0.0, 4.0, 9.0, 13.0, 15.5, 22.0, 31.0, 53.0]);
    }

    #[test]
    fn test_trim_short_list_untouched() {
        let positions = [0.0, 9.0, 22.0, 53.0];
        assert_eq!(trim(&positions, 0.0), positions.to_vec());
    }

    #[test]
    fn test_overfull_merge_is_trimmed() {
        let m = Maqam {
            name: "Wide",
            tonic: 0.0,
            tonic_name: "C",
            lower: "Rast",
            upper_anchor: 26.0,
            upper_default: "Hijaz",
            upper_options: &["Hijaz"],
        };
        // 0 9 15.5 22 | 26 30 44 48 | 53
        let scale = build(&m, jins("Rast").unwrap(), jins("Hijaz").unwrap()).unwrap();
        assert_scale(&scale, &[0.0, 9.0, 15.5, 22.0, 26.0, 30.0, 44.0, 53.0]);
    }

    #[test]
    fn test_short_merge_is_an_error() {
        let m = Maqam {
            name: "Narrow",
            tonic: 0.0,
            tonic_name: "C",
            lower: "Sikah",
            upper_anchor: 6.0,
            upper_default: "Sikah",
            upper_options: &["Sikah"],
        };
        let sikah = jins("Sikah").unwrap();
        assert_eq!(
            build(&m, sikah, sikah),
            Err(TheoryError::IncompleteScale {
                maqam: "Narrow".into(),
                upper: "Sikah".into(),
                len: 6
            })
        );
    }

    #[test]
    fn test_near_equal_upper_root_is_shared() {
        let bayati = maqam("Bayati on D").unwrap();
        let m = Maqam {
            upper_anchor: 31.0 + 1e-12,
            ..bayati.clone()
        };
        let merged = merge(&m, jins("Bayati").unwrap(), jins("Rast").unwrap());
        assert_eq!(merged.len(), 8);
        assert_eq!(merged.iter().filter(|&&x| (x - 31.0).abs() < 1e-6).count(), 1);
        assert_eq!(merged[3], 31.0);

        let scale = build(&m, jins("Bayati").unwrap(), jins("Rast").unwrap()).unwrap();
        assert_scale(&scale, &[9.0, 15.0, 22.0, 31.0, 40.0, 46.5, 53.0, 62.0]);
    }

    #[test]
    fn test_contains_uses_tolerance() {
        assert!(contains(&[9.0, 31.0], 31.0 + 1e-12));
        assert!(contains(&[9.0, 31.0], 31.0 - 5e-10));
        assert!(!contains(&[9.0, 31.0], 31.0 + 1e-6));
        assert!(!contains(&[], 0.0));
    }

    #[test]
    fn test_dedup_collapses_within_tolerance() {
        let mut list = vec![22.0, 9.0 + 5e-10, 0.0, 9.0, 22.0 + 1e-6];
        dedup_sorted(&mut list);
        assert_eq!(list.len(), 4);
        assert!((list[1] - 9.0).abs() < 1e-9);
        assert_eq!(&list[2..], &[22.0, 22.0 + 1e-6]);
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<&str> = EXCEPTION_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, ["saba-full-scale", "sikah-hijaz-leading-tone"]);
    }
}
