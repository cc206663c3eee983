use serde::{Deserialize, Serialize};
use tessitura_domain_pitch::UserNote;
use tessitura_domain_song::ReferenceNote;
use tessitura_ports::types::ScoringConfig;

const CENTS_PER_SEMITONE: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub pitch: f64,
    pub rhythm: f64,
    pub matched: u32,
    pub total_notes: u32,
}

impl ScoreBreakdown {
    pub fn empty(total_notes: usize) -> Self {
        Self {
            total_notes: total_notes as u32,
            ..Self::default()
        }
    }
}

/// A reference note paired with the user note that claimed it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteMatch {
    pub reference_index: usize,
    pub user_index: usize,
    pub cents_error: f64,
    pub time_error_s: f64,
}

impl NoteMatch {
    pub fn pitch_score(&self, config: &ScoringConfig) -> f64 {
        (1.0 - self.cents_error / config.pitch_tolerance_cents).max(0.0)
    }

    pub fn rhythm_score(&self, config: &ScoringConfig) -> f64 {
        (1.0 - self.time_error_s / config.rhythm_tolerance_s).max(0.0)
    }
}

/// Greedy one-to-one assignment, walking references in order.
///
/// Each reference takes the unused user note closest in onset among those
/// overlapping the reference widened by `rhythm_tolerance_s` on both sides.
/// Ties go to the earlier user note. A claimed user note is never offered to a
/// later reference, so the result depends on reference order and is not a
/// global optimum.
pub fn match_notes(
    references: &[ReferenceNote],
    users: &[UserNote],
    rhythm_tolerance_s: f64,
) -> Vec<NoteMatch> {
    let mut used = vec![false; users.len()];
    let mut matches = Vec::with_capacity(references.len().min(users.len()));

    for (reference_index, reference) in references.iter().enumerate() {
        let window_start = reference.start_s - rhythm_tolerance_s;
        let window_end = reference.end_s() + rhythm_tolerance_s;

        let mut best: Option<(usize, f64)> = None;
        for (user_index, user) in users.iter().enumerate() {
            if used[user_index] || user.end_s < window_start || user.start_s > window_end {
                continue;
            }
            let delta = (user.start_s - reference.start_s).abs();
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((user_index, delta));
            }
        }

        let Some((user_index, time_error_s)) = best else {
            continue;
        };
        used[user_index] = true;
        matches.push(NoteMatch {
            reference_index,
            user_index,
            cents_error: (users[user_index].midi - reference.midi).abs() * CENTS_PER_SEMITONE,
            time_error_s,
        });
    }

    matches
}

/// Scores the sung notes against the reference melody. Averages run over
/// matched references only; unmatched references only show up in
/// `matched` vs `total_notes`.
pub fn score_notes(
    references: &[ReferenceNote],
    users: &[UserNote],
    config: &ScoringConfig,
) -> ScoreBreakdown {
    if references.is_empty() {
        return ScoreBreakdown::empty(0);
    }

    let matches = match_notes(references, users, config.rhythm_tolerance_s);
    if matches.is_empty() {
        return ScoreBreakdown::empty(references.len());
    }

    let count = matches.len() as f64;
    let pitch_avg = matches.iter().map(|m| m.pitch_score(config)).sum::<f64>() / count;
    let rhythm_avg = matches.iter().map(|m| m.rhythm_score(config)).sum::<f64>() / count;
    let total = (pitch_avg * config.pitch_weight + rhythm_avg * config.rhythm_weight)
        / (config.pitch_weight + config.rhythm_weight);

    ScoreBreakdown {
        total: total * 100.0,
        pitch: pitch_avg * 100.0,
        rhythm: rhythm_avg * 100.0,
        matched: matches.len() as u32,
        total_notes: references.len() as u32,
    }
}
