//! Ascending/descending score for N2 epochs.
//!
//! Each N2 epoch gets a score in `[-1, 1]` describing whether it sits on the
//! way down into deep sleep or on the way up out of it. Looking left, deep
//! (N3/N4) neighbours score +1 and light (N1/W/R) neighbours -1; looking
//! right the signs flip. Other N2 and LightsOn/Absent epochs are skipped.
//! Each side stops after `window` qualifying epochs and contributes its
//! mean (0 if nothing qualified). The score is the mean of the two sides.

use crate::stage::StageLabel;

fn weight(stage: StageLabel) -> Option<f64> {
    if stage.is_deep() {
        Some(1.0)
    } else if stage.is_light() {
        Some(-1.0)
    } else {
        None
    }
}

fn side_mean<'a, I>(neighbours: I, window: usize) -> f64
where
    I: Iterator<Item = &'a StageLabel>,
{
    let (sum, n) = neighbours
        .filter_map(|&s| weight(s))
        .take(window)
        .fold((0.0, 0_usize), |(sum, n), w| (sum + w, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Score for epoch `e`; `None` unless it is N2.
#[must_use]
pub fn depth_score(stages: &[StageLabel], e: usize, window: usize) -> Option<f64> {
    if stages[e] != StageLabel::Nrem2 {
        return None;
    }
    let left = side_mean(stages[..e].iter().rev(), window);
    let right = -side_mean(stages[e + 1..].iter(), window);
    Some((left + right) / 2.0)
}

/// Scores for every epoch.
#[must_use]
pub fn depth_trajectory(stages: &[StageLabel], window: usize) -> Vec<Option<f64>> {
    (0..stages.len())
        .map(|e| depth_score(stages, e, window))
        .collect()
}
