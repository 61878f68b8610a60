//! Flanking runs, nearest wake, directional transitions and the stage
//! transition matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EpochThresholds;
use crate::stage::{StageClass, StageLabel, same_three_class};
use crate::window::{run_length_backward, run_length_forward};

/// Stage identity used as a transition-matrix key.
///
/// In three-class mode all NREM depths collapse to [`TransitionState::Nrem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransitionState {
    Nrem1,
    Nrem2,
    Nrem3,
    Nrem4,
    Nrem,
    Rem,
    Wake,
    Lights,
    Absent,
}

impl TransitionState {
    #[must_use]
    pub const fn of(stage: StageLabel, three_class: bool) -> Self {
        match stage {
            StageLabel::Nrem1 | StageLabel::Nrem2 | StageLabel::Nrem3 | StageLabel::Nrem4
                if three_class =>
            {
                Self::Nrem
            }
            StageLabel::Nrem1 => Self::Nrem1,
            StageLabel::Nrem2 => Self::Nrem2,
            StageLabel::Nrem3 => Self::Nrem3,
            StageLabel::Nrem4 => Self::Nrem4,
            StageLabel::Rem => Self::Rem,
            StageLabel::Wake => Self::Wake,
            StageLabel::LightsOn => Self::Lights,
            StageLabel::Absent => Self::Absent,
        }
    }

    /// Whether the state enters the matrix probabilities: N1, N2, N3, R and W,
    /// or NR, R and W in three-class mode.
    #[must_use]
    pub const fn is_scored(self, three_class: bool) -> bool {
        match self {
            Self::Nrem | Self::Rem | Self::Wake => true,
            Self::Nrem1 | Self::Nrem2 | Self::Nrem3 => !three_class,
            Self::Nrem4 | Self::Lights | Self::Absent => false,
        }
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Nrem1 => "N1",
            Self::Nrem2 => "N2",
            Self::Nrem3 => "N3",
            Self::Nrem4 => "N4",
            Self::Nrem => "NR",
            Self::Rem => "R",
            Self::Wake => "W",
            Self::Lights => "L",
            Self::Absent => "?",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition matrix
// ---------------------------------------------------------------------------

/// One non-empty cell of the transition matrix.
///
/// Cells with an unscored end keep their count; their probabilities are 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionCell {
    pub from: TransitionState,
    pub to: TransitionState,
    pub count: u64,
    /// Both ends are scored sleep/wake states.
    pub scored: bool,
    /// count / scored transitions
    pub joint: f64,
    /// P(to | from)
    pub given_from: f64,
    /// P(from | to)
    pub given_to: f64,
}

/// Counts of consecutive `(e - 1, e)` stage pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    pub three_class: bool,
    /// Transitions between scored states only.
    pub total: u64,
    /// Sorted by `(from, to)`.
    pub cells: Vec<TransitionCell>,
}

impl TransitionMatrix {
    #[must_use]
    pub fn build(stages: &[StageLabel], three_class: bool) -> Self {
        let mut counts: BTreeMap<(TransitionState, TransitionState), u64> = BTreeMap::new();
        for pair in stages.windows(2) {
            let from = TransitionState::of(pair[0], three_class);
            let to = TransitionState::of(pair[1], three_class);
            *counts.entry((from, to)).or_insert(0) += 1;
        }

        let scored = |from: TransitionState, to: TransitionState| {
            from.is_scored(three_class) && to.is_scored(three_class)
        };

        let mut rows: BTreeMap<TransitionState, u64> = BTreeMap::new();
        let mut cols: BTreeMap<TransitionState, u64> = BTreeMap::new();
        let mut total = 0_u64;
        for (&(from, to), &count) in counts.iter().filter(|((from, to), _)| scored(*from, *to)) {
            *rows.entry(from).or_insert(0) += count;
            *cols.entry(to).or_insert(0) += count;
            total += count;
        }

        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let cells = counts
            .into_iter()
            .map(|((from, to), count)| {
                if !scored(from, to) {
                    return TransitionCell {
                        from,
                        to,
                        count,
                        scored: false,
                        joint: 0.0,
                        given_from: 0.0,
                        given_to: 0.0,
                    };
                }
                TransitionCell {
                    from,
                    to,
                    count,
                    scored: true,
                    joint: ratio(count, total),
                    given_from: ratio(count, rows.get(&from).copied().unwrap_or(0)),
                    given_to: ratio(count, cols.get(&to).copied().unwrap_or(0)),
                }
            })
            .collect();

        Self {
            three_class,
            total,
            cells,
        }
    }

    #[must_use]
    pub fn count(&self, from: TransitionState, to: TransitionState) -> u64 {
        self.cells
            .iter()
            .find(|c| c.from == from && c.to == to)
            .map_or(0, |c| c.count)
    }

    /// Number of transitions leaving `from`, scored or not.
    #[must_use]
    pub fn row_sum(&self, from: TransitionState) -> u64 {
        self.cells.iter().filter(|c| c.from == from).map(|c| c.count).sum()
    }
}

// ---------------------------------------------------------------------------
// Directional transitions
// ---------------------------------------------------------------------------

/// Source/destination pair for a directional distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    NremToRem,
    NremToWake,
    RemToNrem,
    RemToWake,
    WakeToNrem,
    WakeToRem,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::NremToRem,
        Direction::NremToWake,
        Direction::RemToNrem,
        Direction::RemToWake,
        Direction::WakeToNrem,
        Direction::WakeToRem,
    ];

    #[must_use]
    pub const fn source(self) -> StageClass {
        match self {
            Self::NremToRem | Self::NremToWake => StageClass::Nrem,
            Self::RemToNrem | Self::RemToWake => StageClass::Rem,
            Self::WakeToNrem | Self::WakeToRem => StageClass::Wake,
        }
    }

    #[must_use]
    pub const fn target(self) -> StageClass {
        match self {
            Self::RemToNrem | Self::WakeToNrem => StageClass::Nrem,
            Self::NremToRem | Self::WakeToRem => StageClass::Rem,
            Self::NremToWake | Self::RemToWake => StageClass::Wake,
        }
    }
}

/// Distance from each epoch to a qualifying transition, and its running maximum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTrack {
    pub distance: Vec<usize>,
    pub running_max: Vec<usize>,
}

impl TransitionTrack {
    /// Epochs from `e` to the first epoch of a `target` run reached by
    /// staying in the source class; 0 if the run is interrupted, ends the
    /// sequence or is shorter than `required` epochs.
    #[must_use]
    pub fn compute(stages: &[StageLabel], direction: Direction, required: usize) -> Self {
        let n = stages.len();
        let distance: Vec<usize> = (0..n)
            .map(|e| {
                if stages[e].class() != direction.source() {
                    return 0;
                }
                let dest = e + run_length_forward(stages, e, |s| s.class() == direction.source());
                if dest >= n || stages[dest].class() != direction.target() {
                    return 0;
                }
                let run = run_length_forward(stages, dest, |s| s.class() == direction.target());
                if run >= required { dest - e } else { 0 }
            })
            .collect();

        let mut running_max = Vec::with_capacity(n);
        let mut current = 0;
        for &d in &distance {
            current = if d == 0 { 0 } else { current.max(d) };
            running_max.push(current);
        }

        Self {
            distance,
            running_max,
        }
    }
}

/// The six directional tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalTransitions {
    pub nrem_to_rem: TransitionTrack,
    pub nrem_to_wake: TransitionTrack,
    pub rem_to_nrem: TransitionTrack,
    pub rem_to_wake: TransitionTrack,
    pub wake_to_nrem: TransitionTrack,
    pub wake_to_rem: TransitionTrack,
}

impl DirectionalTransitions {
    #[must_use]
    pub fn compute(stages: &[StageLabel], required: usize) -> Self {
        let track = |direction| TransitionTrack::compute(stages, direction, required);
        Self {
            nrem_to_rem: track(Direction::NremToRem),
            nrem_to_wake: track(Direction::NremToWake),
            rem_to_nrem: track(Direction::RemToNrem),
            rem_to_wake: track(Direction::RemToWake),
            wake_to_nrem: track(Direction::WakeToNrem),
            wake_to_rem: track(Direction::WakeToRem),
        }
    }

    #[must_use]
    pub fn get(&self, direction: Direction) -> &TransitionTrack {
        match direction {
            Direction::NremToRem => &self.nrem_to_rem,
            Direction::NremToWake => &self.nrem_to_wake,
            Direction::RemToNrem => &self.rem_to_nrem,
            Direction::RemToWake => &self.rem_to_wake,
            Direction::WakeToNrem => &self.wake_to_nrem,
            Direction::WakeToRem => &self.wake_to_rem,
        }
    }
}

// ---------------------------------------------------------------------------
// Flanking and nearest wake
// ---------------------------------------------------------------------------

fn similar(a: StageLabel, b: StageLabel, three_class: bool) -> bool {
    if three_class { same_three_class(a, b) } else { a == b }
}

/// Largest `j` such that the `j` epochs on each side of `e` all match it.
#[must_use]
pub fn flanking_min(stages: &[StageLabel], e: usize, three_class: bool) -> usize {
    let n = stages.len();
    let here = stages[e];
    let mut j = 0;
    while j < e
        && e + j + 1 < n
        && similar(stages[e - j - 1], here, three_class)
        && similar(stages[e + j + 1], here, three_class)
    {
        j += 1;
    }
    j
}

/// Length of the matching run that contains `e`.
#[must_use]
pub fn flanking_all(stages: &[StageLabel], e: usize, three_class: bool) -> usize {
    let here = stages[e];
    let matches = |s: &StageLabel| similar(*s, here, three_class);
    run_length_backward(stages, e, matches) + run_length_forward(stages, e, matches)
}

/// Distance to the closest Wake epoch on either side; 0 for Wake epochs or
/// when the sequence holds no other Wake.
#[must_use]
pub fn nearest_wake(stages: &[StageLabel], e: usize) -> usize {
    if stages[e].is_wake() {
        return 0;
    }
    let reach = e.max(stages.len() - 1 - e);
    (1..=reach)
        .find(|&j| {
            (j <= e && stages[e - j].is_wake())
                || stages.get(e + j).is_some_and(|s| s.is_wake())
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Per-epoch transition measures plus the matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionAnalysis {
    pub flanking_min: Vec<usize>,
    pub flanking_all: Vec<usize>,
    pub nearest_wake: Vec<usize>,
    pub directional: DirectionalTransitions,
    pub matrix: TransitionMatrix,
}

impl TransitionAnalysis {
    #[must_use]
    pub fn run(stages: &[StageLabel], thresholds: &EpochThresholds) -> Self {
        let three_class = thresholds.flanking_use_three_class;
        let epochs = 0..stages.len();
        Self {
            flanking_min: epochs.clone().map(|e| flanking_min(stages, e, three_class)).collect(),
            flanking_all: epochs.clone().map(|e| flanking_all(stages, e, three_class)).collect(),
            nearest_wake: epochs.map(|e| nearest_wake(stages, e)).collect(),
            directional: DirectionalTransitions::compute(stages, thresholds.required_transition_epochs),
            matrix: TransitionMatrix::build(stages, three_class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageLabel::{Absent, LightsOn, Nrem1, Nrem2, Nrem3, Nrem4, Rem, Wake};

    #[test]
    fn flanking_counts() {
        let stages = [Wake, Nrem2, Nrem3, Nrem2, Nrem1, Rem];
        assert_eq!(flanking_min(&stages, 2, true), 1);
        assert_eq!(flanking_min(&stages, 2, false), 0);
        assert_eq!(flanking_min(&stages, 0, true), 0);
        assert_eq!(flanking_all(&stages, 2, true), 4);
        assert_eq!(flanking_all(&stages, 2, false), 1);
        assert_eq!(flanking_all(&stages, 5, true), 1);
        for e in 0..stages.len() {
            assert!(flanking_min(&stages, e, true) <= flanking_all(&stages, e, true));
        }
    }

    #[test]
    fn nearest_wake_searches_both_sides() {
        let stages = [Wake, Nrem2, Nrem2, Nrem2, Nrem2, Nrem2, Rem];
        assert_eq!(nearest_wake(&stages, 0), 0);
        assert_eq!(nearest_wake(&stages, 1), 1);
        assert_eq!(nearest_wake(&stages, 6), 6);
        assert_eq!(nearest_wake(&[Nrem2, Rem], 0), 0);
    }

    #[test]
    fn directional_distances_require_destination_run() {
        let stages = [Nrem2, Nrem3, Rem, Rem, Rem, Rem, Wake, Wake, Nrem2];
        let d = DirectionalTransitions::compute(&stages, 4);
        assert_eq!(d.nrem_to_rem.distance[..3], [2, 1, 0]);
        assert_eq!(d.nrem_to_rem.running_max[..3], [2, 2, 0]);
        // Wake run of two is below the required four epochs.
        assert!(d.rem_to_wake.distance.iter().all(|&x| x == 0));
        // The final N2 run reaches the end of the sequence.
        assert_eq!(d.wake_to_nrem.distance[6], 0);

        let relaxed = DirectionalTransitions::compute(&stages, 1);
        assert_eq!(relaxed.rem_to_wake.distance[2..6], [4, 3, 2, 1]);
        assert_eq!(relaxed.rem_to_wake.running_max[2..6], [4, 4, 4, 4]);
        assert_eq!(relaxed.wake_to_nrem.distance[6..8], [2, 1]);
        assert_eq!(relaxed.get(Direction::WakeToRem).distance, vec![0; 9]);
    }

    #[test]
    fn matrix_rows_sum_to_sources() {
        let stages = [Wake, Nrem1, Nrem2, Nrem2, Rem, Wake, Nrem2];
        let full = TransitionMatrix::build(&stages, false);
        assert_eq!(full.total, 6);
        assert_eq!(full.count(TransitionState::Nrem2, TransitionState::Nrem2), 1);
        assert_eq!(full.row_sum(TransitionState::Wake), 2);
        assert_eq!(full.row_sum(TransitionState::Nrem2), 2);

        let collapsed = TransitionMatrix::build(&stages, true);
        assert_eq!(collapsed.count(TransitionState::Nrem, TransitionState::Nrem), 2);
        assert_eq!(collapsed.row_sum(TransitionState::Nrem), 3);
        let to_rem = collapsed
            .cells
            .iter()
            .find(|c| c.from == TransitionState::Nrem && c.to == TransitionState::Rem)
            .unwrap();
        assert_eq!(to_rem.given_from, 1.0 / 3.0);
        assert_eq!(to_rem.given_to, 1.0);
        let joint: f64 = collapsed.cells.iter().map(|c| c.joint).sum();
        assert!((joint - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_probabilities_skip_lights_and_unscored_pairs() {
        let mut stages = vec![LightsOn; 10];
        stages.push(Wake);
        stages.extend([Nrem2; 10]);
        let m = TransitionMatrix::build(&stages, true);
        assert_eq!(m.total, 10);
        assert_eq!(m.count(TransitionState::Lights, TransitionState::Lights), 9);
        assert_eq!(m.row_sum(TransitionState::Lights), 10);

        let nrem = m
            .cells
            .iter()
            .find(|c| c.from == TransitionState::Nrem && c.to == TransitionState::Nrem)
            .unwrap();
        assert_eq!(nrem.count, 9);
        assert!(nrem.scored);
        assert!((nrem.joint - 0.9).abs() < 1e-12);
        assert_eq!(nrem.given_from, 1.0);
        assert!((nrem.given_to - 0.9).abs() < 1e-12);

        let lights = m
            .cells
            .iter()
            .find(|c| c.from == TransitionState::Lights && c.to == TransitionState::Wake)
            .unwrap();
        assert!(!lights.scored);
        assert_eq!(lights.joint, 0.0);
        let joint: f64 = m.cells.iter().map(|c| c.joint).sum();
        assert!((joint - 1.0).abs() < 1e-12);

        let full = TransitionMatrix::build(&[Wake, Absent, Nrem4, Nrem3, Nrem3, Rem], false);
        assert_eq!(full.total, 2);
        assert_eq!(full.count(TransitionState::Nrem4, TransitionState::Nrem3), 1);
    }

    #[test]
    fn matrix_of_single_epoch_is_empty() {
        let m = TransitionMatrix::build(&[Wake], true);
        assert_eq!(m.total, 0);
        assert!(m.cells.is_empty());
    }
}
