//! Analysis entry point.
//!
//! [`analyze`] runs every pass over one night. Entry checks happen once, up
//! front: epoch duration and thresholds, the caller's expected epoch count,
//! the optional N4→N3 merge, edge recoding and the lights structure. After
//! that no pass can fail.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boundary::{Boundaries, SummaryStatistics, recode_edges, validate_lights};
use crate::clock::{ClockAnchors, ClockTime, epoch_clock_times, epoch_minutes};
use crate::config::{EpochThresholds, Thresholds};
use crate::cycles::{CycleEntry, CyclePosition, CycleSegmentation, Period, SleepCode, SleepState};
use crate::depth::depth_trajectory;
use crate::elapsed::ElapsedTracks;
use crate::error::{HypnoError, HypnoResult};
use crate::stage::StageLabel;
use crate::transitions::{DirectionalTransitions, TransitionAnalysis, TransitionMatrix};

/// One night of staged epochs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSequence {
    pub stages: Vec<StageLabel>,
    /// Uniform epoch duration in seconds.
    pub epoch_secs: f64,
    /// Clock time of the first epoch, if known.
    pub start: Option<ClockTime>,
    /// Epoch count of the caller's timeline; checked against `stages`.
    pub expected_epochs: Option<usize>,
}

impl EpochSequence {
    #[must_use]
    pub fn new(stages: Vec<StageLabel>, epoch_secs: f64) -> Self {
        Self {
            stages,
            epoch_secs,
            start: None,
            expected_epochs: None,
        }
    }

    #[must_use]
    pub fn with_start(mut self, start: Option<ClockTime>) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn with_expected_epochs(mut self, expected: usize) -> Self {
        self.expected_epochs = Some(expected);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Every per-epoch output, each vector of length N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerEpochDerived {
    /// Minutes since the first epoch.
    pub minutes: Vec<f64>,
    /// Wall-clock time of each epoch; `None` without a start time.
    pub clock_time: Option<Vec<ClockTime>>,
    /// Stages after the deep-NREM merge and edge recoding.
    pub stage: Vec<StageLabel>,
    pub persistent_sleep: Vec<bool>,
    pub sleep_onset_mask: Vec<bool>,
    pub cumulative_sleep: Vec<i64>,
    pub sleep_state: Vec<SleepState>,
    pub period: Vec<Period>,
    pub cycle_ending_waso: Vec<bool>,
    pub final_wake: Vec<bool>,
    pub sleep_code: Vec<SleepCode>,
    pub cycle_number: Vec<u32>,
    pub cycle_position: Vec<Option<CyclePosition>>,
    pub flanking_min: Vec<usize>,
    pub flanking_all: Vec<usize>,
    pub nearest_wake: Vec<usize>,
    pub directional: DirectionalTransitions,
    /// N2 ascending/descending score.
    pub depth: Vec<Option<f64>>,
    pub elapsed: ElapsedTracks,
}

/// Full result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypnogramAnalysis {
    pub epoch_secs: f64,
    pub thresholds: EpochThresholds,
    pub boundaries: Boundaries,
    pub summary: SummaryStatistics,
    pub cycles: BTreeMap<u32, CycleEntry>,
    pub epochs: PerEpochDerived,
    pub transitions: TransitionMatrix,
    /// `None` when no valid start time was supplied.
    pub clock: Option<ClockAnchors>,
}

impl HypnogramAnalysis {
    #[must_use]
    pub fn epoch_count(&self) -> usize {
        self.epochs.stage.len()
    }

    #[must_use]
    pub fn any_sleep(&self) -> bool {
        self.summary.any_sleep
    }
}

/// Analyze one night.
pub fn analyze(sequence: &EpochSequence, thresholds: &Thresholds) -> HypnoResult<HypnogramAnalysis> {
    let epochs = thresholds.to_epochs(sequence.epoch_secs)?;
    let actual = sequence.stages.len();
    if let Some(expected) = sequence.expected_epochs.filter(|&n| n != actual) {
        return Err(HypnoError::LengthMismatch { expected, actual });
    }

    let mut stages = sequence.stages.clone();
    if thresholds.collapse_deep_nrem {
        for stage in &mut stages {
            *stage = stage.collapse_deep();
        }
    }
    recode_edges(&mut stages);
    validate_lights(&stages)?;

    let epoch_mins = sequence.epoch_secs / 60.0;
    let boundaries = Boundaries::locate(&stages, epochs.persistent_sleep_epochs);
    let segmentation = CycleSegmentation::run(&stages, &epochs, epoch_mins);

    let mut summary =
        SummaryStatistics::compute(&stages, &boundaries, &segmentation.persistent_sleep, epoch_mins);
    summary.cycle_count = segmentation.cycle_count();
    summary.mean_cycle_minutes = segmentation.mean_cycle_minutes();

    let TransitionAnalysis {
        flanking_min,
        flanking_all,
        nearest_wake,
        directional,
        matrix,
    } = TransitionAnalysis::run(&stages, &epochs);
    let depth = depth_trajectory(&stages, epochs.depth_window_epochs);
    let elapsed = ElapsedTracks::compute(
        &stages,
        boundaries.first_sleep_epoch,
        boundaries.final_wake_epoch,
        epoch_mins,
    );
    let clock = sequence.start.map(|start| {
        ClockAnchors::compute(
            start,
            epoch_mins,
            stages.len(),
            boundaries.first_sleep_epoch,
            boundaries.final_wake_epoch,
        )
    });

    let minutes = epoch_minutes(epoch_mins, stages.len());
    let clock_time = sequence
        .start
        .map(|start| epoch_clock_times(start, epoch_mins, stages.len()));

    let CycleSegmentation {
        persistent_sleep,
        sleep_onset_mask,
        cumulative_sleep,
        sleep_state,
        final_wake,
        period,
        cycle_ending_waso,
        sleep_code,
        cycle_number,
        cycle_position,
        cycles,
    } = segmentation;

    Ok(HypnogramAnalysis {
        epoch_secs: sequence.epoch_secs,
        thresholds: epochs,
        boundaries,
        summary,
        cycles,
        epochs: PerEpochDerived {
            minutes,
            clock_time,
            stage: stages,
            persistent_sleep,
            sleep_onset_mask,
            cumulative_sleep,
            sleep_state,
            period,
            cycle_ending_waso,
            final_wake,
            sleep_code,
            cycle_number,
            cycle_position,
            flanking_min,
            flanking_all,
            nearest_wake,
            directional,
            depth,
            elapsed,
        },
        transitions: matrix,
        clock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageLabel::{Absent, LightsOn, Nrem2, Nrem4, Rem, Wake};

    fn night() -> Vec<StageLabel> {
        [(Wake, 4), (Nrem2, 40), (Rem, 10), (Wake, 4)]
            .iter()
            .flat_map(|&(s, n)| std::iter::repeat_n(s, n))
            .collect()
    }

    #[test]
    fn length_mismatch_is_rejected_up_front() {
        let seq = EpochSequence::new(night(), 30.0).with_expected_epochs(57);
        assert_eq!(
            analyze(&seq, &Thresholds::default()),
            Err(HypnoError::LengthMismatch {
                expected: 57,
                actual: 58
            })
        );
        let seq = EpochSequence::new(night(), 30.0).with_expected_epochs(58);
        assert!(analyze(&seq, &Thresholds::default()).is_ok());
    }

    #[test]
    fn bad_epoch_duration_is_rejected() {
        let seq = EpochSequence::new(night(), 0.0);
        assert_eq!(
            analyze(&seq, &Thresholds::default()),
            Err(HypnoError::InvalidEpochDuration(0.0))
        );
    }

    #[test]
    fn interior_lights_block_is_fatal() {
        let mut stages = night();
        stages[0] = LightsOn;
        stages[5] = LightsOn;
        stages[50] = LightsOn;
        let seq = EpochSequence::new(stages, 30.0);
        assert_eq!(
            analyze(&seq, &Thresholds::default()),
            Err(HypnoError::StructuralViolation { epoch: 5 })
        );
    }

    #[test]
    fn edge_absent_is_recoded_before_accounting() {
        let mut stages = vec![Absent, Absent];
        stages.extend(night());
        stages.push(Absent);
        let analysis = analyze(&EpochSequence::new(stages, 30.0), &Thresholds::default()).unwrap();
        assert_eq!(analysis.boundaries.lights_out_epoch, 2);
        assert_eq!(analysis.epochs.stage[0], LightsOn);
        assert_eq!(analysis.summary.stage_minutes.other, 0.0);
        assert_eq!(analysis.summary.trt, 29.0);
        assert_eq!(analysis.summary.tib, 30.5);
    }

    #[test]
    fn collapse_merges_n4_into_n3() {
        let stages = vec![Wake, Nrem4, Nrem4, Wake];
        let thresholds = Thresholds {
            collapse_deep_nrem: true,
            ..Thresholds::default()
        };
        let analysis = analyze(&EpochSequence::new(stages, 30.0), &thresholds).unwrap();
        assert_eq!(analysis.summary.stage_minutes.n4, 0.0);
        assert_eq!(analysis.summary.stage_minutes.n3, 1.0);
    }

    #[test]
    fn every_per_epoch_array_has_length_n() {
        let analysis = analyze(&EpochSequence::new(night(), 30.0), &Thresholds::default()).unwrap();
        let n = analysis.epoch_count();
        let e = &analysis.epochs;
        for len in [
            e.minutes.len(),
            e.persistent_sleep.len(),
            e.sleep_state.len(),
            e.period.len(),
            e.sleep_code.len(),
            e.cycle_number.len(),
            e.cycle_position.len(),
            e.flanking_min.len(),
            e.nearest_wake.len(),
            e.directional.wake_to_rem.distance.len(),
            e.depth.len(),
            e.elapsed.waso.len(),
        ] {
            assert_eq!(len, n);
        }
        assert_eq!(analysis.summary.cycle_count, 1);
        assert_eq!(analysis.summary.mean_cycle_minutes, 25.0);
    }

    #[test]
    fn clock_anchors_need_start_time() {
        let seq = EpochSequence::new(night(), 30.0);
        let analysis = analyze(&seq, &Thresholds::default()).unwrap();
        assert!(analysis.clock.is_none());
        assert!(analysis.epochs.clock_time.is_none());
        assert_eq!(analysis.epochs.minutes[0], 0.0);
        assert_eq!(analysis.epochs.minutes[57], 28.5);

        let seq = seq.with_start(ClockTime::parse("23:00:00"));
        let analysis = analyze(&seq, &Thresholds::default()).unwrap();
        let clock = analysis.clock.unwrap();
        assert_eq!(clock.sleep_onset.unwrap().to_string(), "23.02.00");
        assert_eq!(clock.lights_on.to_string(), "23.29.00");

        let times = analysis.epochs.clock_time.unwrap();
        assert_eq!(times.len(), 58);
        assert_eq!(times[0].to_string(), "23.00.00");
        assert_eq!(times[1].to_string(), "23.00.30");
        assert_eq!(times[4], clock.sleep_onset.unwrap());
        assert_eq!(times[57].to_string(), "23.28.30");
    }

    #[test]
    fn empty_night_is_not_an_error() {
        let analysis = analyze(&EpochSequence::new(Vec::new(), 30.0), &Thresholds::default()).unwrap();
        assert!(!analysis.any_sleep());
        assert!(analysis.cycles.is_empty());
        assert_eq!(analysis.summary.tib, 0.0);
    }
}
