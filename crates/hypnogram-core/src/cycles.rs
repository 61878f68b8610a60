//! NREM/REM cycle segmentation.
//!
//! A modified Feinberg & Floyd scheme expressed as layered passes. Each pass
//! is a pure function of the stage sequence and the arrays produced by the
//! passes before it:
//!
//! 1. persistent-sleep flags
//! 2. sleep-onset mask
//! 3. cumulative persistent-sleep count and sleep state
//! 4. final-wake flags
//! 5. period classification with cycle-ending WASO
//! 6. sleep codes (0 / 1 / 5)
//! 7. cycle numbering, the per-cycle table and in-cycle positions
//!
//! A cycle is a NREM phase of at least `min_nrem_epochs`, terminated either
//! by the end of a REM phase or by a run of Wake/N1 long enough to count as
//! cycle-ending WASO. Wake between cycles belongs to cycle 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boundary::is_persistent_sleep;
use crate::config::EpochThresholds;
use crate::stage::StageLabel;
use crate::window::{any_within, count_inclusive, count_within};

// ---------------------------------------------------------------------------
// Per-epoch vocabularies
// ---------------------------------------------------------------------------

/// Position of an epoch relative to persistent sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepState {
    /// LightsOn before any persistent sleep.
    Prior,
    /// Latency to persistent sleep.
    Lps,
    /// Onset of persistent sleep.
    Lpo,
    /// Sleep period time.
    Spt,
    /// LightsOn after persistent sleep.
    After,
}

/// Period an epoch is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Undefined,
    Nrem,
    Rem,
}

/// Coarse per-epoch code used for cycle numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepCode {
    /// Wake between cycles or cycle-ending WASO.
    Wake,
    /// NREM period (or a gap carried inside one).
    Nrem,
    /// REM period.
    Rem,
}

impl SleepCode {
    /// Numeric form: 0, 1 or 5.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Wake => 0,
            Self::Nrem => 1,
            Self::Rem => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Passes 1-4
// ---------------------------------------------------------------------------

/// Persistent-sleep flag for every epoch.
#[must_use]
pub fn persistent_sleep_flags(stages: &[StageLabel], persistent_sleep_epochs: usize) -> Vec<bool> {
    (0..stages.len())
        .map(|e| is_persistent_sleep(stages, e, persistent_sleep_epochs))
        .collect()
}

/// True from the first sleep epoch through the last sleep epoch.
#[must_use]
pub fn sleep_onset_mask(stages: &[StageLabel]) -> Vec<bool> {
    let mut mask = vec![false; stages.len()];
    let first = stages.iter().position(|s| s.is_sleep());
    let last = stages.iter().rposition(|s| s.is_sleep());
    if let (Some(first), Some(last)) = (first, last) {
        mask[first..=last].fill(true);
    }
    mask
}

/// Running count of persistent-sleep epochs; -1 on LightsOn epochs once the
/// count is nonzero.
#[must_use]
pub fn cumulative_sleep_count(stages: &[StageLabel], persistent: &[bool]) -> Vec<i64> {
    let mut total = 0_i64;
    stages
        .iter()
        .zip(persistent)
        .map(|(stage, &flag)| {
            if flag {
                total += 1;
            }
            if stage.is_lights_on() && total > 0 { -1 } else { total }
        })
        .collect()
}

#[must_use]
pub fn sleep_states(stages: &[StageLabel], counts: &[i64]) -> Vec<SleepState> {
    stages
        .iter()
        .zip(counts)
        .map(|(stage, &count)| match count {
            0 if stage.is_lights_on() => SleepState::Prior,
            0 => SleepState::Lps,
            1 => SleepState::Lpo,
            c if c > 1 => SleepState::Spt,
            _ => SleepState::After,
        })
        .collect()
}

/// Wake or LightsOn epochs after the last sleep epoch.
#[must_use]
pub fn final_wake_flags(stages: &[StageLabel]) -> Vec<bool> {
    let mut flags = vec![false; stages.len()];
    for (e, stage) in stages.iter().enumerate().rev() {
        if stage.is_sleep() {
            break;
        }
        flags[e] = stage.is_wake_or_lights();
    }
    flags
}

// ---------------------------------------------------------------------------
// Pass 5: periods
// ---------------------------------------------------------------------------

/// Output of the period pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLayer {
    pub periods: Vec<Period>,
    pub cycle_ending_waso: Vec<bool>,
}

/// Classify masked epochs into NREM/REM periods, left to right.
#[must_use]
pub fn classify_periods(
    stages: &[StageLabel],
    mask: &[bool],
    thresholds: &EpochThresholds,
) -> PeriodLayer {
    let n = stages.len();
    let mut periods = vec![Period::Undefined; n];
    let mut cycle_ending_waso = vec![false; n];

    for e in 0..n {
        if !mask[e] {
            continue;
        }
        let stage = stages[e];
        let prev = e.checked_sub(1).map_or(Period::Undefined, |p| periods[p]);
        let prev_ended_cycle = e > 0 && cycle_ending_waso[e - 1];
        let wake_or_n1 = stage.is_wake() || stage.is_nrem1();

        let period = if stage.is_rem() && prev != Period::Undefined {
            Period::Rem
        } else if prev == Period::Rem
            && any_within(stages, e, thresholds.rem_interruption_epochs, |s| s.is_rem())
        {
            Period::Rem
        } else if (prev == Period::Rem || prev_ended_cycle) && wake_or_n1 {
            Period::Undefined
        } else if prev == Period::Undefined
            && (wake_or_n1 || any_within(stages, e, thresholds.min_nrem_epochs, |s| s.is_rem()))
        {
            Period::Undefined
        } else {
            Period::Nrem
        };
        periods[e] = period;

        let no_near_sleep = !any_within(stages, e, thresholds.terminating_waso_epochs, |s| {
            s.is_nrem234() || s.is_rem()
        });
        cycle_ending_waso[e] = (period == Period::Nrem && no_near_sleep)
            || (prev_ended_cycle && stage.is_wake());
    }

    PeriodLayer {
        periods,
        cycle_ending_waso,
    }
}

// ---------------------------------------------------------------------------
// Pass 6: sleep codes
// ---------------------------------------------------------------------------

#[must_use]
pub fn sleep_codes(layer: &PeriodLayer, final_wake: &[bool], min_rem_epochs: usize) -> Vec<SleepCode> {
    let PeriodLayer {
        periods,
        cycle_ending_waso,
    } = layer;
    let n = periods.len();
    let first_rem_period = periods.iter().position(|p| *p == Period::Rem);
    let first_cycle_end = cycle_ending_waso.iter().position(|&w| w);
    let mut codes = vec![SleepCode::Wake; n];

    for e in 0..n {
        if cycle_ending_waso[e] {
            continue;
        }
        let prev_period = e.checked_sub(1).map_or(Period::Undefined, |p| periods[p]);
        let prev_code = e.checked_sub(1).map_or(SleepCode::Wake, |p| codes[p]);

        codes[e] = match periods[e] {
            Period::Nrem => SleepCode::Nrem,
            Period::Rem if prev_period == Period::Nrem => {
                let first_cycle = first_rem_period == Some(e)
                    && first_cycle_end.is_none_or(|end| e <= end);
                let rem_ahead = count_within(periods, e, min_rem_epochs, |p| *p == Period::Rem);
                if first_cycle || rem_ahead >= min_rem_epochs {
                    SleepCode::Rem
                } else {
                    SleepCode::Nrem
                }
            }
            Period::Rem => {
                if prev_period == Period::Rem && prev_code == SleepCode::Rem {
                    SleepCode::Rem
                } else {
                    SleepCode::Nrem
                }
            }
            Period::Undefined => {
                if prev_period == Period::Rem && prev_code == SleepCode::Nrem {
                    SleepCode::Nrem
                } else if final_wake[e] {
                    SleepCode::Wake
                } else if prev_code == SleepCode::Nrem {
                    SleepCode::Nrem
                } else {
                    SleepCode::Wake
                }
            }
        };
    }
    codes
}

// ---------------------------------------------------------------------------
// Pass 7: cycles
// ---------------------------------------------------------------------------

/// Assign cycle numbers (0 outside cycles, 1-based inside).
///
/// A step from code 0 or 5 into code 1 opens a new cycle if the stretch up to
/// and including the next 0/5-coded epoch holds at least `min_nrem_epochs`
/// NREM epochs. Otherwise the previous epoch's number carries forward.
#[must_use]
pub fn number_cycles(stages: &[StageLabel], codes: &[SleepCode], min_nrem_epochs: usize) -> Vec<u32> {
    let n = codes.len();
    let mut numbers = vec![0_u32; n];
    let mut opened = 0_u32;

    for e in 0..n {
        if codes[e] == SleepCode::Wake {
            continue;
        }
        let prev_code = e.checked_sub(1).map_or(SleepCode::Wake, |p| codes[p]);
        let carried = e.checked_sub(1).map_or(0, |p| numbers[p]);
        let onset = codes[e] == SleepCode::Nrem && prev_code != SleepCode::Nrem;

        numbers[e] = if onset {
            let end = (e..n)
                .find(|&k| codes[k] != SleepCode::Nrem)
                .unwrap_or(n - 1);
            if count_inclusive(stages, e, end, |s| s.is_nrem()) >= min_nrem_epochs {
                opened += 1;
                opened
            } else {
                carried
            }
        } else {
            carried
        };
    }
    numbers
}

/// One row of the cycle table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub start_epoch: usize,
    /// Last member epoch (inclusive).
    pub end_epoch: usize,
    pub epoch_count: usize,
    pub total_minutes: f64,
    pub nrem_minutes: f64,
    pub rem_minutes: f64,
    pub other_minutes: f64,
}

/// Aggregate member epochs by cycle number.
#[must_use]
pub fn cycle_table(stages: &[StageLabel], numbers: &[u32], epoch_mins: f64) -> BTreeMap<u32, CycleEntry> {
    let mut table: BTreeMap<u32, CycleEntry> = BTreeMap::new();
    for (e, (&cycle, stage)) in numbers.iter().zip(stages).enumerate() {
        if cycle == 0 {
            continue;
        }
        let entry = table.entry(cycle).or_insert_with(|| CycleEntry {
            start_epoch: e,
            end_epoch: e,
            epoch_count: 0,
            total_minutes: 0.0,
            nrem_minutes: 0.0,
            rem_minutes: 0.0,
            other_minutes: 0.0,
        });
        entry.end_epoch = e;
        entry.epoch_count += 1;
        entry.total_minutes += epoch_mins;
        if stage.is_rem() {
            entry.rem_minutes += epoch_mins;
        } else if stage.is_nrem() {
            entry.nrem_minutes += epoch_mins;
        } else {
            entry.other_minutes += epoch_mins;
        }
    }
    table
}

/// Where an epoch sits inside its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclePosition {
    /// Minutes since the cycle's first epoch.
    pub absolute_minutes: f64,
    /// `absolute_minutes` over the cycle's total minutes.
    pub relative: f64,
}

#[must_use]
pub fn cycle_positions(
    numbers: &[u32],
    table: &BTreeMap<u32, CycleEntry>,
    epoch_mins: f64,
) -> Vec<Option<CyclePosition>> {
    numbers
        .iter()
        .enumerate()
        .map(|(e, cycle)| {
            let entry = table.get(cycle)?;
            let absolute_minutes = (e - entry.start_epoch) as f64 * epoch_mins;
            let relative = if entry.total_minutes > 0.0 {
                absolute_minutes / entry.total_minutes
            } else {
                0.0
            };
            Some(CyclePosition {
                absolute_minutes,
                relative,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Every per-epoch layer of the segmentation plus the cycle table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSegmentation {
    pub persistent_sleep: Vec<bool>,
    pub sleep_onset_mask: Vec<bool>,
    pub cumulative_sleep: Vec<i64>,
    pub sleep_state: Vec<SleepState>,
    pub final_wake: Vec<bool>,
    pub period: Vec<Period>,
    pub cycle_ending_waso: Vec<bool>,
    pub sleep_code: Vec<SleepCode>,
    pub cycle_number: Vec<u32>,
    pub cycle_position: Vec<Option<CyclePosition>>,
    pub cycles: BTreeMap<u32, CycleEntry>,
}

impl CycleSegmentation {
    /// Run all passes over a recoded, validated sequence.
    #[must_use]
    pub fn run(stages: &[StageLabel], thresholds: &EpochThresholds, epoch_mins: f64) -> Self {
        let persistent_sleep = persistent_sleep_flags(stages, thresholds.persistent_sleep_epochs);
        let sleep_onset_mask = sleep_onset_mask(stages);
        let cumulative_sleep = cumulative_sleep_count(stages, &persistent_sleep);
        let sleep_state = sleep_states(stages, &cumulative_sleep);
        let final_wake = final_wake_flags(stages);
        let layer = classify_periods(stages, &sleep_onset_mask, thresholds);
        let sleep_code = sleep_codes(&layer, &final_wake, thresholds.min_rem_epochs);
        let cycle_number = number_cycles(stages, &sleep_code, thresholds.min_nrem_epochs);
        let cycles = cycle_table(stages, &cycle_number, epoch_mins);
        let cycle_position = cycle_positions(&cycle_number, &cycles, epoch_mins);

        Self {
            persistent_sleep,
            sleep_onset_mask,
            cumulative_sleep,
            sleep_state,
            final_wake,
            period: layer.periods,
            cycle_ending_waso: layer.cycle_ending_waso,
            sleep_code,
            cycle_number,
            cycle_position,
            cycles,
        }
    }

    #[must_use]
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Mean total cycle duration in minutes (0 without cycles).
    #[must_use]
    pub fn mean_cycle_minutes(&self) -> f64 {
        if self.cycles.is_empty() {
            return 0.0;
        }
        let total: f64 = self.cycles.values().map(|c| c.total_minutes).sum();
        total / self.cycles.len() as f64
    }
}
