//! Lights-out window, sleep boundaries and night-level summary statistics.
//!
//! # Accounting
//!
//! All durations are in minutes. With `m` the epoch length in minutes:
//!
//! - `TIB = N * m`
//! - `TRT = (lights_on - lights_out) * m`
//! - `TST = TRT - TWT - other`, where `other` is Absent time inside the window
//! - `SPT = TRT - sleep latency`
//!
//! Absent epochs touching either end are recoded to LightsOn first, so they
//! never enter TRT.

use serde::{Deserialize, Serialize};

use crate::error::{HypnoError, HypnoResult};
use crate::stage::StageLabel;
use crate::window::{sleep_run_ahead, sleep_run_behind};

// ---------------------------------------------------------------------------
// Edge recoding and structural validation
// ---------------------------------------------------------------------------

/// Recode leading and trailing Absent runs as LightsOn.
///
/// Each scan stops at the first epoch that is neither Absent nor LightsOn.
pub fn recode_edges(stages: &mut [StageLabel]) {
    for stage in stages.iter_mut() {
        if stage.is_absent() {
            *stage = StageLabel::LightsOn;
        }
        if !stage.is_lights_on() {
            break;
        }
    }
    for stage in stages.iter_mut().rev() {
        if stage.is_absent() {
            *stage = StageLabel::LightsOn;
        }
        if !stage.is_lights_on() {
            break;
        }
    }
}

/// Reject LightsOn runs that touch neither end of the sequence.
pub fn validate_lights(stages: &[StageLabel]) -> HypnoResult<()> {
    let n = stages.len();
    let mut e = 0;
    while e < n {
        if !stages[e].is_lights_on() {
            e += 1;
            continue;
        }
        let start = e;
        while e < n && stages[e].is_lights_on() {
            e += 1;
        }
        if start != 0 && e != n {
            return Err(HypnoError::StructuralViolation { epoch: start });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

/// Epoch indices that anchor the night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundaries {
    /// First non-LightsOn epoch.
    pub lights_out_epoch: usize,
    /// One past the last non-LightsOn epoch.
    pub lights_on_epoch: usize,
    /// First epoch of the final Wake bout (equals `lights_on_epoch` if none).
    pub final_wake_epoch: usize,
    pub first_sleep_epoch: Option<usize>,
    pub last_sleep_epoch: Option<usize>,
    pub first_rem_epoch: Option<usize>,
    /// First epoch starting an unbroken persistent-sleep run.
    pub first_persistent_sleep_epoch: Option<usize>,
}

impl Boundaries {
    /// Locate all boundaries on an already recoded and validated sequence.
    #[must_use]
    pub fn locate(stages: &[StageLabel], persistent_sleep_epochs: usize) -> Self {
        let n = stages.len();
        let lights_out_epoch = stages
            .iter()
            .position(|s| !s.is_lights_on())
            .unwrap_or(n);
        let lights_on_epoch = stages
            .iter()
            .rposition(|s| !s.is_lights_on())
            .map_or(lights_out_epoch, |e| e + 1);

        let final_wake_epoch = stages[lights_out_epoch..lights_on_epoch]
            .iter()
            .rposition(|s| !s.is_wake())
            .map_or(lights_out_epoch, |e| lights_out_epoch + e + 1);

        let first_sleep_epoch = stages.iter().position(|s| s.is_sleep());
        let last_sleep_epoch = stages.iter().rposition(|s| s.is_sleep());
        let first_rem_epoch = stages.iter().position(|s| s.is_rem());
        let first_persistent_sleep_epoch = first_sleep_epoch.and_then(|first| {
            (first..n).find(|&e| sleep_run_ahead(stages, e, persistent_sleep_epochs))
        });

        Self {
            lights_out_epoch,
            lights_on_epoch,
            final_wake_epoch,
            first_sleep_epoch,
            last_sleep_epoch,
            first_rem_epoch,
            first_persistent_sleep_epoch,
        }
    }
}

/// True if epoch `e` is persistent sleep: a sleep epoch preceded by a full
/// window of `persistent_sleep_epochs` sleep epochs.
#[must_use]
pub fn is_persistent_sleep(stages: &[StageLabel], e: usize, persistent_sleep_epochs: usize) -> bool {
    stages[e].is_sleep() && sleep_run_behind(stages, e, persistent_sleep_epochs)
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Minutes per stage over the whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMinutes {
    pub wake: f64,
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub n4: f64,
    pub rem: f64,
    /// Absent epochs inside the lights-out window.
    pub other: f64,
}

impl StageMinutes {
    #[must_use]
    pub fn tally(stages: &[StageLabel], epoch_mins: f64) -> Self {
        let mut minutes = Self::default();
        for stage in stages {
            let slot = match stage {
                StageLabel::Wake => &mut minutes.wake,
                StageLabel::Nrem1 => &mut minutes.n1,
                StageLabel::Nrem2 => &mut minutes.n2,
                StageLabel::Nrem3 => &mut minutes.n3,
                StageLabel::Nrem4 => &mut minutes.n4,
                StageLabel::Rem => &mut minutes.rem,
                StageLabel::Absent => &mut minutes.other,
                StageLabel::LightsOn => continue,
            };
            *slot += epoch_mins;
        }
        minutes
    }

    #[must_use]
    pub fn sleep(&self) -> f64 {
        self.n1 + self.n2 + self.n3 + self.n4 + self.rem
    }
}

/// Stage minutes as a fraction of total sleep time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageFractions {
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub n4: f64,
    pub rem: f64,
}

/// Night-level scalar statistics.
///
/// Latencies are `None` when the event they measure never happens. Efficiency
/// fields are 0 when `any_sleep` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub any_sleep: bool,
    /// Time in bed.
    pub tib: f64,
    /// Total recording time (lights out to lights on).
    pub trt: f64,
    /// Total wake time.
    pub twt: f64,
    /// Final wake time.
    pub fwt: f64,
    /// Total sleep time.
    pub tst: f64,
    /// Total persistent sleep time.
    pub tpst: f64,
    /// Sleep period time.
    pub spt: f64,
    /// Wake after sleep onset.
    pub waso: f64,
    pub sleep_latency: Option<f64>,
    pub persistent_sleep_latency: Option<f64>,
    pub rem_latency: Option<f64>,
    /// TST / TRT, percent.
    pub sleep_efficiency: f64,
    /// TST / SPT, percent.
    pub sleep_maintenance_efficiency: f64,
    /// TST over the first-to-last sleep span, percent.
    pub sleep_efficiency_alt: f64,
    pub stage_minutes: StageMinutes,
    pub stage_fractions: StageFractions,
    /// Filled in once cycles are segmented.
    pub cycle_count: usize,
    /// Mean total cycle duration in minutes (0 without cycles).
    pub mean_cycle_minutes: f64,
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

fn fraction(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl SummaryStatistics {
    /// Derive the scalar statistics from the boundaries.
    #[must_use]
    pub fn compute(
        stages: &[StageLabel],
        bounds: &Boundaries,
        persistent: &[bool],
        epoch_mins: f64,
    ) -> Self {
        let minutes = StageMinutes::tally(stages, epoch_mins);
        let any_sleep = minutes.sleep() > 0.0;
        let span = |from: usize, to: usize| to.saturating_sub(from) as f64 * epoch_mins;

        let tib = stages.len() as f64 * epoch_mins;
        let trt = span(bounds.lights_out_epoch, bounds.lights_on_epoch);
        let twt = minutes.wake;
        let tst = trt - twt - minutes.other;
        let fwt = span(bounds.final_wake_epoch, bounds.lights_on_epoch);
        let tpst = persistent.iter().filter(|&&p| p).count() as f64 * epoch_mins;

        let sleep_latency = bounds
            .first_sleep_epoch
            .map(|first| span(bounds.lights_out_epoch, first));
        let persistent_sleep_latency = bounds
            .first_persistent_sleep_epoch
            .map(|first| span(bounds.lights_out_epoch, first));
        let rem_latency = match (bounds.first_sleep_epoch, bounds.first_rem_epoch) {
            (Some(sleep), Some(rem)) => Some(span(sleep, rem)),
            _ => None,
        };
        let spt = trt - sleep_latency.unwrap_or(0.0);

        let (waso, sleep_span) = match (bounds.first_sleep_epoch, bounds.last_sleep_epoch) {
            (Some(first), Some(last)) => {
                let wake = stages[first..=last].iter().filter(|s| s.is_wake()).count();
                (wake as f64 * epoch_mins, span(first, last + 1))
            }
            _ => (0.0, 0.0),
        };

        let (sleep_efficiency, sleep_maintenance_efficiency, sleep_efficiency_alt) = if any_sleep
        {
            (
                percent(tst, trt),
                percent(tst, spt),
                percent(tst, sleep_span),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let stage_fractions = StageFractions {
            n1: fraction(minutes.n1, tst),
            n2: fraction(minutes.n2, tst),
            n3: fraction(minutes.n3, tst),
            n4: fraction(minutes.n4, tst),
            rem: fraction(minutes.rem, tst),
        };

        Self {
            any_sleep,
            tib,
            trt,
            twt,
            fwt,
            tst,
            tpst,
            spt,
            waso,
            sleep_latency,
            persistent_sleep_latency,
            rem_latency,
            sleep_efficiency,
            sleep_maintenance_efficiency,
            sleep_efficiency_alt,
            stage_minutes: minutes,
            stage_fractions,
            cycle_count: 0,
            mean_cycle_minutes: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageLabel::{Absent, LightsOn, Nrem2, Rem, Wake};

    fn seq(parts: &[(StageLabel, usize)]) -> Vec<StageLabel> {
        parts
            .iter()
            .flat_map(|&(s, n)| std::iter::repeat_n(s, n))
            .collect()
    }

    #[test]
    fn recode_edges_turns_outer_absent_into_lights() {
        let mut stages = vec![Absent, LightsOn, Absent, Wake, Absent, Nrem2, Absent, Absent];
        recode_edges(&mut stages);
        assert_eq!(
            stages,
            vec![LightsOn, LightsOn, LightsOn, Wake, Absent, Nrem2, LightsOn, LightsOn]
        );
    }

    #[test]
    fn recode_edges_on_all_absent() {
        let mut stages = vec![Absent; 3];
        recode_edges(&mut stages);
        assert_eq!(stages, vec![LightsOn; 3]);
    }

    #[test]
    fn lights_blocks_only_at_ends() {
        assert!(validate_lights(&[LightsOn, Wake, Nrem2, LightsOn]).is_ok());
        assert!(validate_lights(&[LightsOn, LightsOn, LightsOn]).is_ok());
        assert!(validate_lights(&[]).is_ok());
        assert_eq!(
            validate_lights(&[LightsOn, Wake, LightsOn, Wake]),
            Err(HypnoError::StructuralViolation { epoch: 2 })
        );
    }

    #[test]
    fn boundaries_of_typical_night() {
        let stages = seq(&[(LightsOn, 2), (Wake, 3), (Nrem2, 25), (Rem, 2), (Wake, 4), (LightsOn, 1)]);
        let b = Boundaries::locate(&stages, 20);
        assert_eq!(b.lights_out_epoch, 2);
        assert_eq!(b.lights_on_epoch, 36);
        assert_eq!(b.final_wake_epoch, 32);
        assert_eq!(b.first_sleep_epoch, Some(5));
        assert_eq!(b.last_sleep_epoch, Some(31));
        assert_eq!(b.first_rem_epoch, Some(30));
        assert_eq!(b.first_persistent_sleep_epoch, Some(5));
    }

    #[test]
    fn persistent_sleep_requires_full_window() {
        let stages = seq(&[(Wake, 2), (Nrem2, 5)]);
        assert_eq!(Boundaries::locate(&stages, 6).first_persistent_sleep_epoch, None);
        assert_eq!(Boundaries::locate(&stages, 5).first_persistent_sleep_epoch, Some(2));
        assert!(!is_persistent_sleep(&stages, 4, 3));
        assert!(is_persistent_sleep(&stages, 5, 3));
        assert!(!is_persistent_sleep(&stages, 1, 0));
    }

    #[test]
    fn summary_accounting_identity() {
        let stages = seq(&[(LightsOn, 2), (Wake, 4), (Nrem2, 20), (Absent, 2), (Wake, 2), (Rem, 10), (Wake, 4)]);
        let b = Boundaries::locate(&stages, 20);
        let persistent = vec![false; stages.len()];
        let s = SummaryStatistics::compute(&stages, &b, &persistent, 0.5);
        assert!(s.any_sleep);
        assert_eq!(s.tib, 22.0);
        assert_eq!(s.trt, 21.0);
        assert_eq!(s.twt, 5.0);
        assert_eq!(s.stage_minutes.other, 1.0);
        assert_eq!(s.tst, 15.0);
        assert_eq!(s.tst + s.twt + s.stage_minutes.other, s.trt);
        assert_eq!(s.waso, 1.0);
        assert_eq!(s.fwt, 2.0);
        assert_eq!(s.sleep_latency, Some(2.0));
        assert_eq!(s.rem_latency, Some(12.0));
        assert_eq!(s.spt, 19.0);
        assert_eq!(s.stage_fractions.n2, 10.0 / 15.0);
    }

    #[test]
    fn summary_without_sleep() {
        let stages = vec![Wake; 20];
        let b = Boundaries::locate(&stages, 20);
        let s = SummaryStatistics::compute(&stages, &b, &[false; 20], 0.5);
        assert!(!s.any_sleep);
        assert_eq!(s.tst, 0.0);
        assert_eq!(s.twt, 10.0);
        assert_eq!(s.waso, 0.0);
        assert_eq!(s.sleep_efficiency, 0.0);
        assert_eq!(s.sleep_latency, None);
        assert_eq!(s.rem_latency, None);
        assert_eq!(b.final_wake_epoch, 0);
        assert_eq!(s.fwt, 10.0);
    }
}
