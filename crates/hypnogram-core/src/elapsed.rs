//! Running stage totals and the per-epoch WASO flag.

use serde::{Deserialize, Serialize};

use crate::boundary::StageMinutes;
use crate::stage::StageLabel;

/// Minutes of each category accumulated *before* each epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElapsedTracks {
    pub wake: Vec<f64>,
    pub waso: Vec<f64>,
    pub sleep: Vec<f64>,
    pub n1: Vec<f64>,
    pub n2: Vec<f64>,
    /// N3 and N4 together.
    pub n3: Vec<f64>,
    pub rem: Vec<f64>,
    /// Wake strictly between the first sleep epoch and the final wake bout.
    pub waso_flag: Vec<bool>,
}

/// Elapsed minutes as a share of the night total for each category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElapsedFractions {
    pub sleep: f64,
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub rem: f64,
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total } else { 0.0 }
}

impl ElapsedTracks {
    #[must_use]
    pub fn compute(
        stages: &[StageLabel],
        first_sleep_epoch: Option<usize>,
        final_wake_epoch: usize,
        epoch_mins: f64,
    ) -> Self {
        let n = stages.len();
        let mut tracks = Self {
            wake: Vec::with_capacity(n),
            waso: Vec::with_capacity(n),
            sleep: Vec::with_capacity(n),
            n1: Vec::with_capacity(n),
            n2: Vec::with_capacity(n),
            n3: Vec::with_capacity(n),
            rem: Vec::with_capacity(n),
            waso_flag: Vec::with_capacity(n),
        };
        let mut acc = [0.0_f64; 7];

        for (e, &stage) in stages.iter().enumerate() {
            let [wake, waso, sleep, n1, n2, n3, rem] = acc;
            tracks.wake.push(wake);
            tracks.waso.push(waso);
            tracks.sleep.push(sleep);
            tracks.n1.push(n1);
            tracks.n2.push(n2);
            tracks.n3.push(n3);
            tracks.rem.push(rem);

            let is_waso = stage.is_wake()
                && first_sleep_epoch.is_some_and(|first| e > first)
                && e < final_wake_epoch;
            tracks.waso_flag.push(is_waso);

            if stage.is_wake() {
                acc[0] += epoch_mins;
                if is_waso {
                    acc[1] += epoch_mins;
                }
            }
            if stage.is_sleep() {
                acc[2] += epoch_mins;
            }
            match stage {
                StageLabel::Nrem1 => acc[3] += epoch_mins,
                StageLabel::Nrem2 => acc[4] += epoch_mins,
                StageLabel::Nrem3 | StageLabel::Nrem4 => acc[5] += epoch_mins,
                StageLabel::Rem => acc[6] += epoch_mins,
                _ => {}
            }
        }
        tracks
    }

    /// Fractions at epoch `e` relative to the night's stage minutes and TST.
    #[must_use]
    pub fn fractions(&self, e: usize, totals: &StageMinutes, tst: f64) -> ElapsedFractions {
        ElapsedFractions {
            sleep: share(self.sleep[e], tst),
            n1: share(self.n1[e], totals.n1),
            n2: share(self.n2[e], totals.n2),
            n3: share(self.n3[e], totals.n3 + totals.n4),
            rem: share(self.rem[e], totals.rem),
        }
    }
}
