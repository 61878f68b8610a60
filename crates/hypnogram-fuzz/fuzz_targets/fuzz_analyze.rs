#![no_main]
use hypnogram_core::StageLabel::{self, Absent, LightsOn, Nrem1, Nrem2, Nrem3, Nrem4, Rem, Wake};
use hypnogram_core::{EpochSequence, HypnoError, Thresholds, analyze};
use libfuzzer_sys::fuzz_target;

const LABELS: [StageLabel; 8] = [Wake, Nrem1, Nrem2, Nrem3, Nrem4, Rem, LightsOn, Absent];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the epoch length (10..=60 s); the rest are stages.
    let epoch_secs = f64::from(10 + data[0] % 51);
    let stages: Vec<StageLabel> = data[1..].iter().map(|b| LABELS[usize::from(b % 8)]).collect();
    let n = stages.len();

    match analyze(&EpochSequence::new(stages, epoch_secs), &Thresholds::default()) {
        Ok(a) => {
            let s = &a.summary;
            assert!((s.tst + s.twt + s.stage_minutes.other - s.trt).abs() < 1e-6);
            assert!(s.trt <= s.tib + 1e-9);
            assert_eq!(a.epoch_count(), n);
            if !s.any_sleep {
                assert_eq!(s.tst, 0.0);
                assert!(a.cycles.is_empty());
            }

            let mut highest = 0;
            for &c in &a.epochs.cycle_number {
                assert!(c <= highest + 1);
                highest = highest.max(c);
            }
            assert_eq!(highest as usize, a.cycles.len());

            for i in 0..n {
                assert!(a.epochs.flanking_min[i] <= a.epochs.flanking_all[i]);
                assert_eq!(a.epochs.depth[i].is_some(), a.epochs.stage[i] == Nrem2);
            }
        }
        Err(HypnoError::StructuralViolation { .. }) => {}
        Err(other) => panic!("unexpected error for valid inputs: {other}"),
    }
});
