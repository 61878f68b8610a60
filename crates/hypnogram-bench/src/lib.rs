//! Synthetic nights for the analysis benchmarks.

#![forbid(unsafe_code)]

use hypnogram_core::StageLabel::{self, Nrem1, Nrem2, Nrem3, Rem, Wake};

/// One ninety-minute-style cycle at 30 s epochs.
const CYCLE: &[(StageLabel, usize)] = &[
    (Nrem1, 6),
    (Nrem2, 60),
    (Nrem3, 50),
    (Nrem2, 24),
    (Rem, 30),
    (Wake, 2),
];

/// `cycles` repetitions of a typical cycle framed by wake.
#[must_use]
pub fn synthetic_night(cycles: usize) -> Vec<StageLabel> {
    let mut stages = vec![Wake; 20];
    for _ in 0..cycles {
        for &(stage, n) in CYCLE {
            stages.extend(std::iter::repeat_n(stage, n));
        }
    }
    stages.extend(std::iter::repeat_n(Wake, 20));
    stages
}

/// A night where every epoch differs from its predecessor.
#[must_use]
pub fn fragmented_night(epochs: usize) -> Vec<StageLabel> {
    const PATTERN: [StageLabel; 5] = [Wake, Nrem1, Nrem2, Rem, Nrem3];
    (0..epochs).map(|i| PATTERN[(i * 7 + i / 3) % 5]).collect()
}
