//! Rerun checks: the same input must serialize to the same bytes every time.

use hypnogram_core::{EpochSequence, HypnogramAnalysis, Thresholds, analyze};
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;
use crate::structured_log::hex_lower;

/// blake3 fingerprint of an analysis, over its JSON serialization.
pub fn fingerprint(analysis: &HypnogramAnalysis) -> HarnessResult<String> {
    let bytes = serde_json::to_vec(analysis)?;
    Ok(hex_lower(blake3::hash(&bytes).as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    pub runs: usize,
    pub epochs: usize,
    /// One fingerprint per run, in run order.
    pub digests: Vec<String>,
    pub stable: bool,
}

/// Analyze `sequence` `runs` times and compare fingerprints.
pub fn check_determinism(
    sequence: &EpochSequence,
    thresholds: &Thresholds,
    runs: usize,
) -> HarnessResult<DeterminismReport> {
    let digests = (0..runs.max(1))
        .map(|_| fingerprint(&analyze(sequence, thresholds)?))
        .collect::<HarnessResult<Vec<_>>>()?;
    let stable = digests.windows(2).all(|pair| pair[0] == pair[1]);
    Ok(DeterminismReport {
        runs: digests.len(),
        epochs: sequence.len(),
        digests,
        stable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypnogram_core::StageLabel::{Nrem2, Rem, Wake};

    #[test]
    fn reruns_share_one_digest() {
        let stages = [(Wake, 4), (Nrem2, 40), (Rem, 10), (Wake, 4)]
            .iter()
            .flat_map(|&(s, n)| std::iter::repeat_n(s, n))
            .collect();
        let report = check_determinism(&EpochSequence::new(stages, 30.0), &Thresholds::default(), 3).unwrap();
        assert!(report.stable);
        assert_eq!(report.runs, 3);
        assert_eq!(report.digests[0].len(), 64);
    }

    #[test]
    fn different_inputs_differ() {
        let a = analyze(&EpochSequence::new(vec![Wake, Nrem2], 30.0), &Thresholds::default()).unwrap();
        let b = analyze(&EpochSequence::new(vec![Nrem2, Wake], 30.0), &Thresholds::default()).unwrap();
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn invalid_input_propagates() {
        let err = check_determinism(&EpochSequence::new(vec![Wake], -1.0), &Thresholds::default(), 2).unwrap_err();
        assert!(err.to_string().contains("epoch duration"));
    }
}
