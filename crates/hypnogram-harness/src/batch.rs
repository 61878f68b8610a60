//! Parallel analysis of independent subjects.
//!
//! Subjects are split into contiguous chunks, one scoped worker per chunk.
//! Workers push into a shared `parking_lot::Mutex`; the collected outcomes
//! are sorted by subject id so the result does not depend on scheduling.

use std::time::Instant;

use hypnogram_core::{EpochSequence, Thresholds, analyze};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::determinism::fingerprint;
use crate::input::Subject;
use crate::report::SubjectSummary;
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub epoch_secs: f64,
    pub workers: usize,
    pub thresholds: Thresholds,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            epoch_secs: 30.0,
            workers: 4,
            thresholds: Thresholds::default(),
        }
    }
}

/// What happened to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectOutcome {
    pub subject: String,
    pub epochs: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SubjectSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time; logged, never serialized.
    #[serde(skip)]
    pub duration_ms: u64,
}

impl SubjectOutcome {
    /// A subject whose input could not be loaded.
    #[must_use]
    pub fn load_failure(subject: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            epochs: 0,
            outcome: Outcome::Error,
            digest: None,
            summary: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }
}

/// Batch output file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub subjects: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<SubjectOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn new(run_id: impl Into<String>, outcomes: Vec<SubjectOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.outcome == Outcome::Pass).count();
        Self {
            run_id: run_id.into(),
            subjects: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }
}

/// Analyze one subject. Analysis errors are recorded, not raised.
#[must_use]
pub fn analyze_subject(subject: &Subject, config: &BatchConfig) -> SubjectOutcome {
    let t0 = Instant::now();
    let sequence = EpochSequence::new(subject.stages.clone(), config.epoch_secs);
    let result = analyze(&sequence, &config.thresholds)
        .map_err(|e| e.to_string())
        .and_then(|analysis| {
            let digest = fingerprint(&analysis).map_err(|e| e.to_string())?;
            Ok((analysis, digest))
        });

    let mut outcome = match result {
        Ok((analysis, digest)) => SubjectOutcome {
            subject: subject.id.clone(),
            epochs: sequence.len(),
            outcome: Outcome::Pass,
            digest: Some(digest),
            summary: Some(SubjectSummary::from_analysis(&analysis)),
            error: None,
            duration_ms: 0,
        },
        Err(error) => SubjectOutcome {
            epochs: sequence.len(),
            ..SubjectOutcome::load_failure(subject.id.clone(), error)
        },
    };
    outcome.duration_ms = t0.elapsed().as_millis() as u64;
    outcome
}

/// Analyze every subject across `config.workers` scoped threads.
#[must_use]
pub fn run_batch(subjects: &[Subject], config: &BatchConfig) -> Vec<SubjectOutcome> {
    if subjects.is_empty() {
        return Vec::new();
    }
    let workers = config.workers.clamp(1, subjects.len());
    let chunk = subjects.len().div_ceil(workers);
    let collected = Mutex::new(Vec::with_capacity(subjects.len()));

    std::thread::scope(|scope| {
        for part in subjects.chunks(chunk) {
            let collected = &collected;
            scope.spawn(move || {
                for subject in part {
                    let outcome = analyze_subject(subject, config);
                    collected.lock().push(outcome);
                }
            });
        }
    });

    let mut outcomes = collected.into_inner();
    outcomes.sort_by(|a, b| a.subject.cmp(&b.subject));
    outcomes
}

/// One JSONL record per subject, in outcome order.
pub fn log_outcomes(emitter: &mut LogEmitter, outcomes: &[SubjectOutcome]) -> std::io::Result<()> {
    for o in outcomes {
        let level = if o.outcome == Outcome::Pass {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        let mut entry = emitter
            .entry(level, "subject_analyzed", &o.subject)
            .with_outcome(o.outcome)
            .with_epochs(o.epochs)
            .with_duration_ms(o.duration_ms);
        if let Some(digest) = &o.digest {
            entry = entry.with_digest(digest.clone());
        }
        if let Some(error) = &o.error {
            entry = entry.with_details(serde_json::json!({ "error": error }));
        } else if let Some(summary) = &o.summary {
            entry = entry.with_details(serde_json::json!({
                "tst_minutes": summary.tst_minutes,
                "cycle_count": summary.cycle_count,
            }));
        }
        emitter.emit_entry(entry)?;
    }
    emitter.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::{StreamKind, validate_log_text};
    use hypnogram_core::StageLabel::{LightsOn, Nrem2, Rem, Wake};

    fn subject(id: &str, parts: &[(hypnogram_core::StageLabel, usize)]) -> Subject {
        Subject {
            id: id.to_string(),
            stages: parts
                .iter()
                .flat_map(|&(s, n)| std::iter::repeat_n(s, n))
                .collect(),
        }
    }

    fn cohort() -> Vec<Subject> {
        let mut broken = subject("s003", &[(Wake, 10), (Nrem2, 10)]);
        broken.stages[4] = LightsOn;
        vec![
            subject("s005", &[(Wake, 20)]),
            subject("s001", &[(Wake, 4), (Nrem2, 40), (Rem, 10), (Wake, 4)]),
            broken,
            subject("s002", &[(Nrem2, 30), (Rem, 12)]),
            subject("s004", &[(Wake, 2), (Nrem2, 25), (Wake, 2)]),
        ]
    }

    #[test]
    fn outcomes_are_sorted_and_independent_of_worker_count() {
        let subjects = cohort();
        let one = run_batch(&subjects, &BatchConfig { workers: 1, ..BatchConfig::default() });
        let many = run_batch(&subjects, &BatchConfig { workers: 8, ..BatchConfig::default() });

        let ids: Vec<_> = one.iter().map(|o| o.subject.as_str()).collect();
        assert_eq!(ids, ["s001", "s002", "s003", "s004", "s005"]);
        assert_eq!(
            serde_json::to_string(&one).unwrap(),
            serde_json::to_string(&many).unwrap()
        );
    }

    #[test]
    fn failing_subject_does_not_stop_the_batch() {
        let outcomes = run_batch(&cohort(), &BatchConfig::default());
        let report = BatchReport::new("run-1", outcomes);
        assert_eq!((report.subjects, report.succeeded, report.failed), (5, 4, 1));

        let broken = &report.outcomes[2];
        assert_eq!(broken.outcome, Outcome::Error);
        assert!(broken.error.as_deref().unwrap().contains("epoch 4"));
        assert!(broken.digest.is_none());

        let single = report.outcomes[0].summary.as_ref().unwrap();
        assert_eq!(single.tst_minutes, 25.0);
        assert_eq!(single.cycle_count, 1);
    }

    #[test]
    fn log_records_validate() {
        let outcomes = run_batch(&cohort(), &BatchConfig::default());
        let (mut emitter, buffer) = LogEmitter::to_buffer("batch-test", StreamKind::Batch);
        log_outcomes(&mut emitter, &outcomes).unwrap();

        let text = buffer.contents();
        let (lines, errors) = validate_log_text(&text);
        assert_eq!(lines, 5);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(text.lines().next().unwrap().contains("batch-test::s001::001"));
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(run_batch(&[], &BatchConfig::default()).is_empty());
    }
}
