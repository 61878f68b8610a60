//! Fixture loading and management.
//!
//! Stage sequences and expected cycle numbers are written in a compact
//! run-length form, `W*4 N2*40 R*10 W*4`, where a bare token counts once.

use std::path::{Path, PathBuf};

use hypnogram_core::{ClockTime, EpochSequence, StageLabel};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

fn default_epoch_secs() -> f64 {
    30.0
}

/// A single fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case identifier.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_epoch_secs")]
    pub epoch_secs: f64,
    /// Run-length stage text.
    pub stages: String,
    /// `key=value` analysis options.
    #[serde(default)]
    pub params: Vec<String>,
    /// Clock time of the first epoch.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub expected_epochs: Option<usize>,
    pub expected: ExpectedOutcome,
}

/// Expected values for one case. Absent fields are not checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedOutcome {
    /// `HypnoError::kind()` of the expected failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_sleep: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tst_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twt_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waso_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_latency_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rem_latency_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<usize>,
    /// Run-length per-epoch cycle numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_numbers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_nrem_minutes: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_rem_minutes: Option<Vec<f64>>,
    /// `hh.mm.ss`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_onset_clock: Option<String>,
}

impl FixtureCase {
    fn invalid(&self, message: impl Into<String>) -> HarnessError {
        HarnessError::Fixture {
            case: self.name.clone(),
            message: message.into(),
        }
    }

    /// Expand and parse the stage text.
    pub fn stage_labels(&self) -> HarnessResult<Vec<StageLabel>> {
        expand_runs(&self.stages)
            .map_err(|message| self.invalid(message))?
            .iter()
            .map(|token| token.parse::<StageLabel>().map_err(|e| self.invalid(e.to_string())))
            .collect()
    }

    /// Build the input sequence for this case.
    pub fn sequence(&self) -> HarnessResult<EpochSequence> {
        let start = match self.start.as_deref() {
            Some(text) => Some(
                ClockTime::parse(text)
                    .ok_or_else(|| self.invalid(format!("bad start time '{text}'")))?,
            ),
            None => None,
        };
        let mut sequence = EpochSequence::new(self.stage_labels()?, self.epoch_secs).with_start(start);
        if let Some(n) = self.expected_epochs {
            sequence = sequence.with_expected_epochs(n);
        }
        Ok(sequence)
    }

    /// Expected per-epoch cycle numbers, if the case pins them.
    pub fn expected_cycle_numbers(&self) -> HarnessResult<Option<Vec<u32>>> {
        let Some(text) = self.expected.cycle_numbers.as_deref() else {
            return Ok(None);
        };
        expand_runs(text)
            .map_err(|message| self.invalid(message))?
            .iter()
            .map(|token| {
                token
                    .parse::<u32>()
                    .map_err(|_| self.invalid(format!("bad cycle number '{token}'")))
            })
            .collect::<HarnessResult<Vec<_>>>()
            .map(Some)
    }
}

/// A collection of fixture cases for one scenario family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Scenario family name.
    pub family: String,
    /// UTC timestamp of capture.
    pub captured_at: String,
    pub cases: Vec<FixtureCase>,
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load fixture set from a file path.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

/// `.json` files directly inside `dir`, sorted.
pub fn fixture_files(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(HarnessError::NoFixtures(dir.to_path_buf()));
    }
    Ok(paths)
}

/// Expand `TOKEN*COUNT` runs into individual tokens.
pub fn expand_runs(text: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    for item in text.split_whitespace() {
        match item.split_once('*') {
            Some((token, count)) => {
                let count: usize = count
                    .parse()
                    .map_err(|_| format!("bad run length in '{item}'"))?;
                out.extend(std::iter::repeat_n(token.to_string(), count));
            }
            None => out.push(item.to_string()),
        }
    }
    Ok(out)
}

/// Inverse of [`expand_runs`]: collapse repeated values into `VALUE*COUNT`.
pub fn compress_runs<T: std::fmt::Display + PartialEq>(values: &[T]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let run = values[i..].iter().take_while(|v| **v == values[i]).count();
        if run == 1 {
            parts.push(values[i].to_string());
        } else {
            parts.push(format!("{}*{run}", values[i]));
        }
        i += run;
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_expand_in_order() {
        let tokens = expand_runs("W*2 N2 R*3").unwrap();
        assert_eq!(tokens, vec!["W", "W", "N2", "R", "R", "R"]);
        assert!(expand_runs("W*x").is_err());
        assert!(expand_runs("").unwrap().is_empty());
    }

    #[test]
    fn compress_is_canonical() {
        assert_eq!(compress_runs(&[0, 0, 1, 2, 2, 2]), "0*2 1 2*3");
        assert_eq!(compress_runs::<u32>(&[]), "");
    }

    #[test]
    fn case_defaults_and_parsing() {
        let json = r#"{
            "version": "v1",
            "family": "unit",
            "captured_at": "2026-01-01T00:00:00Z",
            "cases": [{
                "name": "tiny",
                "stages": "W*2 N2*3 ?",
                "start": "22:30:00",
                "expected": { "cycle_numbers": "0*2 1*4" }
            }]
        }"#;
        let set = FixtureSet::from_json(json).unwrap();
        let case = &set.cases[0];
        assert_eq!(case.epoch_secs, 30.0);
        assert!(case.params.is_empty());

        let sequence = case.sequence().unwrap();
        assert_eq!(sequence.len(), 6);
        assert_eq!(sequence.stages[5], StageLabel::Absent);
        assert!(sequence.start.is_some());
        assert_eq!(case.expected_cycle_numbers().unwrap(), Some(vec![0, 0, 1, 1, 1, 1]));
    }

    #[test]
    fn bad_stage_token_names_the_case() {
        let case = FixtureCase {
            name: "broken".into(),
            description: String::new(),
            epoch_secs: 30.0,
            stages: "W N9".into(),
            params: Vec::new(),
            start: None,
            expected_epochs: None,
            expected: ExpectedOutcome::default(),
        };
        let err = case.stage_labels().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
