//! Fixture execution engine.

use hypnogram_core::{HypnoError, HypnogramAnalysis, Thresholds, analyze};

use crate::error::HarnessResult;
use crate::fixtures::{ExpectedOutcome, FixtureCase, FixtureSet, compress_runs};
use crate::verify::{VerificationResult, render_diff};

/// Runs a fixture set and collects verification results.
pub struct TestRunner {
    /// Name of the verification campaign.
    pub campaign: String,
}

impl TestRunner {
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
        }
    }

    /// Run all cases in a set and return results in case order.
    #[must_use]
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<VerificationResult> {
        fixture_set
            .cases
            .iter()
            .map(|case| {
                let (expected, actual) = match compare_case(case) {
                    Ok(pair) => pair,
                    Err(err) => (expected_listing(&case.expected), format!("fixture error: {err}")),
                };
                let passed = expected == actual;
                let diff = (!passed).then(|| render_diff(&expected, &actual));
                VerificationResult {
                    case_name: case.name.clone(),
                    family: fixture_set.family.clone(),
                    passed,
                    expected,
                    actual,
                    diff,
                }
            })
            .collect()
    }
}

/// Parse options and analyze one case.
///
/// The outer error is a broken fixture; the inner one is the analysis
/// outcome the case may expect.
pub fn execute_case(case: &FixtureCase) -> HarnessResult<Result<HypnogramAnalysis, HypnoError>> {
    let sequence = case.sequence()?;
    Ok(Thresholds::from_params(&case.params).and_then(|thresholds| analyze(&sequence, &thresholds)))
}

#[derive(Default)]
struct Listing {
    expected: Vec<String>,
    actual: Vec<String>,
}

impl Listing {
    fn push(&mut self, field: &str, want: impl ToString, got: impl ToString) {
        self.expected.push(format!("{field}={}", want.to_string()));
        self.actual.push(format!("{field}={}", got.to_string()));
    }

    fn finish(self) -> (String, String) {
        (self.expected.join("\n"), self.actual.join("\n"))
    }
}

fn minutes(value: f64) -> String {
    format!("{value:.3}")
}

fn optional_minutes(value: Option<f64>) -> String {
    value.map_or_else(|| "none".to_string(), minutes)
}

fn minute_list(values: &[f64]) -> String {
    values.iter().map(|&v| minutes(v)).collect::<Vec<_>>().join(",")
}

fn expected_listing(expected: &ExpectedOutcome) -> String {
    format!("error={}", expected.error.as_deref().unwrap_or("none"))
}

/// Render the checked fields of a case as expected and actual listings.
fn compare_case(case: &FixtureCase) -> HarnessResult<(String, String)> {
    let outcome = execute_case(case)?;
    let want = &case.expected;
    let mut listing = Listing::default();

    let error_kind = outcome.as_ref().err().map_or("none", HypnoError::kind);
    listing.push("error", want.error.as_deref().unwrap_or("none"), error_kind);

    let Ok(analysis) = outcome else {
        return Ok(listing.finish());
    };
    let summary = &analysis.summary;

    if let Some(any_sleep) = want.any_sleep {
        listing.push("any_sleep", any_sleep, summary.any_sleep);
    }
    if let Some(tst) = want.tst_minutes {
        listing.push("tst_minutes", minutes(tst), minutes(summary.tst));
    }
    if let Some(twt) = want.twt_minutes {
        listing.push("twt_minutes", minutes(twt), minutes(summary.twt));
    }
    if let Some(waso) = want.waso_minutes {
        listing.push("waso_minutes", minutes(waso), minutes(summary.waso));
    }
    if let Some(latency) = want.sleep_latency_minutes {
        listing.push(
            "sleep_latency_minutes",
            minutes(latency),
            optional_minutes(summary.sleep_latency),
        );
    }
    if let Some(latency) = want.rem_latency_minutes {
        listing.push(
            "rem_latency_minutes",
            minutes(latency),
            optional_minutes(summary.rem_latency),
        );
    }
    if let Some(count) = want.cycle_count {
        listing.push("cycle_count", count, analysis.cycles.len());
    }
    if let Some(numbers) = case.expected_cycle_numbers()? {
        listing.push(
            "cycle_numbers",
            compress_runs(&numbers),
            compress_runs(&analysis.epochs.cycle_number),
        );
    }
    if let Some(nrem) = &want.cycle_nrem_minutes {
        let got: Vec<f64> = analysis.cycles.values().map(|c| c.nrem_minutes).collect();
        listing.push("cycle_nrem_minutes", minute_list(nrem), minute_list(&got));
    }
    if let Some(rem) = &want.cycle_rem_minutes {
        let got: Vec<f64> = analysis.cycles.values().map(|c| c.rem_minutes).collect();
        listing.push("cycle_rem_minutes", minute_list(rem), minute_list(&got));
    }
    if let Some(onset) = &want.sleep_onset_clock {
        let got = analysis
            .clock
            .as_ref()
            .and_then(|clock| clock.sleep_onset)
            .map_or_else(|| "none".to_string(), |t| t.to_string());
        listing.push("sleep_onset_clock", onset, got);
    }

    Ok(listing.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cases: Vec<FixtureCase>) -> FixtureSet {
        FixtureSet {
            version: "v1".into(),
            family: "unit".into(),
            captured_at: "2026-01-01T00:00:00Z".into(),
            cases,
        }
    }

    fn case(name: &str, stages: &str, expected: ExpectedOutcome) -> FixtureCase {
        FixtureCase {
            name: name.into(),
            description: String::new(),
            epoch_secs: 30.0,
            stages: stages.into(),
            params: Vec::new(),
            start: None,
            expected_epochs: None,
            expected,
        }
    }

    #[test]
    fn matching_case_passes() {
        let expected = ExpectedOutcome {
            tst_minutes: Some(25.0),
            cycle_count: Some(1),
            cycle_numbers: Some("0*4 1*50 0*4".into()),
            cycle_nrem_minutes: Some(vec![20.0]),
            ..ExpectedOutcome::default()
        };
        let results = TestRunner::new("unit").run(&set(vec![case(
            "single",
            "W*4 N2*40 R*10 W*4",
            expected,
        )]));
        assert!(results[0].passed, "{:?}", results[0].diff);
        assert_eq!(results[0].family, "unit");
    }

    #[test]
    fn wrong_expectation_fails_with_diff() {
        let expected = ExpectedOutcome {
            twt_minutes: Some(3.0),
            ..ExpectedOutcome::default()
        };
        let results = TestRunner::new("unit").run(&set(vec![case("off", "W*4 N2*40 R*10 W*4", expected)]));
        assert!(!results[0].passed);
        let diff = results[0].diff.as_deref().unwrap();
        assert!(diff.contains("-twt_minutes=3.000"));
        assert!(diff.contains("+twt_minutes=4.000"));
    }

    #[test]
    fn expected_errors_compare_by_kind() {
        let expected = ExpectedOutcome {
            error: Some("unknown_parameter".into()),
            ..ExpectedOutcome::default()
        };
        let mut bad_param = case("bad_param", "W*4", expected);
        bad_param.params.push("no-such-key=1".into());
        let results = TestRunner::new("unit").run(&set(vec![bad_param]));
        assert!(results[0].passed, "{:?}", results[0].diff);
    }

    #[test]
    fn broken_fixture_is_a_failure_not_a_panic() {
        let results = TestRunner::new("unit").run(&set(vec![case(
            "typo",
            "W*4 X2",
            ExpectedOutcome::default(),
        )]));
        assert!(!results[0].passed);
        assert!(results[0].actual.starts_with("fixture error"));
    }
}
