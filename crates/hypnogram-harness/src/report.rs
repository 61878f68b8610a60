//! Report generation for verification and batch runs.

use std::fmt::Write as _;

use hypnogram_core::HypnogramAnalysis;
use serde::{Deserialize, Serialize};

use crate::verify::VerificationSummary;

/// A verification report over one or more fixture families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub title: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub summary: VerificationSummary,
}

impl VerificationReport {
    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(out, "- Timestamp: {}", self.timestamp);
        let _ = writeln!(out, "- Total: {}", self.summary.total);
        let _ = writeln!(out, "- Passed: {}", self.summary.passed);
        let _ = writeln!(out, "- Failed: {}\n", self.summary.failed);

        out.push_str("| Case | Family | Status |\n");
        out.push_str("|------|--------|--------|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "| {} | {} | {} |", r.case_name, r.family, status);
        }

        let failures: Vec<_> = self.summary.results.iter().filter(|r| !r.passed).collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n");
            for r in failures {
                let _ = writeln!(
                    out,
                    "\n### {}\n\n```diff\n{}```",
                    r.case_name,
                    r.diff.as_deref().unwrap_or("")
                );
            }
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Headline numbers for one subject, as written by batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub epochs: usize,
    pub any_sleep: bool,
    pub tib_minutes: f64,
    pub tst_minutes: f64,
    pub waso_minutes: f64,
    pub sleep_efficiency: f64,
    pub sleep_latency_minutes: Option<f64>,
    pub rem_latency_minutes: Option<f64>,
    pub cycle_count: usize,
    pub mean_cycle_minutes: f64,
}

impl SubjectSummary {
    #[must_use]
    pub fn from_analysis(analysis: &HypnogramAnalysis) -> Self {
        let s = &analysis.summary;
        Self {
            epochs: analysis.epoch_count(),
            any_sleep: s.any_sleep,
            tib_minutes: s.tib,
            tst_minutes: s.tst,
            waso_minutes: s.waso,
            sleep_efficiency: s.sleep_efficiency,
            sleep_latency_minutes: s.sleep_latency,
            rem_latency_minutes: s.rem_latency,
            cycle_count: s.cycle_count,
            mean_cycle_minutes: s.mean_cycle_minutes,
        }
    }
}
