//! Analysis thresholds.
//!
//! Thresholds are expressed in minutes (the clinically meaningful unit) and
//! converted once per run into whole epoch counts for the sequence's epoch
//! duration. Conversion truncates: `epochs = trunc(minutes / epoch_minutes)`.
//!
//! # Parameter keys
//!
//! - `nrem-mins`: minimum NREM period duration (default 15)
//! - `rem-mins`: minimum REM period duration after the first cycle (default 5)
//! - `rem-interruption-mins`: longest non-REM gap tolerated inside a REM period (default 15)
//! - `waso-mins`: Wake/N1 run that terminates a NREM period (default 15)
//! - `persistent-sleep-mins`: sleep run that defines persistent sleep (default 10)
//! - `req-pre-post`: destination run length for transition distances (default 4)
//! - `n2-ascdesc-k`: qualifying epochs per side for the N2 depth score (default 10)
//! - `collapse-nrem34`: merge N4 into N3 (default no)
//! - `flanking-collapse-nrem`: three-class flanking and transition matrix (default yes)

use serde::{Deserialize, Serialize};

use crate::error::{HypnoError, HypnoResult};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_MIN_NREM_MINUTES: f64 = 15.0;
pub const DEFAULT_MIN_REM_MINUTES: f64 = 5.0;
pub const DEFAULT_REM_INTERRUPTION_MINUTES: f64 = 15.0;
pub const DEFAULT_TERMINATING_WASO_MINUTES: f64 = 15.0;
pub const DEFAULT_PERSISTENT_SLEEP_MINUTES: f64 = 10.0;
pub const DEFAULT_REQUIRED_TRANSITION_EPOCHS: usize = 4;
pub const DEFAULT_DEPTH_WINDOW_EPOCHS: usize = 10;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Named analysis thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum NREM content for a cycle to start.
    pub min_nrem_minutes: f64,
    /// Minimum REM period duration (cycle 2 onward).
    pub min_rem_minutes: f64,
    /// Maximum NREM/Wake allowed within a single REM period.
    pub rem_interruption_minutes: f64,
    /// Wake/N1 duration that ends a NREM period when REM is skipped.
    pub terminating_waso_minutes: f64,
    /// Prior sleep needed before an epoch counts as persistent sleep.
    pub persistent_sleep_minutes: f64,
    /// Destination run length required by the directional transition measures.
    pub required_transition_epochs: usize,
    /// Qualifying epochs scanned on each side by the depth-trajectory score.
    pub depth_window_epochs: usize,
    /// Merge N4 into N3 before analysis.
    pub collapse_deep_nrem: bool,
    /// Flanking runs and the transition matrix use the three-class view.
    pub flanking_use_three_class: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_nrem_minutes: DEFAULT_MIN_NREM_MINUTES,
            min_rem_minutes: DEFAULT_MIN_REM_MINUTES,
            rem_interruption_minutes: DEFAULT_REM_INTERRUPTION_MINUTES,
            terminating_waso_minutes: DEFAULT_TERMINATING_WASO_MINUTES,
            persistent_sleep_minutes: DEFAULT_PERSISTENT_SLEEP_MINUTES,
            required_transition_epochs: DEFAULT_REQUIRED_TRANSITION_EPOCHS,
            depth_window_epochs: DEFAULT_DEPTH_WINDOW_EPOCHS,
            collapse_deep_nrem: false,
            flanking_use_three_class: true,
        }
    }
}

impl Thresholds {
    /// Parse `key=value` options on top of the defaults.
    pub fn from_params<I, S>(params: I) -> HypnoResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut thresholds = Self::default();
        for param in params {
            thresholds.apply_param(param.as_ref())?;
        }
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Apply a single `key=value` option.
    pub fn apply_param(&mut self, param: &str) -> HypnoResult<()> {
        let param = param.trim();
        if param.is_empty() {
            return Ok(());
        }
        let (key, value) = match param.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (param, "T"),
        };

        match key {
            "nrem-mins" => self.min_nrem_minutes = parse_minutes(key, value)?,
            "rem-mins" => self.min_rem_minutes = parse_minutes(key, value)?,
            "rem-interruption-mins" => self.rem_interruption_minutes = parse_minutes(key, value)?,
            "waso-mins" => self.terminating_waso_minutes = parse_minutes(key, value)?,
            "persistent-sleep-mins" => self.persistent_sleep_minutes = parse_minutes(key, value)?,
            "req-pre-post" => self.required_transition_epochs = parse_count(key, value)?,
            "n2-ascdesc-k" => self.depth_window_epochs = parse_count(key, value)?,
            "collapse-nrem34" => self.collapse_deep_nrem = parse_yes_no(key, value)?,
            "flanking-collapse-nrem" => self.flanking_use_three_class = parse_yes_no(key, value)?,
            _ => return Err(HypnoError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }

    /// Reject negative or non-finite minute thresholds.
    pub fn validate(&self) -> HypnoResult<()> {
        let minutes = [
            ("min_nrem_minutes", self.min_nrem_minutes),
            ("min_rem_minutes", self.min_rem_minutes),
            ("rem_interruption_minutes", self.rem_interruption_minutes),
            ("terminating_waso_minutes", self.terminating_waso_minutes),
            ("persistent_sleep_minutes", self.persistent_sleep_minutes),
        ];
        for (name, value) in minutes {
            if !value.is_finite() || value < 0.0 {
                return Err(HypnoError::InvalidThreshold {
                    name,
                    minutes: value,
                });
            }
        }
        Ok(())
    }

    /// Convert to epoch counts for the given epoch duration.
    pub fn to_epochs(&self, epoch_secs: f64) -> HypnoResult<EpochThresholds> {
        if !epoch_secs.is_finite() || epoch_secs <= 0.0 {
            return Err(HypnoError::InvalidEpochDuration(epoch_secs));
        }
        self.validate()?;
        let epoch_mins = epoch_secs / 60.0;
        let epochs = |minutes: f64| (minutes / epoch_mins) as usize;

        Ok(EpochThresholds {
            min_nrem_epochs: epochs(self.min_nrem_minutes),
            min_rem_epochs: epochs(self.min_rem_minutes),
            rem_interruption_epochs: epochs(self.rem_interruption_minutes),
            terminating_waso_epochs: epochs(self.terminating_waso_minutes),
            persistent_sleep_epochs: epochs(self.persistent_sleep_minutes),
            required_transition_epochs: self.required_transition_epochs,
            depth_window_epochs: self.depth_window_epochs,
            flanking_use_three_class: self.flanking_use_three_class,
        })
    }
}

/// Thresholds converted to whole epochs for one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochThresholds {
    pub min_nrem_epochs: usize,
    pub min_rem_epochs: usize,
    pub rem_interruption_epochs: usize,
    pub terminating_waso_epochs: usize,
    pub persistent_sleep_epochs: usize,
    pub required_transition_epochs: usize,
    pub depth_window_epochs: usize,
    pub flanking_use_three_class: bool,
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Loose yes/no parsing (case-insensitive).
#[must_use]
pub fn yes_no_loose(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str) -> HypnoError {
    HypnoError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_yes_no(key: &str, value: &str) -> HypnoResult<bool> {
    yes_no_loose(value).ok_or_else(|| invalid(key, value))
}

fn parse_minutes(key: &str, value: &str) -> HypnoResult<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite() && *m >= 0.0)
        .ok_or_else(|| invalid(key, value))
}

fn parse_count(key: &str, value: &str) -> HypnoResult<usize> {
    value.parse::<usize>().map_err(|_| invalid(key, value))
}
