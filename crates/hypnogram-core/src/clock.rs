//! Wall-clock anchors derived from the recording start time.
//!
//! Clock arithmetic wraps at 24 hours; a recording that starts at 22:00:00
//! and runs 8 hours ends at 06.00.00.

use std::fmt;

use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Time of day, in seconds past midnight (`0 <= seconds < 86400`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockTime {
    seconds: f64,
}

impl ClockTime {
    /// Build from a second count, wrapping into a single day.
    #[must_use]
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            seconds: seconds.rem_euclid(SECONDS_PER_DAY),
        }
    }

    /// Parse `hh:mm:ss`, `hh.mm.ss` or `hh:mm`, with optional fractional
    /// seconds. Minutes and whole seconds must be two digits, so decimal
    /// hours such as `7.5` are rejected rather than read as 07:05. Returns
    /// `None` for anything malformed or out of range.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (h, m, s) = if text.contains(':') {
            let mut parts = text.split(':');
            let h = parts.next()?;
            let m = parts.next()?;
            let s = parts.next().unwrap_or("00");
            if parts.next().is_some() {
                return None;
            }
            (h, m, s.to_string())
        } else {
            let parts: Vec<&str> = text.split('.').collect();
            match parts.as_slice() {
                [h, m] => (*h, *m, "00".to_string()),
                [h, m, s] => (*h, *m, (*s).to_string()),
                [h, m, s, frac] => (*h, *m, format!("{s}.{frac}")),
                _ => return None,
            }
        };

        let whole_secs = s.split('.').next().unwrap_or_default();
        let hours_ok = (1..=2).contains(&h.len()) && is_digits(h);
        if !hours_ok || !is_two_digits(m) || !is_two_digits(whole_secs) {
            return None;
        }
        let h: u32 = h.parse().ok()?;
        let m: u32 = m.parse().ok()?;
        let s: f64 = s.parse().ok()?;
        if h > 23 || m > 59 || !(0.0..60.0).contains(&s) {
            return None;
        }
        Some(Self {
            seconds: f64::from(h * 3600 + m * 60) + s,
        })
    }

    #[must_use]
    pub fn seconds(self) -> f64 {
        self.seconds
    }

    /// Decimal hours past midnight.
    #[must_use]
    pub fn hours(self) -> f64 {
        self.seconds / 3600.0
    }

    /// Advance by `minutes` (may be negative), wrapping at midnight.
    #[must_use]
    pub fn advance_minutes(self, minutes: f64) -> Self {
        Self::from_seconds(self.seconds + minutes * 60.0)
    }

    /// Halfway along the forward (wrapping) span from `self` to `later`.
    #[must_use]
    pub fn midpoint(self, later: Self) -> Self {
        let span = (later.seconds - self.seconds).rem_euclid(SECONDS_PER_DAY);
        Self::from_seconds(self.seconds + span / 2.0)
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_two_digits(text: &str) -> bool {
    text.len() == 2 && is_digits(text)
}

/// Elapsed minutes at the start of each of `epoch_count` epochs.
#[must_use]
pub fn epoch_minutes(epoch_mins: f64, epoch_count: usize) -> Vec<f64> {
    (0..epoch_count).map(|e| e as f64 * epoch_mins).collect()
}

/// Clock time at the start of each epoch, epoch 0 at `start`.
#[must_use]
pub fn epoch_clock_times(start: ClockTime, epoch_mins: f64, epoch_count: usize) -> Vec<ClockTime> {
    epoch_minutes(epoch_mins, epoch_count)
        .into_iter()
        .map(|minutes| start.advance_minutes(minutes))
        .collect()
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.seconds.floor() as u64;
        write!(
            f,
            "{:02}.{:02}.{:02}",
            whole / 3600,
            (whole / 60) % 60,
            whole % 60
        )
    }
}

/// Clock times of the night's landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockAnchors {
    pub lights_off: ClockTime,
    pub lights_on: ClockTime,
    /// Present only when the night contains sleep.
    pub sleep_onset: Option<ClockTime>,
    pub sleep_midpoint: Option<ClockTime>,
    pub final_wake: Option<ClockTime>,
}

impl ClockAnchors {
    /// Anchor the night to `start`, the clock time of epoch 0.
    #[must_use]
    pub fn compute(
        start: ClockTime,
        epoch_mins: f64,
        epoch_count: usize,
        first_sleep_epoch: Option<usize>,
        final_wake_epoch: usize,
    ) -> Self {
        let at = |epoch: usize| start.advance_minutes(epoch as f64 * epoch_mins);
        let sleep_onset = first_sleep_epoch.map(at);
        let final_wake = sleep_onset.map(|_| at(final_wake_epoch));
        let sleep_midpoint = sleep_onset.zip(final_wake).map(|(on, off)| on.midpoint(off));

        Self {
            lights_off: start,
            lights_on: at(epoch_count),
            sleep_onset,
            sleep_midpoint,
            final_wake,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(ClockTime::parse("22:30:15").unwrap().seconds(), 81_015.0);
        assert_eq!(ClockTime::parse("22.30.15").unwrap().seconds(), 81_015.0);
        assert_eq!(ClockTime::parse("07:05").unwrap().seconds(), 25_500.0);
        assert_eq!(ClockTime::parse("00:00:01.5").unwrap().seconds(), 1.5);
        assert_eq!(ClockTime::parse("00.00.01.5").unwrap().seconds(), 1.5);
        assert_eq!(ClockTime::parse("7:05").unwrap().seconds(), 25_500.0);
        assert_eq!(ClockTime::parse("07.30").unwrap().seconds(), 27_000.0);
    }

    #[test]
    fn epoch_clock_times_wrap() {
        let start = ClockTime::parse("23:59:00").unwrap();
        assert_eq!(epoch_minutes(0.5, 3), vec![0.0, 0.5, 1.0]);
        let times: Vec<String> = epoch_clock_times(start, 0.5, 4)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(times, ["23.59.00", "23.59.30", "00.00.00", "00.00.30"]);
        assert!(epoch_clock_times(start, 0.5, 0).is_empty());
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "", "24:00:00", "12:60:00", "12:00:60", "aa:bb:cc", "1:2:3:4", "12", "7.5", "7:5",
            "07:05:3", "123:00:00", " 7: 05", "+7:05",
        ] {
            assert!(ClockTime::parse(bad).is_none(), "{bad} should not parse");
        }
    }

    #[test]
    fn arithmetic_wraps_at_midnight() {
        let start = ClockTime::parse("22:00:00").unwrap();
        assert_eq!(start.advance_minutes(8.0 * 60.0).to_string(), "06.00.00");
        assert_eq!(start.advance_minutes(-30.0).to_string(), "21.30.00");
        let mid = start.midpoint(ClockTime::parse("06:00:00").unwrap());
        assert_eq!(mid.to_string(), "02.00.00");
        assert_eq!(mid.hours(), 2.0);
    }

    #[test]
    fn anchors_follow_epochs() {
        let start = ClockTime::parse("23:00:00").unwrap();
        let anchors = ClockAnchors::compute(start, 0.5, 960, Some(20), 940);
        assert_eq!(anchors.lights_off.to_string(), "23.00.00");
        assert_eq!(anchors.lights_on.to_string(), "07.00.00");
        assert_eq!(anchors.sleep_onset.unwrap().to_string(), "23.10.00");
        assert_eq!(anchors.final_wake.unwrap().to_string(), "06.50.00");
        assert_eq!(anchors.sleep_midpoint.unwrap().to_string(), "03.00.00");

        let awake = ClockAnchors::compute(start, 0.5, 20, None, 0);
        assert!(awake.sleep_onset.is_none());
        assert!(awake.sleep_midpoint.is_none());
        assert!(awake.final_wake.is_none());
    }
}
