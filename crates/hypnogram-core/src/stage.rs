//! Sleep stage labels and classification predicates.
//!
//! Every behavioral decision in the engine goes through the predicates here
//! rather than through enum ordinals. The two collapsing policies (deep NREM
//! merge and the NREM/REM/Wake three-class view) are explicit functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HypnoError, HypnoResult};

/// One stage label per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageLabel {
    Wake,
    Nrem1,
    Nrem2,
    Nrem3,
    /// Legacy fourth NREM depth.
    Nrem4,
    Rem,
    /// Outside the lights-out window (before lights off or after lights on).
    LightsOn,
    /// Unknown, unscored, movement or artifact.
    Absent,
}

/// Three-class collapse of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageClass {
    Nrem,
    Rem,
    Wake,
    /// LightsOn or Absent.
    Other,
}

impl StageLabel {
    /// All labels, in display order.
    pub const ALL: [StageLabel; 8] = [
        StageLabel::Wake,
        StageLabel::Nrem1,
        StageLabel::Nrem2,
        StageLabel::Nrem3,
        StageLabel::Nrem4,
        StageLabel::Rem,
        StageLabel::LightsOn,
        StageLabel::Absent,
    ];

    #[must_use]
    pub const fn is_sleep(self) -> bool {
        matches!(
            self,
            Self::Nrem1 | Self::Nrem2 | Self::Nrem3 | Self::Nrem4 | Self::Rem
        )
    }

    #[must_use]
    pub const fn is_wake(self) -> bool {
        matches!(self, Self::Wake)
    }

    #[must_use]
    pub const fn is_rem(self) -> bool {
        matches!(self, Self::Rem)
    }

    #[must_use]
    pub const fn is_nrem(self) -> bool {
        matches!(self, Self::Nrem1 | Self::Nrem2 | Self::Nrem3 | Self::Nrem4)
    }

    #[must_use]
    pub const fn is_nrem1(self) -> bool {
        matches!(self, Self::Nrem1)
    }

    /// N2, N3 or N4: the stages that keep a NREM period alive.
    #[must_use]
    pub const fn is_nrem234(self) -> bool {
        matches!(self, Self::Nrem2 | Self::Nrem3 | Self::Nrem4)
    }

    /// N3 or N4.
    #[must_use]
    pub const fn is_deep(self) -> bool {
        matches!(self, Self::Nrem3 | Self::Nrem4)
    }

    /// N1, Wake or REM: the "light" side of the depth trajectory.
    #[must_use]
    pub const fn is_light(self) -> bool {
        matches!(self, Self::Nrem1 | Self::Wake | Self::Rem)
    }

    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub const fn is_lights_on(self) -> bool {
        matches!(self, Self::LightsOn)
    }

    #[must_use]
    pub const fn is_wake_or_lights(self) -> bool {
        matches!(self, Self::Wake | Self::LightsOn)
    }

    /// Three-class collapse (all NREM depths merge).
    #[must_use]
    pub const fn class(self) -> StageClass {
        match self {
            Self::Nrem1 | Self::Nrem2 | Self::Nrem3 | Self::Nrem4 => StageClass::Nrem,
            Self::Rem => StageClass::Rem,
            Self::Wake => StageClass::Wake,
            Self::LightsOn | Self::Absent => StageClass::Other,
        }
    }

    /// Merge N4 into N3; every other label is unchanged.
    #[must_use]
    pub const fn collapse_deep(self) -> Self {
        match self {
            Self::Nrem4 => Self::Nrem3,
            other => other,
        }
    }

    /// Canonical single-token form.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Wake => "W",
            Self::Nrem1 => "N1",
            Self::Nrem2 => "N2",
            Self::Nrem3 => "N3",
            Self::Nrem4 => "N4",
            Self::Rem => "R",
            Self::LightsOn => "L",
            Self::Absent => "?",
        }
    }

    /// Numeric plotting code: W=1, R=0, N1..N4 = -1..-4, anything else 2.
    #[must_use]
    pub const fn plot_code(self, collapse_deep: bool) -> i8 {
        match self {
            Self::Wake => 1,
            Self::Rem => 0,
            Self::Nrem1 => -1,
            Self::Nrem2 => -2,
            Self::Nrem3 => -3,
            Self::Nrem4 => {
                if collapse_deep {
                    -3
                } else {
                    -4
                }
            }
            Self::LightsOn | Self::Absent => 2,
        }
    }
}

/// True if both labels are identical or both are NREM of any depth.
#[must_use]
pub fn same_three_class(a: StageLabel, b: StageLabel) -> bool {
    a == b || (a.is_nrem() && b.is_nrem())
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for StageLabel {
    type Err = HypnoError;

    fn from_str(s: &str) -> HypnoResult<Self> {
        let label = match s.trim().to_ascii_lowercase().as_str() {
            "w" | "wake" => Self::Wake,
            "n1" | "nrem1" => Self::Nrem1,
            "n2" | "nrem2" => Self::Nrem2,
            "n3" | "nrem3" => Self::Nrem3,
            "n4" | "nrem4" => Self::Nrem4,
            "r" | "rem" => Self::Rem,
            "l" | "lights" => Self::LightsOn,
            "?" | "u" | "m" | "unknown" | "unscored" | "movement" | "artifact" => Self::Absent,
            _ => return Err(HypnoError::UnknownStage(s.to_string())),
        };
        Ok(label)
    }
}

/// Parse whitespace-separated stage tokens (one per epoch).
pub fn parse_stage_tokens(text: &str) -> HypnoResult<Vec<StageLabel>> {
    text.split_whitespace().map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_predicates_partition_labels() {
        for label in StageLabel::ALL {
            let kinds = [
                label.is_sleep(),
                label.is_wake(),
                label.is_lights_on(),
                label.is_absent(),
            ];
            assert_eq!(
                kinds.iter().filter(|&&k| k).count(),
                1,
                "{label} should fall in exactly one coarse category"
            );
        }
    }

    #[test]
    fn three_class_collapse() {
        assert!(same_three_class(StageLabel::Nrem1, StageLabel::Nrem3));
        assert!(same_three_class(StageLabel::Rem, StageLabel::Rem));
        assert!(same_three_class(StageLabel::LightsOn, StageLabel::LightsOn));
        assert!(!same_three_class(StageLabel::Nrem2, StageLabel::Rem));
        assert!(!same_three_class(StageLabel::LightsOn, StageLabel::Absent));
        assert_eq!(StageLabel::Nrem4.class(), StageClass::Nrem);
        assert_eq!(StageLabel::Absent.class(), StageClass::Other);
    }

    #[test]
    fn collapse_deep_only_touches_n4() {
        assert_eq!(StageLabel::Nrem4.collapse_deep(), StageLabel::Nrem3);
        assert_eq!(StageLabel::Nrem2.collapse_deep(), StageLabel::Nrem2);
        assert_eq!(StageLabel::Nrem4.plot_code(true), -3);
        assert_eq!(StageLabel::Nrem4.plot_code(false), -4);
    }

    #[test]
    fn parse_tokens() {
        let stages = parse_stage_tokens("W N1 n2 N3 NREM4 R L ? M\n").unwrap();
        assert_eq!(
            stages,
            vec![
                StageLabel::Wake,
                StageLabel::Nrem1,
                StageLabel::Nrem2,
                StageLabel::Nrem3,
                StageLabel::Nrem4,
                StageLabel::Rem,
                StageLabel::LightsOn,
                StageLabel::Absent,
                StageLabel::Absent,
            ]
        );
        assert_eq!(
            parse_stage_tokens("W X"),
            Err(HypnoError::UnknownStage("X".to_string()))
        );
    }

    #[test]
    fn display_roundtrips_canonical_tokens() {
        for label in StageLabel::ALL {
            assert_eq!(label.token().parse::<StageLabel>().unwrap(), label);
        }
    }
}
