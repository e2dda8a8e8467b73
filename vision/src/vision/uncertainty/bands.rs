use serde::{Deserialize, Serialize};

use super::mode::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandDirection {
    /// Larger values mean less confidence (entropy).
    HigherIsUncertain,
    /// Smaller values mean less confidence (variance, margin).
    LowerIsUncertain,
}

/// Threshold bands mapping a smoothed uncertainty scalar onto a [`Mode`].
///
/// The level is the number of thresholds the moving average has crossed in the
/// uncertain direction. A moving standard deviation above `volatility` escalates the
/// result by one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBands {
    pub thresholds: [f32; Mode::COUNT - 1],
    pub direction: BandDirection,
    pub volatility: f32,
}

impl ModeBands {
    pub fn entropy() -> Self {
        Self {
            thresholds: [0.25, 0.75, 1.5, 2.5],
            direction: BandDirection::HigherIsUncertain,
            volatility: 0.75,
        }
    }

    pub fn variance() -> Self {
        Self {
            thresholds: [0.08, 0.05, 0.03, 0.01],
            direction: BandDirection::LowerIsUncertain,
            volatility: 0.03,
        }
    }

    pub fn margin() -> Self {
        Self {
            thresholds: [0.8, 0.5, 0.3, 0.1],
            direction: BandDirection::LowerIsUncertain,
            volatility: 0.25,
        }
    }

    pub fn classify(&self, moving_average: f32, moving_std: f32) -> Mode {
        let crossed = self
            .thresholds
            .iter()
            .filter(|t| match self.direction {
                BandDirection::HigherIsUncertain => moving_average > **t,
                BandDirection::LowerIsUncertain => moving_average < **t,
            })
            .count();
        let mode = Mode::from_index(crossed);

        if moving_std > self.volatility {
            mode.escalated()
        } else {
            mode
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_bands_rise_with_entropy() {
        let bands = ModeBands::entropy();
        assert_eq!(bands.classify(0.0, 0.0), Mode::VeryCertain);
        assert_eq!(bands.classify(0.5, 0.0), Mode::Certain);
        assert_eq!(bands.classify(1.0, 0.0), Mode::Moderate);
        assert_eq!(bands.classify(2.0, 0.0), Mode::Uncertain);
        assert_eq!(bands.classify(3.3, 0.0), Mode::VeryUncertain);
    }

    #[test]
    fn margin_bands_fall_with_margin() {
        let bands = ModeBands::margin();
        assert_eq!(bands.classify(1.0, 0.0), Mode::VeryCertain);
        assert_eq!(bands.classify(0.0, 0.0), Mode::VeryUncertain);
    }

    #[test]
    fn volatile_history_escalates_one_level() {
        let bands = ModeBands::entropy();
        assert_eq!(bands.classify(0.5, 1.0), Mode::Moderate);
        assert_eq!(bands.classify(3.3, 1.0), Mode::VeryUncertain);
    }
}
