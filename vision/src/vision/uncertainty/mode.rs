use serde::{Deserialize, Serialize};

/// Discrete confidence level derived from classifier uncertainty.
///
/// Ordered from most certain (cheapest to track) to least certain (most expensive to track).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    VeryCertain,
    Certain,
    Moderate,
    Uncertain,
    VeryUncertain,
}

/// A table with one entry per confidence level.
pub type PerMode<T> = [T; Mode::COUNT];

impl Mode {
    pub const COUNT: usize = 5;

    pub const ALL: PerMode<Mode> = [
        Mode::VeryCertain,
        Mode::Certain,
        Mode::Moderate,
        Mode::Uncertain,
        Mode::VeryUncertain,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range levels clamp to the least certain one.
    pub fn from_index(index: usize) -> Mode {
        match Self::ALL.get(index) {
            Some(mode) => *mode,
            None => {
                log::warn!("Mode {index} is out of range, clamping to {:?}", Mode::VeryUncertain);
                Mode::VeryUncertain
            }
        }
    }

    pub fn escalated(self) -> Mode {
        Self::ALL[(self.index() + 1).min(Self::COUNT - 1)]
    }
}
