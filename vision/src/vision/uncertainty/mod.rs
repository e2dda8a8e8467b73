pub mod bands;
pub mod mode;

use std::{collections::VecDeque, fmt};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::{argmax, entropy, mean_and_std, normalise},
};
use bands::ModeBands;
use mode::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UncertaintyScheme {
    #[default]
    Entropy,
    Variance,
    Margin,
    None,
}

impl UncertaintyScheme {
    /// Unknown names fall back to [`UncertaintyScheme::None`] so a typo never stops the loop.
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "entropy" | "en" => Self::Entropy,
            "variance" | "var" => Self::Variance,
            "margin" | "a" => Self::Margin,
            "none" | "na" => Self::None,
            other => {
                log::warn!("Unknown uncertainty scheme '{other}', falling back to none");
                Self::None
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Entropy => "entropy",
            Self::Variance => "variance",
            Self::Margin => "margin",
            Self::None => "none",
        }
    }
}

impl From<String> for UncertaintyScheme {
    fn from(name: String) -> Self {
        Self::parse_lenient(&name)
    }
}

impl From<UncertaintyScheme> for String {
    fn from(scheme: UncertaintyScheme) -> Self {
        scheme.name().to_string()
    }
}

impl fmt::Display for UncertaintyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    pub scheme: UncertaintyScheme,
    /// How many evaluations the moving statistics cover.
    pub history_len: usize,
    /// Sharpness of the softmax used by the entropy scheme.
    pub softmax_gain: f32,
    pub entropy_bands: ModeBands,
    pub variance_bands: ModeBands,
    pub margin_bands: ModeBands,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            scheme: UncertaintyScheme::Entropy,
            history_len: 5,
            softmax_gain: 10.0,
            entropy_bands: ModeBands::entropy(),
            variance_bands: ModeBands::variance(),
            margin_bands: ModeBands::margin(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyReport {
    /// Entropy, variance or margin depending on the scheme.
    pub primary: f32,
    /// Gap between the two best normalised scores.
    pub spread: f32,
    pub moving_average: f32,
    pub moving_std: f32,
    pub mode: Mode,
}

pub struct UncertaintyEstimator {
    config: UncertaintyConfig,
    class_count: usize,
    history: VecDeque<f32>,
}

impl UncertaintyEstimator {
    pub fn new(config: UncertaintyConfig, class_count: usize) -> Self {
        let history_len = config.history_len.max(1);
        Self {
            config,
            class_count,
            history: VecDeque::with_capacity(history_len),
        }
    }

    pub fn scheme(&self) -> UncertaintyScheme {
        self.config.scheme
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn evaluate(
        &mut self,
        scores: &[f32],
        scheme: UncertaintyScheme,
        predicted_class: usize,
    ) -> Result<UncertaintyReport> {
        if scores.len() != self.class_count {
            return Err(Error::InvalidInput(format!(
                "expected {} class scores, got {}",
                self.class_count,
                scores.len()
            )));
        }
        if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
            return Err(Error::InvalidInput(format!("score {i} is not finite ({})", scores[i])));
        }

        let normalised = normalise(scores);
        let spread = top_two_gap(&normalised);

        let primary = match scheme {
            UncertaintyScheme::Entropy => softmax_entropy(&normalised, self.config.softmax_gain),
            UncertaintyScheme::Variance => sample_variance(&normalised),
            UncertaintyScheme::Margin => margin_of(&normalised, predicted_class),
            UncertaintyScheme::None => 0.0,
        };

        if self.history.len() >= self.config.history_len.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(primary);
        let (moving_average, moving_std) = mean_and_std(self.history.iter().copied());

        let mode = match scheme {
            UncertaintyScheme::Entropy => self.config.entropy_bands.classify(moving_average, moving_std),
            UncertaintyScheme::Variance => self.config.variance_bands.classify(moving_average, moving_std),
            UncertaintyScheme::Margin => self.config.margin_bands.classify(moving_average, moving_std),
            UncertaintyScheme::None => Mode::VeryCertain,
        };
        log::debug!("{scheme} uncertainty {primary:.4} (ma {moving_average:.4}, sd {moving_std:.4}) -> {mode:?}");

        Ok(UncertaintyReport {
            primary,
            spread,
            moving_average,
            moving_std,
            mode,
        })
    }
}

fn softmax_entropy(normalised: &[f32], gain: f32) -> f32 {
    // Shifting by the max leaves the distribution unchanged and keeps exp() finite.
    let peak = normalised.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let weights = normalised.iter().map(|v| (gain * (v - peak)).exp()).collect_vec();
    let sum: f32 = weights.iter().sum();
    let probabilities = weights.iter().map(|w| w / sum).collect_vec();

    entropy(&probabilities)
}

fn sample_variance(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / (values.len() - 1) as f32
}

fn top_two_gap(values: &[f32]) -> f32 {
    match values.iter().sorted_by(|a, b| b.total_cmp(a)).take(2).collect_tuple() {
        Some((best, second)) => best - second,
        None => 0.0,
    }
}

fn margin_of(values: &[f32], predicted_class: usize) -> f32 {
    let predicted = if predicted_class < values.len() {
        predicted_class
    } else {
        log::warn!("Predicted class {predicted_class} is out of range, using the best score instead");
        argmax(values)
    };
    let best_other = values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != predicted)
        .map(|(_, v)| *v)
        .fold(f32::NEG_INFINITY, f32::max);

    if best_other.is_finite() {
        values[predicted] - best_other
    } else {
        values[predicted]
    }
}
