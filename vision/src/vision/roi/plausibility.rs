use nalgebra::{DMatrix, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::utils::{entropy, normalise};

/// How much a flow-derived region looks like one coherent moving object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Plausibility {
    #[default]
    NotCertain,
    Certain,
    VeryCertain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityConfig {
    pub samples: usize,
    /// The sampler is reseeded on every check so identical motion gives identical verdicts.
    pub seed: u64,
    pub max_hue_entropy: f32,
    pub max_value_entropy: f32,
}

impl Default for PlausibilityConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            seed: 11,
            max_hue_entropy: 0.5,
            max_value_entropy: 1.0,
        }
    }
}

/// Samples pixels of a rendered motion map (HSV triples) around the centre of `region`.
///
/// A single moving object shows up as a cluster of similar colour, noise as random
/// colours, so low hue entropy among the samples is taken as evidence of real motion.
pub fn check(hsv: &DMatrix<Vector3<u8>>, region: &Region, config: &PlausibilityConfig) -> Plausibility {
    let quarter_w = region.width() / 4;
    let quarter_h = region.height() / 4;
    if quarter_w <= 0 || quarter_h <= 0 || config.samples == 0 {
        return Plausibility::NotCertain;
    }

    let centre = region.center();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut hues = Vec::with_capacity(config.samples);
    let mut values = Vec::with_capacity(config.samples);
    let mut sign = 1;

    for _ in 0..config.samples {
        let x = centre.x + sign * rng.gen_range(0..quarter_w);
        let y = centre.y + sign * rng.gen_range(0..quarter_h);
        // Regions come from the analysis frame, but a stale one may not fit this map
        let Some(pixel) = hsv.get((y.max(0) as usize, x.max(0) as usize)) else {
            log::debug!("Plausibility sample ({x}, {y}) is outside the motion map");
            return Plausibility::NotCertain;
        };
        hues.push(pixel.x as f32);
        values.push(pixel.z as f32);
        sign = -sign;
    }

    let hue_entropy = entropy(&normalise(&hues));
    let value_entropy = entropy(&normalise(&values));
    log::debug!("Motion plausibility: hue entropy {hue_entropy:.3}, value entropy {value_entropy:.3}");

    if hue_entropy <= config.max_hue_entropy && value_entropy <= config.max_value_entropy {
        Plausibility::VeryCertain
    } else if hue_entropy <= config.max_hue_entropy {
        Plausibility::Certain
    } else {
        Plausibility::NotCertain
    }
}
