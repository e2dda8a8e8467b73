use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::{argmax, normalise},
    vision::uncertainty::mode::{Mode, PerMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmoothingScheme {
    /// Arg-max of the weighted sum of the normalised score vectors.
    #[default]
    WeightedAverage,
    /// Each stored vector votes for its own arg-max with its weight.
    MajorityVote,
}

/// Cadence and depth of the window for one confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowShape {
    /// Every `step`-th frame is eligible for processing.
    pub step: usize,
    /// History depth, and the number of fresh samples between display updates.
    pub length: usize,
}

impl WindowShape {
    pub const fn new(step: usize, length: usize) -> Self {
        Self { step, length }
    }
}

pub type WindowTuning = PerMode<WindowShape>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub step: usize,
    pub length: usize,
    pub decay: f32,
    pub scheme: SmoothingScheme,
    /// Take step and length from `tuning` by the current mode.
    pub adaptive: bool,
    pub tuning: WindowTuning,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            step: 1,
            length: 1,
            decay: 0.2,
            scheme: SmoothingScheme::WeightedAverage,
            adaptive: false,
            tuning: [
                WindowShape::new(8, 12),
                WindowShape::new(6, 8),
                WindowShape::new(4, 6),
                WindowShape::new(2, 4),
                WindowShape::new(1, 1),
            ],
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        let shapes = std::iter::once(WindowShape::new(self.step, self.length)).chain(self.tuning);
        for shape in shapes {
            if shape.step == 0 || shape.length == 0 {
                return Err(Error::InvalidConfig(format!(
                    "window step and length must be positive, got {shape:?}"
                )));
            }
        }
        if !self.decay.is_finite() || self.decay < 0.0 {
            return Err(Error::InvalidConfig(format!("window decay must be non-negative, got {}", self.decay)));
        }

        Ok(())
    }

    pub fn tuning(&self) -> Option<&WindowTuning> {
        self.adaptive.then_some(&self.tuning)
    }
}

/// Smooths the emitted label over a short, exponentially weighted history of scores.
pub struct TemporalSmoother {
    class_count: usize,
    step: usize,
    length: usize,
    decay: f32,
    scheme: SmoothingScheme,
    /// Indexed by age, 0 is the newest sample.
    weights: Vec<f32>,
    history: VecDeque<Vec<f32>>,
    counter: usize,
    fresh_samples: usize,
    processed: bool,
    display: bool,
    label: usize,
    displayed_label: usize,
}

impl TemporalSmoother {
    pub fn new(class_count: usize, step: usize, length: usize) -> Self {
        let length = length.max(1);
        let mut smoother = Self {
            class_count,
            step: step.max(1),
            length,
            decay: 0.0,
            scheme: SmoothingScheme::default(),
            weights: Vec::new(),
            history: VecDeque::with_capacity(length),
            counter: 0,
            fresh_samples: 0,
            processed: false,
            display: false,
            label: 0,
            displayed_label: 0,
        };
        smoother.init_weights(0.2);

        smoother
    }

    pub fn from_config(class_count: usize, config: &WindowConfig) -> Self {
        let mut smoother = Self::new(class_count, config.step, config.length).with_scheme(config.scheme);
        smoother.init_weights(config.decay);

        smoother
    }

    pub fn with_scheme(mut self, scheme: SmoothingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sample weights `exp(-decay * age)` for every age the history can hold.
    pub fn init_weights(&mut self, decay: f32) {
        self.decay = decay;
        self.weights = (0..self.length).map(|age| (-decay * age as f32).exp()).collect();
    }

    pub fn update(&mut self, scores: &[f32]) {
        if self.history.len() >= self.length {
            self.history.pop_front();
        }
        self.history.push_back(normalise(scores));
    }

    /// Folds one frame into the window and returns the current label.
    ///
    /// `scores` is `None` for a skipped frame. With `tuning` the step and length follow the
    /// per-mode table, otherwise they stay as constructed.
    pub fn analysis(&mut self, scores: Option<&[f32]>, mode: Mode, tuning: Option<&WindowTuning>) -> usize {
        if let Some(tuning) = tuning {
            self.reshape(tuning[mode.index()]);
        }

        self.processed = scores.is_some();
        if let Some(scores) = scores {
            self.update(scores);
            self.fresh_samples += 1;
        }

        self.label = self.combine().unwrap_or(self.displayed_label);

        self.display = self.processed && self.fresh_samples >= self.length;
        if self.display {
            self.fresh_samples = 0;
            self.displayed_label = self.label;
        }

        self.counter = (self.counter + 1) % self.step;

        self.label
    }

    /// True when the next frame falls between two eligible steps.
    pub fn dropf(&self) -> bool {
        self.counter % self.step != 0
    }

    pub fn processf(&self) -> bool {
        self.processed
    }

    pub fn get_display_f(&self) -> bool {
        self.display
    }

    pub fn label(&self) -> usize {
        self.label
    }

    pub fn displayed_label(&self) -> usize {
        self.displayed_label
    }

    pub fn history(&self) -> &VecDeque<Vec<f32>> {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn reshape(&mut self, shape: WindowShape) {
        let step = shape.step.max(1);
        let length = shape.length.max(1);
        if step == self.step && length == self.length {
            return;
        }
        log::debug!("Window reshaped from {}x{} to {step}x{length}", self.step, self.length);

        self.step = step;
        self.counter %= step;
        if length != self.length {
            self.length = length;
            while self.history.len() > length {
                self.history.pop_front();
            }
            self.fresh_samples = self.fresh_samples.min(length);
            self.init_weights(self.decay);
        }
    }

    fn combine(&self) -> Option<usize> {
        if self.history.is_empty() || self.class_count == 0 {
            return None;
        }

        let mut totals = vec![0.0_f32; self.class_count];
        // Newest sample sits at the back and has age 0
        for (sample, weight) in self.history.iter().rev().zip(&self.weights) {
            match self.scheme {
                SmoothingScheme::WeightedAverage => {
                    for (total, score) in totals.iter_mut().zip(sample) {
                        *total += weight * score;
                    }
                }
                SmoothingScheme::MajorityVote => {
                    totals[argmax(sample).min(self.class_count - 1)] += weight;
                }
            }
        }

        Some(argmax(&totals).min(self.class_count - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(class: usize) -> Vec<f32> {
        let mut scores = vec![0.0; 4];
        scores[class] = 1.0;
        scores
    }

    #[test]
    fn history_evicts_the_oldest_sample() {
        let mut smoother = TemporalSmoother::new(4, 1, 3);
        for class in 0..4 {
            smoother.update(&one_hot(class));
        }

        assert_eq!(smoother.len(), 3);
        let front: Vec<usize> = smoother.history().iter().map(|s| argmax(s)).collect();
        assert_eq!(front, vec![1, 2, 3]);
    }

    #[test]
    fn identical_inputs_give_the_same_label() {
        let mut smoother = TemporalSmoother::new(4, 1, 3);
        let scores = [0.1, 0.7, 0.2, 0.0];
        let first = smoother.analysis(Some(&scores), Mode::VeryCertain, None);
        for _ in 0..5 {
            assert_eq!(smoother.analysis(Some(&scores), Mode::VeryCertain, None), first);
        }
        assert_eq!(first, 1);
    }

    #[test]
    fn newer_samples_outweigh_older_ones() {
        let mut smoother = TemporalSmoother::new(4, 1, 2);
        smoother.analysis(Some(&one_hot(0)), Mode::VeryCertain, None);
        assert_eq!(smoother.analysis(Some(&one_hot(3)), Mode::VeryCertain, None), 3);

        let mut voter = TemporalSmoother::new(4, 1, 3).with_scheme(SmoothingScheme::MajorityVote);
        voter.analysis(Some(&one_hot(2)), Mode::VeryCertain, None);
        voter.analysis(Some(&one_hot(2)), Mode::VeryCertain, None);
        assert_eq!(voter.analysis(Some(&one_hot(1)), Mode::VeryCertain, None), 2);
    }

    #[test]
    fn step_sets_the_processing_cadence() {
        let mut smoother = TemporalSmoother::new(4, 3, 1);
        let mut eligible = Vec::new();
        for _ in 0..6 {
            let process = !smoother.dropf();
            eligible.push(process);
            smoother.analysis(process.then_some(&one_hot(1)[..]), Mode::VeryCertain, None);
        }
        assert_eq!(eligible, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn display_waits_for_a_full_window() {
        let mut smoother = TemporalSmoother::new(4, 1, 3);
        let mut displays = Vec::new();
        for _ in 0..6 {
            smoother.analysis(Some(&one_hot(2)), Mode::VeryCertain, None);
            displays.push(smoother.get_display_f());
        }
        assert_eq!(displays, vec![false, false, true, false, false, true]);
        assert_eq!(smoother.displayed_label(), 2);
    }

    #[test]
    fn skipped_frames_keep_the_last_label() {
        let mut smoother = TemporalSmoother::new(4, 1, 1);
        smoother.analysis(Some(&one_hot(3)), Mode::VeryCertain, None);
        assert_eq!(smoother.analysis(None, Mode::VeryCertain, None), 3);
        assert!(!smoother.processf());
        assert!(!smoother.get_display_f());
    }

    #[test]
    fn adaptive_tuning_reshapes_the_window() {
        let config = WindowConfig::default();
        let mut smoother = TemporalSmoother::from_config(4, &config);
        for _ in 0..12 {
            smoother.analysis(Some(&one_hot(0)), Mode::VeryCertain, config.tuning());
        }
        assert_eq!((smoother.step(), smoother.length()), (1, 1));

        let adaptive = WindowConfig { adaptive: true, ..config };
        let mut smoother = TemporalSmoother::from_config(4, &adaptive);
        for _ in 0..12 {
            smoother.analysis(Some(&one_hot(0)), Mode::VeryCertain, adaptive.tuning());
        }
        assert_eq!((smoother.step(), smoother.length(), smoother.len()), (8, 12, 12));

        smoother.analysis(Some(&one_hot(0)), Mode::Uncertain, adaptive.tuning());
        assert_eq!((smoother.step(), smoother.length(), smoother.len()), (2, 4, 4));
    }

    #[test]
    fn zero_sized_windows_are_rejected() {
        let config = WindowConfig { length: 0, ..WindowConfig::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(WindowConfig::default().validate().is_ok());
    }
}
