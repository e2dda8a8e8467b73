use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    vision::{
        classifier::TensorConfig,
        roi::{RoiChoice, RoiConfig, RoiStrategy},
        uncertainty::{mode::PerMode, UncertaintyConfig},
        window::WindowConfig,
    },
};

pub const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum RoiPolicy {
    Fixed { strategy: RoiStrategy },
    ModeDriven { table: PerMode<RoiChoice> },
}

impl Default for RoiPolicy {
    fn default() -> Self {
        RoiPolicy::Fixed {
            strategy: RoiStrategy::FullFrame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum AdmissionPolicy {
    #[default]
    AlwaysProcess,
    /// A frame in a given mode is only processed after `skip_quota[mode]` skipped frames.
    DropFrames { skip_quota: PerMode<u32> },
}

impl AdmissionPolicy {
    pub fn drop_frames() -> Self {
        AdmissionPolicy::DropFrames {
            skip_quota: [0, 0, 0, 5, 10],
        }
    }

    /// Warns when a more uncertain mode would skip fewer frames than a more certain one.
    pub fn validate(&self) {
        if let AdmissionPolicy::DropFrames { skip_quota } = self {
            if skip_quota.windows(2).any(|w| w[0] > w[1]) {
                log::warn!("Skip quota {skip_quota:?} is not monotonic in the mode");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub class_names: Vec<String>,
    pub frame_width: i32,
    pub frame_height: i32,
    pub roi: RoiConfig,
    pub roi_policy: RoiPolicy,
    pub tensor: TensorConfig,
    pub uncertainty: UncertaintyConfig,
    pub admission: AdmissionPolicy,
    pub window: WindowConfig,
    /// Label every frame is expected to show, for accuracy reporting.
    pub expected_label: Option<usize>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            class_names: CIFAR10_CLASSES.iter().map(|c| c.to_string()).collect(),
            frame_width: 320,
            frame_height: 240,
            roi: RoiConfig::default(),
            roi_policy: RoiPolicy::default(),
            tensor: TensorConfig::default(),
            uncertainty: UncertaintyConfig::default(),
            admission: AdmissionPolicy::default(),
            window: WindowConfig::default(),
            expected_label: None,
        }
    }
}

impl VisionConfig {
    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.class_names.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_count() < 2 {
            return Err(Error::InvalidConfig(format!(
                "at least two classes are needed, got {}",
                self.class_count()
            )));
        }
        if self.frame_width <= 0 || self.frame_height <= 0 {
            return Err(Error::InvalidConfig(format!(
                "frame size must be positive, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.roi.analysis_width <= 0 || self.roi.analysis_height <= 0 {
            return Err(Error::InvalidConfig(format!(
                "analysis size must be positive, got {}x{}",
                self.roi.analysis_width, self.roi.analysis_height
            )));
        }
        if self.uncertainty.history_len == 0 {
            return Err(Error::InvalidConfig("uncertainty history must hold at least one value".into()));
        }
        if let Some(label) = self.expected_label {
            if label >= self.class_count() {
                return Err(Error::InvalidConfig(format!(
                    "expected label {label} is not one of the {} classes",
                    self.class_count()
                )));
            }
        }
        self.tensor.validate()?;
        self.window.validate()?;
        self.admission.validate();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::uncertainty::mode::Mode;

    #[test]
    fn defaults_are_valid() {
        let config = VisionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.class_count(), 10);
        assert_eq!(config.class_index("Horse"), Some(7));
    }

    #[test]
    fn default_skip_quota_grows_with_uncertainty() {
        let AdmissionPolicy::DropFrames { skip_quota } = AdmissionPolicy::drop_frames() else {
            panic!("expected a drop frames policy");
        };
        for pair in Mode::ALL.windows(2) {
            assert!(skip_quota[pair[0].index()] <= skip_quota[pair[1].index()]);
        }
    }

    #[test]
    fn single_class_is_rejected() {
        let config = VisionConfig {
            class_names: vec!["cat".into()],
            ..VisionConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
