use std::{fs, path::{Path, PathBuf}};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vision::VisionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum SourceConfig {
    Camera { index: i32, width: i32, height: i32 },
    /// Every png/jpg in `dir`, in file name order.
    Images { dir: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Camera {
            index: 0,
            width: 320,
            height: 240,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub vision: VisionConfig,
    pub source: SourceConfig,
    pub weights: PathBuf,
    pub hidden_dim: usize,
    pub report_path: PathBuf,
    pub frame_limit: Option<usize>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            vision: VisionConfig::default(),
            source: SourceConfig::default(),
            weights: PathBuf::from("vision.safetensors"),
            hidden_dim: 64,
            report_path: PathBuf::from("result.csv"),
            frame_limit: None,
        }
    }
}

impl ModuleConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use vision::{AdmissionPolicy, UncertaintyScheme};

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ModuleConfig = serde_json::from_str(
            r#"{
                "source": { "kind": "images", "dir": "frames" },
                "frame_limit": 500,
                "vision": {
                    "uncertainty": { "scheme": "var" },
                    "admission": { "kind": "drop-frames", "skip_quota": [0, 1, 2, 3, 4] }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.source, SourceConfig::Images { dir: PathBuf::from("frames") });
        assert_eq!(config.frame_limit, Some(500));
        assert_eq!(config.vision.uncertainty.scheme, UncertaintyScheme::Variance);
        assert_eq!(config.vision.uncertainty.history_len, 5);
        assert_eq!(
            config.vision.admission,
            AdmissionPolicy::DropFrames {
                skip_quota: [0, 1, 2, 3, 4]
            }
        );
        assert_eq!(config.weights, PathBuf::from("vision.safetensors"));
    }

    #[test]
    fn unknown_scheme_becomes_none() {
        let config: ModuleConfig = serde_json::from_str(r#"{ "vision": { "uncertainty": { "scheme": "confidence" } } }"#).unwrap();
        assert_eq!(config.vision.uncertainty.scheme, UncertaintyScheme::None);
    }
}
