use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use opencv::{
    core::Mat,
    imgcodecs::{self, IMREAD_COLOR},
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use vision::{Frame, FrameSource};

pub struct CameraSource {
    capture: VideoCapture,
}

impl CameraSource {
    pub fn open(index: i32, width: i32, height: i32) -> anyhow::Result<Self> {
        let mut capture = VideoCapture::new(index, CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("Failed to open camera {index}");
        }
        capture.set(CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(CAP_PROP_FRAME_HEIGHT, height as f64)?;
        log::info!("Opened camera {index} at {width}x{height}");

        Ok(Self { capture })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let mut image = Mat::default();
        if !self.capture.read(&mut image)? || image.empty() {
            log::info!("Camera stream ended");
            return Ok(None);
        }

        Ok(Some(Frame::new(image)))
    }
}

/// Reads still images in file name order. The expected label comes from the
/// file name suffix after the last `_`, e.g. `0042_horse.png`.
pub struct ImageFolderSource {
    paths: VecDeque<PathBuf>,
    class_names: Vec<String>,
}

impl ImageFolderSource {
    pub fn open(dir: &Path, class_names: &[String]) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"));
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            bail!("No images found in {}", dir.display());
        }
        log::info!("Found {} images in {}", paths.len(), dir.display());

        Ok(Self {
            paths: paths.into(),
            class_names: class_names.to_vec(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageFolderSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let path_str = path.to_str().with_context(|| format!("Non UTF-8 path {}", path.display()))?;
        let image = imgcodecs::imread(path_str, IMREAD_COLOR)?;
        if image.empty() {
            bail!("Failed to decode {}", path.display());
        }

        Ok(Some(Frame::with_label(image, label_from_path(&path, &self.class_names))))
    }
}

pub fn label_from_path(path: &Path, class_names: &[String]) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let (_, suffix) = stem.rsplit_once('_')?;
    class_names.iter().position(|c| c.eq_ignore_ascii_case(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vision::CIFAR10_CLASSES.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn label_is_parsed_from_the_suffix() {
        assert_eq!(label_from_path(Path::new("frames/0001_horse.png"), &classes()), Some(7));
        assert_eq!(label_from_path(Path::new("set_2/0001_a_Ship.jpg"), &classes()), Some(8));
        assert_eq!(label_from_path(Path::new("frames/0001.png"), &classes()), None);
        assert_eq!(label_from_path(Path::new("frames/0001_unicorn.png"), &classes()), None);
    }

    #[test]
    fn missing_folder_fails_to_open() {
        assert!(ImageFolderSource::open(Path::new("no/such/folder"), &classes()).is_err());
    }
}
