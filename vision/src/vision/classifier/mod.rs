pub mod nn;
pub mod utils;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use nn::CandleClassifier;

/// Largest input tensor and score vector a classifier engine can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierCapacity {
    pub input_len: usize,
    pub output_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorConfig {
    pub width: i32,
    pub height: i32,
    /// Pixel value 0 maps to `scale_min`, 255 to `scale_max`.
    pub scale_min: f32,
    pub scale_max: f32,
}

impl Default for TensorConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            scale_min: -1.0,
            scale_max: 1.0,
        }
    }
}

impl TensorConfig {
    /// Channel interleaved BGR
    pub fn len(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize * 3
    }

    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::InvalidConfig(format!(
                "tensor size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.scale_min < self.scale_max) {
            return Err(Error::InvalidConfig(format!(
                "tensor scale range [{}, {}] is empty",
                self.scale_min, self.scale_max
            )));
        }

        Ok(())
    }
}

pub trait Classifier: Send {
    fn capacity(&self) -> ClassifierCapacity;

    /// Scores for every class, in label order.
    fn classify(&mut self, tensor: &[f32]) -> anyhow::Result<Vec<f32>>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn capacity(&self) -> ClassifierCapacity {
        (**self).capacity()
    }

    fn classify(&mut self, tensor: &[f32]) -> anyhow::Result<Vec<f32>> {
        (**self).classify(tensor)
    }
}

pub fn check_capacity(capacity: ClassifierCapacity, tensor: &TensorConfig, class_count: usize) -> Result<()> {
    if tensor.len() > capacity.input_len {
        return Err(Error::CapacityExceeded {
            what: "input tensor",
            required: tensor.len(),
            available: capacity.input_len,
        });
    }
    if class_count > capacity.output_len {
        return Err(Error::CapacityExceeded {
            what: "class scores",
            required: class_count,
            available: capacity.output_len,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_must_cover_tensor_and_classes() {
        let tensor = TensorConfig::default();
        let capacity = ClassifierCapacity {
            input_len: 32 * 32 * 3,
            output_len: 10,
        };
        assert!(check_capacity(capacity, &tensor, 10).is_ok());

        let err = check_capacity(capacity, &tensor, 12).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { required: 12, available: 10, .. }));

        let small = ClassifierCapacity {
            input_len: 16 * 16 * 3,
            ..capacity
        };
        assert!(matches!(
            check_capacity(small, &tensor, 10),
            Err(Error::CapacityExceeded { what: "input tensor", .. })
        ));
    }

    #[test]
    fn empty_tensors_are_invalid() {
        let tensor = TensorConfig {
            width: 0,
            ..TensorConfig::default()
        };
        assert!(matches!(tensor.validate(), Err(Error::InvalidConfig(_))));
    }
}
