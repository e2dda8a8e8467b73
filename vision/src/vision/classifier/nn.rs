use std::path::Path;

use anyhow::{ensure, Context};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder, VarMap};

use super::{Classifier, ClassifierCapacity};

/// Two layer perceptron running on the CPU.
pub struct CandleClassifier {
    hidden: Linear,
    output: Linear,
    // Owns the tensors the layers were built from
    varmap: VarMap,
    device: Device,
    input_dim: usize,
    class_count: usize,
}

impl CandleClassifier {
    /// Builds the network and fills it from a safetensors file with layers named `0` and `2`.
    pub fn load(path: impl AsRef<Path>, input_dim: usize, hidden_dim: usize, class_count: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut classifier = Self::with_random_weights(input_dim, hidden_dim, class_count)?;
        classifier
            .varmap
            .load(path)
            .with_context(|| format!("Failed to load classifier weights from {}", path.display()))?;
        log::info!("Loaded classifier weights from {}", path.display());

        Ok(classifier)
    }

    pub fn with_random_weights(input_dim: usize, hidden_dim: usize, class_count: usize) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let hidden = candle_nn::linear(input_dim, hidden_dim, vs.pp("0"))?;
        let output = candle_nn::linear(hidden_dim, class_count, vs.pp("2"))?;

        Ok(Self {
            hidden,
            output,
            varmap,
            device,
            input_dim,
            class_count,
        })
    }
}

impl Classifier for CandleClassifier {
    fn capacity(&self) -> ClassifierCapacity {
        ClassifierCapacity {
            input_len: self.input_dim,
            output_len: self.class_count,
        }
    }

    fn classify(&mut self, tensor: &[f32]) -> anyhow::Result<Vec<f32>> {
        ensure!(
            tensor.len() == self.input_dim,
            "Classifier expects {} inputs, got {}",
            self.input_dim,
            tensor.len()
        );

        let input = Tensor::from_slice(tensor, tensor.len(), &self.device)?.unsqueeze(0)?;
        let hidden = self.hidden.forward(&input)?.relu()?;
        let scores = self.output.forward(&hidden)?.squeeze(0)?.to_vec1::<f32>()?;

        Ok(scores)
    }
}
