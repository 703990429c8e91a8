use ndarray::Array3;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced no scores")]
    EmptyOutput,
    #[error("Model produced {actual} scores, expected one per label ({expected})")]
    OutputSize { expected: usize, actual: usize },
    #[error("Predicted index {index} is outside the {labels} known labels")]
    LabelOutOfRange { index: usize, labels: usize },
    #[error("Classifier backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Model(err.to_string())
    }
}

/// Channel-first `[C, H, W]` pixels, normalized and ready for the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor(Array3<f32>);

impl PixelTensor {
    pub fn new(pixels: Array3<f32>) -> Self {
        Self(pixels)
    }

    /// `(channels, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    pub fn pixels(&self) -> &Array3<f32> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub scores: Vec<f32>,
}

impl Prediction {
    pub fn from_scores(scores: Vec<f32>) -> Result<Self, InferenceError> {
        let index = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .ok_or(InferenceError::EmptyOutput)?;
        Ok(Self { index, scores })
    }
}

/// A pretrained image classifier. Implementations must be safe to call from
/// several workers at once and must not change between calls.
pub trait Classifier: Send + Sync {
    fn predict(&self, pixels: &PixelTensor) -> Result<Prediction, InferenceError>;
}

#[cfg(feature = "torch")]
pub use torch::TorchClassifier;

#[cfg(feature = "torch")]
mod torch {
    use super::{Classifier, InferenceError, PixelTensor, Prediction};
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    pub struct TorchClassifier {
        module: Mutex<CModule>,
        device: Device,
    }

    impl TorchClassifier {
        pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
            let device = Device::cuda_if_available();
            log::info!("Loading TorchScript model {} on {:?}", model_path.display(), device);
            let module = CModule::load_on_device(model_path, device)?;
            Ok(Self {
                module: Mutex::new(module),
                device,
            })
        }
    }

    impl Classifier for TorchClassifier {
        fn predict(&self, pixels: &PixelTensor) -> Result<Prediction, InferenceError> {
            let (channels, height, width) = pixels.shape();
            let contiguous = pixels.pixels().as_standard_layout();
            let data = contiguous.as_slice().ok_or_else(|| {
                InferenceError::Preprocessing("pixel buffer is not contiguous".to_string())
            })?;
            let input = Tensor::from_slice(data)
                .view([1, channels as i64, height as i64, width as i64])
                .to_device(self.device);

            let output = {
                // CModule is not Sync; the lock only serializes calls into libtorch.
                let module = self
                    .module
                    .lock()
                    .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
                tch::no_grad(|| module.forward_ts(&[input]))?
            };

            let output = output.softmax(-1, Kind::Float);
            let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
            let num_elements = output_flat.size()[0] as usize;
            let mut scores = vec![0.0f32; num_elements];
            output_flat.copy_data(&mut scores, num_elements);
            Prediction::from_scores(scores)
        }
    }
}

#[cfg(feature = "torch")]
pub fn load_classifier(model_path: &Path) -> Result<Arc<dyn Classifier>, InferenceError> {
    Ok(Arc::new(TorchClassifier::load(model_path)?))
}

#[cfg(not(feature = "torch"))]
pub fn load_classifier(model_path: &Path) -> Result<Arc<dyn Classifier>, InferenceError> {
    Err(InferenceError::BackendUnavailable(format!(
        "cannot load {}: built without the `torch` feature",
        model_path.display()
    )))
}
