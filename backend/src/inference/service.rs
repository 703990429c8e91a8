use std::sync::Arc;

use shared::Label;

use super::model::{Classifier, InferenceError};
use super::preprocess::Preprocessor;

/// Decode, classify and label one uploaded image.
#[derive(Clone)]
pub struct InferenceService {
    classifier: Arc<dyn Classifier>,
    preprocessor: Preprocessor,
}

impl InferenceService {
    pub fn new(classifier: Arc<dyn Classifier>, preprocessor: Preprocessor) -> Self {
        Self {
            classifier,
            preprocessor,
        }
    }

    pub fn classify(&self, image: &[u8]) -> Result<Label, InferenceError> {
        let pixels = self.preprocessor.prepare(image)?;
        let prediction = self.classifier.predict(&pixels)?;
        log::debug!("Classifier scores: {:?}", prediction.scores);

        if prediction.scores.len() != Label::count() {
            return Err(InferenceError::OutputSize {
                expected: Label::count(),
                actual: prediction.scores.len(),
            });
        }
        Label::from_index(prediction.index).ok_or(InferenceError::LabelOutOfRange {
            index: prediction.index,
            labels: Label::count(),
        })
    }
}
