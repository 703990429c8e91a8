use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessConfigError {
    #[error("Failed to read preprocessing config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse preprocessing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid preprocessing config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub image: ImageConfig,
    pub normalization: NormalizationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub channels: u32,
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub resize_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image: ImageConfig {
                size: vec![256, 256],
                channels: 3,
                preprocessing: PreprocessingConfig {
                    resize_method: "bilinear".to_string(),
                },
            },
            // ImageNet statistics, what the pretrained backbone was normalized with.
            normalization: NormalizationConfig {
                mean: vec![0.485, 0.456, 0.406],
                std: vec![0.229, 0.224, 0.225],
            },
        }
    }
}

impl PreprocessConfig {
    pub fn load(path: &Path) -> Result<Self, PreprocessConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, PreprocessConfigError> {
        let config: PreprocessConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PreprocessConfigError> {
        match self.image.size.as_slice() {
            [w, h] if *w > 0 && *h > 0 => {}
            other => {
                return Err(PreprocessConfigError::Invalid(format!(
                    "image.size must be [width, height] with non-zero entries, got {:?}",
                    other
                )));
            }
        }
        if !matches!(self.image.channels, 1 | 3) {
            return Err(PreprocessConfigError::Invalid(format!(
                "image.channels must be 1 or 3, got {}",
                self.image.channels
            )));
        }
        let channels = self.image.channels as usize;
        if self.normalization.mean.len() != channels || self.normalization.std.len() != channels {
            return Err(PreprocessConfigError::Invalid(format!(
                "normalization.mean and normalization.std need {} entries",
                channels
            )));
        }
        if self.normalization.std.iter().any(|s| *s == 0.0) {
            return Err(PreprocessConfigError::Invalid(
                "normalization.std entries must be non-zero".to_string(),
            ));
        }
        self.filter()?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.image.size[0]
    }

    pub fn height(&self) -> u32 {
        self.image.size[1]
    }

    pub fn channels(&self) -> usize {
        self.image.channels as usize
    }

    pub fn filter(&self) -> Result<FilterType, PreprocessConfigError> {
        match self.image.preprocessing.resize_method.to_ascii_lowercase().as_str() {
            "nearest" => Ok(FilterType::Nearest),
            "triangle" | "bilinear" => Ok(FilterType::Triangle),
            "catmullrom" | "bicubic" => Ok(FilterType::CatmullRom),
            "gaussian" => Ok(FilterType::Gaussian),
            "lanczos3" | "lanczos" => Ok(FilterType::Lanczos3),
            other => Err(PreprocessConfigError::Invalid(format!(
                "unknown resize_method {:?}",
                other
            ))),
        }
    }
}
