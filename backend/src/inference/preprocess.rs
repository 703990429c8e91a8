use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageReader};
use ndarray::Array3;

use super::config::PreprocessConfig;
use super::model::{InferenceError, PixelTensor};

/// Turns uploaded image bytes into the fixed-shape tensor the classifier expects.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn prepare(&self, image: &[u8]) -> Result<PixelTensor, InferenceError> {
        let decoded = decode(image)?;
        self.normalize(&decoded)
    }

    /// Resizes to the configured size regardless of the source aspect ratio
    /// and converts to the configured channel count.
    pub fn normalize(&self, image: &DynamicImage) -> Result<PixelTensor, InferenceError> {
        let (width, height) = (self.config.width(), self.config.height());
        let filter = self
            .config
            .filter()
            .map_err(|e| InferenceError::Preprocessing(e.to_string()))?;

        let (src_width, src_height) = image.dimensions();
        if (src_width, src_height) != (width, height) {
            log::debug!(
                "Resizing {}x{} {:?} image to {}x{}",
                src_width,
                src_height,
                image.color(),
                width,
                height
            );
        }
        let resized = image.resize_exact(width, height, filter);

        let mean = &self.config.normalization.mean;
        let std = &self.config.normalization.std;
        let (w, h) = (width as usize, height as usize);

        let pixels = match self.config.channels() {
            1 => {
                let luma = resized.to_luma8();
                Array3::from_shape_fn((1, h, w), |(_, y, x)| {
                    let v = luma.get_pixel(x as u32, y as u32)[0] as f32 / 255.0;
                    (v - mean[0]) / std[0]
                })
            }
            3 => {
                let rgb = resized.to_rgb8();
                Array3::from_shape_fn((3, h, w), |(c, y, x)| {
                    let v = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
                    (v - mean[c]) / std[c]
                })
            }
            other => {
                return Err(InferenceError::Preprocessing(format!(
                    "unsupported channel count {}",
                    other
                )));
            }
        };

        Ok(PixelTensor::new(pixels))
    }
}

/// Decodes a raster image, sniffing the format from its content.
pub fn decode(image: &[u8]) -> Result<DynamicImage, InferenceError> {
    let reader = ImageReader::new(Cursor::new(image))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    Ok(reader.decode()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inference::config::NormalizationConfig;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    pub(crate) fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn identity_normalization(channels: usize) -> NormalizationConfig {
        NormalizationConfig {
            mean: vec![0.0; channels],
            std: vec![1.0; channels],
        }
    }

    #[test]
    fn any_input_size_becomes_256_square() {
        let preprocessor = Preprocessor::new(PreprocessConfig::default());
        for (w, h) in [(64, 48), (256, 256), (300, 1024)] {
            let bytes = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(w, h)));
            let tensor = preprocessor.prepare(&bytes).unwrap();
            assert_eq!(tensor.shape(), (3, 256, 256));
        }
    }

    #[test]
    fn grayscale_xray_is_expanded_to_rgb() {
        let preprocessor = Preprocessor::new(PreprocessConfig::default());
        let gray = GrayImage::from_pixel(32, 32, Luma([128]));
        let tensor = preprocessor
            .prepare(&png_bytes(DynamicImage::ImageLuma8(gray)))
            .unwrap();
        assert_eq!(tensor.shape(), (3, 256, 256));
    }

    #[test]
    fn normalizes_per_channel() {
        let mut config = PreprocessConfig::default();
        config.image.size = vec![4, 4];
        let preprocessor = Preprocessor::new(config.clone());

        let white = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let tensor = preprocessor.normalize(&DynamicImage::ImageRgb8(white)).unwrap();
        for c in 0..3 {
            let expected = (1.0 - config.normalization.mean[c]) / config.normalization.std[c];
            assert!((tensor.pixels()[[c, 2, 1]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn channel_layout_is_channel_first() {
        let mut config = PreprocessConfig::default();
        config.image.size = vec![2, 2];
        config.normalization = identity_normalization(3);
        let preprocessor = Preprocessor::new(config);

        let red = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let tensor = preprocessor.normalize(&DynamicImage::ImageRgb8(red)).unwrap();
        assert!((tensor.pixels()[[0, 0, 0]] - 1.0).abs() < 1e-5);
        assert!(tensor.pixels()[[1, 0, 0]].abs() < 1e-5);
        assert!(tensor.pixels()[[2, 1, 1]].abs() < 1e-5);
    }

    #[test]
    fn single_channel_config_yields_luma_tensor() {
        let mut config = PreprocessConfig::default();
        config.image.size = vec![8, 16];
        config.image.channels = 1;
        config.normalization = identity_normalization(1);
        let preprocessor = Preprocessor::new(config);

        let bytes = png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            10,
            10,
            Rgb([255, 255, 255]),
        )));
        let tensor = preprocessor.prepare(&bytes).unwrap();
        assert_eq!(tensor.shape(), (1, 16, 8));
        assert!((tensor.pixels()[[0, 3, 3]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let preprocessor = Preprocessor::new(PreprocessConfig::default());
        assert!(matches!(
            preprocessor.prepare(b"definitely not an x-ray"),
            Err(InferenceError::Decode(_))
        ));
        assert!(matches!(
            preprocessor.prepare(&[]),
            Err(InferenceError::Decode(_))
        ));
    }
}
