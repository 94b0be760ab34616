// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Learned perceptual distance (LPIPS).
//
// The network is an `.rten` model with two image inputs, each shaped
// `[1, 3, H, W]` with channels normalised to [-1, 1], and a single scalar
// distance output. Inference runs via `rten` behind the `lpips` feature gate.
// Without the feature, or without a model, LPIPS is simply never measured.

use std::path::Path;

use image::RgbImage;
#[cfg(feature = "lpips")]
use tracing::info;
use tracing::warn;

/// Longest image side fed to the network; larger pages are downscaled.
#[cfg_attr(not(feature = "lpips"), allow(dead_code))]
const MAX_SIDE: u32 = 512;

/// Whether this build can run LPIPS at all.
pub const fn compiled_in() -> bool {
    cfg!(feature = "lpips")
}

/// A loaded LPIPS network.
pub struct LpipsModel {
    #[cfg(feature = "lpips")]
    model: rten::Model,
}

impl std::fmt::Debug for LpipsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpipsModel").finish_non_exhaustive()
    }
}

impl LpipsModel {
    /// Load the model at `path`. Any failure leaves LPIPS unavailable.
    #[cfg(feature = "lpips")]
    pub fn load(path: &Path) -> Option<Self> {
        match rten::Model::load_file(path) {
            Ok(model) if model.input_ids().len() >= 2 && !model.output_ids().is_empty() => {
                info!(path = %path.display(), "LPIPS model loaded");
                Some(Self { model })
            }
            Ok(_) => {
                warn!(path = %path.display(), "LPIPS model must take two inputs and one output");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to load LPIPS model");
                None
            }
        }
    }

    #[cfg(not(feature = "lpips"))]
    pub fn load(path: &Path) -> Option<Self> {
        warn!(
            path = %path.display(),
            "LPIPS model configured but this build lacks the `lpips` feature"
        );
        None
    }

    /// Perceptual distance between two equally sized pages; lower is closer.
    #[cfg(feature = "lpips")]
    pub fn distance(&self, a: &RgbImage, b: &RgbImage) -> Option<f64> {
        use rten_tensor::prelude::*;

        let a = normalised_tensor(&fit(a));
        let b = normalised_tensor(&fit(b));
        let inputs = self.model.input_ids();
        let output = *self.model.output_ids().first()?;

        let result = self.model.run(
            vec![(inputs[0], a.view().into()), (inputs[1], b.view().into())],
            &[output],
            None,
        );
        let value = match result {
            Ok(mut outputs) if !outputs.is_empty() => outputs.remove(0),
            Ok(_) => return None,
            Err(err) => {
                warn!(%err, "LPIPS inference failed");
                return None;
            }
        };
        let tensor = value.into_tensor::<f32>()?;
        tensor.iter().next().map(|v| *v as f64)
    }

    #[cfg(not(feature = "lpips"))]
    pub fn distance(&self, _a: &RgbImage, _b: &RgbImage) -> Option<f64> {
        None
    }
}

/// Downscale so the longest side is at most [`MAX_SIDE`].
#[cfg_attr(not(feature = "lpips"), allow(dead_code))]
fn fit(image: &RgbImage) -> RgbImage {
    let longest = image.width().max(image.height());
    if longest <= MAX_SIDE {
        return image.clone();
    }
    let scale = MAX_SIDE as f64 / longest as f64;
    let width = ((image.width() as f64 * scale).round() as u32).max(1);
    let height = ((image.height() as f64 * scale).round() as u32).max(1);
    image::imageops::resize(image, width, height, image::imageops::FilterType::Triangle)
}

/// Planar CHW values in [-1, 1].
#[cfg_attr(not(feature = "lpips"), allow(dead_code))]
fn normalised_planes(image: &RgbImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0f32; plane * 3];
    for (x, y, pixel) in image.enumerate_pixels() {
        let idx = (y * width + x) as usize;
        for channel in 0..3 {
            data[channel * plane + idx] = pixel.0[channel] as f32 / 127.5 - 1.0;
        }
    }
    data
}

#[cfg(feature = "lpips")]
fn normalised_tensor(image: &RgbImage) -> rten_tensor::NdTensor<f32, 4> {
    let (width, height) = image.dimensions();
    rten_tensor::NdTensor::from_data(
        [1, 3, height as usize, width as usize],
        normalised_planes(image),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn planes_are_normalised_channel_first() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 255, 0]) } else { Rgb([255, 0, 255]) });
        let data = normalised_planes(&img);
        assert_eq!(data, vec![-1.0, 1.0, 1.0, -1.0, -1.0, 1.0]);
    }

    #[test]
    fn large_pages_are_downscaled() {
        let img = RgbImage::new(2048, 1024);
        let fitted = fit(&img);
        assert_eq!(fitted.dimensions(), (512, 256));
    }

    #[test]
    fn missing_model_is_unavailable() {
        assert!(LpipsModel::load(Path::new("/nonexistent/lpips.rten")).is_none());
    }
}
