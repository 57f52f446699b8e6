/// Multi scale detection: the image is resized to the size of every
/// pyramid level and every level is processed on its own.

use std::time::Instant;
use image::DynamicImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use errors::*;
use features::FeatureExtractor;
use types::{AccumulatorImage, ColorImage, new_accumulators};
use super::houghforest::Forest;
use super::prediction::HoughDetector;

/// The accumulators of a single scale. The image is resized to the
/// size of these accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidLevel {
    pub accumulators: Vec<AccumulatorImage>,
}

impl PyramidLevel {
    /// Creates a level of the size `width`x`height` with `count` zeroed accumulators.
    pub fn new(width: u32, height: u32, count: usize) -> PyramidLevel {
        PyramidLevel { accumulators: new_accumulators(width, height, count) }
    }

    /// Creates the levels for the given scales of an image of the size `width`x`height`.
    pub fn for_scales(width: u32, height: u32, scales: &[f32], count: usize) -> Vec<PyramidLevel> {
        scales.iter()
            .map(|&s| {
                PyramidLevel::new((width as f32 * s) as u32,
                                  (height as f32 * s) as u32,
                                  count)
            })
            .collect()
    }

    /// Size of the level, given by the first accumulator
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.accumulators.first().map(|acc| acc.dimensions())
    }
}

impl<F, E> HoughDetector<F, E>
    where F: Forest,
          E: FeatureExtractor
{
    /// Detect objects at every pyramid level.
    ///
    /// Only colour images are supported. A grayscale image is rejected
    /// before any accumulator is touched.
    ///
    /// # Arguments
    /// * `img` - the image to detect objects in
    /// * `levels` - one entry per scale, the image is resized to the size of its accumulators
    /// * `ratios` - aspect ratio of every class, one per accumulator of a level
    pub fn detect_pyramid(&self,
                          img: &DynamicImage,
                          levels: &mut [PyramidLevel],
                          ratios: &[f32])
                          -> Result<()> {
        let img = color_input(img)?;
        for (i, level) in levels.iter_mut().enumerate() {
            self.detect_level(&img, i, level, ratios)?;
        }
        Ok(())
    }

    /// Like `detect_pyramid` but every level is processed on its own core.
    pub fn detect_pyramid_parallel(&self,
                                   img: &DynamicImage,
                                   levels: &mut [PyramidLevel],
                                   ratios: &[f32])
                                   -> Result<()> {
        let img = color_input(img)?;
        levels.par_iter_mut()
            .enumerate()
            .map(|(i, level)| self.detect_level(&img, i, level, ratios))
            .collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    fn detect_level(&self,
                    img: &ColorImage,
                    nr: usize,
                    level: &mut PyramidLevel,
                    ratios: &[f32])
                    -> Result<()> {
        let (w, h) = match level.dimensions() {
            Some(d) => d,
            None => {
                bail!(ErrorKind::DimensionMismatch(format!("pyramid level {} has no accumulators",
                                                           nr)))
            }
        };
        info!("Detecting at level {} ({}x{})", nr, w, h);
        let start = Instant::now();
        let scaled = if w == 0 || h == 0 {
            ColorImage::new(w, h)
        } else {
            imageops::resize(img, w, h, FilterType::Triangle)
        };
        self.detect_color(&scaled, ratios, &mut level.accumulators)?;
        debug!("Level {} took {:?}", nr, start.elapsed());
        Ok(())
    }
}

/// Converts the image into RGB, rejects grayscale images.
fn color_input(img: &DynamicImage) -> Result<ColorImage> {
    let channels = img.color().channel_count();
    if channels == 1 {
        error!("Gray color images are not supported.");
        bail!(ErrorKind::UnsupportedInputKind(channels));
    }
    Ok(img.to_rgb8())
}
