/// Accumulation of the votes of a regression grid into accumulator images.

use std::time::Instant;
use rayon::prelude::*;
use imageproc::filter::separable_filter_equal;
use config::DetectorConfig;
use errors::*;
use types::{AccumulatorImage, new_accumulators};
use super::houghforest::LeafBundle;
use super::regression::RegressionGrid;

/// Casts the votes of the leafs into one accumulator per ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteAccumulator {
    /// Only leafs with a larger foreground probability vote
    pub foreground_threshold: f32,
    /// Size of the gaussian kernel used to smooth the votes (1 = no smoothing)
    pub smoothing_kernel: u32,
}

impl Default for VoteAccumulator {
    fn default() -> VoteAccumulator {
        VoteAccumulator {
            foreground_threshold: 0.5,
            smoothing_kernel: 3,
        }
    }
}

impl VoteAccumulator {
    pub fn new(foreground_threshold: f32, smoothing_kernel: u32) -> VoteAccumulator {
        VoteAccumulator {
            foreground_threshold: foreground_threshold,
            smoothing_kernel: smoothing_kernel,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> VoteAccumulator {
        VoteAccumulator::new(config.foreground_threshold, config.smoothing_kernel)
    }

    /// Resets the accumulators and fills them with the votes of every patch of
    /// the regression grid. Afterwards every accumulator is smoothed.
    ///
    /// # Arguments
    /// * `img_width`, `img_height` - size of the image the grid was computed from
    /// * `ratios` - scale of the horizontal offset, one per accumulator
    /// * `grid` - the leafs of every patch
    /// * `accumulators` - output, one per ratio and of the size of the image
    pub fn accumulate(&self,
                      img_width: u32,
                      img_height: u32,
                      ratios: &[f32],
                      grid: &RegressionGrid,
                      accumulators: &mut [AccumulatorImage])
                      -> Result<()> {
        check_dimensions(img_width, img_height, ratios, grid, accumulators)?;
        let start = Instant::now();
        for acc in accumulators.iter_mut() {
            zero(acc);
        }
        for y in 0..grid.height() {
            self.vote_row(grid, y, ratios, accumulators);
        }
        for acc in accumulators.iter_mut() {
            smooth(acc, self.smoothing_kernel);
        }
        debug!("Voting into {} accumulators took {:?}",
               accumulators.len(),
               start.elapsed());
        Ok(())
    }

    /// Like `accumulate`, but the rows of the grid are shared among multiple cores.
    /// Every core votes into its own accumulators which are summed up afterwards.
    pub fn accumulate_parallel(&self,
                               img_width: u32,
                               img_height: u32,
                               ratios: &[f32],
                               grid: &RegressionGrid,
                               accumulators: &mut [AccumulatorImage])
                               -> Result<()> {
        check_dimensions(img_width, img_height, ratios, grid, accumulators)?;
        let start = Instant::now();
        let count = accumulators.len();
        let empty = || new_accumulators(img_width, img_height, count);
        let sum = (0..grid.height())
            .into_par_iter()
            .fold(&empty, |mut partial, y| {
                self.vote_row(grid, y, ratios, &mut partial);
                partial
            })
            .reduce(&empty, |mut a, b| {
                for (acc, other) in a.iter_mut().zip(b.iter()) {
                    for (v, o) in acc.iter_mut().zip(other.iter()) {
                        *v += *o;
                    }
                }
                a
            });
        for (acc, votes) in accumulators.iter_mut().zip(sum.iter()) {
            acc.copy_from_slice(votes);
            smooth(acc, self.smoothing_kernel);
        }
        debug!("Parallel voting into {} accumulators took {:?}",
               count,
               start.elapsed());
        Ok(())
    }

    fn vote_row(&self,
                grid: &RegressionGrid,
                y: u32,
                ratios: &[f32],
                accumulators: &mut [AccumulatorImage]) {
        for (x, bundle) in grid.row(y).iter().enumerate() {
            let (cx, cy) = grid.center(x as u32, y);
            self.vote_bundle(cx as i32, cy as i32, bundle, ratios, accumulators);
        }
    }

    /// Votes of all leafs reached by the patch centered at (`cx`, `cy`).
    fn vote_bundle(&self,
                   cx: i32,
                   cy: i32,
                   bundle: &LeafBundle,
                   ratios: &[f32],
                   accumulators: &mut [AccumulatorImage]) {
        for leaf in bundle.iter() {
            // A leaf without centers has nothing to vote for
            if !(leaf.pfg > self.foreground_threshold) || leaf.centers.is_empty() {
                continue;
            }
            let w = leaf.pfg / (leaf.centers.len() * bundle.len()) as f32;
            for center in leaf.centers.iter() {
                let ty = match cy.checked_sub(center.y) {
                    Some(ty) => ty,
                    None => continue,
                };
                for (acc, &ratio) in accumulators.iter_mut().zip(ratios.iter()) {
                    if ty < 0 || ty >= acc.height() as i32 {
                        continue;
                    }
                    // rounded by truncation, the vertical offset needs no rounding.
                    // Everything within (-1, width) truncates to a valid column.
                    let fx = cx as f32 - center.x as f32 * ratio + 0.5;
                    if !fx.is_finite() || fx <= -1.0 || fx >= acc.width() as f32 {
                        continue;
                    }
                    acc.get_pixel_mut(fx as u32, ty as u32)[0] += w;
                }
            }
        }
    }
}

fn check_dimensions(img_width: u32,
                    img_height: u32,
                    ratios: &[f32],
                    grid: &RegressionGrid,
                    accumulators: &[AccumulatorImage])
                    -> Result<()> {
    if ratios.len() != accumulators.len() {
        bail!(ErrorKind::DimensionMismatch(format!("{} ratios for {} accumulators",
                                                   ratios.len(),
                                                   accumulators.len())));
    }
    if let Some(ratio) = ratios.iter().find(|r| !r.is_finite()) {
        bail!(ErrorKind::DimensionMismatch(format!("ratio {} is not finite", ratio)));
    }
    if let Some((i, acc)) = accumulators.iter()
        .enumerate()
        .find(|&(_, acc)| acc.dimensions() != (img_width, img_height)) {
        bail!(ErrorKind::DimensionMismatch(format!("accumulator {} has size {:?}, image has \
                                                    size {:?}",
                                                   i,
                                                   acc.dimensions(),
                                                   (img_width, img_height))));
    }
    if grid.patch().grid_dimensions(img_width, img_height) != (grid.width(), grid.height()) {
        bail!(ErrorKind::DimensionMismatch(format!("regression grid {}x{} does not belong to \
                                                    an image of size {}x{}",
                                                   grid.width(),
                                                   grid.height(),
                                                   img_width,
                                                   img_height)));
    }
    Ok(())
}

fn zero(acc: &mut AccumulatorImage) {
    for v in acc.iter_mut() {
        *v = 0.0;
    }
}

/// Returns a normalized gaussian kernel of the given (odd) size.
/// The sizes up to 7 use the same fixed kernels as OpenCV does, larger
/// kernels derive sigma from the size.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        0 | 1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = 0.3 * ((size - 1) as f32 * 0.5 - 1.0) + 0.8;
            let mid = (size / 2) as f32;
            let kernel: Vec<f32> = (0..size)
                .map(|i| {
                    let d = i as f32 - mid;
                    (-d * d / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f32 = kernel.iter().sum();
            kernel.into_iter().map(|k| k / sum).collect()
        }
    }
}

/// Smooth the accumulator in place with a gaussian kernel of the given size.
/// Pixels outside of the image are replaced by the nearest border pixel.
pub fn smooth(acc: &mut AccumulatorImage, kernel_size: u32) {
    if kernel_size <= 1 || acc.width() == 0 || acc.height() == 0 {
        return;
    }
    let kernel = gaussian_kernel(kernel_size);
    let smoothed: AccumulatorImage = separable_filter_equal(acc, &kernel);
    acc.copy_from_slice(&smoothed);
}
