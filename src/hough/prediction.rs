/// Detection of objects within a colour image: the hough forest regresses every
/// patch and the reached leafs vote for object centers.

use std::sync::Arc;
use std::time::Instant;
use config::DetectorConfig;
use errors::*;
use features::{FeatureChannels, FeatureExtractor};
use types::{AccumulatorImage, ColorImage};
use super::houghforest::Forest;
use super::regression::RegressionGrid;
use super::voting::VoteAccumulator;

/// Builds accumulator images out of a colour image using a trained forest.
///
/// The forest is shared and only read, so a detector may be used by several
/// threads at the same time.
pub struct HoughDetector<F, E> {
    forest: Arc<F>,
    extractor: E,
    config: DetectorConfig,
    voter: VoteAccumulator,
}

impl<F, E> HoughDetector<F, E>
    where F: Forest,
          E: FeatureExtractor
{
    /// Creates a new detector.
    /// Fails if the configuration is invalid or the forest does not fit
    /// to the patch size or the feature extractor.
    pub fn new(forest: Arc<F>, extractor: E, config: DetectorConfig) -> Result<HoughDetector<F, E>> {
        config.validate()?;
        forest.check_compatible(config.patch_size(), extractor.channel_count())?;
        Ok(HoughDetector {
            voter: VoteAccumulator::from_config(&config),
            forest: forest,
            extractor: extractor,
            config: config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn forest(&self) -> &Arc<F> {
        &self.forest
    }

    /// Number of center votes stored within the forest
    pub fn num_centers(&self) -> usize {
        self.forest.num_trained_centers()
    }

    /// Regress every patch of the feature channels.
    pub fn run_regression(&self, channels: &FeatureChannels) -> Result<RegressionGrid> {
        let (w, h) = (channels.width(), channels.height());
        if self.config.parallel {
            RegressionGrid::build_parallel(&*self.forest, w, h, channels, self.config.patch_size())
        } else {
            RegressionGrid::build(&*self.forest, w, h, channels, self.config.patch_size())
        }
    }

    /// Fill `accumulators` (one per ratio, each of the size `width`x`height`)
    /// with the votes of an already computed regression grid.
    pub fn accumulate_votes(&self,
                            width: u32,
                            height: u32,
                            ratios: &[f32],
                            grid: &RegressionGrid,
                            accumulators: &mut [AccumulatorImage])
                            -> Result<()> {
        if self.config.parallel {
            self.voter.accumulate_parallel(width, height, ratios, grid, accumulators)
        } else {
            self.voter.accumulate(width, height, ratios, grid, accumulators)
        }
    }

    /// Like `accumulate_votes` but regress the feature channels first.
    pub fn accumulate_votes_from_features(&self,
                                          width: u32,
                                          height: u32,
                                          channels: &FeatureChannels,
                                          ratios: &[f32],
                                          accumulators: &mut [AccumulatorImage])
                                          -> Result<()> {
        channels.check_size(width, height)?;
        let grid = self.run_regression(channels)?;
        self.accumulate_votes(width, height, ratios, &grid, accumulators)
    }

    /// Detect objects within a colour image of a single scale.
    ///
    /// # Arguments
    /// * `img` - the image to detect objects in
    /// * `ratios` - aspect ratio of every class, one per accumulator
    /// * `accumulators` - gets the votes, has to be of the size of the image
    pub fn detect_color(&self,
                        img: &ColorImage,
                        ratios: &[f32],
                        accumulators: &mut [AccumulatorImage])
                        -> Result<()> {
        let start = Instant::now();
        let channels = self.extractor.extract(img)?;
        debug!("Feature extraction took {:?}", start.elapsed());
        self.accumulate_votes_from_features(img.width(), img.height(), &channels, ratios, accumulators)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use features::ColorChannels;
    use hough::houghforest::{LeafNode, Node, Offset, PixelTest, PixelTestForest, PixelTestTree};
    use types::{PatchSize, new_accumulators};

    /// Votes for the pixel two to the left and one above if
    /// the red value at the center of the patch is large.
    fn red_forest() -> PixelTestForest {
        let test = PixelTest {
            channel: 0,
            a: [2, 2],
            b: [0, 0],
            threshold: 100,
        };
        let tree = PixelTestTree::new(vec![Node::Split {
                                               test: test,
                                               left: 1,
                                               right: 2,
                                           },
                                           Node::Leaf(0),
                                           Node::Leaf(1)],
                                      vec![LeafNode::new(0.0, vec![]),
                                           LeafNode::new(1.0, vec![Offset::new(2, 1)])]);
        PixelTestForest::new(PatchSize::new(4, 4), 3, vec![tree]).unwrap()
    }

    fn config() -> DetectorConfig {
        DetectorConfig {
            patch_width: 4,
            patch_height: 4,
            smoothing_kernel: 1,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_detect_color() {
        let detector = HoughDetector::new(Arc::new(red_forest()), ColorChannels, config()).unwrap();
        assert_eq!(detector.num_centers(), 1);
        // a single red pixel at (6,5)
        let img = ColorImage::from_fn(12, 10, |x, y| {
            if (x, y) == (6, 5) { Rgb([255, 0, 0]) } else { Rgb([0, 0, 0]) }
        });
        let mut accs = new_accumulators(12, 10, 1);
        detector.detect_color(&img, &[1.0], &mut accs).unwrap();
        // only the patch centered at the red pixel votes
        assert_eq!(accs[0][(4, 4)][0], 1.0);
        assert_eq!(accs[0].iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_regression_then_voting() {
        let detector = HoughDetector::new(Arc::new(red_forest()), ColorChannels, config()).unwrap();
        let img = ColorImage::from_fn(9, 9, |x, y| Rgb([((x * 31 + y * 17) % 256) as u8, 0, 0]));
        let channels = ColorChannels.extract(&img).unwrap();
        let grid = detector.run_regression(&channels).unwrap();
        assert_eq!((grid.width(), grid.height()), (5, 5));

        let mut direct = new_accumulators(9, 9, 2);
        let mut split = new_accumulators(9, 9, 2);
        detector.detect_color(&img, &[1.0, 2.0], &mut direct).unwrap();
        detector.accumulate_votes(9, 9, &[1.0, 2.0], &grid, &mut split).unwrap();
        assert_eq!(direct, split);
    }

    #[test]
    fn test_incompatible_forest() {
        let mut config = config();
        config.patch_width = 6;
        assert!(HoughDetector::new(Arc::new(red_forest()), ColorChannels, config).is_err());

        let mut config = self::config();
        config.smoothing_kernel = 2;
        assert!(HoughDetector::new(Arc::new(red_forest()), ColorChannels, config).is_err());
    }

    #[test]
    fn test_features_of_wrong_size() {
        let detector = HoughDetector::new(Arc::new(red_forest()), ColorChannels, config()).unwrap();
        let channels = ColorChannels.extract(&ColorImage::new(8, 8)).unwrap();
        let mut accs = new_accumulators(9, 9, 1);
        assert!(detector.accumulate_votes_from_features(9, 9, &channels, &[1.0], &mut accs).is_err());
    }
}
