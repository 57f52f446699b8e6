use image::{ImageBuffer, Luma, GrayImage, RgbImage};

/// A single feature plane. Every plane of a detection run has
/// the size of the (resized) source image.
pub type FeaturePlane = GrayImage;

/// The colour image the detector works on.
pub type ColorImage = RgbImage;

/// Vote density map of a single ratio class.
pub type AccumulatorImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Size of the window which is passed to the forest.
/// Half of it is the border of the image where no patch is centered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchSize {
    pub width: u32,
    pub height: u32,
}

impl PatchSize {
    pub fn new(width: u32, height: u32) -> PatchSize {
        PatchSize {
            width: width,
            height: height,
        }
    }

    /// Distance between the left border of a patch and its center
    pub fn x_offset(&self) -> u32 {
        self.width / 2
    }

    /// Distance between the top border of a patch and its center
    pub fn y_offset(&self) -> u32 {
        self.height / 2
    }

    /// Returns the number of patch placements (width, height) that fit completely
    /// into an image of the given size. If the patch is as large as the image
    /// (or larger) in some direction, there is no valid placement.
    pub fn grid_dimensions(&self, img_width: u32, img_height: u32) -> (u32, u32) {
        if self.width >= img_width || self.height >= img_height {
            return (0, 0);
        }
        (img_width - self.width, img_height - self.height)
    }
}

/// Allocates `count` zeroed accumulators of the size `width`x`height`.
pub fn new_accumulators(width: u32, height: u32, count: usize) -> Vec<AccumulatorImage> {
    (0..count).map(|_| AccumulatorImage::new(width, height)).collect()
}
