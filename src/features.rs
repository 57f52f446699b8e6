//! Feature channels the forest operates on.
//!
//! The forest never sees the colour image itself but a list of
//! equally sized single channel planes computed from it.

use image::{Luma, imageops};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use errors::*;
use types::{ColorImage, FeaturePlane, PatchSize};

/// An ordered list of single channel planes which share the same size
/// (and thereby the same row stride).
#[derive(Debug, Clone)]
pub struct FeatureChannels {
    width: u32,
    height: u32,
    planes: Vec<FeaturePlane>,
}

impl FeatureChannels {
    /// Wraps the given planes.
    /// Fails if there is no plane or if the planes differ in size.
    pub fn new(planes: Vec<FeaturePlane>) -> Result<FeatureChannels> {
        let (width, height) = match planes.first() {
            Some(p) => p.dimensions(),
            None => bail!(ErrorKind::DimensionMismatch("no feature planes given".to_string())),
        };
        if let Some((i, p)) = planes.iter().enumerate().find(|&(_, p)| p.dimensions() != (width, height)) {
            bail!(ErrorKind::DimensionMismatch(format!("feature plane {} has size {:?}, expected {:?}",
                                                       i,
                                                       p.dimensions(),
                                                       (width, height))));
        }
        Ok(FeatureChannels {
            width: width,
            height: height,
            planes: planes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of planes
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, channel: usize) -> &FeaturePlane {
        &self.planes[channel]
    }

    /// Distance (in elements) between two rows of every plane.
    pub fn stride(&self) -> usize {
        self.width as usize
    }

    /// Value of a plane at the given image position
    #[inline]
    pub fn value(&self, channel: usize, x: u32, y: u32) -> u8 {
        self.planes[channel].as_raw()[y as usize * self.stride() + x as usize]
    }

    /// Fails unless the planes have the size `width`x`height`.
    pub fn check_size(&self, width: u32, height: u32) -> Result<()> {
        if (self.width, self.height) != (width, height) {
            bail!(ErrorKind::DimensionMismatch(format!("feature planes are {}x{}, image is {}x{}",
                                                       self.width,
                                                       self.height,
                                                       width,
                                                       height)));
        }
        Ok(())
    }

    /// Returns the patch with the upper left corner at (`x`,`y`).
    pub fn patch(&self, x: u32, y: u32, size: PatchSize) -> PatchView {
        debug_assert!(x + size.width <= self.width && y + size.height <= self.height);
        PatchView {
            channels: self,
            x: x,
            y: y,
            size: size,
        }
    }
}

/// A patch within the feature channels. The forest regresses on these.
#[derive(Clone, Copy)]
pub struct PatchView<'a> {
    channels: &'a FeatureChannels,
    x: u32,
    y: u32,
    size: PatchSize,
}

impl<'a> PatchView<'a> {
    /// Upper left corner within the image
    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn size(&self) -> PatchSize {
        self.size
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Value of `channel` at the patch-local position (`dx`,`dy`).
    #[inline]
    pub fn value(&self, channel: usize, dx: u32, dy: u32) -> u8 {
        debug_assert!(dx < self.size.width && dy < self.size.height);
        self.channels.value(channel, self.x + dx, self.y + dy)
    }
}

/// Computes the feature channels of a colour image.
pub trait FeatureExtractor: Sync {
    /// Number of planes `extract` produces
    fn channel_count(&self) -> usize;
    fn extract(&self, img: &ColorImage) -> Result<FeatureChannels>;
}

/// Uses the red, green and blue channel as features.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorChannels;

impl FeatureExtractor for ColorChannels {
    fn channel_count(&self) -> usize {
        3
    }

    fn extract(&self, img: &ColorImage) -> Result<FeatureChannels> {
        let planes = (0..3)
            .map(|c| FeaturePlane::from_fn(img.width(), img.height(), |x, y| Luma([img.get_pixel(x, y)[c]])))
            .collect();
        FeatureChannels::new(planes)
    }
}

/// Uses the intensity and the absolute horizontal and vertical
/// sobel responses (scaled into a byte) as features.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityGradientChannels;

impl FeatureExtractor for IntensityGradientChannels {
    fn channel_count(&self) -> usize {
        3
    }

    fn extract(&self, img: &ColorImage) -> Result<FeatureChannels> {
        let gray = imageops::grayscale(img);
        let dx = horizontal_sobel(&gray);
        let dy = vertical_sobel(&gray);
        // a sobel response lies within [-4*255, 4*255]
        let scale = |v: i16| Luma([((v as i32).abs() / 4).min(255) as u8]);
        let gx = FeaturePlane::from_fn(gray.width(), gray.height(), |x, y| scale(dx.get_pixel(x, y)[0]));
        let gy = FeaturePlane::from_fn(gray.width(), gray.height(), |x, y| scale(dy.get_pixel(x, y)[0]));
        FeatureChannels::new(vec![gray, gx, gy])
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(w: u32, h: u32) -> ColorImage {
        ColorImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 200]))
    }

    #[test]
    fn test_mismatching_planes() {
        let planes = vec![FeaturePlane::new(4, 4), FeaturePlane::new(4, 5)];
        match FeatureChannels::new(planes) {
            Err(Error(ErrorKind::DimensionMismatch(_), _)) => (),
            _ => panic!("planes of different size have to be rejected"),
        }
        assert!(FeatureChannels::new(vec![]).is_err());
    }

    #[test]
    fn test_color_channels() {
        let img = gradient_image(6, 4);
        let channels = ColorChannels.extract(&img).unwrap();
        assert_eq!(channels.len(), ColorChannels.channel_count());
        assert_eq!((channels.width(), channels.height()), (6, 4));
        assert_eq!(channels.stride(), 6);
        assert_eq!(channels.value(0, 3, 2), 30);
        assert_eq!(channels.value(1, 3, 2), 20);
        assert_eq!(channels.value(2, 3, 2), 200);
        assert!(channels.check_size(6, 4).is_ok());
        assert!(channels.check_size(4, 6).is_err());
    }

    #[test]
    fn test_patch_view() {
        let img = gradient_image(8, 8);
        let channels = ColorChannels.extract(&img).unwrap();
        let patch = channels.patch(2, 3, PatchSize::new(4, 4));
        assert_eq!(patch.origin(), (2, 3));
        assert_eq!(patch.channel_count(), 3);
        assert_eq!(patch.value(0, 1, 0), 30);
        assert_eq!(patch.value(1, 1, 2), 50);
    }

    #[test]
    fn test_intensity_gradient_channels() {
        // vertical edge in the middle of the image
        let img = ColorImage::from_fn(10, 10, |x, _| if x < 5 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let channels = IntensityGradientChannels.extract(&img).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels.value(0, 7, 5), 255);
        assert!(channels.value(1, 5, 5) > 0);
        assert_eq!(channels.value(1, 1, 5), 0);
        assert_eq!(channels.value(2, 5, 5), 0);
    }
}
