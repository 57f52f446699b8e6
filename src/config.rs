//! Parameters of a detector. They are usually stored next to a trained
//! forest as json file.

use std::io::Read;
use serde_json;
use errors::*;
use types::PatchSize;

/// Default size of a patch (width and height)
const DEFAULT_PATCH_SIZE: u32 = 16;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// width of the patch the forest was trained with
    pub patch_width: u32,
    /// height of the patch the forest was trained with
    pub patch_height: u32,
    /// Only leafs with a larger foreground probability vote.
    /// Skipping the uncertain leafs speeds up the voting a lot.
    pub foreground_threshold: f32,
    /// Size of the gaussian kernel used to smooth the accumulators
    pub smoothing_kernel: u32,
    /// Use multiple cores for regression, voting and pyramid levels
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> DetectorConfig {
        DetectorConfig {
            patch_width: DEFAULT_PATCH_SIZE,
            patch_height: DEFAULT_PATCH_SIZE,
            foreground_threshold: 0.5,
            smoothing_kernel: 3,
            parallel: false,
        }
    }
}

impl DetectorConfig {
    /// Reads a configuration from json. Missing fields get their default value.
    pub fn from_reader<R: Read>(reader: R) -> Result<DetectorConfig> {
        let config: DetectorConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn patch_size(&self) -> PatchSize {
        PatchSize::new(self.patch_width, self.patch_height)
    }

    /// Checks that a detector can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.patch_width == 0 || self.patch_height == 0 {
            bail!(ErrorKind::InvalidConfig(format!("patch size {}x{} is empty",
                                                   self.patch_width,
                                                   self.patch_height)));
        }
        if !(self.foreground_threshold >= 0.0 && self.foreground_threshold <= 1.0) {
            bail!(ErrorKind::InvalidConfig(format!("foreground threshold {} is not within [0, 1]",
                                                   self.foreground_threshold)));
        }
        if self.smoothing_kernel == 0 || self.smoothing_kernel % 2 == 0 {
            bail!(ErrorKind::InvalidConfig(format!("smoothing kernel size {} has to be odd",
                                                   self.smoothing_kernel)));
        }
        Ok(())
    }
}
