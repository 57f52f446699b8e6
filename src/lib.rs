#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_json;
extern crate rayon;

#[macro_use]
extern crate error_chain;
extern crate image;
extern crate imageproc;

#[macro_use]
extern crate log;

#[cfg(test)]
extern crate rand;

pub mod errors;
pub mod config;
pub mod types;
pub mod features;

pub mod hough;

pub use config::DetectorConfig;
pub use errors::{Error, ErrorKind, Result};
pub use hough::houghforest::{Forest, LeafNode, Offset, PixelTestForest};
pub use hough::prediction::HoughDetector;
pub use hough::pyramid::PyramidLevel;
