/// Runs the multi scale detection on an image and stores every
/// accumulator as grayscale png.

extern crate houghvote;
extern crate clap;
#[macro_use]
extern crate log;
extern crate env_logger;
extern crate image;
extern crate serde_json;

#[macro_use]
extern crate error_chain;

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use image::GenericImageView;

use clap::{Arg, App};

use houghvote::{DetectorConfig, HoughDetector, PixelTestForest, PyramidLevel};
use houghvote::features::ColorChannels;
use houghvote::types::AccumulatorImage;

error_chain!{
    links {
        Detection(houghvote::Error, houghvote::ErrorKind);
    }
    foreign_links {
        Serde(serde_json::Error);
        IO(std::io::Error);
        Image(image::ImageError);
    }
}

pub fn main() {
    use std::process::exit;
    if let Err(e) = main_() {
        eprintln!("Error: {}", e);
        exit(-1);
    }
}

/// Parses a comma separated list of floats
fn parse_list(list: &str) -> Result<Vec<f32>> {
    list.split(',')
        .map(|s| s.trim().parse::<f32>().chain_err(|| format!("Invalid number {}", s)))
        .collect()
}

/// Scales the accumulator into [0,255]
fn to_gray(acc: &AccumulatorImage) -> image::GrayImage {
    let max = acc.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        warn!("Got empty accumulator");
        return image::GrayImage::new(acc.width(), acc.height());
    }
    image::GrayImage::from_fn(acc.width(), acc.height(), |x, y| {
        image::Luma([(255.0 * acc[(x, y)][0] / max) as u8])
    })
}

fn main_() -> Result<()> {
    env_logger::init();
    let args = App::new("Pyramid-Detector")
        .arg(Arg::with_name("forest")
            .short("f")
            .long("forest")
            .required(true)
            .takes_value(true)
            .help("Filename of the trained forest (json)"))
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .takes_value(true)
            .help("Filename of the detector configuration (json)"))
        .arg(Arg::with_name("ratios")
            .short("r")
            .long("ratios")
            .takes_value(true)
            .default_value("1.0")
            .help("Comma separated aspect ratios, one accumulator each"))
        .arg(Arg::with_name("scales")
            .short("s")
            .long("scales")
            .takes_value(true)
            .default_value("1.0,0.75,0.5")
            .help("Comma separated scales of the pyramid levels"))
        .arg(Arg::with_name("output")
            .short("o")
            .long("output")
            .takes_value(true)
            .default_value(".")
            .help("Directory to save the accumulators to"))
        .arg(Arg::with_name("image")
            .help("Path to the colour image")
            .required(true)
            .index(1))
        .get_matches();
    let forest_path = args.value_of("forest").ok_or("Invalid parameter for forest")?;
    let img_path = args.value_of("image").ok_or("Invalid parameter for image path")?;
    let ratios = parse_list(args.value_of("ratios").unwrap_or("1.0"))?;
    let scales = parse_list(args.value_of("scales").unwrap_or("1.0"))?;
    let output = Path::new(args.value_of("output").unwrap_or("."));

    info!("Loading forest ...");
    let forest = PixelTestForest::from_reader(File::open(forest_path)?)?;
    let config = match args.value_of("config") {
        Some(path) => DetectorConfig::from_reader(File::open(path)?)?,
        None => {
            DetectorConfig {
                patch_width: forest.patch_size().width,
                patch_height: forest.patch_size().height,
                ..DetectorConfig::default()
            }
        }
    };
    let parallel = config.parallel;
    let detector = HoughDetector::new(Arc::new(forest), ColorChannels, config)?;

    info!("Loading image ...");
    let img = image::open(img_path)?;
    let mut levels = PyramidLevel::for_scales(img.width(), img.height(), &scales, ratios.len());

    info!("Detecting ...");
    if parallel {
        detector.detect_pyramid_parallel(&img, &mut levels, &ratios)?;
    } else {
        detector.detect_pyramid(&img, &mut levels, &ratios)?;
    }

    for (i, level) in levels.iter().enumerate() {
        for (c, acc) in level.accumulators.iter().enumerate() {
            let file = output.join(format!("level{}_ratio{}.png", i, c));
            to_gray(acc).save(&file)?;
            info!("Saved file to {}", file.display());
        }
    }
    Ok(())
}
