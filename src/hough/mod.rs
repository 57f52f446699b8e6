/// Object localisation by voting with a hough forest.
/// For literature see
/// * https://pages.iai.uni-bonn.de/gall_juergen/download/jgall_houghforest_cvpr09.pdf

pub mod houghforest;
pub mod regression;
pub mod voting;
pub mod prediction;
pub mod pyramid;
