/// Regression of every patch of an image using a hough forest.

use std::time::Instant;
use rayon::prelude::*;
use errors::*;
use features::FeatureChannels;
use types::PatchSize;
use super::houghforest::{Forest, LeafBundle};

/// The leafs reached by every patch which fits completely into the image.
///
/// The cell (x, y) belongs to the patch whose upper left corner is (x, y),
/// so its center lies at (x + patch.width/2, y + patch.height/2).
pub struct RegressionGrid<'a> {
    patch: PatchSize,
    width: u32,
    height: u32,
    /// row major
    cells: Vec<LeafBundle<'a>>,
}

impl<'a> RegressionGrid<'a> {
    /// Regress every patch of the feature channels (which have to be of the size
    /// `img_width`x`img_height`) with the forest.
    /// Fails if the forest does not accept patches of the size `patch`.
    pub fn build<F>(forest: &'a F,
                    img_width: u32,
                    img_height: u32,
                    channels: &FeatureChannels,
                    patch: PatchSize)
                    -> Result<RegressionGrid<'a>>
        where F: Forest + ?Sized
    {
        channels.check_size(img_width, img_height)?;
        forest.check_compatible(patch, channels.len())?;
        let start = Instant::now();
        let (width, height) = patch.grid_dimensions(img_width, img_height);
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(forest.regress(&channels.patch(x, y, patch)));
            }
        }
        debug!("Regression of {}x{} patches took {:?}",
               width,
               height,
               start.elapsed());
        Ok(RegressionGrid {
            patch: patch,
            width: width,
            height: height,
            cells: cells,
        })
    }

    /// Like `build` but the rows are regressed on multiple cores.
    pub fn build_parallel<F>(forest: &'a F,
                             img_width: u32,
                             img_height: u32,
                             channels: &FeatureChannels,
                             patch: PatchSize)
                             -> Result<RegressionGrid<'a>>
        where F: Forest + ?Sized
    {
        channels.check_size(img_width, img_height)?;
        forest.check_compatible(patch, channels.len())?;
        let start = Instant::now();
        let (width, height) = patch.grid_dimensions(img_width, img_height);
        let rows: Vec<Vec<LeafBundle<'a>>> = (0..height)
            .into_par_iter()
            .map(|y| {
                (0..width)
                    .map(|x| forest.regress(&channels.patch(x, y, patch)))
                    .collect()
            })
            .collect();
        debug!("Parallel regression of {}x{} patches took {:?}",
               width,
               height,
               start.elapsed());
        Ok(RegressionGrid {
            patch: patch,
            width: width,
            height: height,
            cells: rows.into_iter().flat_map(|r| r.into_iter()).collect(),
        })
    }

    /// Number of patches in a row
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of patches in a column
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn patch(&self) -> PatchSize {
        self.patch
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> &LeafBundle<'a> {
        &self.cells[(y * self.width + x) as usize]
    }

    pub fn row(&self, y: u32) -> &[LeafBundle<'a>] {
        let begin = (y * self.width) as usize;
        &self.cells[begin..begin + self.width as usize]
    }

    /// Image coordinate of the center of the patch belonging to cell (x,y)
    pub fn center(&self, x: u32, y: u32) -> (u32, u32) {
        (x + self.patch.x_offset(), y + self.patch.y_offset())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use features::PatchView;
    use hough::houghforest::{LeafNode, Offset};
    use types::FeaturePlane;
    use image::Luma;
    use std::ptr;

    /// Picks the leaf named by the upper left pixel of the patch (twice).
    struct LookupForest {
        leafs: Vec<LeafNode>,
    }

    impl Forest for LookupForest {
        fn regress<'a>(&'a self, patch: &PatchView) -> LeafBundle<'a> {
            let leaf = &self.leafs[patch.value(0, 0, 0) as usize];
            vec![leaf, leaf]
        }
        fn num_trees(&self) -> usize {
            2
        }
        fn num_trained_centers(&self) -> usize {
            self.leafs.len()
        }
    }

    /// plane value = x + y * width
    fn numbered_channels(w: u32, h: u32) -> FeatureChannels {
        let plane = FeaturePlane::from_fn(w, h, |x, y| Luma([(x + y * w) as u8]));
        FeatureChannels::new(vec![plane]).unwrap()
    }

    fn lookup_forest(count: usize) -> LookupForest {
        LookupForest {
            leafs: (0..count).map(|i| LeafNode::new(1.0, vec![Offset::new(i as i32, 0)])).collect(),
        }
    }

    #[test]
    fn test_grid_size() {
        let forest = lookup_forest(256);
        for &(w, h, pw, ph) in [(10, 10, 4, 4), (12, 7, 3, 5), (5, 9, 5, 2), (6, 6, 8, 2)].iter() {
            let channels = numbered_channels(w, h);
            let grid = RegressionGrid::build(&forest, w, h, &channels, PatchSize::new(pw, ph))
                .unwrap();
            let expected = if pw < w && ph < h { ((w - pw) * (h - ph)) as usize } else { 0 };
            assert_eq!(grid.len(), expected);
            assert_eq!(grid.is_empty(), expected == 0);
        }
    }

    #[test]
    fn test_cells_match_patches() {
        let forest = lookup_forest(256);
        let channels = numbered_channels(10, 8);
        let grid = RegressionGrid::build(&forest, 10, 8, &channels, PatchSize::new(4, 3)).unwrap();
        assert_eq!((grid.width(), grid.height()), (6, 5));
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let bundle = grid.get(x, y);
                assert_eq!(bundle.len(), 2);
                assert!(ptr::eq(bundle[0], &forest.leafs[(x + y * 10) as usize]));
            }
        }
        assert_eq!(grid.center(0, 0), (2, 1));
        assert_eq!(grid.center(5, 4), (7, 5));
        assert_eq!(grid.row(2).len(), 6);
    }

    #[test]
    fn test_parallel_is_equal() {
        let forest = lookup_forest(256);
        let channels = numbered_channels(15, 11);
        let patch = PatchSize::new(5, 4);
        let seq = RegressionGrid::build(&forest, 15, 11, &channels, patch).unwrap();
        let par = RegressionGrid::build_parallel(&forest, 15, 11, &channels, patch).unwrap();
        assert_eq!(seq.len(), par.len());
        for y in 0..seq.height() {
            for x in 0..seq.width() {
                assert!(ptr::eq(seq.get(x, y)[0], par.get(x, y)[0]));
            }
        }
    }

    #[test]
    fn test_forest_for_other_patches() {
        use hough::houghforest::{Node, PixelTest, PixelTestForest, PixelTestTree};
        let test = PixelTest {
            channel: 0,
            a: [0, 0],
            b: [7, 7],
            threshold: 0,
        };
        let tree = PixelTestTree::new(vec![Node::Split {
                                               test: test,
                                               left: 1,
                                               right: 2,
                                           },
                                           Node::Leaf(0),
                                           Node::Leaf(0)],
                                      vec![LeafNode::new(1.0, vec![])]);
        let forest = PixelTestForest::new(PatchSize::new(8, 8), 1, vec![tree]).unwrap();
        let channels = numbered_channels(10, 10);
        let patch = PatchSize::new(4, 4);
        match RegressionGrid::build(&forest, 10, 10, &channels, patch) {
            Err(Error(ErrorKind::DimensionMismatch(_), _)) => (),
            _ => panic!("expected a dimension mismatch"),
        }
        assert!(RegressionGrid::build_parallel(&forest, 10, 10, &channels, patch).is_err());
        assert!(RegressionGrid::build(&forest, 10, 10, &channels, PatchSize::new(8, 8)).is_ok());
    }

    #[test]
    fn test_size_mismatch() {
        let forest = lookup_forest(256);
        let channels = numbered_channels(10, 10);
        match RegressionGrid::build(&forest, 12, 10, &channels, PatchSize::new(4, 4)) {
            Err(Error(ErrorKind::DimensionMismatch(_), _)) => (),
            _ => panic!("expected a dimension mismatch"),
        }
    }
}
