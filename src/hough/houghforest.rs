/// The (already trained) hough forest and the data stored in its leafs.
///
/// For literature see
/// * https://pages.iai.uni-bonn.de/gall_juergen/download/jgall_houghforest_cvpr09.pdf

use std::convert::TryFrom;
use std::io::Read;
use serde_json;
use errors::*;
use features::PatchView;
use types::PatchSize;

/// Largest absolute center offset (in pixels) a leaf may store
pub const MAX_CENTER_OFFSET: i32 = 1 << 20;

/// Displacement from the center of a patch to the center of the object
/// (in pixels) which was observed while training.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub fn new(x: i32, y: i32) -> Offset {
        Offset { x: x, y: y }
    }
}

/// A leaf is made up of the probability to be a part of the object (foreground)
/// and of the offsets to the object centers of the training patches reaching it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LeafNode {
    pub pfg: f32,
    pub centers: Vec<Offset>,
}

impl LeafNode {
    pub fn new(pfg: f32, centers: Vec<Offset>) -> LeafNode {
        LeafNode {
            pfg: pfg,
            centers: centers,
        }
    }
}

/// The leafs reached by a single patch, one for every tree (in tree order).
pub type LeafBundle<'a> = Vec<&'a LeafNode>;

/// A trained forest which maps a patch to a leaf of each of its trees.
/// The forest is only read, so it may be shared among several detections.
pub trait Forest: Send + Sync {
    /// Returns the leaf of every tree this patch falls into.
    fn regress<'a>(&'a self, patch: &PatchView) -> LeafBundle<'a>;

    fn num_trees(&self) -> usize;

    /// Number of center offsets stored in all leafs.
    fn num_trained_centers(&self) -> usize;

    /// Fails if the forest can not handle patches of the given size
    /// or feature channels of the given count.
    fn check_compatible(&self, _patch: PatchSize, _channel_count: usize) -> Result<()> {
        Ok(())
    }
}

/// Binary test of a node: compares two pixels of a feature channel inside the patch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PixelTest {
    pub channel: usize,
    /// first pixel (x,y) relative to the upper left corner of the patch
    pub a: [u32; 2],
    /// second pixel (x,y) relative to the upper left corner of the patch
    pub b: [u32; 2],
    pub threshold: i32,
}

impl PixelTest {
    /// True if the patch belongs to the left child
    #[inline]
    fn goes_left(&self, patch: &PatchView) -> bool {
        let va = patch.value(self.channel, self.a[0], self.a[1]) as i32;
        let vb = patch.value(self.channel, self.b[0], self.b[1]) as i32;
        va - vb < self.threshold
    }

    fn fits(&self, patch: PatchSize, channel_count: usize) -> bool {
        self.channel < channel_count && self.a[0] < patch.width && self.b[0] < patch.width &&
        self.a[1] < patch.height && self.b[1] < patch.height
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum Node {
    Split {
        test: PixelTest,
        left: usize,
        right: usize,
    },
    /// index of the leaf
    Leaf(usize),
}

/// A tree stored as flat list of nodes, the first one is the root.
/// Children are always stored behind their parent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PixelTestTree {
    nodes: Vec<Node>,
    leafs: Vec<LeafNode>,
}

impl PixelTestTree {
    pub fn new(nodes: Vec<Node>, leafs: Vec<LeafNode>) -> PixelTestTree {
        PixelTestTree {
            nodes: nodes,
            leafs: leafs,
        }
    }

    /// A tree which consists of a single leaf.
    pub fn single_leaf(leaf: LeafNode) -> PixelTestTree {
        PixelTestTree::new(vec![Node::Leaf(0)], vec![leaf])
    }

    pub fn leafs(&self) -> &[LeafNode] {
        &self.leafs
    }

    fn leaf_for(&self, patch: &PatchView) -> &LeafNode {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Split { ref test, left, right } => {
                    idx = if test.goes_left(patch) { left } else { right };
                }
                Node::Leaf(leaf) => return &self.leafs[leaf],
            }
        }
    }

    fn validate(&self, nr: usize, patch: PatchSize, channel_count: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!(ErrorKind::InvalidForest(format!("tree {} has no nodes", nr)));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split { ref test, left, right } => {
                    if !test.fits(patch, channel_count) {
                        bail!(ErrorKind::InvalidForest(format!("test of node {} in tree {} lies \
                                                                outside of a {}x{} patch with {} \
                                                                channels",
                                                               i,
                                                               nr,
                                                               patch.width,
                                                               patch.height,
                                                               channel_count)));
                    }
                    // Forcing children behind their parent keeps every path finite
                    for &child in [left, right].iter() {
                        if child <= i || child >= self.nodes.len() {
                            bail!(ErrorKind::InvalidForest(format!("node {} in tree {} has an \
                                                                    invalid child {}",
                                                                   i,
                                                                   nr,
                                                                   child)));
                        }
                    }
                }
                Node::Leaf(leaf) => {
                    if leaf >= self.leafs.len() {
                        bail!(ErrorKind::InvalidForest(format!("node {} in tree {} refers to \
                                                                missing leaf {}",
                                                               i,
                                                               nr,
                                                               leaf)));
                    }
                }
            }
        }
        let within = |v: i32| v >= -MAX_CENTER_OFFSET && v <= MAX_CENTER_OFFSET;
        if let Some(o) = self.leafs
            .iter()
            .flat_map(|l| l.centers.iter())
            .find(|o| !within(o.x) || !within(o.y)) {
            bail!(ErrorKind::InvalidForest(format!("center offset ({}, {}) of tree {} exceeds {}",
                                                   o.x,
                                                   o.y,
                                                   nr,
                                                   MAX_CENTER_OFFSET)));
        }
        if let Some(leaf) = self.leafs.iter().find(|l| !(l.pfg >= 0.0 && l.pfg <= 1.0)) {
            bail!(ErrorKind::InvalidForest(format!("leaf probability {} of tree {} is not \
                                                    within [0, 1]",
                                                   leaf.pfg,
                                                   nr)));
        }
        Ok(())
    }
}

/// A hough forest whose nodes compare two pixel values of a feature channel.
/// Deserializing validates the trees just like `new` does.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "StoredForest")]
pub struct PixelTestForest {
    patch: PatchSize,
    channel_count: usize,
    trees: Vec<PixelTestTree>,
}

/// Layout of a stored forest before its trees are validated
#[derive(Deserialize)]
struct StoredForest {
    patch: PatchSize,
    channel_count: usize,
    trees: Vec<PixelTestTree>,
}

impl TryFrom<StoredForest> for PixelTestForest {
    type Error = Error;

    fn try_from(stored: StoredForest) -> Result<PixelTestForest> {
        PixelTestForest::new(stored.patch, stored.channel_count, stored.trees)
    }
}

impl PixelTestForest {
    /// Creates a forest for patches of the size `patch` over `channel_count` feature channels.
    /// Fails if some tree is malformed.
    pub fn new(patch: PatchSize,
               channel_count: usize,
               trees: Vec<PixelTestTree>)
               -> Result<PixelTestForest> {
        let forest = PixelTestForest {
            patch: patch,
            channel_count: channel_count,
            trees: trees,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Loads a forest stored as json.
    pub fn from_reader<R: Read>(reader: R) -> Result<PixelTestForest> {
        let forest: PixelTestForest = serde_json::from_reader(reader)?;
        info!("Loaded forest with {} trees and {} centers",
              forest.num_trees(),
              forest.num_trained_centers());
        Ok(forest)
    }

    pub fn patch_size(&self) -> PatchSize {
        self.patch
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn trees(&self) -> &[PixelTestTree] {
        &self.trees
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!(ErrorKind::InvalidForest("forest has no trees".to_string()));
        }
        for (nr, tree) in self.trees.iter().enumerate() {
            tree.validate(nr, self.patch, self.channel_count)?;
        }
        Ok(())
    }
}

impl Forest for PixelTestForest {
    fn regress<'a>(&'a self, patch: &PatchView) -> LeafBundle<'a> {
        self.trees.iter().map(|t| t.leaf_for(patch)).collect()
    }

    fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn num_trained_centers(&self) -> usize {
        self.trees
            .iter()
            .flat_map(|t| t.leafs.iter())
            .map(|l| l.centers.len())
            .sum()
    }

    fn check_compatible(&self, patch: PatchSize, channel_count: usize) -> Result<()> {
        if patch != self.patch || channel_count != self.channel_count {
            bail!(ErrorKind::DimensionMismatch(format!("forest expects {}x{} patches with {} \
                                                        channels, got {}x{} patches with {} \
                                                        channels",
                                                       self.patch.width,
                                                       self.patch.height,
                                                       self.channel_count,
                                                       patch.width,
                                                       patch.height,
                                                       channel_count)));
        }
        Ok(())
    }
}
