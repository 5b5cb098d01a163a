/// Bounding box related types.
pub mod partition;

use std::ops::Range;

use log::trace;

use crate::{box_controller::BoxController, event::MDEvent};

pub use partition::*;

/// Index of a [`Node`] in a [`Tree`].
pub type NodeID = u32;

/// Generic tree data structure.
#[derive(Clone, Debug)]
pub struct Tree<Node, Data> {
    /// Vector of `Node` objects that define the structure of the tree.
    pub nodes: Vec<Node>,

    /// Vector of generic `Data` objects that contain information about the associated `Node`.
    ///
    /// The `data` vector is parallel to the `nodes` vector, so the `i`-th element of the `data`
    /// vector corresponds to the `i`-th element of the `nodes` vector.
    pub data: Vec<Data>,
}

impl<Node, Data> Tree<Node, Data> {
    /// Creates a new empty [`Tree`].
    #[inline]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<Node, Data> Default for Tree<Node, Data> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Contiguous range of children created by one split, along with how the split was made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Children {
    /// Id of the first child.
    pub first: NodeID,
    /// Axes that were divided.
    pub axes: Axes,
    /// Number of slices each divided axis was split into.
    pub split_into: u32,
}

impl Children {
    /// Number of children.
    #[inline]
    pub fn len(&self) -> usize {
        (self.split_into as usize).pow(self.axes.len() as u32)
    }

    /// Returns true if the split produced no children, which never happens for a valid split.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the children as a range of indices in the tree.
    #[inline]
    pub fn ids(&self) -> Range<usize> {
        let first = self.first as usize;
        first..first + self.len()
    }
}

/// Box of a [`BoxTree`], either split into children or holding events.
#[derive(Clone, Debug, PartialEq)]
pub enum Node<const N: usize> {
    /// Box split into children.
    Internal(Children),
    /// Leaf box holding its events.
    External(Vec<MDEvent<N>>),
}

/// Extents of a box and its statistics.
///
/// Statistics are only valid after [`BoxTree::refresh`] and until the next insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxData<const N: usize> {
    /// Region covered by the box.
    pub bbox: BoundingBox<[f64; N]>,
    /// Depth of the box, the root has depth 0.
    pub depth: usize,
    /// Number of events in the box and its children.
    pub num_events: usize,
    /// Total signal.
    pub signal: f64,
    /// Total squared error.
    pub error_squared: f64,
    /// Signal-weighted mean coordinate, the geometric center when the total signal is zero.
    pub centroid: [f64; N],
}

impl<const N: usize> BoxData<N> {
    /// Creates a new [`BoxData`] with empty statistics.
    #[inline]
    pub fn new(bbox: BoundingBox<[f64; N]>, depth: usize) -> Self {
        Self {
            depth,
            num_events: 0,
            signal: 0.0,
            error_squared: 0.0,
            centroid: bbox.center(),
            bbox,
        }
    }

    /// Computes the statistics of a leaf box directly from its events.
    fn compute_leaf(&mut self, events: &[MDEvent<N>]) {
        let mut signal = 0.0;
        let mut error_squared = 0.0;
        let mut weighted = [0.0; N];

        for event in events {
            let s = f64::from(event.signal());
            signal += s;
            error_squared += f64::from(event.error_squared());
            for (w, &x) in weighted.iter_mut().zip(event.center()) {
                *w += s * f64::from(x);
            }
        }

        self.set(events.len(), signal, error_squared, weighted);
    }

    /// Computes the statistics of an internal box from its already refreshed children.
    fn compute_internal(&mut self, children: &[Self]) {
        let mut num_events = 0;
        let mut signal = 0.0;
        let mut error_squared = 0.0;
        let mut weighted = [0.0; N];

        for child in children {
            num_events += child.num_events;
            signal += child.signal;
            error_squared += child.error_squared;
            for (w, &c) in weighted.iter_mut().zip(&child.centroid) {
                *w += child.signal * c;
            }
        }

        self.set(num_events, signal, error_squared, weighted);
    }

    #[inline]
    fn set(&mut self, num_events: usize, signal: f64, error_squared: f64, weighted: [f64; N]) {
        self.num_events = num_events;
        self.signal = signal;
        self.error_squared = error_squared;
        self.centroid = if signal != 0.0 {
            weighted.map(|w| w / signal)
        } else {
            self.bbox.center()
        };
    }
}

/// Tree of boxes partitioning the space of a workspace with `N` dimensions.
///
/// The root is node 0 and covers the whole workspace. The children of a split are allocated
/// together, after their parent, so every child has a larger id than its parent.
pub type BoxTree<const N: usize> = Tree<Node<N>, BoxData<N>>;

impl<const N: usize> BoxTree<N> {
    /// Id of the root box.
    pub const ROOT: NodeID = 0;

    /// Creates a new [`BoxTree`] made of a single empty leaf covering the given box.
    #[inline]
    pub fn with_root(bbox: BoundingBox<[f64; N]>) -> Self {
        let mut tree = Self::new();
        tree.nodes.push(Node::External(Vec::new()));
        tree.data.push(BoxData::new(bbox, 0));
        tree
    }

    /// Data of the root box.
    #[inline]
    pub fn root(&self) -> &BoxData<N> {
        &self.data[Self::ROOT as usize]
    }

    /// Id of the leaf whose extents hold the given position.
    ///
    /// Positions outside the root are routed to the nearest leaf.
    pub fn locate(&self, position: &[f32; N]) -> NodeID {
        let mut id = Self::ROOT as usize;
        while let Node::Internal(children) = &self.nodes[id] {
            id = children.first as usize
                + self.data[id].bbox.child_index(
                    position,
                    children.axes,
                    children.split_into as usize,
                );
        }
        id as NodeID
    }

    /// Inserts an event, splitting the leaf it lands in if the box controller requires it.
    ///
    /// Returns false, and leaves the tree untouched, if the event lies outside the root.
    pub fn insert(&mut self, event: MDEvent<N>, bc: &BoxController) -> bool {
        if !self.root().bbox.contains(event.center()) {
            return false;
        }

        let id = self.locate(event.center());
        let Node::External(events) = &mut self.nodes[id as usize] else {
            unreachable!("located nodes are leaves");
        };
        events.push(event);

        let len = events.len();
        if bc.will_split(len, self.data[id as usize].depth) {
            self.split(id, bc);
        }

        true
    }

    /// Splits a leaf into children according to the box controller and moves its events into
    /// them, splitting the children again while they are still over the threshold.
    ///
    /// Does nothing and returns false if the node is not a leaf, is already at maximum depth, or
    /// the box controller is not valid for `N` dimensions.
    pub fn split(&mut self, id: NodeID, bc: &BoxController) -> bool {
        if bc.validate_for(N).is_err() || !self.split_leaf(id, bc) {
            return false;
        }

        let mut pending = vec![id];
        while let Some(parent) = pending.pop() {
            let Node::Internal(children) = &self.nodes[parent as usize] else {
                continue;
            };
            let children = *children;

            for child in children.ids() {
                let over = match &self.nodes[child] {
                    Node::External(events) => bc.will_split(events.len(), self.data[child].depth),
                    Node::Internal(_) => false,
                };

                if over && self.split_leaf(child as NodeID, bc) {
                    pending.push(child as NodeID);
                }
            }
        }

        true
    }

    /// Splits a single leaf, leaving its children as they are.
    fn split_leaf(&mut self, id: NodeID, bc: &BoxController) -> bool {
        let index = id as usize;
        let depth = self.data[index].depth;
        if depth >= bc.max_depth() {
            return false;
        }

        let Node::External(events) = &mut self.nodes[index] else {
            return false;
        };
        let events = std::mem::take(events);

        let bbox = self.data[index].bbox;
        let axes = Axes::new(&bc.split_axes(N, depth));
        let split_into = bc.split_into();
        let children = Children {
            first: self.nodes.len() as NodeID,
            axes,
            split_into: split_into as u32,
        };

        for child in bbox.subdivide(axes, split_into) {
            self.nodes.push(Node::External(Vec::new()));
            self.data.push(BoxData::new(child, depth + 1));
        }

        for event in events {
            let child = children.first as usize + bbox.child_index(event.center(), axes, split_into);
            if let Node::External(events) = &mut self.nodes[child] {
                events.push(event);
            }
        }

        self.nodes[index] = Node::Internal(children);
        trace!(
            "split box {id} at depth {depth} into {} children",
            children.len()
        );

        true
    }

    /// Splits every leaf over the box controller's threshold.
    ///
    /// Returns the number of splits performed.
    pub fn split_all_if_needed(&mut self, bc: &BoxController) -> usize {
        if bc.validate_for(N).is_err() {
            return 0;
        }

        let mut splits = 0;
        let mut id = 0;

        // Children are appended, so they are visited after their parent.
        while id < self.nodes.len() {
            if let Node::External(events) = &self.nodes[id] {
                if bc.will_split(events.len(), self.data[id].depth)
                    && self.split_leaf(id as NodeID, bc)
                {
                    splits += 1;
                }
            }
            id += 1;
        }

        splits
    }

    /// Recomputes the statistics of every box.
    ///
    /// Leaves are computed from their events, internal boxes from their children, so every event
    /// is visited once.
    pub fn refresh(&mut self) {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            self.nodes
                .par_iter()
                .zip(self.data.par_iter_mut())
                .for_each(|(node, data)| {
                    if let Node::External(events) = node {
                        data.compute_leaf(events);
                    }
                });
        }

        #[cfg(not(feature = "parallel"))]
        for (node, data) in self.nodes.iter().zip(self.data.iter_mut()) {
            if let Node::External(events) = node {
                data.compute_leaf(events);
            }
        }

        for id in (0..self.nodes.len()).rev() {
            if let Node::Internal(children) = &self.nodes[id] {
                let (parents, rest) = self.data.split_at_mut(children.first as usize);
                parents[id].compute_internal(&rest[..children.len()]);
            }
        }
    }

    /// Iterates over every box with its id.
    #[inline]
    pub fn boxes(&self) -> impl Iterator<Item = (NodeID, &Node<N>, &BoxData<N>)> {
        self.nodes
            .iter()
            .zip(&self.data)
            .enumerate()
            .map(|(id, (node, data))| (id as NodeID, node, data))
    }

    /// Iterates over the leaves with their events.
    #[inline]
    pub fn leaves(&self) -> impl Iterator<Item = (&BoxData<N>, &[MDEvent<N>])> {
        self.nodes
            .iter()
            .zip(&self.data)
            .filter_map(|(node, data)| match node {
                Node::External(events) => Some((data, events.as_slice())),
                Node::Internal(_) => None,
            })
    }

    /// Iterates over every event of the tree.
    #[inline]
    pub fn events(&self) -> impl Iterator<Item = &MDEvent<N>> {
        self.leaves().flat_map(|(_, events)| events)
    }

    /// Number of events held by the leaves.
    #[inline]
    pub fn num_events(&self) -> usize {
        self.leaves().map(|(_, events)| events.len()).sum()
    }

    /// Number of leaves.
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves().count()
    }

    /// Depth of the deepest box.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.data.iter().map(|data| data.depth).max().unwrap_or(0)
    }

    /// Collects the events whose coordinates lie within the region, bounds included.
    ///
    /// Boxes not intersecting the region are skipped entirely.
    pub fn events_in(&self, region: &BoundingBox<[f64; N]>) -> Vec<&MDEvent<N>> {
        let mut result = Vec::new();
        let mut stack = vec![Self::ROOT as usize];

        while let Some(id) = stack.pop() {
            if !self.data[id].bbox.intersects(region) {
                continue;
            }

            match &self.nodes[id] {
                Node::Internal(children) => stack.extend(children.ids()),
                Node::External(events) => result.extend(
                    events
                        .iter()
                        .filter(|event| region.contains(event.center())),
                ),
            }
        }

        result
    }

    /// Total signal and squared error of the events within the region, bounds included.
    pub fn integrate(&self, region: &BoundingBox<[f64; N]>) -> (f64, f64) {
        self.events_in(region)
            .into_iter()
            .fold((0.0, 0.0), |(signal, error_squared), event| {
                (
                    signal + f64::from(event.signal()),
                    error_squared + f64::from(event.error_squared()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn cube() -> BoundingBox<[f64; 3]> {
        BoundingBox::new([0.0; 3], [10.0; 3])
    }

    fn random_events(count: usize, seed: u64) -> Vec<MDEvent<3>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let center = std::array::from_fn(|_| rng.gen_range(0.0..=10.0));
                MDEvent::new(rng.gen_range(0.5..2.0), 0.5, 1, i as u32, center)
            })
            .collect()
    }

    /// Checks every event sits in a leaf whose extents hold it and children tile their parent.
    fn check_structure(tree: &BoxTree<3>) {
        for (data, events) in tree.leaves() {
            for event in events {
                assert!(data.bbox.contains(event.center()));
            }
        }

        let volume = |b: &BoundingBox<[f64; 3]>| b.size().iter().product::<f64>();
        for (id, node, data) in tree.boxes() {
            if let Node::Internal(children) = node {
                assert!(children.first > id);
                let total: f64 = children.ids().map(|c| volume(&tree.data[c].bbox)).sum();
                assert_relative_eq!(total, volume(&data.bbox), max_relative = 1e-9);
                for c in children.ids() {
                    assert!(data.bbox.contains_box(&tree.data[c].bbox));
                    assert_eq!(tree.data[c].depth, data.depth + 1);
                }
            }
        }
    }

    #[test]
    fn insert_without_split() {
        let bc = BoxController::default();
        let mut tree = BoxTree::with_root(cube());

        for event in random_events(100, 1) {
            assert!(tree.insert(event, &bc));
        }

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.num_events(), 100);
    }

    #[test]
    fn threshold_split_keeps_every_event() {
        let bc = BoxController::default().with_split_threshold(16);
        let mut tree = BoxTree::with_root(cube());
        let events = random_events(2000, 2);

        for &event in &events {
            tree.insert(event, &bc);
        }

        assert!(tree.len() > 1);
        assert_eq!(tree.num_events(), events.len());
        check_structure(&tree);

        for (data, events) in tree.leaves() {
            assert!(events.len() <= 16 || data.depth == bc.max_depth());
        }
    }

    #[test]
    fn out_of_range_events_are_rejected() {
        let bc = BoxController::default();
        let mut tree = BoxTree::with_root(cube());

        assert!(!tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [10.5, 1.0, 1.0]), &bc));
        assert!(!tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [-0.1, 1.0, 1.0]), &bc));
        assert!(!tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [f32::NAN, 1.0, 1.0]), &bc));
        assert!(tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [10.0, 10.0, 10.0]), &bc));

        assert_eq!(tree.num_events(), 1);
    }

    #[test]
    fn identical_events_stop_at_max_depth() {
        let bc = BoxController::default()
            .with_split_threshold(4)
            .with_max_depth(3);
        let mut tree = BoxTree::with_root(cube());

        for _ in 0..50 {
            tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [2.0, 2.0, 2.0]), &bc);
        }

        assert_eq!(tree.max_depth(), 3);
        assert_eq!(tree.num_events(), 50);
        // 1 root + 3 levels of 8 children.
        assert_eq!(tree.len(), 1 + 3 * 8);
    }

    #[test]
    fn explicit_split_pass() {
        let lazy = BoxController::default().with_split_threshold(usize::MAX);
        let bc = BoxController::default().with_split_threshold(32);
        let mut tree = BoxTree::with_root(cube());
        let events = random_events(1000, 3);

        for &event in &events {
            tree.insert(event, &lazy);
        }
        assert_eq!(tree.len(), 1);

        tree.refresh();
        let before = tree.root().clone();

        assert!(tree.split_all_if_needed(&bc) > 0);
        assert_eq!(tree.split_all_if_needed(&bc), 0);
        check_structure(&tree);

        tree.refresh();
        let after = tree.root();

        assert_eq!(before.num_events, after.num_events);
        assert_relative_eq!(before.signal, after.signal, max_relative = 1e-12);
        assert_relative_eq!(before.error_squared, after.error_squared, max_relative = 1e-12);
        for d in 0..3 {
            assert_relative_eq!(before.centroid[d], after.centroid[d], max_relative = 1e-9);
        }
    }

    #[test]
    fn refresh_matches_direct_sums() {
        let bc = BoxController::default().with_split_threshold(8);
        let mut tree = BoxTree::with_root(cube());
        let events = random_events(500, 4);

        for &event in &events {
            tree.insert(event, &bc);
        }
        tree.refresh();

        let signal: f64 = events.iter().map(|e| f64::from(e.signal())).sum();
        let error_squared: f64 = events.iter().map(|e| f64::from(e.error_squared())).sum();
        let centroid: [f64; 3] = std::array::from_fn(|d| {
            events
                .iter()
                .map(|e| f64::from(e.signal()) * f64::from(e.center()[d]))
                .sum::<f64>()
                / signal
        });

        let root = tree.root();
        assert_eq!(root.num_events, 500);
        assert_relative_eq!(root.signal, signal, max_relative = 1e-12);
        assert_relative_eq!(root.error_squared, error_squared, max_relative = 1e-12);
        for d in 0..3 {
            assert_relative_eq!(root.centroid[d], centroid[d], max_relative = 1e-9);
        }

        // Every internal box agrees with a direct scan of its subtree.
        fn subtree_signal(tree: &BoxTree<3>, id: usize) -> f64 {
            match &tree.nodes[id] {
                Node::Internal(children) => children.ids().map(|c| subtree_signal(tree, c)).sum(),
                Node::External(events) => events.iter().map(|e| f64::from(e.signal())).sum(),
            }
        }

        for (id, _, data) in tree.boxes() {
            assert_relative_eq!(
                data.signal,
                subtree_signal(&tree, id as usize),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn deep_policy_on_coincident_events() {
        let bc = BoxController::default()
            .with_split_threshold(1)
            .with_max_depth(100_000);
        let mut tree = BoxTree::with_root(BoundingBox::new([0.0], [1.0]));

        assert!(tree.insert(MDEvent::new(1.0, 1.0, 0, 0, [0.3]), &bc));
        assert!(tree.insert(MDEvent::new(1.0, 1.0, 0, 1, [0.3]), &bc));

        assert_eq!(tree.max_depth(), 100_000);
        assert_eq!(tree.len(), 1 + 2 * 100_000);
        assert_eq!(tree.num_events(), 2);

        tree.refresh();
        assert_eq!(tree.root().num_events, 2);
    }

    #[test]
    fn oversized_fan_out_does_not_split() {
        let bc = BoxController::default()
            .with_split_threshold(1)
            .with_split_into(1 << 20);
        let mut tree = BoxTree::with_root(cube());

        for event in random_events(10, 5) {
            assert!(tree.insert(event, &bc));
        }

        assert!(!tree.split(BoxTree::<3>::ROOT, &bc));
        assert_eq!(tree.split_all_if_needed(&bc), 0);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.num_events(), 10);
    }

    #[test]
    fn zero_signal_centroid_is_box_center() {
        let mut tree = BoxTree::with_root(cube());
        tree.insert(
            MDEvent::new(0.0, 0.0, 0, 0, [1.0, 1.0, 1.0]),
            &BoxController::default(),
        );
        tree.refresh();

        assert_eq!(tree.root().centroid, [5.0, 5.0, 5.0]);
        assert_eq!(tree.root().num_events, 1);
    }

    #[test]
    fn range_queries() {
        let bc = BoxController::default().with_split_threshold(8);
        let mut tree = BoxTree::with_root(cube());
        let events = random_events(800, 5);

        for &event in &events {
            tree.insert(event, &bc);
        }

        let region = BoundingBox::new([2.0, 3.0, 0.0], [6.5, 10.0, 4.0]);
        let expected: Vec<_> = events
            .iter()
            .filter(|e| region.contains(e.center()))
            .collect();

        let mut found = tree.events_in(&region);
        assert_eq!(found.len(), expected.len());

        found.sort_by_key(|e| e.detector_id());
        for (a, b) in found.iter().zip(&expected) {
            assert_eq!(a, b);
        }

        let (signal, _) = tree.integrate(&region);
        let direct: f64 = expected.iter().map(|e| f64::from(e.signal())).sum();
        assert_relative_eq!(signal, direct, max_relative = 1e-12);

        assert_eq!(tree.events_in(&BoundingBox::new([11.0; 3], [12.0; 3])).len(), 0);
    }
}
