use log::{debug, warn};

use crate::{
    box_controller::BoxController,
    dimension::{DimensionDescriptor, WorkspaceDescription},
    error::{Result, WorkspaceError},
    event::MDEvent,
    transform::CoordinateTransform,
    tree::{BoundingBox, BoxTree, Node},
};

/// Statistics of one box of a workspace, independent of its dimensionality.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxSummary {
    /// Depth of the box, the root has depth 0.
    pub depth: usize,
    /// Extents of the box as `(min, max)` pairs.
    pub extents: Vec<(f64, f64)>,
    /// True if the box holds events directly.
    pub is_leaf: bool,
    /// Number of events in the box and its children.
    pub num_events: usize,
    /// Total signal.
    pub signal: f64,
    /// Total squared error.
    pub error_squared: f64,
    /// Signal-weighted mean coordinate.
    pub centroid: Vec<f64>,
}

/// Capabilities of an event workspace consumed by code that does not know its dimensionality,
/// e.g. binning or visualisation.
///
/// Statistics (signal, error, centroid, box summaries) reflect the last centroid refresh.
pub trait MDWorkspace: Send + Sync {
    /// Number of dimensions of the workspace.
    fn num_dims(&self) -> usize;

    /// Descriptors of the dimensions.
    fn dimensions(&self) -> &[DimensionDescriptor];

    /// Descriptor of the dimension at the given index.
    fn dimension(&self, index: usize) -> Option<&DimensionDescriptor> {
        self.dimensions().get(index)
    }

    /// Extents of the workspace as `(min, max)` pairs, rounded to event coordinate precision.
    fn extents(&self) -> Vec<(f64, f64)>;

    /// Coordinate transform set at creation, if any.
    fn transform(&self) -> Option<&CoordinateTransform>;

    /// Splitting policy of the workspace.
    fn box_controller(&self) -> &BoxController;

    /// Replaces the splitting policy. Existing boxes are kept as they are.
    fn set_box_controller(&mut self, bc: BoxController) -> Result<()>;

    /// Number of events stored.
    fn num_events(&self) -> usize;

    /// Number of boxes, leaves and internal ones.
    fn num_boxes(&self) -> usize;

    /// Total signal.
    fn signal(&self) -> f64;

    /// Total squared error.
    fn error_squared(&self) -> f64;

    /// Signal-weighted mean coordinate of all the events.
    fn centroid(&self) -> Vec<f64>;

    /// Summaries of every box, parents before children.
    fn box_summaries(&self) -> Vec<BoxSummary>;
}

/// Workspace of events with `N` dimensions stored in a [`BoxTree`].
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// let description = WorkspaceDescription::from_parallel(
///     &["x", "y"],
///     &["x", "y"],
///     &["m", "m"],
///     &[-1.0, -1.0],
///     &[1.0, 1.0],
///     &[10, 10],
/// )
/// .unwrap();
///
/// let mut ws = MDEventWorkspace::<2>::new(&description).unwrap();
/// ws.add_events([
///     MDEvent::new(1.0, 1.0, 0, 0, [0.5, 0.5]),
///     MDEvent::new(3.0, 1.0, 0, 1, [-0.5, 0.5]),
/// ]);
/// ws.refresh_centroid();
///
/// assert_eq!(ws.signal(), 4.0);
/// assert_eq!(ws.centroid(), [-0.25, 0.5]);
/// ```
#[derive(Clone, Debug)]
pub struct MDEventWorkspace<const N: usize> {
    dimensions: Vec<DimensionDescriptor>,
    transform: Option<CoordinateTransform>,
    box_controller: BoxController,
    tree: BoxTree<N>,
    num_events: usize,
    dropped_events: usize,
    refreshed: bool,
}

impl<const N: usize> MDEventWorkspace<N> {
    /// Creates a new empty [`MDEventWorkspace`] with the default [`BoxController`].
    ///
    /// Fails if the description does not have exactly `N` dimensions or its transform does not
    /// consume `N` coordinates.
    pub fn new(description: &WorkspaceDescription) -> Result<Self> {
        description.validate()?;
        if description.n_dimensions() != N {
            return Err(WorkspaceError::DimensionMismatch {
                what: "workspace description",
                expected: N,
                found: description.n_dimensions(),
            });
        }

        // Extents are stored at event coordinate precision.
        let dimensions = description.dimensions().to_vec();
        let bbox = BoundingBox::new(
            std::array::from_fn(|d| f64::from(dimensions[d].min() as f32)),
            std::array::from_fn(|d| f64::from(dimensions[d].max() as f32)),
        );

        debug!(
            "created empty {N}-dimensional event workspace over {:?}",
            bbox.extents()
        );

        Ok(Self {
            dimensions,
            transform: description.transform().cloned(),
            box_controller: BoxController::default(),
            tree: BoxTree::with_root(bbox),
            num_events: 0,
            dropped_events: 0,
            refreshed: true,
        })
    }

    /// Adds an event, splitting boxes according to the box controller.
    ///
    /// Events outside the workspace extents are dropped and counted in
    /// [`dropped_events`](Self::dropped_events). Returns true if the event was stored.
    #[inline]
    pub fn add_event(&mut self, event: MDEvent<N>) -> bool {
        let added = self.tree.insert(event, &self.box_controller);
        if added {
            self.num_events += 1;
            self.refreshed = false;
        } else {
            self.dropped_events += 1;
        }
        added
    }

    /// Adds a batch of events, returning how many were stored.
    pub fn add_events<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = MDEvent<N>>,
    {
        let dropped = self.dropped_events;
        let mut added = 0;
        for event in events {
            if self.add_event(event) {
                added += 1;
            }
        }

        let dropped = self.dropped_events - dropped;
        if dropped > 0 {
            warn!("dropped {dropped} events lying outside the workspace extents");
        }

        added
    }

    /// Splits the root box once, whatever the number of events it holds.
    ///
    /// Returns false if the root is already split or the box controller forbids it.
    pub fn split_box(&mut self) -> bool {
        let split = self.tree.split(BoxTree::<N>::ROOT, &self.box_controller);
        self.refreshed &= !split;
        split
    }

    /// Splits every leaf box holding more events than the box controller allows, returning the
    /// number of splits performed.
    pub fn split_all_if_needed(&mut self) -> usize {
        let splits = self.tree.split_all_if_needed(&self.box_controller);
        self.refreshed &= splits == 0;
        splits
    }

    /// Recomputes the signal, error and centroid of every box, from the leaves up.
    pub fn refresh_centroid(&mut self) {
        self.tree.refresh();
        self.refreshed = true;

        debug!(
            "refreshed {} boxes of {N}-dimensional workspace, total signal {}",
            self.tree.len(),
            self.tree.root().signal
        );
    }

    /// Returns true if the cached statistics reflect every stored event.
    #[inline]
    pub const fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    /// Number of events dropped because they lay outside the workspace extents.
    #[inline]
    pub const fn dropped_events(&self) -> usize {
        self.dropped_events
    }

    /// Region covered by the workspace.
    #[inline]
    pub fn bbox(&self) -> &BoundingBox<[f64; N]> {
        &self.tree.root().bbox
    }

    /// Signal-weighted mean coordinate of all the events, as of the last refresh.
    #[inline]
    pub fn centroid(&self) -> [f64; N] {
        self.tree.root().centroid
    }

    /// The box tree holding the events.
    #[inline]
    pub const fn tree(&self) -> &BoxTree<N> {
        &self.tree
    }

    /// Events within the region, bounds included.
    #[inline]
    pub fn events_in(&self, region: &BoundingBox<[f64; N]>) -> Vec<&MDEvent<N>> {
        self.tree.events_in(region)
    }

    /// Total signal and squared error of the events within the region, bounds included.
    #[inline]
    pub fn integrate(&self, region: &BoundingBox<[f64; N]>) -> (f64, f64) {
        self.tree.integrate(region)
    }
}

impl<const N: usize> MDWorkspace for MDEventWorkspace<N> {
    #[inline]
    fn num_dims(&self) -> usize {
        N
    }

    #[inline]
    fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.dimensions
    }

    #[inline]
    fn extents(&self) -> Vec<(f64, f64)> {
        self.bbox().extents().to_vec()
    }

    #[inline]
    fn transform(&self) -> Option<&CoordinateTransform> {
        self.transform.as_ref()
    }

    #[inline]
    fn box_controller(&self) -> &BoxController {
        &self.box_controller
    }

    fn set_box_controller(&mut self, bc: BoxController) -> Result<()> {
        bc.validate_for(N)?;
        self.box_controller = bc;
        Ok(())
    }

    #[inline]
    fn num_events(&self) -> usize {
        self.num_events
    }

    #[inline]
    fn num_boxes(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    fn signal(&self) -> f64 {
        self.tree.root().signal
    }

    #[inline]
    fn error_squared(&self) -> f64 {
        self.tree.root().error_squared
    }

    #[inline]
    fn centroid(&self) -> Vec<f64> {
        self.tree.root().centroid.to_vec()
    }

    fn box_summaries(&self) -> Vec<BoxSummary> {
        self.tree
            .boxes()
            .map(|(_, node, data)| BoxSummary {
                depth: data.depth,
                extents: data.bbox.extents().to_vec(),
                is_leaf: matches!(node, Node::External(_)),
                num_events: data.num_events,
                signal: data.signal,
                error_squared: data.error_squared,
                centroid: data.centroid.to_vec(),
            })
            .collect()
    }
}
