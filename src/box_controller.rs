use crate::error::{Result, WorkspaceError};

/// Largest number of children a single split may create.
pub const MAX_FAN_OUT: usize = 1 << 16;

/// Splitting policy shared by every box of one workspace.
///
/// A leaf box splits once it holds more than [`split_threshold`](Self::split_threshold) events,
/// unless it already sits at [`max_depth`](Self::max_depth). A split divides at most
/// [`max_dim_for_split`](Self::max_dim_for_split) axes into
/// [`split_into`](Self::split_into) slices each. The split axes rotate with depth so that every
/// axis gets refined while fan-out stays bounded for workspaces with many dimensions.
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// let bc = BoxController::default()
///     .with_split_threshold(10)
///     .with_max_dim_for_split(2);
///
/// assert!(bc.will_split(11, 0));
/// assert_eq!(bc.split_axes(4, 0), vec![0, 1]);
/// assert_eq!(bc.split_axes(4, 1), vec![2, 3]);
/// assert_eq!(bc.fan_out(4), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxController {
    split_threshold: usize,
    max_depth: usize,
    split_into: usize,
    max_dim_for_split: usize,
}

impl Default for BoxController {
    #[inline]
    fn default() -> Self {
        Self {
            split_threshold: 1000,
            max_depth: 5,
            split_into: 2,
            max_dim_for_split: 4,
        }
    }
}

impl BoxController {
    /// Creates a new [`BoxController`] with the default policy.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the controller with the given split threshold.
    #[inline]
    pub fn with_split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    /// Returns the controller with the given maximum depth.
    #[inline]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the controller with the given number of slices per split axis.
    #[inline]
    pub fn with_split_into(mut self, split_into: usize) -> Self {
        self.split_into = split_into;
        self
    }

    /// Returns the controller with the given maximum number of axes split at once.
    #[inline]
    pub fn with_max_dim_for_split(mut self, max_dim_for_split: usize) -> Self {
        self.max_dim_for_split = max_dim_for_split;
        self
    }

    /// Sets the number of events above which a leaf box splits.
    #[inline]
    pub fn set_split_threshold(&mut self, split_threshold: usize) {
        self.split_threshold = split_threshold;
    }

    /// Sets the depth at which boxes stop splitting. The root has depth 0.
    #[inline]
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Sets the number of slices each split axis is divided into.
    #[inline]
    pub fn set_split_into(&mut self, split_into: usize) {
        self.split_into = split_into;
    }

    /// Sets the maximum number of axes divided by a single split.
    #[inline]
    pub fn set_max_dim_for_split(&mut self, max_dim_for_split: usize) {
        self.max_dim_for_split = max_dim_for_split;
    }

    /// Number of events above which a leaf box splits.
    #[inline]
    pub const fn split_threshold(&self) -> usize {
        self.split_threshold
    }

    /// Depth at which boxes stop splitting.
    #[inline]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of slices each split axis is divided into.
    #[inline]
    pub const fn split_into(&self) -> usize {
        self.split_into
    }

    /// Maximum number of axes divided by a single split.
    #[inline]
    pub const fn max_dim_for_split(&self) -> usize {
        self.max_dim_for_split
    }

    /// Checks the policy is able to split boxes.
    ///
    /// The number of slices per axis may not exceed [`MAX_FAN_OUT`], see
    /// [`validate_for`](Self::validate_for) for the fan-out of a given dimensionality.
    pub fn validate(&self) -> Result<()> {
        if self.split_into < 2 {
            return Err(WorkspaceError::InvalidBoxController(
                "boxes must be split into at least 2 slices",
            ));
        }

        if self.split_into > MAX_FAN_OUT {
            return Err(WorkspaceError::InvalidBoxController(
                "too many slices per split axis",
            ));
        }

        if self.max_dim_for_split == 0 {
            return Err(WorkspaceError::InvalidBoxController(
                "at least one axis must be split",
            ));
        }

        Ok(())
    }

    /// Checks the policy is able to split boxes with `n_dims` dimensions without creating more
    /// than [`MAX_FAN_OUT`] children at once.
    pub fn validate_for(&self, n_dims: usize) -> Result<()> {
        self.validate()?;

        if self.fan_out(n_dims) > MAX_FAN_OUT {
            return Err(WorkspaceError::InvalidBoxController(
                "a split would create too many children",
            ));
        }

        Ok(())
    }

    /// Returns true if a leaf holding `num_events` events at `depth` has to split.
    #[inline]
    pub const fn will_split(&self, num_events: usize, depth: usize) -> bool {
        num_events > self.split_threshold && depth < self.max_depth
    }

    /// Number of axes divided when splitting a box with `n_dims` dimensions.
    #[inline]
    pub fn axes_per_split(&self, n_dims: usize) -> usize {
        n_dims.min(self.max_dim_for_split)
    }

    /// Axes, in ascending order, divided when splitting a box with `n_dims` dimensions at the
    /// given depth.
    pub fn split_axes(&self, n_dims: usize, depth: usize) -> Vec<usize> {
        if n_dims == 0 {
            return Vec::new();
        }

        let k = self.axes_per_split(n_dims);
        let start = (depth * k) % n_dims;

        let mut axes: Vec<_> = (0..k).map(|j| (start + j) % n_dims).collect();
        axes.sort_unstable();
        axes
    }

    /// Number of children created when splitting a box with `n_dims` dimensions, saturating at
    /// `usize::MAX`.
    #[inline]
    pub fn fan_out(&self, n_dims: usize) -> usize {
        let k = u32::try_from(self.axes_per_split(n_dims)).unwrap_or(u32::MAX);
        self.split_into.saturating_pow(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let bc = BoxController::default();

        assert_eq!(bc.split_threshold(), 1000);
        assert_eq!(bc.max_depth(), 5);
        assert_eq!(bc.split_into(), 2);
        assert_eq!(bc.max_dim_for_split(), 4);
        assert_eq!(bc.validate(), Ok(()));
        assert_eq!(bc.fan_out(3), 8);
        assert_eq!(bc.fan_out(9), 16);
    }

    #[test]
    fn will_split_respects_depth() {
        let bc = BoxController::new()
            .with_split_threshold(2)
            .with_max_depth(3);

        assert!(!bc.will_split(2, 0));
        assert!(bc.will_split(3, 0));
        assert!(bc.will_split(3, 2));
        assert!(!bc.will_split(3, 3));
    }

    #[test]
    fn split_axes_rotate_with_depth() {
        let bc = BoxController::new().with_max_dim_for_split(3);

        assert_eq!(bc.split_axes(9, 0), vec![0, 1, 2]);
        assert_eq!(bc.split_axes(9, 1), vec![3, 4, 5]);
        assert_eq!(bc.split_axes(9, 2), vec![6, 7, 8]);
        assert_eq!(bc.split_axes(9, 3), vec![0, 1, 2]);

        // Wraps around when the dimension count is not a multiple of the axes per split.
        assert_eq!(bc.split_axes(4, 1), vec![0, 1, 3]);

        // Fewer dimensions than the cap splits every axis at every depth.
        assert_eq!(bc.split_axes(2, 0), vec![0, 1]);
        assert_eq!(bc.split_axes(2, 5), vec![0, 1]);
    }

    #[test]
    fn invalid_policies() {
        let mut bc = BoxController::new();
        bc.set_split_into(1);
        assert!(matches!(
            bc.validate(),
            Err(WorkspaceError::InvalidBoxController(_))
        ));

        let bc = BoxController::new().with_max_dim_for_split(0);
        assert!(matches!(
            bc.validate(),
            Err(WorkspaceError::InvalidBoxController(_))
        ));

        let bc = BoxController::new().with_split_into(MAX_FAN_OUT + 1);
        assert!(matches!(
            bc.validate(),
            Err(WorkspaceError::InvalidBoxController(_))
        ));
    }

    #[test]
    fn fan_out_is_bounded() {
        let bc = BoxController::new().with_split_into(1 << 20);
        assert_eq!(bc.fan_out(4), usize::MAX);
        assert!(bc.validate_for(4).is_err());

        // 16^4 children is exactly the cap, 16^5 is over it.
        let bc = BoxController::new()
            .with_split_into(16)
            .with_max_dim_for_split(5);
        assert_eq!(bc.validate_for(4), Ok(()));
        assert!(bc.validate_for(5).is_err());

        // Only the axes actually split count.
        let bc = BoxController::new()
            .with_split_into(1000)
            .with_max_dim_for_split(9);
        assert_eq!(bc.validate_for(1), Ok(()));
        assert!(bc.validate_for(2).is_err());
    }
}
