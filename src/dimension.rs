use crate::{
    error::{Result, WorkspaceError},
    transform::CoordinateTransform,
    MAX_DIM,
};

/// Number of bins given to every dimension when none are provided.
pub const DEFAULT_NUM_BINS: usize = 10;

/// Immutable description of one axis of a workspace.
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// let qx = DimensionDescriptor::new("Q_x", "qx", "Angstrom^-1", -5.0, 5.0, 100).unwrap();
///
/// assert_eq!(qx.width(), 10.0);
/// assert!(DimensionDescriptor::new("Q_x", "qx", "Angstrom^-1", 5.0, -5.0, 100).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DimensionDescriptor {
    name: String,
    id: String,
    units: String,
    min: f64,
    max: f64,
    num_bins: usize,
}

impl DimensionDescriptor {
    /// Creates a new [`DimensionDescriptor`], failing if `min < max` or `num_bins >= 1` does not
    /// hold.
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        units: impl Into<String>,
        min: f64,
        max: f64,
        num_bins: usize,
    ) -> Result<Self> {
        let name = name.into();

        // Also rejects NaN bounds.
        if !(min < max) {
            return Err(WorkspaceError::InvalidDescriptor {
                name,
                reason: "min must be smaller than max",
            });
        }

        if num_bins == 0 {
            return Err(WorkspaceError::InvalidDescriptor {
                name,
                reason: "at least one bin is needed",
            });
        }

        Ok(Self {
            name,
            id: id.into(),
            units: units.into(),
            min,
            max,
            num_bins,
        })
    }

    /// Human readable name of the dimension.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique identifier of the dimension.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Units the coordinates along this dimension are expressed in.
    #[inline]
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Lower bound of the dimension.
    #[inline]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound of the dimension.
    #[inline]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Number of bins used when the dimension is histogrammed.
    #[inline]
    pub const fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Width of the dimension, `max - min`.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Everything needed to create an empty workspace: its dimensions and an optional coordinate
/// transform.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkspaceDescription {
    dimensions: Vec<DimensionDescriptor>,
    transform: Option<CoordinateTransform>,
}

impl WorkspaceDescription {
    /// Creates a new [`WorkspaceDescription`] with the given dimensions and no transform.
    #[inline]
    pub fn new(dimensions: Vec<DimensionDescriptor>) -> Self {
        Self {
            dimensions,
            transform: None,
        }
    }

    /// Builds a [`WorkspaceDescription`] from parallel slices, one element per dimension.
    ///
    /// An empty `num_bins` slice gives every dimension [`DEFAULT_NUM_BINS`] bins.
    ///
    /// # Example
    /// ```
    /// # use mdevents::prelude::*;
    /// let description = WorkspaceDescription::from_parallel(
    ///     &["Q_x", "Q_y"],
    ///     &["qx", "qy"],
    ///     &["A^-1", "A^-1"],
    ///     &[-1.0, -1.0],
    ///     &[1.0, 1.0],
    ///     &[],
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(description.n_dimensions(), 2);
    /// assert_eq!(description.dimensions()[1].num_bins(), 10);
    /// ```
    pub fn from_parallel<S: AsRef<str>>(
        names: &[S],
        ids: &[S],
        units: &[S],
        mins: &[f64],
        maxs: &[f64],
        num_bins: &[usize],
    ) -> Result<Self> {
        let n = names.len();
        let lengths = [
            ("dimension id list", ids.len()),
            ("dimension unit list", units.len()),
            ("dimension minimum list", mins.len()),
            ("dimension maximum list", maxs.len()),
        ];

        for (what, found) in lengths {
            if found != n {
                return Err(WorkspaceError::DimensionMismatch {
                    what,
                    expected: n,
                    found,
                });
            }
        }

        if !num_bins.is_empty() && num_bins.len() != n {
            return Err(WorkspaceError::DimensionMismatch {
                what: "bin count list",
                expected: n,
                found: num_bins.len(),
            });
        }

        let dimensions = (0..n)
            .map(|d| {
                DimensionDescriptor::new(
                    names[d].as_ref(),
                    ids[d].as_ref(),
                    units[d].as_ref(),
                    mins[d],
                    maxs[d],
                    num_bins.get(d).copied().unwrap_or(DEFAULT_NUM_BINS),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(dimensions))
    }

    /// Returns the description with the given coordinate transform.
    #[inline]
    pub fn with_transform(mut self, transform: CoordinateTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Number of described dimensions.
    #[inline]
    pub fn n_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// The described dimensions.
    #[inline]
    pub fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.dimensions
    }

    /// The coordinate transform, if any.
    #[inline]
    pub fn transform(&self) -> Option<&CoordinateTransform> {
        self.transform.as_ref()
    }

    /// Checks the dimension count is within `1..=MAX_DIM` and the transform, if any, consumes
    /// vectors of that many dimensions.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_dimensions();
        if n == 0 || n > MAX_DIM {
            return Err(WorkspaceError::InvalidDimension(n));
        }

        match &self.transform {
            Some(transform) if transform.cols() != n => Err(WorkspaceError::DimensionMismatch {
                what: "coordinate transform",
                expected: n,
                found: transform.cols(),
            }),
            _ => Ok(()),
        }
    }
}
