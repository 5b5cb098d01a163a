use crate::error::{Result, WorkspaceError};

/// Matrix converting raw event coordinates into an analysis basis, e.g. reciprocal lattice units.
///
/// Stored row-major with `rows` outputs and `cols` inputs, so a workspace with `N` dimensions
/// accepts transforms with `N` columns.
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// let swap = CoordinateTransform::new(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
///
/// assert_eq!(swap.apply(&[1.0, 2.0]).unwrap(), vec![2.0, 1.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateTransform {
    rows: usize,
    cols: usize,
    elements: Vec<f64>,
}

impl CoordinateTransform {
    /// Creates a new [`CoordinateTransform`] from its row-major elements.
    pub fn new(rows: usize, cols: usize, elements: Vec<f64>) -> Result<Self> {
        if elements.len() != rows * cols {
            return Err(WorkspaceError::DimensionMismatch {
                what: "transform element list",
                expected: rows * cols,
                found: elements.len(),
            });
        }

        Ok(Self {
            rows,
            cols,
            elements,
        })
    }

    /// Creates the `n` by `n` identity transform.
    pub fn identity(n: usize) -> Self {
        let mut elements = vec![0.0; n * n];
        for i in 0..n {
            elements[i * n + i] = 1.0;
        }

        Self {
            rows: n,
            cols: n,
            elements,
        }
    }

    /// Number of output coordinates.
    #[inline]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of input coordinates.
    #[inline]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Element at the given row and column, if in range.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.elements[row * self.cols + col])
    }

    /// The row-major elements.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.elements
    }

    /// Applies the transform to a coordinate.
    pub fn apply(&self, coordinate: &[f32]) -> Result<Vec<f64>> {
        if coordinate.len() != self.cols {
            return Err(WorkspaceError::DimensionMismatch {
                what: "transformed coordinate",
                expected: self.cols,
                found: coordinate.len(),
            });
        }

        Ok(self
            .elements
            .chunks_exact(self.cols.max(1))
            .take(self.rows)
            .map(|row| {
                row.iter()
                    .zip(coordinate)
                    .map(|(&m, &x)| m * f64::from(x))
                    .sum()
            })
            .collect())
    }
}

macro_rules! impl_from_glam {
    ($m: ty, $dim: literal) => {
        impl From<$m> for CoordinateTransform {
            #[inline]
            fn from(matrix: $m) -> Self {
                let cols = matrix.to_cols_array_2d();
                let mut elements = Vec::with_capacity($dim * $dim);
                for row in 0..$dim {
                    for col in 0..$dim {
                        elements.push(f64::from(cols[col][row]));
                    }
                }

                Self {
                    rows: $dim,
                    cols: $dim,
                    elements,
                }
            }
        }
    };
}

impl_from_glam!(glam::Mat3, 3);
impl_from_glam!(glam::DMat3, 3);
impl_from_glam!(glam::DMat4, 4);
