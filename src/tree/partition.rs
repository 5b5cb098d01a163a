use crate::MAX_DIM;

const _: () = assert!(MAX_DIM <= u16::BITS as usize);

/// Set of axes divided by a split, stored as a bit mask.
///
/// Axes are always visited in ascending order, which defines the order of the children of a
/// split box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Axes(u16);

impl Axes {
    /// Creates a new [`Axes`] set from a list of axis indices. Indices not below [`MAX_DIM`] are
    /// ignored.
    #[inline]
    pub fn new(axes: &[usize]) -> Self {
        Self(
            axes.iter()
                .filter(|&&axis| axis < MAX_DIM)
                .fold(0, |mask, &axis| mask | (1 << axis)),
        )
    }

    /// Returns true if the given axis is part of the set.
    #[inline]
    pub const fn contains(self, axis: usize) -> bool {
        axis < MAX_DIM && self.0 & (1 << axis) != 0
    }

    /// Number of axes in the set.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true if no axis is in the set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the axes in ascending order.
    #[inline]
    pub fn iter(self) -> impl DoubleEndedIterator<Item = usize> {
        (0..MAX_DIM).filter(move |&axis| self.contains(axis))
    }
}

/// An axis-aligned bounding box using arrays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<A> {
    /// Minimum corner of the box.
    pub min: A,
    /// Maximum corner of the box.
    pub max: A,
}

impl<A> BoundingBox<A> {
    /// Creates a new [`BoundingBox`] with the given min and max values.
    #[inline]
    pub const fn new(min: A, max: A) -> Self {
        Self { min, max }
    }
}

#[allow(clippy::needless_range_loop)]
impl<const D: usize> BoundingBox<[f64; D]> {
    /// Returns the center of the [`BoundingBox`].
    #[inline]
    pub fn center(&self) -> [f64; D] {
        std::array::from_fn(|i| (self.min[i] + self.max[i]) / 2.0)
    }

    /// Returns the size of the [`BoundingBox`].
    #[inline]
    pub fn size(&self) -> [f64; D] {
        std::array::from_fn(|i| self.max[i] - self.min[i])
    }

    /// Returns the extents of the [`BoundingBox`] as `(min, max)` pairs.
    #[inline]
    pub fn extents(&self) -> [(f64, f64); D] {
        std::array::from_fn(|i| (self.min[i], self.max[i]))
    }

    /// Returns true if the position lies within the box, bounds included.
    ///
    /// NaN coordinates are never contained.
    #[inline]
    pub fn contains(&self, position: &[f32; D]) -> bool {
        (0..D).all(|i| {
            let x = f64::from(position[i]);
            self.min[i] <= x && x <= self.max[i]
        })
    }

    /// Returns true if the two boxes overlap, touching boundaries included.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        (0..D).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Returns true if the other box lies entirely within this one.
    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        (0..D).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    /// Boundary between slices `slice - 1` and `slice` when `axis` is divided into `split_into`
    /// slices.
    ///
    /// The last boundary is the box's max exactly so that the slices tile the box.
    #[inline]
    pub fn boundary(&self, axis: usize, slice: usize, split_into: usize) -> f64 {
        if slice >= split_into {
            return self.max[axis];
        }

        let width = self.max[axis] - self.min[axis];
        self.min[axis] + width * slice as f64 / split_into as f64
    }

    /// Index of the slice of `axis` holding the coordinate `x`.
    ///
    /// Slices are half-open, except the last one which also holds the box's max. Coordinates
    /// outside the box are routed to the nearest slice.
    #[inline]
    pub fn slice_of(&self, axis: usize, x: f64, split_into: usize) -> usize {
        let width = self.max[axis] - self.min[axis];
        let guess = ((x - self.min[axis]) / width * split_into as f64).max(0.0) as usize;

        let mut slice = guess.min(split_into - 1);
        while slice > 0 && x < self.boundary(axis, slice, split_into) {
            slice -= 1;
        }
        while slice + 1 < split_into && x >= self.boundary(axis, slice + 1, split_into) {
            slice += 1;
        }

        slice
    }

    /// Index of the child holding the given position once this box is subdivided with
    /// [`subdivide`](Self::subdivide).
    #[inline]
    pub fn child_index(&self, position: &[f32; D], axes: Axes, split_into: usize) -> usize {
        axes.iter()
            .rev()
            .fold(0, |index, axis| {
                index * split_into + self.slice_of(axis, f64::from(position[axis]), split_into)
            })
    }

    /// Subdivides this [`BoundingBox`] into `split_into` slices along each of the given axes,
    /// leaving the other axes untouched.
    ///
    /// The child at index `i` covers slice `(i / split_into^j) % split_into` of the `j`-th axis
    /// of the set.
    pub fn subdivide(&self, axes: Axes, split_into: usize) -> Vec<Self> {
        let count = split_into.pow(axes.len() as u32);

        (0..count)
            .map(|mut i| {
                let mut child = *self;
                for axis in axes.iter() {
                    let slice = i % split_into;
                    i /= split_into;

                    child.min[axis] = self.boundary(axis, slice, split_into);
                    child.max[axis] = self.boundary(axis, slice + 1, split_into);
                }
                child
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> BoundingBox<[f64; 2]> {
        BoundingBox::new([0.0, 0.0], [1.0, 1.0])
    }

    #[test]
    fn axes_mask() {
        let axes = Axes::new(&[3, 0, 7]);

        assert_eq!(axes.len(), 3);
        assert!(axes.contains(7));
        assert!(!axes.contains(1));
        assert_eq!(axes.iter().collect::<Vec<_>>(), vec![0, 3, 7]);
        assert_eq!(axes.iter().rev().collect::<Vec<_>>(), vec![7, 3, 0]);
        assert!(Axes::default().is_empty());
    }

    #[test]
    fn contains_bounds() {
        let bbox = unit_square();

        assert!(bbox.contains(&[0.0, 0.0]));
        assert!(bbox.contains(&[1.0, 1.0]));
        assert!(!bbox.contains(&[1.0001, 0.5]));
        assert!(!bbox.contains(&[f32::NAN, 0.5]));
    }

    #[test]
    fn subdivide_tiles_parent() {
        let bbox = BoundingBox::new([-1.0, 0.0, 2.0], [1.0, 3.0, 5.0]);
        let children = bbox.subdivide(Axes::new(&[0, 2]), 3);

        assert_eq!(children.len(), 9);

        // Untouched axis keeps the parent extents.
        assert!(children.iter().all(|c| c.min[1] == 0.0 && c.max[1] == 3.0));

        // Volumes add up to the parent volume.
        let volume = |b: &BoundingBox<[f64; 3]>| b.size().iter().product::<f64>();
        let total: f64 = children.iter().map(volume).sum();
        approx::assert_relative_eq!(total, volume(&bbox), epsilon = 1e-12);

        // Outer boundaries are exactly the parent's.
        assert_eq!(children[0].min, [-1.0, 0.0, 2.0]);
        assert_eq!(children[8].max, [1.0, 3.0, 5.0]);
    }

    #[test]
    fn child_index_matches_subdivision() {
        let bbox = BoundingBox::new([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        let axes = Axes::new(&[0, 1, 2]);
        let children = bbox.subdivide(axes, 2);

        let positions = [
            [1.0, 1.0, 1.0],
            [6.0, 1.0, 1.0],
            [1.0, 6.0, 9.0],
            [5.0, 5.0, 5.0],
            [10.0, 10.0, 10.0],
            [0.0, 10.0, 0.0],
        ];

        for position in positions {
            let index = bbox.child_index(&position, axes, 2);
            assert!(
                children[index].contains(&position),
                "{position:?} routed to {:?}",
                children[index]
            );
        }

        // Boundaries belong to the upper slice.
        assert_eq!(bbox.child_index(&[5.0, 0.0, 0.0], axes, 2), 1);
        assert_eq!(bbox.child_index(&[0.0, 5.0, 0.0], axes, 2), 2);
        assert_eq!(bbox.child_index(&[0.0, 0.0, 5.0], axes, 2), 4);
    }

    #[test]
    fn slice_of_uneven_division() {
        let bbox = BoundingBox::new([0.0], [1.0]);

        for (x, expected) in [(0.0, 0), (0.3, 0), (1.0 / 3.0, 1), (0.5, 1), (0.7, 2), (1.0, 2)] {
            assert_eq!(bbox.slice_of(0, x, 3), expected, "x = {x}");
        }

        // Out of range positions go to the nearest slice.
        assert_eq!(bbox.slice_of(0, -4.0, 3), 0);
        assert_eq!(bbox.slice_of(0, 4.0, 3), 2);
    }

    #[test]
    fn intersections() {
        let bbox = unit_square();

        assert!(bbox.intersects(&BoundingBox::new([0.5, 0.5], [2.0, 2.0])));
        assert!(bbox.intersects(&BoundingBox::new([1.0, 0.0], [2.0, 1.0])));
        assert!(!bbox.intersects(&BoundingBox::new([1.5, 0.0], [2.0, 1.0])));

        assert!(bbox.contains_box(&BoundingBox::new([0.2, 0.2], [0.8, 0.8])));
        assert!(!bbox.contains_box(&BoundingBox::new([0.2, 0.2], [1.8, 0.8])));
    }
}
