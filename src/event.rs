/// A single event of a workspace with `N` dimensions.
///
/// The coordinate is stored inline so events of a given dimensionality have a fixed size and a
/// box can hold them contiguously.
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// # use glam::Vec3;
/// let event = MDEvent::at(2.0, 4.0, Vec3::new(1.0, 2.0, 3.0));
///
/// assert_eq!(event.center(), &[1.0, 2.0, 3.0]);
/// assert_eq!(event.error(), 2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct MDEvent<const N: usize> {
    signal: f32,
    error_squared: f32,
    run_index: u16,
    detector_id: u32,
    center: [f32; N],
}

impl<const N: usize> MDEvent<N> {
    /// Creates a new [`MDEvent`].
    #[inline]
    pub const fn new(
        signal: f32,
        error_squared: f32,
        run_index: u16,
        detector_id: u32,
        center: [f32; N],
    ) -> Self {
        Self {
            signal,
            error_squared,
            run_index,
            detector_id,
            center,
        }
    }

    /// Creates a new [`MDEvent`] at the given position with run index and detector id 0.
    ///
    /// Any vector convertible into an array of `N` floats can be used, e.g. [`glam::Vec3`].
    #[inline]
    pub fn at<V>(signal: f32, error_squared: f32, position: V) -> Self
    where
        V: Into<[f32; N]>,
    {
        Self::new(signal, error_squared, 0, 0, position.into())
    }

    /// Creates a new [`MDEvent`] from a coordinate slice, returning `None` if the slice does not
    /// hold exactly `N` values.
    #[inline]
    pub fn from_slice(
        signal: f32,
        error_squared: f32,
        run_index: u16,
        detector_id: u32,
        coordinate: &[f32],
    ) -> Option<Self> {
        let center = coordinate.try_into().ok()?;
        Some(Self::new(signal, error_squared, run_index, detector_id, center))
    }

    /// Signal carried by the event.
    #[inline]
    pub const fn signal(&self) -> f32 {
        self.signal
    }

    /// Squared error of the signal.
    #[inline]
    pub const fn error_squared(&self) -> f32 {
        self.error_squared
    }

    /// Error of the signal.
    #[inline]
    pub fn error(&self) -> f32 {
        self.error_squared.sqrt()
    }

    /// Index of the run the event was recorded in.
    #[inline]
    pub const fn run_index(&self) -> u16 {
        self.run_index
    }

    /// Id of the detector that recorded the event.
    #[inline]
    pub const fn detector_id(&self) -> u32 {
        self.detector_id
    }

    /// Coordinate of the event.
    #[inline]
    pub const fn center(&self) -> &[f32; N] {
        &self.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn from_slice_checks_length() {
        let event = MDEvent::<3>::from_slice(1.0, 1.0, 4, 17, &[0.5, 1.5, 2.5]).unwrap();

        assert_eq!(event.run_index(), 4);
        assert_eq!(event.detector_id(), 17);
        assert_eq!(event.center(), &[0.5, 1.5, 2.5]);

        assert!(MDEvent::<3>::from_slice(1.0, 1.0, 0, 0, &[0.5, 1.5]).is_none());
        assert!(MDEvent::<3>::from_slice(1.0, 1.0, 0, 0, &[0.5, 1.5, 2.5, 3.5]).is_none());
    }

    #[test]
    fn layout_is_fixed_per_dimension() {
        assert!(std::mem::size_of::<MDEvent<1>>() < std::mem::size_of::<MDEvent<4>>());
        assert_eq!(
            std::mem::size_of::<MDEvent<4>>(),
            4 + 4 + 4 + 4 + 4 * 4,
        );
    }

    #[test]
    fn from_glam_vector() {
        let event = MDEvent::at(1.0, 0.25, Vec2::new(-1.0, 1.0));

        assert_eq!(event.center(), &[-1.0, 1.0]);
        assert_eq!(event.error(), 0.5);
    }
}
