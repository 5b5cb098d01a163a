use crate::{
    dimension::WorkspaceDescription,
    error::{Result, WorkspaceError},
    event::MDEvent,
    workspace::{MDEventWorkspace, MDWorkspace},
    MAX_DIM,
};

/// Flattened event buffers as produced by loaders.
///
/// Holds `count` events: `signal_error` interleaves signal and squared error (`2 * count`
/// values), `run_index` and `detector_id` hold one value per event and `coordinates` holds
/// `count * N` values, the coordinate of event `i` starting at `i * N`.
#[derive(Clone, Copy, Debug)]
pub struct EventBuffers<'a> {
    /// Interleaved signal and squared error pairs.
    pub signal_error: &'a [f32],
    /// Run index of every event.
    pub run_index: &'a [u16],
    /// Detector id of every event.
    pub detector_id: &'a [u32],
    /// Flattened coordinates.
    pub coordinates: &'a [f32],
    /// Number of events.
    pub count: usize,
}

impl<'a> EventBuffers<'a> {
    /// Creates new [`EventBuffers`] over the given slices.
    #[inline]
    pub const fn new(
        signal_error: &'a [f32],
        run_index: &'a [u16],
        detector_id: &'a [u32],
        coordinates: &'a [f32],
        count: usize,
    ) -> Self {
        Self {
            signal_error,
            run_index,
            detector_id,
            coordinates,
            count,
        }
    }

    /// Checks the buffers hold `count` events of `n_dims` dimensions.
    pub fn validate(&self, n_dims: usize) -> Result<()> {
        if self.coordinates.len() != self.count * n_dims {
            return Err(WorkspaceError::TypeMismatch {
                expected: n_dims,
                values: self.coordinates.len(),
                count: self.count,
            });
        }

        let lengths = [
            ("signal/error", 2 * self.count, self.signal_error.len()),
            ("run index", self.count, self.run_index.len()),
            ("detector id", self.count, self.detector_id.len()),
        ];

        for (buffer, expected, found) in lengths {
            if found < expected {
                return Err(WorkspaceError::BufferLength {
                    buffer,
                    expected,
                    found,
                });
            }
        }

        Ok(())
    }

    /// Iterates over the events of `N` dimensions described by the buffers.
    ///
    /// The buffers are expected to have been [validated](Self::validate) first, iteration stops
    /// at the shortest buffer otherwise.
    pub fn events<const N: usize>(&self) -> impl Iterator<Item = MDEvent<N>> + 'a {
        self.signal_error
            .chunks_exact(2)
            .zip(self.run_index)
            .zip(self.detector_id)
            .zip(self.coordinates.chunks_exact(N.max(1)))
            .take(self.count)
            .map(|(((se, &run), &det), coordinate)| {
                MDEvent::new(se[0], se[1], run, det, std::array::from_fn(|d| coordinate[d]))
            })
    }
}

macro_rules! any_workspace {
    ($($dim: literal => $variant: ident),*) => {
        /// Workspace of any supported dimensionality, tagged with it.
        #[derive(Clone, Debug)]
        pub enum AnyWorkspace {
            $(
                #[doc = concat!("Workspace with ", stringify!($dim), " dimensions.")]
                $variant(MDEventWorkspace<$dim>),
            )*
        }

        impl AnyWorkspace {
            /// Number of dimensions of the wrapped workspace.
            #[inline]
            pub const fn n_dims(&self) -> usize {
                match self {
                    $(Self::$variant(_) => $dim,)*
                }
            }

            /// The wrapped workspace behind its dimension-agnostic capabilities.
            #[inline]
            pub fn as_dyn(&self) -> &dyn MDWorkspace {
                match self {
                    $(Self::$variant(ws) => ws as &dyn MDWorkspace,)*
                }
            }

            /// The wrapped workspace behind its dimension-agnostic capabilities, mutably.
            #[inline]
            pub fn as_dyn_mut(&mut self) -> &mut dyn MDWorkspace {
                match self {
                    $(Self::$variant(ws) => ws as &mut dyn MDWorkspace,)*
                }
            }
        }

        $(
            impl Variant for MDEventWorkspace<$dim> {
                #[inline]
                fn wrap(self) -> AnyWorkspace {
                    AnyWorkspace::$variant(self)
                }

                #[inline]
                fn peel(ws: &AnyWorkspace) -> Option<&Self> {
                    match ws {
                        AnyWorkspace::$variant(ws) => Some(ws),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                #[inline]
                fn peel_mut(ws: &mut AnyWorkspace) -> Option<&mut Self> {
                    match ws {
                        AnyWorkspace::$variant(ws) => Some(ws),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Conversion between a workspace of fixed dimensionality and [`AnyWorkspace`].
pub trait Variant: Sized {
    /// Wraps the workspace.
    fn wrap(self) -> AnyWorkspace;

    /// Returns the workspace if `ws` wraps one of this dimensionality.
    fn peel(ws: &AnyWorkspace) -> Option<&Self>;

    /// Returns the workspace mutably if `ws` wraps one of this dimensionality.
    fn peel_mut(ws: &mut AnyWorkspace) -> Option<&mut Self>;
}

any_workspace!(
    1 => D1,
    2 => D2,
    3 => D3,
    4 => D4,
    5 => D5,
    6 => D6,
    7 => D7,
    8 => D8,
    9 => D9
);

impl AnyWorkspace {
    /// Returns the wrapped workspace if it has `N` dimensions.
    ///
    /// # Example
    /// ```
    /// # use mdevents::{dispatch, prelude::*};
    /// # let x = DimensionDescriptor::new("x", "x", "m", 0.0, 1.0, 1).unwrap();
    /// # let description = WorkspaceDescription::new(vec![x.clone(), x]);
    /// let ws = (dispatch::entry(2).unwrap().create)(&description).unwrap();
    ///
    /// assert!(ws.get::<2>().is_some());
    /// assert!(ws.get::<3>().is_none());
    /// ```
    #[inline]
    pub fn get<const N: usize>(&self) -> Option<&MDEventWorkspace<N>>
    where
        MDEventWorkspace<N>: Variant,
    {
        MDEventWorkspace::<N>::peel(self)
    }

    /// Returns the wrapped workspace mutably if it has `N` dimensions.
    #[inline]
    pub fn get_mut<const N: usize>(&mut self) -> Option<&mut MDEventWorkspace<N>>
    where
        MDEventWorkspace<N>: Variant,
    {
        MDEventWorkspace::<N>::peel_mut(self)
    }
}

impl<const N: usize> From<MDEventWorkspace<N>> for AnyWorkspace
where
    MDEventWorkspace<N>: Variant,
{
    #[inline]
    fn from(ws: MDEventWorkspace<N>) -> Self {
        ws.wrap()
    }
}

/// Creates an empty workspace from a description.
pub type CreateFn = fn(&WorkspaceDescription) -> Result<AnyWorkspace>;

/// Adds events to a workspace, returning how many were stored.
pub type AddEventsFn = fn(&mut AnyWorkspace, &EventBuffers<'_>) -> Result<usize>;

/// Refreshes the statistics of every box of a workspace.
pub type RefreshCentroidFn = fn(&mut AnyWorkspace) -> Result<()>;

/// Splits every box of a workspace over the split threshold, returning the number of splits.
pub type SplitAllFn = fn(&mut AnyWorkspace) -> Result<usize>;

/// Operations specialised for one dimensionality.
#[derive(Clone, Copy, Debug)]
pub struct DispatchEntry {
    /// Creates an empty workspace.
    pub create: CreateFn,
    /// Adds events.
    pub add_events: AddEventsFn,
    /// Refreshes box statistics.
    pub refresh_centroid: RefreshCentroidFn,
    /// Splits boxes over the threshold.
    pub split_all: SplitAllFn,
}

fn mismatch<const N: usize>(ws: &AnyWorkspace) -> WorkspaceError {
    WorkspaceError::DimensionMismatch {
        what: "bound workspace",
        expected: N,
        found: ws.n_dims(),
    }
}

fn create<const N: usize>(description: &WorkspaceDescription) -> Result<AnyWorkspace>
where
    MDEventWorkspace<N>: Variant,
{
    Ok(MDEventWorkspace::<N>::new(description)?.wrap())
}

fn add_events<const N: usize>(ws: &mut AnyWorkspace, buffers: &EventBuffers<'_>) -> Result<usize>
where
    MDEventWorkspace<N>: Variant,
{
    if buffers.count == 0 {
        return Ok(0);
    }

    buffers.validate(N)?;
    let found = ws.n_dims();
    let ws = MDEventWorkspace::<N>::peel_mut(ws).ok_or(WorkspaceError::TypeMismatch {
        expected: found,
        values: buffers.coordinates.len(),
        count: buffers.count,
    })?;

    Ok(MDEventWorkspace::<N>::add_events(ws, buffers.events::<N>()))
}

fn refresh_centroid<const N: usize>(ws: &mut AnyWorkspace) -> Result<()>
where
    MDEventWorkspace<N>: Variant,
{
    let err = mismatch::<N>(ws);
    MDEventWorkspace::<N>::peel_mut(ws).ok_or(err)?.refresh_centroid();
    Ok(())
}

fn split_all<const N: usize>(ws: &mut AnyWorkspace) -> Result<usize>
where
    MDEventWorkspace<N>: Variant,
{
    let err = mismatch::<N>(ws);
    Ok(MDEventWorkspace::<N>::peel_mut(ws)
        .ok_or(err)?
        .split_all_if_needed())
}

fn create_zero(_: &WorkspaceDescription) -> Result<AnyWorkspace> {
    Err(WorkspaceError::InvalidDimension(0))
}

fn add_events_zero(_: &mut AnyWorkspace, _: &EventBuffers<'_>) -> Result<usize> {
    Err(WorkspaceError::Uninitialized)
}

fn refresh_centroid_zero(_: &mut AnyWorkspace) -> Result<()> {
    Err(WorkspaceError::Uninitialized)
}

fn split_all_zero(_: &mut AnyWorkspace) -> Result<usize> {
    Err(WorkspaceError::Uninitialized)
}

macro_rules! dispatch_table {
    ($($dim: literal),*) => {
        [
            DispatchEntry {
                create: create_zero,
                add_events: add_events_zero,
                refresh_centroid: refresh_centroid_zero,
                split_all: split_all_zero,
            },
            $(
                DispatchEntry {
                    create: create::<$dim>,
                    add_events: add_events::<$dim>,
                    refresh_centroid: refresh_centroid::<$dim>,
                    split_all: split_all::<$dim>,
                },
            )*
        ]
    };
}

/// Operations specialised for every dimensionality, indexed by dimension count.
///
/// Entry 0 always fails: creation with [`WorkspaceError::InvalidDimension`], the other
/// operations with [`WorkspaceError::Uninitialized`].
pub static DISPATCH_TABLE: [DispatchEntry; MAX_DIM + 1] = dispatch_table!(1, 2, 3, 4, 5, 6, 7, 8, 9);

/// Entry of the [`DISPATCH_TABLE`] for the given dimension count.
#[inline]
pub fn entry(n_dims: usize) -> Result<&'static DispatchEntry> {
    DISPATCH_TABLE
        .get(n_dims)
        .ok_or(WorkspaceError::InvalidDimension(n_dims))
}
