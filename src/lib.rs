//! # mdevents
//!
//! mdevents stores sparse events living in an N-dimensional space (momentum transfer, energy,
//! temperature...) in adaptive box trees, for any dimensionality between 1 and [`MAX_DIM`].
//!
//! ## Goals
//!
//! Each workspace is generic over its dimensionality so that every coordinate is a fixed-size
//! array and every hot loop is specialised by the compiler. Callers that only learn the number of
//! dimensions at runtime go through [`WorkspaceWrapper`], which routes each operation to the
//! right specialisation using a [dispatch table](dispatch::DISPATCH_TABLE) built once at compile
//! time.
//!
//! Boxes split into children once they hold more events than their
//! [`BoxController`](box_controller::BoxController) allows. Aggregated signal, error and
//! centroid of every box are only recomputed on demand, with
//! [`refresh_centroid`](workspace::MDEventWorkspace::refresh_centroid). Enable the "parallel"
//! feature to refresh leaves with [rayon](https://github.com/rayon-rs/rayon).
//!
//! # Using mdevents
//!
//! ## With a known dimensionality
//!
//! ```
//! # use mdevents::prelude::*;
//! let description = WorkspaceDescription::from_parallel(
//!     &["Q_x", "Q_y"],
//!     &["qx", "qy"],
//!     &["A^-1", "A^-1"],
//!     &[-1.0, -1.0],
//!     &[1.0, 1.0],
//!     &[],
//! )
//! .unwrap();
//!
//! let mut ws = MDEventWorkspace::<2>::new(&description).unwrap();
//! ws.add_events([
//!     MDEvent::at(1.0, 1.0, glam::Vec2::new(-0.5, -0.5)),
//!     MDEvent::at(3.0, 1.0, glam::Vec2::new(0.5, 0.5)),
//! ]);
//! ws.refresh_centroid();
//!
//! assert_eq!(ws.signal(), 4.0);
//! assert_eq!(ws.centroid(), [0.25, 0.25]);
//! ```
//!
//! ## With a runtime dimensionality
//!
//! ```
//! # use mdevents::prelude::*;
//! let n = 4;
//! let names: Vec<String> = (0..n).map(|d| format!("d{d}")).collect();
//!
//! let mut wrapper = WorkspaceWrapper::new();
//! wrapper
//!     .create_empty(n, &names, &names, &names, &vec![0.0; n], &vec![1.0; n], &[])
//!     .unwrap();
//!
//! let coordinates = vec![0.5_f32; 3 * n];
//! let stored = wrapper
//!     .add_events(&EventBuffers::new(&[1.0; 6], &[0; 3], &[1, 2, 3], &coordinates, 3))
//!     .unwrap();
//! wrapper.refresh_centroid().unwrap();
//!
//! assert_eq!(stored, 3);
//! assert_eq!(wrapper.with_workspace(|ws| ws.signal()), Ok(3.0));
//! ```

#![warn(missing_docs)]

/// Splitting policy of box trees.
pub mod box_controller;
/// Descriptions of workspace dimensions.
pub mod dimension;
/// Routing of operations to the specialisation of a runtime dimensionality.
pub mod dispatch;
/// Errors of workspace operations.
pub mod error;
/// Events with N-dimensional coordinates.
pub mod event;
/// Coordinate transforms attached to workspaces.
pub mod transform;
/// Box trees holding events.
pub mod tree;
/// Event workspaces of a fixed dimensionality.
pub mod workspace;
/// Façade over a workspace of runtime dimensionality.
pub mod wrapper;

/// Largest supported number of dimensions.
pub const MAX_DIM: usize = 9;

pub use error::{Result, WorkspaceError};
pub use wrapper::{WorkspaceHandle, WorkspaceWrapper};

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::{
        box_controller::BoxController,
        dimension::{DimensionDescriptor, WorkspaceDescription},
        dispatch::{AnyWorkspace, EventBuffers},
        error::WorkspaceError,
        event::MDEvent,
        transform::CoordinateTransform,
        tree::BoundingBox,
        workspace::{BoxSummary, MDEventWorkspace, MDWorkspace},
        wrapper::{WorkspaceHandle, WorkspaceWrapper},
        MAX_DIM,
    };
}
