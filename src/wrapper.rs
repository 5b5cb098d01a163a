use std::sync::{Arc, RwLock};

use log::debug;

use crate::{
    box_controller::BoxController,
    dimension::WorkspaceDescription,
    dispatch::{self, AnyWorkspace, EventBuffers},
    error::{Result, WorkspaceError},
    workspace::MDWorkspace,
    MAX_DIM,
};

/// Shared handle to a workspace of any dimensionality.
///
/// Writers (insertion, splitting, refresh) take the lock exclusively, so a refresh never runs
/// concurrently with an insertion.
pub type WorkspaceHandle = Arc<RwLock<AnyWorkspace>>;

/// Thin façade creating, filling and refreshing one workspace whose dimensionality is only
/// known at runtime.
///
/// Every operation is routed through the [dispatch table](crate::dispatch::DISPATCH_TABLE)
/// entry of the bound dimension count. The wrapper holds one reference to the workspace, other
/// owners (e.g. a registry) can hold more and keep the workspace alive after
/// [`release_workspace`](Self::release_workspace).
///
/// # Example
/// ```
/// # use mdevents::prelude::*;
/// let mut wrapper = WorkspaceWrapper::new();
/// let description = WorkspaceDescription::from_parallel(
///     &["Q_x", "Q_y", "Q_z"],
///     &["qx", "qy", "qz"],
///     &["A^-1", "A^-1", "A^-1"],
///     &[0.0, 0.0, 0.0],
///     &[10.0, 10.0, 10.0],
///     &[],
/// )
/// .unwrap();
///
/// let handle = wrapper.create_empty_workspace(&description).unwrap();
/// wrapper
///     .add_events(&EventBuffers::new(
///         &[1.0, 1.0, 2.0, 4.0],
///         &[0, 0],
///         &[7, 8],
///         &[1.0, 1.0, 1.0, 9.0, 9.0, 9.0],
///         2,
///     ))
///     .unwrap();
/// wrapper.refresh_centroid().unwrap();
///
/// assert_eq!(wrapper.n_dimensions(), Ok(3));
/// assert_eq!(handle.read().unwrap().as_dyn().signal(), 3.0);
///
/// let registry_copy = wrapper.release_workspace();
/// assert!(registry_copy.is_some());
/// assert_eq!(wrapper.refresh_centroid(), Err(WorkspaceError::Uninitialized));
/// ```
#[derive(Debug, Default)]
pub struct WorkspaceWrapper {
    workspace: Option<WorkspaceHandle>,
    n_dims: usize,
}

impl WorkspaceWrapper {
    /// Creates a new [`WorkspaceWrapper`] with no bound workspace.
    #[inline]
    pub const fn new() -> Self {
        Self {
            workspace: None,
            n_dims: 0,
        }
    }

    /// Number of dimensions of the bound workspace.
    #[inline]
    pub fn n_dimensions(&self) -> Result<usize> {
        match self.n_dims {
            0 => Err(WorkspaceError::Uninitialized),
            n => Ok(n),
        }
    }

    /// Returns true if a workspace is bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.workspace.is_some() && self.n_dims != 0
    }

    /// The bound workspace handle.
    #[inline]
    pub fn workspace(&self) -> Result<&WorkspaceHandle> {
        match &self.workspace {
            Some(handle) if self.n_dims != 0 => Ok(handle),
            _ => Err(WorkspaceError::Uninitialized),
        }
    }

    /// Creates an empty workspace from the description, binds it and returns a handle to it.
    ///
    /// On failure the wrapper keeps whatever it was bound to before.
    pub fn create_empty_workspace(
        &mut self,
        description: &WorkspaceDescription,
    ) -> Result<WorkspaceHandle> {
        let n_dims = description.n_dimensions();
        if n_dims == 0 || n_dims > MAX_DIM {
            return Err(WorkspaceError::InvalidDimension(n_dims));
        }

        let ws = (dispatch::entry(n_dims)?.create)(description)?;
        let handle = Arc::new(RwLock::new(ws));

        self.workspace = Some(Arc::clone(&handle));
        self.n_dims = n_dims;
        debug!("bound new {n_dims}-dimensional event workspace");

        Ok(handle)
    }

    /// Creates an empty workspace from parallel per-dimension slices.
    ///
    /// Every slice must hold `n_dims` elements, except `num_bins` which may be empty.
    #[allow(clippy::too_many_arguments)]
    pub fn create_empty<S: AsRef<str>>(
        &mut self,
        n_dims: usize,
        names: &[S],
        ids: &[S],
        units: &[S],
        mins: &[f64],
        maxs: &[f64],
        num_bins: &[usize],
    ) -> Result<WorkspaceHandle> {
        if n_dims == 0 || n_dims > MAX_DIM {
            return Err(WorkspaceError::InvalidDimension(n_dims));
        }

        if names.len() != n_dims {
            return Err(WorkspaceError::DimensionMismatch {
                what: "dimension name list",
                expected: n_dims,
                found: names.len(),
            });
        }

        let description = WorkspaceDescription::from_parallel(names, ids, units, mins, maxs, num_bins)?;
        self.create_empty_workspace(&description)
    }

    /// Binds an existing workspace, e.g. one taken from a registry.
    pub fn set_workspace(&mut self, handle: WorkspaceHandle) -> Result<()> {
        let n_dims = handle
            .read()
            .map_err(|_| WorkspaceError::LockPoisoned)?
            .n_dims();

        self.workspace = Some(handle);
        self.n_dims = n_dims;
        debug!("bound existing {n_dims}-dimensional event workspace");

        Ok(())
    }

    /// Adds flattened events to the bound workspace, returning how many were stored.
    ///
    /// Zero events is a no-op. Coordinates are not range checked up front: events outside the
    /// workspace extents are dropped and counted by the workspace.
    pub fn add_events(&self, buffers: &EventBuffers<'_>) -> Result<usize> {
        let handle = self.workspace()?;
        if buffers.count == 0 {
            return Ok(0);
        }

        let mut ws = handle.write().map_err(|_| WorkspaceError::LockPoisoned)?;
        (dispatch::entry(self.n_dims)?.add_events)(&mut *ws, buffers)
    }

    /// Recomputes the signal, error and centroid of every box of the bound workspace.
    pub fn refresh_centroid(&self) -> Result<()> {
        let handle = self.workspace()?;
        let mut ws = handle.write().map_err(|_| WorkspaceError::LockPoisoned)?;
        (dispatch::entry(self.n_dims)?.refresh_centroid)(&mut *ws)
    }

    /// Splits every box of the bound workspace holding more events than its box controller
    /// allows, returning the number of splits.
    pub fn split_all_if_needed(&self) -> Result<usize> {
        let handle = self.workspace()?;
        let mut ws = handle.write().map_err(|_| WorkspaceError::LockPoisoned)?;
        (dispatch::entry(self.n_dims)?.split_all)(&mut *ws)
    }

    /// Replaces the splitting policy of the bound workspace.
    pub fn set_box_controller(&self, bc: BoxController) -> Result<()> {
        let handle = self.workspace()?;
        let mut ws = handle.write().map_err(|_| WorkspaceError::LockPoisoned)?;
        ws.as_dyn_mut().set_box_controller(bc)
    }

    /// Runs a closure with read access to the bound workspace.
    pub fn with_workspace<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn MDWorkspace) -> R,
    {
        let handle = self.workspace()?;
        let ws = handle.read().map_err(|_| WorkspaceError::LockPoisoned)?;
        Ok(f(ws.as_dyn()))
    }

    /// Detaches the bound workspace and marks the wrapper as unbound.
    ///
    /// The returned handle, and any other handle to the same workspace, stay valid: the wrapper
    /// only gives up its own reference.
    pub fn release_workspace(&mut self) -> Option<WorkspaceHandle> {
        self.n_dims = 0;
        let released = self.workspace.take();
        if released.is_some() {
            debug!("released event workspace");
        }
        released
    }
}
