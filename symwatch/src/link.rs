//! One independently watched segment of a resolved path.

use crate::backend::{Backend, RawEvent};
use crate::watch::{Watch, WatchId};
use crate::watcher::Registry;
use crate::{Event, Mask, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Addresses a link across the watcher: the watch that owns it and its position in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LinkRef {
    pub watch: WatchId,
    pub index: usize,
}

/// A segment of a watch's resolved chain.
///
/// A symlink segment watches its directory for entries named like the symlink being created,
/// deleted or renamed. The leaf segment watches the resolved entry itself.
#[derive(Debug)]
pub struct Link<D> {
    index: usize,
    mask: Mask,
    path: PathBuf,
    name: Option<OsString>,
    descriptor: D,
}

impl<D: Clone> Link<D> {
    /// Registers the segment; this is the only registration the link ever makes.
    pub(crate) fn new<B>(
        registry: &mut Registry<B>,
        link: LinkRef,
        mask: Mask,
        path: PathBuf,
        name: Option<OsString>,
    ) -> Result<Self>
    where
        B: Backend<Descriptor = D>,
    {
        let descriptor = registry.create_watch(&path, name.as_deref(), mask, link)?;
        Ok(Link {
            index: link.index,
            mask,
            path,
            name,
            descriptor,
        })
    }
}

impl<D> Link<D> {
    /// Position in the owning watch's chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Interest registered for this segment.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// The watched directory for a symlink segment, the resolved entry for the leaf.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the symlink within [`Link::path`]; `None` for the leaf.
    pub fn name(&self) -> Option<&OsStr> {
        self.name.as_deref()
    }

    /// Whether this is the leaf segment.
    pub fn is_leaf(&self) -> bool {
        self.name.is_none()
    }

    /// The low-level watch this segment is registered with.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    pub(crate) fn handle_event(&self, watch: &Watch<D>, event: &RawEvent<D>) -> Event {
        watch.handle_event(event, self)
    }
}
