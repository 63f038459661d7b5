//! The low-level notification primitive the watcher is built on.

use crate::Mask;
use std::ffi::OsString;
use std::fmt::Debug;
use std::hash::Hash;
use std::io;
use std::path::Path;

/// A raw notification, as reported by a [`Backend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent<D> {
    /// The low-level watch the event was reported on.
    pub descriptor: D,
    /// Raw event mask.
    pub mask: Mask,
    /// Rename cookie, zero when unused.
    pub cookie: u32,
    /// Name of the entry within a watched directory.
    pub name: Option<OsString>,
}

/// A source of raw file change notifications.
///
/// The kernel may hand out the same descriptor for distinct registrations that resolve to the
/// same inode; callers must be prepared for that.
pub trait Backend {
    /// Identifies one low-level watch.
    type Descriptor: Clone + Debug + Eq + Hash;

    /// Registers interest in `path`.
    ///
    /// Fails with an OS error if the path doesn't exist or can't be watched.
    fn add_watch(&mut self, path: &Path, mask: Mask) -> io::Result<Self::Descriptor>;

    /// Reads queued events into a buffer of `buffer_size` bytes.
    ///
    /// With `block` set, waits until at least one event is available. Otherwise returns
    /// immediately, with an empty list if nothing is queued.
    fn read_events(
        &mut self,
        block: bool,
        buffer_size: usize,
    ) -> io::Result<Vec<RawEvent<Self::Descriptor>>>;

    /// Releases the underlying handle.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}
