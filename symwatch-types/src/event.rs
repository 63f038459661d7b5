//! The path-addressed `Event` type.

use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::flag::Flag;
use crate::mask::Mask;

/// An event, addressed at the path the watch was requested for.
///
/// Every event produced by a watch carries that watch's requested path in [`Event::path`], even
/// when the kernel reported it on an intermediate symlink or on the resolved target. Events on
/// intermediate symlinks are collapsed into a synthetic [`Flag::LinkChanged`] event: the path may
/// no longer resolve to the file being watched and the watch should be added again.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Raw event mask.
    pub mask: Mask,

    /// Rename cookie, pairing a `moved_from` event with its `moved_to` event.
    ///
    /// Zero for every other event.
    pub cookie: u32,

    /// Name of the directory entry the event occurred on.
    ///
    /// `None` when the event happened to the watched entry itself.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<OsString>,

    /// The requested path of the watch the event belongs to.
    pub path: PathBuf,
}

impl Event {
    /// Creates a new event.
    pub fn new(mask: Mask, cookie: u32, name: Option<OsString>, path: impl Into<PathBuf>) -> Self {
        Event {
            mask,
            cookie,
            name,
            path: path.into(),
        }
    }

    /// Creates the synthetic event signalling that the chain resolved for `path` went stale.
    pub fn link_changed(path: impl Into<PathBuf>) -> Self {
        Event::new(Mask::LINK_CHANGED, 0, None, path)
    }

    /// Whether the event's mask includes any bit of `flag`.
    pub fn has(&self, flag: Flag) -> bool {
        self.mask.intersects(flag.mask())
    }

    /// Every flag the event carries, in table order.
    pub fn flags(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.iter().copied().filter(move |flag| self.has(*flag))
    }

    /// The entry name, if any.
    pub fn name(&self) -> Option<&OsStr> {
        self.name.as_deref()
    }

    /// The path the event is addressed at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `path` joined with `name` when the event names an entry, `path` otherwise.
    pub fn full_path(&self) -> PathBuf {
        match &self.name {
            Some(name) => self.path.join(name),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(path={:?}, mask={}",
            self.path,
            self.mask.decode().join("|")
        )?;
        if self.cookie != 0 {
            write!(f, ", cookie={}", self.cookie)?;
        }
        if let Some(name) = &self.name {
            write!(f, ", name={name:?}")?;
        }
        f.write_str(")")
    }
}
