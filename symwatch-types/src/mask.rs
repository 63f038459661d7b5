//! Inotify flag bits, the synthetic link-changed bit and mask decoding.
//!
//! The kernel defines its flags in the low 32 bits. `IN_LINK_CHANGED` is not a kernel flag: it is
//! derived from the [`INOTIFY`] table as the lowest power of two above every kernel bit, which is
//! why [`Mask`] is 64 bits wide.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name under which the synthetic link-changed bit is decoded.
pub const LINK_CHANGED_NAME: &str = "IN_LINK_CHANGED";

/// Every single-bit flag defined by `<sys/inotify.h>`, in bit order.
const KERNEL_FLAGS: &[(&str, u64)] = &[
    ("IN_ACCESS", 0x0000_0001),
    ("IN_MODIFY", 0x0000_0002),
    ("IN_ATTRIB", 0x0000_0004),
    ("IN_CLOSE_WRITE", 0x0000_0008),
    ("IN_CLOSE_NOWRITE", 0x0000_0010),
    ("IN_OPEN", 0x0000_0020),
    ("IN_MOVED_FROM", 0x0000_0040),
    ("IN_MOVED_TO", 0x0000_0080),
    ("IN_CREATE", 0x0000_0100),
    ("IN_DELETE", 0x0000_0200),
    ("IN_DELETE_SELF", 0x0000_0400),
    ("IN_MOVE_SELF", 0x0000_0800),
    ("IN_UNMOUNT", 0x0000_2000),
    ("IN_Q_OVERFLOW", 0x0000_4000),
    ("IN_IGNORED", 0x0000_8000),
    ("IN_ONLYDIR", 0x0100_0000),
    ("IN_DONT_FOLLOW", 0x0200_0000),
    ("IN_EXCL_UNLINK", 0x0400_0000),
    ("IN_MASK_ADD", 0x2000_0000),
    ("IN_ISDIR", 0x4000_0000),
    ("IN_ONESHOT", 0x8000_0000),
];

/// The flag table of the running kernel interface.
pub const INOTIFY: FlagTable = FlagTable::new(KERNEL_FLAGS);

/// A fixed table of named flag bits together with the synthetic bit derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTable {
    flags: &'static [(&'static str, u64)],
    defined: u64,
    link_changed: u64,
}

impl FlagTable {
    /// Builds a table from single-bit `(name, bit)` pairs.
    ///
    /// The synthetic link-changed bit is the lowest power of two strictly greater than the
    /// union of all `flags`, so it can never collide with a bit the table defines.
    pub const fn new(flags: &'static [(&'static str, u64)]) -> Self {
        let mut defined = 0;
        let mut i = 0;
        while i < flags.len() {
            defined |= flags[i].1;
            i += 1;
        }

        let mut link_changed = 1;
        while link_changed <= defined {
            link_changed <<= 1;
        }

        FlagTable {
            flags,
            defined,
            link_changed,
        }
    }

    /// Union of every bit the table defines.
    pub const fn defined(&self) -> u64 {
        self.defined
    }

    /// The synthetic link-changed bit.
    pub const fn link_changed(&self) -> u64 {
        self.link_changed
    }

    /// The `(name, bit)` pairs of the table.
    pub fn flags(&self) -> &'static [(&'static str, u64)] {
        self.flags
    }

    /// Names of the defined flags set in `mask`, in table order, followed by
    /// [`LINK_CHANGED_NAME`] when the synthetic bit is set.
    ///
    /// Unknown bits are ignored.
    pub fn decode(&self, mask: u64) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .flags
            .iter()
            .filter(|(_, bit)| mask & bit != 0)
            .map(|(name, _)| *name)
            .collect();
        if mask & self.link_changed != 0 {
            names.push(LINK_CHANGED_NAME);
        }
        names
    }
}

bitflags! {
    /// Interest and event mask.
    ///
    /// Watchable bits can be requested through `Watcher::add`; `UNMOUNT`, `Q_OVERFLOW`,
    /// `IGNORED` and `ISDIR` only ever appear on events. The option bits (`ONLYDIR`,
    /// `DONT_FOLLOW`, ...) are only meaningful on registrations.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct Mask: u64 {
        /// File was accessed.
        const ACCESS = 0x0000_0001;
        /// File was modified.
        const MODIFY = 0x0000_0002;
        /// Metadata of a directory entry changed.
        const ATTRIB = 0x0000_0004;
        /// File opened for writing was closed.
        const CLOSE_WRITE = 0x0000_0008;
        /// File not opened for writing was closed.
        const CLOSE_NOWRITE = 0x0000_0010;
        /// File was opened.
        const OPEN = 0x0000_0020;
        /// Directory entry was renamed from this name.
        const MOVED_FROM = 0x0000_0040;
        /// Directory entry was renamed to this name.
        const MOVED_TO = 0x0000_0080;
        /// Directory entry was created.
        const CREATE = 0x0000_0100;
        /// Directory entry was deleted.
        const DELETE = 0x0000_0200;
        /// The watched entry was deleted.
        const DELETE_SELF = 0x0000_0400;
        /// The watched entry was renamed.
        const MOVE_SELF = 0x0000_0800;
        /// Filesystem containing the watched entry was unmounted.
        const UNMOUNT = 0x0000_2000;
        /// Kernel event queue overflowed.
        const Q_OVERFLOW = 0x0000_4000;
        /// Watch was removed.
        const IGNORED = 0x0000_8000;
        /// Only watch the path if it is a directory.
        const ONLYDIR = 0x0100_0000;
        /// Don't dereference the path if it is a symbolic link.
        const DONT_FOLLOW = 0x0200_0000;
        /// Don't generate events for children after they have been unlinked.
        const EXCL_UNLINK = 0x0400_0000;
        /// Add to the mask of an existing watch instead of replacing it.
        const MASK_ADD = 0x2000_0000;
        /// Subject of the event is a directory.
        const ISDIR = 0x4000_0000;
        /// Listen for one event, then remove the watch.
        const ONESHOT = 0x8000_0000;

        /// The resolved path no longer resolves to the same file.
        const LINK_CHANGED = INOTIFY.link_changed();

        /// Directory entry was renamed.
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
        /// File was closed.
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        /// Every kernel event a watch can be registered for.
        const ALL_EVENTS = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE.bits()
            | Self::OPEN.bits()
            | Self::MOVE.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();
    }
}

impl Mask {
    /// The bits understood by the kernel, ready to hand to `inotify_add_watch`.
    pub fn kernel_bits(self) -> u32 {
        // `defined()` fits in 32 bits: every kernel flag does.
        (self.bits() & INOTIFY.defined()) as u32
    }

    /// Builds a mask from bits reported by the kernel.
    pub fn from_kernel(bits: u32) -> Self {
        Mask::from_bits_retain(u64::from(bits))
    }

    /// See [`decode_mask`].
    pub fn decode(self) -> Vec<&'static str> {
        decode_mask(self)
    }
}

/// Names of the flags set in `mask`: the kernel-defined ones in bit order, then
/// `IN_LINK_CHANGED`.
pub fn decode_mask(mask: Mask) -> Vec<&'static str> {
    INOTIFY.decode(mask.bits())
}
