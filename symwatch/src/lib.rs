//! Symlink-aware file notification library for Linux
//!
//! # Installation
//!
//! ```toml
//! [dependencies]
//! symwatch = "0.1.0"
//! ```
//!
//! ## Features
//!
//! - `serde` for serialization of events and masks
//!
//! # Following symbolic links
//!
//! inotify reports events on inodes, so watching `/etc/resolv.conf` when it is a symbolic link
//! only watches whatever it pointed to at the time. Once the link is swapped out, changes to the
//! new target go unnoticed.
//!
//! A [`Watcher`] resolves every symbolic link on the way to the requested path and watches each
//! of them in its directory, next to the final entry. Events on the final entry are reported
//! under the requested path. Any change to one of the symbolic links (created, deleted, moved or
//! the final entry moved or deleted) is reported as a synthetic
//! [`Mask::LINK_CHANGED`] event, after which the path should be added again to follow its new
//! target.
//!
//! # Examples
//!
//! ```no_run
//! use symwatch::{Mask, ReadOptions, Watcher};
//!
//! # fn main() -> symwatch::Result<()> {
//! let mut watcher = Watcher::new()?;
//! watcher.add("/etc/localtime", Mask::MODIFY)?;
//!
//! for event in watcher.read(ReadOptions::default())?.unwrap_or_default() {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Reading without blocking, to plug the watcher into an event loop:
//!
//! ```no_run
//! use symwatch::{Mask, ReadOptions, Watcher};
//! use std::os::fd::AsRawFd;
//!
//! # fn main() -> symwatch::Result<()> {
//! let mut watcher = Watcher::new()?;
//! watcher.add(".", Mask::CREATE | Mask::DELETE)?;
//! let _fd = watcher.as_raw_fd(); // register with a poller
//!
//! let events = watcher.read(ReadOptions::default().blocking(false))?;
//! assert!(events.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Known Problems
//!
//! ### Shared descriptors
//!
//! The kernel hands out one descriptor per inode and removes it as a whole. When a watched
//! entry is deleted every watch that went through it stops receiving events, including watches
//! of other paths resolving to the same inode.
//!
//! ### Queue overflow
//!
//! When the kernel queue overflows, an event with [`Mask::Q_OVERFLOW`] and an empty path is
//! returned. Events were lost and every watch should be considered stale.

#![deny(missing_docs)]

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("symwatch is built on inotify and only supports Linux and Android");

pub use backend::{Backend, RawEvent};
pub use config::{Config, ReadOptions};
pub use descriptor::Descriptor;
pub use error::{Error, ErrorKind, Result};
pub use crate::inotify::InotifyBackend;
pub use link::Link;
pub use symwatch_types::event::{self, Event};
pub use symwatch_types::flag::{self, Flag};
pub use symwatch_types::mask::{self, decode_mask, Mask};
pub use watch::{Watch, WatchId};
pub use watcher::Watcher;

pub mod backend;
pub mod config;
pub mod inotify;

mod descriptor;
mod error;
mod link;
mod watch;
mod watcher;
