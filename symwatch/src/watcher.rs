//! The registry of watches and low-level descriptors.

use crate::backend::{Backend, RawEvent};
use crate::descriptor::Descriptor;
use crate::inotify::InotifyBackend;
use crate::link::LinkRef;
use crate::watch::{Watch, WatchId};
use crate::{Config, Error, Event, Mask, ReadOptions, Result};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

/// The backend and the descriptors registered with it.
///
/// Kept apart from the watches so a watch under construction can register its links.
#[derive(Debug)]
pub(crate) struct Registry<B: Backend> {
    backend: B,
    config: Config,
    descriptors: HashMap<B::Descriptor, Descriptor<B::Descriptor>>,
}

impl<B: Backend> Registry<B> {
    /// Registers `link` for `(path, mask)`, sharing the descriptor if the backend hands out one
    /// that is already known.
    pub(crate) fn create_watch(
        &mut self,
        path: &Path,
        name: Option<&OsStr>,
        mask: Mask,
        link: LinkRef,
    ) -> Result<B::Descriptor> {
        let mut watchmask = mask;
        if self.config.mask_add() {
            watchmask.insert(Mask::MASK_ADD);
        }

        let descriptor = self
            .backend
            .add_watch(path, watchmask)
            .map_err(|e| Error::io_watch(e).add_path(path.to_owned()))?;

        self.descriptors
            .entry(descriptor.clone())
            .or_insert_with(|| Descriptor::new(descriptor.clone()))
            .add_registration(mask, name, link);
        Ok(descriptor)
    }

    fn forget(&mut self, watch: WatchId) {
        for descriptor in self.descriptors.values_mut() {
            descriptor.forget(watch);
        }
    }

    fn references(&self, watch: WatchId) -> bool {
        self.descriptors.values().any(|d| d.references(watch))
    }
}

/// Symlink-aware watcher.
///
/// Owns the low-level handle, the descriptors registered with it and the watches, keyed by the
/// path they were requested for.
///
/// The watcher never blocks on its own: [`Watcher::read`] blocks the calling thread, or not,
/// as asked. To wait with a timeout, register the watcher's file descriptor with a poller and
/// read without blocking once it is readable.
///
/// ```no_run
/// use symwatch::{Mask, ReadOptions, Watcher};
///
/// # fn main() -> symwatch::Result<()> {
/// let mut watcher = Watcher::new()?;
/// watcher.add("/etc/resolv.conf", Mask::MODIFY | Mask::CLOSE_WRITE)?;
///
/// loop {
///     let events = watcher.read(ReadOptions::default())?.unwrap_or_default();
///     for event in &events {
///         println!("{event}");
///     }
///     // once per batch: every re-add leaves the replaced watch registered
///     if events.iter().any(|event| event.is_link_changed()) {
///         watcher.add("/etc/resolv.conf", Mask::MODIFY | Mask::CLOSE_WRITE)?;
///     }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Watcher<B: Backend = InotifyBackend> {
    registry: Registry<B>,
    watches: HashMap<WatchId, Watch<B::Descriptor>>,
    paths: HashMap<PathBuf, WatchId>,
    buffer: Vec<Event>,
    next_id: u64,
}

impl Watcher<InotifyBackend> {
    /// Create a new inotify-backed watcher.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a new inotify-backed watcher with the given configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let backend = InotifyBackend::init().map_err(Error::io)?;
        Ok(Self::with_backend(backend, config))
    }
}

impl<B: Backend> Watcher<B> {
    /// Create a watcher on top of `backend`.
    pub fn with_backend(backend: B, config: Config) -> Self {
        Watcher {
            registry: Registry {
                backend,
                config,
                descriptors: HashMap::new(),
            },
            watches: HashMap::new(),
            paths: HashMap::new(),
            buffer: Vec::new(),
            next_id: 0,
        }
    }

    /// Watch `path` for the events in `mask`.
    ///
    /// Every symbolic link on the way is followed and watched, so that a change to any of them is
    /// reported as a [`link_changed`](Event::is_link_changed) event. The resolved entry is always
    /// watched for being moved or deleted, on top of `mask`.
    ///
    /// Adding a path that is already watched widens the existing watch's mask, then replaces it
    /// with a freshly resolved watch. The old one keeps reporting through the links it had
    /// registered until their descriptors are removed.
    ///
    /// A dangling symbolic link is not an error: the watch has no leaf and will only report link
    /// changes.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::PathNotFound`](crate::ErrorKind::PathNotFound) if `path` itself doesn't
    ///   exist.
    /// - [`ErrorKind::Io`](crate::ErrorKind::Io) for any other failure while resolving or
    ///   registering, unchanged.
    pub fn add(&mut self, path: impl AsRef<Path>, mask: Mask) -> Result<&Watch<B::Descriptor>> {
        let path = path.as_ref();

        if let Some(id) = self.paths.get(path) {
            if let Some(previous) = self.watches.get_mut(id) {
                previous.widen(mask);
            }
        }

        let id = WatchId(self.next_id);
        self.next_id += 1;

        let watch = match Watch::new(id, path, mask, &mut self.registry) {
            Ok(watch) => watch,
            Err(e) => {
                self.registry.forget(id);
                return Err(e);
            }
        };

        if let Some(previous) = self.paths.insert(path.to_owned(), id) {
            self.release_if_unreferenced(previous);
        }
        Ok(self.watches.entry(id).or_insert(watch))
    }

    /// Read events.
    ///
    /// Events kept by an earlier read with [`ReadOptions::store_events`] are returned first,
    /// without reading from the backend. Otherwise raw events are read, blocking or not as
    /// `options` say, and translated in the order the backend reported them. With
    /// `store_events`, the translated events are kept for the next read and `None` is returned.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NoWatches`](crate::ErrorKind::NoWatches) if no descriptor is registered.
    /// - [`ErrorKind::Io`](crate::ErrorKind::Io) if reading from the backend fails.
    pub fn read(&mut self, options: ReadOptions) -> Result<Option<Vec<Event>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(mem::take(&mut self.buffer)));
        }

        if self.registry.descriptors.is_empty() {
            return Err(Error::no_watches());
        }

        let buffer_size = options
            .buffer_size()
            .unwrap_or(self.registry.config.buffer_size());
        let raw = self
            .registry
            .backend
            .read_events(options.is_blocking(), buffer_size)
            .map_err(Error::io)?;

        let mut events = Vec::new();
        for event in raw {
            self.dispatch(event, &mut events);
        }

        if options.stores_events() {
            self.buffer.extend(events);
            Ok(None)
        } else {
            Ok(Some(events))
        }
    }

    fn dispatch(&mut self, event: RawEvent<B::Descriptor>, events: &mut Vec<Event>) {
        let Some(descriptor) = self.registry.descriptors.get(&event.descriptor) else {
            if event.mask.contains(Mask::Q_OVERFLOW) {
                log::debug!("inotify queue overflow");
                events.push(Event::new(event.mask, event.cookie, event.name, PathBuf::new()));
            } else {
                log::debug!("inotify event with unknown descriptor: {event:?}");
            }
            return;
        };

        events.extend(descriptor.handle_event(&event, &self.watches));

        if Descriptor::is_removed_by(&event) {
            self.remove_watch(&event.descriptor);
        }
    }

    /// Drops a descriptor the kernel no longer reports on, and the replaced watches that were
    /// only kept alive by it.
    fn remove_watch(&mut self, descriptor: &B::Descriptor) {
        let Some(removed) = self.registry.descriptors.remove(descriptor) else {
            return;
        };
        log::debug!("removing descriptor {descriptor:?}");

        let mut released: Vec<WatchId> = removed.watches().collect();
        released.dedup();
        for id in released {
            self.release_if_unreferenced(id);
        }
    }

    fn release_if_unreferenced(&mut self, id: WatchId) {
        let current = self.paths.values().any(|&current| current == id);
        if !current && !self.registry.references(id) {
            self.watches.remove(&id);
        }
    }

    /// The current watch for `path`, as it was passed to [`Watcher::add`].
    pub fn watch(&self, path: impl AsRef<Path>) -> Option<&Watch<B::Descriptor>> {
        self.paths
            .get(path.as_ref())
            .and_then(|id| self.watches.get(id))
    }

    /// Every current watch, with the path it was requested for.
    pub fn watches(&self) -> impl Iterator<Item = (&Path, &Watch<B::Descriptor>)> {
        self.paths.iter().filter_map(|(path, id)| {
            self.watches
                .get(id)
                .map(|watch| (path.as_path(), watch))
        })
    }

    /// The descriptor registered for a low-level `descriptor`, unless it was removed.
    pub fn descriptor(&self, descriptor: &B::Descriptor) -> Option<&Descriptor<B::Descriptor>> {
        self.registry.descriptors.get(descriptor)
    }

    /// Number of live low-level descriptors.
    pub fn num_descriptors(&self) -> usize {
        self.registry.descriptors.len()
    }

    /// The configuration the watcher was created with.
    pub fn config(&self) -> &Config {
        &self.registry.config
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.registry.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.registry.backend
    }

    /// Releases the low-level handle.
    pub fn close(self) -> Result<()> {
        self.registry.backend.close().map_err(Error::io)
    }
}

impl<B: Backend + AsRawFd> AsRawFd for Watcher<B> {
    fn as_raw_fd(&self) -> RawFd {
        self.registry.backend.as_raw_fd()
    }
}

impl<B: Backend + AsFd> AsFd for Watcher<B> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.registry.backend.as_fd()
    }
}
