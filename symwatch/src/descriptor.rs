//! Fan-out of one low-level watch to every link registered with it.

use crate::backend::RawEvent;
use crate::link::LinkRef;
use crate::watch::{Watch, WatchId};
use crate::{Event, Mask};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

#[derive(Debug)]
struct Registration {
    mask: Mask,
    name: Option<OsString>,
    link: LinkRef,
}

impl Registration {
    fn matches<D>(&self, event: &RawEvent<D>) -> bool {
        event.mask.intersects(self.mask)
            && self
                .name
                .as_ref()
                .map_or(true, |name| event.name.as_ref() == Some(name))
    }
}

/// A low-level watch and the links registered with it.
///
/// The kernel returns the same descriptor for every registration on one inode, so unrelated
/// watches can end up here. Removal is all or nothing: once the kernel reports `IN_IGNORED`
/// the descriptor is dropped and every link registered with it goes quiet.
#[derive(Debug)]
pub struct Descriptor<D> {
    descriptor: D,
    mask: Mask,
    registrations: Vec<Registration>,
}

impl<D> Descriptor<D> {
    pub(crate) fn new(descriptor: D) -> Self {
        Descriptor {
            descriptor,
            mask: Mask::empty(),
            registrations: Vec::new(),
        }
    }

    pub(crate) fn add_registration(&mut self, mask: Mask, name: Option<&OsStr>, link: LinkRef) {
        self.mask |= mask;
        self.registrations.push(Registration {
            mask,
            name: name.map(OsStr::to_os_string),
            link,
        });
    }

    /// Drops the registrations of a watch that failed to resolve.
    pub(crate) fn forget(&mut self, watch: WatchId) {
        self.registrations.retain(|r| r.link.watch != watch);
        self.mask = self
            .registrations
            .iter()
            .fold(Mask::empty(), |mask, r| mask | r.mask);
    }

    pub(crate) fn references(&self, watch: WatchId) -> bool {
        self.registrations.iter().any(|r| r.link.watch == watch)
    }

    pub(crate) fn watches(&self) -> impl Iterator<Item = WatchId> + '_ {
        self.registrations.iter().map(|r| r.link.watch)
    }

    /// The low-level descriptor.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Union of the interest of every registration.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no link is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Runs `event` through every matching registration, in registration order.
    pub(crate) fn handle_event(
        &self,
        event: &RawEvent<D>,
        watches: &HashMap<WatchId, Watch<D>>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for registration in self.registrations.iter().filter(|r| r.matches(event)) {
            let LinkRef { watch, index } = registration.link;
            match watches.get(&watch).and_then(|w| w.link(index).map(|l| (w, l))) {
                Some((watch, link)) => events.push(link.handle_event(watch, event)),
                None => log::debug!("registration of a released watch: {watch:?}"),
            }
        }
        events
    }

    /// Whether `event` ends this descriptor.
    pub(crate) fn is_removed_by(event: &RawEvent<D>) -> bool {
        event.mask.contains(Mask::IGNORED)
    }
}
