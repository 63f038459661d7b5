//! Configuration types

/// Longest file name the kernel can put in an event.
const NAME_MAX: usize = 255;

/// Smallest buffer guaranteed to hold one event with the longest possible name.
pub const MIN_BUFFER_SIZE: usize = std::mem::size_of::<libc::inotify_event>() + NAME_MAX + 1;

/// Default size of the buffer raw events are read into.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Watcher configuration
///
/// ```rust
/// # use symwatch::Config;
/// let config = Config::default()
///     .with_buffer_size(16 * 1024)
///     .with_mask_add(false);
/// ```
///
/// The configuration is fixed when the watcher is created.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Config {
    /// See [Config::with_buffer_size]
    buffer_size: usize,

    /// See [Config::with_mask_add]
    mask_add: bool,
}

impl Config {
    /// Size of the buffer used by reads that don't ask for a specific size.
    ///
    /// Values below [`MIN_BUFFER_SIZE`] are raised to it. 4096 bytes by default.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Returns current setting
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Whether low-level registrations add to the interest of an existing kernel watch
    /// (`IN_MASK_ADD`) instead of replacing it.
    ///
    /// The kernel hands out one watch per inode. Without `IN_MASK_ADD`, registering a second
    /// segment on a directory that is already watched narrows what the first one receives.
    ///
    /// On by default.
    pub fn with_mask_add(mut self, mask_add: bool) -> Self {
        self.mask_add = mask_add;
        self
    }

    /// Returns current setting
    pub fn mask_add(&self) -> bool {
        self.mask_add
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            mask_add: true,
        }
    }
}

/// Options for a single [`Watcher::read`](crate::Watcher::read).
///
/// ```rust
/// # use symwatch::ReadOptions;
/// let poll = ReadOptions::default().blocking(false);
/// let stash = ReadOptions::default().store_events(true);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct ReadOptions {
    block: bool,
    buffer_size: Option<usize>,
    store_events: bool,
}

impl ReadOptions {
    /// Whether to wait for events when none are queued. On by default.
    ///
    /// A non-blocking read returns whatever is immediately available, possibly nothing.
    pub fn blocking(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Returns current setting
    pub fn is_blocking(&self) -> bool {
        self.block
    }

    /// Buffer size for this read. `None` (and `Some(0)`) use the watcher's configured size.
    pub fn with_buffer_size(mut self, buffer_size: Option<usize>) -> Self {
        self.buffer_size = buffer_size.filter(|&size| size != 0);
        self
    }

    /// Returns current setting
    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }

    /// Keep the events for the next read instead of returning them.
    pub fn store_events(mut self, store_events: bool) -> Self {
        self.store_events = store_events;
        self
    }

    /// Returns current setting
    pub fn stores_events(&self) -> bool {
        self.store_events
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            block: true,
            buffer_size: None,
            store_events: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_is_clamped() {
        assert_eq!(Config::default().buffer_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(Config::default().with_buffer_size(1).buffer_size(), MIN_BUFFER_SIZE);
        assert_eq!(MIN_BUFFER_SIZE, 16 + 256);
    }

    #[test]
    fn zero_read_buffer_means_default() {
        let options = ReadOptions::default().with_buffer_size(Some(0));
        assert_eq!(options.buffer_size(), None);
        assert!(options.is_blocking());
        assert!(!options.stores_events());
    }
}
