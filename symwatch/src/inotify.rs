//! Backend implementation for the inotify Linux API
//!
//! The inotify API provides a mechanism for monitoring filesystem events. Inotify can be used to
//! monitor individual files, or to monitor directories. When a directory is monitored, inotify
//! will return events for the directory itself, and for files inside the directory.
//!
//! The kernel hands out one watch descriptor per inode: registering the same directory twice,
//! even through different paths, yields the same descriptor.

use crate::backend::{Backend, RawEvent};
use crate::config::MIN_BUFFER_SIZE;
use crate::Mask;
use inotify as inotify_sys;
use inotify_sys::{Inotify, WatchDescriptor, WatchMask};
use std::ffi::OsStr;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::Path;

/// Backend implementation based on inotify
#[derive(Debug)]
pub struct InotifyBackend {
    inotify: Inotify,
    buffer: Vec<u8>,
}

impl InotifyBackend {
    /// Opens a new inotify instance.
    pub fn init() -> io::Result<Self> {
        Ok(InotifyBackend {
            inotify: Inotify::init()?,
            buffer: Vec::new(),
        })
    }
}

impl Backend for InotifyBackend {
    type Descriptor = WatchDescriptor;

    fn add_watch(&mut self, path: &Path, mask: Mask) -> io::Result<WatchDescriptor> {
        log::trace!("adding inotify watch: {}", path.display());
        self.inotify
            .watches()
            .add(path, WatchMask::from_bits_truncate(mask.kernel_bits()))
    }

    fn read_events(
        &mut self,
        block: bool,
        buffer_size: usize,
    ) -> io::Result<Vec<RawEvent<WatchDescriptor>>> {
        self.buffer.resize(buffer_size.max(MIN_BUFFER_SIZE), 0);

        let events = retry_interrupted(|| {
            let events = if block {
                self.inotify.read_events_blocking(&mut self.buffer)?
            } else {
                self.inotify.read_events(&mut self.buffer)?
            };
            Ok(events
                .map(|event| {
                    log::trace!("inotify event: {event:?}");
                    RawEvent {
                        descriptor: event.wd,
                        mask: Mask::from_kernel(event.mask.bits()),
                        cookie: event.cookie,
                        name: event.name.map(OsStr::to_os_string),
                    }
                })
                .collect::<Vec<_>>())
        });

        match events {
            // Nothing queued.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            events => events,
        }
    }

    fn close(self) -> io::Result<()> {
        self.inotify.close()
    }
}

/// Runs `read` again for as long as a signal interrupts it.
fn retry_interrupted<T>(mut read: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match read() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                log::trace!("inotify read interrupted, retrying");
            }
            result => return result,
        }
    }
}

impl AsRawFd for InotifyBackend {
    fn as_raw_fd(&self) -> RawFd {
        self.inotify.as_raw_fd()
    }
}

impl AsFd for InotifyBackend {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, OpenOptions};
    use std::io::{self, Write};
    use std::os::unix::fs::symlink;
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{retry_interrupted, InotifyBackend};
    use crate::test::*;
    use crate::{ErrorKind, Event, Mask, ReadOptions, Watcher};

    fn watcher() -> Watcher<InotifyBackend> {
        Watcher::new().expect("inotify init")
    }

    fn read_all(watcher: &mut Watcher<InotifyBackend>) -> Vec<Event> {
        let mut events = watcher
            .read(ReadOptions::default())
            .expect("read")
            .expect("events");
        events.extend(
            watcher
                .read(ReadOptions::default().blocking(false))
                .expect("read")
                .expect("events"),
        );
        events
    }

    fn append(path: &Path) {
        let mut file = OpenOptions::new().append(true).open(path).expect("open");
        file.write_all(b"123").expect("write");
    }

    #[test]
    fn inotify_backend_is_send() {
        fn check<T: Send>() {}
        check::<InotifyBackend>();
        check::<Watcher<InotifyBackend>>();
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut attempts = 0;
        let result = retry_interrupted(|| {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.expect("read"), 3);

        let result: io::Result<()> =
            retry_interrupted(|| Err(io::Error::from_raw_os_error(libc::EBADF)));
        assert_eq!(result.expect_err("fails").raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn modify_plain_file() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");

        let mut watcher = watcher();
        watcher.add(&file, Mask::MODIFY).expect("add");

        append(&file);

        let events = read_all(&mut watcher);
        assert_eq!(events.len(), 1, "{events:#?}");
        assert_eq!(events[0].full_path(), file);
        assert!(events[0].is_modify());
        assert!(!events[0].is_link_changed());
    }

    #[test]
    fn rename_symlink_signals_link_changed() {
        let tmpdir = testdir();
        let target = tmpdir.path().join("target");
        let link = tmpdir.path().join("link");
        fs::write(&target, "").expect("write");
        symlink(&target, &link).expect("symlink");

        let mut watcher = watcher();
        watcher.add(&link, Mask::MODIFY).expect("add");

        fs::rename(&link, tmpdir.path().join("renamed")).expect("rename");

        assert_eq!(read_all(&mut watcher), [Event::link_changed(&link)]);
    }

    #[test]
    fn delete_symlink_target_is_a_leaf_event() {
        let tmpdir = testdir();
        let target = tmpdir.path().join("target");
        let link = tmpdir.path().join("link");
        fs::write(&target, "").expect("write");
        symlink(&target, &link).expect("symlink");

        let mut watcher = watcher();
        watcher
            .add(&link, Mask::MODIFY | Mask::DELETE_SELF)
            .expect("add");
        assert_eq!(watcher.num_descriptors(), 2);

        fs::remove_file(&target).expect("remove");

        let events = read_all(&mut watcher);
        assert_eq!(events.len(), 1, "{events:#?}");
        assert!(events[0].is_delete_self());
        assert!(!events[0].is_link_changed());
        assert_eq!(events[0].path(), link);

        // the leaf's IN_IGNORED retired its descriptor
        assert_eq!(watcher.num_descriptors(), 1);
    }

    #[test]
    fn write_through_symlink_is_addressed_at_the_link() {
        let tmpdir = testdir();
        let subdir = tmpdir.path().join("subdir");
        let target = subdir.join("target");
        let link = tmpdir.path().join("link");
        fs::create_dir(&subdir).expect("create_dir");
        fs::write(&target, "").expect("write");
        symlink("subdir/target", &link).expect("symlink");

        let mut watcher = watcher();
        let watch = watcher.add(&link, Mask::MODIFY).expect("add");
        assert_eq!(watch.links().len(), 2);

        append(&target);

        let events = read_all(&mut watcher);
        assert_eq!(events.len(), 1, "{events:#?}");
        assert_eq!(events[0].full_path(), link);
        assert!(events[0].is_modify());
    }

    #[test]
    fn missing_path_is_not_found() {
        let mut watcher = watcher();
        let result = watcher.add("/some/non/existant/path", Mask::ALL_EVENTS);
        assert!(matches!(
            result,
            Err(crate::Error {
                kind: ErrorKind::PathNotFound,
                paths: _,
            })
        ));
    }

    #[test]
    fn dangling_symlink_is_watched_without_leaf() {
        let tmpdir = testdir();
        let link = tmpdir.path().join("dangling");
        symlink(tmpdir.path().join("missing"), &link).expect("symlink");

        let mut watcher = watcher();
        let watch = watcher.add(&link, Mask::MODIFY).expect("add");
        assert!(!watch.is_resolved());
        assert!(!watch.links().last().expect("link").is_leaf());

        // fixing the link is visible as a change of the chain
        fs::remove_file(&link).expect("remove");
        assert_eq!(read_all(&mut watcher), [Event::link_changed(&link)]);
    }

    #[test]
    fn non_blocking_read_returns_immediately() {
        let tmpdir = testdir();
        let mut watcher = watcher();
        watcher.add(tmpdir.path(), Mask::CREATE).expect("add");

        let events = watcher
            .read(ReadOptions::default().blocking(false))
            .expect("read");
        assert_eq!(events, Some(Vec::new()));
    }

    #[test]
    fn directory_watch_reports_entry_names() {
        let tmpdir = testdir();
        let mut watcher = watcher();
        watcher.add(tmpdir.path(), Mask::CREATE).expect("add");

        let entry = tmpdir.path().join("entry");
        fs::create_dir(&entry).expect("create_dir");

        let events = read_all(&mut watcher);
        assert_eq!(events.len(), 1, "{events:#?}");
        assert!(events[0].is_create());
        assert!(events[0].is_isdir());
        assert_eq!(events[0].full_path(), entry);
    }

    #[test]
    fn symlinks_in_one_directory_share_a_descriptor() {
        let tmpdir = testdir();
        let target = tmpdir.path().join("target");
        fs::write(&target, "").expect("write");
        let first = tmpdir.path().join("first");
        let second = tmpdir.path().join("second");
        symlink(&target, &first).expect("symlink");
        symlink(&target, &second).expect("symlink");

        let mut watcher = watcher();
        let dir = watcher.add(&first, Mask::MODIFY).expect("add").links()[0]
            .descriptor()
            .clone();
        watcher.add(&second, Mask::MODIFY).expect("add");

        let descriptor = watcher.descriptor(&dir).expect("descriptor");
        assert_eq!(descriptor.len(), 2);

        fs::remove_file(&second).expect("remove");
        assert_eq!(read_all(&mut watcher), [Event::link_changed(&second)]);

        // both leaves are the same inode: one write, one event per watch
        append(&target);
        let events = read_all(&mut watcher);
        assert_eq!(events.len(), 2, "{events:#?}");
        assert!(events.iter().all(Event::is_modify));
    }

    #[test]
    fn close_releases_the_handle() {
        let watcher = watcher();
        watcher.close().expect("close");
    }
}
