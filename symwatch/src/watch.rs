//! A user-level watch and the resolution of its symlink chain.

use crate::backend::{Backend, RawEvent};
use crate::link::{Link, LinkRef};
use crate::watcher::Registry;
use crate::{Error, Event, Mask, Result};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

/// Same limit as the kernel's `MAXSYMLINKS`.
const MAX_LINK_DEPTH: usize = 40;

/// Identifies a watch for as long as any descriptor refers to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub(crate) u64);

/// What a path turned out to be when read as a symbolic link.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Entry {
    /// A symbolic link; the target is resolved against the link's directory.
    Redirect(PathBuf),
    /// Anything but a symbolic link.
    Terminal,
    /// Nothing there.
    Absent,
}

/// Reads `path` as a symbolic link.
///
/// A single `readlink` both inspects and resolves the entry, so it can't change type between the
/// two steps.
pub(crate) fn classify(path: &Path) -> io::Result<Entry> {
    match fs::read_link(path) {
        Ok(target) => {
            let dir = path.parent().unwrap_or_else(|| Path::new(""));
            Ok(Entry::Redirect(dir.join(target)))
        }
        Err(e) => match e.raw_os_error() {
            Some(libc::EINVAL) => Ok(Entry::Terminal),
            Some(libc::ENOENT) | Some(libc::ENOTDIR) => Ok(Entry::Absent),
            _ => Err(e),
        },
    }
}

/// The requested path without empty and `.` components.
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Splits a symlink path into the directory to watch and the entry name to filter on.
fn split(path: &Path) -> Result<(PathBuf, &OsStr)> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::generic("symbolic link without a name").add_path(path.to_owned()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

/// A watch on a path, resolved through every symbolic link on the way.
///
/// The chain holds one [`Link`] per segment that can change independently: one per symbolic link
/// followed, outermost first, then the leaf for the entry the links resolve to. A watch on a
/// dangling symbolic link has no leaf and only ever reports link changes; add it again once the
/// link points somewhere.
#[derive(Debug)]
pub struct Watch<D> {
    id: WatchId,
    path: PathBuf,
    cwd: PathBuf,
    mask: Mask,
    links: Vec<Link<D>>,
    inode: Option<(u64, u64)>,
}

impl<D: Clone> Watch<D> {
    pub(crate) fn new<B>(
        id: WatchId,
        path: &Path,
        mask: Mask,
        registry: &mut Registry<B>,
    ) -> Result<Self>
    where
        B: Backend<Descriptor = D>,
    {
        let mut watch = Watch {
            id,
            path: normalize(path),
            cwd: env::current_dir().map_err(Error::io)?,
            mask,
            links: Vec::new(),
            inode: None,
        };
        watch.resolve(path.to_owned(), registry)?;
        Ok(watch)
    }

    fn resolve<B>(&mut self, mut path: PathBuf, registry: &mut Registry<B>) -> Result<()>
    where
        B: Backend<Descriptor = D>,
    {
        let mut depth = 0;
        loop {
            let entry = classify(&path).map_err(|e| Error::io(e).add_path(path.clone()))?;
            match entry {
                Entry::Redirect(target) => {
                    if depth == MAX_LINK_DEPTH {
                        let err = io::Error::from_raw_os_error(libc::ELOOP);
                        return Err(Error::io(err).add_path(self.path.clone()));
                    }
                    self.add_link(&path, registry)?;
                    path = target;
                    depth += 1;
                }
                Entry::Terminal => return self.add_leaf(path, registry),
                Entry::Absent if depth == 0 => {
                    return Err(Error::path_not_found().add_path(path));
                }
                Entry::Absent => {
                    log::debug!(
                        "{} is a dangling symbolic link to {}",
                        self.path.display(),
                        path.display()
                    );
                    return Ok(());
                }
            }
        }
    }

    fn add_link<B>(&mut self, path: &Path, registry: &mut Registry<B>) -> Result<()>
    where
        B: Backend<Descriptor = D>,
    {
        let (dir, name) = split(path)?;
        let mask = Mask::MOVE | Mask::DELETE | Mask::CREATE | Mask::ONLYDIR;
        let link = self.next_link();
        let link = Link::new(registry, link, mask, dir, Some(name.to_os_string()))?;
        self.links.push(link);
        Ok(())
    }

    fn add_leaf<B>(&mut self, path: PathBuf, registry: &mut Registry<B>) -> Result<()>
    where
        B: Backend<Descriptor = D>,
    {
        let mask = self.mask | Mask::MOVE_SELF | Mask::DELETE_SELF;
        let link = Link::new(registry, self.next_link(), mask, path, None)?;
        let metadata = fs::metadata(link.path())
            .map_err(|e| Error::io(e).add_path(link.path().to_owned()))?;
        self.inode = Some((metadata.dev(), metadata.ino()));
        self.links.push(link);
        Ok(())
    }

    fn next_link(&self) -> LinkRef {
        LinkRef {
            watch: self.id,
            index: self.links.len(),
        }
    }
}

impl<D> Watch<D> {
    /// Turns a raw event seen by one of the links into the event reported to the caller.
    ///
    /// Only the last link reports events of its own, and only those the watch asked for.
    /// Everything else means the chain may not lead to the same file anymore.
    pub(crate) fn handle_event(&self, event: &RawEvent<D>, link: &Link<D>) -> Event {
        if link.index() + 1 == self.links.len() && event.mask.intersects(self.mask) {
            Event::new(event.mask, event.cookie, event.name.clone(), &self.path)
        } else {
            Event::link_changed(&self.path)
        }
    }

    /// Adds interest to the watch.
    pub(crate) fn widen(&mut self, mask: Mask) {
        self.mask |= mask;
    }

    /// Identifier of this watch.
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// The requested path, without empty and `.` components. Events are addressed at it.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The working directory at the time the watch was created.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The requested path, made absolute against [`Watch::cwd`].
    pub fn absolute_path(&self) -> PathBuf {
        self.cwd.join(&self.path)
    }

    /// The interest requested for the watch.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// The resolved chain, outermost symbolic link first.
    pub fn links(&self) -> &[Link<D>] {
        &self.links
    }

    /// The link at `index`.
    pub fn link(&self, index: usize) -> Option<&Link<D>> {
        self.links.get(index)
    }

    /// The leaf link, unless the chain ends in a dangling symbolic link.
    pub fn leaf(&self) -> Option<&Link<D>> {
        self.links.last().filter(|link| link.is_leaf())
    }

    /// Whether the chain ends in a leaf.
    pub fn is_resolved(&self) -> bool {
        self.leaf().is_some()
    }

    /// Device and inode of the resolved entry.
    pub fn inode(&self) -> Option<(u64, u64)> {
        self.inode
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{OsStr, OsString};
    use std::fs;
    use std::os::unix::fs::{symlink, MetadataExt};
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::test::*;
    use crate::{ErrorKind, ReadOptions};

    #[test]
    fn classify_entries() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        let link = tmpdir.path().join("link");
        fs::write(&file, "").expect("write");
        symlink("file", &link).expect("symlink");

        assert_eq!(classify(&file).unwrap(), Entry::Terminal);
        assert_eq!(classify(tmpdir.path()).unwrap(), Entry::Terminal);
        assert_eq!(classify(&link).unwrap(), Entry::Redirect(file.clone()));
        assert_eq!(classify(&tmpdir.path().join("missing")).unwrap(), Entry::Absent);
        assert_eq!(classify(&file.join("below")).unwrap(), Entry::Absent);
    }

    #[test]
    fn absolute_targets_replace_the_directory() {
        let tmpdir = testdir();
        let link = tmpdir.path().join("link");
        symlink("/somewhere/else", &link).expect("symlink");

        assert_eq!(
            classify(&link).unwrap(),
            Entry::Redirect(PathBuf::from("/somewhere/else"))
        );
    }

    #[rstest]
    #[case::root_is_kept("/tmp//a/./b/", "/tmp/a/b")]
    #[case::leading_current_dir("./a", "a")]
    #[case::only_current_dir(".", ".")]
    #[case::parent_is_kept("a/../b", "a/../b")]
    fn normalize_drops_empty_and_current_components(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(normalize(Path::new(path)), Path::new(expected));
    }

    #[test]
    fn plain_file_is_a_single_leaf() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");

        let mut watcher = scripted();
        let watch = watcher.add(&file, Mask::MODIFY).expect("add");

        assert_eq!(watch.links().len(), 1);
        let leaf = &watch.links()[0];
        assert_eq!(leaf.index(), 0);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.name(), None);
        assert_eq!(leaf.path(), file);
        assert_eq!(leaf.mask(), Mask::MODIFY | Mask::MOVE_SELF | Mask::DELETE_SELF);
        assert!(watch.is_resolved());

        let metadata = fs::metadata(&file).expect("metadata");
        assert_eq!(watch.inode(), Some((metadata.dev(), metadata.ino())));
    }

    #[test]
    fn leaf_always_watches_itself() {
        let tmpdir = testdir();
        let mut watcher = scripted();
        let watch = watcher.add(tmpdir.path(), Mask::empty()).expect("add");

        let leaf = watch.leaf().expect("leaf");
        assert!(leaf.mask().contains(Mask::MOVE_SELF | Mask::DELETE_SELF));
    }

    #[test]
    fn chain_of_symlinks() {
        let tmpdir = testdir();
        let subdir = tmpdir.path().join("subdir");
        fs::create_dir(&subdir).expect("create_dir");
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");

        // outer -> subdir/middle -> ../inner -> file
        symlink("subdir/middle", tmpdir.path().join("outer")).expect("symlink");
        symlink("../inner", subdir.join("middle")).expect("symlink");
        symlink(&file, tmpdir.path().join("inner")).expect("symlink");

        let mut watcher = scripted();
        let outer = tmpdir.path().join("outer");
        let watch = watcher.add(&outer, Mask::MODIFY).expect("add");

        let links: Vec<(usize, PathBuf, Option<OsString>)> = watch
            .links()
            .iter()
            .map(|link| (link.index(), link.path().to_owned(), link.name().map(ToOwned::to_owned)))
            .collect();
        let expected: Vec<(usize, PathBuf, Option<OsString>)> = vec![
            (0, tmpdir.path().to_owned(), Some("outer".into())),
            (1, subdir.clone(), Some("middle".into())),
            (2, subdir.join(".."), Some("inner".into())),
            (3, file.clone(), None),
        ];
        assert_eq!(links, expected);

        for link in &watch.links()[..3] {
            assert!(!link.is_leaf());
            assert_eq!(link.mask(), Mask::MOVE | Mask::DELETE | Mask::CREATE | Mask::ONLYDIR);
        }
        assert!(watch.links()[3].is_leaf());
        assert_eq!(watch.path(), outer);
    }

    #[test]
    fn relative_symlink_without_directory() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");
        let link = tmpdir.path().join("link");
        symlink("file", &link).expect("symlink");

        let mut watcher = scripted();
        let watch = watcher.add(&link, Mask::MODIFY).expect("add");
        assert_eq!(watch.links()[1].path(), file);
        assert_eq!(
            split(Path::new("link")).unwrap(),
            (PathBuf::from("."), OsStr::new("link"))
        );
    }

    #[test]
    fn missing_path_is_not_found() {
        let tmpdir = testdir();
        let missing = tmpdir.path().join("missing");

        let mut watcher = scripted();
        let err = watcher.add(&missing, Mask::MODIFY).expect_err("missing");
        assert!(matches!(err.kind, ErrorKind::PathNotFound));
        assert_eq!(err.paths, [missing.clone()]);
        assert!(watcher.watch(&missing).is_none());
        assert!(watcher.backend().added.is_empty());
    }

    #[test]
    fn dangling_symlink_ends_without_leaf() {
        let tmpdir = testdir();
        let link = tmpdir.path().join("link");
        let hop = tmpdir.path().join("hop");
        symlink("hop", &link).expect("symlink");
        symlink("missing", &hop).expect("symlink");

        let mut watcher = scripted();
        let watch = watcher.add(&link, Mask::MODIFY).expect("add");

        assert_eq!(watch.links().len(), 2);
        assert!(watch.links().iter().all(|link| !link.is_leaf()));
        assert_eq!(watch.links()[1].name(), Some(OsStr::new("hop")));
        assert!(!watch.is_resolved());
        assert_eq!(watch.inode(), None);
    }

    #[test]
    fn symlink_loop_fails() {
        let tmpdir = testdir();
        let a = tmpdir.path().join("a");
        let b = tmpdir.path().join("b");
        symlink("b", &a).expect("symlink");
        symlink("a", &b).expect("symlink");

        let mut watcher = scripted();
        let err = watcher.add(&a, Mask::MODIFY).expect_err("loop");
        assert!(matches!(err.kind, ErrorKind::Io(ref e) if e.raw_os_error() == Some(libc::ELOOP)));
        assert!(watcher.watch(&a).is_none());
    }

    #[test]
    fn readlink_failure_propagates_unchanged() {
        let tmpdir = testdir();
        let long = tmpdir.path().join("a".repeat(300));

        let mut watcher = scripted();
        let err = watcher.add(&long, Mask::MODIFY).expect_err("name too long");
        assert!(
            matches!(err.kind, ErrorKind::Io(ref e) if e.raw_os_error() == Some(libc::ENAMETOOLONG)),
            "{err:?}"
        );
        assert_eq!(err.paths, [long.clone()]);
        assert!(watcher.backend().added.is_empty());
        assert!(watcher.watch(&long).is_none());
    }

    #[test]
    fn unreadable_entry_propagates() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");

        let mut watcher = scripted();
        watcher.backend_mut().denied.push(file.clone());
        let err = watcher.add(&file, Mask::MODIFY).expect_err("denied");
        assert!(matches!(err.kind, ErrorKind::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn only_the_last_link_reports_its_own_events() {
        let tmpdir = testdir();
        let file = tmpdir.path().join("file");
        fs::write(&file, "").expect("write");
        let link = tmpdir.path().join("link");
        symlink(&file, &link).expect("symlink");

        let mut watcher = scripted();
        watcher.add(&link, Mask::MODIFY).expect("add");
        let dir = watcher.backend().descriptor_of(tmpdir.path());
        let leaf = watcher.backend().descriptor_of(&file);

        watcher.backend_mut().queue([
            // wanted, on the leaf
            RawEvent {
                cookie: 3,
                ..raw(leaf, Mask::MODIFY)
            },
            // registered for the leaf, but not asked for
            raw(leaf, Mask::MOVE_SELF),
            // on the symlink
            raw_named(dir, Mask::CREATE | Mask::ISDIR, "link"),
        ]);

        let events = watcher
            .read(ReadOptions::default())
            .expect("read")
            .expect("events");
        assert_eq!(
            events,
            [
                Event::new(Mask::MODIFY, 3, None, &link),
                Event::link_changed(&link),
                Event::link_changed(&link),
            ]
        );
    }
}
