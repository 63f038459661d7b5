use symwatch::{Mask, ReadOptions, Watcher};
use std::path::Path;

// Follows a path through its symbolic links and re-adds it whenever one of them changes.
// Call with cargo run -p symwatch --example monitor -- path/to/watch
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .expect("Argument 1 needs to be a path");

    log::info!("Watching {path}");

    if let Err(error) = watch(path) {
        log::error!("Error: {error:?}");
    }
}

fn watch<P: AsRef<Path>>(path: P) -> symwatch::Result<()> {
    let path = path.as_ref();
    let mask = Mask::MODIFY | Mask::ATTRIB | Mask::CLOSE_WRITE;

    let mut watcher = Watcher::new()?;
    let watch = watcher.add(path, mask)?;
    for link in watch.links() {
        log::info!("  {} {:?}", link.path().display(), link.name());
    }

    loop {
        let events = watcher.read(ReadOptions::default())?.unwrap_or_default();
        for event in &events {
            println!("{event}");
        }

        // Re-add once per batch, however many links reported the change.
        if events.iter().any(|event| event.is_link_changed()) {
            match watcher.add(path, mask) {
                Ok(watch) if watch.is_resolved() => log::info!("re-added {}", path.display()),
                Ok(_) => log::warn!("{} is dangling", path.display()),
                Err(error) => log::warn!("{} is gone: {error}", path.display()),
            }
        }
    }
}
