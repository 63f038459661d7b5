use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;
use symwatch::{Mask, ReadOptions, Watcher};

const WATCHER: Token = Token(0);

// Drives a watcher from a mio event loop, reading without blocking once its descriptor is
// readable.
// Call with cargo run -p symwatch --example monitor_poll -- path/to/watch
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
    let mut watcher = Watcher::new()?;
    watcher.add(path.as_ref(), Mask::ALL_EVENTS)?;

    let mut poll = Poll::new()?;
    let fd = watcher.as_raw_fd();
    poll.registry()
        .register(&mut SourceFd(&fd), WATCHER, Interest::READABLE)?;

    let mut events = Events::with_capacity(16);
    loop {
        poll.poll(&mut events, Some(Duration::from_secs(5)))?;
        if events.is_empty() {
            log::debug!("nothing happened");
            continue;
        }

        // Readiness is edge-triggered: drain until nothing is left.
        let options = ReadOptions::default().blocking(false);
        loop {
            let batch = watcher.read(options)?.unwrap_or_default();
            if batch.is_empty() {
                break;
            }
            for event in batch {
                println!("{event}");
            }
        }
    }
}
