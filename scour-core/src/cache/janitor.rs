use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};

use super::DirectoryEntryCache;

/// Background sweeper evicting expired and dirty cache entries
#[derive(Debug)]
pub(crate) struct Janitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Janitor {
    /// Spawn the sweep loop. The loop only holds a weak reference, so
    /// dropping the last cache handle also ends it.
    pub(crate) fn start(cache: Weak<DirectoryEntryCache>, interval: Duration) -> Self {
        // Never sent on; closing it is the stop signal
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name("scour-janitor".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let Some(cache) = cache.upgrade() else { break };
                            let evicted = cache.sweep_now();
                            if evicted > 0 {
                                log::debug!("janitor evicted {} stale directory listings", evicted);
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                log::info!("cache janitor stopped");
            });

        let handle = match spawned {
            Ok(handle) => {
                log::info!("cache janitor started (interval {:?})", interval);
                Some(handle)
            }
            Err(e) => {
                log::warn!("cache janitor could not start, relying on lazy expiry: {}", e);
                None
            }
        };

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Signal the loop to exit and wait for it. Returns `false` if the
    /// signal was already sent.
    pub(crate) fn stop(&mut self) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return false;
        };
        drop(stop_tx);

        // The last cache handle may be released on the janitor thread itself
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
        true
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        // Detach rather than join; see `stop`
        self.stop_tx.take();
    }
}
