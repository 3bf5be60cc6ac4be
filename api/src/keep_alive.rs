use log::{debug, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::Client;

/// How often the heartbeat thread wakes up to check the stop flag.
const POLL_WAIT: Duration = Duration::from_millis(500);

/// Background heartbeat that pings the server at a fixed interval so the
/// session does not expire during long imports. The thread is stopped and
/// joined by `done` (or on drop).
pub struct KeepAlive {
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl KeepAlive {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    pub fn start(client: Arc<Client>, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop_flag = Arc::clone(&stop_flag);
            thread::spawn(move || {
                let mut last_ping = Instant::now();
                while !stop_flag.load(Ordering::SeqCst) {
                    if last_ping.elapsed() >= interval {
                        match client.ping() {
                            Ok(()) => debug!("Session keep-alive ping"),
                            Err(error) => warn!("Session keep-alive ping failed: {error}"),
                        }
                        last_ping = Instant::now();
                    }
                    thread::sleep(POLL_WAIT);
                }
            })
        };

        KeepAlive {
            stop_flag,
            thread: Some(thread),
        }
    }

    pub fn done(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            handle.join().expect("Could not join keep-alive thread.");
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.done();
    }
}
