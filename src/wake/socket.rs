//! Cross-process wake signals over Unix datagram sockets.
//!
//! Layout inside the shared directory:
//!
//! ```text
//! <root>/<signal>/<pid>-<n>.sock     one socket per live listener
//! ```
//!
//! [`post`](SocketWakeChannel::post) sends an empty datagram to every socket
//! that does not belong to the calling process. Sockets whose owner has died
//! refuse the datagram and are removed on the spot. Listeners block on a
//! dedicated thread (`wake-listener`) and invoke their callback per datagram.

use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{WakeCallback, WakeChannel, WakeError, WakeSubscription};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct SocketWakeChannel {
    root: PathBuf,
    next_socket: AtomicU64,
}

impl SocketWakeChannel {
    /// Signals live under `root` (typically `<shared_dir>/wake`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_socket: AtomicU64::new(0),
        }
    }

    fn signal_dir(&self, signal: &str) -> PathBuf {
        let name: String = signal
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.root.join(name)
    }

    fn own_prefix() -> String {
        format!("{}-", std::process::id())
    }
}

fn is_socket_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sock")
}

impl WakeChannel for SocketWakeChannel {
    fn post(&self, signal: &str) {
        let dir = self.signal_dir(signal);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            // Nobody has ever listened.
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                log::debug!("wake: cannot list {}: {e}", dir.display());
                return;
            }
        };

        let sender = match UnixDatagram::unbound() {
            Ok(sender) => sender,
            Err(e) => {
                log::warn!("wake: cannot create sender socket: {e}");
                return;
            }
        };

        let own = Self::own_prefix();
        let mut delivered = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_socket_file(&path) || entry.file_name().to_string_lossy().starts_with(&own) {
                continue;
            }

            match sender.send_to(&[], &path) {
                Ok(_) => delivered += 1,
                Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                    log::debug!("wake: pruning dead listener {}", path.display());
                    let _ = std::fs::remove_file(&path);
                }
                Err(e) => log::debug!("wake: signal to {} dropped: {e}", path.display()),
            }
        }

        log::trace!("wake: posted {signal} to {delivered} listener(s)");
    }

    fn observe(
        &self,
        signal: &str,
        callback: WakeCallback,
    ) -> Result<WakeSubscription, WakeError> {
        let dir = self.signal_dir(signal);
        std::fs::create_dir_all(&dir)?;

        let n = self.next_socket.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{}{n}.sock", Self::own_prefix()));
        // Left over from an earlier process with the same pid.
        let _ = std::fs::remove_file(&path);

        let socket = UnixDatagram::bind(&path)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let closed = Arc::new(AtomicBool::new(false));
        let thread_closed = Arc::clone(&closed);
        let thread_path = path.clone();

        std::thread::Builder::new()
            .name("wake-listener".into())
            .spawn(move || {
                let mut buf = [0u8; 64];
                while !thread_closed.load(Ordering::SeqCst) {
                    match socket.recv(&mut buf) {
                        Ok(_) => {
                            if !thread_closed.load(Ordering::SeqCst) {
                                callback();
                            }
                        }
                        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                        Err(e) => {
                            log::warn!("wake: listener {} stopped: {e}", thread_path.display());
                            break;
                        }
                    }
                }
            })?;

        log::debug!("wake: listening for {signal} at {}", path.display());

        Ok(WakeSubscription::new(move || {
            closed.store(true, Ordering::SeqCst);
            let _ = std::fs::remove_file(&path);
        }))
    }
}
