//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT request shutdown; SIGHUP requests an on-demand
//! report of the bridge's totals. Handlers only touch atomics; a watcher
//! thread copies the flags into shared state read by the main loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM or SIGINT.
    Shutdown,
    /// SIGHUP, used to request a report.
    Report,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Shutdown => write!(f, "shutdown"),
            SignalKind::Report => write!(f, "report"),
        }
    }
}

/// Flags shared between the signal watcher and the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    /// Set when shutdown is requested.
    shutdown_requested: AtomicBool,
    /// Set when a report is requested; cleared when taken.
    report_requested: AtomicBool,
    /// Count of signals received.
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if a report has been requested (and clear the flag).
    #[inline]
    pub fn take_report_request(&self) -> bool {
        self.report_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request a report (can be called from any thread).
    pub fn request_report(&self) {
        self.report_requested.store(true, Ordering::Relaxed);
    }

    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        debug!(%kind, "Signal recorded");
    }

    /// Total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Cloneable handle to the daemon's signal state.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a handler and, on Unix, install SIGTERM/SIGINT/SIGHUP handlers.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    /// Create a handler that only reacts to manual requests.
    #[cfg(test)]
    fn detached() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
        static REPORT_FLAG: AtomicBool = AtomicBool::new(false);

        extern "C" fn shutdown_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn report_handler(_: c_int) {
            REPORT_FLAG.store(true, Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("signal-watch".into())
            .spawn(move || loop {
                if SHUTDOWN_FLAG.swap(false, Ordering::Relaxed) {
                    info!("Shutdown signal received");
                    state.record_signal(SignalKind::Shutdown);
                    state.request_shutdown();
                }
                if REPORT_FLAG.swap(false, Ordering::Relaxed) {
                    state.record_signal(SignalKind::Report);
                    state.request_report();
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            })?;

        // SAFETY: the handlers only store to static atomics, which is async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, report_handler as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if a report has been requested (clears the flag).
    #[inline]
    pub fn take_report_request(&self) -> bool {
        self.state.take_report_request()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    /// Signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}

/// Block until shutdown is signaled or `timeout` expires.
///
/// Returns `true` if shutdown was signaled.
pub fn wait_for_shutdown(handler: &SignalHandler, timeout: Duration) -> bool {
    let start = Instant::now();
    let slice = Duration::from_millis(50);

    loop {
        if handler.shutdown_requested() {
            return true;
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return false;
        }
        std::thread::sleep(slice.min(timeout - elapsed));
    }
}
