//! Rate limiting for shared-archive installs.
//!
//! On platforms where one archive carries every binary, installing `ffmpeg`
//! and then `ffprobe` would download the same archive twice. The throttle
//! skips an install when the primary binary is present and the last install
//! finished recently.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;

/// Default period during which a repeated shared install is skipped.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Clock
// ============================================================================

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Outcome of [`InstallThrottle::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleOutcome {
    Ran,
    Skipped,
}

/// Remembers when the last guarded install succeeded.
pub struct InstallThrottle {
    window: Duration,
    clock: Arc<dyn Clock>,
    last_install: tokio::sync::Mutex<Option<Instant>>,
}

impl InstallThrottle {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            last_install: tokio::sync::Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Instant of the last successful guarded install, if any.
    pub async fn last_install(&self) -> Option<Instant> {
        *self.last_install.lock().await
    }

    /// Runs `action` unless `present` is true and the window is still open.
    ///
    /// The instant captured before `action` starts becomes the new
    /// last-install time, and only if `action` succeeds.
    pub async fn run<F, Fut>(&self, present: bool, action: F) -> Result<ThrottleOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let started = self.clock.now();

        if present {
            if let Some(last) = *self.last_install.lock().await {
                let elapsed = started.saturating_duration_since(last);
                if elapsed < self.window {
                    info!(
                        "Skipping install, last one finished {}s ago (window {}s)",
                        elapsed.as_secs(),
                        self.window.as_secs()
                    );
                    return Ok(ThrottleOutcome::Skipped);
                }
            }
        }

        action().await?;

        *self.last_install.lock().await = Some(started);
        debug!("Recorded guarded install");
        Ok(ThrottleOutcome::Ran)
    }
}

impl Default for InstallThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl std::fmt::Debug for InstallThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallThrottle")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
