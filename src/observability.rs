// Logging and run timing for repolyze

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static ANALYSES_STARTED: AtomicU64 = AtomicU64::new(0);
static ANALYSES_FAILED: AtomicU64 = AtomicU64::new(0);

/// Initialize the logging and tracing infrastructure
/// This should be called once at application startup
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Filter used when RUST_LOG is not set
pub fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "repolyze=debug,info"
    } else {
        "repolyze=info,warn"
    }
}

/// Initialize logging with configurable verbosity
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    // --quiet wins over RUST_LOG
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)))
    } else {
        EnvFilter::new(default_filter(verbose, quiet))
    };

    // Logs go to stderr so JSON output on stdout stays clean
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            debug!("repolyze logging initialized");
            Ok(())
        }
        Err(_) => {
            // Already initialized, which is fine in test environments
            Ok(())
        }
    }
}

/// Process-wide analysis counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisCounters {
    pub started: u64,
    pub failed: u64,
}

pub fn analysis_counters() -> AnalysisCounters {
    AnalysisCounters {
        started: ANALYSES_STARTED.load(Ordering::Relaxed),
        failed: ANALYSES_FAILED.load(Ordering::Relaxed),
    }
}

/// Times one analysis run and logs the elapsed time on drop
pub struct RunTimer {
    name: &'static str,
    start: Instant,
    failed: bool,
}

impl RunTimer {
    pub fn start(name: &'static str) -> Self {
        ANALYSES_STARTED.fetch_add(1, Ordering::Relaxed);
        debug!("Timer started: {}", name);
        Self {
            name,
            start: Instant::now(),
            failed: false,
        }
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        if self.failed {
            ANALYSES_FAILED.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            failed = self.failed,
            "Timer completed: {}", self.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_level_configurations() {
        let configs = vec![
            ("quiet", default_filter(false, true)),
            ("verbose", default_filter(true, false)),
            ("default", default_filter(false, false)),
        ];

        for (mode, filter_str) in configs {
            assert!(
                EnvFilter::try_new(filter_str).is_ok(),
                "Failed to create filter for {} mode with filter: {}",
                mode,
                filter_str
            );
        }
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(default_filter(true, true), "error");
    }

    #[test]
    fn test_run_timer_counts_failures() {
        let before = analysis_counters();
        {
            let mut timer = RunTimer::start("test_run");
            timer.mark_failed();
        }
        let after = analysis_counters();
        assert!(after.started > before.started);
        assert!(after.failed > before.failed);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging().unwrap();
        init_logging_with_level(true, false).unwrap();
    }
}
