//! Logging infrastructure - structured tracing across the bridge
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels (env or `RUST_LOG`)
//! - Console output, human-readable or JSON
//! - Optional file output through a non-blocking writer
//! - Fixed `event = "..."` fields so host and handle traffic can be filtered

use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the file writer flushing for the process lifetime
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path, console only when `None`
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // DOTNET_BRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("DOTNET_BRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        // DOTNET_BRIDGE_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("DOTNET_BRIDGE_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("DOTNET_BRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("DOTNET_BRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config used while chasing reference leaks
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Idempotent. If the host application already installed a global subscriber
/// that one is left in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "dotnet_bridge={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let console = if config.json_format {
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
                .with_line_number(cfg!(debug_assertions))
                .boxed()
        };

        let file = config.log_path.as_deref().map(|path| {
            let path = Path::new(path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dotnet-bridge.log".to_string());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let _ = FILE_GUARD.set(guard);
            fmt::layer().with_writer(writer).with_ansi(false).boxed()
        });

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(file)
            .try_init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Bridge-specific logging functions
// ============================================================================

/// Log hosting library load
pub fn log_host_load(path: &Path) {
    tracing::info!(
        event = "host_load",
        path = %path.display(),
        "Hosted runtime loaded"
    );
}

/// Log hosting library unload
pub fn log_host_unload() {
    tracing::info!(event = "host_unload", "Hosted runtime unloaded");
}

/// Log a load failure
pub fn log_host_error(error: &dyn std::error::Error) {
    tracing::error!(
        event = "host_error",
        error = %error,
        "Hosted runtime failed to load"
    );
}

/// Log a message written by the hosted runtime's error writer
pub fn log_host_message(message: &str) {
    tracing::warn!(event = "host_message", message = message, "hostfxr");
}

/// Log an entry point or member that could not be resolved
pub fn log_unresolved(kind: &str, name: &str) {
    tracing::error!(
        event = "unresolved",
        kind = kind,
        name = name,
        "Member could not be resolved"
    );
}

/// Log outbound text cut short at an interior nul
pub fn log_interior_nul(offset: usize) {
    tracing::warn!(
        event = "interior_nul",
        offset = offset,
        "Text truncated at interior nul before crossing into the hosted runtime"
    );
}

/// Log a GC reference registration
#[inline]
pub fn log_ref_added(handle: *const core::ffi::c_void, weak: bool) {
    tracing::trace!(event = "ref_add", handle = ?handle, weak = weak, "Object reference added");
}

/// Log a GC reference release
#[inline]
pub fn log_ref_freed(handle: *const core::ffi::c_void) {
    tracing::trace!(event = "ref_free", handle = ?handle, "Object reference freed");
}

/// Log a managed exception captured by a safe call
pub fn log_managed_exception(message: &str) {
    tracing::debug!(
        event = "managed_exception",
        message = message,
        "Managed exception captured"
    );
}

/// Log a failure inside a native callback invoked by the hosted runtime
pub fn log_callback_error(kind: &str, detail: &str) {
    tracing::error!(
        event = "callback_error",
        kind = kind,
        detail = detail,
        "Native callback failed"
    );
}

/// Log a dispatch into a context that is no longer registered
pub fn log_dangling_context(context: *const core::ffi::c_void) {
    tracing::error!(
        event = "dangling_context",
        context = ?context,
        "Hosted runtime called into a released callback context"
    );
}

/// Log a release that arrived after the adapter was shut down
pub fn log_release_after_shutdown(what: &str) {
    tracing::warn!(
        event = "release_after_shutdown",
        resource = what,
        "Resource outlived the hosted runtime"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &str) -> PerformanceGuard {
        PerformanceGuard {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: String,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            debug!(
                operation = %self.operation,
                duration_us = self.start.elapsed().as_micros() as u64,
                "operation completed"
            );
        }
    }
}
