//! Unified Error Handler Module
//!
//! ## Error categories
//! - Recoverable: expected failure, recorded and the run continues
//! - Fatal: propagate and abort the run
//! - Optional: non-critical side operation failed, log and continue
//!
//! `report_error()` prints the whole cause chain to stderr and the log before
//! the process exits; `install_panic_handler()` does the same for panics.

use std::fmt;
use std::panic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Recoverable,
    Fatal,
    Optional,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Recoverable => write!(f, "RECOVERABLE"),
            ErrorCategory::Fatal => write!(f, "FATAL"),
            ErrorCategory::Optional => write!(f, "OPTIONAL"),
        }
    }
}

#[derive(Debug)]
pub enum ErrorAction {
    Continue,
    Abort(anyhow::Error),
}

/// Log an error according to its category and decide whether to go on.
pub fn handle_error<E: std::error::Error + Send + Sync + 'static>(
    category: ErrorCategory,
    context: &str,
    error: E,
    suggestion: Option<&str>,
) -> ErrorAction {
    let suggestion_str = suggestion.unwrap_or("No specific action required");

    match category {
        ErrorCategory::Recoverable => {
            tracing::warn!(
                category = %category,
                context,
                error = %error,
                suggestion = suggestion_str,
                "⚠️ Recoverable error, continuing"
            );
            ErrorAction::Continue
        }
        ErrorCategory::Fatal => {
            tracing::error!(
                category = %category,
                context,
                error = %error,
                suggestion = suggestion_str,
                "❌ Fatal error, aborting"
            );
            ErrorAction::Abort(anyhow::Error::new(error).context(context.to_string()))
        }
        ErrorCategory::Optional => {
            tracing::info!(category = %category, context, error = %error, "ℹ️ Non-critical error");
            ErrorAction::Continue
        }
    }
}

/// Print an error and its full cause chain to stderr and the log.
pub fn report_error(error: &(dyn std::error::Error + 'static)) {
    eprintln!("🔥 ERROR: {}", error);
    tracing::error!("Error occurred: {}", error);

    let mut source = error.source();
    let mut level = 1;
    while let Some(err) = source {
        eprintln!("   {}. Caused by: {}", level, err);
        tracing::error!("  Caused by (level {}): {}", level, err);
        source = err.source();
        level += 1;
    }
}

pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        eprintln!("💥 PANIC occurred!");
        eprintln!("   Message: {}", message);
        eprintln!("   Location: {}", location);

        tracing::error!("PANIC: {} at {}", message, location);

        default_hook(panic_info);
    }));
}
