//! JSON logs for the migrator.
//!
//! Repair and validation logs carry `id`, `kind` and `direction` as top-level
//! fields. Each line also includes the current span, so events logged inside
//! a validation run carry its direction, mode and watermark. Database and
//! broker client chatter is held at `warn` unless the filter names it.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dependencies logged at `warn` unless the filter sets their level.
const QUIET_TARGETS: &[&str] = &["sqlx", "rdkafka", "hyper"];

/// Append `target=warn` for every quiet dependency `filter` leaves unset.
fn with_quiet_dependencies(filter: &str) -> String {
    let mut directives: Vec<String> = filter
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();

    for target in QUIET_TARGETS {
        let named = directives
            .iter()
            .any(|d| d.split('=').next() == Some(*target) || d.starts_with(&format!("{target}::")));
        if !named {
            directives.push(format!("{target}=warn"));
        }
    }
    directives.join(",")
}

/// Initialize the tracing subscriber with JSON logging.
///
/// `filter` is the `RUST_LOG` value loaded with the configuration. The
/// process exits when it does not parse.
///
/// # Panics
///
/// Panics if the subscriber has already been initialized.
pub fn init_logging(filter: &str) {
    let directives = with_quiet_dependencies(filter);
    let filter_layer = match EnvFilter::try_new(&directives) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("FATAL: Invalid log filter {filter:?}: {e}");
            std::process::exit(1);
        }
    };

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_current_span(true)
        .with_span_list(false)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    tracing::info!(filter = %directives, "Logging initialized");
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(with_quiet_dependencies("debug"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_libraries_default_to_warn() {
        assert_eq!(
            with_quiet_dependencies("info"),
            "info,sqlx=warn,rdkafka=warn,hyper=warn"
        );
    }

    #[test]
    fn test_explicit_dependency_level_is_kept() {
        assert_eq!(
            with_quiet_dependencies("debug, sqlx=info ,rdkafka::consumer=trace"),
            "debug,sqlx=info,rdkafka::consumer=trace,hyper=warn"
        );
    }

    #[test]
    fn test_engine_debugging_filter_parses() {
        let directives = with_quiet_dependencies("info,migrator_engine=debug");
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_route_tests_can_each_init_logging() {
        init_test_logging();
        init_test_logging();
    }
}
