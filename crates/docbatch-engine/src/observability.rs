//! Structured logging setup.
//!
//! With `logging.json` enabled, entries are emitted as JSON objects:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"DEBUG","target":"docbatch_engine::batching::bulk","fields":{"message":"performing bulk get","group":"Titlemovies","documents":12}}
//! ```
//!
//! `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Initializes the global subscriber from logging settings.
///
/// Only the first call takes effect; later calls are ignored.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_lowercase()));

    if settings.json {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
