//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Set to `json` for line-delimited JSON logs.
pub const LOG_FORMAT_ENV: &str = "PAPERLOG_LOG_FORMAT";

/// Default filter directive; `RUST_LOG` takes precedence.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "paperlog=debug" } else { "paperlog=info" }
}

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(verbose).into());
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
}
