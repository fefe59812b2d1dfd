use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "HISTORYTRENDS_LOG_FORMAT";

/// Install the global tracing subscriber. Filtering follows `RUST_LOG`,
/// defaulting to `info`. Logs go to stderr so stdout stays free for data.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
