use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Picks the filter directive.
///
/// Priority: `RUST_LOG` > `--debug` > settings `logLevel` > `info`.
fn directive(rust_log: Option<String>, debug_flag: bool, settings_level: Option<&str>) -> String {
    if let Some(env) = rust_log.filter(|v| !v.trim().is_empty()) {
        return env;
    }
    if debug_flag {
        return "debug".to_string();
    }
    settings_level
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global subscriber, writing to stderr so command output on
/// stdout stays clean. Safe to call more than once.
pub fn init(debug_flag: bool, settings_level: Option<&str>) {
    let directive = directive(std::env::var("RUST_LOG").ok(), debug_flag, settings_level);
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            version = env!("CARGO_PKG_VERSION"),
            filter = %directive,
            "logging initialised"
        );
    }
}
