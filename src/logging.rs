use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Output goes to stderr:
/// stdout carries the JSON line protocol and must stay clean.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .try_init();
}

/// Debug-level subscriber routed through the test harness writer.
#[cfg(test)]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
