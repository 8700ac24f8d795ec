use env_logger::Env;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Diagnostics go to stderr at `warn` unless `RUST_LOG` says otherwise.
/// User-facing progress is written by `ScanLog`, not through here.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .init();
    });
}
