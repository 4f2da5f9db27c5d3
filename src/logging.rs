use env_logger::Env;

/// Initialises the global logger. Defaults to `info` unless `RUST_LOG` says
/// otherwise; request logging is handled by the actix `Logger` middleware.
pub fn setup_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
