//! Logger setup for binaries built on the app crate.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger` with an `info` default filter. Later calls do nothing.
pub fn init_logging() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        if let Err(err) = env_logger::Builder::from_env(env).try_init() {
            eprintln!("Logger already installed: {err}");
        }
    });
}
