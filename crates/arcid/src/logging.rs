//! Logging setup.
//!
//! The library only emits through the `log` facade. Binaries and tests that
//! want output call [`init`] once, early; `RUST_LOG` wins over the configured
//! filter.

use crate::config::RuntimeConfig;

/// Install `env_logger` as the global logger.
///
/// Returns `false` if a logger was already set (by an earlier call or by the
/// host application), in which case nothing changes.
pub fn init(config: &RuntimeConfig) -> bool {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    match env_logger::Builder::from_env(env).format_timestamp_millis().try_init() {
        Ok(()) => true,
        Err(_) => {
            log::debug!("logger already installed; keeping it");
            false
        }
    }
}

/// Logger for tests: captured by the test harness, ignores failures.
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
