//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Logger installation
//! - Run seeds

/// Install the logger for this target. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already installed");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("Logger already installed");
    }
}

/// Fresh seed from the OS entropy source (the browser's crypto API on web).
pub fn random_seed() -> u64 {
    rand::random()
}
