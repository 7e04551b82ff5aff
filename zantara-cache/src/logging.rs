//! Tracing setup and dev-mode detection
//!
//! Dev mode makes cache and dedup activity visible at `info` level instead of
//! `debug`. It is switched on by `ZANTARA_DEV_MODE=true` or by running
//! against a local host (`ZANTARA_HOST=localhost` / `127.0.0.1`).

use tracing_subscriber::EnvFilter;

/// Environment variable that forces dev mode on or off
pub const DEV_MODE_ENV: &str = "ZANTARA_DEV_MODE";

/// Environment variable naming the host the frontend is served from
pub const HOST_ENV: &str = "ZANTARA_HOST";

const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Detect dev mode from the process environment
pub fn detect_dev_mode() -> bool {
    dev_mode_from(
        std::env::var(DEV_MODE_ENV).ok().as_deref(),
        std::env::var(HOST_ENV).ok().as_deref(),
    )
}

pub(crate) fn dev_mode_from(flag: Option<&str>, host: Option<&str>) -> bool {
    if let Some(flag) = flag {
        if let Some(enabled) = parse_flag(flag) {
            return enabled;
        }
    }
    host.map_or(false, |h| LOCAL_HOSTS.contains(&h.trim()))
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set. Returns `false` if a subscriber was already installed.
pub fn init_tracing(dev_mode: bool) -> bool {
    let default_directive = if dev_mode { "zantara_cache=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Emit an event at `info` in dev mode and at `debug` otherwise
macro_rules! activity {
    ($dev:expr, $($arg:tt)+) => {
        if $dev {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

pub(crate) use activity;
