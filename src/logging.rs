//! Subscriber setup shared by the CLI and the dev server.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_FILTER: &str = "thread_scout=info,warn";
pub const ENV_LOG_JSON: &str = "SCOUT_LOG_JSON";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn json_requested() -> bool {
    std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Install a global subscriber: `RUST_LOG` or the default filter, compact
/// lines, JSON lines when `SCOUT_LOG_JSON=1`. A second call is a no-op.
pub fn init_from_env() {
    let registry = tracing_subscriber::registry().with(filter());
    let res = if json_requested() {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
