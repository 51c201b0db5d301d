//! thread-scout service entrypoint (Shuttle).
//! Boots the axum router with configured providers, bookmark store and metrics.

use shuttle_axum::ShuttleAxum;

/// Compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - SCOUT_DEV_LOG=1
/// In deployment the Shuttle runtime owns the subscriber.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("SCOUT_DEV_LOG").is_ok_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if dev_flag && is_dev_env {
        thread_scout::logging::init_from_env();
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let router = thread_scout::app().await?;
    Ok(router.into())
}
