mod error;
mod event;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::time::Duration;

/// Grace between the summary broadcast and room deletion.
const DEFAULT_ROOM_DELETE_DELAY_MS: u64 = 5_000;

/// Parse an environment variable, falling back to the default on absence or
/// garbage.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = env_parse("PORT", 3000);
    let delete_delay = Duration::from_millis(env_parse(
        "ROOM_DELETE_DELAY_MS",
        DEFAULT_ROOM_DELETE_DELAY_MS,
    ));

    let state = state::AppState::new(delete_delay);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("bind failed");
    tracing::info!(%port, "pointdeck listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
