pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Display
        .route("/api/display/update-now", post(routes::display::update_now))
        .route(
            "/api/display/plugin-instance",
            post(routes::display::show_plugin_instance),
        )
        .route("/api/display/current", get(routes::display::current))
        // Playlists
        .route("/api/playlists", get(routes::playlists::list_playlists))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API on `0.0.0.0:port` until the process is interrupted.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    serve_on(app_state, listener).await
}

/// Serve on a pre-bound listener, so callers can bind port 0 and read the
/// port the OS picked.
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!("inkcycle listening on http://localhost:{port}");
    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
