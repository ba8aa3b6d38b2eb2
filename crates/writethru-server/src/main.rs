//! Binary entrypoint for the writethru HTTP server.
//!
//! Configuration comes from environment variables; see
//! [`ServerConfig::from_env`](writethru_server::config::ServerConfig::from_env).

use std::time::Duration;

use writethru_server::config::ServerConfig;
use writethru_server::router::build_router;
use writethru_server::state::AppState;

/// Sessions idle longer than this are closed.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("Invalid configuration");
    let state = AppState::new(&config).expect("Failed to initialize application state");

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let closed = sessions.sweep_inactive(SESSION_IDLE_TIMEOUT);
            if closed > 0 {
                tracing::info!("Closed {} idle session(s)", closed);
            }
        }
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("writethru server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
