//! Twin Chat - talk to a digital twin, read the reply in Korean
//!
//! Serves a small browser chat page and a JSON API. Every user message is
//! answered by a remote OpenAI-compatible completion endpoint, and each reply
//! is then translated into Korean by a second endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use crate::config::{Config, Persona};
use crate::core::{ChatEngine, SessionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_engine: Arc<ChatEngine>,
    pub sessions: Arc<SessionStore>,
    pub persona: Arc<Persona>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twin_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let persona = match &config.persona_file {
        Some(path) => Persona::load_from_file(path).await?,
        None => Persona::default(),
    };
    tracing::info!("🎭 Persona: {}", persona.persona.name);

    let chat_engine = ChatEngine::from_config(&config, &persona)?;

    tracing::info!(
        "💬 Completion: {} ({})",
        config.completion.base_url,
        config.completion.model
    );
    match &config.translation {
        Some(endpoint) => {
            tracing::info!("🌐 Translation: {} ({})", endpoint.base_url, endpoint.model)
        }
        None => tracing::warn!("🌐 Translation disabled"),
    }

    let state = AppState {
        chat_engine: Arc::new(chat_engine),
        sessions: Arc::new(SessionStore::with_limits(
            Duration::from_secs(config.session_idle_secs),
            config.max_sessions,
        )),
        persona: Arc::new(persona),
    };

    spawn_session_sweeper(state.sessions.clone(), config.session_idle_secs);

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🔥 Twin Chat running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop sessions nobody has touched within the idle TTL
fn spawn_session_sweeper(sessions: Arc<SessionStore>, idle_secs: u64) {
    let period = Duration::from_secs((idle_secs / 4).clamp(1, 300));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let removed = sessions.evict_idle().await;
            if removed > 0 {
                tracing::info!(
                    "🧹 Evicted {} idle session(s), {} active",
                    removed,
                    sessions.len().await
                );
            }
        }
    });
}
