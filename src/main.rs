//! Review Hub server binary.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use review_hub::adapters::auth::StaticSessionValidator;
use review_hub::adapters::http::{build_router, AuthState};
use review_hub::adapters::storage::InMemoryChatMessageRepository;
use review_hub::adapters::websocket::{
    register_chat_actions, ConnectionSettings, Hub, HubBroadcaster, HubDispatcher, Router,
    WebSocketState,
};
use review_hub::application::PostChatMessageHandler;
use review_hub::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    if let Err(error) = config.validate() {
        tracing::error!(%error, "invalid configuration");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "server failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();

    // Hub and its outward-facing broadcaster
    let hub = Arc::new(Hub::new());
    let broadcaster = Arc::new(HubBroadcaster::new(Arc::clone(&hub)));

    // Socket actions
    let repository = Arc::new(InMemoryChatMessageRepository::new());
    let post_message = Arc::new(PostChatMessageHandler::new(repository, broadcaster));
    let mut router = Router::new();
    register_chat_actions(&mut router, post_message);
    tracing::debug!(actions = ?router.actions(), "socket actions registered");
    let dispatcher = Arc::new(HubDispatcher::new(Arc::clone(&hub), router));

    // Sessions
    let entries = config.auth.static_token_entries()?;
    if entries.is_empty() {
        tracing::warn!("no session tokens configured, every upgrade will be rejected");
    }
    let validator: AuthState = Arc::new(StaticSessionValidator::from_entries(&entries)?);

    let state = WebSocketState::new(
        Arc::clone(&hub),
        dispatcher,
        ConnectionSettings::from(&config.websocket),
        shutdown.clone(),
    );
    let app = build_router(state, validator, &config.server);

    let hub_task = {
        let hub = Arc::clone(&hub);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { hub.run(shutdown).await })
    };

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "review hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.cancel();
            }
        })
        .await?;

    // Covers the server stopping for reasons other than a signal.
    shutdown.cancel();
    hub_task.await?;
    tracing::info!("review hub stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
