use std::sync::Arc;

use anyhow::Context;

use intake_chat::api::{ChatService, chat_routes};
use intake_chat::config::{IntakeConfig, StoreBackend};
use intake_chat::dialogue::DialogueEngine;
use intake_chat::model::ChatId;
use intake_chat::repl;
use intake_chat::store::{ChatStore, HttpChatStore, InMemoryChatStore, LibSqlChatStore};
use intake_chat::sync::SyncManager;

const USAGE: &str = "usage: intake-chat [local | serve | chat [CHAT_ID]]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env()?;
    let engine = Arc::new(DialogueEngine::new(config.flow_config()));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("local");

    eprintln!("💉 Intake Chat v{}", env!("CARGO_PKG_VERSION"));

    match mode {
        "local" => {
            eprintln!("   Mode: local session");
            eprintln!("   Type a reply and press Enter. /quit to exit.\n");
            repl::run_local(engine).await
        }
        "serve" => serve(&config, engine).await,
        "chat" => {
            let chat_id = match args.get(1) {
                Some(raw) => Some(ChatId(
                    raw.parse()
                        .with_context(|| format!("invalid chat id {raw:?}"))?,
                )),
                None => None,
            };
            let store = HttpChatStore::new(&config.api_url, config.http_timeout)?;
            eprintln!("   Server: {}", store.base_url());
            eprintln!("   Commands: /new, /open N, /chats, /refresh, /quit\n");
            repl::run_remote(SyncManager::new(Arc::new(store)), chat_id).await
        }
        other => {
            eprintln!("Error: unknown mode {other:?}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn serve(config: &IntakeConfig, engine: Arc<DialogueEngine>) -> anyhow::Result<()> {
    let store: Arc<dyn ChatStore> = match config.backend {
        StoreBackend::Memory => {
            eprintln!("   Store: memory");
            Arc::new(InMemoryChatStore::new())
        }
        StoreBackend::Sql if config.is_memory_db() => {
            eprintln!("   Store: libSQL (in-memory)");
            Arc::new(LibSqlChatStore::new_memory().await?)
        }
        StoreBackend::Sql => {
            eprintln!("   Store: libSQL at {}", config.db_path.display());
            Arc::new(
                LibSqlChatStore::new_local(&config.db_path)
                    .await
                    .with_context(|| {
                        format!("failed to open database at {}", config.db_path.display())
                    })?,
            )
        }
    };

    let service = Arc::new(ChatService::new(store, engine));
    let app = chat_routes(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    eprintln!("   REST API: http://0.0.0.0:{}/chats", config.port);
    tracing::info!(port = config.port, "Intake server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
