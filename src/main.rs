use fanout::{
    app::build_router,
    connection::start_cleanup_task,
    execution::{ResolverEngine, SubscriptionField},
    AppStateBuilder, ServerConfig,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanout=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    info!(config = ?config, "Starting subscription fanout server");

    // Demo schema: `subscription { chat }` receives every "chat" event,
    // `subscription { greetings }` only those whose payload type is "greeting"
    let engine = ResolverEngine::new()
        .with_field("chat", SubscriptionField::new(["chat"]))
        .with_field(
            "greetings",
            SubscriptionField::new(["chat"]).with_filter(|payload, _variables, _context| async move {
                Ok(payload.get("type") == Some(&json!("greeting")))
            }),
        );

    let app_state = AppStateBuilder::new()
        .with_config(config.clone())
        .with_engine(Arc::new(engine))
        .build();

    tokio::spawn(start_cleanup_task(app_state.context.clone(), config.clone()));

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();
    info!(bind_addr = %config.bind_addr, "Server running");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
