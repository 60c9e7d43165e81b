use clap::Parser;
use dotenvy::dotenv;
use reclaim_backend::config::AppConfig;
use reclaim_backend::infrastructure::{database, storage};
use reclaim_backend::services::ai_search::AiSearchClient;
use reclaim_backend::services::google::GoogleVerifier;
use reclaim_backend::services::mailer::{Mailer, NoopMailer, SmtpConfig, SmtpMailer};
use reclaim_backend::ws::hub::ChatHub;
use reclaim_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reclaim_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Reclaim Backend...");

    // 2. Setup Common Infrastructure
    let config = AppConfig::from_env();
    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage().await;

    let mailer: Arc<dyn Mailer> = match SmtpConfig::from_env() {
        Some(smtp) => {
            info!("📧 SMTP mailer configured via {}", smtp.smtp_host);
            Arc::new(SmtpMailer::new(smtp))
        }
        None => {
            info!("📧 SMTP not configured, match notifications disabled");
            Arc::new(NoopMailer)
        }
    };

    if config.google_client_id.is_none() {
        info!("🔑 GOOGLE_CLIENT_ID not set, Google sign-in disabled");
    }
    if config.gemini_api_key.is_none() {
        info!("🤖 GEMINI_API_KEY not set, AI search runs in fallback mode");
    }

    let state = AppState {
        db: db.clone(),
        storage: storage_service.clone(),
        mailer,
        google: Arc::new(GoogleVerifier::new(config.google_client_id.clone())),
        ai: Arc::new(AiSearchClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )),
        hub: Arc::new(ChatHub::new()),
        config,
    };

    // 3. Configure tracing layer for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!(
        "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
        args.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
