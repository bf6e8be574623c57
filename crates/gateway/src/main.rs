//! docqa Gateway
//!
//! Entry point for asking questions about a PDF.
//! Handles:
//! - HTTP API (`/v1/ask`, health probes)
//! - One-shot CLI mode: `docqa-gateway ask <pdf> <question>`
//! - Observability (logging, metrics)

mod handlers;

use anyhow::Context;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use docqa_common::{
    completion::create_completion_model,
    config::{AppConfig, IndexBackend, ObservabilityConfig},
    context::{IntentExtractor, Synthesizer},
    embeddings::create_embedder,
    metrics, EmbeddingGateway,
};
use docqa_context::{Pipeline, Session};
use docqa_ingestion::LopdfExtractor;
use docqa_search::{IndexSettings, MemoryVectorStore, RedisVectorStore, VectorIndex, VectorStore};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Mutex};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<Pipeline>,
    /// Serialises document loads and queries against the single index
    pub session: Arc<Mutex<Session>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    info!("Starting docqa gateway v{}", docqa_common::VERSION);

    let pipeline = Arc::new(build_pipeline(&config).await?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, document, question @ ..] = args.as_slice() {
        if command == "ask" && !question.is_empty() {
            return ask_once(&pipeline, document, &question.join(" ")).await;
        }
    }
    if !args.is_empty() {
        anyhow::bail!("Usage: docqa-gateway [ask <pdf> <question>]");
    }

    install_metrics(&config.observability)?;
    metrics::register_metrics();

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        pipeline,
        session: Arc::new(Mutex::new(Session::new())),
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on the configured port; 0 disables the exporter
fn install_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .set_buckets_for_metric(
            Matcher::Suffix("query_duration_seconds".to_string()),
            metrics::QUERY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            metrics::EMBEDDING_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Wire the capabilities selected by configuration into a pipeline
async fn build_pipeline(config: &AppConfig) -> anyhow::Result<Pipeline> {
    let store: Arc<dyn VectorStore> = match config.redis.backend {
        IndexBackend::Redis => {
            info!("Connecting to Redis...");
            Arc::new(RedisVectorStore::connect(&config.redis.url).await?)
        }
        IndexBackend::Memory => Arc::new(MemoryVectorStore::new()),
    };

    let embedder = create_embedder(&config.embedding)?;
    let model = create_completion_model(&config.completion)?;
    info!(
        embedding_model = embedder.model_name(),
        completion_model = model.model_name(),
        backend = ?config.redis.backend,
        "Capabilities configured"
    );

    let embeddings = EmbeddingGateway::new(embedder);
    let index = VectorIndex::new(
        store,
        IndexSettings::from(&config.redis),
        embeddings.dimension(),
    );

    Ok(Pipeline::new(
        Arc::new(LopdfExtractor),
        embeddings,
        index,
        IntentExtractor::new(model.clone(), config.completion.target_language.clone()),
        Synthesizer::new(model),
        config.pipeline.clone(),
    ))
}

/// Answer one question and print it
async fn ask_once(pipeline: &Pipeline, document: &str, question: &str) -> anyhow::Result<()> {
    let mut session = Session::new();
    let answer = pipeline
        .answer_file(&mut session, Path::new(document), question)
        .await?;

    for failure in &answer.degraded {
        eprintln!("[degraded] {}: {}", failure.stage, failure.message);
    }
    println!("{}", answer.text);
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = timeout_layer(state.config.request_timeout());

    let api_routes = Router::new().route("/ask", post(handlers::ask::ask));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Requests running past the deadline are answered with 408
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
