use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use link_preview_server::config::Config;
use link_preview_server::fetch::Fetcher;
use link_preview_server::handlers;
use link_preview_server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing: JSON in production, human-readable in dev.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "link_preview_server=info,tower_http=info"
            .parse()
            .unwrap()
    });

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Link preview server starting...");

    let config = Config::from_env().expect("Failed to load configuration");
    info!(
        timeout = ?config.fetch.timeout,
        max_redirects = config.fetch.max_redirects,
        allow_private_hosts = config.fetch.allow_private_hosts,
        "Configuration loaded"
    );

    if config.fetch.allow_private_hosts && !config.is_dev {
        tracing::warn!("ALLOW_PRIVATE_HOSTS is enabled in production; internal addresses are reachable");
    }

    let fetcher = Fetcher::new(config.fetch.clone()).expect("Failed to build HTTP client");

    let app_state = AppState {
        fetcher,
        extract: Arc::new(config.extract.clone()),
    };

    // Prometheus metrics layer
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = handlers::routes(app_state).route(
        "/metrics",
        get(move || async move { metric_handle.render() }),
    );
    let app = handlers::with_middleware(app).layer(prometheus_layer);

    let addr = config.server_addr();
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
