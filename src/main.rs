// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    serve, Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use rtb_exchange::api::handlers::{self, AppState};
use rtb_exchange::cache::HttpCacheClient;
use rtb_exchange::config;
use rtb_exchange::mock_bidder::MockBidder;
use rtb_exchange::{BidderParamValidator, ExchangeService, HttpConnector};

#[derive(Parser, Debug)]
#[command(version = "1.0", about = "An OpenRTB-style ad exchange server")]
struct CliArgs {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    /// Directory holding bidders.json and bidder-params/.
    #[arg(long, default_value = "static")]
    config_dir: PathBuf,
    /// Creative cache endpoint; caching is skipped when unset.
    #[arg(long)]
    cache_url: Option<String>,
    /// Port for the built-in mock bidder; 0 disables it.
    #[arg(long, default_value_t = 9001)]
    mock_port: u16,
    #[arg(long, default_value_t = 32)]
    max_connections: usize,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let log_file = rolling::hourly(&args.log_dir, "exchange_log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().with_writer(non_blocking));
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set global tracing subscriber");
    info!("exchange server starting on port {}", args.port);

    // All configuration problems are fatal here, before the server ever
    // accepts a request.
    let entries = config::load_bidders(&args.config_dir.join("bidders.json"))
        .expect("failed to load bidder configuration");
    let registry =
        Arc::new(config::build_registry(&entries).expect("failed to build bidder registry"));
    let validator = Arc::new(
        BidderParamValidator::create(
            registry.names().collect::<Vec<_>>(),
            &args.config_dir.join("bidder-params"),
        )
        .expect("failed to load bidder parameter schemas"),
    );
    info!("registered {} bidders", registry.len());

    let connector = HttpConnector::new(args.max_connections, Duration::from_millis(200))
        .expect("failed to build http connector");
    let cache = args.cache_url.as_deref().map(|url| {
        Arc::new(HttpCacheClient::new(url, Duration::from_millis(100)))
            as Arc<dyn rtb_exchange::cache::CacheClient>
    });
    let exchange = Arc::new(ExchangeService::new(registry, connector, cache));

    let mock_server = if args.mock_port > 0 {
        let mock = MockBidder::default().router();
        let addr = format!("0.0.0.0:{}", args.mock_port);
        info!("mock bidder running at http://{}", addr);
        Some(tokio::spawn(async move {
            let listener = TcpListener::bind(&addr).await.unwrap();
            serve(listener, mock).await.unwrap();
        }))
    } else {
        None
    };

    let state = Arc::new(AppState {
        exchange,
        validator,
    });
    let app = Router::new()
        .route("/openrtb2/auction", post(handlers::handle_auction))
        .route("/bidders/params", get(handlers::handle_bidder_params))
        .route("/status", get(handlers::handle_status))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    info!("exchange server running at http://{}", addr);
    let exchange_server = tokio::spawn(async move {
        let listener = TcpListener::bind(&addr).await.unwrap();
        serve(listener, app).await.unwrap();
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("shutting down gracefully...");
        }
    }

    exchange_server.abort();
    if let Some(mock) = mock_server {
        mock.abort();
    }
    info!("exchange server shut down");
}
