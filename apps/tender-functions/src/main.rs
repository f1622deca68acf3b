//! Tender Engine functions server
//!
//! Hosts the platform's serverless functions behind one axum router:
//!
//! - `analyze-document`: vision-model review of a compliance document
//! - `ai-drafter`: gated drafting of tender response sections
//! - `compliance-validator`: readiness scoring of a tender
//! - `notify-admin`: webhook mailer for high-tier feedback and critical errors
//! - `audit-logger`, `ingest-tender`, `send-weekly-report`
//!
//! Every route is rate limited per IP via tower-governor.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod extract;
mod handlers;
mod routes;
mod state;

use config::FunctionsConfig;
use state::AppState;

/// Command-line arguments for the functions server
#[derive(Parser, Debug)]
#[command(name = "tender-functions")]
#[command(about = "Tender Engine serverless functions")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Rate limit: requests per second per IP
    #[arg(long, default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tender functions on {}:{}", args.host, args.port);

    let config = FunctionsConfig::from_env();
    if config.project_url.is_none() {
        warn!("SUPABASE_URL is not set; database-backed functions will fail");
    }
    let state = AppState::from_config(config);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow!("invalid rate limit: {}", args.rate_limit))?,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(
        ServiceBuilder::new().layer(cors).layer(GovernorLayer {
            config: governor_conf,
        }),
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
