//! BucketGate Gateway - authenticating S3 reverse proxy
//!
//! This binary fronts an S3-compatible storage cluster: it validates every
//! caller against a short-lived-token identity service, authorizes the
//! bucket/operation, keeps the backend's credential registry converged with
//! the federated identity, and forwards the request to the real backend.
//! `GET /ping` exposes a cached backend liveness probe for operators.

mod admin_rest;
mod forward;
mod pipeline;
mod server;
mod sts;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bucketgate_auth::{
    AdminClient, AllowAllAuthorizer, Authorizer, GroupAuthorizer, IdentityReconciler,
    SigV4Verifier,
};
use bucketgate_common::{GatewayConfig, HealthCheckMethod};
use bucketgate_health::HealthCache;

use admin_rest::{BackendProber, RestAdminClient};
use forward::HttpForwarder;
use pipeline::Gateway;
use server::AppState;
use sts::RestStsValidator;

#[derive(Parser, Debug)]
#[command(name = "bucketgate-gateway")]
#[command(about = "BucketGate S3 reverse-proxy gateway")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address for the proxy
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Backend data-plane endpoint
    #[arg(long)]
    backend_endpoint: Option<String>,

    /// Backend admin-plane endpoint
    #[arg(long)]
    admin_endpoint: Option<String>,

    /// Token service validation endpoint
    #[arg(long)]
    sts_endpoint: Option<String>,

    /// AWS region for SigV4 re-verification
    #[arg(long)]
    region: Option<String>,

    /// Health probe mode: list-all-buckets or list-one-bucket
    #[arg(long)]
    hc_method: Option<String>,

    /// Health cache TTL in seconds
    #[arg(long)]
    hc_interval: Option<u64>,

    /// Authorization mode: group or allow-all
    #[arg(long, default_value = "group")]
    authorizer: String,

    /// Disable the SigV4 re-check before forwarding
    #[arg(long, default_value_t = false)]
    no_verify_signatures: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn apply_overrides(config: &mut GatewayConfig, args: &Args) -> Result<()> {
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(endpoint) = &args.backend_endpoint {
        config.backend.endpoint.clone_from(endpoint);
    }
    if let Some(endpoint) = &args.admin_endpoint {
        config.backend.admin_endpoint.clone_from(endpoint);
    }
    if let Some(endpoint) = &args.sts_endpoint {
        config.sts.endpoint.clone_from(endpoint);
    }
    if let Some(region) = &args.region {
        config.region.clone_from(region);
    }
    if let Some(method) = &args.hc_method {
        config.health.method = match method.as_str() {
            "list-all-buckets" => HealthCheckMethod::ListAllBuckets,
            "list-one-bucket" => HealthCheckMethod::ListOneBucket,
            other => anyhow::bail!("unknown health probe mode: {other}"),
        };
    }
    if let Some(interval) = args.hc_interval {
        config.health.interval_secs = interval;
    }
    if args.no_verify_signatures {
        config.verify_signatures = false;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;

    info!("Starting BucketGate Gateway");
    info!("Backend endpoint: {}", config.backend.endpoint);
    info!("Backend admin endpoint: {}", config.backend.admin_endpoint);
    info!("Token service endpoint: {}", config.sts.endpoint);
    info!(
        "Health probe: {:?} every {}s",
        config.health.method, config.health.interval_secs
    );

    let validator = Arc::new(RestStsValidator::new(
        &config.sts.endpoint,
        Duration::from_secs(config.sts.timeout_secs),
    )?);

    let admin: Arc<dyn AdminClient> = Arc::new(RestAdminClient::new(
        &config.backend.admin_endpoint,
        Duration::from_secs(config.backend.admin_timeout_secs),
    )?);
    let reconciler = Arc::new(IdentityReconciler::new(admin.clone()));

    let forwarder = Arc::new(HttpForwarder::new(
        &config.backend.endpoint,
        Duration::from_secs(config.backend.forward_timeout_secs),
    )?);

    let authorizer: Arc<dyn Authorizer> = match args.authorizer.as_str() {
        "allow-all" => {
            info!("Authorization is ALLOW-ALL (trusted deployment mode)");
            Arc::new(AllowAllAuthorizer)
        }
        "group" => Arc::new(GroupAuthorizer),
        other => anyhow::bail!("unknown authorizer mode: {other}"),
    };

    let verifier = if config.verify_signatures {
        info!("SigV4 re-verification is ENABLED");
        Some(SigV4Verifier::new(&config.region))
    } else {
        info!("SigV4 re-verification is DISABLED");
        None
    };

    let gateway = Arc::new(Gateway::new(
        validator,
        authorizer,
        reconciler,
        forwarder,
        verifier,
        config.max_concurrent_reconciliations,
    ));

    let prober = Arc::new(BackendProber::new(
        config.health.method,
        admin,
        &config.backend.endpoint,
        &config.health.bucket,
        Duration::from_secs(config.backend.admin_timeout_secs),
    )?);
    let health = Arc::new(HealthCache::new(
        prober,
        Duration::from_secs(config.health.interval_secs),
    ));

    let app = server::router(AppState { gateway, health });

    info!("Listening on {}", config.listen);
    let listener = TcpListener::bind(config.listen).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    })
    .await?;

    info!("Gateway shut down gracefully");

    Ok(())
}
