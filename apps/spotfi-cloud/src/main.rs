mod config;
mod edge;
mod es;
mod portal;
mod quota;
mod scheduler;
mod state;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use spotfi_db::repositories::{
    DisconnectRepository, PlanRepository, RadiusRepository, RouterRepository, SessionRepository, UsageRepository,
    UserRepository,
};

use config::Config;
use edge::broker::BrokerConfig;
use edge::presence::PresenceHandler;
use edge::EdgeFabric;
use es::EphemeralStore;
use quota::reconciler::ReconcileQueue;
use quota::{listener::NotificationListener, worker::DisconnectWorkerPool, PlanExpiryJob, StaleSessionSweeper};
use scheduler::Scheduler;
use state::AppState;

#[derive(Parser)]
#[command(name = "spotfi-cloud")]
#[command(about = "SpotFi cloud control plane: edge fabric, quota engine, captive portal", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the edge fabric, quota engine, and captive-portal HTTP server.
    Serve,
    /// Run pending database migrations and exit.
    Migrate,
    /// Force-reconcile a single router's session state against its live client list.
    ReconcileRouter { router_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("no .env file loaded: {e}");
    }

    let file_appender = tracing_appender::rolling::daily("logs", "spotfi-cloud.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotfi_cloud=info,axum=info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let pool = spotfi_db::init_db(&config.database_url).await?;

    match cli.command {
        Commands::Migrate => {
            tracing::info!("migrations applied");
        }
        Commands::ReconcileRouter { router_id } => {
            run_reconcile_router(config, pool, router_id).await?;
        }
        Commands::Serve => {
            run_server(config, pool).await?;
        }
    }

    Ok(())
}

async fn run_reconcile_router(config: Config, pool: sqlx::PgPool, router_id: String) -> Result<()> {
    let instance_id = instance_id(&config);
    let broker_config = BrokerConfig {
        url: config.broker_url.clone(),
        username: config.broker_username.clone(),
        password: config.broker_password.clone(),
        instance_id,
    };
    let (fabric, eventloop) = EdgeFabric::connect(broker_config);
    fabric.spawn_rpc_only_loop(eventloop);

    let sessions = SessionRepository::new(pool.clone());
    let reconcile_queue = ReconcileQueue::start(fabric.rpc.clone(), sessions);
    reconcile_queue.enqueue(router_id.clone()).await;
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    tracing::info!(router_id, "forced reconciliation dispatched");
    Ok(())
}

async fn run_server(config: Config, pool: sqlx::PgPool) -> Result<()> {
    let config = Arc::new(config);
    let instance_id = instance_id(&config);

    let es = EphemeralStore::connect(&config.redis_url).await?;

    let routers = RouterRepository::new(pool.clone());
    let users = UserRepository::new(pool.clone());
    let plans = PlanRepository::new(pool.clone());
    let sessions = SessionRepository::new(pool.clone());
    let usage = UsageRepository::new(pool.clone());
    let disconnects = DisconnectRepository::new(pool.clone());
    let radius = RadiusRepository::new(pool.clone());

    let broker_config = BrokerConfig {
        url: config.broker_url.clone(),
        username: config.broker_username.clone(),
        password: config.broker_password.clone(),
        instance_id,
    };
    let (edge_fabric, eventloop) = EdgeFabric::connect(broker_config);

    let reconcile_queue = ReconcileQueue::start(edge_fabric.rpc.clone(), sessions.clone());
    let presence = Arc::new(PresenceHandler::new(routers.clone(), es.clone(), reconcile_queue.clone()));
    edge_fabric.spawn_dispatch_loop(eventloop, presence.clone());
    let edge = Arc::new(edge_fabric);

    let worker_pool = DisconnectWorkerPool::start(
        edge.rpc.clone(),
        disconnects.clone(),
        sessions.clone(),
        routers.clone(),
        radius.clone(),
    );

    tokio::spawn(NotificationListener::run(config.database_url.clone(), worker_pool.clone()));

    let sweeper = StaleSessionSweeper::new(sessions.clone());
    let expiry = PlanExpiryJob::new(plans.clone(), disconnects.clone(), radius.clone(), worker_pool.clone());
    Scheduler::new(
        presence,
        sweeper,
        expiry,
        disconnects.clone(),
        worker_pool,
        edge.xtunnel.clone(),
        config.quota_poll_fallback_enabled,
    )
    .spawn_all();

    let state = AppState {
        config: config.clone(),
        edge,
        es,
        routers,
        users,
        plans,
        sessions,
        usage,
        disconnects,
        radius,
        reconcile_queue,
    };

    let mut app = portal::router()
        .route("/x/:router_id", axum::routing::get(edge::ws::upgrade))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    for (name, value) in portal::security::security_headers() {
        app = app.layer(tower_http::set_header::SetResponseHeaderLayer::overriding(name, value));
    }

    let addr: SocketAddr = config.portal_bind_addr.parse()?;
    tracing::info!(%addr, "captive portal listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn instance_id(config: &Config) -> String {
    config.instance_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}
