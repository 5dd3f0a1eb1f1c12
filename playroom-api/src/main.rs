use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use playroom_api::http::create_router;
use playroom_core::logging::init_logging;
use playroom_core::repository::{RoomMemberRepository, RoomRepository};
use playroom_core::service::authorization::MembershipLookup;
use playroom_core::service::{JwtService, PolicyResolver, RoomService, StaticPolicyTable};
use playroom_core::Config;

#[derive(Debug, Parser)]
#[command(name = "playroomd", about = "Playroom lobby API server")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "PLAYROOM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(&config.database.url)
        .await
        .context("connecting to database")?;

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    let rooms = RoomRepository::new(pool.clone());
    let members = RoomMemberRepository::new(pool);

    let room_service = Arc::new(RoomService::new(rooms, members.clone()));
    let member_lookup: Arc<dyn MembershipLookup> = Arc::new(members);
    let jwt_service = JwtService::new(&config.jwt.secret);
    // Dynamic room policies resolve in the middleware; names outside
    // their grammar land in this static table.
    let policies = Arc::new(PolicyResolver::new(Box::new(StaticPolicyTable::new())));

    let app = create_router(room_service, member_lookup, jwt_service, policies);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "playroom API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("shutdown signal received");
}
