//! Black-box game testing harness API server.
//!
//! Endpoints:
//! POST /start-test, POST /stop-test, POST /reset-status
//! GET /status, GET /metrics, GET /health
//! GET /history, GET /history/statistics, GET /history/{id}
//! DELETE /history/{id}, DELETE /history

mod config;
mod handlers;
mod store;
mod types;

use std::{path::PathBuf, sync::Arc};

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use harness_core::{default_factory, ExplorerFactory, SessionController};

pub(crate) use config::{AppState, HarnessConfig};
pub(crate) use store::HistoryStore;
pub(crate) use types::{
    ActionResponse, ErrorResponse, HealthResponse, HistoryListResponse, HistoryQuery,
    HistoryStatistics, StartTestRequest, StatusResponse,
};

#[derive(Debug, Parser)]
#[command(name = "api-server", about = "HTTP control surface for the game testing harness")]
struct Cli {
    /// Overrides API_BIND_ADDR.
    #[arg(long)]
    bind: Option<String>,
    /// Overrides DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/start-test", web::post().to(handlers::start_test))
        .route("/stop-test", web::post().to(handlers::stop_test))
        .route("/reset-status", web::post().to(handlers::reset_status))
        .route("/status", web::get().to(handlers::status))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/history", web::get().to(handlers::list_history))
        .route("/history", web::delete().to(handlers::clear_history))
        .route(
            "/history/statistics",
            web::get().to(handlers::history_statistics),
        )
        .route("/history/{id}", web::get().to(handlers::get_history))
        .route("/history/{id}", web::delete().to(handlers::delete_history));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = HarnessConfig::from_env();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let history = Arc::new(
        HistoryStore::open(&config.data_dir, config.history_max_records)
            .map_err(anyhow::Error::msg)
            .context("failed to open history store")?,
    );
    let controller = SessionController::new(
        config.session.clone(),
        default_factory(config.region),
        Arc::new(ExplorerFactory::default()),
        history.clone(),
    );

    tracing::info!(
        "starting game testing api: bind_addr={} data_dir={} desktop={} timesteps={} region={}x{}@{},{} monitor={}",
        config.bind_addr,
        config.data_dir.display(),
        cfg!(feature = "desktop"),
        config.session.total_steps,
        config.region.width,
        config.region.height,
        config.region.left,
        config.region.top,
        config.region.monitor
    );

    let state = AppState {
        controller: controller.clone(),
        history,
        history_max_records: config.history_max_records,
    };

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("http server exited with an error")?;

    if controller.is_running() {
        tracing::info!("server shut down with a session running; stopping it");
        if let Err(err) = controller.stop().await {
            tracing::warn!(error = %err, "stop on shutdown failed");
        }
    }
    Ok(())
}
