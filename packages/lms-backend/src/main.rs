use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use lms_backend::config::Config;
use lms_backend::db::{self, migrate, DatabaseProxy};
use lms_backend::logging::{init_tracing, LogSettings};
use lms_backend::state::AppState;
use lms_backend::workers::{run_engagement_rollup, WorkerManager};
use lms_backend::{build_router, seed};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&LogSettings::from_env(&config.log_level));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let exit_code = match args.first().map(String::as_str) {
        Some("update-engagement") => update_engagement(args.get(1).map(String::as_str)).await,
        Some(other) => {
            tracing::error!(command = other, "unknown command (expected: update-engagement [YYYY-MM-DD])");
            2
        }
        None => serve(config).await,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

async fn connect(config: &Config) -> Option<Arc<DatabaseProxy>> {
    let proxy = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => proxy,
        Err(err) => {
            tracing::warn!(error = %err, "database proxy not initialized");
            return None;
        }
    };

    if config.run_migrations {
        if let Err(err) = migrate::run_migrations(proxy.pool()).await {
            tracing::error!(error = %err, "database migrations failed");
            return None;
        }
    }

    Some(proxy)
}

async fn update_engagement(date_arg: Option<&str>) -> i32 {
    let date = match date_arg {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => {
                tracing::error!(value = raw, error = %err, "date must be YYYY-MM-DD");
                return 2;
            }
        },
        None => Utc::now().date_naive(),
    };

    let proxy = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => proxy,
        Err(err) => {
            tracing::error!(error = %err, "database unavailable");
            return 1;
        }
    };

    match run_engagement_rollup(proxy, Some(date)).await {
        Ok(_) => 0,
        Err(err) => {
            tracing::error!(%date, error = %err, "engagement update failed");
            1
        }
    }
}

async fn serve(config: Config) -> i32 {
    let db_proxy = connect(&config).await;

    if let Some(ref proxy) = db_proxy {
        if let Err(err) = seed::bootstrap_admin(proxy).await {
            tracing::warn!(error = %err, "admin bootstrap failed");
        }
        if config.seed_sample_data {
            if let Err(err) = seed::seed_sample_data(proxy).await {
                tracing::warn!(error = %err, "sample data seeding failed");
            }
        }
    }

    let worker_manager = match db_proxy {
        Some(ref proxy) => match WorkerManager::new(Arc::clone(proxy)).await {
            Ok(manager) => {
                if let Err(err) = manager.start().await {
                    tracing::error!(error = %err, "failed to start workers");
                }
                Some(manager)
            }
            Err(err) => {
                tracing::warn!(error = %err, "worker manager not initialized");
                None
            }
        },
        None => None,
    };

    let app = build_router(AppState::new(db_proxy));

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "bind listener failed");
            return 1;
        }
    };
    tracing::info!(%addr, "lms-backend listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    let mut exit_code = 0;
    if let Err(err) = server.await {
        tracing::error!(error = %err, "server error");
        exit_code = 1;
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
    exit_code
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
