use std::{net::SocketAddr, sync::Arc};

use http::HeaderValue;
use sea_orm_migration::MigratorTrait;
use tokio::{signal, time::timeout};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

use torre_controle as api;
use api::{
    auth::{AuthService, CredentialStore, InMemoryCredentialStore, SeaOrmCredentialStore},
    config::AppConfig,
    repositories::{InMemoryRecordStore, RecordStore, SeaOrmRecordStore, SectorRepository},
};

/// Record and credential stores the application runs against.
struct Stores {
    records: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialStore>,
    local_mode: bool,
}

impl Stores {
    fn in_memory(local_mode: bool) -> Self {
        Self {
            records: Arc::new(InMemoryRecordStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            local_mode,
        }
    }
}

/// Connects to the configured database, falling back to in-memory stores
/// when it cannot be reached within the connect budget.
async fn open_stores(cfg: &AppConfig) -> Stores {
    if !cfg.uses_database() {
        info!("Using in-memory record store");
        return Stores::in_memory(false);
    }

    let connect = api::db::establish_connection_from_app_config(cfg);
    let db = match timeout(cfg.connect_timeout(), connect).await {
        Ok(Ok(db)) => db,
        Ok(Err(e)) => {
            warn!("Database unavailable, running in local mode: {}", e);
            return Stores::in_memory(true);
        }
        Err(_) => {
            warn!(
                "Database connection exceeded {}ms, running in local mode",
                cfg.connect_timeout_ms
            );
            return Stores::in_memory(true);
        }
    };

    if cfg.auto_migrate {
        if let Err(e) = api::migrator::Migrator::up(&db, None).await {
            error!("Failed running migrations: {}", e);
            warn!("Running in local mode");
            return Stores::in_memory(true);
        }
    }

    let db = Arc::new(db);
    Stores {
        records: Arc::new(SeaOrmRecordStore::new(db.clone())),
        credentials: Arc::new(SeaOrmCredentialStore::new(db)),
        local_mode: false,
    }
}

fn build_cors_layer(cfg: &AppConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        Err("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let stores = open_stores(&cfg).await;
    if stores.local_mode && cfg.is_production() {
        error!("Production instance is serving in-memory data; records will not persist");
    }
    let repository = SectorRepository::new(stores.records);
    let auth = AuthService::new(stores.credentials);
    let cors_layer = build_cors_layer(&cfg)?;
    let request_timeout = cfg.request_timeout();
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;

    let app_state = api::AppState::new(cfg, repository, auth, stores.local_mode);

    // Refresh the dashboard on every realtime event
    let _refresher = app_state.dashboard.spawn_refresher(&app_state.events);

    match app_state.dashboard.probe_store().await {
        Ok(()) => info!(
            backend = app_state.repository.store().backend_name(),
            "Record store reachable"
        ),
        Err(e) => warn!("Record store probe failed: {}", e),
    }
    let initial = app_state.dashboard.load_view().await;
    if initial.is_degraded() {
        warn!(
            degraded = ?initial.degraded_sectors,
            "Initial dashboard view is degraded"
        );
    }

    let mut app = api::app_router(app_state).layer(cors_layer);
    if let Some(limit) = request_timeout {
        app = app.layer(TimeoutLayer::new(limit));
    }

    info!("🚀 torre-controle listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
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
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
