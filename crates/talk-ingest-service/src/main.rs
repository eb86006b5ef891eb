//! # Talk-Ingest Service
//!
//! Binary entry point for the Talk-Ingest HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Connects the entity store selected by configuration
//! - Starts the HTTP server from talk-ingest-api

use std::sync::Arc;
use talk_ingest_api::{start_server, ServiceConfig, ServiceError, StoreBackend, StoreConfig};
use talk_ingest_core::{adapters::InMemoryEntityStore, EntityStore, IngestPipeline};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later sources override earlier ones):
    //  1. /etc/talk-ingest/service.yaml   system-wide defaults
    //  2. ./config/service.yaml           deployment-local override
    //  3. Path given by TI_CONFIG_FILE    operator-specified file
    //  4. Environment variables prefixed TI__ (double-underscore separator)
    //     e.g. TI__SERVER__PORT=9090 sets server.port = 9090
    //
    // Every field has a serde default, so an unconfigured environment runs
    // with the in-memory store. A malformed source is a hard error.
    // -------------------------------------------------------------------------
    let loaded = load_config();

    // Logging starts after config so the configured level applies. RUST_LOG
    // still wins when set.
    let log_level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| talk_ingest_api::LoggingConfig::default().level);
    let json_format = loaded.as_ref().map(|c| c.logging.json_format).unwrap_or(false);
    init_logging(&log_level, json_format);

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    info!(
        port = service_config.server.port,
        endpoint = %service_config.webhooks.endpoint_path,
        backend = ?service_config.store.backend,
        "Starting Talk-Ingest Service"
    );

    let store = match build_store(&service_config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to initialize entity store; aborting");
            std::process::exit(exit_code(&e));
        }
    };

    let pipeline = Arc::new(IngestPipeline::new(store));

    if let Err(e) = start_server(service_config, pipeline).await {
        error!(error = %e, "Server failed");
        std::process::exit(exit_code(&e));
    }

    info!("Talk-Ingest Service stopped");
}

fn load_config() -> Result<ServiceConfig, ServiceError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/talk-ingest/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("TI_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix("TI").separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(talk_ingest_api::ConfigError::from)?;

    service_config.validate()?;
    Ok(service_config)
}

fn init_logging(default_level: &str, json_format: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn EntityStore>, ServiceError> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory entity store; data is lost on restart");
            Ok(Arc::new(InMemoryEntityStore::new()))
        }
        StoreBackend::Postgres => connect_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(config: &StoreConfig) -> Result<Arc<dyn EntityStore>, ServiceError> {
    use talk_ingest_core::adapters::{PostgresEntityStore, PostgresStoreConfig};

    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| talk_ingest_api::ConfigError::Missing {
            key: "store.database_url".to_string(),
        })?;

    let store = PostgresEntityStore::connect(&PostgresStoreConfig {
        database_url,
        max_connections: config.max_connections,
        acquire_timeout: std::time::Duration::from_secs(config.acquire_timeout_seconds),
    })
    .await
    .map_err(|e| ServiceError::StoreInitialization {
        message: e.to_string(),
    })?;

    if config.run_migrations {
        store
            .migrate()
            .await
            .map_err(|e| ServiceError::StoreInitialization {
                message: e.to_string(),
            })?;
        info!("Database migrations applied");
    }

    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_config: &StoreConfig) -> Result<Arc<dyn EntityStore>, ServiceError> {
    Err(ServiceError::StoreInitialization {
        message: "postgres backend requested but the service was built without the `postgres` feature"
            .to_string(),
    })
}

fn exit_code(error: &ServiceError) -> i32 {
    match error {
        ServiceError::BindFailed { .. } => 1,
        ServiceError::ServerFailed { .. } => 2,
        ServiceError::Configuration(_) => 3,
        ServiceError::StoreInitialization { .. } => 4,
    }
}
