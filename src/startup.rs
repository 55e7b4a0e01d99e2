use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{net::TcpListener, sync::Arc};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::{DatabaseSettings, EmbeddingProviderKind, EmbeddingSettings, Settings},
    helper::error_chain_fmt,
    ports::{
        embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
        file_ingestion_store::FileIngestionStore,
        file_source::{FileSource, FileSourceError},
    },
    repositories::{
        embedding_api_repository::EmbeddingApiRepository,
        file_embedding_postgres_repository::FileEmbeddingPostgresRepository,
        file_source_merge_repository::FileSourceMergeRepository,
    },
    routes::{file_changed_webhook::file_changed_webhook, health_check},
};

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Failed to migrate the database: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to set up the file source: {0}")]
    FileSourceError(#[from] FileSourceError),
    #[error("Failed to set up the embedding provider: {0}")]
    EmbeddingProviderError(#[from] EmbeddingProviderError),
    #[error("Invalid embedding configuration: {0}")]
    InvalidEmbeddingSettings(String),
}

impl std::fmt::Debug for ApplicationBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl Application {
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        let connection_pool = get_connection_pool(&settings.database);

        if settings.database.migrate_on_startup {
            sqlx::migrate!("./migrations").run(&connection_pool).await?;
            info!("Database migrated");
        }

        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let embedding_provider = build_embedding_provider(&settings.embedding)?;
        if embedding_provider.dimension() != settings.embedding.dimension {
            return Err(ApplicationBuildError::InvalidEmbeddingSettings(format!(
                "model {} produces {} values, the store expects {}",
                settings.embedding.model,
                embedding_provider.dimension(),
                settings.embedding.dimension
            )));
        }

        let file_source: Arc<dyn FileSource> =
            Arc::new(FileSourceMergeRepository::try_new(&settings.merge)?);
        let store: Arc<dyn FileIngestionStore> = Arc::new(FileEmbeddingPostgresRepository::new(
            connection_pool,
            settings.embedding.dimension,
        ));

        let server = run(listener, nb_workers, file_source, embedding_provider, store)?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: generates a `request_id` for each incoming request.
///
/// Providers are built once and shared among all workers.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    file_source: Arc<dyn FileSource>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn FileIngestionStore>,
) -> Result<Server, std::io::Error> {
    let file_source = Data::from(file_source);
    let embedding_provider = Data::from(embedding_provider);
    let store = Data::from(store);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/webhooks/file_changed", web::post().to(file_changed_webhook))
            .app_data(file_source.clone())
            .app_data(embedding_provider.clone())
            .app_data(store.clone())
    })
    .listen(listener)?;

    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    Ok(server.run())
}

/// Lazy pool: no connection is opened until a batch is committed
pub fn get_connection_pool(settings: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(settings.with_db())
}

#[tracing::instrument(name = "Building embedding provider", skip(settings), fields(provider = ?settings.provider))]
pub fn build_embedding_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, ApplicationBuildError> {
    match settings.provider {
        EmbeddingProviderKind::Remote => {
            let remote = settings.remote.as_ref().ok_or_else(|| {
                ApplicationBuildError::InvalidEmbeddingSettings(
                    "`embedding.remote` is required by the remote provider".to_string(),
                )
            })?;
            Ok(Arc::new(EmbeddingApiRepository::try_new(
                remote,
                &settings.model,
                settings.dimension,
            )?))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderKind::Local => Ok(Arc::new(
            crate::domain::services::sentence_embedding::SentenceEmbeddingProvider::try_new(
                &settings.model,
            )?,
        )),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderKind::Local => Err(ApplicationBuildError::InvalidEmbeddingSettings(
            "the local provider needs the `local-embeddings` feature".to_string(),
        )),
    }
}
