use dotenvy::dotenv;
use snafu::ResultExt;
use tidemark::api;
use tidemark::config::Config;
use tidemark::database::Backend;
use tidemark::error::{ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, WebServerSnafu};
use tidemark::logger;
use tidemark::service::trending::spawn_convergence;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;
    let _guard = logger::init(&config)?;

    let backend = Backend::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu)?;

    let app = api::create_app(backend, config.trending);
    let convergence = spawn_convergence(app.trending.clone());

    let router = api::create_router(app);
    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu {
            address: config.host,
        })?;

    tracing::info!("listening on {}", config.host);
    axum::serve(listener, router).await.context(WebServerSnafu)?;

    convergence.stop().await;
    Ok(())
}
