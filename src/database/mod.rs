use serde::Deserialize;
use snafu::ResultExt;
use std::ops::Deref;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use url::Url;

pub use error::*;

mod error;
pub mod orm;

const SETUP: &str = include_str!("../../schema.surrealql");

/// Handle to the SurrealDB instance backing the view store. Cheap to clone.
///
/// Connecting to `mem://` gives an in-process engine, which is what the tests
/// use; production points at a remote server via http/ws.
#[derive(Debug, Clone)]
pub struct Backend {
    database: Surreal<Any>,
}

impl Backend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.endpoint.as_str();
        let database = surrealdb::engine::any::connect(url)
            .await
            .context(DatabaseConnectionSnafu {
                url: url.to_string(),
            })?;

        if let Some(credentials) = &config.credentials {
            database
                .signin(credentials.auth(&config.namespace, &config.database))
                .await
                .context(DatabaseSigninSnafu)?;
        }

        database
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .context(DatabaseNamespaceSnafu)?;

        database.query(SETUP).await.context(DatabaseSchemaSnafu)?;

        Ok(Self { database })
    }
}

impl Deref for Backend {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "surreal_endpoint")]
    pub endpoint: Url,
    #[serde(rename = "surreal_namespace", default = "default_namespace")]
    pub namespace: String,
    #[serde(rename = "surreal_database", default = "default_database")]
    pub database: String,
    #[serde(flatten)]
    pub credentials: Option<DatabaseCredentials>,
}

fn default_namespace() -> String {
    "tidemark".to_string()
}

fn default_database() -> String {
    "tidemark".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseCredentials {
    #[serde(rename = "surreal_username")]
    pub username: String,
    #[serde(rename = "surreal_password")]
    pub password: String,
}

impl DatabaseCredentials {
    fn auth<'a>(
        &'a self,
        namespace: &'a str,
        database: &'a str,
    ) -> impl auth::Credentials<auth::Signin, auth::Jwt> + 'a {
        auth::Database {
            namespace,
            database,
            username: &self.username,
            password: &self.password,
        }
    }
}
