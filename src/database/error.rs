use snafu::Snafu;

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("Failed to connect to the database `{url}`: {source}"))]
    DatabaseConnection {
        url: String,
        source: surrealdb::Error,
    },
    #[snafu(display("Failed to sign in to the database: {source}"))]
    DatabaseSignin { source: surrealdb::Error },
    #[snafu(display("Failed to select namespace/database: {source}"))]
    DatabaseNamespace { source: surrealdb::Error },
    #[snafu(display("Failed to apply the database schema: {source}"))]
    DatabaseSchema { source: surrealdb::Error },
    #[snafu(display("Failed to query the database: {source}"))]
    DatabaseQuery { source: surrealdb::Error },
    #[snafu(display("Failed to deserialize the database response: {source}"))]
    DatabaseDeserialize { source: surrealdb::Error },
    #[snafu(display("Failed to parse the database response, response is empty"))]
    EmptyQuery,
}
