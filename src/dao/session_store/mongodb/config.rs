use std::{env, time::Duration};

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "avalon";
const URI_ENV: &str = "MONGO_URI";
const DATABASE_ENV: &str = "MONGO_DB";

/// Connection settings for the Mongo session store.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Sessions untouched for this long are removed by the TTL index.
    pub session_ttl: Duration,
    /// Pings tried before a connection attempt is reported as failed.
    pub connect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl MongoConfig {
    /// Parse `uri` and attach the session settings. The database defaults to `avalon`.
    pub async fn from_uri(
        uri: &str,
        database: Option<&str>,
        session_ttl: Duration,
    ) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options
            .app_name
            .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_owned());

        Ok(Self {
            options,
            database_name: database.unwrap_or(DEFAULT_DATABASE).to_owned(),
            session_ttl,
            connect_attempts: 10,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        })
    }

    /// Read `MONGO_URI` and the optional `MONGO_DB`.
    pub async fn from_env(session_ttl: Duration) -> MongoResult<Self> {
        let uri = env::var(URI_ENV).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_ENV })?;
        let database = env::var(DATABASE_ENV).ok();
        Self::from_uri(&uri, database.as_deref(), session_ttl).await
    }
}
