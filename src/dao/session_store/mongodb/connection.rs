use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Delays between connection probes: doubling from `first`, capped at `cap`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(first: Duration, cap: Duration) -> Self {
        Self { next: first, cap }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.cap);
        self.next = current.saturating_mul(2).min(self.cap);
        Some(current)
    }
}

/// Build a client for `config` and wait until the database answers a ping.
///
/// Gives up after `config.connect_attempts` failed probes.
pub async fn open_database(config: &MongoConfig) -> MongoResult<Database> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut delays = Backoff::new(config.initial_backoff, config.max_backoff);
    let mut failures = 0;

    loop {
        let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
            if failures > 0 {
                info!(failures, database = %config.database_name, "MongoDB reachable again");
            }
            return Ok(database);
        };

        failures += 1;
        if failures >= config.connect_attempts {
            return Err(MongoDaoError::InitialPing {
                attempts: failures,
                source,
            });
        }

        let wait = delays.next().unwrap_or(config.max_backoff);
        warn!(
            failures,
            wait_ms = wait.as_millis() as u64,
            error = %source,
            "MongoDB ping failed; retrying"
        );
        sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        let delays: Vec<_> = Backoff::new(Duration::from_millis(250), Duration::from_secs(1))
            .take(5)
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }
}
