//! Remote SurrealDB connection for the catalog store.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

/// Where the catalog database lives and how to sign in to it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "sitecat".into(),
            database: "catalog".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Defaults overlaid with `SITECAT_DB_URL`, `SITECAT_DB_NAMESPACE`,
    /// `SITECAT_DB_DATABASE`, `SITECAT_DB_USERNAME` and
    /// `SITECAT_DB_PASSWORD` when set.
    pub fn from_env() -> Self {
        Self::default().overlay(|var| std::env::var(var).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for (var, slot) in [
            ("SITECAT_DB_URL", &mut self.url),
            ("SITECAT_DB_NAMESPACE", &mut self.namespace),
            ("SITECAT_DB_DATABASE", &mut self.database),
            ("SITECAT_DB_USERNAME", &mut self.username),
            ("SITECAT_DB_PASSWORD", &mut self.password),
        ] {
            if let Some(value) = lookup(var) {
                *slot = value;
            }
        }
        self
    }
}

/// Signed-in client scoped to the catalog namespace and database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Opening catalog database"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        debug!("Catalog database session ready");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_only_set_variables() {
        let config = DbConfig::default().overlay(|var| match var {
            "SITECAT_DB_URL" => Some("db.internal:8000".into()),
            "SITECAT_DB_DATABASE" => Some("staging".into()),
            _ => None,
        });
        assert_eq!(config.url, "db.internal:8000");
        assert_eq!(config.database, "staging");
        assert_eq!(config.namespace, "sitecat");
        assert_eq!(config.username, "root");
    }
}
