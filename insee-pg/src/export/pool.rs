//! Connexion PostgreSQL
//!
//! Le pipeline est séquentiel : le pool ne sert qu'à porter la
//! configuration (timeouts, TLS) et fournit une seule connexion par import.

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Pas de SSL (défaut)
    #[default]
    Disable,
    /// SSL préféré mais non requis
    Prefer,
    /// SSL requis
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Configuration de la base de données
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
}

/// Surcharges passées en ligne de commande
#[derive(Debug, Clone, Default)]
pub struct DatabaseOverrides {
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "insee".into(),
            user: "postgres".into(),
            password: None,
            ssl_mode: SslMode::Disable,
        }
    }
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("PGDATABASE").unwrap_or_else(|_| "insee".into()),
            user: std::env::var("PGUSER").unwrap_or_else(|_| "postgres".into()),
            password: std::env::var("PGPASSWORD").ok(),
            ssl_mode: std::env::var("PGSSLMODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Applique les options de ligne de commande par-dessus l'environnement
    pub fn apply(&mut self, overrides: DatabaseOverrides) -> Result<()> {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(database) = overrides.database {
            self.dbname = database;
        }
        if let Some(user) = overrides.user {
            self.user = user;
        }
        if let Some(password) = overrides.password {
            self.password = Some(password);
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(ssl) = overrides.ssl {
            self.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    /// Description sans mot de passe, pour les logs
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{} (SSL: {:?})",
            self.user, self.host, self.port, self.dbname, self.ssl_mode
        )
    }
}

/// Crée la configuration TLS pour rustls
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Crée le pool (une connexion suffit)
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();

    cfg.pool = Some(PoolConfig {
        max_size: 1,
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(30)),
            create: Some(Duration::from_secs(10)),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });

    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create database pool"),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create database pool with TLS"),
    }
}

/// Ouvre la connexion de l'import et la teste
pub async fn connect(pool: &Pool) -> Result<Object> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_from_str() {
        assert_eq!("disable".parse::<SslMode>(), Ok(SslMode::Disable));
        assert_eq!("OFF".parse::<SslMode>(), Ok(SslMode::Disable));
        assert_eq!("prefer".parse::<SslMode>(), Ok(SslMode::Prefer));
        assert_eq!("require".parse::<SslMode>(), Ok(SslMode::Require));
        assert!("maybe".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = DatabaseConfig::default();
        config
            .apply(DatabaseOverrides {
                host: Some("db.local".into()),
                database: Some("cog".into()),
                port: Some(5433),
                ssl: Some("require".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.host, "db.local");
        assert_eq!(config.dbname, "cog");
        assert_eq!(config.user, "postgres");
        assert_eq!(config.port, 5433);
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.describe(), "postgres@db.local:5433/cog (SSL: Require)");
    }

    #[test]
    fn test_apply_invalid_ssl() {
        let mut config = DatabaseConfig::default();
        let result = config.apply(DatabaseOverrides {
            ssl: Some("sometimes".into()),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
