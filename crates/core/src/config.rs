//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Archive database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database (single node deployments and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// Prefer WFARCHIVE_ARCHIVE__DATABASE__PASSWORD over storing it in the file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(60_000)
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600) // advisory only
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/archive.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Where a PostgreSQL archive connects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostgresTarget<'a> {
    /// A connection URL.
    Url(&'a str),
    /// Individual connection fields.
    Params {
        host: &'a str,
        port: u16,
        database: &'a str,
    },
}

impl DatabaseConfig {
    /// Check the settings `from_config` relies on before anything connects.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DatabaseConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("sqlite config requires a non-empty 'path'".to_string())
            }
            DatabaseConfig::Sqlite { .. } => Ok(()),
            DatabaseConfig::Postgres {
                max_connections: 0,
                ..
            } => Err("postgres 'max_connections' must be at least 1".to_string()),
            DatabaseConfig::Postgres { .. } => self.postgres_target().map(|_| ()),
        }
    }

    /// Connection target of a PostgreSQL config. A `url` wins over the
    /// individual fields.
    pub fn postgres_target(&self) -> Result<PostgresTarget<'_>, String> {
        let DatabaseConfig::Postgres {
            url,
            host,
            port,
            database,
            ..
        } = self
        else {
            return Err("not a postgres config".to_string());
        };

        match (url.as_deref(), host.as_deref(), database.as_deref()) {
            (Some(url), _, _) => Ok(PostgresTarget::Url(url)),
            (None, Some(host), Some(database)) => Ok(PostgresTarget::Params {
                host,
                port: port.unwrap_or(5432),
                database,
            }),
            (None, None, _) => {
                Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
            }
            (None, Some(_), None) => {
                Err("postgres config requires 'database' when using individual fields".to_string())
            }
        }
    }
}

/// Archive configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// When false, a no-op archive is used and nothing is persisted.
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,
    /// Backing database.
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_archive_enabled() -> bool {
    true
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the cluster whose workflows are archived.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    /// Restrict every query to this namespace. Empty means all namespaces.
    #[serde(default)]
    pub managed_namespace: String,
    /// Identifier of the controller instance that owns the archived records.
    #[serde(default)]
    pub instance_id: String,
    /// Archive configuration.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

fn default_cluster_name() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            managed_namespace: String::new(),
            instance_id: String::new(),
            archive: ArchiveConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cluster_name, "default");
        assert!(config.managed_namespace.is_empty());
        assert!(config.instance_id.is_empty());
        assert!(config.archive.enabled);
        assert!(matches!(config.archive.database, DatabaseConfig::Sqlite { .. }));
    }

    #[test]
    fn test_postgres_config_defaults() {
        let json = r#"{"type": "postgres", "url": "postgres://localhost/archive"}"#;
        let config: DatabaseConfig = serde_json::from_str(json).unwrap();
        match config {
            DatabaseConfig::Postgres {
                port,
                max_connections,
                statement_timeout_ms,
                ..
            } => {
                assert_eq!(port, Some(5432));
                assert_eq!(max_connections, 10);
                assert_eq!(statement_timeout_ms, Some(60_000));
            }
            _ => panic!("expected postgres config"),
        }
    }

    #[test]
    fn test_postgres_config_validate() {
        let missing_db: DatabaseConfig =
            serde_json::from_str(r#"{"type": "postgres", "host": "db"}"#).unwrap();
        assert!(missing_db.validate().unwrap_err().contains("'database'"));

        let nothing: DatabaseConfig = serde_json::from_str(r#"{"type": "postgres"}"#).unwrap();
        assert!(nothing.validate().is_err());

        let params: DatabaseConfig =
            serde_json::from_str(r#"{"type": "postgres", "host": "db", "database": "archive"}"#)
                .unwrap();
        assert!(params.validate().is_ok());
        assert_eq!(
            params.postgres_target(),
            Ok(PostgresTarget::Params {
                host: "db",
                port: 5432,
                database: "archive",
            })
        );
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_postgres_url_wins_over_fields() {
        let config: DatabaseConfig = serde_json::from_str(
            r#"{"type": "postgres", "url": "postgres://a/b", "host": "db", "database": "x"}"#,
        )
        .unwrap();
        assert_eq!(
            config.postgres_target(),
            Ok(PostgresTarget::Url("postgres://a/b"))
        );
        assert!(DatabaseConfig::default().postgres_target().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let no_pool: DatabaseConfig = serde_json::from_str(
            r#"{"type": "postgres", "url": "postgres://a/b", "max_connections": 0}"#,
        )
        .unwrap();
        assert!(no_pool.validate().unwrap_err().contains("max_connections"));

        let no_path: DatabaseConfig =
            serde_json::from_str(r#"{"type": "sqlite", "path": ""}"#).unwrap();
        assert!(no_path.validate().unwrap_err().contains("'path'"));
    }
}
