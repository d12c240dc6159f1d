//! Startup configuration.
//!
//! Read once from the environment (after `.env` is loaded) and handed to the
//! collector, ingestor and proxy. Nothing below `main` looks at the
//! environment directly.

use sqlx::postgres::PgConnectOptions;
use std::collections::HashSet;

use crate::error::ConfigError;
use crate::snapshot::LineId;
use crate::tfl::DEFAULT_BASE_URL;

pub const DEFAULT_LINE_IDS: &[&str] = &[
    "bakerloo",
    "central",
    "circle",
    "district",
    "hammersmith-city",
    "metropolitan",
];

pub const DEFAULT_TABLE: &str = "tube_snapshots";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub line_ids: Vec<LineId>,
    pub database: Option<DatabaseConfig>,
    pub table: String,
    pub frontend_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key_configured", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .field("line_ids", &self.line_ids)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}

/// Where the snapshot table lives.
#[derive(Clone)]
pub enum DatabaseConfig {
    Url(String),
    Discrete {
        host: String,
        port: u16,
        name: String,
        user: String,
        password: Option<String>,
    },
}

// Credentials stay out of Debug output.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseConfig::Url(_) => f.write_str("DatabaseConfig::Url(..)"),
            DatabaseConfig::Discrete {
                host, port, name, ..
            } => f
                .debug_struct("DatabaseConfig::Discrete")
                .field("host", host)
                .field("port", port)
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match self {
            DatabaseConfig::Url(url) => url.parse().map_err(|e: sqlx::Error| ConfigError::Invalid {
                var: "DATABASE_URL",
                reason: e.to_string(),
            }),
            DatabaseConfig::Discrete {
                host,
                port,
                name,
                user,
                password,
            } => {
                let options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(name)
                    .username(user);
                Ok(match password {
                    Some(p) => options.password(p),
                    None => options,
                })
            }
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let line_ids = match get("LINE_IDS") {
            Some(raw) => parse_line_ids(&raw)?,
            None => DEFAULT_LINE_IDS
                .iter()
                .map(|id| id.parse::<LineId>())
                .collect::<Result<Vec<_>, _>>()?,
        };

        let table = get("SNAPSHOT_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        validate_table_name(&table)?;

        let base_url = get("TFL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        reqwest::Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
            var: "TFL_BASE_URL",
            reason: e.to_string(),
        })?;

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig::Url(url)),
            None => match get("DB_HOST") {
                Some(host) => {
                    let port = match get("DB_PORT") {
                        Some(p) => p.parse().map_err(|_| ConfigError::Invalid {
                            var: "DB_PORT",
                            reason: format!("'{p}' is not a port number"),
                        })?,
                        None => 5432,
                    };
                    Some(DatabaseConfig::Discrete {
                        host,
                        port,
                        name: get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?,
                        user: get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?,
                        password: get("DB_PASSWORD"),
                    })
                }
                None => None,
            },
        };

        Ok(Config {
            api_key: get("TFL_API_KEY"),
            base_url,
            line_ids,
            database,
            table,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::Missing("TFL_API_KEY"))
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig, ConfigError> {
        self.database
            .as_ref()
            .ok_or(ConfigError::Missing("DATABASE_URL or DB_HOST"))
    }

    /// Narrows the configured line set to `requested`, keeping requested order.
    pub fn select_lines(&self, requested: &[String]) -> Result<Vec<LineId>, ConfigError> {
        let selected = parse_line_ids(&requested.join(","))?;
        for id in &selected {
            if !self.line_ids.contains(id) {
                return Err(ConfigError::Invalid {
                    var: "LINE_IDS",
                    reason: format!("'{id}' is not a configured line"),
                });
            }
        }
        Ok(selected)
    }
}

/// Parses a comma-separated list of unique line identifiers.
pub fn parse_line_ids(raw: &str) -> Result<Vec<LineId>, ConfigError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let id: LineId = part.parse()?;
        if !seen.insert(id.clone()) {
            return Err(ConfigError::Invalid {
                var: "LINE_IDS",
                reason: format!("'{id}' is listed twice"),
            });
        }
        ids.push(id);
    }

    if ids.is_empty() {
        return Err(ConfigError::Invalid {
            var: "LINE_IDS",
            reason: "no line identifiers given".to_string(),
        });
    }
    Ok(ids)
}

/// Accepts `table` or `schema.table` made of plain SQL identifiers.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let ident = |s: &str| {
        let mut chars = s.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| ident(p)) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            var: "SNAPSHOT_TABLE",
            reason: format!("'{name}' is not a table name"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        let ids: Vec<_> = cfg.line_ids.iter().map(LineId::as_str).collect();
        assert_eq!(ids, DEFAULT_LINE_IDS);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.table, DEFAULT_TABLE);
        assert!(cfg.api_key.is_none());
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let cfg = config(&[("TFL_API_KEY", "  ")]).unwrap();
        let err = cfg.require_api_key().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TFL_API_KEY")));
    }

    #[test]
    fn test_line_ids_keep_order() {
        let cfg = config(&[("LINE_IDS", "victoria, jubilee,northern")]).unwrap();
        let ids: Vec<_> = cfg.line_ids.iter().map(LineId::as_str).collect();
        assert_eq!(ids, vec!["victoria", "jubilee", "northern"]);
    }

    #[test]
    fn test_duplicate_line_ids_rejected() {
        assert!(config(&[("LINE_IDS", "central,circle,central")]).is_err());
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://u:p@db.internal/tube"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();
        assert!(matches!(cfg.database, Some(DatabaseConfig::Url(_))));
        assert!(cfg.require_database().unwrap().connect_options().is_ok());
    }

    #[test]
    fn test_discrete_database_settings() {
        let cfg = config(&[
            ("DB_HOST", "db.internal"),
            ("DB_NAME", "tube"),
            ("DB_USER", "collector"),
            ("DB_PASSWORD", "hunter2"),
        ])
        .unwrap();
        match cfg.database.as_ref().unwrap() {
            DatabaseConfig::Discrete { host, port, .. } => {
                assert_eq!(host, "db.internal");
                assert_eq!(*port, 5432);
            }
            other => panic!("unexpected database config: {other:?}"),
        }
        assert!(!format!("{:?}", cfg.database).contains("hunter2"));
    }

    #[test]
    fn test_discrete_database_requires_name() {
        let err = config(&[("DB_HOST", "db.internal"), ("DB_USER", "collector")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DB_NAME")));
    }

    #[test]
    fn test_bad_port() {
        let err = config(&[
            ("DB_HOST", "db"),
            ("DB_NAME", "tube"),
            ("DB_USER", "u"),
            ("DB_PORT", "postgres"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DB_PORT", .. }));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("tube_snapshots").is_ok());
        assert!(validate_table_name("analytics.tube_snapshots").is_ok());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("snapshots;--").is_err());
        assert!(config(&[("SNAPSHOT_TABLE", "bad name")]).is_err());
    }

    #[test]
    fn test_select_lines_subset() {
        let cfg = config(&[]).unwrap();
        let picked = cfg
            .select_lines(&["circle".to_string(), "bakerloo".to_string()])
            .unwrap();
        let ids: Vec<_> = picked.iter().map(LineId::as_str).collect();
        assert_eq!(ids, vec!["circle", "bakerloo"]);

        assert!(cfg.select_lines(&["victoria".to_string()]).is_err());
    }
}
