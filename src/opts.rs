//! Connection options.

use std::sync::Arc;

use url::Url;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::error::Error;

/// Connection options for PostgreSQL.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the PostgreSQL server.
    ///
    /// Default: `5432`
    pub port: u16,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Database name to use.
    ///
    /// Default: `None` (the server uses the user name)
    pub database: Option<String>,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Application name to report to the server.
    ///
    /// Default: `None`
    pub application_name: Option<String>,

    /// Additional startup parameters, sent after the standard ones.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,

    /// Pool the read and write buffers are taken from and returned to.
    ///
    /// Default: [`GLOBAL_BUFFER_POOL`]
    pub buffer_pool: Arc<BufferPool>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            user: String::new(),
            database: None,
            password: None,
            application_name: None,
            params: Vec::new(),
            buffer_pool: Arc::clone(&*GLOBAL_BUFFER_POOL),
        }
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a PostgreSQL connection URL.
    ///
    /// Format: `postgres://[user[:password]@]host[:port][/database][?param1=value1&..]`
    ///
    /// `application_name` is recognized; any other query parameter becomes a
    /// startup parameter.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "postgresql", "pg"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'postgres://' or 'pg://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(5432),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url
                .path()
                .strip_prefix('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "application_name" => {
                    opts.application_name = Some(value.to_string());
                }
                _ => {
                    opts.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    /// Parse either a URL (`postgres://...`) or a semicolon-delimited
    /// connection string such as `Host=db;Port=5433;Username=app;Password=pw`.
    ///
    /// Connection string keys are case-insensitive: `host`/`server`, `port`,
    /// `database`/`db`, `username`/`user`/`uid`, `password`/`pwd` and
    /// `application name`/`application_name`.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if s.contains("://") {
            let url =
                Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
            return Self::try_from(&url);
        }
        parse_connection_string(s)
    }
}

impl TryFrom<String> for Opts {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

fn parse_connection_string(s: &str) -> Result<Opts, Error> {
    let mut opts = Opts::default();

    for segment in s.split(';') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            Error::InvalidUsage(format!("Invalid connection string segment: {:?}", segment))
        })?;
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "host" | "server" => opts.host = value.to_string(),
            "port" => {
                opts.port = value
                    .parse()
                    .map_err(|_| Error::InvalidUsage(format!("Invalid port: {}", value)))?;
            }
            "database" | "db" => opts.database = Some(value.to_string()),
            "username" | "user" | "uid" => opts.user = value.to_string(),
            "password" | "pwd" => opts.password = Some(value.to_string()),
            "application name" | "application_name" => {
                opts.application_name = Some(value.to_string());
            }
            other => {
                return Err(Error::InvalidUsage(format!(
                    "Unknown connection string key: {}",
                    other
                )));
            }
        }
    }

    Ok(opts)
}
