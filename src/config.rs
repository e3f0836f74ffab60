// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`AppConfig`] loaded from the environment at startup. A `.env` file is
//! honoured when present (loaded by `main` before [`AppConfig::from_env`]).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | HS256 signing secret for session tokens | Required |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `STORE_BACKEND` | Document store backend (`redb` or `memory`) | `redb` |
//! | `DATABASE_PATH` | redb database file | `./data/donations.redb` |
//! | `STORE_TIMEOUT_MS` | Per-request persistence timeout in milliseconds | `5000` |
//! | `FRONTEND_URL` | Allowed CORS origin | `http://localhost:5173` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,donation_server=debug,tower_http=info` |

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

/// Environment variable holding the token signing secret.
///
/// The server refuses to start without it.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable for the bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable selecting the document store backend.
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Environment variable for the redb database file.
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Environment variable overriding the per-request store timeout.
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";

/// Environment variable for the browser origin allowed by CORS.
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_PATH: &str = "./data/donations.redb";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_LOG_FILTER: &str = "info,donation_server=debug,tower_http=info";

/// Bound on every store call made while serving a request.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on opening the store at startup.
pub const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which [`DocumentStore`](crate::storage::DocumentStore) backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Embedded redb file at the given path.
    Redb(PathBuf),
    /// Process-local maps. Data is lost on restart.
    Memory,
}

/// Application configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub store_timeout: Duration,
    pub frontend_url: String,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jwt_secret = get(JWT_SECRET_ENV).ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: HOST_ENV,
                    value: host.clone(),
                })?;

        let store = match get(STORE_BACKEND_ENV).as_deref().map(str::trim) {
            None | Some("redb") => StoreBackend::Redb(PathBuf::from(
                get(DATABASE_PATH_ENV).unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            )),
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: STORE_BACKEND_ENV,
                    value: other.to_string(),
                })
            }
        };

        let store_timeout = match get(STORE_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: STORE_TIMEOUT_ENV,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_STORE_TIMEOUT,
        };

        let frontend_url =
            get(FRONTEND_URL_ENV).unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        Ok(Self {
            jwt_secret,
            bind_addr,
            store,
            store_timeout,
            frontend_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(JWT_SECRET_ENV));

        let err = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(JWT_SECRET_ENV));
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "s3cret")])).unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(
            config.store,
            StoreBackend::Redb(PathBuf::from(DEFAULT_DATABASE_PATH))
        );
        assert_eq!(config.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.frontend_url, DEFAULT_FRONTEND_URL);
    }

    #[test]
    fn overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s3cret"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (STORE_BACKEND_ENV, "memory"),
            (STORE_TIMEOUT_ENV, "250"),
            (FRONTEND_URL_ENV, "https://donate.example"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.frontend_url, "https://donate.example");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "s"), (PORT_ENV, "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: PORT_ENV, .. }));

        let err = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s"),
            (STORE_BACKEND_ENV, "mongo"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: STORE_BACKEND_ENV,
                ..
            }
        ));
    }
}
