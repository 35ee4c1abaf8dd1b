use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub content: ContentConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Bearer-token table mapping tokens to user ids.
///
/// Token issuance belongs to the external identity provider; this table is
/// the verification seam the server consults on every request.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub tokens: HashMap<String, String>,
}

/// Authored-content configuration
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub fixtures_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/trainer.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let auth = AuthConfig {
            tokens: parse_token_table(&env::var("AUTH_TOKENS").map_err(|_| AppError::Config {
                message: "AUTH_TOKENS is required (format: token=user_id,token2=user_id2)"
                    .to_string(),
            })?)?,
        };

        let content = ContentConfig {
            fixtures_dir: PathBuf::from(
                env::var("FIXTURES_DIR").unwrap_or_else(|_| "./fixtures".to_string()),
            ),
        };

        Ok(Config {
            server,
            database,
            logging,
            auth,
            content,
        })
    }
}

/// Parse a `token=user_id` comma-separated table.
fn parse_token_table(raw: &str) -> Result<HashMap<String, String>, AppError> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (token, user_id) = entry.trim().split_once('=').ok_or_else(|| AppError::Config {
            message: format!("Invalid AUTH_TOKENS entry: {}", entry),
        })?;
        if token.is_empty() || user_id.is_empty() {
            return Err(AppError::Config {
                message: format!("Invalid AUTH_TOKENS entry: {}", entry),
            });
        }
        tokens.insert(token.to_string(), user_id.to_string());
    }
    if tokens.is_empty() {
        return Err(AppError::Config {
            message: "AUTH_TOKENS must contain at least one token=user_id entry".to_string(),
        });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_table() {
        let tokens = parse_token_table("abc=user-1,def=user-2").unwrap();
        assert_eq!(tokens.get("abc").map(String::as_str), Some("user-1"));
        assert_eq!(tokens.get("def").map(String::as_str), Some("user-2"));
    }

    #[test]
    fn test_parse_token_table_rejects_malformed_entries() {
        assert!(parse_token_table("no-separator").is_err());
        assert!(parse_token_table("=user-1").is_err());
        assert!(parse_token_table("token=").is_err());
        assert!(parse_token_table("").is_err());
    }
}
