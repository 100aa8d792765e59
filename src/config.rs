use crate::errors::{ServiceError, ServiceResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub database_file: String,
    /// Upper bound on `limit` for paginated listings.
    pub max_page_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> ServiceResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| ServiceError::Config(format!("SERVER_PORT: {e}")))?;

        let max_page_limit = env_var_or("MAX_PAGE_LIMIT", "100")
            .parse::<usize>()
            .map_err(|e| ServiceError::Config(format!("MAX_PAGE_LIMIT: {e}")))?;

        if max_page_limit == 0 {
            return Err(ServiceError::Config("MAX_PAGE_LIMIT must be at least 1".into()));
        }

        Ok(Self {
            server_port,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            database_file: env_var_or("DATABASE_FILE", "options.db"),
            max_page_limit,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8000,
            data_dir: PathBuf::from("data"),
            database_file: "options.db".into(),
            max_page_limit: 100,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
