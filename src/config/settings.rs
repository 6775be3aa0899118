use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub indexnow: IndexNowConfig,
    pub google: GoogleConfig,
    pub custom_search: CustomSearchConfig,
    pub notifier: NotifierConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// IndexNow has three equivalent public endpoints; the key and key location
/// are shared across all of them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexNowConfig {
    pub key: Option<String>,
    pub key_location: Option<String>,
}

/// Global fallback service-account credential for the authoritative probe and
/// the `google_api` method. Per-project overrides live in the `credentials` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub service_account_key_path: Option<String>,
    /// Pins the global credential's GSC inspection property, skipping
    /// per-URL property discovery (`sites.list` + host-suffix match)
    /// entirely. Unset unless the operator wants to force one property.
    pub search_console_property: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomSearchConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
}

/// Consumed only by the out-of-scope notifier adapter; the core never sends
/// these requests itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, CoreError> {
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "indexation-service".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| CoreError::Configuration("DATABASE_URL must be set".to_string()))?;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| CoreError::Configuration("REDIS_URL must be set".to_string()))?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| {
                CoreError::Configuration("SERVER_PORT must be a valid port number".to_string())
            })?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let indexnow_key = env::var("INDEXNOW_KEY").ok();
        let indexnow_key_location = env::var("INDEXNOW_KEY_LOCATION").ok();

        let google_service_account_key_path = env::var("GOOGLE_SERVICE_ACCOUNT_KEY_PATH").ok();
        let google_search_console_property = env::var("GOOGLE_SEARCH_CONSOLE_PROPERTY").ok();

        let custom_search_api_key = env::var("CUSTOM_SEARCH_API_KEY").ok();
        let custom_search_engine_id = env::var("CUSTOM_SEARCH_ENGINE_ID").ok();

        let notifier_webhook_url = env::var("NOTIFIER_WEBHOOK_URL").ok();

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            database: DatabaseConfig { url: database_url },
            redis: RedisConfig { url: redis_url },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            indexnow: IndexNowConfig {
                key: indexnow_key,
                key_location: indexnow_key_location,
            },
            google: GoogleConfig {
                service_account_key_path: google_service_account_key_path,
                search_console_property: google_search_console_property,
            },
            custom_search: CustomSearchConfig {
                api_key: custom_search_api_key,
                engine_id: custom_search_engine_id,
            },
            notifier: NotifierConfig {
                webhook_url: notifier_webhook_url,
            },
        })
    }
}
