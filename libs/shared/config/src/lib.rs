use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_api_url: String,
    pub data_api_key: String,
    pub data_source: String,
    pub database_name: String,
    pub whatsapp_service_url: String,
    pub verification_base_url: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_api_url: env::var("DATA_API_URL").unwrap_or_else(|_| {
                warn!("DATA_API_URL not set, using empty value");
                String::new()
            }),
            data_api_key: env::var("DATA_API_KEY").unwrap_or_else(|_| {
                warn!("DATA_API_KEY not set, using empty value");
                String::new()
            }),
            data_source: env::var("DATA_SOURCE").unwrap_or_else(|_| {
                warn!("DATA_SOURCE not set, using default");
                "clinic-cluster".to_string()
            }),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| {
                warn!("DATABASE_NAME not set, using default");
                "dentaria".to_string()
            }),
            whatsapp_service_url: env::var("WHATSAPP_SERVICE_URL").unwrap_or_else(|_| {
                warn!("WHATSAPP_SERVICE_URL not set, using default");
                "http://localhost:3001".to_string()
            }),
            verification_base_url: env::var("VERIFICATION_BASE_URL").unwrap_or_else(|_| {
                warn!("VERIFICATION_BASE_URL not set, using default");
                "https://verificacion.dentaria.example".to_string()
            }),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
        };

        if !config.is_configured() {
            warn!("Document API not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.data_api_url.is_empty() && !self.data_api_key.is_empty()
    }
}
